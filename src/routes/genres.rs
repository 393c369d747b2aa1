//! Genre endpoints
//!
//! - `GET /api/genres` - list, alphabetical
//! - `POST /api/genres` - create (admin)
//! - `PUT /api/genres/{id}` - update (admin)
//! - `DELETE /api/genres/{id}` - delete (admin)

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{authenticate, require_admin};
use crate::db::schemas::{GenreDoc, GENRE_COLLECTION};
use crate::db::FindOpts;
use crate::routes::{
    error_response, json_response, parse_object_id, read_json_body, respond,
};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GenreResponse {
    fn from_doc(doc: &GenreDoc) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: doc.name.clone(),
            description: doc.description.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreInput {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Dispatch /api/genres requests
pub async fn handle_genres_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/genres")
        .unwrap_or("")
        .trim_matches('/')
        .to_string();

    match (method, rest.as_str()) {
        (Method::GET, "") => respond(list_genres(state).await),
        (Method::POST, "") => respond(create_genre(req, state).await),
        (Method::PUT, id) => {
            let id = id.to_string();
            respond(update_genre(req, state, &id).await)
        }
        (Method::DELETE, id) => {
            let id = id.to_string();
            respond(delete_genre(req, state, &id).await)
        }
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn list_genres(state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let genres = state
        .mongo
        .collection::<GenreDoc>(GENRE_COLLECTION)
        .await?
        .find_many_with(doc! {}, FindOpts::sorted(doc! { "name": 1 }))
        .await?;

    let payload: Vec<GenreResponse> = genres.iter().map(GenreResponse::from_doc).collect();

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "genres": payload }),
    ))
}

async fn create_genre(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let input: GenreInput = read_json_body(req).await?;
    let name = input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BookwormError::Validation("Name is required".into()))?;

    let genres_coll = state.mongo.collection::<GenreDoc>(GENRE_COLLECTION).await?;
    if genres_coll.find_one(doc! { "name": name }).await?.is_some() {
        return Err(BookwormError::Validation("Genre already exists".into()));
    }

    let genre = GenreDoc::new(name.to_string(), input.description, Some(user.id));
    let id = genres_coll.insert_one(genre.clone()).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "success": true,
            "genre": GenreResponse {
                id: id.to_hex(),
                name: genre.name,
                description: genre.description,
            },
        }),
    ))
}

async fn update_genre(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let id = parse_object_id(raw_id, "genre")?;
    let input: GenreInput = read_json_body(req).await?;

    let genres_coll = state.mongo.collection::<GenreDoc>(GENRE_COLLECTION).await?;
    let mut genre = genres_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Genre".into()))?;

    if let Some(name) = input.name {
        genre.name = name;
    }
    if input.description.is_some() {
        genre.description = input.description;
    }

    genres_coll.replace_one(doc! { "_id": id }, genre.clone()).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "genre": GenreResponse::from_doc(&genre),
        }),
    ))
}

async fn delete_genre(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let id = parse_object_id(raw_id, "genre")?;

    let deleted = state
        .mongo
        .collection::<GenreDoc>(GENRE_COLLECTION)
        .await?
        .delete_one(doc! { "_id": id })
        .await?;

    if deleted == 0 {
        return Err(BookwormError::NotFound("Genre".into()));
    }

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "Genre deleted" }),
    ))
}
