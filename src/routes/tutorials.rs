//! Tutorial endpoints
//!
//! - `GET /api/tutorials[?status=&category=]` - list (admins see drafts)
//! - `GET /api/tutorials/{id}` - single tutorial, increments views
//! - `POST /api/tutorials` - create (admin)
//! - `PUT /api/tutorials/{id}` - update (admin)
//! - `DELETE /api/tutorials/{id}` - delete (admin)
//!
//! Listing is public: an anonymous caller sees published tutorials only.

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{authenticate, require_admin, AuthUser};
use crate::db::schemas::{
    TutorialDoc, TutorialStatus, UserDoc, TUTORIAL_COLLECTION, USER_COLLECTION,
};
use crate::db::FindOpts;
use crate::routes::{
    error_response, format_time, json_response, parse_object_id, parse_query_params,
    read_json_body, respond, UserRef,
};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub category: String,
    pub status: TutorialStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<UserRef>,
    pub views: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl TutorialResponse {
    fn from_doc(doc: &TutorialDoc, authors: &HashMap<ObjectId, UserDoc>) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            content: doc.content.clone(),
            video_url: doc.video_url.clone(),
            category: doc.category.clone(),
            status: doc.status,
            author: authors.get(&doc.author).map(UserRef::from_doc),
            views: doc.views,
            created_at: format_time(doc.metadata.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Dispatch /api/tutorials requests
pub async fn handle_tutorials_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/tutorials")
        .unwrap_or("")
        .trim_matches('/')
        .to_string();

    match (method, rest.as_str()) {
        (Method::GET, "") => respond(list_tutorials(req, state).await),
        (Method::POST, "") => respond(create_tutorial(req, state).await),
        (Method::GET, id) => {
            let id = id.to_string();
            respond(get_tutorial(state, &id).await)
        }
        (Method::PUT, id) => {
            let id = id.to_string();
            respond(update_tutorial(req, state, &id).await)
        }
        (Method::DELETE, id) => {
            let id = id.to_string();
            respond(delete_tutorial(req, state, &id).await)
        }
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn load_authors(
    state: &AppState,
    tutorials: &[TutorialDoc],
) -> Result<HashMap<ObjectId, UserDoc>> {
    let ids: Vec<ObjectId> = tutorials.iter().map(|t| t.author).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(state
        .mongo
        .collection::<UserDoc>(USER_COLLECTION)
        .await?
        .find_many(doc! { "_id": { "$in": ids } })
        .await?
        .into_iter()
        .filter_map(|u| u._id.map(|id| (id, u)))
        .collect())
}

async fn list_tutorials(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    // Authentication is optional here; invalid or missing tokens read as guests
    let caller: Option<AuthUser> = authenticate(&state, &req).await.ok();
    let params = parse_query_params(req.uri().query().unwrap_or(""));

    let is_admin = caller.as_ref().map(|u| u.is_admin()).unwrap_or(false);

    let mut filter = doc! {};
    if is_admin {
        if let Some(status) = params.get("status") {
            let status = TutorialStatus::parse(status)
                .ok_or_else(|| BookwormError::Validation("Invalid status".into()))?;
            filter.insert("status", status.as_str());
        }
    } else {
        filter.insert("status", TutorialStatus::Published.as_str());
    }

    if let Some(category) = params.get("category") {
        filter.insert("category", category.as_str());
    }

    let tutorials = state
        .mongo
        .collection::<TutorialDoc>(TUTORIAL_COLLECTION)
        .await?
        .find_many_with(filter, FindOpts::sorted(doc! { "metadata.created_at": -1 }))
        .await?;

    let authors = load_authors(&state, &tutorials).await?;
    let payload: Vec<TutorialResponse> = tutorials
        .iter()
        .map(|t| TutorialResponse::from_doc(t, &authors))
        .collect();

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "tutorials": payload,
            "count": payload.len(),
        }),
    ))
}

async fn get_tutorial(state: Arc<AppState>, raw_id: &str) -> Result<Response<Full<Bytes>>> {
    let id = parse_object_id(raw_id, "tutorial")?;

    let tutorials_coll = state
        .mongo
        .collection::<TutorialDoc>(TUTORIAL_COLLECTION)
        .await?;
    let mut tutorial = tutorials_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Tutorial".into()))?;

    // Count the read
    tutorials_coll
        .update_one(doc! { "_id": id }, doc! { "$inc": { "views": 1 } })
        .await?;
    tutorial.views += 1;

    let authors = load_authors(&state, std::slice::from_ref(&tutorial)).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "tutorial": TutorialResponse::from_doc(&tutorial, &authors),
        }),
    ))
}

async fn create_tutorial(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let input: TutorialInput = read_json_body(req).await?;

    let required = |field: &Option<String>, name: &str| -> Result<String> {
        field
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| BookwormError::Validation(format!("{name} is required")))
    };

    let mut tutorial = TutorialDoc::new(
        required(&input.title, "Title")?,
        required(&input.description, "Description")?,
        required(&input.content, "Content")?,
        user.id,
    );
    tutorial.video_url = input.video_url;
    if let Some(category) = input.category {
        tutorial.category = category;
    }
    if let Some(status) = input.status.as_deref() {
        tutorial.status = TutorialStatus::parse(status)
            .ok_or_else(|| BookwormError::Validation("Invalid status".into()))?;
    }

    let tutorials_coll = state
        .mongo
        .collection::<TutorialDoc>(TUTORIAL_COLLECTION)
        .await?;
    let id = tutorials_coll.insert_one(tutorial).await?;

    let created = tutorials_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::Database("Created tutorial not readable".into()))?;
    let authors = load_authors(&state, std::slice::from_ref(&created)).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "success": true,
            "tutorial": TutorialResponse::from_doc(&created, &authors),
        }),
    ))
}

async fn update_tutorial(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let id = parse_object_id(raw_id, "tutorial")?;
    let input: TutorialInput = read_json_body(req).await?;

    let tutorials_coll = state
        .mongo
        .collection::<TutorialDoc>(TUTORIAL_COLLECTION)
        .await?;
    let mut tutorial = tutorials_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Tutorial".into()))?;

    if let Some(title) = input.title {
        tutorial.title = title;
    }
    if let Some(description) = input.description {
        tutorial.description = description;
    }
    if let Some(content) = input.content {
        tutorial.content = content;
    }
    if input.video_url.is_some() {
        tutorial.video_url = input.video_url;
    }
    if let Some(category) = input.category {
        tutorial.category = category;
    }
    if let Some(status) = input.status.as_deref() {
        tutorial.status = TutorialStatus::parse(status)
            .ok_or_else(|| BookwormError::Validation("Invalid status".into()))?;
    }

    tutorials_coll
        .replace_one(doc! { "_id": id }, tutorial.clone())
        .await?;

    let authors = load_authors(&state, std::slice::from_ref(&tutorial)).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "tutorial": TutorialResponse::from_doc(&tutorial, &authors),
        }),
    ))
}

async fn delete_tutorial(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let id = parse_object_id(raw_id, "tutorial")?;

    let deleted = state
        .mongo
        .collection::<TutorialDoc>(TUTORIAL_COLLECTION)
        .await?
        .delete_one(doc! { "_id": id })
        .await?;

    if deleted == 0 {
        return Err(BookwormError::NotFound("Tutorial".into()));
    }

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "Tutorial deleted" }),
    ))
}
