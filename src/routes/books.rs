//! Book catalog endpoints
//!
//! - `GET /api/books` - list with search, genre filter, pagination
//! - `GET /api/books/{id}` - single book
//! - `POST /api/books` - create (admin)
//! - `PUT /api/books/{id}` - update (admin)
//! - `DELETE /api/books/{id}` - delete (admin)

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{authenticate, require_admin};
use crate::db::schemas::{BookDoc, GenreDoc, Ratings, BOOK_COLLECTION, GENRE_COLLECTION};
use crate::db::FindOpts;
use crate::routes::{
    error_response, format_time, json_response, parse_object_id, parse_query_params,
    read_json_body, respond,
};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

/// Genre reference embedded in book payloads
#[derive(Debug, Clone, Serialize)]
pub struct GenreRef {
    pub id: String,
    pub name: String,
}

/// Book as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub olid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,
    pub genres: Vec<GenreRef>,
    pub ratings: Ratings,
    pub total_shelved: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl BookResponse {
    /// Build from a document, resolving genre ids through the given map
    pub fn from_doc(doc: &BookDoc, genres: &HashMap<ObjectId, GenreDoc>) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            title: doc.title.clone(),
            author: doc.author.clone(),
            isbn: doc.isbn.clone(),
            olid: doc.olid.clone(),
            cover_id: doc.cover_id,
            cover_image: doc.cover_image.clone(),
            description: doc.description.clone(),
            publish_year: doc.publish_year,
            genres: doc
                .genres
                .iter()
                .filter_map(|id| genres.get(id))
                .filter_map(|g| {
                    g._id.map(|gid| GenreRef {
                        id: gid.to_hex(),
                        name: g.name.clone(),
                    })
                })
                .collect(),
            ratings: doc.ratings.clone(),
            total_shelved: doc.total_shelved,
            created_at: format_time(doc.metadata.created_at),
        }
    }
}

/// Load the genre documents referenced by a set of books
pub async fn load_genres_for(
    state: &AppState,
    books: &[BookDoc],
) -> Result<HashMap<ObjectId, GenreDoc>> {
    let ids: Vec<ObjectId> = books
        .iter()
        .flat_map(|b| b.genres.iter().copied())
        .collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let genres = state
        .mongo
        .collection::<GenreDoc>(GENRE_COLLECTION)
        .await?
        .find_many(doc! { "_id": { "$in": ids } })
        .await?;

    Ok(genres
        .into_iter()
        .filter_map(|g| g._id.map(|id| (id, g)))
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub olid: Option<String>,
    #[serde(default)]
    pub cover_id: Option<i64>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publish_year: Option<i32>,
    /// Genre ids as hex strings
    #[serde(default)]
    pub genres: Option<Vec<String>>,
}

fn parse_genre_ids(raw: &[String]) -> Result<Vec<ObjectId>> {
    raw.iter().map(|g| parse_object_id(g, "genre")).collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: u64,
    limit: u64,
    total: u64,
    pages: u64,
}

/// Dispatch /api/books requests
pub async fn handle_books_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/books")
        .unwrap_or("")
        .trim_matches('/')
        .to_string();

    match (method, rest.as_str()) {
        (Method::GET, "") => respond(list_books(req, state).await),
        (Method::POST, "") => respond(create_book(req, state).await),
        (Method::GET, id) => respond(get_book(state, id).await),
        (Method::PUT, id) => {
            let id = id.to_string();
            respond(update_book(req, state, &id).await)
        }
        (Method::DELETE, id) => {
            let id = id.to_string();
            respond(delete_book(req, state, &id).await)
        }
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn list_books(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let params = parse_query_params(req.uri().query().unwrap_or(""));

    let mut filter = doc! {};
    if let Some(search) = params.get("search").map(String::as_str).filter(|s| !s.is_empty()) {
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": search, "$options": "i" } },
                doc! { "author": { "$regex": search, "$options": "i" } },
            ],
        );
    }
    if let Some(genre) = params.get("genre") {
        filter.insert("genres", parse_object_id(genre, "genre")?);
    }

    let page: u64 = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1)
        .max(1);
    let limit: u64 = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(state.args.page_size as u64)
        .clamp(1, 100);

    let books_coll = state.mongo.collection::<BookDoc>(BOOK_COLLECTION).await?;
    let total = books_coll.count(filter.clone()).await?;

    let books = books_coll
        .find_many_with(
            filter,
            FindOpts::default()
                .with_limit(limit as i64)
                .with_skip((page - 1) * limit),
        )
        .await?;

    let genres = load_genres_for(&state, &books).await?;
    let payload: Vec<BookResponse> = books
        .iter()
        .map(|b| BookResponse::from_doc(b, &genres))
        .collect();

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "books": payload,
            "pagination": Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(limit),
            },
        }),
    ))
}

async fn get_book(state: Arc<AppState>, raw_id: &str) -> Result<Response<Full<Bytes>>> {
    let id = parse_object_id(raw_id, "book")?;

    let book = state
        .mongo
        .collection::<BookDoc>(BOOK_COLLECTION)
        .await?
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Book".into()))?;

    let genres = load_genres_for(&state, std::slice::from_ref(&book)).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "book": BookResponse::from_doc(&book, &genres),
        }),
    ))
}

async fn create_book(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let input: BookInput = read_json_body(req).await?;
    let title = input
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| BookwormError::Validation("Title is required".into()))?;
    let author = input
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| BookwormError::Validation("Author is required".into()))?;

    let mut book = BookDoc::new(title.to_string(), author.to_string(), Some(user.id));
    book.isbn = input.isbn;
    book.olid = input.olid;
    book.cover_id = input.cover_id;
    book.cover_image = input.cover_image;
    book.description = input.description;
    book.publish_year = input.publish_year;
    if let Some(raw) = input.genres {
        book.genres = parse_genre_ids(&raw)?;
    }

    let books_coll = state.mongo.collection::<BookDoc>(BOOK_COLLECTION).await?;
    let id = books_coll.insert_one(book).await?;

    let created = books_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::Database("Created book not readable".into()))?;
    let genres = load_genres_for(&state, std::slice::from_ref(&created)).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "success": true,
            "book": BookResponse::from_doc(&created, &genres),
        }),
    ))
}

async fn update_book(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let id = parse_object_id(raw_id, "book")?;
    let input: BookInput = read_json_body(req).await?;

    let books_coll = state.mongo.collection::<BookDoc>(BOOK_COLLECTION).await?;
    let mut book = books_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Book".into()))?;

    if let Some(title) = input.title {
        book.title = title;
    }
    if let Some(author) = input.author {
        book.author = author;
    }
    if input.isbn.is_some() {
        book.isbn = input.isbn;
    }
    if input.olid.is_some() {
        book.olid = input.olid;
    }
    if input.cover_id.is_some() {
        book.cover_id = input.cover_id;
    }
    if input.cover_image.is_some() {
        book.cover_image = input.cover_image;
    }
    if input.description.is_some() {
        book.description = input.description;
    }
    if input.publish_year.is_some() {
        book.publish_year = input.publish_year;
    }
    if let Some(raw) = input.genres {
        book.genres = parse_genre_ids(&raw)?;
    }

    books_coll.replace_one(doc! { "_id": id }, book.clone()).await?;

    let genres = load_genres_for(&state, std::slice::from_ref(&book)).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "book": BookResponse::from_doc(&book, &genres),
        }),
    ))
}

async fn delete_book(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let id = parse_object_id(raw_id, "book")?;

    let deleted = state
        .mongo
        .collection::<BookDoc>(BOOK_COLLECTION)
        .await?
        .delete_one(doc! { "_id": id })
        .await?;

    if deleted == 0 {
        return Err(BookwormError::NotFound("Book".into()));
    }

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "Book deleted" }),
    ))
}
