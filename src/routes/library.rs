//! Library shelf endpoints
//!
//! - `GET /api/library[?shelf=]` - the caller's entries, newest first
//! - `POST /api/library` - add a book or move it between shelves
//! - `PUT /api/library/{id}/progress` - record pages read
//! - `PUT /api/library/{id}/rating` - set the personal rating
//! - `DELETE /api/library/{id}` - remove from the library
//!
//! Creating an entry increments the book's shelved counter; removal
//! decrements it. Shelf moves never touch the counter.

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{authenticate, AuthUser};
use crate::db::schemas::{
    ActivityDoc, ActivityKind, BookDoc, GenreDoc, LibraryEntryDoc, Shelf, ACTIVITY_COLLECTION,
    BOOK_COLLECTION, LIBRARY_COLLECTION,
};
use crate::db::FindOpts;
use crate::routes::books::{load_genres_for, BookResponse};
use crate::routes::{
    error_response, format_time, json_response, parse_object_id, parse_query_params,
    read_json_body, respond,
};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub pages_read: i64,
    pub total_pages: i64,
    pub percentage: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntryResponse {
    pub id: String,
    pub book: BookResponse,
    pub shelf: Shelf,
    pub progress: ProgressResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_rating: Option<i32>,
    pub date_added: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_finished: Option<String>,
}

impl LibraryEntryResponse {
    fn from_doc(
        entry: &LibraryEntryDoc,
        book: &BookDoc,
        genres: &HashMap<ObjectId, GenreDoc>,
    ) -> Self {
        Self {
            id: entry._id.map(|id| id.to_hex()).unwrap_or_default(),
            book: BookResponse::from_doc(book, genres),
            shelf: entry.shelf,
            progress: ProgressResponse {
                pages_read: entry.progress.pages_read,
                total_pages: entry.progress.total_pages,
                percentage: entry.progress.percentage,
            },
            personal_rating: entry.personal_rating,
            date_added: entry.date_added.to_chrono().to_rfc3339(),
            date_finished: format_time(entry.date_finished),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToLibraryRequest {
    pub book_id: String,
    pub shelf: String,
    #[serde(default)]
    pub total_pages: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub pages_read: i64,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i32,
}

/// Dispatch /api/library requests
pub async fn handle_library_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/library")
        .unwrap_or("")
        .trim_matches('/')
        .to_string();

    match (method, rest.as_str()) {
        (Method::GET, "") => respond(list_library(req, state).await),
        (Method::POST, "") => respond(add_to_library(req, state).await),
        (Method::PUT, p) if p.ends_with("/progress") => {
            let id = p.trim_end_matches("/progress").trim_matches('/').to_string();
            respond(update_progress(req, state, &id).await)
        }
        (Method::PUT, p) if p.ends_with("/rating") => {
            let id = p.trim_end_matches("/rating").trim_matches('/').to_string();
            respond(update_rating(req, state, &id).await)
        }
        (Method::DELETE, id) => {
            let id = id.to_string();
            respond(remove_from_library(req, state, &id).await)
        }
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

/// Load an entry owned by the caller, by id
async fn find_own_entry(
    state: &AppState,
    user: &AuthUser,
    raw_id: &str,
) -> Result<LibraryEntryDoc> {
    let id = parse_object_id(raw_id, "library entry")?;

    state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?
        .find_one(doc! { "_id": id, "user": user.id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Library entry".into()))
}

/// Render one entry with its populated book
async fn populated_entry(
    state: &AppState,
    entry: &LibraryEntryDoc,
) -> Result<LibraryEntryResponse> {
    let book = state
        .mongo
        .collection::<BookDoc>(BOOK_COLLECTION)
        .await?
        .find_one(doc! { "_id": entry.book })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Book".into()))?;

    let genres = load_genres_for(state, std::slice::from_ref(&book)).await?;
    Ok(LibraryEntryResponse::from_doc(entry, &book, &genres))
}

async fn record_activity(state: &AppState, activity: ActivityDoc) -> Result<()> {
    state
        .mongo
        .collection::<ActivityDoc>(ACTIVITY_COLLECTION)
        .await?
        .insert_one(activity)
        .await?;
    Ok(())
}

async fn list_library(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let params = parse_query_params(req.uri().query().unwrap_or(""));

    let mut filter = doc! { "user": user.id };
    if let Some(shelf) = params.get("shelf") {
        let shelf = Shelf::parse(shelf)
            .ok_or_else(|| BookwormError::Validation(format!("Unknown shelf '{shelf}'")))?;
        filter.insert("shelf", shelf.as_str());
    }

    let entries = state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?
        .find_many_with(filter, FindOpts::sorted(doc! { "date_added": -1 }))
        .await?;

    // Populate books and their genres in two batch reads
    let book_ids: Vec<ObjectId> = entries.iter().map(|e| e.book).collect();
    let books: HashMap<ObjectId, BookDoc> = if book_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .mongo
            .collection::<BookDoc>(BOOK_COLLECTION)
            .await?
            .find_many(doc! { "_id": { "$in": book_ids } })
            .await?
            .into_iter()
            .filter_map(|b| b._id.map(|id| (id, b)))
            .collect()
    };
    let book_list: Vec<BookDoc> = books.values().cloned().collect();
    let genres = load_genres_for(&state, &book_list).await?;

    let payload: Vec<LibraryEntryResponse> = entries
        .iter()
        .filter_map(|e| {
            books
                .get(&e.book)
                .map(|book| LibraryEntryResponse::from_doc(e, book, &genres))
        })
        .collect();

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "library": payload }),
    ))
}

async fn add_to_library(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let body: AddToLibraryRequest = read_json_body(req).await?;

    let book_id = parse_object_id(&body.book_id, "book")?;
    let shelf = Shelf::parse(&body.shelf)
        .ok_or_else(|| BookwormError::Validation(format!("Unknown shelf '{}'", body.shelf)))?;

    let books_coll = state.mongo.collection::<BookDoc>(BOOK_COLLECTION).await?;
    if books_coll.find_one(doc! { "_id": book_id }).await?.is_none() {
        return Err(BookwormError::NotFound("Book".into()));
    }

    let library_coll = state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?;

    if let Some(mut existing) = library_coll
        .find_one(doc! { "user": user.id, "book": book_id })
        .await?
    {
        // Shelf move on the existing entry; the shelved counter is untouched
        existing.set_shelf(shelf);
        if shelf == Shelf::CurrentlyReading {
            if let Some(total) = body.total_pages {
                existing.progress.total_pages = total.max(0);
            }
        }

        library_coll
            .replace_one(doc! { "_id": existing._id }, existing.clone())
            .await?;

        let payload = populated_entry(&state, &existing).await?;
        return Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({ "success": true, "library": payload }),
        ));
    }

    let entry = LibraryEntryDoc::new(user.id, book_id, shelf, body.total_pages);
    let entry_id = library_coll.insert_one(entry.clone()).await?;

    books_coll
        .update_one(doc! { "_id": book_id }, doc! { "$inc": { "total_shelved": 1 } })
        .await?;

    record_activity(
        &state,
        ActivityDoc::new(user.id, ActivityKind::AddedBook).with_book(book_id),
    )
    .await?;

    let created = library_coll
        .find_one(doc! { "_id": entry_id })
        .await?
        .ok_or_else(|| BookwormError::Database("Created entry not readable".into()))?;
    let payload = populated_entry(&state, &created).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({ "success": true, "library": payload }),
    ))
}

async fn update_progress(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let mut entry = find_own_entry(&state, &user, raw_id).await?;

    let body: ProgressRequest = read_json_body(req).await?;
    if body.pages_read < 0 {
        return Err(BookwormError::Validation("pagesRead must not be negative".into()));
    }

    entry.set_pages_read(body.pages_read);

    state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?
        .replace_one(doc! { "_id": entry._id }, entry.clone())
        .await?;

    record_activity(
        &state,
        ActivityDoc::new(user.id, ActivityKind::UpdatedProgress).with_book(entry.book),
    )
    .await?;

    let payload = populated_entry(&state, &entry).await?;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "library": payload }),
    ))
}

async fn update_rating(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let mut entry = find_own_entry(&state, &user, raw_id).await?;

    let body: RatingRequest = read_json_body(req).await?;
    if !(1..=5).contains(&body.rating) {
        return Err(BookwormError::Validation("Rating must be between 1 and 5".into()));
    }

    entry.personal_rating = Some(body.rating);

    state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?
        .replace_one(doc! { "_id": entry._id }, entry.clone())
        .await?;

    let payload = populated_entry(&state, &entry).await?;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "library": payload }),
    ))
}

async fn remove_from_library(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let entry = find_own_entry(&state, &user, raw_id).await?;

    state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?
        .delete_one(doc! { "_id": entry._id })
        .await?;

    state
        .mongo
        .collection::<BookDoc>(BOOK_COLLECTION)
        .await?
        .update_one(
            doc! { "_id": entry.book },
            doc! { "$inc": { "total_shelved": -1 } },
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "Removed from library" }),
    ))
}
