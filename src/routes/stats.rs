//! Library statistics endpoints
//!
//! - `GET /api/stats` - shelf counts, pages, completions, rating average
//! - `GET /api/stats/enhanced` - 12-month history, genre breakdown, streak
//!
//! Both read the caller's full library snapshot and hand it to the pure
//! aggregator; either the complete stats object comes back or the request
//! fails.

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::authenticate;
use crate::db::schemas::{
    BookDoc, GenreDoc, LibraryEntryDoc, BOOK_COLLECTION, GENRE_COLLECTION, LIBRARY_COLLECTION,
};
use crate::routes::{error_response, json_response, respond};
use crate::server::AppState;
use crate::stats::{basic_stats, enhanced_stats, EntryWithGenres};
use crate::types::Result;

/// Dispatch /api/stats requests
pub async fn handle_stats_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/stats")
        .unwrap_or("")
        .trim_matches('/');

    match (method, rest) {
        (Method::GET, "") => respond(get_stats(req, state).await),
        (Method::GET, "enhanced") => respond(get_enhanced_stats(req, state).await),
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn load_entries(state: &AppState, user: ObjectId) -> Result<Vec<LibraryEntryDoc>> {
    state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?
        .find_many(doc! { "user": user })
        .await
}

/// Join each entry with its book's genre names
async fn load_entries_with_genres(
    state: &AppState,
    user: ObjectId,
) -> Result<Vec<EntryWithGenres>> {
    let entries = load_entries(state, user).await?;

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

    let genre_ids: Vec<ObjectId> = books
        .values()
        .flat_map(|b| b.genres.iter().copied())
        .collect();
    let genre_names: HashMap<ObjectId, String> = if genre_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .mongo
            .collection::<GenreDoc>(GENRE_COLLECTION)
            .await?
            .find_many(doc! { "_id": { "$in": genre_ids } })
            .await?
            .into_iter()
            .filter_map(|g| g._id.map(|id| (id, g.name)))
            .collect()
    };

    Ok(entries
        .into_iter()
        .map(|entry| {
            let genres = books
                .get(&entry.book)
                .map(|b| {
                    b.genres
                        .iter()
                        .filter_map(|id| genre_names.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default();
            EntryWithGenres { entry, genres }
        })
        .collect())
}

async fn get_stats(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;

    let entries = load_entries(&state, user.id).await?;
    let stats = basic_stats(&entries, Utc::now());

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "stats": stats }),
    ))
}

async fn get_enhanced_stats(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;

    let entries = load_entries_with_genres(&state, user.id).await?;
    let stats = enhanced_stats(&entries, Utc::now());

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "data": stats }),
    ))
}
