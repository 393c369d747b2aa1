//! Recommendation endpoint
//!
//! - `GET /api/recommendations` - ranked unread books with reasons

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::authenticate;
use crate::recommend::recommend_for_user;
use crate::routes::books::{load_genres_for, BookResponse};
use crate::routes::{error_response, json_response, respond};
use crate::server::AppState;
use crate::types::Result;

/// A recommended book with its reason
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedBook {
    #[serde(flatten)]
    pub book: BookResponse,
    pub recommendation_reason: String,
}

/// Dispatch /api/recommendations requests
pub async fn handle_recommendations_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/recommendations")
        .unwrap_or("")
        .trim_matches('/');

    match (method, rest) {
        (Method::GET, "") => respond(get_recommendations(req, state).await),
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn get_recommendations(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;

    let result = recommend_for_user(&state, user.id).await?;

    let books: Vec<_> = result.books.iter().map(|r| r.book.clone()).collect();
    let genres = load_genres_for(&state, &books).await?;

    let recommendations: Vec<RecommendedBook> = result
        .books
        .iter()
        .map(|ranked| RecommendedBook {
            book: BookResponse::from_doc(&ranked.book, &genres),
            recommendation_reason: ranked.reason.clone(),
        })
        .collect();

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "recommendations": recommendations,
            "stats": result.stats,
        }),
    ))
}
