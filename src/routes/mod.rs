//! HTTP routes for Bookworm

pub mod auth_routes;
pub mod books;
pub mod genres;
pub mod goals;
pub mod health;
pub mod library;
pub mod recommendations;
pub mod reviews;
pub mod social;
pub mod stats;
pub mod tutorials;
pub mod users;

pub use auth_routes::handle_auth_request;
pub use books::handle_books_request;
pub use genres::handle_genres_request;
pub use goals::handle_goals_request;
pub use health::{health_check, readiness_check, version_info};
pub use library::handle_library_request;
pub use recommendations::handle_recommendations_request;
pub use reviews::handle_reviews_request;
pub use social::handle_social_request;
pub use stats::handle_stats_request;
pub use tutorials::handle_tutorials_request;
pub use users::handle_users_request;

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::types::{BookwormError, Result};

/// Maximum accepted request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Serialize a value as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// JSON error body with the given status
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

/// Convert a service error into its HTTP response
pub fn failure(err: BookwormError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        warn!("Request failed: {}", err);
    }
    error_response(status, &err.to_string())
}

/// Unwrap a handler result into a response
pub fn respond(result: Result<Response<Full<Bytes>>>) -> Response<Full<Bytes>> {
    result.unwrap_or_else(failure)
}

/// Read and deserialize a JSON request body
pub async fn read_json_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| BookwormError::Validation(format!("Failed to read body: {e}")))?
        .to_bytes();

    if body.len() > MAX_BODY_BYTES {
        return Err(BookwormError::Validation("Request body too large".into()));
    }

    serde_json::from_slice(&body)
        .map_err(|e| BookwormError::Validation(format!("Invalid JSON body: {e}")))
}

/// Parse a query string into a key/value map
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            let value = urlencoding::decode(value).unwrap_or_default();
            params.insert(key.to_string(), value.to_string());
        }
    }
    params
}

/// Parse a path segment as an ObjectId, naming the entity on failure
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw)
        .map_err(|_| BookwormError::Validation(format!("Invalid {what} id")))
}

/// Format a bson timestamp for JSON output
pub fn format_time(time: Option<bson::DateTime>) -> Option<String> {
    time.map(|t| t.to_chrono().to_rfc3339())
}

/// Minimal user reference embedded in other payloads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl UserRef {
    pub fn from_doc(doc: &crate::db::schemas::UserDoc) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: doc.name.clone(),
            photo_url: doc.photo_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params() {
        let params = parse_query_params("shelf=read&limit=10");
        assert_eq!(params.get("shelf"), Some(&"read".to_string()));
        assert_eq!(params.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_query_params_decodes() {
        let params = parse_query_params("q=science%20fiction");
        assert_eq!(params.get("q"), Some(&"science fiction".to_string()));
    }

    #[test]
    fn test_parse_query_params_empty() {
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn test_parse_object_id_rejects_garbage() {
        assert!(parse_object_id("not-an-id", "book").is_err());
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "book").unwrap(), id);
    }

    #[test]
    fn test_error_response_status() {
        let resp = error_response(StatusCode::NOT_FOUND, "missing");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
