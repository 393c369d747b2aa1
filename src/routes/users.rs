//! Admin endpoints for user management
//!
//! - `GET /api/users` - list users, newest first (admin)
//! - `PUT /api/users/{id}/role` - change role (admin)
//! - `DELETE /api/users/{id}` - delete user (admin)

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{authenticate, require_admin};
use crate::db::schemas::{UserDoc, UserRole, USER_COLLECTION};
use crate::db::FindOpts;
use crate::routes::{
    error_response, format_time, json_response, parse_object_id, read_json_body, respond,
};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub follower_count: usize,
    pub following_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserSummary {
    fn from_doc(doc: &UserDoc) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: doc.name.clone(),
            email: doc.email.clone(),
            role: doc.role,
            is_active: doc.is_active,
            photo_url: doc.photo_url.clone(),
            follower_count: doc.followers.len(),
            following_count: doc.following.len(),
            created_at: format_time(doc.metadata.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

/// Dispatch /api/users requests
pub async fn handle_users_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/users")
        .unwrap_or("")
        .trim_matches('/')
        .to_string();

    match (method, rest.as_str()) {
        (Method::GET, "") => respond(list_users(req, state).await),
        (Method::PUT, p) if p.ends_with("/role") => {
            let id = p.trim_end_matches("/role").trim_matches('/').to_string();
            respond(update_role(req, state, &id).await)
        }
        (Method::DELETE, id) => {
            let id = id.to_string();
            respond(delete_user(req, state, &id).await)
        }
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn list_users(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let caller = authenticate(&state, &req).await?;
    require_admin(&caller)?;

    let users = state
        .mongo
        .collection::<UserDoc>(USER_COLLECTION)
        .await?
        .find_many_with(doc! {}, FindOpts::sorted(doc! { "metadata.created_at": -1 }))
        .await?;

    let payload: Vec<UserSummary> = users.iter().map(UserSummary::from_doc).collect();

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "users": payload,
            "count": payload.len(),
        }),
    ))
}

async fn update_role(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let caller = authenticate(&state, &req).await?;
    require_admin(&caller)?;

    let id = parse_object_id(raw_id, "user")?;
    let body: RoleRequest = read_json_body(req).await?;

    let role = match body.role.as_str() {
        "user" => UserRole::User,
        "admin" => UserRole::Admin,
        _ => return Err(BookwormError::Validation("Invalid role".into())),
    };

    let users_coll = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let mut user = users_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("User".into()))?;

    user.role = role;
    // Role changes invalidate outstanding tokens
    user.token_version += 1;

    users_coll.replace_one(doc! { "_id": id }, user.clone()).await?;

    info!("Role of user {} set to {:?} by {}", id, role, caller.id);

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "user": UserSummary::from_doc(&user),
        }),
    ))
}

async fn delete_user(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let caller = authenticate(&state, &req).await?;
    require_admin(&caller)?;

    let id = parse_object_id(raw_id, "user")?;

    // Soft delete keeps the document for review/audit references
    let result = state
        .mongo
        .collection::<UserDoc>(USER_COLLECTION)
        .await?
        .soft_delete(doc! { "_id": id })
        .await?;

    if result.matched_count == 0 {
        return Err(BookwormError::NotFound("User".into()));
    }

    info!("User {} deleted by {}", id, caller.id);

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "User deleted successfully" }),
    ))
}
