//! HTTP routes for authentication
//!
//! - POST /auth/register - Create an account
//! - POST /auth/login    - Authenticate and get a JWT
//! - GET  /auth/me       - Get current user info from token

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{authenticate, hash_password, verify_password};
use crate::db::schemas::{UserDoc, UserRole, USER_COLLECTION};
use crate::routes::{error_response, json_response, read_json_body, respond};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: u64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Dispatch /auth/* requests
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::POST, "/auth/register") => respond(register(req, state).await),
        (Method::POST, "/auth/login") => respond(login(req, state).await),
        (Method::GET, "/auth/me") => respond(me(req, state).await),
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn register(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let body: RegisterRequest = read_json_body(req).await?;

    if body.name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(BookwormError::Validation("Name and email are required".into()));
    }
    if body.password.len() < 8 {
        return Err(BookwormError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    let email = body.email.trim().to_lowercase();
    if users.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(BookwormError::Validation("Email already registered".into()));
    }

    let password_hash = hash_password(&body.password)?;
    let user = UserDoc::new(body.name.trim().to_string(), email.clone(), password_hash);
    let user_id = users.insert_one(user.clone()).await?;

    info!("Registered user {} ({})", user_id, email);

    let (token, expires_at) =
        state
            .jwt
            .generate(&user_id.to_hex(), &email, "user", user.token_version)?;

    let response = AuthResponse {
        token,
        expires_at,
        user: UserInfo {
            id: user_id.to_hex(),
            name: user.name,
            email: user.email,
            role: "user".to_string(),
            photo_url: None,
        },
    };

    Ok(json_response(StatusCode::CREATED, &response))
}

async fn login(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let body: LoginRequest = read_json_body(req).await?;

    let users = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
    let email = body.email.trim().to_lowercase();

    // Same error for unknown email and bad password
    let invalid = || BookwormError::Auth("Invalid email or password".into());

    let user = users
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(BookwormError::Auth("Account is deactivated".into()));
    }

    let user_id = user
        ._id
        .ok_or_else(|| BookwormError::Database("User missing id".into()))?;

    let role = match user.role {
        UserRole::Admin => "admin",
        UserRole::User => "user",
    };

    let (token, expires_at) =
        state
            .jwt
            .generate(&user_id.to_hex(), &email, role, user.token_version)?;

    info!("User {} logged in", user_id);

    let response = AuthResponse {
        token,
        expires_at,
        user: UserInfo {
            id: user_id.to_hex(),
            name: user.name,
            email: user.email,
            role: role.to_string(),
            photo_url: user.photo_url,
        },
    };

    Ok(json_response(StatusCode::OK, &response))
}

async fn me(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;

    let role = if user.is_admin() { "admin" } else { "user" };
    let response = UserInfo {
        id: user.id.to_hex(),
        name: user.name,
        email: user.email,
        role: role.to_string(),
        photo_url: user.photo_url,
    };

    Ok(json_response(StatusCode::OK, &response))
}
