//! Social graph endpoints
//!
//! - `POST /api/social/follow/{userId}` - follow a user
//! - `DELETE /api/social/unfollow/{userId}` - unfollow
//! - `GET /api/social/followers/{userId}` - follower list
//! - `GET /api/social/following/{userId}` - following list
//! - `GET /api/social/feed[?limit=]` - activity of followed users
//! - `GET /api/social/users/search?q=` - find users by name
//! - `GET /api/social/profile/{userId}` - public profile

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::authenticate;
use crate::db::schemas::{
    ActivityDoc, ActivityKind, BookDoc, UserDoc, ACTIVITY_COLLECTION, BOOK_COLLECTION,
    USER_COLLECTION,
};
use crate::db::FindOpts;
use crate::routes::{
    error_response, format_time, json_response, parse_object_id, parse_query_params, respond,
    UserRef,
};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

const DEFAULT_FEED_LIMIT: i64 = 20;
const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub follower_count: usize,
    pub following_count: usize,
    pub is_following: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: String,
    pub kind: ActivityKind,
    pub user: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<ActivityBookRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivityBookRef {
    pub id: String,
    pub title: String,
}

/// Dispatch /api/social requests
pub async fn handle_social_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/social")
        .unwrap_or("")
        .trim_matches('/')
        .to_string();

    match (method, rest.as_str()) {
        (Method::GET, "feed") => respond(get_feed(req, state).await),
        (Method::GET, "users/search") => respond(search_users(req, state).await),
        (Method::POST, p) if p.starts_with("follow/") => {
            let id = p.trim_start_matches("follow/").to_string();
            respond(follow_user(req, state, &id).await)
        }
        (Method::DELETE, p) if p.starts_with("unfollow/") => {
            let id = p.trim_start_matches("unfollow/").to_string();
            respond(unfollow_user(req, state, &id).await)
        }
        (Method::GET, p) if p.starts_with("followers/") => {
            let id = p.trim_start_matches("followers/").to_string();
            respond(list_followers(req, state, &id).await)
        }
        (Method::GET, p) if p.starts_with("following/") => {
            let id = p.trim_start_matches("following/").to_string();
            respond(list_following(req, state, &id).await)
        }
        (Method::GET, p) if p.starts_with("profile/") => {
            let id = p.trim_start_matches("profile/").to_string();
            respond(get_profile(req, state, &id).await)
        }
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

async fn load_user(state: &AppState, id: ObjectId) -> Result<UserDoc> {
    state
        .mongo
        .collection::<UserDoc>(USER_COLLECTION)
        .await?
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("User".into()))
}

async fn follow_user(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let target_id = parse_object_id(raw_id, "user")?;

    if target_id == user.id {
        return Err(BookwormError::Validation("Cannot follow yourself".into()));
    }

    let users_coll = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    // Target must exist
    if users_coll.find_one(doc! { "_id": target_id }).await?.is_none() {
        return Err(BookwormError::NotFound("User".into()));
    }

    let current = load_user(&state, user.id).await?;
    if current.following.contains(&target_id) {
        return Err(BookwormError::Validation(
            "Already following this user".into(),
        ));
    }

    // Write both edges
    users_coll
        .update_one(
            doc! { "_id": user.id },
            doc! { "$addToSet": { "following": target_id } },
        )
        .await?;
    users_coll
        .update_one(
            doc! { "_id": target_id },
            doc! { "$addToSet": { "followers": user.id } },
        )
        .await?;

    state
        .mongo
        .collection::<ActivityDoc>(ACTIVITY_COLLECTION)
        .await?
        .insert_one(ActivityDoc::new(user.id, ActivityKind::FollowedUser).with_target_user(target_id))
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "Successfully followed user" }),
    ))
}

async fn unfollow_user(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let target_id = parse_object_id(raw_id, "user")?;

    let users_coll = state.mongo.collection::<UserDoc>(USER_COLLECTION).await?;

    users_coll
        .update_one(
            doc! { "_id": user.id },
            doc! { "$pull": { "following": target_id } },
        )
        .await?;
    users_coll
        .update_one(
            doc! { "_id": target_id },
            doc! { "$pull": { "followers": user.id } },
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "Successfully unfollowed user" }),
    ))
}

/// Batch-load user refs preserving input order
async fn load_user_refs(state: &AppState, ids: &[ObjectId]) -> Result<Vec<UserRef>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let users: HashMap<ObjectId, UserDoc> = state
        .mongo
        .collection::<UserDoc>(USER_COLLECTION)
        .await?
        .find_many(doc! { "_id": { "$in": ids.to_vec() } })
        .await?
        .into_iter()
        .filter_map(|u| u._id.map(|id| (id, u)))
        .collect();

    Ok(ids
        .iter()
        .filter_map(|id| users.get(id))
        .map(UserRef::from_doc)
        .collect())
}

async fn list_followers(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    authenticate(&state, &req).await?;
    let target = load_user(&state, parse_object_id(raw_id, "user")?).await?;
    let refs = load_user_refs(&state, &target.followers).await?;

    Ok(json_response(StatusCode::OK, &refs))
}

async fn list_following(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    authenticate(&state, &req).await?;
    let target = load_user(&state, parse_object_id(raw_id, "user")?).await?;
    let refs = load_user_refs(&state, &target.following).await?;

    Ok(json_response(StatusCode::OK, &refs))
}

async fn get_feed(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let params = parse_query_params(req.uri().query().unwrap_or(""));
    let limit: i64 = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, 100);

    let current = load_user(&state, user.id).await?;
    if current.following.is_empty() {
        return Ok(json_response(StatusCode::OK, &Vec::<ActivityResponse>::new()));
    }

    let activities = state
        .mongo
        .collection::<ActivityDoc>(ACTIVITY_COLLECTION)
        .await?
        .find_many_with(
            doc! { "user": { "$in": current.following.clone() } },
            FindOpts::sorted(doc! { "metadata.created_at": -1 }).with_limit(limit),
        )
        .await?;

    // Populate authors, target users, and books
    let mut user_ids: Vec<ObjectId> = activities.iter().map(|a| a.user).collect();
    user_ids.extend(activities.iter().filter_map(|a| a.target_user));
    let users: HashMap<ObjectId, UserDoc> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .mongo
            .collection::<UserDoc>(USER_COLLECTION)
            .await?
            .find_many(doc! { "_id": { "$in": user_ids } })
            .await?
            .into_iter()
            .filter_map(|u| u._id.map(|id| (id, u)))
            .collect()
    };

    let book_ids: Vec<ObjectId> = activities.iter().filter_map(|a| a.book).collect();
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

    let payload: Vec<ActivityResponse> = activities
        .iter()
        .map(|a| ActivityResponse {
            id: a._id.map(|id| id.to_hex()).unwrap_or_default(),
            kind: a.kind,
            user: users.get(&a.user).map(UserRef::from_doc),
            book: a.book.and_then(|id| {
                books.get(&id).map(|b| ActivityBookRef {
                    id: id.to_hex(),
                    title: b.title.clone(),
                })
            }),
            target_user: a
                .target_user
                .and_then(|id| users.get(&id).map(UserRef::from_doc)),
            created_at: format_time(a.metadata.created_at),
        })
        .collect();

    Ok(json_response(StatusCode::OK, &payload))
}

async fn search_users(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let params = parse_query_params(req.uri().query().unwrap_or(""));

    let query = params
        .get("q")
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| BookwormError::Validation("Search query is required".into()))?;

    let users = state
        .mongo
        .collection::<UserDoc>(USER_COLLECTION)
        .await?
        .find_many_with(
            doc! {
                "name": { "$regex": query, "$options": "i" },
                "_id": { "$ne": user.id },
            },
            FindOpts::default().with_limit(SEARCH_LIMIT),
        )
        .await?;

    let payload: Vec<UserRef> = users.iter().map(UserRef::from_doc).collect();
    Ok(json_response(StatusCode::OK, &payload))
}

async fn get_profile(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let target = load_user(&state, parse_object_id(raw_id, "user")?).await?;

    let response = ProfileResponse {
        id: target._id.map(|id| id.to_hex()).unwrap_or_default(),
        name: target.name.clone(),
        email: target.email.clone(),
        photo_url: target.photo_url.clone(),
        follower_count: target.followers.len(),
        following_count: target.following.len(),
        is_following: target.followers.contains(&user.id),
        created_at: format_time(target.metadata.created_at),
    };

    Ok(json_response(StatusCode::OK, &response))
}
