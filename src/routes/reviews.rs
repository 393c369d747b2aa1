//! Review endpoints
//!
//! - `GET /api/reviews[?status=&bookId=]` - list (admins may filter status)
//! - `POST /api/reviews` - create, one per (book, user)
//! - `PUT /api/reviews/{id}` - edit own review
//! - `PUT /api/reviews/{id}/status` - moderate (admin)
//! - `DELETE /api/reviews/{id}` - delete own review (admins: any)
//!
//! Every mutation ends with the per-book rating recompute, so the book's
//! aggregate always equals the mean of its currently-approved reviews.

use bson::{doc, oid::ObjectId, DateTime};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{authenticate, require_admin};
use crate::db::schemas::{
    ActivityDoc, ActivityKind, BookDoc, ReviewDoc, ReviewStatus, UserDoc, ACTIVITY_COLLECTION,
    BOOK_COLLECTION, REVIEW_COLLECTION, USER_COLLECTION,
};
use crate::db::FindOpts;
use crate::routes::{
    error_response, format_time, json_response, parse_object_id, parse_query_params,
    read_json_body, respond, UserRef,
};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

/// Book reference embedded in review payloads
#[derive(Debug, Serialize)]
pub struct BookRef {
    pub id: String,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub rating: i32,
    pub comment: String,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<String>,
}

impl ReviewResponse {
    fn from_doc(
        doc: &ReviewDoc,
        users: &HashMap<ObjectId, UserDoc>,
        books: &HashMap<ObjectId, BookDoc>,
    ) -> Self {
        Self {
            id: doc._id.map(|id| id.to_hex()).unwrap_or_default(),
            rating: doc.rating,
            comment: doc.comment.clone(),
            status: doc.status,
            user: users.get(&doc.user).map(UserRef::from_doc),
            book: books.get(&doc.book).and_then(|b| {
                b._id.map(|id| BookRef {
                    id: id.to_hex(),
                    title: b.title.clone(),
                    author: b.author.clone(),
                })
            }),
            created_at: format_time(doc.metadata.created_at),
            moderated_at: format_time(doc.moderated_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub book_id: String,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct EditReviewRequest {
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub status: String,
}

fn validate_rating(rating: i32) -> Result<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(BookwormError::Validation("Rating must be between 1 and 5".into()))
    }
}

/// Dispatch /api/reviews requests
pub async fn handle_reviews_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/reviews")
        .unwrap_or("")
        .trim_matches('/')
        .to_string();

    match (method, rest.as_str()) {
        (Method::GET, "") => respond(list_reviews(req, state).await),
        (Method::POST, "") => respond(create_review(req, state).await),
        (Method::PUT, p) if p.ends_with("/status") => {
            let id = p.trim_end_matches("/status").trim_matches('/').to_string();
            respond(moderate_review(req, state, &id).await)
        }
        (Method::PUT, id) => {
            let id = id.to_string();
            respond(edit_review(req, state, &id).await)
        }
        (Method::DELETE, id) => {
            let id = id.to_string();
            respond(delete_review(req, state, &id).await)
        }
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

/// Batch-load the users and books referenced by a set of reviews
async fn populate_refs(
    state: &AppState,
    reviews: &[ReviewDoc],
) -> Result<(HashMap<ObjectId, UserDoc>, HashMap<ObjectId, BookDoc>)> {
    let user_ids: Vec<ObjectId> = reviews.iter().map(|r| r.user).collect();
    let book_ids: Vec<ObjectId> = reviews.iter().map(|r| r.book).collect();

    let users = if user_ids.is_empty() {
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

    let books = if book_ids.is_empty() {
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

    Ok((users, books))
}

async fn list_reviews(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let params = parse_query_params(req.uri().query().unwrap_or(""));

    let mut filter = doc! {};

    // Admins may filter by status; everyone else sees approved reviews only
    if user.is_admin() {
        if let Some(status) = params.get("status") {
            let status = ReviewStatus::parse(status)
                .ok_or_else(|| BookwormError::Validation("Invalid status".into()))?;
            filter.insert("status", status.as_str());
        }
    } else {
        filter.insert("status", ReviewStatus::Approved.as_str());
    }

    if let Some(book_id) = params.get("bookId") {
        filter.insert("book", parse_object_id(book_id, "book")?);
    }

    let reviews = state
        .mongo
        .collection::<ReviewDoc>(REVIEW_COLLECTION)
        .await?
        .find_many_with(filter, FindOpts::sorted(doc! { "metadata.created_at": -1 }))
        .await?;

    let (users, books) = populate_refs(&state, &reviews).await?;
    let payload: Vec<ReviewResponse> = reviews
        .iter()
        .map(|r| ReviewResponse::from_doc(r, &users, &books))
        .collect();

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "reviews": payload,
            "count": payload.len(),
        }),
    ))
}

async fn create_review(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let body: CreateReviewRequest = read_json_body(req).await?;

    validate_rating(body.rating)?;
    if body.comment.trim().is_empty() {
        return Err(BookwormError::Validation("Comment is required".into()));
    }

    let book_id = parse_object_id(&body.book_id, "book")?;
    let books_coll = state.mongo.collection::<BookDoc>(BOOK_COLLECTION).await?;
    if books_coll.find_one(doc! { "_id": book_id }).await?.is_none() {
        return Err(BookwormError::NotFound("Book".into()));
    }

    let reviews_coll = state.mongo.collection::<ReviewDoc>(REVIEW_COLLECTION).await?;
    if reviews_coll
        .find_one(doc! { "book": book_id, "user": user.id })
        .await?
        .is_some()
    {
        return Err(BookwormError::Validation(
            "You already reviewed this book".into(),
        ));
    }

    let review = ReviewDoc::new(book_id, user.id, body.rating, body.comment.trim().to_string());
    let review_id = reviews_coll.insert_one(review).await?;

    state.ratings.recompute(&state.mongo, book_id).await?;

    state
        .mongo
        .collection::<ActivityDoc>(ACTIVITY_COLLECTION)
        .await?
        .insert_one(ActivityDoc::new(user.id, ActivityKind::ReviewedBook).with_book(book_id))
        .await?;

    let created = reviews_coll
        .find_one(doc! { "_id": review_id })
        .await?
        .ok_or_else(|| BookwormError::Database("Created review not readable".into()))?;
    let (users, books) = populate_refs(&state, std::slice::from_ref(&created)).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "success": true,
            "review": ReviewResponse::from_doc(&created, &users, &books),
        }),
    ))
}

async fn edit_review(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let id = parse_object_id(raw_id, "review")?;
    let body: EditReviewRequest = read_json_body(req).await?;

    validate_rating(body.rating)?;

    let reviews_coll = state.mongo.collection::<ReviewDoc>(REVIEW_COLLECTION).await?;
    let mut review = reviews_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Review".into()))?;

    // Only the author can edit
    if review.user != user.id {
        return Err(BookwormError::Forbidden("Not authorized".into()));
    }

    review.rating = body.rating;
    review.comment = body.comment;

    reviews_coll.replace_one(doc! { "_id": id }, review.clone()).await?;

    state.ratings.recompute(&state.mongo, review.book).await?;

    let (users, books) = populate_refs(&state, std::slice::from_ref(&review)).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "review": ReviewResponse::from_doc(&review, &users, &books),
            "message": "Review updated successfully",
        }),
    ))
}

async fn moderate_review(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    require_admin(&user)?;

    let id = parse_object_id(raw_id, "review")?;
    let body: ModerateRequest = read_json_body(req).await?;

    let status = ReviewStatus::parse(&body.status)
        .ok_or_else(|| BookwormError::Validation("Invalid status".into()))?;

    let reviews_coll = state.mongo.collection::<ReviewDoc>(REVIEW_COLLECTION).await?;
    let mut review = reviews_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Review".into()))?;

    review.status = status;
    review.moderated_by = Some(user.id);
    review.moderated_at = Some(DateTime::now());

    reviews_coll.replace_one(doc! { "_id": id }, review.clone()).await?;

    state.ratings.recompute(&state.mongo, review.book).await?;

    let (users, books) = populate_refs(&state, std::slice::from_ref(&review)).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "review": ReviewResponse::from_doc(&review, &users, &books),
        }),
    ))
}

async fn delete_review(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let id = parse_object_id(raw_id, "review")?;

    let reviews_coll = state.mongo.collection::<ReviewDoc>(REVIEW_COLLECTION).await?;
    let review = reviews_coll
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| BookwormError::NotFound("Review".into()))?;

    // Authors delete their own reviews; admins delete any
    if review.user != user.id && !user.is_admin() {
        return Err(BookwormError::Forbidden("Not authorized".into()));
    }

    reviews_coll.delete_one(doc! { "_id": id }).await?;

    state.ratings.recompute(&state.mongo, review.book).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "success": true, "message": "Review deleted" }),
    ))
}
