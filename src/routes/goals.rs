//! Reading goal endpoints
//!
//! - `GET /api/goals` - current year's goal with progress
//! - `POST /api/goals` - set or update a goal (upsert on (user, year))
//!
//! Progress counts read-shelf entries whose `date_finished` falls in the
//! goal year.

use bson::{doc, oid::ObjectId, DateTime};
use bytes::Bytes;
use chrono::{Datelike, TimeZone, Utc};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::authenticate;
use crate::db::schemas::{
    LibraryEntryDoc, ReadingGoalDoc, Shelf, LIBRARY_COLLECTION, READING_GOAL_COLLECTION,
};
use crate::routes::{error_response, json_response, read_json_body, respond};
use crate::server::AppState;
use crate::types::{BookwormError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResponse {
    pub id: String,
    pub year: i32,
    pub target_books: i32,
    pub current_books: u64,
    /// Integer percent of the target reached
    pub percentage: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetGoalRequest {
    pub target_books: i32,
    #[serde(default)]
    pub year: Option<i32>,
}

/// Dispatch /api/goals requests
pub async fn handle_goals_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let rest = path
        .strip_prefix("/api/goals")
        .unwrap_or("")
        .trim_matches('/');

    match (method, rest) {
        (Method::GET, "") => respond(get_goal(req, state).await),
        (Method::POST, "") => respond(set_goal(req, state).await),
        _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
    }
}

/// Count read-shelf entries finished within the given calendar year (UTC)
async fn books_read_in_year(state: &AppState, user: ObjectId, year: i32) -> Result<u64> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single();
    let (Some(start), Some(end)) = (start, end) else {
        return Err(BookwormError::Validation("Invalid goal year".into()));
    };

    state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?
        .count(doc! {
            "user": user,
            "shelf": Shelf::Read.as_str(),
            "date_finished": {
                "$gte": DateTime::from_chrono(start),
                "$lt": DateTime::from_chrono(end),
            },
        })
        .await
}

fn goal_response(goal: &ReadingGoalDoc, current_books: u64) -> GoalResponse {
    let percentage = if goal.target_books > 0 {
        ((current_books as f64 / goal.target_books as f64) * 100.0).round() as u64
    } else {
        0
    };

    GoalResponse {
        id: goal._id.map(|id| id.to_hex()).unwrap_or_default(),
        year: goal.year,
        target_books: goal.target_books,
        current_books,
        percentage,
    }
}

async fn get_goal(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let current_year = Utc::now().year();

    let goal = state
        .mongo
        .collection::<ReadingGoalDoc>(READING_GOAL_COLLECTION)
        .await?
        .find_one(doc! { "user": user.id, "year": current_year })
        .await?;

    let current_books = books_read_in_year(&state, user.id, current_year).await?;

    match goal {
        Some(goal) => Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({
                "success": true,
                "goal": goal_response(&goal, current_books),
            }),
        )),
        None => Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({
                "success": true,
                "goal": null,
                "currentBooks": current_books,
            }),
        )),
    }
}

async fn set_goal(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    let user = authenticate(&state, &req).await?;
    let body: SetGoalRequest = read_json_body(req).await?;

    if body.target_books < 1 {
        return Err(BookwormError::Validation(
            "Target must be at least 1 book".into(),
        ));
    }

    let year = body.year.unwrap_or_else(|| Utc::now().year());

    let goals_coll = state
        .mongo
        .collection::<ReadingGoalDoc>(READING_GOAL_COLLECTION)
        .await?;

    // Upsert on (user, year)
    let goal = match goals_coll
        .find_one(doc! { "user": user.id, "year": year })
        .await?
    {
        Some(mut existing) => {
            existing.target_books = body.target_books;
            goals_coll
                .replace_one(doc! { "_id": existing._id }, existing.clone())
                .await?;
            existing
        }
        None => {
            let mut goal = ReadingGoalDoc::new(user.id, year, body.target_books);
            goal._id = Some(goals_coll.insert_one(goal.clone()).await?);
            goal
        }
    };

    let current_books = books_read_in_year(&state, user.id, year).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "goal": goal_response(&goal, current_books),
        }),
    ))
}
