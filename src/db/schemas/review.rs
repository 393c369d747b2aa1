//! Review document schema
//!
//! Only `approved` reviews feed a book's aggregate rating.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for reviews
pub const REVIEW_COLLECTION: &str = "reviews";

/// Moderation status of a review
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewStatus> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }
}

/// Review document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReviewDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub book: ObjectId,

    pub user: ObjectId,

    /// 1-5, validated at the route boundary
    pub rating: i32,

    pub comment: String,

    #[serde(default)]
    pub status: ReviewStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_by: Option<ObjectId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<DateTime>,
}

impl ReviewDoc {
    pub fn new(book: ObjectId, user: ObjectId, rating: i32, comment: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            book,
            user,
            rating,
            comment,
            status: ReviewStatus::Pending,
            moderated_by: None,
            moderated_at: None,
        }
    }
}

impl IntoIndexes for ReviewDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "book": 1, "user": 1 },
                Some(
                    IndexOptions::builder()
                        .name("book_user_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for ReviewDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
