//! Reading goal document schema
//!
//! One goal per user per year.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for reading goals
pub const READING_GOAL_COLLECTION: &str = "reading_goals";

/// Reading goal document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReadingGoalDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user: ObjectId,

    pub year: i32,

    /// Must be at least 1
    pub target_books: i32,
}

impl ReadingGoalDoc {
    pub fn new(user: ObjectId, year: i32, target_books: i32) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user,
            year,
            target_books,
        }
    }
}

impl IntoIndexes for ReadingGoalDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user": 1, "year": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_year_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ReadingGoalDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
