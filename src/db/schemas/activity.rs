//! Activity document schema
//!
//! Social events consumed by the follower feed.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for activities
pub const ACTIVITY_COLLECTION: &str = "activities";

/// Kind of social event
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    #[default]
    AddedBook,
    ReviewedBook,
    UpdatedProgress,
    FollowedUser,
}

/// Activity document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ActivityDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user: ObjectId,

    pub kind: ActivityKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<ObjectId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user: Option<ObjectId>,
}

impl ActivityDoc {
    pub fn new(user: ObjectId, kind: ActivityKind) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user,
            kind,
            book: None,
            target_user: None,
        }
    }

    pub fn with_book(mut self, book: ObjectId) -> Self {
        self.book = Some(book);
        self
    }

    pub fn with_target_user(mut self, target: ObjectId) -> Self {
        self.target_user = Some(target);
        self
    }
}

impl IntoIndexes for ActivityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Feed queries: activities by author, newest first
            (
                doc! { "user": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_created_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("created_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ActivityDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
