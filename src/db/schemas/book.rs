//! Book catalog document schema
//!
//! `ratings` and `total_shelved` are derived aggregates: the rating pair is
//! written only by the rating recompute operation, the shelving counter only
//! by library entry lifecycle events.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for books
pub const BOOK_COLLECTION: &str = "books";

/// Aggregate rating derived from approved reviews
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Ratings {
    #[serde(default)]
    pub average: f64,

    #[serde(default)]
    pub count: i64,
}

/// Book document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BookDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    pub author: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    /// Open Library identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub olid: Option<String>,

    /// Open Library cover image id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,

    /// Genre references
    #[serde(default)]
    pub genres: Vec<ObjectId>,

    /// Derived from approved reviews, never user-writable
    #[serde(default)]
    pub ratings: Ratings,

    /// Number of library entries referencing this book
    #[serde(default)]
    pub total_shelved: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectId>,
}

impl BookDoc {
    pub fn new(title: String, author: String, created_by: Option<ObjectId>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            title,
            author,
            created_by,
            ..Default::default()
        }
    }
}

impl IntoIndexes for BookDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Text index for title/author search
            (
                doc! { "title": "text", "author": "text" },
                Some(
                    IndexOptions::builder()
                        .name("title_author_text".to_string())
                        .build(),
                ),
            ),
            // Index on genres for recommendation candidate queries
            (
                doc! { "genres": 1 },
                Some(IndexOptions::builder().name("genres_index".to_string()).build()),
            ),
            // Popularity sort (rating average desc, total shelved desc)
            (
                doc! { "ratings.average": -1, "total_shelved": -1 },
                Some(
                    IndexOptions::builder()
                        .name("popularity_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for BookDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
