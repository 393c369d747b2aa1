//! Tutorial document schema
//!
//! Admin-curated help articles. `category` is free text.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for tutorials
pub const TUTORIAL_COLLECTION: &str = "tutorials";

/// Publication state of a tutorial
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TutorialStatus {
    #[default]
    Draft,
    Published,
}

impl TutorialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TutorialStatus::Draft => "draft",
            TutorialStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<TutorialStatus> {
        match s {
            "draft" => Some(TutorialStatus::Draft),
            "published" => Some(TutorialStatus::Published),
            _ => None,
        }
    }
}

/// Tutorial document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TutorialDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    pub description: String,

    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub status: TutorialStatus,

    pub author: ObjectId,

    #[serde(default)]
    pub views: i64,
}

fn default_category() -> String {
    "Getting Started".to_string()
}

impl TutorialDoc {
    pub fn new(title: String, description: String, content: String, author: ObjectId) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            title,
            description,
            content,
            video_url: None,
            category: default_category(),
            status: TutorialStatus::Draft,
            author,
            views: 0,
        }
    }
}

impl IntoIndexes for TutorialDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "status": 1, "category": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_category_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "title": "text", "content": "text" },
                Some(
                    IndexOptions::builder()
                        .name("title_content_text".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for TutorialDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
