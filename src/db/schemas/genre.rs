//! Genre document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for genres
pub const GENRE_COLLECTION: &str = "genres";

/// Genre document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GenreDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectId>,
}

impl GenreDoc {
    pub fn new(name: String, description: Option<String>, created_by: Option<ObjectId>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            description,
            created_by,
        }
    }
}

impl IntoIndexes for GenreDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("name_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for GenreDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
