//! MongoDB access layer
//!
//! Typed client and collection wrappers plus the document schemas for every
//! Bookworm collection.

pub mod mongo;
pub mod schemas;

pub use mongo::{FindOpts, IntoIndexes, MongoClient, MongoCollection, MutMetadata};
