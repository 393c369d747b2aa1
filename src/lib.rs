//! Bookworm - social reading backend
//!
//! HTTP backend for a book-tracking application: users shelve books, track
//! reading progress, review and follow each other, and get personalized
//! recommendations derived from their library history.
//!
//! ## Components
//!
//! - **Server**: hyper HTTP service with per-resource route modules
//! - **Stats**: pure aggregation of shelf counts, streaks, and histories
//! - **Recommend**: genre-affinity ranking of unread catalog books
//! - **Rating**: per-book review aggregate, recomputed on every mutation
//! - **Db**: typed MongoDB collections with schema-declared indexes

pub mod auth;
pub mod config;
pub mod db;
pub mod rating;
pub mod recommend;
pub mod routes;
pub mod server;
pub mod stats;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{BookwormError, Result};
