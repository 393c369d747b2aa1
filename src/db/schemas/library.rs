//! Library entry document schema
//!
//! One record per (user, book) pair. Shelf and progress transitions live
//! here so every call site applies the same rules:
//! - `percentage` is derived from pages, never authoritative on its own
//! - reaching 100% moves the entry to the `read` shelf
//! - `date_finished` is set the first time the entry becomes `read` and is
//!   never overwritten or cleared afterwards

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for library entries
pub const LIBRARY_COLLECTION: &str = "library";

/// Reading-state bucket of a library entry
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Shelf {
    #[default]
    WantToRead,
    CurrentlyReading,
    Read,
}

impl Shelf {
    /// Wire name, as stored in MongoDB and used in query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Shelf::WantToRead => "wantToRead",
            Shelf::CurrentlyReading => "currentlyReading",
            Shelf::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Shelf> {
        match s {
            "wantToRead" => Some(Shelf::WantToRead),
            "currentlyReading" => Some(Shelf::CurrentlyReading),
            "read" => Some(Shelf::Read),
            _ => None,
        }
    }
}

/// Page progress within a book
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Progress {
    #[serde(default)]
    pub pages_read: i64,

    #[serde(default)]
    pub total_pages: i64,

    /// Derived: round(pages_read / total_pages * 100), clamped to 0..=100
    #[serde(default)]
    pub percentage: i32,
}

/// Library entry document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LibraryEntryDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user: ObjectId,

    pub book: ObjectId,

    pub shelf: Shelf,

    #[serde(default)]
    pub progress: Progress,

    /// The user's own 1-5 rating of this book (distinct from public reviews)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_rating: Option<i32>,

    /// Set at creation, immutable thereafter
    pub date_added: DateTime,

    /// Set once, the first time the shelf becomes `read`; never cleared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_finished: Option<DateTime>,
}

impl LibraryEntryDoc {
    pub fn new(user: ObjectId, book: ObjectId, shelf: Shelf, total_pages: Option<i64>) -> Self {
        let mut entry = Self {
            _id: None,
            metadata: Metadata::new(),
            user,
            book,
            shelf: Shelf::WantToRead,
            progress: Progress {
                pages_read: 0,
                total_pages: total_pages.unwrap_or(0),
                percentage: 0,
            },
            personal_rating: None,
            date_added: DateTime::now(),
            date_finished: None,
        };
        entry.set_shelf(shelf);
        entry
    }

    /// Move the entry to a shelf. Re-setting the current shelf is a no-op
    /// beyond the `date_finished` set-once rule.
    pub fn set_shelf(&mut self, shelf: Shelf) {
        self.shelf = shelf;
        if shelf == Shelf::Read && self.date_finished.is_none() {
            self.date_finished = Some(DateTime::now());
        }
    }

    /// Record pages read, recompute the derived percentage, and complete the
    /// entry when the book is finished.
    pub fn set_pages_read(&mut self, pages_read: i64) {
        self.progress.pages_read = pages_read.max(0);
        if self.progress.total_pages > 0 {
            let pct =
                (self.progress.pages_read as f64 / self.progress.total_pages as f64) * 100.0;
            self.progress.percentage = (pct.round() as i32).clamp(0, 100);
        }
        if self.progress.percentage >= 100 && self.progress.total_pages > 0 {
            self.set_shelf(Shelf::Read);
        }
    }
}

impl IntoIndexes for LibraryEntryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // At most one entry per (user, book) pair
            (
                doc! { "user": 1, "book": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_book_unique".to_string())
                        .build(),
                ),
            ),
            // Shelf listings sorted by recency
            (
                doc! { "user": 1, "shelf": 1, "date_added": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_shelf_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LibraryEntryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LibraryEntryDoc {
        LibraryEntryDoc::new(ObjectId::new(), ObjectId::new(), Shelf::WantToRead, Some(100))
    }

    #[test]
    fn test_new_entry_has_no_finish_date() {
        let e = entry();
        assert_eq!(e.shelf, Shelf::WantToRead);
        assert!(e.date_finished.is_none());
        assert_eq!(e.progress.total_pages, 100);
        assert_eq!(e.progress.percentage, 0);
    }

    #[test]
    fn test_created_on_read_shelf_sets_finish_date() {
        let e = LibraryEntryDoc::new(ObjectId::new(), ObjectId::new(), Shelf::Read, None);
        assert_eq!(e.shelf, Shelf::Read);
        assert!(e.date_finished.is_some());
    }

    #[test]
    fn test_finishing_all_pages_completes_entry() {
        let mut e = entry();
        e.set_pages_read(100);
        assert_eq!(e.progress.percentage, 100);
        assert_eq!(e.shelf, Shelf::Read);
        assert!(e.date_finished.is_some());
    }

    #[test]
    fn test_percentage_rounding_and_clamp() {
        let mut e = entry();
        e.set_pages_read(33);
        assert_eq!(e.progress.percentage, 33);
        e.set_pages_read(995);
        assert_eq!(e.progress.percentage, 100);
        e.set_pages_read(-5);
        assert_eq!(e.progress.pages_read, 0);
    }

    #[test]
    fn test_no_completion_without_total_pages() {
        let mut e = LibraryEntryDoc::new(ObjectId::new(), ObjectId::new(), Shelf::WantToRead, None);
        e.set_pages_read(250);
        // Unknown total: percentage stays derived at 0, no auto-transition
        assert_eq!(e.progress.percentage, 0);
        assert_eq!(e.shelf, Shelf::WantToRead);
        assert!(e.date_finished.is_none());
    }

    #[test]
    fn test_date_finished_set_once() {
        let mut e = entry();
        e.set_shelf(Shelf::Read);
        let first = e.date_finished;
        assert!(first.is_some());

        // Moving off and back onto the read shelf keeps the original date
        e.set_shelf(Shelf::CurrentlyReading);
        assert_eq!(e.date_finished, first);
        e.set_shelf(Shelf::Read);
        assert_eq!(e.date_finished, first);
    }

    #[test]
    fn test_same_shelf_twice_is_idempotent() {
        let mut e = entry();
        e.set_shelf(Shelf::Read);
        let snapshot = (e.shelf, e.date_finished, e.progress.percentage);
        e.set_shelf(Shelf::Read);
        assert_eq!(snapshot, (e.shelf, e.date_finished, e.progress.percentage));
    }

    #[test]
    fn test_shelf_wire_names_round_trip() {
        for shelf in [Shelf::WantToRead, Shelf::CurrentlyReading, Shelf::Read] {
            assert_eq!(Shelf::parse(shelf.as_str()), Some(shelf));
        }
        assert_eq!(Shelf::parse("finished"), None);
    }
}
