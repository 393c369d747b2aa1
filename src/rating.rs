//! Book rating aggregation
//!
//! A book's `ratings.average`/`ratings.count` pair is derived exclusively
//! from its approved reviews. Every review mutation (create, edit,
//! moderation, delete) funnels through [`RatingAggregator::recompute`], a
//! single idempotent read-recompute-write operation serialized per book so
//! concurrent review writes on the same book cannot interleave the
//! recompute itself. Ordering across different books is unconstrained.

use bson::{doc, oid::ObjectId, DateTime};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::db::schemas::{BookDoc, Ratings, ReviewDoc, BOOK_COLLECTION, REVIEW_COLLECTION};
use crate::db::MongoClient;
use crate::types::Result;

/// Recomputes and persists per-book rating aggregates
#[derive(Default)]
pub struct RatingAggregator {
    locks: DashMap<ObjectId, Arc<Mutex<()>>>,
}

impl RatingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute a book's aggregate from its currently-approved reviews and
    /// write it back. Returns the stored aggregate.
    pub async fn recompute(&self, mongo: &MongoClient, book_id: ObjectId) -> Result<Ratings> {
        let lock = self
            .locks
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let reviews = mongo
            .collection::<ReviewDoc>(REVIEW_COLLECTION)
            .await?
            .find_many(doc! { "book": book_id, "status": "approved" })
            .await?;

        let ratings = aggregate(&reviews.iter().map(|r| r.rating).collect::<Vec<_>>());

        mongo
            .collection::<BookDoc>(BOOK_COLLECTION)
            .await?
            .update_one(
                doc! { "_id": book_id },
                doc! {
                    "$set": {
                        "ratings.average": ratings.average,
                        "ratings.count": ratings.count,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        debug!(
            book = %book_id,
            average = ratings.average,
            count = ratings.count,
            "Recomputed book rating"
        );

        Ok(ratings)
    }
}

/// Mean of the given ratings; a book with no approved reviews reads 0
pub fn aggregate(ratings: &[i32]) -> Ratings {
    if ratings.is_empty() {
        return Ratings {
            average: 0.0,
            count: 0,
        };
    }

    Ratings {
        average: ratings.iter().sum::<i32>() as f64 / ratings.len() as f64,
        count: ratings.len() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_empty_is_zero() {
        let ratings = aggregate(&[]);
        assert_eq!(ratings.average, 0.0);
        assert_eq!(ratings.count, 0);
    }

    #[test]
    fn test_aggregate_mean() {
        let ratings = aggregate(&[5, 4, 3]);
        assert_eq!(ratings.average, 4.0);
        assert_eq!(ratings.count, 3);
    }

    #[test]
    fn test_aggregate_fractional_mean() {
        let ratings = aggregate(&[5, 4]);
        assert_eq!(ratings.average, 4.5);
        assert_eq!(ratings.count, 2);
    }

    #[test]
    fn test_aggregate_tracks_operation_sequences() {
        // create(5), create(3) approved, then one deleted, then edited
        let after_creates = aggregate(&[5, 3]);
        assert_eq!(after_creates.average, 4.0);

        let after_delete = aggregate(&[5]);
        assert_eq!(after_delete.average, 5.0);

        let after_edit = aggregate(&[4]);
        assert_eq!(after_edit.average, 4.0);

        // Rejecting the last review empties the approved set
        let after_reject = aggregate(&[]);
        assert_eq!(after_reject.average, 0.0);
        assert_eq!(after_reject.count, 0);
    }
}
