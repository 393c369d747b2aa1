//! Recommendation engine
//!
//! Ranks unread catalog books for a user. With at least
//! [`PERSONALIZATION_THRESHOLD`] finished books the candidates are drawn
//! from the user's top genres at or above their own rating bar; newer users
//! fall back to global popularity. Either way a book already on any of the
//! user's shelves is never recommended.
//!
//! The selection predicates and ordering are pure functions over snapshots;
//! [`recommend_for_user`] performs the store reads and pushes the same
//! filter into the catalog query.

use bson::{doc, oid::ObjectId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::db::schemas::{
    BookDoc, GenreDoc, LibraryEntryDoc, Shelf, BOOK_COLLECTION, GENRE_COLLECTION,
    LIBRARY_COLLECTION,
};
use crate::db::FindOpts;
use crate::server::AppState;
use crate::stats::shelf_counts;
use crate::types::Result;

/// Minimum finished books before genre-based personalization activates
pub const PERSONALIZATION_THRESHOLD: usize = 3;

/// Number of favorite genres used for candidate filtering
pub const TOP_GENRE_COUNT: usize = 3;

/// Candidates may rate this far below the user's own average
pub const RATING_MARGIN: f64 = 0.5;

/// Assumed average when the user has not rated anything
pub const DEFAULT_AVERAGE_RATING: f64 = 4.0;

/// Reason attached to non-personalized results
const POPULAR_REASON: &str = "Popular on Bookworm";

/// A finished library entry reduced to what the engine needs
#[derive(Debug, Clone)]
pub struct ReadBook {
    pub book_id: ObjectId,
    pub personal_rating: Option<i32>,
    pub genre_ids: Vec<ObjectId>,
}

/// Shelf tallies returned alongside the recommendations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationStats {
    pub total_read: u32,
    pub currently_reading: u32,
    pub want_to_read: u32,
}

/// A ranked book with its human-readable reason
#[derive(Debug, Clone)]
pub struct RankedBook {
    pub book: BookDoc,
    pub reason: String,
}

/// Engine output: at most the configured limit of ranked books
#[derive(Debug, Clone)]
pub struct Recommendations {
    pub books: Vec<RankedBook>,
    pub stats: RecommendationStats,
}

/// The user's favorite genres: tally over finished books, count descending,
/// ties broken by id for a stable order.
pub fn top_genres(read: &[ReadBook]) -> Vec<ObjectId> {
    let mut counts: HashMap<ObjectId, u32> = HashMap::new();
    for book in read {
        for genre in &book.genre_ids {
            *counts.entry(*genre).or_insert(0) += 1;
        }
    }

    let mut genres: Vec<(ObjectId, u32)> = counts.into_iter().collect();
    genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    genres.truncate(TOP_GENRE_COUNT);
    genres.into_iter().map(|(id, _)| id).collect()
}

/// Mean of the user's positive personal ratings, or the default when the
/// user has rated nothing.
pub fn average_given_rating(read: &[ReadBook]) -> f64 {
    let ratings: Vec<i32> = read
        .iter()
        .filter_map(|b| b.personal_rating)
        .filter(|r| *r > 0)
        .collect();

    if ratings.is_empty() {
        DEFAULT_AVERAGE_RATING
    } else {
        ratings.iter().sum::<i32>() as f64 / ratings.len() as f64
    }
}

/// Whether a catalog book qualifies as a personalized candidate
pub fn matches_preferences(book: &BookDoc, top: &[ObjectId], min_average: f64) -> bool {
    book.genres.iter().any(|g| top.contains(g)) && book.ratings.average >= min_average
}

/// Popularity order: rating average descending, then shelved count
pub fn rank_by_popularity(books: &mut Vec<BookDoc>, exclude: &HashSet<ObjectId>, limit: usize) {
    books.retain(|b| b._id.map(|id| !exclude.contains(&id)).unwrap_or(false));
    books.sort_by(|a, b| {
        b.ratings
            .average
            .total_cmp(&a.ratings.average)
            .then_with(|| b.total_shelved.cmp(&a.total_shelved))
    });
    books.truncate(limit);
}

/// Reason string for one recommended book.
///
/// Personalized results name the book's primary genre when the user has
/// finished books sharing it; everything else gets the popularity phrase.
pub fn recommendation_reason(
    book: &BookDoc,
    genre_names: &HashMap<ObjectId, String>,
    read: &[ReadBook],
    personalized: bool,
) -> String {
    if !personalized {
        return POPULAR_REASON.to_string();
    }

    let Some(primary) = book.genres.first() else {
        return POPULAR_REASON.to_string();
    };

    let matched = read
        .iter()
        .filter(|r| r.genre_ids.contains(primary))
        .count();

    match (matched, genre_names.get(primary)) {
        (0, _) | (_, None) => POPULAR_REASON.to_string(),
        (n, Some(name)) => {
            let plural = if n > 1 { "s" } else { "" };
            format!("You've read {n} {name} book{plural}")
        }
    }
}

/// Produce recommendations for a user from their library and the catalog.
///
/// Store reads only; never mutates state. An empty catalog or an empty
/// candidate pool yields an empty list, not an error.
pub async fn recommend_for_user(state: &AppState, user_id: ObjectId) -> Result<Recommendations> {
    let limit = state.args.recommendation_limit as usize;

    let library_coll = state
        .mongo
        .collection::<LibraryEntryDoc>(LIBRARY_COLLECTION)
        .await?;
    let library = library_coll.find_many(doc! { "user": user_id }).await?;

    let owned_ids: HashSet<ObjectId> = library.iter().map(|e| e.book).collect();
    let owned_id_list: Vec<ObjectId> = owned_ids.iter().copied().collect();

    // Join finished entries with their books' genres
    let books_coll = state.mongo.collection::<BookDoc>(BOOK_COLLECTION).await?;
    let read_book_ids: Vec<ObjectId> = library
        .iter()
        .filter(|e| e.shelf == Shelf::Read)
        .map(|e| e.book)
        .collect();
    let read_books_by_id: HashMap<ObjectId, BookDoc> = if read_book_ids.is_empty() {
        HashMap::new()
    } else {
        books_coll
            .find_many(doc! { "_id": { "$in": read_book_ids.clone() } })
            .await?
            .into_iter()
            .filter_map(|b| b._id.map(|id| (id, b)))
            .collect()
    };

    let read: Vec<ReadBook> = library
        .iter()
        .filter(|e| e.shelf == Shelf::Read)
        .map(|e| ReadBook {
            book_id: e.book,
            personal_rating: e.personal_rating,
            genre_ids: read_books_by_id
                .get(&e.book)
                .map(|b| b.genres.clone())
                .unwrap_or_default(),
        })
        .collect();

    let personalized = read.len() >= PERSONALIZATION_THRESHOLD;

    let filter = if personalized {
        let top = top_genres(&read);
        let min_average = average_given_rating(&read) - RATING_MARGIN;
        doc! {
            "_id": { "$nin": owned_id_list.clone() },
            "genres": { "$in": top },
            "ratings.average": { "$gte": min_average },
        }
    } else {
        doc! { "_id": { "$nin": owned_id_list.clone() } }
    };

    let mut candidates = books_coll
        .find_many_with(
            filter,
            FindOpts::sorted(doc! { "ratings.average": -1, "total_shelved": -1 })
                .with_limit(limit as i64),
        )
        .await?;

    // Re-assert the ordering and the library exclusion locally
    rank_by_popularity(&mut candidates, &owned_ids, limit);

    // Names for each candidate's primary genre
    let primary_genres: Vec<ObjectId> = candidates
        .iter()
        .filter_map(|b| b.genres.first().copied())
        .collect();
    let genre_names: HashMap<ObjectId, String> = if primary_genres.is_empty() {
        HashMap::new()
    } else {
        state
            .mongo
            .collection::<GenreDoc>(GENRE_COLLECTION)
            .await?
            .find_many(doc! { "_id": { "$in": primary_genres } })
            .await?
            .into_iter()
            .filter_map(|g| g._id.map(|id| (id, g.name)))
            .collect()
    };

    let books = candidates
        .into_iter()
        .map(|book| {
            let reason = recommendation_reason(&book, &genre_names, &read, personalized);
            RankedBook { book, reason }
        })
        .collect();

    let counts = shelf_counts(&library);
    Ok(Recommendations {
        books,
        stats: RecommendationStats {
            total_read: counts.read,
            currently_reading: counts.currently_reading,
            want_to_read: counts.want_to_read,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Ratings;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 12])
    }

    fn read_book(genres: &[ObjectId], rating: Option<i32>) -> ReadBook {
        ReadBook {
            book_id: ObjectId::new(),
            personal_rating: rating,
            genre_ids: genres.to_vec(),
        }
    }

    fn catalog_book(id: ObjectId, genres: &[ObjectId], average: f64, shelved: i64) -> BookDoc {
        BookDoc {
            _id: Some(id),
            genres: genres.to_vec(),
            ratings: Ratings {
                average,
                count: 10,
            },
            total_shelved: shelved,
            ..Default::default()
        }
    }

    #[test]
    fn test_top_genres_by_count() {
        let fantasy = oid(1);
        let scifi = oid(2);
        let romance = oid(3);
        let horror = oid(4);
        let read = vec![
            read_book(&[fantasy], None),
            read_book(&[fantasy, romance], None),
            read_book(&[fantasy], None),
            read_book(&[scifi], None),
            read_book(&[scifi], None),
            read_book(&[horror], None),
        ];

        let top = top_genres(&read);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0], fantasy);
        assert_eq!(top[1], scifi);
        // Romance vs horror tie breaks on id
        assert_eq!(top[2], romance);
    }

    #[test]
    fn test_average_rating_defaults_without_ratings() {
        let read = vec![read_book(&[], None), read_book(&[], Some(0))];
        assert_eq!(average_given_rating(&read), DEFAULT_AVERAGE_RATING);
    }

    #[test]
    fn test_average_rating_over_positive_ratings() {
        let read = vec![
            read_book(&[], Some(5)),
            read_book(&[], Some(4)),
            read_book(&[], None),
        ];
        assert_eq!(average_given_rating(&read), 4.5);
    }

    #[test]
    fn test_matches_preferences_genre_and_rating_bar() {
        let fantasy = oid(1);
        let scifi = oid(2);
        let top = vec![fantasy];

        let in_genre = catalog_book(oid(10), &[fantasy], 4.2, 5);
        let off_genre = catalog_book(oid(11), &[scifi], 4.9, 5);
        let low_rated = catalog_book(oid(12), &[fantasy], 3.4, 5);

        assert!(matches_preferences(&in_genre, &top, 4.0));
        assert!(!matches_preferences(&off_genre, &top, 4.0));
        assert!(!matches_preferences(&low_rated, &top, 4.0));
    }

    #[test]
    fn test_fantasy_heavy_history_scenario() {
        // 4 finished books: Fantasy x3, SciFi x1, average given rating 4.5
        let fantasy = oid(1);
        let scifi = oid(2);
        let read = vec![
            read_book(&[fantasy], Some(5)),
            read_book(&[fantasy], Some(4)),
            read_book(&[fantasy], None),
            read_book(&[scifi], None),
        ];

        assert!(read.len() >= PERSONALIZATION_THRESHOLD);
        let top = top_genres(&read);
        assert_eq!(top[0], fantasy);

        let min_average = average_given_rating(&read) - RATING_MARGIN;
        assert_eq!(min_average, 4.0);

        let qualifying = catalog_book(oid(10), &[fantasy], 4.0, 3);
        let too_low = catalog_book(oid(11), &[fantasy], 3.9, 3);
        assert!(matches_preferences(&qualifying, &top, min_average));
        assert!(!matches_preferences(&too_low, &top, min_average));
    }

    #[test]
    fn test_rank_excludes_library_books() {
        let owned = oid(10);
        let mut books = vec![
            catalog_book(owned, &[], 5.0, 100),
            catalog_book(oid(11), &[], 4.0, 10),
        ];
        let exclude: HashSet<ObjectId> = [owned].into_iter().collect();

        rank_by_popularity(&mut books, &exclude, 18);

        assert_eq!(books.len(), 1);
        assert!(books.iter().all(|b| b._id != Some(owned)));
    }

    #[test]
    fn test_rank_orders_by_rating_then_shelved() {
        let mut books = vec![
            catalog_book(oid(10), &[], 4.0, 50),
            catalog_book(oid(11), &[], 4.8, 5),
            catalog_book(oid(12), &[], 4.0, 80),
        ];

        rank_by_popularity(&mut books, &HashSet::new(), 18);

        assert_eq!(books[0]._id, Some(oid(11)));
        assert_eq!(books[1]._id, Some(oid(12))); // 4.0 tie: more shelved first
        assert_eq!(books[2]._id, Some(oid(10)));
    }

    #[test]
    fn test_rank_caps_result_size() {
        let mut books: Vec<BookDoc> = (0..30)
            .map(|i| catalog_book(ObjectId::new(), &[], 4.0 + (i as f64) / 100.0, i))
            .collect();

        rank_by_popularity(&mut books, &HashSet::new(), 18);
        assert_eq!(books.len(), 18);
    }

    #[test]
    fn test_reason_names_primary_genre() {
        let fantasy = oid(1);
        let read = vec![
            read_book(&[fantasy], None),
            read_book(&[fantasy], None),
        ];
        let names: HashMap<ObjectId, String> =
            [(fantasy, "Fantasy".to_string())].into_iter().collect();
        let book = catalog_book(oid(10), &[fantasy], 4.5, 3);

        assert_eq!(
            recommendation_reason(&book, &names, &read, true),
            "You've read 2 Fantasy books"
        );
    }

    #[test]
    fn test_reason_singular_form() {
        let fantasy = oid(1);
        let read = vec![read_book(&[fantasy], None)];
        let names: HashMap<ObjectId, String> =
            [(fantasy, "Fantasy".to_string())].into_iter().collect();
        let book = catalog_book(oid(10), &[fantasy], 4.5, 3);

        assert_eq!(
            recommendation_reason(&book, &names, &read, true),
            "You've read 1 Fantasy book"
        );
    }

    #[test]
    fn test_reason_falls_back_to_popularity() {
        let fantasy = oid(1);
        let horror = oid(9);
        let read = vec![read_book(&[fantasy], None)];
        let names: HashMap<ObjectId, String> =
            [(horror, "Horror".to_string())].into_iter().collect();

        // Cold start
        let book = catalog_book(oid(10), &[fantasy], 4.5, 3);
        assert_eq!(
            recommendation_reason(&book, &names, &read, false),
            POPULAR_REASON
        );

        // Personalized but no finished book shares the primary genre
        let unshared = catalog_book(oid(11), &[horror], 4.5, 3);
        assert_eq!(
            recommendation_reason(&unshared, &names, &read, true),
            POPULAR_REASON
        );

        // No genres at all
        let bare = catalog_book(oid(12), &[], 4.5, 3);
        assert_eq!(
            recommendation_reason(&bare, &names, &read, true),
            POPULAR_REASON
        );
    }
}
