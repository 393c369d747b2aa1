//! Statistics aggregator
//!
//! Derives per-user reading metrics from a snapshot of library entries:
//! shelf counts, pages read, calendar-window completions, a 12-month
//! history, genre breakdowns, and the daily reading streak.
//!
//! Everything here is pure and deterministic over its inputs; callers pass
//! the clock in. All calendar windows are UTC. Store access happens in the
//! route layer, which either produces a full stats object or fails the
//! request.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::db::schemas::{LibraryEntryDoc, Shelf};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Number of genres reported in the breakdown
const GENRE_BREAKDOWN_LIMIT: usize = 6;

/// A library entry joined with its book's genre names
#[derive(Debug, Clone)]
pub struct EntryWithGenres {
    pub entry: LibraryEntryDoc,
    pub genres: Vec<String>,
}

/// Per-shelf entry counts
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShelfCounts {
    pub want_to_read: u32,
    pub currently_reading: u32,
    pub read: u32,
}

impl ShelfCounts {
    pub fn total(&self) -> u32 {
        self.want_to_read + self.currently_reading + self.read
    }
}

/// Basic library statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStats {
    pub total_books: u32,
    pub by_shelf: ShelfCounts,
    pub total_pages_read: i64,
    pub books_completed_this_year: u32,
    pub books_completed_this_month: u32,
    /// Mean of set personal ratings, one decimal; 0 when none are set
    pub average_rating: f64,
}

/// One month of the trailing 12-month completion history
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthBucket {
    pub month: &'static str,
    pub year: i32,
    pub count: u32,
}

/// One genre's share of the user's read books
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenreSlice {
    pub genre: String,
    pub count: u32,
    /// Integer percentage of all genre tallies
    pub percentage: u32,
}

/// Enhanced statistics for charts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedStats {
    pub monthly_books: Vec<MonthBucket>,
    pub genre_breakdown: Vec<GenreSlice>,
    pub reading_streak: u32,
    pub books_this_year: u32,
    pub total_pages: i64,
}

/// Count shelves, pages, calendar-window completions, and the personal
/// rating average over a user's full library.
pub fn basic_stats(entries: &[LibraryEntryDoc], now: DateTime<Utc>) -> BasicStats {
    let by_shelf = shelf_counts(entries);

    let total_pages_read = entries.iter().map(|e| e.progress.pages_read).sum();

    let books_completed_this_year = entries
        .iter()
        .filter_map(|e| e.date_finished)
        .filter(|d| d.to_chrono().year() == now.year())
        .count() as u32;

    let books_completed_this_month = entries
        .iter()
        .filter_map(|e| e.date_finished)
        .filter(|d| {
            let finished = d.to_chrono();
            finished.year() == now.year() && finished.month() == now.month()
        })
        .count() as u32;

    BasicStats {
        total_books: by_shelf.total(),
        by_shelf,
        total_pages_read,
        books_completed_this_year,
        books_completed_this_month,
        average_rating: average_personal_rating(entries),
    }
}

/// Per-shelf counts; their sum is the library size
pub fn shelf_counts(entries: &[LibraryEntryDoc]) -> ShelfCounts {
    let mut counts = ShelfCounts::default();
    for entry in entries {
        match entry.shelf {
            Shelf::WantToRead => counts.want_to_read += 1,
            Shelf::CurrentlyReading => counts.currently_reading += 1,
            Shelf::Read => counts.read += 1,
        }
    }
    counts
}

/// Mean of set personal ratings rounded to one decimal, 0 when none are set
pub fn average_personal_rating(entries: &[LibraryEntryDoc]) -> f64 {
    let ratings: Vec<i32> = entries.iter().filter_map(|e| e.personal_rating).collect();
    if ratings.is_empty() {
        return 0.0;
    }
    let mean = ratings.iter().sum::<i32>() as f64 / ratings.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Completions per month over the trailing 12 calendar months, oldest first.
///
/// Always returns exactly 12 buckets, ending with the current month.
pub fn monthly_history(entries: &[LibraryEntryDoc], now: DateTime<Utc>) -> Vec<MonthBucket> {
    // Tally read completions by (year, month0)
    let mut tallies: HashMap<(i32, u32), u32> = HashMap::new();
    for entry in entries.iter().filter(|e| e.shelf == Shelf::Read) {
        if let Some(finished) = entry.date_finished {
            let finished = finished.to_chrono();
            *tallies.entry((finished.year(), finished.month0())).or_insert(0) += 1;
        }
    }

    // Walk months as a flat index so year boundaries need no special casing
    let current = now.year() * 12 + now.month0() as i32;
    (0..12)
        .rev()
        .map(|back| {
            let index = current - back;
            let year = index.div_euclid(12);
            let month0 = index.rem_euclid(12) as u32;
            MonthBucket {
                month: MONTH_NAMES[month0 as usize],
                year,
                count: tallies.get(&(year, month0)).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Tally genres across read entries and return the top slices by count.
///
/// An entry with N genres contributes one tally to each of them. Percentage
/// is the integer-rounded share of all tallies. Ties break alphabetically.
pub fn genre_breakdown(entries: &[EntryWithGenres]) -> Vec<GenreSlice> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for item in entries.iter().filter(|e| e.entry.shelf == Shelf::Read) {
        for genre in &item.genres {
            *counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }

    let total: u32 = counts.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut slices: Vec<GenreSlice> = counts
        .into_iter()
        .map(|(genre, count)| GenreSlice {
            genre: genre.to_string(),
            count,
            percentage: ((count as f64 / total as f64) * 100.0).round() as u32,
        })
        .collect();

    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));
    slices.truncate(GENRE_BREAKDOWN_LIMIT);
    slices
}

/// Consecutive days, counting back from today, on which any library entry
/// was touched. Today not qualifying yields 0.
pub fn reading_streak(entries: &[LibraryEntryDoc], today: NaiveDate) -> u32 {
    let active_days: HashSet<NaiveDate> = entries
        .iter()
        .filter_map(|e| e.metadata.updated_at)
        .map(|d| d.to_chrono().date_naive())
        .collect();

    let mut streak = 0;
    let mut check = today;
    while active_days.contains(&check) {
        streak += 1;
        check -= Duration::days(1);
    }
    streak
}

/// Compose the chart-facing statistics from a joined snapshot
pub fn enhanced_stats(entries: &[EntryWithGenres], now: DateTime<Utc>) -> EnhancedStats {
    let raw: Vec<LibraryEntryDoc> = entries.iter().map(|e| e.entry.clone()).collect();

    let books_this_year = raw
        .iter()
        .filter(|e| e.shelf == Shelf::Read)
        .filter_map(|e| e.date_finished)
        .filter(|d| d.to_chrono().year() == now.year())
        .count() as u32;

    EnhancedStats {
        monthly_books: monthly_history(&raw, now),
        genre_breakdown: genre_breakdown(entries),
        reading_streak: reading_streak(&raw, now.date_naive()),
        books_this_year,
        total_pages: raw.iter().map(|e| e.progress.pages_read).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{Metadata, Progress};
    use bson::oid::ObjectId;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn entry(shelf: Shelf) -> LibraryEntryDoc {
        LibraryEntryDoc {
            _id: Some(ObjectId::new()),
            metadata: Metadata::default(),
            user: ObjectId::new(),
            book: ObjectId::new(),
            shelf,
            progress: Progress::default(),
            personal_rating: None,
            date_added: bson::DateTime::now(),
            date_finished: None,
        }
    }

    fn finished_on(mut e: LibraryEntryDoc, at: DateTime<Utc>) -> LibraryEntryDoc {
        e.shelf = Shelf::Read;
        e.date_finished = Some(bson::DateTime::from_chrono(at));
        e
    }

    fn touched_on(mut e: LibraryEntryDoc, at: DateTime<Utc>) -> LibraryEntryDoc {
        e.metadata.updated_at = Some(bson::DateTime::from_chrono(at));
        e
    }

    #[test]
    fn test_shelf_counts_sum_to_total() {
        let entries = vec![
            entry(Shelf::WantToRead),
            entry(Shelf::WantToRead),
            entry(Shelf::CurrentlyReading),
            entry(Shelf::Read),
            entry(Shelf::Read),
            entry(Shelf::Read),
        ];
        let stats = basic_stats(&entries, utc(2026, 8, 6));

        assert_eq!(stats.by_shelf.want_to_read, 2);
        assert_eq!(stats.by_shelf.currently_reading, 1);
        assert_eq!(stats.by_shelf.read, 3);
        assert_eq!(
            stats.by_shelf.want_to_read + stats.by_shelf.currently_reading + stats.by_shelf.read,
            stats.total_books
        );
    }

    #[test]
    fn test_total_pages_read_sums_all_shelves() {
        let mut a = entry(Shelf::CurrentlyReading);
        a.progress.pages_read = 120;
        let mut b = entry(Shelf::Read);
        b.progress.pages_read = 300;
        let stats = basic_stats(&[a, b], utc(2026, 8, 6));

        assert_eq!(stats.total_pages_read, 420);
    }

    #[test]
    fn test_average_rating_zero_when_none_set() {
        let entries = vec![entry(Shelf::Read), entry(Shelf::WantToRead)];
        assert_eq!(average_personal_rating(&entries), 0.0);
    }

    #[test]
    fn test_average_rating_rounds_to_one_decimal() {
        let mut a = entry(Shelf::Read);
        a.personal_rating = Some(3);
        let mut b = entry(Shelf::Read);
        b.personal_rating = Some(4);
        let mut c = entry(Shelf::Read);
        c.personal_rating = Some(4);
        // Unrated entries do not drag the mean down
        let d = entry(Shelf::Read);

        assert_eq!(average_personal_rating(&[a, b, c, d]), 3.7);
    }

    #[test]
    fn test_completions_by_calendar_window() {
        let now = utc(2026, 8, 6);
        let entries = vec![
            finished_on(entry(Shelf::Read), utc(2026, 8, 1)),  // this month
            finished_on(entry(Shelf::Read), utc(2026, 3, 15)), // this year
            finished_on(entry(Shelf::Read), utc(2025, 8, 20)), // last year
            entry(Shelf::Read),                                // no finish date
        ];
        let stats = basic_stats(&entries, now);

        assert_eq!(stats.books_completed_this_year, 2);
        assert_eq!(stats.books_completed_this_month, 1);
    }

    #[test]
    fn test_monthly_history_is_twelve_months_oldest_first() {
        let now = utc(2026, 8, 6);
        let entries = vec![
            finished_on(entry(Shelf::Read), utc(2026, 8, 2)),
            finished_on(entry(Shelf::Read), utc(2026, 8, 3)),
            finished_on(entry(Shelf::Read), utc(2025, 9, 10)), // oldest in window
            finished_on(entry(Shelf::Read), utc(2025, 8, 10)), // just outside
        ];
        let history = monthly_history(&entries, now);

        assert_eq!(history.len(), 12);
        assert_eq!(
            history[0],
            MonthBucket { month: "Sep", year: 2025, count: 1 }
        );
        assert_eq!(
            history[11],
            MonthBucket { month: "Aug", year: 2026, count: 2 }
        );
        // The month outside the window is not counted anywhere
        let total: u32 = history.iter().map(|b| b.count).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_monthly_history_crosses_year_boundary() {
        let history = monthly_history(&[], utc(2026, 2, 1));
        assert_eq!(history[0].month, "Mar");
        assert_eq!(history[0].year, 2025);
        assert_eq!(history[10].month, "Jan");
        assert_eq!(history[10].year, 2026);
        assert_eq!(history[11].month, "Feb");
        assert_eq!(history[11].year, 2026);
    }

    #[test]
    fn test_genre_breakdown_counts_and_percentages() {
        let with = |shelf, genres: &[&str]| EntryWithGenres {
            entry: entry(shelf),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        };
        let entries = vec![
            with(Shelf::Read, &["Fantasy", "Adventure"]),
            with(Shelf::Read, &["Fantasy"]),
            with(Shelf::Read, &["Science Fiction"]),
            // Not on the read shelf: ignored
            with(Shelf::CurrentlyReading, &["Romance"]),
        ];
        let breakdown = genre_breakdown(&entries);

        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].genre, "Fantasy");
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[0].percentage, 50);
        // Tie between Adventure and Science Fiction breaks alphabetically
        assert_eq!(breakdown[1].genre, "Adventure");
        assert_eq!(breakdown[2].genre, "Science Fiction");
        assert_eq!(breakdown[1].percentage, 25);
    }

    #[test]
    fn test_genre_breakdown_caps_at_six() {
        let entries: Vec<EntryWithGenres> = (0..8)
            .map(|i| EntryWithGenres {
                entry: entry(Shelf::Read),
                genres: vec![format!("Genre {i}")],
            })
            .collect();

        assert_eq!(genre_breakdown(&entries).len(), 6);
    }

    #[test]
    fn test_reading_streak_counts_consecutive_days() {
        let today = utc(2026, 8, 6);
        let entries = vec![
            touched_on(entry(Shelf::CurrentlyReading), utc(2026, 8, 6)),
            touched_on(entry(Shelf::Read), utc(2026, 8, 5)),
            // Gap on Aug 4, then more activity
            touched_on(entry(Shelf::Read), utc(2026, 8, 3)),
        ];

        assert_eq!(reading_streak(&entries, today.date_naive()), 2);
    }

    #[test]
    fn test_reading_streak_zero_without_activity_today() {
        let today = utc(2026, 8, 6);
        let entries = vec![touched_on(entry(Shelf::Read), utc(2026, 8, 5))];

        assert_eq!(reading_streak(&entries, today.date_naive()), 0);
    }

    #[test]
    fn test_enhanced_stats_composition() {
        let now = utc(2026, 8, 6);
        let mut read = finished_on(entry(Shelf::Read), utc(2026, 5, 1));
        read.progress.pages_read = 250;
        let entries = vec![EntryWithGenres {
            entry: read,
            genres: vec!["Fantasy".to_string()],
        }];
        let stats = enhanced_stats(&entries, now);

        assert_eq!(stats.books_this_year, 1);
        assert_eq!(stats.total_pages, 250);
        assert_eq!(stats.monthly_books.len(), 12);
        assert_eq!(stats.genre_breakdown[0].genre, "Fantasy");
        assert_eq!(stats.reading_streak, 0);
    }
}
