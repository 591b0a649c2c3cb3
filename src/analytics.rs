//! Pure mood analytics: day bucketing, streak calculation and windowed
//! aggregation.
//!
//! Every function here is a pure function of `(entries, now, tz)`. The
//! evaluation instant and the time zone are explicit parameters — nothing in
//! this module reads the system clock or the process-local zone, so results
//! are reproducible and the functions are safe to call concurrently. Day
//! boundaries follow the injected IANA zone (normally the user's stored
//! profile zone); a server in UTC and a user in UTC-8 therefore agree on
//! which calendar day an entry belongs to.
//!
//! Preconditions: callers validate entries at the write path. Every
//! `mood_level` is in `1..=5` and every `created_at` is a valid instant by
//! the time it reaches this module.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::entry::MoodEntry;

/// Calendar date of `instant` in `tz`. Two instants get equal day keys iff
/// they fall on the same local calendar day.
pub fn day_key(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Parse a stored IANA zone name, falling back to UTC for anything
/// unrecognized.
pub fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::UTC)
}

/// Count of consecutive calendar days with at least one entry, ending today
/// or yesterday. A streak whose most recent day is older than yesterday is
/// not current and counts as 0. Multiple entries on one day count once.
pub fn compute_streak(entries: &[MoodEntry], now: DateTime<Utc>, tz: Tz) -> u32 {
    if entries.is_empty() {
        return 0;
    }

    let days: BTreeSet<NaiveDate> = entries.iter().map(|e| day_key(e.created_at, tz)).collect();

    let today = day_key(now, tz);
    let yesterday = today - Duration::days(1);

    let start = if days.contains(&today) {
        today
    } else if days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0u32;
    let mut cursor = start;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

/// Aggregation window: the trailing `Days(n)` from the evaluation instant
/// (inclusive), or every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Days(i64),
    All,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AggregateStats {
    /// Mean mood level rounded to one decimal. `None` when the window is
    /// empty — never reported as 0.
    pub average_mood: Option<f64>,
    /// Most frequent mood level in the window; on equal counts the lowest
    /// level wins.
    pub modal_mood: Option<i32>,
    pub entry_count: usize,
}

/// Windowed summary statistics. The window is measured in trailing time from
/// `now`, so no zone is involved; day-level bucketing lives in
/// [`daily_trend`].
pub fn aggregate(entries: &[MoodEntry], window: Window, now: DateTime<Utc>) -> AggregateStats {
    let cutoff = match window {
        Window::Days(n) => Some(now - Duration::days(n)),
        Window::All => None,
    };

    let mut sum = 0i64;
    let mut count = 0usize;
    // Index 0 unused; levels are 1..=5.
    let mut level_counts = [0usize; 6];

    for entry in entries {
        if let Some(cutoff) = cutoff {
            if entry.created_at < cutoff {
                continue;
            }
        }
        sum += entry.mood_level as i64;
        count += 1;
        if (1..=5).contains(&entry.mood_level) {
            level_counts[entry.mood_level as usize] += 1;
        }
    }

    let average_mood = if count > 0 {
        Some(round_one_decimal(sum as f64 / count as f64))
    } else {
        None
    };

    let mut modal_mood = None;
    let mut best = 0usize;
    for level in 1..=5 {
        // Strict comparison keeps the lowest level on ties.
        if level_counts[level] > best {
            best = level_counts[level];
            modal_mood = Some(level as i32);
        }
    }

    AggregateStats {
        average_mood,
        modal_mood,
        entry_count: count,
    }
}

/// One chart bucket: a local calendar day and the mean mood of its entries.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// `None` when no entries fall on the day (rendered as a gap, not 0).
    pub average_mood: Option<f64>,
    pub entry_count: usize,
}

/// Per-day mean mood for the trailing `days` calendar days ending today, in
/// chronological order. Always exactly `days` buckets, however sparse the
/// entries.
pub fn daily_trend(entries: &[MoodEntry], days: i64, now: DateTime<Utc>, tz: Tz) -> Vec<TrendPoint> {
    let today = day_key(now, tz);

    let mut by_day: HashMap<NaiveDate, (i64, usize)> = HashMap::new();
    for entry in entries {
        let day = day_key(entry.created_at, tz);
        let slot = by_day.entry(day).or_insert((0, 0));
        slot.0 += entry.mood_level as i64;
        slot.1 += 1;
    }

    (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            match by_day.get(&date) {
                Some(&(sum, n)) if n > 0 => TrendPoint {
                    date,
                    average_mood: Some(round_one_decimal(sum as f64 / n as f64)),
                    entry_count: n,
                },
                _ => TrendPoint {
                    date,
                    average_mood: None,
                    entry_count: 0,
                },
            }
        })
        .collect()
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
