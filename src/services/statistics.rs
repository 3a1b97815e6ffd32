// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Statistics over the completed-entry history.
//!
//! Pure functions: chart series grouped by UTC day and the stat card summary.
//! Trip counts use the raw `location` field while the poop/pee split and
//! `most_common_location` treat auto-mode walks as outside. The two rules
//! disagree for auto walks recorded as inside; that is kept as-is.

use crate::models::stats::NO_LOCATION;
use crate::models::{Entry, EntryStats, Location, PoopPeeDay, TopWalker, TripsDay};
use crate::time_utils::norwegian_day_label;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Walks shorter than this don't count towards the walker leaderboard.
const MIN_COUNTED_WALK_MINUTES: f64 = 3.0;
const TOP_WALKER_LIMIT: usize = 5;

#[derive(Default)]
struct DailyToilet {
    outside_poops: u32,
    outside_pees: u32,
    inside_poops: u32,
    inside_pees: u32,
}

/// Per-day poops and pees, split into outside and inside.
///
/// Days without entries are omitted. Output is sorted by date ascending.
pub fn process_entries_for_poop_pee_chart(entries: &[Entry]) -> Vec<PoopPeeDay> {
    let mut daily: BTreeMap<NaiveDate, DailyToilet> = BTreeMap::new();

    for entry in entries {
        let day = daily.entry(entry.date()).or_default();
        if entry.effective_location() == Location::Outside {
            day.outside_poops += entry.poop_count();
            day.outside_pees += entry.pee_count();
        } else {
            day.inside_poops += entry.poop_count();
            day.inside_pees += entry.pee_count();
        }
    }

    daily
        .into_iter()
        .map(|(date, day)| PoopPeeDay {
            date: date.format("%Y-%m-%d").to_string(),
            display_date: norwegian_day_label(date),
            outside_poops: day.outside_poops,
            outside_pees: day.outside_pees,
            inside_poops: day.inside_poops,
            inside_pees: day.inside_pees,
        })
        .collect()
}

/// Per-day count of outdoor trips, sorted by date ascending.
pub fn process_entries_for_trips_chart(entries: &[Entry]) -> Vec<TripsDay> {
    let mut daily: BTreeMap<NaiveDate, u32> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.is_outside()) {
        *daily.entry(entry.date()).or_insert(0) += 1;
    }

    daily
        .into_iter()
        .map(|(date, trips)| TripsDay {
            date: date.format("%Y-%m-%d").to_string(),
            display_date: norwegian_day_label(date),
            trips,
        })
        .collect()
}

/// Summary metrics over the history. Empty input yields `EntryStats::default()`.
pub fn calculate_stats(entries: &[Entry]) -> EntryStats {
    if entries.is_empty() {
        return EntryStats::default();
    }

    let outdoor: Vec<&Entry> = entries.iter().filter(|e| e.is_outside()).collect();
    let outdoor_count = outdoor.len() as u32;

    let total_poops = entries.iter().map(Entry::poop_count).sum();
    let total_pees = entries.iter().map(Entry::pee_count).sum();

    let days: BTreeSet<NaiveDate> = entries.iter().map(Entry::date).collect();
    let average_trips_per_day = ratio(outdoor_count as usize, days.len());

    let longest_trip = entries
        .iter()
        .filter_map(Entry::duration_minutes)
        .fold(0.0, f64::max);

    let with_toilet = entries.iter().filter(|e| e.has_toilet_activity()).count();
    let outdoor_with_toilet = outdoor.iter().filter(|e| e.has_toilet_activity()).count();
    let success_rate = if with_toilet == 0 {
        1.0
    } else {
        outdoor_with_toilet as f64 / with_toilet as f64
    };

    let outdoor_durations: Vec<f64> = outdoor
        .iter()
        .filter_map(|e| e.duration_minutes())
        .collect();
    let average_trip_duration = if outdoor_durations.is_empty() {
        0.0
    } else {
        outdoor_durations.iter().sum::<f64>() / outdoor_durations.len() as f64
    };

    EntryStats {
        total_trips: outdoor_count,
        total_poops,
        total_pees,
        average_trips_per_day,
        most_common_location: most_common_location(entries),
        longest_trip,
        success_rate,
        outdoor_percentage: ratio(outdoor.len(), entries.len()),
        average_trip_duration,
        top_walkers: top_walkers(&outdoor),
    }
}

/// `numerator / denominator`, or 0 when there is nothing to divide by.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Modal effective location. Ties go to the location seen first.
fn most_common_location(entries: &[Entry]) -> String {
    let mut counts: Vec<(Location, u32)> = Vec::new();
    for entry in entries {
        let location = entry.effective_location();
        match counts.iter_mut().find(|(l, _)| *l == location) {
            Some((_, count)) => *count += 1,
            None => counts.push((location, 1)),
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .first()
        .map(|(location, _)| location.as_str().to_string())
        .unwrap_or_else(|| NO_LOCATION.to_string())
}

/// Walkers ranked by completed outdoor walks of at least three minutes.
fn top_walkers(outdoor: &[&Entry]) -> Vec<TopWalker> {
    let mut walkers: Vec<TopWalker> = Vec::new();
    let mut index_by_email: HashMap<&str, usize> = HashMap::new();

    for entry in outdoor {
        let counted = entry
            .duration_minutes()
            .is_some_and(|minutes| minutes >= MIN_COUNTED_WALK_MINUTES);
        if !counted {
            continue;
        }

        for user in &entry.users {
            match index_by_email.get(user.email.as_str()) {
                Some(&i) => walkers[i].trips += 1,
                None => {
                    index_by_email.insert(&user.email, walkers.len());
                    walkers.push(TopWalker {
                        user: user.clone(),
                        trips: 1,
                    });
                }
            }
        }
    }

    walkers.sort_by(|a, b| b.trips.cmp(&a.trips));
    walkers.truncate(TOP_WALKER_LIMIT);
    walkers
}
