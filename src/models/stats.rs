//! Derived statistics records for the dashboard charts and stat cards.
//!
//! These are computed on demand from the completed-entry history by
//! `services::statistics`; nothing here is persisted.

use crate::models::User;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Placeholder shown when there is no location to report.
pub const NO_LOCATION: &str = "N/A";

/// One day of toilet activity, split by effective location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PoopPeeDay {
    /// Day key ("YYYY-MM-DD", UTC)
    pub date: String,
    /// Short Norwegian label ("14. mar.")
    pub display_date: String,
    pub outside_poops: u32,
    pub outside_pees: u32,
    pub inside_poops: u32,
    pub inside_pees: u32,
}

/// Number of outdoor trips on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TripsDay {
    pub date: String,
    pub display_date: String,
    pub trips: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TopWalker {
    pub user: User,
    pub trips: u32,
}

/// Summary metrics for the stat cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct EntryStats {
    /// Entries with `location == outside`
    pub total_trips: u32,
    pub total_poops: u32,
    pub total_pees: u32,
    pub average_trips_per_day: f64,
    pub most_common_location: String,
    /// Minutes
    pub longest_trip: f64,
    pub success_rate: f64,
    pub outdoor_percentage: f64,
    /// Minutes
    pub average_trip_duration: f64,
    pub top_walkers: Vec<TopWalker>,
}

impl Default for EntryStats {
    fn default() -> Self {
        Self {
            total_trips: 0,
            total_poops: 0,
            total_pees: 0,
            average_trips_per_day: 0.0,
            most_common_location: NO_LOCATION.to_string(),
            longest_trip: 0.0,
            success_rate: 0.0,
            outdoor_percentage: 0.0,
            average_trip_duration: 0.0,
            top_walkers: Vec::new(),
        }
    }
}
