// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};

/// Abbreviated Norwegian month names, as rendered by the `no-NO` locale.
const NORWEGIAN_MONTHS: [&str; 12] = [
    "jan.", "feb.", "mar.", "apr.", "mai", "jun.", "jul.", "aug.", "sep.", "okt.", "nov.", "des.",
];

/// Format a UTC timestamp as RFC3339 with millisecond precision and a `Z`
/// suffix. Every stored timestamp has the same width, so string order in the
/// document store is time order.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_utc_rfc3339<E: serde::de::Error>(value: &str) -> Result<DateTime<Utc>, E> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| E::custom(format!("invalid timestamp {:?}: {}", value, e)))
}

/// `#[serde(with = ...)]` for stored timestamps, see [`format_utc_rfc3339`].
pub mod rfc3339_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_utc_rfc3339(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_utc_rfc3339(&value)
    }

    /// Same format for optional timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => serializer.serialize_some(&super::super::format_utc_rfc3339(*time)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|value| super::super::parse_utc_rfc3339(&value))
                .transpose()
        }
    }
}

/// Calendar day of a timestamp. All grouping is done on the UTC date.
pub fn date_key(time: DateTime<Utc>) -> NaiveDate {
    time.date_naive()
}

/// Whole and fractional minutes from `start` to `end`.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

/// Short day label in Norwegian, e.g. "5. jan.".
pub fn norwegian_day_label(date: NaiveDate) -> String {
    format!("{}. {}", date.day(), NORWEGIAN_MONTHS[date.month0() as usize])
}
