// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Walk entry model shared by the store, the subscription layer and the API.

use crate::models::User;
use crate::time_utils::{date_key, minutes_between, rfc3339_millis};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Identity of an entry.
///
/// A walk started on this client exists locally before the store has
/// assigned it an id. Such placeholders are `Pending` and serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum EntryId {
    #[default]
    Pending,
    Persisted(String),
}

impl EntryId {
    pub fn persisted(id: impl Into<String>) -> Self {
        EntryId::Persisted(id.into())
    }

    /// Store document id, if the entry has been persisted.
    pub fn as_persisted(&self) -> Option<&str> {
        match self {
            EntryId::Pending => None,
            EntryId::Persisted(id) => Some(id),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EntryId::Pending)
    }

    /// True if this id refers to the given store document.
    pub fn is_document(&self, document_id: &str) -> bool {
        self.as_persisted() == Some(document_id)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Pending => f.write_str("<pending>"),
            EntryId::Persisted(id) => f.write_str(id),
        }
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EntryId::Pending => serializer.serialize_none(),
            EntryId::Persisted(id) => serializer.serialize_some(id),
        }
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = Option::<String>::deserialize(deserializer)?;
        Ok(match id {
            Some(id) if !id.is_empty() => EntryId::Persisted(id),
            _ => EntryId::Pending,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Completed,
}

/// How the walk was recorded. `Auto` walks were tracked live with the
/// start/stop button and always count as outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Outside,
    Inside,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Outside => "outside",
            Location::Inside => "inside",
        }
    }
}

/// A tracked walk (or indoor toilet visit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Store document id, `null` while the entry is an optimistic placeholder
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub id: EntryId,
    #[serde(with = "rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    /// Present iff the entry is completed
    #[serde(
        default,
        with = "rfc3339_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "binding-generation", ts(type = "string", optional))]
    pub end_time: Option<DateTime<Utc>>,
    pub status: EntryStatus,
    pub mode: EntryMode,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poops: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pees: Option<u32>,
    /// Participants, in the order they joined
    #[serde(default)]
    pub users: Vec<User>,
}

impl Entry {
    /// Local placeholder for a walk that is being started right now.
    pub fn pending(start_time: DateTime<Utc>, starter: Option<User>) -> Self {
        Self {
            id: EntryId::Pending,
            start_time,
            end_time: None,
            status: EntryStatus::Active,
            mode: EntryMode::Auto,
            location: Location::Outside,
            poops: None,
            pees: None,
            users: starter.into_iter().collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EntryStatus::Active
    }

    /// Raw location check. Trip counts use this.
    pub fn is_outside(&self) -> bool {
        self.location == Location::Outside
    }

    /// Location with the auto-mode rule applied: auto walks are always outside.
    pub fn effective_location(&self) -> Location {
        match self.mode {
            EntryMode::Auto => Location::Outside,
            EntryMode::Manual => self.location,
        }
    }

    pub fn poop_count(&self) -> u32 {
        self.poops.unwrap_or(0)
    }

    pub fn pee_count(&self) -> u32 {
        self.pees.unwrap_or(0)
    }

    pub fn has_toilet_activity(&self) -> bool {
        self.poop_count() > 0 || self.pee_count() > 0
    }

    /// Duration in minutes, or `None` while the entry has no end time.
    pub fn duration_minutes(&self) -> Option<f64> {
        self.end_time
            .map(|end| minutes_between(self.start_time, end))
    }

    /// Calendar day (UTC) the entry belongs to.
    pub fn date(&self) -> NaiveDate {
        date_key(self.start_time)
    }

    pub fn has_participant(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.email == email)
    }

    pub fn participant_emails(&self) -> Vec<String> {
        self.users.iter().map(|u| u.email.clone()).collect()
    }

    /// Mark the entry completed with the values from the submit dialog.
    pub fn complete(&mut self, completion: &CompleteEntry) {
        self.end_time = Some(completion.end_time);
        self.location = completion.location;
        self.poops = Some(completion.poops);
        self.pees = Some(completion.pees);
        self.status = EntryStatus::Completed;
    }

    /// A completed manual entry from the "add manually" dialog. Not yet stored.
    pub fn manual(input: &NewManualEntry, author: Option<User>) -> Self {
        Self {
            id: EntryId::Pending,
            start_time: input.start_time,
            end_time: Some(input.end_time),
            status: EntryStatus::Completed,
            mode: EntryMode::Manual,
            location: input.location,
            poops: Some(input.poops),
            pees: Some(input.pees),
            users: author.into_iter().collect(),
        }
    }
}

/// Values submitted when a walk is stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CompleteEntry {
    pub end_time: DateTime<Utc>,
    pub location: Location,
    #[serde(default)]
    pub poops: u32,
    #[serde(default)]
    pub pees: u32,
}

/// Values submitted when an entry is added after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct NewManualEntry {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Location,
    #[serde(default)]
    pub poops: u32,
    #[serde(default)]
    pub pees: u32,
}
