// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store layer.
//!
//! The dashboard talks to the store only through [`EntryStore`] (queries and
//! change streams) and [`EntryMutations`] (user actions). [`MemoryStore`]
//! keeps documents in-process; [`FirestoreDb`] uses Cloud Firestore.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{
    ChangeEvent, CompleteEntry, Entry, EntryMode, EntryStatus, NewManualEntry, User,
};
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    pub const ENTRIES: &str = "entries";
}

/// Stream of change events for one listened query.
pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// The two live queries the dashboard watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryQuery {
    /// Walks being tracked right now (`status == active && mode == auto`)
    Active,
    /// Finished entries (`status == completed`)
    Completed,
}

impl EntryQuery {
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            EntryQuery::Active => {
                entry.status == EntryStatus::Active && entry.mode == EntryMode::Auto
            }
            EntryQuery::Completed => entry.status == EntryStatus::Completed,
        }
    }
}

/// Read side of the document store.
pub trait EntryStore: Send + Sync + 'static {
    /// Most recently started active auto-mode entry.
    fn fetch_active_entry(&self) -> impl Future<Output = Result<Option<Entry>, AppError>> + Send;

    /// Completed entries, newest end time first.
    fn fetch_completed_entries(&self) -> impl Future<Output = Result<Vec<Entry>, AppError>> + Send;

    /// Subscribe to changes in the result set of `query`.
    fn listen(
        &self,
        query: EntryQuery,
    ) -> impl Future<Output = Result<ChangeStream, AppError>> + Send;
}

/// Write side: the user actions that change entries.
pub trait EntryMutations: Send + Sync + 'static {
    /// Persist a new active auto-mode walk and return it with its id.
    fn start_entry(
        &self,
        start_time: DateTime<Utc>,
        starter: Option<User>,
    ) -> impl Future<Output = Result<Entry, AppError>> + Send;

    /// Add `user` to the entry's participants. No-op if already present.
    fn append_user_to_entry(
        &self,
        entry_id: &str,
        user: &User,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Finish an entry with the submitted values.
    fn complete_entry(
        &self,
        entry_id: &str,
        completion: &CompleteEntry,
    ) -> impl Future<Output = Result<Entry, AppError>> + Send;

    /// Persist a completed manual-mode entry and return it with its id.
    fn create_manual_entry(
        &self,
        input: &NewManualEntry,
        author: Option<User>,
    ) -> impl Future<Output = Result<Entry, AppError>> + Send;

    /// Remove an entry (abandoned walk).
    fn delete_entry(&self, entry_id: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Store selected at startup.
pub enum EntryBackend {
    Memory(MemoryStore),
    Firestore(FirestoreDb),
}

impl EntryStore for EntryBackend {
    async fn fetch_active_entry(&self) -> Result<Option<Entry>, AppError> {
        match self {
            EntryBackend::Memory(store) => store.fetch_active_entry().await,
            EntryBackend::Firestore(db) => db.fetch_active_entry().await,
        }
    }

    async fn fetch_completed_entries(&self) -> Result<Vec<Entry>, AppError> {
        match self {
            EntryBackend::Memory(store) => store.fetch_completed_entries().await,
            EntryBackend::Firestore(db) => db.fetch_completed_entries().await,
        }
    }

    async fn listen(&self, query: EntryQuery) -> Result<ChangeStream, AppError> {
        match self {
            EntryBackend::Memory(store) => store.listen(query).await,
            EntryBackend::Firestore(db) => db.listen(query).await,
        }
    }
}

impl EntryMutations for EntryBackend {
    async fn start_entry(
        &self,
        start_time: DateTime<Utc>,
        starter: Option<User>,
    ) -> Result<Entry, AppError> {
        match self {
            EntryBackend::Memory(store) => store.start_entry(start_time, starter).await,
            EntryBackend::Firestore(db) => db.start_entry(start_time, starter).await,
        }
    }

    async fn append_user_to_entry(&self, entry_id: &str, user: &User) -> Result<(), AppError> {
        match self {
            EntryBackend::Memory(store) => store.append_user_to_entry(entry_id, user).await,
            EntryBackend::Firestore(db) => db.append_user_to_entry(entry_id, user).await,
        }
    }

    async fn complete_entry(
        &self,
        entry_id: &str,
        completion: &CompleteEntry,
    ) -> Result<Entry, AppError> {
        match self {
            EntryBackend::Memory(store) => store.complete_entry(entry_id, completion).await,
            EntryBackend::Firestore(db) => db.complete_entry(entry_id, completion).await,
        }
    }

    async fn create_manual_entry(
        &self,
        input: &NewManualEntry,
        author: Option<User>,
    ) -> Result<Entry, AppError> {
        match self {
            EntryBackend::Memory(store) => store.create_manual_entry(input, author).await,
            EntryBackend::Firestore(db) => db.create_manual_entry(input, author).await,
        }
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<(), AppError> {
        match self {
            EntryBackend::Memory(store) => store.delete_entry(entry_id).await,
            EntryBackend::Firestore(db) => db.delete_entry(entry_id).await,
        }
    }
}
