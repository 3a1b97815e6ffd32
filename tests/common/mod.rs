// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use walk_log::config::Config;
use walk_log::db::{EntryBackend, FirestoreDb, MemoryStore};
use walk_log::models::{Entry, EntryId, EntryMode, EntryStatus, Location, User};
use walk_log::routes::create_router;
use walk_log::services::{Dashboard, NotificationCenter};
use walk_log::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn kari() -> User {
    User::new("Kari", "kari@example.com")
}

#[allow(dead_code)]
pub fn ola() -> User {
    User::new("Ola", "ola@example.com")
}

/// 2025-03-{day} at {hour}:00 UTC.
#[allow(dead_code)]
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

/// A completed walk of `minutes` starting at `start`.
#[allow(dead_code)]
pub fn completed(id: &str, start: DateTime<Utc>, minutes: i64, location: Location) -> Entry {
    Entry {
        id: EntryId::persisted(id),
        start_time: start,
        end_time: Some(start + Duration::minutes(minutes)),
        status: EntryStatus::Completed,
        mode: EntryMode::Manual,
        location,
        poops: None,
        pees: None,
        users: vec![],
    }
}

/// An active auto walk that started at `start`.
#[allow(dead_code)]
pub fn active(id: &str, start: DateTime<Utc>, users: Vec<User>) -> Entry {
    let mut entry = Entry::pending(start, None);
    entry.id = EntryId::persisted(id);
    entry.users = users;
    entry
}

/// Dashboard over an in-memory store.
#[allow(dead_code)]
pub async fn memory_dashboard(
    entries: Vec<Entry>,
) -> (
    Dashboard<MemoryStore, NotificationCenter>,
    Arc<MemoryStore>,
    Arc<NotificationCenter>,
) {
    let store = Arc::new(MemoryStore::with_entries(entries));
    let center = Arc::new(NotificationCenter::new());
    let dashboard = Dashboard::open(store.clone(), center.clone());
    dashboard
        .subscription()
        .loaded()
        .await
        .expect("initial load");
    (dashboard, store, center)
}

/// Create a test app over an in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app(entries: Vec<Entry>) -> (axum::Router, Arc<AppState>) {
    let store = Arc::new(EntryBackend::Memory(MemoryStore::with_entries(entries)));
    let dashboard = Dashboard::open(store, Arc::new(NotificationCenter::new()));
    dashboard
        .subscription()
        .loaded()
        .await
        .expect("initial load");

    let state = Arc::new(AppState::new(Config::test_default(), dashboard));

    (create_router(state.clone()), state)
}

/// Wait until the dashboard state satisfies `predicate`.
#[allow(dead_code)]
pub async fn wait_for<S, N, F>(dashboard: &Dashboard<S, N>, predicate: F)
where
    S: walk_log::db::EntryStore + walk_log::db::EntryMutations,
    N: walk_log::services::NotificationSurface,
    F: FnMut(&walk_log::services::EntryState) -> bool,
{
    let mut state = dashboard.subscription().watch();
    tokio::time::timeout(std::time::Duration::from_secs(2), state.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("subscription closed");
}
