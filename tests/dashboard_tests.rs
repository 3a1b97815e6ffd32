// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard actions over the in-memory store: optimistic updates,
//! rollback on failure, and the notices shown to the session user.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use walk_log::db::{ChangeStream, EntryMutations, EntryQuery, EntryStore, MemoryStore};
use walk_log::error::AppError;
use walk_log::models::{CompleteEntry, Entry, EntryStatus, Location, NewManualEntry, User};
use walk_log::services::Dashboard;
use walk_log::services::notification::{JOIN_NOTICE_ID, SESSION_NOTICE_ID};
use walk_log::services::{Notice, NoticeAction, NotificationCenter, Visibility};

mod common;
use common::{active, at, completed, kari, memory_dashboard, ola, wait_for};

/// Poll the notification center until `predicate` holds for the notice.
async fn wait_for_notice<F>(center: &Arc<NotificationCenter>, id: &str, predicate: F) -> Notice
where
    F: Fn(&Notice) -> bool,
{
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            if let Some(notice) = center.get(id) {
                if predicate(&notice) {
                    return notice;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for notice")
}

/// A store where another client deletes the walk while each of our writes
/// is in flight, and the write then fails.
struct RacingStore {
    inner: Arc<MemoryStore>,
}

impl RacingStore {
    async fn lose_race(&self, entry_id: &str) -> AppError {
        self.inner.delete_entry(entry_id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        AppError::NotFound(format!("Entry {} not found", entry_id))
    }
}

impl EntryStore for RacingStore {
    async fn fetch_active_entry(&self) -> Result<Option<Entry>, AppError> {
        self.inner.fetch_active_entry().await
    }

    async fn fetch_completed_entries(&self) -> Result<Vec<Entry>, AppError> {
        self.inner.fetch_completed_entries().await
    }

    async fn listen(&self, query: EntryQuery) -> Result<ChangeStream, AppError> {
        self.inner.listen(query).await
    }
}

impl EntryMutations for RacingStore {
    async fn start_entry(
        &self,
        start_time: DateTime<Utc>,
        starter: Option<User>,
    ) -> Result<Entry, AppError> {
        self.inner.start_entry(start_time, starter).await
    }

    async fn append_user_to_entry(&self, entry_id: &str, _user: &User) -> Result<(), AppError> {
        Err(self.lose_race(entry_id).await)
    }

    async fn complete_entry(
        &self,
        entry_id: &str,
        _completion: &CompleteEntry,
    ) -> Result<Entry, AppError> {
        Err(self.lose_race(entry_id).await)
    }

    async fn create_manual_entry(
        &self,
        input: &NewManualEntry,
        author: Option<User>,
    ) -> Result<Entry, AppError> {
        self.inner.create_manual_entry(input, author).await
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<(), AppError> {
        Err(self.lose_race(entry_id).await)
    }
}

async fn racing_dashboard() -> (Dashboard<RacingStore, NotificationCenter>, Arc<MemoryStore>) {
    let inner = Arc::new(MemoryStore::with_entries(vec![active(
        "walk",
        at(3, 8),
        vec![kari()],
    )]));
    let store = Arc::new(RacingStore {
        inner: inner.clone(),
    });
    let dashboard = Dashboard::open(store, Arc::new(NotificationCenter::new()));
    dashboard.subscription().loaded().await.unwrap();
    (dashboard, inner)
}

#[tokio::test]
async fn test_failed_join_does_not_restore_deleted_walk() {
    let (dashboard, inner) = racing_dashboard().await;

    let result = dashboard.join_walk(&ola()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(inner.get("walk").await.is_none());
    assert!(dashboard.snapshot().active_entry.is_none());
}

#[tokio::test]
async fn test_failed_submit_does_not_restore_deleted_walk() {
    let (dashboard, _) = racing_dashboard().await;

    let completion = CompleteEntry {
        end_time: at(3, 9),
        location: Location::Outside,
        poops: 0,
        pees: 1,
    };
    assert!(dashboard.submit_entry("walk", &completion).await.is_err());
    assert!(dashboard.snapshot().active_entry.is_none());
}

#[tokio::test]
async fn test_failed_abandon_does_not_restore_deleted_walk() {
    let (dashboard, _) = racing_dashboard().await;

    assert!(dashboard.abandon_walk("walk").await.is_err());
    assert!(dashboard.snapshot().active_entry.is_none());
}

/// Background the view, then bring it back.
async fn come_back<S, N>(dashboard: &Dashboard<S, N>, session: Option<&User>) -> Option<Notice>
where
    S: EntryStore + EntryMutations,
    N: walk_log::services::NotificationSurface,
{
    assert!(dashboard
        .on_visibility_change(Visibility::Hidden, session)
        .await
        .is_none());
    dashboard.on_visibility_change(Visibility::Visible, session).await
}

#[tokio::test]
async fn test_start_walk_persists_and_shows_entry() {
    let (dashboard, store, _) = memory_dashboard(vec![]).await;

    let entry = dashboard.start_walk(&kari()).await.unwrap();

    assert!(!entry.id.is_pending());
    assert_eq!(entry.users, vec![kari()]);
    assert_eq!(dashboard.snapshot().active_entry.unwrap().id, entry.id);

    let stored = store.get(entry.id.as_persisted().unwrap()).await.unwrap();
    assert_eq!(stored.status, EntryStatus::Active);
}

#[tokio::test]
async fn test_start_walk_rejected_while_walk_in_progress() {
    let (dashboard, _, _) = memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;

    let result = dashboard.start_walk(&ola()).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(dashboard.snapshot().active_entry.unwrap().users, vec![kari()]);
}

#[tokio::test]
async fn test_failed_start_clears_placeholder() {
    let (dashboard, store, _) = memory_dashboard(vec![]).await;
    store.set_offline(true);

    let result = dashboard.start_walk(&kari()).await;

    assert!(matches!(result, Err(AppError::Database(_))));
    assert!(dashboard.snapshot().active_entry.is_none());
}

#[tokio::test]
async fn test_join_walk_adds_user_and_confirms() {
    let (dashboard, store, center) =
        memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;

    let joined = dashboard.join_walk(&ola()).await.unwrap();

    assert_eq!(joined.users, vec![kari(), ola()]);
    assert_eq!(store.get("walk").await.unwrap().users, vec![kari(), ola()]);

    let confirmation = center.get(JOIN_NOTICE_ID).unwrap();
    assert_eq!(confirmation.message, "Du er med på turen!");
}

#[tokio::test]
async fn test_join_walk_twice_is_noop() {
    let (dashboard, store, center) =
        memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;

    let entry = dashboard.join_walk(&kari()).await.unwrap();

    assert_eq!(entry.users, vec![kari()]);
    assert_eq!(store.get("walk").await.unwrap().users, vec![kari()]);
    assert!(center.get(JOIN_NOTICE_ID).is_none());
}

#[tokio::test]
async fn test_join_walk_without_walk_fails() {
    let (dashboard, _, _) = memory_dashboard(vec![]).await;

    let result = dashboard.join_walk(&ola()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_join_restores_participants() {
    let (dashboard, store, center) =
        memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;
    store.set_offline(true);

    let result = dashboard.join_walk(&ola()).await;

    assert!(matches!(result, Err(AppError::Database(_))));
    assert_eq!(dashboard.snapshot().active_entry.unwrap().users, vec![kari()]);
    assert!(center.get(JOIN_NOTICE_ID).is_none());
}

#[tokio::test]
async fn test_submit_moves_walk_into_history() {
    let (dashboard, _, _) = memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;

    let completion = CompleteEntry {
        end_time: at(3, 8) + Duration::minutes(25),
        location: Location::Outside,
        poops: 1,
        pees: 2,
    };
    let entry = dashboard.submit_entry("walk", &completion).await.unwrap();

    assert_eq!(entry.status, EntryStatus::Completed);
    assert_eq!(entry.duration_minutes(), Some(25.0));
    assert!(dashboard.snapshot().active_entry.is_none());

    wait_for(&dashboard, |s| s.all_entries.len() == 1).await;
    let stats = dashboard.stats();
    assert_eq!(stats.total_trips, 1);
    assert_eq!(stats.total_poops, 1);
    assert_eq!(stats.total_pees, 2);
    assert_eq!(stats.longest_trip, 25.0);
}

#[tokio::test]
async fn test_failed_submit_keeps_walk_active() {
    let (dashboard, store, _) = memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;
    store.set_offline(true);

    let completion = CompleteEntry {
        end_time: at(3, 9),
        location: Location::Inside,
        poops: 0,
        pees: 0,
    };
    let result = dashboard.submit_entry("walk", &completion).await;

    assert!(result.is_err());
    assert_eq!(
        dashboard.snapshot().active_entry.unwrap().id.to_string(),
        "walk"
    );
}

#[tokio::test]
async fn test_abandon_walk_leaves_history_untouched() {
    let (dashboard, store, _) = memory_dashboard(vec![
        completed("old", at(1, 8), 10, Location::Outside),
        active("walk", at(3, 8), vec![kari()]),
    ])
    .await;

    dashboard.abandon_walk("walk").await.unwrap();

    assert!(dashboard.snapshot().active_entry.is_none());
    assert!(store.get("walk").await.is_none());
    tokio::task::yield_now().await;
    assert_eq!(dashboard.snapshot().all_entries.len(), 1);
}

#[tokio::test]
async fn test_visibility_notice_without_walk() {
    let (dashboard, _, center) = memory_dashboard(vec![]).await;

    let notice = come_back(&dashboard, Some(&kari())).await.unwrap();

    assert_eq!(notice.message, "Klar for ny tur? Velkommen tilbake!");
    assert_eq!(
        notice.description.as_deref(),
        Some("Trykk på start for å begynne en ny tur")
    );
    assert!(notice.action.is_none());
    assert_eq!(center.get(SESSION_NOTICE_ID), Some(notice));
}

#[tokio::test]
async fn test_visibility_notice_offers_join() {
    let (dashboard, _, _) = memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;

    let notice = come_back(&dashboard, Some(&ola())).await.unwrap();

    assert_eq!(notice.message, "Kari er ute på tur");
    match notice.action {
        Some(NoticeAction::JoinWalk { label, entry_id }) => {
            assert_eq!(label, "Bli med");
            assert_eq!(entry_id.to_string(), "walk");
        }
        other => panic!("expected join action, got {:?}", other),
    }
}

#[tokio::test]
async fn test_visibility_notice_for_walker() {
    let (dashboard, _, _) = memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;

    let notice = come_back(&dashboard, Some(&kari())).await.unwrap();

    assert_eq!(notice.message, "Håper du har hatt en fin tur!");
    assert_eq!(
        notice.description.as_deref(),
        Some("Trykk på stopp for å avslutte turen")
    );
    assert!(notice.action.is_none());
}

#[tokio::test]
async fn test_hidden_view_shows_nothing() {
    let (dashboard, _, center) = memory_dashboard(vec![]).await;

    let notice = dashboard
        .on_visibility_change(Visibility::Hidden, Some(&kari()))
        .await;

    assert!(notice.is_none());
    assert!(center.all().is_empty());
}

#[tokio::test]
async fn test_visible_without_backgrounding_shows_nothing() {
    let (dashboard, _, center) = memory_dashboard(vec![]).await;

    let notice = dashboard
        .on_visibility_change(Visibility::Visible, Some(&kari()))
        .await;

    assert!(notice.is_none());
    assert!(center.get(SESSION_NOTICE_ID).is_none());
}

#[tokio::test]
async fn test_add_manual_entry_lands_in_history() {
    let (dashboard, _, _) = memory_dashboard(vec![]).await;

    let input = NewManualEntry {
        start_time: at(6, 7),
        end_time: at(6, 7) + Duration::minutes(12),
        location: Location::Inside,
        poops: 0,
        pees: 1,
    };
    let entry = dashboard.add_manual_entry(Some(&ola()), &input).await.unwrap();

    assert_eq!(entry.users, vec![ola()]);
    wait_for(&dashboard, |s| s.all_entries.len() == 1).await;
    assert!(dashboard.snapshot().active_entry.is_none());

    // Manual indoor entries count as inside everywhere.
    let stats = dashboard.stats();
    assert_eq!(stats.total_trips, 0);
    assert_eq!(stats.most_common_location, "inside");
    assert_eq!(dashboard.poop_pee_chart()[0].inside_pees, 1);
}

#[tokio::test]
async fn test_manual_entry_must_end_after_start() {
    let (dashboard, store, _) = memory_dashboard(vec![]).await;

    let input = NewManualEntry {
        start_time: at(6, 8),
        end_time: at(6, 7),
        location: Location::Outside,
        poops: 0,
        pees: 0,
    };
    let result = dashboard.add_manual_entry(None, &input).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert!(walk_log::db::EntryStore::fetch_completed_entries(store.as_ref())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_visibility_refresh_sees_latest_walk() {
    let (dashboard, store, _) = memory_dashboard(vec![]).await;

    // Written behind the dashboard's back, then the local slot is reset.
    walk_log::db::EntryMutations::start_entry(store.as_ref(), at(5, 7), Some(kari()))
        .await
        .unwrap();
    wait_for(&dashboard, |s| s.active_entry.is_some()).await;
    dashboard.subscription().set_active_entry(None);

    let notice = come_back(&dashboard, Some(&ola())).await.unwrap();

    assert_eq!(notice.message, "Kari er ute på tur");
}

#[tokio::test]
async fn test_watch_walkers_announces_new_walk() {
    let (dashboard, store, center) = memory_dashboard(vec![]).await;
    let watcher = dashboard.watch_walkers(Some(ola()));
    tokio::task::yield_now().await;

    walk_log::db::EntryMutations::start_entry(store.as_ref(), at(5, 7), Some(kari()))
        .await
        .unwrap();

    let notice = wait_for_notice(&center, SESSION_NOTICE_ID, |n| n.action.is_some()).await;
    assert_eq!(notice.message, "Kari er ute på tur");

    watcher.abort();
}

#[tokio::test]
async fn test_watch_walkers_announces_joiner() {
    let (dashboard, store, center) =
        memory_dashboard(vec![active("walk", at(3, 8), vec![kari()])]).await;
    let watcher = dashboard.watch_walkers(None);
    tokio::task::yield_now().await;

    walk_log::db::EntryMutations::append_user_to_entry(store.as_ref(), "walk", &ola())
        .await
        .unwrap();

    let notice = wait_for_notice(&center, SESSION_NOTICE_ID, |n| {
        n.message == "Kari og Ola er ute på tur"
    })
    .await;
    // No session user, so nobody can join.
    assert!(notice.action.is_none());

    watcher.abort();
}

#[tokio::test]
async fn test_close_ends_walker_watch() {
    let (dashboard, _, _) = memory_dashboard(vec![]).await;
    let watcher = dashboard.watch_walkers(Some(kari()));

    dashboard.close().await;

    tokio::time::timeout(std::time::Duration::from_secs(2), watcher)
        .await
        .expect("watcher should stop with the subscription")
        .unwrap();
}
