// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The walk dashboard.
//!
//! Owns the live entry subscription and drives the user actions against the
//! store. Actions are optimistic: local state changes first, the store call
//! follows, and a failed call puts the local state back unless an event has
//! replaced it in the meantime.

use crate::db::{EntryMutations, EntryStore};
use crate::error::{AppError, Result};
use crate::models::{
    CompleteEntry, Entry, EntryStats, NewManualEntry, PoopPeeDay, TripsDay, User,
};
use crate::services::notification::{
    Notice, NotificationSurface, SessionNotificationController, Visibility,
};
use crate::services::statistics;
use crate::services::subscription::{EntryState, EntrySubscription, EntrySubscriptionManager};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct Dashboard<S, N> {
    store: Arc<S>,
    subscription: EntrySubscription,
    notifications: SessionNotificationController<N>,
}

impl<S, N> Dashboard<S, N>
where
    S: EntryStore + EntryMutations,
    N: NotificationSurface,
{
    /// Subscribe to the store and start loading entries.
    pub fn open(store: Arc<S>, surface: Arc<N>) -> Self {
        let subscription = EntrySubscriptionManager::new(store.clone()).subscribe();
        Self {
            store,
            subscription,
            notifications: SessionNotificationController::new(surface),
        }
    }

    pub fn subscription(&self) -> &EntrySubscription {
        &self.subscription
    }

    pub fn notifications(&self) -> &SessionNotificationController<N> {
        &self.notifications
    }

    pub fn snapshot(&self) -> EntryState {
        self.subscription.snapshot()
    }

    /// Start a walk for `session`.
    ///
    /// A placeholder is shown as the active entry right away and replaced by
    /// the stored entry. If the store rejects the walk the slot is cleared.
    pub async fn start_walk(&self, session: &User) -> Result<Entry> {
        if let Some(active) = self.subscription.active_entry() {
            return Err(AppError::Conflict(format!(
                "Walk {} is already in progress",
                active.id
            )));
        }

        let start_time = chrono::Utc::now();
        let placeholder = Some(Entry::pending(start_time, Some(session.clone())));
        self.subscription.set_active_entry(placeholder.clone());

        match self.store.start_entry(start_time, Some(session.clone())).await {
            Ok(entry) => {
                tracing::info!(entry_id = %entry.id, user = %session.email, "Walk started");
                self.subscription
                    .compare_and_set_active_entry(&placeholder, Some(entry.clone()));
                Ok(entry)
            }
            Err(e) => {
                tracing::error!(error = %e, user = %session.email, "Failed to start walk");
                self.subscription.compare_and_set_active_entry(&placeholder, None);
                Err(e)
            }
        }
    }

    /// Add `session` to the active walk and confirm with a notice.
    pub async fn join_walk(&self, session: &User) -> Result<Entry> {
        let active = self
            .subscription
            .active_entry()
            .ok_or_else(|| AppError::NotFound("No walk in progress".to_string()))?;

        if active.has_participant(&session.email) {
            return Ok(active);
        }
        let entry_id = active
            .id
            .as_persisted()
            .ok_or_else(|| AppError::Conflict("Walk is still being saved".to_string()))?
            .to_string();

        let mut joined = active.clone();
        joined.users.push(session.clone());
        let optimistic = Some(joined.clone());
        self.subscription.set_active_entry(optimistic.clone());

        match self.store.append_user_to_entry(&entry_id, session).await {
            Ok(()) => {
                tracing::info!(entry_id = %entry_id, user = %session.email, "Joined walk");
                self.notifications.confirm_join();
                Ok(joined)
            }
            Err(e) => {
                tracing::error!(error = %e, entry_id = %entry_id, "Failed to join walk");
                self.subscription.compare_and_set_active_entry(&optimistic, Some(active));
                Err(e)
            }
        }
    }

    /// Stop a walk with the values from the submit dialog.
    ///
    /// The active slot is cleared immediately; the completed entry arrives
    /// through the history listener.
    pub async fn submit_entry(&self, entry_id: &str, completion: &CompleteEntry) -> Result<Entry> {
        let was_active = self
            .subscription
            .active_entry()
            .is_some_and(|e| e.id.is_document(entry_id));
        if was_active {
            self.subscription.set_active_entry(None);
        }

        match self.store.complete_entry(entry_id, completion).await {
            Ok(entry) => {
                tracing::info!(
                    entry_id,
                    minutes = entry.duration_minutes().unwrap_or_default(),
                    "Walk completed"
                );
                Ok(entry)
            }
            Err(e) => {
                tracing::error!(error = %e, entry_id, "Failed to complete walk");
                if was_active {
                    self.resync().await;
                }
                Err(e)
            }
        }
    }

    /// Add a finished entry after the fact. It arrives in the history through
    /// the completed-entries listener.
    pub async fn add_manual_entry(
        &self,
        session: Option<&User>,
        input: &NewManualEntry,
    ) -> Result<Entry> {
        if input.end_time < input.start_time {
            return Err(AppError::BadRequest(
                "End time must not be before start time".to_string(),
            ));
        }

        let entry = self
            .store
            .create_manual_entry(input, session.cloned())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to add manual entry"))?;
        tracing::info!(
            entry_id = %entry.id,
            location = entry.location.as_str(),
            "Manual entry added"
        );
        Ok(entry)
    }

    /// Abandon a walk. It disappears without a completed counterpart.
    pub async fn abandon_walk(&self, entry_id: &str) -> Result<()> {
        let was_active = self
            .subscription
            .active_entry()
            .is_some_and(|e| e.id.is_document(entry_id));
        if was_active {
            self.subscription.set_active_entry(None);
        }

        if let Err(e) = self.store.delete_entry(entry_id).await {
            tracing::error!(error = %e, entry_id, "Failed to abandon walk");
            if was_active {
                self.resync().await;
            }
            return Err(e);
        }

        tracing::info!(entry_id, "Walk abandoned");
        Ok(())
    }

    /// Put the active slot back after a failed clear.
    ///
    /// An empty slot cannot tell a local clear from a delete that arrived
    /// meanwhile, so the store is asked instead.
    async fn resync(&self) {
        self.subscription.refresh().await;
    }

    /// Refresh and show the session notice when a backgrounded view becomes
    /// visible again.
    pub async fn on_visibility_change(
        &self,
        visibility: Visibility,
        session: Option<&User>,
    ) -> Option<Notice> {
        if !self.notifications.regains_visibility(visibility, session) {
            return None;
        }
        self.subscription.refresh().await;
        let active = self.subscription.active_entry();
        Some(
            self.notifications
                .surface_session_notice(active.as_ref(), session),
        )
    }

    /// Re-show the session notice whenever the people on the active walk change.
    ///
    /// Runs until the subscription closes or the handle is aborted.
    pub fn watch_walkers(&self, session: Option<User>) -> JoinHandle<()> {
        let mut state = self.subscription.watch();
        let notifications = self.notifications.clone();

        // Baseline is taken now so changes made before the task first runs count.
        let mut walkers = walker_emails(&state.borrow_and_update());

        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let snapshot = state.borrow_and_update().clone();
                if snapshot.loading {
                    continue;
                }
                let current = walker_emails(&snapshot);
                if current != walkers {
                    tracing::debug!(walkers = ?current, "Walkers changed");
                    notifications
                        .surface_session_notice(snapshot.active_entry.as_ref(), session.as_ref());
                    walkers = current;
                }
            }
        })
    }

    pub fn stats(&self) -> EntryStats {
        statistics::calculate_stats(&self.snapshot().all_entries)
    }

    pub fn poop_pee_chart(&self) -> Vec<PoopPeeDay> {
        statistics::process_entries_for_poop_pee_chart(&self.snapshot().all_entries)
    }

    pub fn trips_chart(&self) -> Vec<TripsDay> {
        statistics::process_entries_for_trips_chart(&self.snapshot().all_entries)
    }

    /// Tear down the subscription.
    pub async fn close(self) {
        self.subscription.unsubscribe().await;
    }
}

/// Who is out right now, or `None` when no walk is active.
fn walker_emails(state: &EntryState) -> Option<Vec<String>> {
    state.active_entry.as_ref().map(Entry::participant_emails)
}
