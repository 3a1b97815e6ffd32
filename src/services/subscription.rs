// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live entry state.
//!
//! Combines one bulk fetch with two change streams (active walk, completed
//! history) into a single [`EntryState`]:
//! 1. Open both listeners
//! 2. Fetch the active entry and the history together; publish both at once
//! 3. Fold events into the state in delivery order, one at a time
//!
//! All folding happens on one task. Consumers read snapshots through a
//! `watch` channel; the only other writer is the optimistic setter.

use crate::db::{ChangeStream, EntryQuery, EntryStore};
use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, Entry, EntryStatus, Transition};
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// The active walk and the completed history as last reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryState {
    pub active_entry: Option<Entry>,
    /// Completed entries keyed by id. New ids go to the front.
    pub all_entries: Vec<Entry>,
    /// True until the initial fetch has been applied
    pub loading: bool,
}

impl Default for EntryState {
    fn default() -> Self {
        Self {
            active_entry: None,
            all_entries: Vec::new(),
            loading: true,
        }
    }
}

impl EntryState {
    /// Replace both slices with fetched data and clear the loading flag.
    pub fn populate(&mut self, active_entry: Option<Entry>, all_entries: Vec<Entry>) {
        self.active_entry = active_entry;
        self.all_entries = all_entries;
        self.loading = false;
    }

    /// Returns whether the active slot changed.
    pub fn set_active_entry(&mut self, entry: Option<Entry>) -> bool {
        if self.active_entry == entry {
            return false;
        }
        self.active_entry = entry;
        true
    }

    /// Fold an event from the active-entry listener.
    ///
    /// A delete always clears the slot. Otherwise the payload becomes the
    /// active entry, unless it is already completed, in which case the slot
    /// is cleared and the entry is left to the history listener.
    pub fn apply_active_event(&mut self, event: &ChangeEvent) -> bool {
        if !event.is_mutation() {
            return false;
        }
        if event.transition == Transition::Delete {
            return self.set_active_entry(None);
        }

        let Some(entry) = &event.result else {
            tracing::debug!(document_id = %event.document_id, "Active event without payload");
            return false;
        };

        if entry.status == EntryStatus::Completed {
            self.set_active_entry(None)
        } else {
            self.set_active_entry(Some(entry.clone()))
        }
    }

    /// Fold an event from the completed-entries listener.
    ///
    /// `disappear` and `delete` remove by id; anything else with a payload is
    /// an upsert that keeps the position of an existing entry.
    pub fn apply_completed_event(&mut self, event: &ChangeEvent) -> bool {
        if !event.is_mutation() {
            return false;
        }

        match event.transition {
            Transition::Disappear | Transition::Delete => self.remove_entry(&event.document_id),
            Transition::Appear | Transition::Update => match &event.result {
                Some(entry) => self.upsert_entry(entry.clone()),
                None => {
                    tracing::debug!(
                        document_id = %event.document_id,
                        "Completed event without payload"
                    );
                    false
                }
            },
        }
    }

    fn remove_entry(&mut self, document_id: &str) -> bool {
        let before = self.all_entries.len();
        self.all_entries.retain(|e| !e.id.is_document(document_id));
        self.all_entries.len() != before
    }

    fn upsert_entry(&mut self, entry: Entry) -> bool {
        match self.all_entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) if *existing == entry => false,
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.all_entries.insert(0, entry);
                true
            }
        }
    }
}

enum Command {
    Refresh(oneshot::Sender<()>),
}

/// Opens subscriptions against a store.
pub struct EntrySubscriptionManager<S> {
    store: Arc<S>,
}

impl<S: EntryStore> EntrySubscriptionManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Start the reconciliation task. The returned handle owns it.
    pub fn subscribe(&self) -> EntrySubscription {
        let state_tx = Arc::new(watch::Sender::new(EntryState::default()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(reconcile(self.store.clone(), state_tx.clone(), command_rx));

        EntrySubscription {
            state: state_tx.subscribe(),
            state_tx,
            commands: command_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running subscription.
///
/// Dropping it (or calling [`EntrySubscription::unsubscribe`]) stops both
/// listeners; a fetch still in flight at that point is discarded.
pub struct EntrySubscription {
    state: watch::Receiver<EntryState>,
    state_tx: Arc<watch::Sender<EntryState>>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl EntrySubscription {
    pub fn snapshot(&self) -> EntryState {
        self.state.borrow().clone()
    }

    pub fn active_entry(&self) -> Option<Entry> {
        self.state.borrow().active_entry.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// A receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<EntryState> {
        self.state.clone()
    }

    /// Wait for the initial fetch to be applied.
    pub async fn loaded(&self) -> Result<EntryState> {
        let mut state = self.state.clone();
        let loaded = state
            .wait_for(|s| !s.loading)
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Subscription closed")))?;
        Ok(loaded.clone())
    }

    /// Overwrite the active slot locally. Later events correct it.
    pub fn set_active_entry(&self, entry: Option<Entry>) {
        self.state_tx
            .send_if_modified(|state| state.set_active_entry(entry));
    }

    /// Settle an optimistic write.
    ///
    /// The slot is set to `entry` only if it still holds `expected`. If an
    /// event replaced it in the meantime, the event wins. Returns whether the
    /// slot changed.
    pub fn compare_and_set_active_entry(
        &self,
        expected: &Option<Entry>,
        entry: Option<Entry>,
    ) -> bool {
        self.state_tx.send_if_modified(|state| {
            if state.active_entry != *expected {
                return false;
            }
            state.set_active_entry(entry)
        })
    }

    /// Re-run the initial fetch and wait for it to be applied.
    pub async fn refresh(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::Refresh(done_tx)).is_err() {
            tracing::warn!("Refresh requested on a closed subscription");
            return;
        }
        let _ = done_rx.await;
    }

    /// Stop the reconciliation task and wait until it is gone.
    pub async fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!("Entry subscription closed");
    }
}

impl Drop for EntrySubscription {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn open_listener<S: EntryStore>(store: &S, query: EntryQuery) -> Option<ChangeStream> {
    match store.listen(query).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::error!(error = %e, ?query, "Failed to open change listener");
            None
        }
    }
}

/// Next event, or pending forever once the listener is gone.
async fn next_event(stream: &mut Option<ChangeStream>) -> Option<ChangeEvent> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn load<S: EntryStore>(store: &S, state_tx: &watch::Sender<EntryState>) {
    let fetched = tokio::try_join!(store.fetch_active_entry(), store.fetch_completed_entries());

    match fetched {
        Ok((active_entry, all_entries)) => {
            tracing::info!(
                active = active_entry.is_some(),
                completed = all_entries.len(),
                "Entries loaded"
            );
            state_tx.send_modify(|state| state.populate(active_entry, all_entries));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch entries");
            state_tx.send_if_modified(|state| std::mem::replace(&mut state.loading, false));
        }
    }
}

async fn reconcile<S: EntryStore>(
    store: Arc<S>,
    state_tx: Arc<watch::Sender<EntryState>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut active_events = open_listener(store.as_ref(), EntryQuery::Active).await;
    let mut completed_events = open_listener(store.as_ref(), EntryQuery::Completed).await;

    load(store.as_ref(), &state_tx).await;

    loop {
        tokio::select! {
            event = next_event(&mut active_events) => match event {
                Some(event) => {
                    tracing::debug!(
                        transition = ?event.transition,
                        document_id = %event.document_id,
                        "Active entry event"
                    );
                    state_tx.send_if_modified(|state| state.apply_active_event(&event));
                }
                None => {
                    tracing::warn!("Active entry listener ended");
                    active_events = None;
                }
            },
            event = next_event(&mut completed_events) => match event {
                Some(event) => {
                    tracing::debug!(
                        transition = ?event.transition,
                        document_id = %event.document_id,
                        "Completed entry event"
                    );
                    state_tx.send_if_modified(|state| state.apply_completed_event(&event));
                }
                None => {
                    tracing::warn!("Completed entries listener ended");
                    completed_events = None;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Refresh(done)) => {
                    load(store.as_ref(), &state_tx).await;
                    let _ = done.send(());
                }
                None => break,
            },
        }
    }
}
