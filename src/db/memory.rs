// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process entry store.
//!
//! Keeps documents in memory and feeds listeners the same change events a
//! remote store would: each write is classified per listened query as
//! `appear`, `update` or `disappear` from query membership before and after,
//! and deletes of matching documents are reported as `delete`.

use crate::db::{ChangeStream, EntryMutations, EntryQuery, EntryStore};
use crate::error::AppError;
use crate::models::{ChangeEvent, CompleteEntry, Entry, EntryId, NewManualEntry, Transition, User};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};

struct Listener {
    query: EntryQuery,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct Documents {
    entries: Vec<Entry>,
    listeners: Vec<Listener>,
}

/// Entry store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Documents>,
    next_id: AtomicU64,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries. Pending ids are assigned.
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        let mut store = Self::new();
        let seeded: Vec<Entry> = entries
            .into_iter()
            .map(|mut entry| {
                if entry.id.is_pending() {
                    entry.id = store.generate_id();
                }
                entry
            })
            .collect();
        store.documents.get_mut().entries = seeded;
        store
    }

    /// Make every mutation fail, as if the store were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn get(&self, entry_id: &str) -> Option<Entry> {
        let documents = self.documents.lock().await;
        documents
            .entries
            .iter()
            .find(|e| e.id.is_document(entry_id))
            .cloned()
    }

    /// Create or replace a document and notify listeners.
    pub async fn put(&self, mut entry: Entry) -> Result<Entry, AppError> {
        self.check_online()?;
        if entry.id.is_pending() {
            entry.id = self.generate_id();
        }

        let mut documents = self.documents.lock().await;
        let previous = match documents.entries.iter().position(|e| e.id == entry.id) {
            Some(i) => Some(std::mem::replace(&mut documents.entries[i], entry.clone())),
            None => {
                documents.entries.push(entry.clone());
                None
            }
        };
        documents.broadcast(previous.as_ref(), Some(&entry));

        Ok(entry)
    }

    fn generate_id(&self) -> EntryId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        EntryId::Persisted(format!("entry-{}", n))
    }

    fn check_online(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Database("Store unavailable".to_string()));
        }
        Ok(())
    }

    async fn update_existing<F>(&self, entry_id: &str, change: F) -> Result<Entry, AppError>
    where
        F: FnOnce(&mut Entry),
    {
        self.check_online()?;
        let mut documents = self.documents.lock().await;
        let position = documents
            .entries
            .iter()
            .position(|e| e.id.is_document(entry_id))
            .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", entry_id)))?;

        let previous = documents.entries[position].clone();
        change(&mut documents.entries[position]);
        let updated = documents.entries[position].clone();
        documents.broadcast(Some(&previous), Some(&updated));

        Ok(updated)
    }
}

impl Documents {
    fn broadcast(&mut self, before: Option<&Entry>, after: Option<&Entry>) {
        let Some(document_id) = after
            .or(before)
            .and_then(|e| e.id.as_persisted())
            .map(str::to_string)
        else {
            return;
        };

        // Drop listeners whose streams were dropped.
        self.listeners.retain(|l| !l.tx.is_closed());

        for listener in &self.listeners {
            let was = before.is_some_and(|e| listener.query.matches(e));
            let transition = match after {
                None if was => Transition::Delete,
                None => continue,
                Some(entry) => match (was, listener.query.matches(entry)) {
                    (false, true) => Transition::Appear,
                    (true, true) => Transition::Update,
                    (true, false) => Transition::Disappear,
                    (false, false) => continue,
                },
            };

            let event = ChangeEvent::mutation(transition, document_id.clone(), after.cloned());
            // Closed receivers are pruned on the next write.
            let _ = listener.tx.send(event);
        }
    }
}

impl EntryStore for MemoryStore {
    async fn fetch_active_entry(&self) -> Result<Option<Entry>, AppError> {
        let documents = self.documents.lock().await;
        Ok(documents
            .entries
            .iter()
            .filter(|e| EntryQuery::Active.matches(e))
            .max_by_key(|e| e.start_time)
            .cloned())
    }

    async fn fetch_completed_entries(&self) -> Result<Vec<Entry>, AppError> {
        let documents = self.documents.lock().await;
        let mut completed: Vec<Entry> = documents
            .entries
            .iter()
            .filter(|e| EntryQuery::Completed.matches(e))
            .cloned()
            .collect();
        completed.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        Ok(completed)
    }

    async fn listen(&self, query: EntryQuery) -> Result<ChangeStream, AppError> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Listeners get a welcome message first, like a remote listener would.
        let _ = tx.send(ChangeEvent::welcome());
        self.documents
            .lock()
            .await
            .listeners
            .push(Listener { query, tx });

        tracing::debug!(?query, "Memory listener registered");

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }
}

impl EntryMutations for MemoryStore {
    async fn start_entry(
        &self,
        start_time: DateTime<Utc>,
        starter: Option<User>,
    ) -> Result<Entry, AppError> {
        self.put(Entry::pending(start_time, starter)).await
    }

    async fn append_user_to_entry(&self, entry_id: &str, user: &User) -> Result<(), AppError> {
        self.update_existing(entry_id, |entry| {
            if !entry.has_participant(&user.email) {
                entry.users.push(user.clone());
            }
        })
        .await?;
        Ok(())
    }

    async fn complete_entry(
        &self,
        entry_id: &str,
        completion: &CompleteEntry,
    ) -> Result<Entry, AppError> {
        self.update_existing(entry_id, |entry| entry.complete(completion))
            .await
    }

    async fn create_manual_entry(
        &self,
        input: &NewManualEntry,
        author: Option<User>,
    ) -> Result<Entry, AppError> {
        self.put(Entry::manual(input, author)).await
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<(), AppError> {
        self.check_online()?;
        let mut documents = self.documents.lock().await;
        let position = documents
            .entries
            .iter()
            .position(|e| e.id.is_document(entry_id))
            .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", entry_id)))?;
        let removed = documents.entries.remove(position);
        documents.broadcast(Some(&removed), None);
        Ok(())
    }
}
