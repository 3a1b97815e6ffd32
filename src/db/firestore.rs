// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides:
//! - Queries for the active walk and the completed history
//! - Entry mutations (start, join, complete, delete)
//! - Query listeners translated into [`ChangeEvent`]s

use crate::db::{collections, ChangeStream, EntryMutations, EntryQuery, EntryStore};
use crate::error::AppError;
use crate::models::{
    ChangeEvent, CompleteEntry, Entry, EntryId, NewManualEntry, Transition, User,
};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use firestore::{
    FirestoreListenEvent, FirestoreListenerTarget, FirestoreMemListenStateStorage,
    FirestoreQueryDirection,
};
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator needs an unauthenticated connection.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Get an entry by document id.
    pub async fn get_entry(&self, entry_id: &str) -> Result<Option<Entry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ENTRIES)
            .obj()
            .one(entry_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write an entry under its own id.
    pub async fn set_entry(&self, entry: &Entry) -> Result<(), AppError> {
        let entry_id = entry
            .id
            .as_persisted()
            .ok_or_else(|| AppError::BadRequest("Cannot store a pending entry".to_string()))?;

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ENTRIES)
            .document_id(entry_id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Look up the document behind a payload-less `disappear`.
    async fn complete_removal(&self, event: ChangeEvent) -> ChangeEvent {
        if event.transition != Transition::Disappear || event.result.is_some() {
            return event;
        }
        match self.get_entry(&event.document_id).await {
            Ok(current) => settle_removal(event, current),
            Err(e) => {
                tracing::warn!(
                    document_id = %event.document_id,
                    error = %e,
                    "Failed to look up removed entry"
                );
                event
            }
        }
    }

    /// Fetch-modify-write of a single entry.
    async fn modify_entry<F>(&self, entry_id: &str, change: F) -> Result<Entry, AppError>
    where
        F: FnOnce(&mut Entry),
    {
        let mut entry = self
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Entry {} not found", entry_id)))?;
        change(&mut entry);
        self.set_entry(&entry).await?;
        Ok(entry)
    }
}

/// Document id for a new entry, derived from a timestamp.
fn entry_id_at(time: DateTime<Utc>) -> EntryId {
    let nanos = time
        .timestamp_nanos_opt()
        .unwrap_or_else(|| time.timestamp_micros() * 1_000);
    EntryId::Persisted(format!("entry-{}", nanos))
}

/// Fill in a removal that arrived without the document.
///
/// A document that left the query but still exists keeps its `disappear`
/// transition and gets its current state as payload. A document that no
/// longer exists is reported as a `delete`.
fn settle_removal(mut event: ChangeEvent, current: Option<Entry>) -> ChangeEvent {
    match current {
        Some(entry) => event.result = Some(entry),
        None => event.transition = Transition::Delete,
    }
    event
}

/// Listener target ids, one per watched query.
fn target_id(query: EntryQuery) -> u32 {
    match query {
        EntryQuery::Active => 1,
        EntryQuery::Completed => 2,
    }
}

/// Last path segment of a document name
/// (`projects/p/databases/(default)/documents/entries/{id}`).
fn document_id_from_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Translate one listener response into a change event for `target`.
///
/// `members` tracks which documents currently match the query so that
/// additions can be told apart from updates.
fn translate_listen_event(
    event: &FirestoreListenEvent,
    target: i32,
    members: &DashSet<String>,
) -> Option<ChangeEvent> {
    match event {
        FirestoreListenEvent::DocumentChange(change) => {
            let document = change.document.as_ref()?;
            let document_id = document_id_from_name(&document.name).to_string();
            let result = match firestore::FirestoreDb::deserialize_doc_to::<Entry>(document) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(
                        document_id = %document_id,
                        error = %e,
                        "Ignoring malformed entry document"
                    );
                    None
                }
            };

            if change.target_ids.contains(&target) {
                let transition = if members.insert(document_id.clone()) {
                    Transition::Appear
                } else {
                    Transition::Update
                };
                Some(ChangeEvent::mutation(transition, document_id, result))
            } else if change.removed_target_ids.contains(&target) {
                members.remove(&document_id);
                Some(ChangeEvent::mutation(
                    Transition::Disappear,
                    document_id,
                    result,
                ))
            } else {
                None
            }
        }
        FirestoreListenEvent::DocumentDelete(delete) => {
            let document_id = document_id_from_name(&delete.document).to_string();
            members
                .remove(&document_id)
                .map(|_| ChangeEvent::mutation(Transition::Delete, document_id, None))
        }
        FirestoreListenEvent::DocumentRemove(remove) => {
            let document_id = document_id_from_name(&remove.document).to_string();
            members
                .remove(&document_id)
                .map(|_| ChangeEvent::mutation(Transition::Disappear, document_id, None))
        }
        _ => None,
    }
}

impl EntryStore for FirestoreDb {
    async fn fetch_active_entry(&self) -> Result<Option<Entry>, AppError> {
        let entries: Vec<Entry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ENTRIES)
            .filter(|q| {
                q.for_all([
                    q.field("status").eq("active"),
                    q.field("mode").eq("auto"),
                ])
            })
            .order_by([("startTime", FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(entries.into_iter().next())
    }

    async fn fetch_completed_entries(&self) -> Result<Vec<Entry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ENTRIES)
            .filter(|q| q.for_all([q.field("status").eq("completed")]))
            .order_by([("endTime", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn listen(&self, query: EntryQuery) -> Result<ChangeStream, AppError> {
        let client = self.get_client()?;
        let target = target_id(query);

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(|e| AppError::Database(format!("Failed to create listener: {}", e)))?;

        let select = client.fluent().select().from(collections::ENTRIES);
        match query {
            EntryQuery::Active => select
                .filter(|q| {
                    q.for_all([
                        q.field("status").eq("active"),
                        q.field("mode").eq("auto"),
                    ])
                })
                .listen()
                .add_target(FirestoreListenerTarget::new(target), &mut listener),
            EntryQuery::Completed => select
                .filter(|q| q.for_all([q.field("status").eq("completed")]))
                .listen()
                .add_target(FirestoreListenerTarget::new(target), &mut listener),
        }
        .map_err(|e| AppError::Database(format!("Failed to add listen target: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ChangeEvent::welcome());

        let members: Arc<DashSet<String>> = Arc::new(DashSet::new());
        let events_tx = tx.clone();
        let db = self.clone();
        listener
            .start(move |event| {
                let tx = events_tx.clone();
                let members = members.clone();
                let db = db.clone();
                async move {
                    if let Some(change) = translate_listen_event(&event, target as i32, &members) {
                        let _ = tx.send(db.complete_removal(change).await);
                    }
                    Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                }
            })
            .await
            .map_err(|e| AppError::Database(format!("Failed to start listener: {}", e)))?;

        tracing::info!(?query, target_id = target, "Firestore listener started");

        // Keep the listener alive until the consumer drops the stream.
        tokio::spawn(async move {
            tx.closed().await;
            if let Err(e) = listener.shutdown().await {
                tracing::warn!(error = %e, ?query, "Failed to shut down Firestore listener");
            }
            tracing::debug!(?query, "Firestore listener stopped");
        });

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }
}

impl EntryMutations for FirestoreDb {
    async fn start_entry(
        &self,
        start_time: DateTime<Utc>,
        starter: Option<User>,
    ) -> Result<Entry, AppError> {
        let mut entry = Entry::pending(start_time, starter);
        entry.id = entry_id_at(start_time);

        self.set_entry(&entry).await?;
        tracing::info!(entry_id = %entry.id, "Walk started");
        Ok(entry)
    }

    async fn append_user_to_entry(&self, entry_id: &str, user: &User) -> Result<(), AppError> {
        self.modify_entry(entry_id, |entry| {
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
        self.modify_entry(entry_id, |entry| entry.complete(completion))
            .await
    }

    async fn create_manual_entry(
        &self,
        input: &NewManualEntry,
        author: Option<User>,
    ) -> Result<Entry, AppError> {
        let mut entry = Entry::manual(input, author);
        entry.id = entry_id_at(Utc::now());

        self.set_entry(&entry).await?;
        tracing::info!(entry_id = %entry.id, "Manual entry added");
        Ok(entry)
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ENTRIES)
            .document_id(entry_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
