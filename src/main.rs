// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Walk-Log API Server
//!
//! Keeps the household walk dashboard in sync with the entry store and
//! serves it as JSON.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walk_log::{
    config::{Config, StoreBackend},
    db::{EntryBackend, FirestoreDb, MemoryStore},
    services::{Dashboard, NotificationCenter},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        store = ?config.entry_store,
        "Starting Walk-Log API"
    );

    let store = match config.entry_store {
        StoreBackend::Firestore => {
            EntryBackend::Firestore(FirestoreDb::new(&config.gcp_project_id).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory entry store; entries are lost on restart");
            EntryBackend::Memory(MemoryStore::new())
        }
    };

    // Subscribe to live entry state
    let dashboard = Dashboard::open(Arc::new(store), Arc::new(NotificationCenter::new()));

    let state = Arc::new(AppState::new(config.clone(), dashboard));

    // Build router
    let app = walk_log::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("walk_log=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
