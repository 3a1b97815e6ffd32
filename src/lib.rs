// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Walk-Log: a shared household log of dog walks
//!
//! This crate keeps a live view of the walk in progress and the completed
//! history in sync with the document store, derives the dashboard
//! statistics, and serves both over a small JSON API.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::EntryBackend;
use services::{Dashboard, NotificationCenter};
use tokio::task::JoinHandle;

/// Dashboard over whichever store was configured.
pub type WalkDashboard = Dashboard<EntryBackend, NotificationCenter>;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub dashboard: WalkDashboard,
    /// Re-announces the walk whenever the people on it change.
    walker_watch: JoinHandle<()>,
}

impl AppState {
    /// Wrap the dashboard and start watching who is out walking.
    ///
    /// The server has no session of its own, so walker notices carry no
    /// join action. Must be called from within a tokio runtime.
    pub fn new(config: Config, dashboard: WalkDashboard) -> Self {
        let walker_watch = dashboard.watch_walkers(None);
        Self {
            config,
            dashboard,
            walker_watch,
        }
    }

    /// Notices currently shown, sorted by id.
    pub fn notices(&self) -> Vec<services::Notice> {
        self.dashboard.notifications().surface().all()
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.walker_watch.abort();
    }
}
