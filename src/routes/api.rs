// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON API over the dashboard.

use crate::error::{AppError, Result};
use crate::middleware::session::SessionUser;
use crate::models::{CompleteEntry, Entry, EntryStats, NewManualEntry, PoopPeeDay, TripsDay};
use crate::services::{Notice, Visibility};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Read-only dashboard routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/active", get(get_active))
        .route("/api/entries", get(get_entries))
        .route("/api/stats", get(get_stats))
        .route("/api/charts/poop-pee", get(get_poop_pee_chart))
        .route("/api/charts/trips", get(get_trips_chart))
}

/// Routes acting on behalf of the session user.
/// The session middleware is applied in routes/mod.rs.
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/entries/start", post(start_walk))
        .route("/api/entries/join", post(join_walk))
        .route("/api/entries/manual", post(add_manual_entry))
        .route("/api/entries/{id}/complete", post(complete_entry))
        .route("/api/entries/{id}", delete(abandon_walk))
        .route("/api/visibility", post(visibility_changed))
        .route("/api/notices", get(get_notices))
        .route("/api/notices/{id}", delete(dismiss_notice))
}

// ─── Live State ──────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ActiveResponse {
    pub active_entry: Option<Entry>,
    pub loading: bool,
}

async fn get_active(State(state): State<Arc<AppState>>) -> Json<ActiveResponse> {
    let snapshot = state.dashboard.snapshot();
    Json(ActiveResponse {
        active_entry: snapshot.active_entry,
        loading: snapshot.loading,
    })
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EntriesResponse {
    pub entries: Vec<Entry>,
    pub loading: bool,
}

/// Completed entries, most recent first.
async fn get_entries(State(state): State<Arc<AppState>>) -> Json<EntriesResponse> {
    let snapshot = state.dashboard.snapshot();
    Json(EntriesResponse {
        entries: snapshot.all_entries,
        loading: snapshot.loading,
    })
}

// ─── Statistics ──────────────────────────────────────────────

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<EntryStats> {
    Json(state.dashboard.stats())
}

async fn get_poop_pee_chart(State(state): State<Arc<AppState>>) -> Json<Vec<PoopPeeDay>> {
    Json(state.dashboard.poop_pee_chart())
}

async fn get_trips_chart(State(state): State<Arc<AppState>>) -> Json<Vec<TripsDay>> {
    Json(state.dashboard.trips_chart())
}

// ─── Walk Actions ────────────────────────────────────────────

async fn start_walk(
    State(state): State<Arc<AppState>>,
    Extension(SessionUser(user)): Extension<SessionUser>,
) -> Result<(StatusCode, Json<Entry>)> {
    let entry = state.dashboard.start_walk(&user).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn join_walk(
    State(state): State<Arc<AppState>>,
    Extension(SessionUser(user)): Extension<SessionUser>,
) -> Result<Json<Entry>> {
    Ok(Json(state.dashboard.join_walk(&user).await?))
}

async fn complete_entry(
    State(state): State<Arc<AppState>>,
    Extension(SessionUser(user)): Extension<SessionUser>,
    Path(entry_id): Path<String>,
    Json(completion): Json<CompleteEntry>,
) -> Result<Json<Entry>> {
    tracing::debug!(entry_id = %entry_id, user = %user.email, "Completing entry");

    if let Some(start) = state
        .dashboard
        .snapshot()
        .active_entry
        .filter(|e| e.id.is_document(&entry_id))
        .map(|e| e.start_time)
    {
        if completion.end_time < start {
            return Err(AppError::BadRequest(
                "End time must not be before start time".to_string(),
            ));
        }
    }

    Ok(Json(
        state
            .dashboard
            .submit_entry(&entry_id, &completion)
            .await?,
    ))
}

/// Record a finished entry that was not tracked live.
async fn add_manual_entry(
    State(state): State<Arc<AppState>>,
    Extension(SessionUser(user)): Extension<SessionUser>,
    Json(input): Json<NewManualEntry>,
) -> Result<(StatusCode, Json<Entry>)> {
    let entry = state.dashboard.add_manual_entry(Some(&user), &input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn abandon_walk(
    State(state): State<Arc<AppState>>,
    Extension(SessionUser(user)): Extension<SessionUser>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode> {
    tracing::info!(entry_id = %entry_id, user = %user.email, "Abandoning walk");
    state.dashboard.abandon_walk(&entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Session Notices ─────────────────────────────────────────

#[derive(Deserialize)]
struct VisibilityRequest {
    visible: bool,
}

/// Called by the client when the page is shown or hidden.
async fn visibility_changed(
    State(state): State<Arc<AppState>>,
    Extension(SessionUser(user)): Extension<SessionUser>,
    Json(request): Json<VisibilityRequest>,
) -> Json<Option<Notice>> {
    let visibility = if request.visible {
        Visibility::Visible
    } else {
        Visibility::Hidden
    };
    Json(
        state
            .dashboard
            .on_visibility_change(visibility, Some(&user))
            .await,
    )
}

async fn get_notices(State(state): State<Arc<AppState>>) -> Json<Vec<Notice>> {
    Json(state.notices())
}

async fn dismiss_notice(
    State(state): State<Arc<AppState>>,
    Path(notice_id): Path<String>,
) -> Result<StatusCode> {
    state
        .dashboard
        .notifications()
        .surface()
        .dismiss(&notice_id)
        .ok_or_else(|| AppError::NotFound(format!("Notice {} not found", notice_id)))?;
    Ok(StatusCode::NO_CONTENT)
}
