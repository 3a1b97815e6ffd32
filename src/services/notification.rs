// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session notifications.
//!
//! When the app comes back to the foreground (or the set of people out on
//! the active walk changes), the session user gets one notice telling them
//! whether a walk is in progress and, if they are not on it, offering to
//! join. Notices carry a stable id so a newer one replaces the older one.

use crate::models::{Entry, EntryId, User};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Id of the foreground status notice.
pub const SESSION_NOTICE_ID: &str = "session-status";
/// Id of the "you joined" confirmation.
pub const JOIN_NOTICE_ID: &str = "join-confirmation";

const WELCOME_BACK: &str = "Klar for ny tur? Velkommen tilbake!";
const HOPE_YOU_HAD_FUN: &str = "Håper du har hatt en fin tur!";
const HOW_TO_START: &str = "Trykk på start for å begynne en ny tur";
const HOW_TO_STOP: &str = "Trykk på stopp for å avslutte turen";
const JOIN_LABEL: &str = "Bli med";
const JOINED: &str = "Du er med på turen!";
const SOMEONE: &str = "Noen";

/// Host view visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Action attached to a notice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NoticeAction {
    /// Add the session user to the walk
    JoinWalk { label: String, entry_id: EntryId },
}

/// A transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<NoticeAction>,
}

/// Where notices are shown. Implementations replace notices by id.
pub trait NotificationSurface: Send + Sync + 'static {
    fn notify(&self, notice: Notice);
}

/// In-memory surface holding the latest notice per id.
#[derive(Default)]
pub struct NotificationCenter {
    notices: DashMap<String, Notice>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Notice> {
        self.notices.get(id).map(|n| n.value().clone())
    }

    /// All current notices, ordered by id.
    pub fn all(&self) -> Vec<Notice> {
        let mut notices: Vec<Notice> = self.notices.iter().map(|n| n.value().clone()).collect();
        notices.sort_by(|a, b| a.id.cmp(&b.id));
        notices
    }

    pub fn dismiss(&self, id: &str) -> Option<Notice> {
        self.notices.remove(id).map(|(_, notice)| notice)
    }
}

impl NotificationSurface for NotificationCenter {
    fn notify(&self, notice: Notice) {
        tracing::debug!(id = %notice.id, message = %notice.message, "Notice surfaced");
        self.notices.insert(notice.id.clone(), notice);
    }
}

/// How the session user relates to the active walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAssessment {
    pub session_user_is_walking: bool,
    pub can_join: bool,
}

pub fn assess(active: Option<&Entry>, session: Option<&User>) -> SessionAssessment {
    let session_user_is_walking = match (active, session) {
        (Some(entry), Some(user)) => entry.has_participant(&user.email),
        _ => false,
    };
    SessionAssessment {
        session_user_is_walking,
        can_join: active.is_some() && session.is_some() && !session_user_is_walking,
    }
}

/// "Kari", "Kari og Ola", "Kari, Ola og Per".
pub fn walker_names(users: &[User]) -> String {
    let names: Vec<&str> = users.iter().map(User::display_name).collect();
    match names.as_slice() {
        [] => SOMEONE.to_string(),
        [only] => only.to_string(),
        [rest @ .., last] => format!("{} og {}", rest.join(", "), last),
    }
}

/// The notice for the current state.
pub fn session_notice(active: Option<&Entry>, session: Option<&User>) -> Notice {
    let assessment = assess(active, session);

    let (message, description) = match active {
        None => (WELCOME_BACK.to_string(), HOW_TO_START),
        Some(_) if assessment.session_user_is_walking => (HOPE_YOU_HAD_FUN.to_string(), HOW_TO_STOP),
        Some(entry) => (
            format!("{} er ute på tur", walker_names(&entry.users)),
            HOW_TO_STOP,
        ),
    };

    let action = match active {
        Some(entry) if assessment.can_join => Some(NoticeAction::JoinWalk {
            label: JOIN_LABEL.to_string(),
            entry_id: entry.id.clone(),
        }),
        _ => None,
    };

    Notice {
        id: SESSION_NOTICE_ID.to_string(),
        message,
        description: Some(description.to_string()),
        action,
    }
}

/// Surfaces session notices on a [`NotificationSurface`].
///
/// Remembers the last reported visibility per session user (an absent
/// session is tracked under the empty key). Views start out visible.
pub struct SessionNotificationController<N> {
    surface: Arc<N>,
    visibility: Arc<DashMap<String, Visibility>>,
}

impl<N> Clone for SessionNotificationController<N> {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            visibility: self.visibility.clone(),
        }
    }
}

impl<N: NotificationSurface> SessionNotificationController<N> {
    pub fn new(surface: Arc<N>) -> Self {
        Self {
            surface,
            visibility: Arc::new(DashMap::new()),
        }
    }

    /// Record a visibility report. True only when a hidden view became visible.
    pub fn regains_visibility(&self, visibility: Visibility, session: Option<&User>) -> bool {
        let key = session.map(|u| u.email.clone()).unwrap_or_default();
        let previous = self
            .visibility
            .insert(key, visibility)
            .unwrap_or(Visibility::Visible);
        previous == Visibility::Hidden && visibility == Visibility::Visible
    }

    pub fn surface(&self) -> &N {
        &self.surface
    }

    /// Evaluate and show the session notice. Returns what was shown.
    pub fn surface_session_notice(&self, active: Option<&Entry>, session: Option<&User>) -> Notice {
        let notice = session_notice(active, session);
        self.surface.notify(notice.clone());
        notice
    }

    /// Handle a visibility report. Only a hidden view turning visible shows
    /// a notice; repeated reports of the same state show nothing.
    pub fn on_visibility_change(
        &self,
        visibility: Visibility,
        active: Option<&Entry>,
        session: Option<&User>,
    ) -> Option<Notice> {
        self.regains_visibility(visibility, session)
            .then(|| self.surface_session_notice(active, session))
    }

    pub fn confirm_join(&self) -> Notice {
        let notice = Notice {
            id: JOIN_NOTICE_ID.to_string(),
            message: JOINED.to_string(),
            description: None,
            action: None,
        };
        self.surface.notify(notice.clone());
        notice
    }
}
