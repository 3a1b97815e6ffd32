// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change events delivered by a listened query.

use crate::models::Entry;
use serde::{Deserialize, Serialize};

/// Kind of listener message. Only mutations carry document changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Listener established
    Welcome,
    Mutation,
    /// Listener reconnected; events may have been missed
    Reconnect,
}

/// How a mutation affected the listened query's result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Document started matching the query
    Appear,
    /// Document still matches and changed
    Update,
    /// Document stopped matching the query
    Disappear,
    /// Document was deleted
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub transition: Transition,
    #[serde(default)]
    pub document_id: String,
    /// Document state after the mutation, if any
    #[serde(default)]
    pub result: Option<Entry>,
}

impl ChangeEvent {
    pub fn mutation(
        transition: Transition,
        document_id: impl Into<String>,
        result: Option<Entry>,
    ) -> Self {
        Self {
            kind: EventKind::Mutation,
            transition,
            document_id: document_id.into(),
            result,
        }
    }

    pub fn welcome() -> Self {
        Self {
            kind: EventKind::Welcome,
            transition: Transition::Update,
            document_id: String::new(),
            result: None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        self.kind == EventKind::Mutation
    }
}
