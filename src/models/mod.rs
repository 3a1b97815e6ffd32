// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod entry;
pub mod event;
pub mod stats;
pub mod user;

pub use entry::{CompleteEntry, Entry, EntryId, EntryMode, EntryStatus, Location, NewManualEntry};
pub use event::{ChangeEvent, EventKind, Transition};
pub use stats::{EntryStats, PoopPeeDay, TopWalker, TripsDay};
pub use user::User;
