// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod dashboard;
pub mod notification;
pub mod statistics;
pub mod subscription;

pub use dashboard::Dashboard;
pub use notification::{
    Notice, NoticeAction, NotificationCenter, NotificationSurface, SessionNotificationController,
    Visibility,
};
pub use subscription::{EntryState, EntrySubscription, EntrySubscriptionManager};
