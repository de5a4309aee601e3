// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 LabPool Contributors
//
// This file is part of LabPool.
//
// LabPool is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// LabPool is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with LabPool. If not, see <https://www.gnu.org/licenses/>.

//! Notification seam.
//!
//! The scheduler reports lease transitions through this trait; delivery
//! (e-mail, chat, webhooks) is a deployment concern and stays outside the
//! core.

use async_trait::async_trait;
use tracing::info;

use crate::lease::{LeaseId, LeaseStatus, UserRef};

/// One lease transition, as seen by a notifier.
#[derive(Debug, Clone)]
pub struct LeaseEvent {
    /// Lease that changed
    pub lease_id: LeaseId,
    /// Owner of the lease
    pub owner: UserRef,
    /// State entered
    pub status: LeaseStatus,
    /// Failure reason, when entering Failed
    pub reason: Option<String>,
}

/// Consumer of lease transitions.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called after every externally observable lease transition.
    async fn lease_changed(&self, event: LeaseEvent);
}

/// Discards all events.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn lease_changed(&self, _event: LeaseEvent) {}
}

/// Logs events through `tracing`.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn lease_changed(&self, event: LeaseEvent) {
        info!(
            lease = %event.lease_id,
            owner = %event.owner,
            status = ?event.status,
            reason = event.reason.as_deref().unwrap_or(""),
            "lease transition"
        );
    }
}
