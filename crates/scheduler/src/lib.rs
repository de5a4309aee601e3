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

//! # LabPool Scheduler
//!
//! ## Purpose
//! Concurrent lease scheduling over the shared resource index:
//! - **LeaseScheduler**: accepts reservation requests, fans per-type demand
//!   out to FIFO queues keyed by (group, type), and activates leases once
//!   every demand is granted.
//! - **Lease lifecycle**: Pending → Active → Expired, with Released and
//!   Failed as the other terminal states.
//! - **Stall/wake**: a worker that cannot satisfy its queue head suspends on
//!   the stall gate until a release, expiry, or inventory change signals it.
//! - **Snapshot**: versioned JSON serialization of resources and leases with
//!   restore, including re-queue of unsatisfied pending demand.
//!
//! ## Design
//! - Grants happen through the index's Free→Leased compare-and-set, so
//!   workers on different queues can race for the same resource and exactly
//!   one wins; the loser re-evaluates and stalls if nothing is left.
//! - Submit never blocks on inventory: callers get a [`LeaseHandle`] and
//!   observe progress through it.
//! - Statically unsatisfiable demand fails the lease instead of stalling
//!   forever; a failed or cancelled lease releases every grant it held.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod lease;
pub mod notifier;
mod queue;
pub mod scheduler;
pub mod snapshot;
mod stall;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use lease::{
    FilterScope, Lease, LeaseId, LeaseRequest, LeaseStatus, ReqFilter, ResourceReq, UserRef,
};
pub use notifier::{LeaseEvent, LogNotifier, NoopNotifier, Notifier};
pub use scheduler::{LeaseHandle, LeaseScheduler, StatsView};
pub use snapshot::{JsonFileStore, Snapshot, Snapshotter, SCHEMA_VERSION};
