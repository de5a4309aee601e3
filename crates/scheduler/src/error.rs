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

//! Error types for the lease scheduler.

use labpool_inventory::InventoryError;
use thiserror::Error;

use crate::lease::LeaseId;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors surfaced by the scheduler API.
///
/// A lost Free→Leased race (`InventoryError::AlreadyLeased`) is retried
/// internally and never reaches this enum.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Lease id is not known to the scheduler
    #[error("lease not found: {0}")]
    NotFound(LeaseId),

    /// Operation against a lease in a terminal state
    #[error("lease is terminal: {0}")]
    Terminal(LeaseId),

    /// Malformed request (zero count, non-positive duration, empty demand)
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Submit after stop
    #[error("scheduler is shut down")]
    Shutdown,

    /// The request cannot be served by any inventory in the group
    #[error("unsatisfiable request: {0}")]
    Unsatisfiable(String),

    /// Snapshot document with a schema version this build does not know
    #[error("unsupported snapshot schema version: {0}")]
    UnsupportedSchema(u32),

    /// Blocking wait exceeded its timeout
    #[error("timed out")]
    Timeout,

    /// Inventory operation failed
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Snapshot (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
