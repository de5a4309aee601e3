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

//! Error types for inventory operations.

use labpool_model::{ModelError, Resource, ResourceId};
use thiserror::Error;

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Errors raised by the resource index, group views, and query filters.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Resource id (or type) is not indexed
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Create collided with an already-indexed id
    #[error("resource already exists: {0}")]
    Exists(String),

    /// Delete refused while the resource is leased
    #[error("resource is leased: {0}")]
    Busy(String),

    /// Free→Leased transition lost the race
    #[error("resource already leased: {0}")]
    AlreadyLeased(String),

    /// Property filter addressed a key the factory does not declare
    #[error("unknown property key: {0}")]
    UnknownKey(String),

    /// Index was wiped; all operations are rejected
    #[error("index has been wiped")]
    Wiped,

    /// Malformed query or input
    #[error("invalid: {0}")]
    Invalid(String),

    /// Batch id lookup found only part of the requested set. Callers must
    /// treat the result as all-or-nothing; the partial map rides along for
    /// diagnostics.
    #[error("query missing {} of {} ids", missing.len(), missing.len() + found.len())]
    MissingIds {
        /// Ids absent from the index, in input order
        missing: Vec<ResourceId>,
        /// Resources that were found, in input order
        found: Vec<Resource>,
    },

    /// Factory validation rejected the resource
    #[error(transparent)]
    Model(#[from] ModelError),
}
