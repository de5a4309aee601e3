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

//! # LabPool Inventory
//!
//! ## Purpose
//! The concurrent in-memory store of resources and the read paths over it:
//! - **ResourceIndex**: dual projection (by id, by type) under one
//!   readers-writer lock; the only mutation path for resource status.
//! - **Group**: label-defined logical view with a free pool and the
//!   Free→Leased compare-and-set used by the scheduler.
//! - **Query filters**: composable type/label/property filters.
//!
//! ## Design
//! - Writers hold the exclusive lock across both projections; readers return
//!   defensive copies, never references into the maps.
//! - Lease-state transitions happen on the indexed instance under the writer
//!   lock, so two concurrent acquisitions of the same resource cannot both
//!   succeed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod group;
pub mod index;
pub mod query;
pub mod source;

pub use error::{InventoryError, InventoryResult};
pub use group::Group;
pub use index::ResourceIndex;
pub use query::{filter_label, filter_property, filter_type, Query, QueryOp};
pub use source::{ResourceSource, StaticSource};
