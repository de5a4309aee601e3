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

//! # LabPool Resource Model
//!
//! ## Purpose
//! Defines the unit of reservation: a typed, labeled `Resource` with a stable
//! 128-bit identifier and a two-axis `Status` (administrative state and lease
//! state), plus the `ResourceFactory` seam that injects type-specific
//! construction, validation, and property reflection.
//!
//! ## Architecture Context
//! This crate is the leaf of the workspace: `labpool_inventory` indexes
//! resources, `labpool_scheduler` grants them to leases. Nothing here is
//! async or locked; all concurrency control lives in the index.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod factory;
pub mod resource;
pub mod status;

pub use error::{ModelError, ModelResult};
pub use factory::{RegistryFactory, ResourceFactory, TypeSpec};
pub use resource::{Resource, ResourceId, GROUP_LABEL};
pub use status::{LeaseState, ResState, Status};
