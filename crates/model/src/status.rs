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

//! Per-resource status record.
//!
//! The two axes are orthogonal: `state` says whether the resource is
//! administratively usable, `lease` says whether it is currently committed
//! to a lease. Transitions are serialized by the owning index; no other
//! mutation path exists.

use serde::{Deserialize, Serialize};

/// Administrative state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResState {
    /// Resource is administratively usable
    Active,
    /// Resource is administratively disabled (still indexed, never granted)
    Inactive,
}

/// Lease commitment state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseState {
    /// Not committed to any lease
    Free,
    /// Committed to exactly one active lease
    Leased,
}

/// Status record carried by every resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    /// Administrative axis
    pub state: ResState,
    /// Lease axis
    pub lease: LeaseState,
}

impl Default for Status {
    fn default() -> Self {
        Status {
            state: ResState::Active,
            lease: LeaseState::Free,
        }
    }
}

impl Status {
    /// True when the resource can be granted: usable and uncommitted.
    pub fn is_grantable(&self) -> bool {
        self.state == ResState::Active && self.lease == LeaseState::Free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_active_free() {
        let status = Status::default();
        assert_eq!(status.state, ResState::Active);
        assert_eq!(status.lease, LeaseState::Free);
        assert!(status.is_grantable());
    }

    #[test]
    fn leased_or_inactive_is_not_grantable() {
        let leased = Status {
            state: ResState::Active,
            lease: LeaseState::Leased,
        };
        assert!(!leased.is_grantable());

        let inactive = Status {
            state: ResState::Inactive,
            lease: LeaseState::Free,
        };
        assert!(!inactive.is_grantable());
    }
}
