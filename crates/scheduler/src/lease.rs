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

//! Lease lifecycle types.
//!
//! A `LeaseRequest` decomposes into per-type `ResourceReq` demand; a granted
//! reservation is a `Lease` moving through the state machine
//!
//! ```text
//! Pending ──all granted──▶ Active ──expire──▶ Expired
//!    │                        │
//!    ├──cancel──▶ Released ◀──cancel─┘
//!    └──unsatisfiable──▶ Failed
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use labpool_inventory::Query;
use labpool_model::ResourceId;

use crate::error::{SchedulerError, SchedulerResult};

/// Stable lease identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LeaseId(Ulid);

impl LeaseId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        LeaseId(Ulid::new())
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LeaseId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(LeaseId)
            .map_err(|e| SchedulerError::Invalid(format!("malformed lease id {s:?}: {e}")))
    }
}

/// Opaque reference to the requesting user. Authentication and identity
/// live outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(String);

impl UserRef {
    /// Wrap an externally issued user reference.
    pub fn new(user: impl Into<String>) -> Self {
        UserRef(user.into())
    }

    /// The raw reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which attribute space a request filter addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterScope {
    /// Free-form labels
    Label,
    /// Reflective property view (factory-declared keys plus built-ins)
    Property,
}

/// One additional filter attached to a `ResourceReq`, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqFilter {
    /// Attribute space
    pub scope: FilterScope,
    /// Operator, key, value set
    pub query: Query,
}

impl ReqFilter {
    /// Label-space filter.
    pub fn label(query: Query) -> Self {
        ReqFilter {
            scope: FilterScope::Label,
            query,
        }
    }

    /// Property-space filter.
    pub fn property(query: Query) -> Self {
        ReqFilter {
            scope: FilterScope::Property,
            query,
        }
    }
}

/// Single-type demand inside a lease request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReq {
    /// Resource type tag to grant from
    pub type_tag: String,
    /// How many resources of this type
    pub count: u32,
    /// Optional exact-name match, applied as the final property filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Additional filters, applied in order after the type filter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ReqFilter>,
}

impl ResourceReq {
    /// Demand `count` resources of `type_tag`.
    pub fn new(type_tag: impl Into<String>, count: u32) -> Self {
        ResourceReq {
            type_tag: type_tag.into(),
            count,
            name: None,
            filters: Vec::new(),
        }
    }

    /// Require an exact name match.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a filter.
    pub fn with_filter(mut self, filter: ReqFilter) -> Self {
        self.filters.push(filter);
        self
    }

    fn validate(&self) -> SchedulerResult<()> {
        if self.type_tag.is_empty() {
            return Err(SchedulerError::Invalid("empty type tag in demand".into()));
        }
        if self.count == 0 {
            return Err(SchedulerError::Invalid(format!(
                "demand for 0 resources of type {:?}",
                self.type_tag
            )));
        }
        Ok(())
    }
}

/// User-submitted reservation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRequest {
    /// Logical group to draw resources from
    pub group: String,
    /// Lease duration in milliseconds; must be strictly positive
    pub duration_ms: i64,
    /// Ordered per-type demand
    pub resources: Vec<ResourceReq>,
}

impl LeaseRequest {
    /// Build a request against a group with the given duration.
    pub fn new(group: impl Into<String>, duration_ms: i64, resources: Vec<ResourceReq>) -> Self {
        LeaseRequest {
            group: group.into(),
            duration_ms,
            resources,
        }
    }

    /// Shape validation applied at submit.
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.group.is_empty() {
            return Err(SchedulerError::Invalid("empty group name".into()));
        }
        if self.duration_ms <= 0 {
            return Err(SchedulerError::Invalid(format!(
                "duration must be positive, got {}ms",
                self.duration_ms
            )));
        }
        if self.resources.is_empty() {
            return Err(SchedulerError::Invalid("request demands no resources".into()));
        }
        for req in &self.resources {
            req.validate()?;
        }
        Ok(())
    }

    /// Requested duration.
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }
}

/// Lease lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    /// Submitted, not yet fully granted
    Pending,
    /// All demand granted; clock running
    Active,
    /// Duration elapsed; terminal
    Expired,
    /// Explicitly revoked; terminal
    Released,
    /// Demand cannot be served; terminal
    Failed,
}

impl LeaseStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeaseStatus::Expired | LeaseStatus::Released | LeaseStatus::Failed
        )
    }
}

/// A granted (or in-flight) reservation.
///
/// Grants accumulate per satisfied `ResourceReq`, in ascending resource-id
/// order within each batch. The grant list is kept for the record after the
/// lease leaves Active; invariants bind lease state to resources only while
/// the lease is Active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Stable identifier
    pub id: LeaseId,
    /// Requesting user
    pub owner: UserRef,
    /// Original request, immutable after submit
    pub request: LeaseRequest,
    /// Granted resource ids; empty until the first demand is satisfied
    #[serde(default)]
    pub grants: Vec<ResourceId>,
    /// Submit time
    #[serde(rename = "requestTime")]
    pub requested_at: DateTime<Utc>,
    /// Activation time; unset until Active
    #[serde(default, rename = "activationTime", skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    /// Lifecycle state
    pub status: LeaseStatus,
    /// Failure reason, set when status is Failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Lease {
    /// Create a pending lease for a validated request.
    pub fn new(owner: UserRef, request: LeaseRequest) -> Self {
        Lease {
            id: LeaseId::generate(),
            owner,
            request,
            grants: Vec::new(),
            requested_at: Utc::now(),
            activated_at: None,
            status: LeaseStatus::Pending,
            reason: None,
        }
    }

    /// True once `now` has passed activation plus the requested duration.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.activated_at {
            Some(activated) if self.status == LeaseStatus::Active => {
                now >= activated + self.request.duration()
            }
            _ => false,
        }
    }
}
