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

//! The leasable resource and its stable identifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{ModelError, ModelResult};
use crate::status::{LeaseState, ResState, Status};

/// Well-known label key that binds a resource to a logical group.
pub const GROUP_LABEL: &str = "system.group";

/// Opaque 128-bit resource identifier, stable for the life of the resource.
///
/// ULID byte order defines the total order used for deterministic grant
/// ordering within a batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceId(Ulid);

impl ResourceId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        ResourceId(Ulid::new())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ResourceId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(ResourceId)
            .map_err(|e| ModelError::Invalid(format!("malformed resource id {s:?}: {e}")))
    }
}

/// The unit of reservation.
///
/// A resource carries a closed-set type tag, free-form labels, and a flat
/// map of type-specific properties (the exported fields addressable by the
/// property filter). The owning index holds the only mutable instance; all
/// reads hand out clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    name: String,
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    status: Status,
}

impl Resource {
    /// Create a resource with a freshly generated id and default status.
    pub fn new(type_tag: impl Into<String>, name: impl Into<String>) -> Self {
        Resource {
            id: ResourceId::generate(),
            name: name.into(),
            type_tag: type_tag.into(),
            labels: BTreeMap::new(),
            properties: BTreeMap::new(),
            status: Status::default(),
        }
    }

    /// Replace the generated id (snapshot ingest and tests).
    pub fn with_id(mut self, id: ResourceId) -> Self {
        self.id = id;
        self
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Bind the resource to a logical group (`system.group` label).
    pub fn with_group(self, group: impl Into<String>) -> Self {
        self.with_label(GROUP_LABEL, group)
    }

    /// Add a type-specific property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replace the status record.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Stable identifier.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Human-facing name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type tag from the factory-registered closed set.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Label map.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Look up one label.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// The logical group this resource belongs to, if any.
    pub fn group(&self) -> Option<&str> {
        self.label(GROUP_LABEL)
    }

    /// Type-specific property map.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Status record.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Reflective property view used by the property filter: the built-ins
    /// `id`, `name`, `type`, then the type-specific property map.
    pub fn property(&self, key: &str) -> Option<String> {
        match key {
            "id" => Some(self.id.to_string()),
            "name" => Some(self.name.clone()),
            "type" => Some(self.type_tag.clone()),
            _ => self.properties.get(key).cloned(),
        }
    }

    /// Set the administrative state. Serialized by the owning index.
    pub fn set_state(&mut self, state: ResState) {
        self.status.state = state;
    }

    /// Set the lease state. Serialized by the owning index.
    pub fn set_lease_state(&mut self, lease: LeaseState) {
        self.status.lease = lease;
    }

    /// Basic shape check shared by all types: non-empty name and type tag.
    pub fn check_shape(&self) -> ModelResult<()> {
        if self.type_tag.is_empty() {
            return Err(ModelError::Invalid("empty type tag".to_string()));
        }
        if self.name.is_empty() {
            return Err(ModelError::Invalid("empty resource name".to_string()));
        }
        Ok(())
    }
}
