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

//! Persisted state layout.
//!
//! A versioned JSON document with two arrays: `resources` and `leases`.
//! Timestamps serialize as RFC3339 UTC (chrono's serde default). Documents
//! carrying an unknown `schemaVersion` refuse to load.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use labpool_inventory::{InventoryError, InventoryResult, ResourceSource};
use labpool_model::Resource;

use crate::error::{SchedulerError, SchedulerResult};
use crate::lease::Lease;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Full serializable scheduler state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Layout version; loads refuse anything but [`SCHEMA_VERSION`]
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    /// All indexed resources, ascending id order
    pub resources: Vec<Resource>,
    /// All known leases, ascending id order
    pub leases: Vec<Lease>,
}

impl Snapshot {
    /// Wrap current state at the current schema version.
    pub fn new(resources: Vec<Resource>, leases: Vec<Lease>) -> Self {
        Snapshot {
            schema_version: SCHEMA_VERSION,
            resources,
            leases,
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and version-check a snapshot document.
    pub fn from_json(json: &str) -> SchedulerResult<Snapshot> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(SchedulerError::UnsupportedSchema(snapshot.schema_version));
        }
        Ok(snapshot)
    }
}

/// Durability seam: where snapshots go is a deployment concern.
#[async_trait]
pub trait Snapshotter: Send + Sync {
    /// Persist one snapshot.
    async fn persist(&self, snapshot: &Snapshot) -> SchedulerResult<()>;
}

/// Snapshot file on local disk.
///
/// Doubles as a `ResourceSource`: loading yields the snapshot's resource
/// array for startup ingest.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Bind to a snapshot file path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read and version-check the snapshot on disk.
    pub async fn load(&self) -> SchedulerResult<Snapshot> {
        let json = tokio::fs::read_to_string(&self.path).await?;
        Snapshot::from_json(&json)
    }
}

#[async_trait]
impl Snapshotter for JsonFileStore {
    async fn persist(&self, snapshot: &Snapshot) -> SchedulerResult<()> {
        let json = snapshot.to_json()?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceSource for JsonFileStore {
    async fn load_resources(&self) -> InventoryResult<Vec<Resource>> {
        let snapshot = self
            .load()
            .await
            .map_err(|e| InventoryError::Invalid(format!("snapshot load failed: {e}")))?;
        Ok(snapshot.resources)
    }
}
