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

//! Startup ingest seam.
//!
//! The core consumes a `ResourceSource` on startup; where the resources come
//! from (sample-data generator, file, remote API) is a deployment concern.

use async_trait::async_trait;

use labpool_model::Resource;

use crate::error::InventoryResult;

/// Provider of initial inventory.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Produce the resources to index at startup.
    async fn load_resources(&self) -> InventoryResult<Vec<Resource>>;
}

/// Fixed in-memory source, mainly for tests and embedded use.
pub struct StaticSource {
    resources: Vec<Resource>,
}

impl StaticSource {
    /// Wrap a fixed resource list.
    pub fn new(resources: Vec<Resource>) -> Self {
        StaticSource { resources }
    }
}

#[async_trait]
impl ResourceSource for StaticSource {
    async fn load_resources(&self) -> InventoryResult<Vec<Resource>> {
        Ok(self.resources.clone())
    }
}
