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

//! Logical group view over the resource index.
//!
//! A group is not storage: membership is computed on every call by filtering
//! the index on the `system.group` label. Lease transitions delegate to the
//! index so they stay serialized under its writer lock.

use std::sync::Arc;

use labpool_model::{LeaseState, Resource, ResourceId};

use crate::error::InventoryResult;
use crate::index::ResourceIndex;

/// Named label-defined partition of the inventory.
#[derive(Clone)]
pub struct Group {
    name: String,
    index: Arc<ResourceIndex>,
}

impl Group {
    /// Bind a view to `{name, index}`.
    pub fn new(name: impl Into<String>, index: Arc<ResourceIndex>) -> Self {
        Group {
            name: name.into(),
            index,
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All resources labeled `system.group = <name>`, ascending id order.
    pub async fn all(&self) -> InventoryResult<Vec<Resource>> {
        let snapshot = self.index.load().await?;
        Ok(snapshot
            .into_iter()
            .filter(|r| r.group() == Some(self.name.as_str()))
            .collect())
    }

    /// Members whose lease state is `Free`.
    pub async fn free_pool(&self) -> InventoryResult<Vec<Resource>> {
        let members = self.all().await?;
        Ok(members
            .into_iter()
            .filter(|r| r.status().lease == LeaseState::Free)
            .collect())
    }

    /// Transition a member Free→Leased.
    ///
    /// Compare-and-set semantics under the index writer lock: of two
    /// concurrent calls on the same resource exactly one succeeds, the other
    /// gets `AlreadyLeased`.
    pub async fn lease(&self, id: ResourceId) -> InventoryResult<()> {
        self.index.acquire(id).await
    }

    /// Transition a member back to Free; idempotent on an already-free
    /// resource.
    pub async fn release(&self, id: ResourceId) -> InventoryResult<()> {
        self.index.release(id).await
    }

    /// (total, free) member counts.
    pub async fn counts(&self) -> InventoryResult<(usize, usize)> {
        let members = self.all().await?;
        let free = members
            .iter()
            .filter(|r| r.status().lease == LeaseState::Free)
            .count();
        Ok((members.len(), free))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labpool_model::{RegistryFactory, Resource};

    async fn seeded() -> (Arc<ResourceIndex>, Vec<ResourceId>) {
        let index = Arc::new(ResourceIndex::new(Arc::new(RegistryFactory::lab_default())));
        let mut ids = Vec::new();
        for name in ["sw-1", "sw-2"] {
            let r = Resource::new("switch", name).with_group("dev");
            ids.push(r.id());
            index.create(r).await.unwrap();
        }
        // a member of another group, invisible to the dev view
        index
            .create(Resource::new("switch", "sw-x").with_group("prod"))
            .await
            .unwrap();
        (index, ids)
    }

    #[tokio::test]
    async fn view_filters_on_group_label() {
        let (index, _) = seeded().await;
        let group = Group::new("dev", index);
        let members = group.all().await.unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|r| r.group() == Some("dev")));
    }

    #[tokio::test]
    async fn free_pool_shrinks_with_leases() {
        let (index, ids) = seeded().await;
        let group = Group::new("dev", index);

        assert_eq!(group.counts().await.unwrap(), (2, 2));
        group.lease(ids[0]).await.unwrap();
        assert_eq!(group.counts().await.unwrap(), (2, 1));

        let free = group.free_pool().await.unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].id(), ids[1]);
    }

    #[tokio::test]
    async fn concurrent_lease_calls_race_cleanly() {
        let (index, ids) = seeded().await;
        let group = Group::new("dev", index);
        let id = ids[0];

        let (a, b) = tokio::join!(group.lease(id), group.lease(id));
        assert!(a.is_ok() != b.is_ok(), "exactly one caller must win");

        group.release(id).await.unwrap();
        group.release(id).await.unwrap(); // idempotent
    }
}
