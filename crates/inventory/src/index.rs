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

//! Dual-indexed concurrent resource store.
//!
//! ## Design
//! - **Primary projection**: `by_id: BTreeMap<ResourceId, Resource>` — the
//!   BTreeMap keeps snapshots in ascending id order.
//! - **Secondary projection**: `by_type: HashMap<String, BTreeSet<ResourceId>>`
//!   holding back-references only; the index owns every resource exactly once.
//! - One `tokio::sync::RwLock` protects both projections. Writers update both
//!   under the exclusive lock; readers clone out of the maps.
//! - `clear` empties the store but keeps the factory binding; `wipe`
//!   invalidates the index permanently and every later call returns
//!   [`InventoryError::Wiped`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use labpool_model::{LeaseState, ResState, Resource, ResourceFactory, ResourceId};

use crate::error::{InventoryError, InventoryResult};

struct IndexInner {
    by_id: BTreeMap<ResourceId, Resource>,
    by_type: HashMap<String, BTreeSet<ResourceId>>,
    wiped: bool,
}

impl IndexInner {
    fn guard(&self) -> InventoryResult<()> {
        if self.wiped {
            Err(InventoryError::Wiped)
        } else {
            Ok(())
        }
    }

    fn insert(&mut self, resource: Resource) {
        self.by_type
            .entry(resource.type_tag().to_string())
            .or_default()
            .insert(resource.id());
        self.by_id.insert(resource.id(), resource);
    }

    fn remove(&mut self, id: &ResourceId) -> Option<Resource> {
        let resource = self.by_id.remove(id)?;
        if let Some(ids) = self.by_type.get_mut(resource.type_tag()) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_type.remove(resource.type_tag());
            }
        }
        Some(resource)
    }
}

/// Concurrent store of resources, indexed by id and by type.
pub struct ResourceIndex {
    inner: RwLock<IndexInner>,
    factory: Arc<dyn ResourceFactory>,
    validating: bool,
}

impl ResourceIndex {
    /// Create a validating index: `create`/`update` run the factory's
    /// validation predicate.
    pub fn new(factory: Arc<dyn ResourceFactory>) -> Self {
        Self::with_validation(factory, true)
    }

    /// Create a non-validating index for raw snapshot ingest.
    pub fn new_raw(factory: Arc<dyn ResourceFactory>) -> Self {
        Self::with_validation(factory, false)
    }

    fn with_validation(factory: Arc<dyn ResourceFactory>, validating: bool) -> Self {
        ResourceIndex {
            inner: RwLock::new(IndexInner {
                by_id: BTreeMap::new(),
                by_type: HashMap::new(),
                wiped: false,
            }),
            factory,
            validating,
        }
    }

    /// The factory bound to this index.
    pub fn factory(&self) -> Arc<dyn ResourceFactory> {
        Arc::clone(&self.factory)
    }

    /// Add a resource to both projections.
    ///
    /// ## Errors
    /// - `Exists` if the id is already indexed
    /// - `Model` if factory validation rejects the resource
    /// - `Wiped` after [`ResourceIndex::wipe`]
    pub async fn create(&self, resource: Resource) -> InventoryResult<()> {
        if self.validating {
            self.factory.validate(&resource)?;
        }
        let mut inner = self.inner.write().await;
        inner.guard()?;
        if inner.by_id.contains_key(&resource.id()) {
            return Err(InventoryError::Exists(resource.id().to_string()));
        }
        debug!(id = %resource.id(), type_tag = resource.type_tag(), "indexing resource");
        inner.insert(resource);
        Ok(())
    }

    /// Replace an indexed resource under the same id: semantically a
    /// delete-then-create performed atomically under the writer lock.
    ///
    /// Refuses with `Busy` while the resource is leased, like `delete`: the
    /// replacement carries its own status, and installing it over a leased
    /// resource would detach the grant from its active lease.
    pub async fn update(&self, resource: Resource) -> InventoryResult<()> {
        if self.validating {
            self.factory.validate(&resource)?;
        }
        let mut inner = self.inner.write().await;
        inner.guard()?;
        let leased = inner
            .by_id
            .get(&resource.id())
            .ok_or_else(|| InventoryError::NotFound(resource.id().to_string()))?
            .status()
            .lease
            == LeaseState::Leased;
        if leased {
            return Err(InventoryError::Busy(resource.id().to_string()));
        }
        inner.remove(&resource.id());
        inner.insert(resource);
        Ok(())
    }

    /// Remove a resource from both projections.
    ///
    /// Refuses with `Busy` while the resource is leased; release it first.
    pub async fn delete(&self, id: ResourceId) -> InventoryResult<()> {
        let mut inner = self.inner.write().await;
        inner.guard()?;
        let leased = inner
            .by_id
            .get(&id)
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))?
            .status()
            .lease
            == LeaseState::Leased;
        if leased {
            return Err(InventoryError::Busy(id.to_string()));
        }
        inner.remove(&id);
        debug!(id = %id, "deleted resource");
        Ok(())
    }

    /// Look up one resource; returns a defensive copy.
    pub async fn get(&self, id: ResourceId) -> InventoryResult<Resource> {
        let inner = self.inner.read().await;
        inner.guard()?;
        inner
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))
    }

    /// Batch lookup preserving input order.
    ///
    /// All-or-nothing: if any id is absent the call fails with
    /// [`InventoryError::MissingIds`], which carries the partial result.
    pub async fn query_by_id(&self, ids: &[ResourceId]) -> InventoryResult<Vec<Resource>> {
        let inner = self.inner.read().await;
        inner.guard()?;
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match inner.by_id.get(id) {
                Some(r) => found.push(r.clone()),
                None => missing.push(*id),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(InventoryError::MissingIds { missing, found })
        }
    }

    /// Type-keyed lookup. Types with no indexed resources map to an empty
    /// list rather than an error.
    pub async fn query_by_type(
        &self,
        types: &[&str],
    ) -> InventoryResult<BTreeMap<String, Vec<Resource>>> {
        let inner = self.inner.read().await;
        inner.guard()?;
        let mut out = BTreeMap::new();
        for ty in types {
            let resources = inner
                .by_type
                .get(*ty)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| inner.by_id.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default();
            out.insert(ty.to_string(), resources);
        }
        Ok(out)
    }

    /// Full snapshot in ascending id order, suitable for serialization.
    pub async fn load(&self) -> InventoryResult<Vec<Resource>> {
        let inner = self.inner.read().await;
        inner.guard()?;
        Ok(inner.by_id.values().cloned().collect())
    }

    /// Bulk-create resources (startup ingest from a `ResourceSource`).
    pub async fn ingest(&self, resources: Vec<Resource>) -> InventoryResult<usize> {
        let count = resources.len();
        for resource in resources {
            self.create(resource).await?;
        }
        Ok(count)
    }

    /// Remove all entries, keeping the factory binding usable.
    pub async fn clear(&self) -> InventoryResult<()> {
        let mut inner = self.inner.write().await;
        inner.guard()?;
        inner.by_id.clear();
        inner.by_type.clear();
        Ok(())
    }

    /// Remove all entries and invalidate the index; every later operation
    /// returns [`InventoryError::Wiped`].
    pub async fn wipe(&self) {
        let mut inner = self.inner.write().await;
        inner.by_id.clear();
        inner.by_type.clear();
        inner.wiped = true;
    }

    /// Number of indexed resources.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    /// True when no resources are indexed.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Free→Leased compare-and-set, serialized by the writer lock.
    ///
    /// ## Errors
    /// - `AlreadyLeased` when the resource is currently committed — the
    ///   caller lost the race and should re-evaluate
    /// - `NotFound` / `Wiped` as usual
    pub async fn acquire(&self, id: ResourceId) -> InventoryResult<()> {
        let mut inner = self.inner.write().await;
        inner.guard()?;
        let resource = inner
            .by_id
            .get_mut(&id)
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))?;
        if resource.status().lease == LeaseState::Leased {
            return Err(InventoryError::AlreadyLeased(id.to_string()));
        }
        resource.set_lease_state(LeaseState::Leased);
        Ok(())
    }

    /// Leased→Free transition; idempotent on an already-free resource.
    pub async fn release(&self, id: ResourceId) -> InventoryResult<()> {
        let mut inner = self.inner.write().await;
        inner.guard()?;
        let resource = inner
            .by_id
            .get_mut(&id)
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))?;
        resource.set_lease_state(LeaseState::Free);
        Ok(())
    }

    /// Set the administrative state axis.
    pub async fn set_state(&self, id: ResourceId, state: ResState) -> InventoryResult<()> {
        let mut inner = self.inner.write().await;
        inner.guard()?;
        let resource = inner
            .by_id
            .get_mut(&id)
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))?;
        resource.set_state(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labpool_model::RegistryFactory;

    fn index() -> ResourceIndex {
        ResourceIndex::new(Arc::new(RegistryFactory::lab_default()))
    }

    fn switch(name: &str) -> Resource {
        Resource::new("switch", name).with_group("dev")
    }

    #[tokio::test]
    async fn create_get_delete() {
        let index = index();
        let r = switch("sw-1");
        let id = r.id();

        index.create(r.clone()).await.unwrap();
        assert_eq!(index.get(id).await.unwrap().name(), "sw-1");

        // duplicate id collides
        assert!(matches!(
            index.create(r).await,
            Err(InventoryError::Exists(_))
        ));

        index.delete(id).await.unwrap();
        assert!(matches!(
            index.get(id).await,
            Err(InventoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_validates_through_factory() {
        let index = index();
        let bad = Resource::new("rack", "r-1"); // missing required row
        assert!(matches!(
            index.create(bad.clone()).await,
            Err(InventoryError::Model(_))
        ));

        // raw index ingests it untouched
        let raw = ResourceIndex::new_raw(Arc::new(RegistryFactory::lab_default()));
        raw.create(bad).await.unwrap();
        assert_eq!(raw.len().await, 1);
    }

    #[tokio::test]
    async fn update_is_delete_then_create() {
        let index = index();
        let r = switch("sw-1");
        let id = r.id();
        index.create(r.clone()).await.unwrap();

        let renamed = switch("sw-1b").with_id(id);
        index.update(renamed).await.unwrap();
        assert_eq!(index.get(id).await.unwrap().name(), "sw-1b");

        let stranger = switch("sw-x");
        assert!(matches!(
            index.update(stranger).await,
            Err(InventoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_refuses_leased_resource() {
        let index = index();
        let r = switch("sw-1");
        let id = r.id();
        index.create(r).await.unwrap();
        index.acquire(id).await.unwrap();

        // a replacement carrying the default Free status must not un-lease
        // the resource out from under its lease
        let relabeled = switch("sw-1b").with_id(id);
        assert!(matches!(
            index.update(relabeled.clone()).await,
            Err(InventoryError::Busy(_))
        ));
        assert_eq!(index.get(id).await.unwrap().name(), "sw-1");
        assert!(matches!(
            index.acquire(id).await,
            Err(InventoryError::AlreadyLeased(_))
        ));

        index.release(id).await.unwrap();
        index.update(relabeled).await.unwrap();
        assert_eq!(index.get(id).await.unwrap().name(), "sw-1b");
    }

    #[tokio::test]
    async fn delete_refuses_leased_resource() {
        let index = index();
        let r = switch("sw-1");
        let id = r.id();
        index.create(r).await.unwrap();

        index.acquire(id).await.unwrap();
        assert!(matches!(
            index.delete(id).await,
            Err(InventoryError::Busy(_))
        ));

        index.release(id).await.unwrap();
        index.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn acquire_is_exclusive_release_idempotent() {
        let index = index();
        let r = switch("sw-1");
        let id = r.id();
        index.create(r).await.unwrap();

        index.acquire(id).await.unwrap();
        assert!(matches!(
            index.acquire(id).await,
            Err(InventoryError::AlreadyLeased(_))
        ));

        index.release(id).await.unwrap();
        index.release(id).await.unwrap(); // idempotent
        index.acquire(id).await.unwrap();
    }

    #[tokio::test]
    async fn query_by_id_is_all_or_nothing() {
        let index = index();
        let a = switch("sw-a");
        let b = switch("sw-b");
        let (ida, idb) = (a.id(), b.id());
        index.create(a).await.unwrap();
        index.create(b).await.unwrap();

        let found = index.query_by_id(&[idb, ida]).await.unwrap();
        assert_eq!(found.len(), 2);
        // input order preserved
        assert_eq!(found[0].id(), idb);
        assert_eq!(found[1].id(), ida);

        let ghost = ResourceId::generate();
        match index.query_by_id(&[ida, ghost]).await {
            Err(InventoryError::MissingIds { missing, found }) => {
                assert_eq!(missing, vec![ghost]);
                assert_eq!(found.len(), 1);
            }
            other => panic!("expected MissingIds, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_by_type_groups_results() {
        let index = index();
        index.create(switch("sw-1")).await.unwrap();
        index.create(switch("sw-2")).await.unwrap();
        index
            .create(
                Resource::new("vlan_pool", "v-1")
                    .with_group("dev")
                    .with_property("vlan_start", "10")
                    .with_property("vlan_end", "20"),
            )
            .await
            .unwrap();

        let map = index.query_by_type(&["switch", "vlan_pool", "host"]).await.unwrap();
        assert_eq!(map["switch"].len(), 2);
        assert_eq!(map["vlan_pool"].len(), 1);
        assert!(map["host"].is_empty());
    }

    #[tokio::test]
    async fn clear_keeps_index_usable_wipe_does_not() {
        let index = index();
        index.create(switch("sw-1")).await.unwrap();
        index.clear().await.unwrap();
        assert!(index.is_empty().await);
        index.create(switch("sw-2")).await.unwrap();

        index.wipe().await;
        assert!(matches!(
            index.create(switch("sw-3")).await,
            Err(InventoryError::Wiped)
        ));
        assert!(matches!(index.load().await, Err(InventoryError::Wiped)));
        assert!(matches!(index.clear().await, Err(InventoryError::Wiped)));
    }

    #[tokio::test]
    async fn load_returns_ascending_id_order() {
        let index = index();
        let mut ids = Vec::new();
        for i in 0..5 {
            let r = switch(&format!("sw-{i}"));
            ids.push(r.id());
            index.create(r).await.unwrap();
        }
        let snapshot = index.load().await.unwrap();
        let loaded: Vec<_> = snapshot.iter().map(|r| r.id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(loaded, sorted);
    }
}
