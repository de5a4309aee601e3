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

//! Snapshot, persistence, and restore across scheduler instances.

use std::sync::Arc;
use std::time::Duration;

use labpool_inventory::{ResourceIndex, ResourceSource};
use labpool_model::{LeaseState, RegistryFactory, Resource};
use labpool_scheduler::{
    JsonFileStore, LeaseId, LeaseRequest, LeaseScheduler, LeaseStatus, ResourceReq,
    SchedulerConfig, Snapshot, UserRef,
};

const SETTLE: Duration = Duration::from_secs(2);

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        expiry_tick_ms: 50,
        shutdown_deadline_ms: 1_000,
    }
}

fn switch(name: &str) -> Resource {
    Resource::new("switch", name).with_group("dev")
}

async fn started_scheduler(resources: Vec<Resource>) -> LeaseScheduler {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let index = Arc::new(ResourceIndex::new(Arc::new(RegistryFactory::lab_default())));
    for resource in resources {
        index.create(resource).await.unwrap();
    }
    let scheduler = LeaseScheduler::new(index, fast_config());
    scheduler.start().await;
    scheduler
}

fn one_switch(duration_ms: i64) -> LeaseRequest {
    LeaseRequest::new("dev", duration_ms, vec![ResourceReq::new("switch", 1)])
}

async fn await_status(scheduler: &LeaseScheduler, lease_id: LeaseId, want: LeaseStatus) {
    let deadline = tokio::time::Instant::now() + SETTLE;
    loop {
        let status = scheduler.get(lease_id).await.unwrap().status;
        if status == want {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "lease {lease_id} stuck in {status:?}, wanted {want:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn snapshot_captures_resources_and_leases() {
    let scheduler = started_scheduler(vec![switch("sw-1"), switch("sw-2")]).await;

    let mut handle = scheduler
        .submit(one_switch(60_000), UserRef::new("alice"))
        .await
        .unwrap();
    handle.wait_until_settled(SETTLE).await.unwrap();

    let snapshot = scheduler.snapshot().await.unwrap();
    assert_eq!(snapshot.resources.len(), 2);
    assert_eq!(snapshot.leases.len(), 1);
    assert_eq!(snapshot.leases[0].status, LeaseStatus::Active);

    // the document round-trips byte-for-byte equal state, under the
    // persisted key names
    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"schemaVersion\""));
    assert!(json.contains("\"requestTime\""));
    assert!(json.contains("\"activationTime\""));
    assert!(!json.contains("requested_at"));
    assert!(!json.contains("activated_at"));
    let back = Snapshot::from_json(&json).unwrap();
    assert_eq!(snapshot, back);

    scheduler.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn restore_preserves_lease_state_and_grant_bindings() {
    let scheduler = started_scheduler(vec![switch("sw-1")]).await;
    let mut handle = scheduler
        .submit(one_switch(60_000), UserRef::new("alice"))
        .await
        .unwrap();
    handle.wait_until_settled(SETTLE).await.unwrap();
    let snapshot = scheduler.snapshot().await.unwrap();
    scheduler.stop(Duration::from_secs(1)).await.unwrap();

    let restored = started_scheduler(vec![]).await;
    restored.restore(snapshot).await.unwrap();

    let lease = restored.get(handle.lease_id()).await.unwrap();
    assert_eq!(lease.status, LeaseStatus::Active);
    assert_eq!(lease.grants.len(), 1);

    // the grant is still committed in the restored index
    let granted = restored.inventory().get(lease.grants[0]).await.unwrap();
    assert_eq!(granted.status().lease, LeaseState::Leased);

    // cancellation still works against the restored lease
    restored.cancel(lease.id).await.unwrap();
    let released = restored.inventory().get(lease.grants[0]).await.unwrap();
    assert_eq!(released.status().lease, LeaseState::Free);

    restored.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn restore_requeues_unsatisfied_pending_demand() {
    let scheduler = started_scheduler(vec![switch("sw-1")]).await;

    let mut holder = scheduler
        .submit(one_switch(60_000), UserRef::new("alice"))
        .await
        .unwrap();
    holder.wait_until_settled(SETTLE).await.unwrap();
    let waiter = scheduler
        .submit(one_switch(60_000), UserRef::new("bob"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(waiter.status(), LeaseStatus::Pending);

    let snapshot = scheduler.snapshot().await.unwrap();
    scheduler.stop(Duration::from_secs(0)).await.unwrap();

    let restored = started_scheduler(vec![]).await;
    restored.restore(snapshot).await.unwrap();
    await_status(&restored, waiter.lease_id(), LeaseStatus::Pending).await;

    // freeing the holder's grant lets the re-queued demand through
    restored.cancel(holder.lease_id()).await.unwrap();
    await_status(&restored, waiter.lease_id(), LeaseStatus::Active).await;

    restored.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn stopped_scheduler_fails_requeued_demand_instead_of_reviving_workers() {
    let scheduler = started_scheduler(vec![switch("sw-1")]).await;
    let mut holder = scheduler
        .submit(one_switch(60_000), UserRef::new("alice"))
        .await
        .unwrap();
    holder.wait_until_settled(SETTLE).await.unwrap();
    let waiter = scheduler
        .submit(one_switch(60_000), UserRef::new("bob"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = scheduler.snapshot().await.unwrap();
    scheduler.stop(Duration::from_secs(0)).await.unwrap();

    // a scheduler that has already stopped must not spawn a fresh worker
    // for demand arriving late; the lease fails instead of activating
    let stopped = started_scheduler(vec![]).await;
    stopped.stop(Duration::from_secs(1)).await.unwrap();
    stopped.restore(snapshot).await.unwrap();

    await_status(&stopped, waiter.lease_id(), LeaseStatus::Failed).await;
    let failed = stopped.get(waiter.lease_id()).await.unwrap();
    assert_eq!(failed.reason.as_deref(), Some("scheduler shutdown"));
    // the recorded leases are untouched otherwise
    assert_eq!(
        stopped.get(holder.lease_id()).await.unwrap().status,
        LeaseStatus::Active
    );
}

#[tokio::test]
async fn file_store_persists_and_reloads_scheduler_state() {
    let dir = std::env::temp_dir().join(format!("labpool-restore-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let store = JsonFileStore::new(dir.join("state.json"));

    let scheduler = started_scheduler(vec![switch("sw-1"), switch("sw-2")]).await;
    let mut handle = scheduler
        .submit(one_switch(60_000), UserRef::new("alice"))
        .await
        .unwrap();
    handle.wait_until_settled(SETTLE).await.unwrap();
    scheduler.save_to(&store).await.unwrap();
    scheduler.stop(Duration::from_secs(1)).await.unwrap();

    let restored = started_scheduler(vec![]).await;
    restored.restore(store.load().await.unwrap()).await.unwrap();
    assert_eq!(restored.inventory().len().await, 2);
    assert_eq!(
        restored.get(handle.lease_id()).await.unwrap().status,
        LeaseStatus::Active
    );

    restored.stop(Duration::from_secs(1)).await.unwrap();
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn load_source_seeds_inventory_from_a_snapshot_file() {
    let dir = std::env::temp_dir().join(format!("labpool-source-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let store = JsonFileStore::new(dir.join("inventory.json"));

    let seed = started_scheduler(vec![switch("sw-1"), switch("sw-2")]).await;
    seed.save_to(&store).await.unwrap();
    seed.stop(Duration::from_secs(1)).await.unwrap();

    let scheduler = started_scheduler(vec![]).await;
    let count = scheduler.load_source(&store).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(store.load_resources().await.unwrap().len(), 2);

    // the fresh inventory serves requests right away
    let mut handle = scheduler
        .submit(one_switch(60_000), UserRef::new("alice"))
        .await
        .unwrap();
    assert_eq!(
        handle.wait_until_settled(SETTLE).await.unwrap(),
        LeaseStatus::Active
    );

    scheduler.stop(Duration::from_secs(1)).await.unwrap();
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
