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

//! The lease scheduler.
//!
//! ## Purpose
//! Accepts reservation requests, routes per-type demand into FIFO queues
//! keyed by (group, type), and runs one worker per key that matches demand
//! against the group's free pool, grants resources under the index's
//! compare-and-set, and activates leases once all their demand is satisfied.
//! A single expiry ticker returns overdue grants to the free pool.
//!
//! ## Concurrency
//! - One long-lived worker task per active (group, type) key, spawned on
//!   first use; workers on distinct keys run concurrently and share the
//!   index through its lock.
//! - A worker suspends in exactly two places: awaiting a non-empty queue,
//!   and awaiting a stall-gate wake after insufficient free inventory. It
//!   never suspends while holding the index writer lock.
//! - Lock order: a worker takes the index lock only after dropping its
//!   queue lock, and the lease table is never held while waiting on either.
//! - Shutdown rides a `watch` channel so a worker busy granting cannot miss
//!   the stop edge.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use labpool_inventory::{
    filter_label, filter_property, filter_type, Group, InventoryError, Query, ResourceIndex,
    ResourceSource,
};
use labpool_model::{Resource, ResourceFactory, ResourceId};

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::lease::{
    FilterScope, Lease, LeaseId, LeaseRequest, LeaseStatus, ResourceReq, UserRef,
};
use crate::notifier::{LeaseEvent, NoopNotifier, Notifier};
use crate::queue::{QueuedReq, RequestQueue};
use crate::snapshot::{Snapshot, Snapshotter};
use crate::stall::StallGate;

/// Queue key: one FIFO and one worker per (group, type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueueKey {
    group: String,
    type_tag: String,
}

struct QueueEntry {
    queue: Arc<RequestQueue>,
    worker: JoinHandle<()>,
}

struct LeaseEntry {
    lease: Lease,
    /// Unsatisfied `ResourceReq` count; the lease activates at zero
    remaining: usize,
    tx: watch::Sender<LeaseStatus>,
}

/// Outcome of one service attempt on a queue head.
enum GrantOutcome {
    /// The item is finished (granted, or its lease went terminal meanwhile)
    Done,
    /// Insufficient free inventory right now; keep the item at the head
    Stalled,
}

#[derive(Debug, Default)]
struct SchedulerStats {
    submitted: AtomicU64,
    activated: AtomicU64,
    failed: AtomicU64,
    expired: AtomicU64,
    released: AtomicU64,
    stalls: AtomicU64,
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsView {
    /// Requests accepted by submit
    pub submitted: u64,
    /// Leases that reached Active
    pub activated: u64,
    /// Leases that reached Failed
    pub failed: u64,
    /// Leases expired by the ticker
    pub expired: u64,
    /// Leases cancelled to Released
    pub released: u64,
    /// Worker stall episodes
    pub stalls: u64,
}

impl SchedulerStats {
    fn view(&self) -> StatsView {
        StatsView {
            submitted: self.submitted.load(Ordering::Relaxed),
            activated: self.activated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    index: Arc<ResourceIndex>,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
    leases: RwLock<BTreeMap<LeaseId, LeaseEntry>>,
    queues: Mutex<HashMap<QueueKey, QueueEntry>>,
    gate: StallGate,
    shutdown_tx: watch::Sender<bool>,
    accepting: AtomicBool,
    stats: SchedulerStats,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle returned by submit: status observation and cancellation.
pub struct LeaseHandle {
    lease_id: LeaseId,
    rx: watch::Receiver<LeaseStatus>,
    shared: Arc<Shared>,
}

impl LeaseHandle {
    /// Id of the submitted lease.
    pub fn lease_id(&self) -> LeaseId {
        self.lease_id
    }

    /// Last observed status.
    pub fn status(&self) -> LeaseStatus {
        *self.rx.borrow()
    }

    /// Wait until the lease leaves Pending (Active or a terminal state).
    pub async fn wait_until_settled(&mut self, limit: Duration) -> SchedulerResult<LeaseStatus> {
        match timeout(limit, self.rx.wait_for(|s| *s != LeaseStatus::Pending)).await {
            Err(_) => Err(SchedulerError::Timeout),
            Ok(Err(_)) => Err(SchedulerError::NotFound(self.lease_id)),
            Ok(Ok(status)) => Ok(*status),
        }
    }

    /// Wait for the next status change after the last observed one.
    pub async fn changed(&mut self) -> SchedulerResult<LeaseStatus> {
        self.rx
            .changed()
            .await
            .map_err(|_| SchedulerError::NotFound(self.lease_id))?;
        Ok(*self.rx.borrow())
    }

    /// Cancel the lease (Pending or Active → Released).
    pub async fn cancel(&self) -> SchedulerResult<()> {
        self.shared.cancel(self.lease_id).await
    }
}

/// Concurrent lease scheduler over a shared resource index.
pub struct LeaseScheduler {
    shared: Arc<Shared>,
}

impl LeaseScheduler {
    /// Scheduler without external notification.
    pub fn new(index: Arc<ResourceIndex>, config: SchedulerConfig) -> Self {
        Self::with_notifier(index, config, Arc::new(NoopNotifier))
    }

    /// Scheduler with an injected notifier.
    pub fn with_notifier(
        index: Arc<ResourceIndex>,
        config: SchedulerConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        LeaseScheduler {
            shared: Arc::new(Shared {
                index,
                notifier,
                config,
                leases: RwLock::new(BTreeMap::new()),
                queues: Mutex::new(HashMap::new()),
                gate: StallGate::new(),
                shutdown_tx,
                accepting: AtomicBool::new(false),
                stats: SchedulerStats::default(),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Begin accepting requests and start the expiry ticker.
    pub async fn start(&self) {
        let mut ticker = self.shared.ticker.lock().await;
        if ticker.is_some() {
            return;
        }
        self.shared.accepting.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        *ticker = Some(tokio::spawn(expiry_loop(shared)));
        info!(
            tick_ms = self.shared.config.expiry_tick_ms,
            "lease scheduler started"
        );
    }

    /// Submit a reservation request. Never blocks on inventory.
    ///
    /// ## Errors
    /// - `Shutdown` after stop (or before start)
    /// - `Invalid` for malformed requests (zero counts, non-positive
    ///   duration, empty demand)
    pub async fn submit(
        &self,
        request: LeaseRequest,
        owner: UserRef,
    ) -> SchedulerResult<LeaseHandle> {
        let shared = &self.shared;
        if !shared.accepting.load(Ordering::SeqCst) {
            return Err(SchedulerError::Shutdown);
        }
        request.validate()?;

        let lease = Lease::new(owner, request.clone());
        let lease_id = lease.id;
        let (tx, rx) = watch::channel(LeaseStatus::Pending);
        {
            let mut leases = shared.leases.write().await;
            leases.insert(
                lease_id,
                LeaseEntry {
                    remaining: request.resources.len(),
                    lease,
                    tx,
                },
            );
        }
        shared.stats.submitted.fetch_add(1, Ordering::Relaxed);

        for req in &request.resources {
            shared
                .enqueue(
                    QueueKey {
                        group: request.group.clone(),
                        type_tag: req.type_tag.clone(),
                    },
                    QueuedReq {
                        lease_id,
                        req: req.clone(),
                    },
                )
                .await;
        }
        info!(lease = %lease_id, group = %request.group, "lease request submitted");

        Ok(LeaseHandle {
            lease_id,
            rx,
            shared: Arc::clone(shared),
        })
    }

    /// Look up one lease.
    pub async fn get(&self, lease_id: LeaseId) -> SchedulerResult<Lease> {
        let leases = self.shared.leases.read().await;
        leases
            .get(&lease_id)
            .map(|e| e.lease.clone())
            .ok_or(SchedulerError::NotFound(lease_id))
    }

    /// All known leases, ascending id order.
    pub async fn leases(&self) -> Vec<Lease> {
        let leases = self.shared.leases.read().await;
        leases.values().map(|e| e.lease.clone()).collect()
    }

    /// Cancel a lease: Pending or Active → Released; terminal → `Terminal`.
    pub async fn cancel(&self, lease_id: LeaseId) -> SchedulerResult<()> {
        self.shared.cancel(lease_id).await
    }

    /// Read-only access to the underlying index.
    pub fn inventory(&self) -> Arc<ResourceIndex> {
        Arc::clone(&self.shared.index)
    }

    /// Report an inventory change; wakes stalled workers.
    pub fn signal(&self) {
        self.shared.gate.signal();
    }

    /// Index a new resource and wake stalled workers.
    pub async fn add_resource(&self, resource: Resource) -> SchedulerResult<()> {
        self.shared.index.create(resource).await?;
        self.signal();
        Ok(())
    }

    /// Ingest startup inventory from a source and wake stalled workers.
    pub async fn load_source(&self, source: &dyn ResourceSource) -> SchedulerResult<usize> {
        let resources = source.load_resources().await?;
        let count = self.shared.index.ingest(resources).await?;
        self.signal();
        Ok(count)
    }

    /// Current counters.
    pub fn stats(&self) -> StatsView {
        self.shared.stats.view()
    }

    /// Serialize inventory and leases.
    pub async fn snapshot(&self) -> SchedulerResult<Snapshot> {
        let resources = self.shared.index.load().await?;
        let leases = self.leases().await;
        Ok(Snapshot::new(resources, leases))
    }

    /// Persist a snapshot through the injected durability seam.
    pub async fn save_to(&self, snapshotter: &dyn Snapshotter) -> SchedulerResult<()> {
        let snapshot = self.snapshot().await?;
        snapshotter.persist(&snapshot).await
    }

    /// Replace scheduler state from a snapshot.
    ///
    /// Resources re-populate the index; leases are restored as recorded.
    /// Pending leases get their unsatisfied demand re-queued, computed by
    /// consuming the recorded grants against the request's demand in order.
    pub async fn restore(&self, snapshot: Snapshot) -> SchedulerResult<()> {
        let shared = &self.shared;
        let type_of: HashMap<ResourceId, String> = snapshot
            .resources
            .iter()
            .map(|r| (r.id(), r.type_tag().to_string()))
            .collect();

        shared.index.clear().await?;
        shared.index.ingest(snapshot.resources).await?;

        let mut to_enqueue: Vec<(QueueKey, QueuedReq)> = Vec::new();
        {
            let mut leases = shared.leases.write().await;
            leases.clear();
            for lease in snapshot.leases {
                let mut remaining = 0usize;
                if lease.status == LeaseStatus::Pending {
                    let mut tally: HashMap<&str, usize> = HashMap::new();
                    for id in &lease.grants {
                        if let Some(ty) = type_of.get(id) {
                            *tally.entry(ty.as_str()).or_default() += 1;
                        }
                    }
                    for req in &lease.request.resources {
                        let have = tally.entry(req.type_tag.as_str()).or_default();
                        if *have >= req.count as usize {
                            *have -= req.count as usize;
                        } else {
                            remaining += 1;
                            to_enqueue.push((
                                QueueKey {
                                    group: lease.request.group.clone(),
                                    type_tag: req.type_tag.clone(),
                                },
                                QueuedReq {
                                    lease_id: lease.id,
                                    req: req.clone(),
                                },
                            ));
                        }
                    }
                }
                let (tx, _rx) = watch::channel(lease.status);
                leases.insert(
                    lease.id,
                    LeaseEntry {
                        remaining,
                        lease,
                        tx,
                    },
                );
            }
        }
        for (key, item) in to_enqueue {
            shared.enqueue(key, item).await;
        }
        self.signal();
        Ok(())
    }

    /// Stop the scheduler.
    ///
    /// No new submits are accepted; workers drain requests they can still
    /// satisfy up to the deadline, stalled requests fail, and the expiry
    /// ticker stops last.
    pub async fn stop(&self, deadline: Duration) -> SchedulerResult<()> {
        let shared = &self.shared;
        shared.accepting.store(false, Ordering::SeqCst);
        shared.shutdown_tx.send_replace(true);

        let deadline_at = tokio::time::Instant::now() + deadline;
        let entries: Vec<(QueueKey, Arc<RequestQueue>, JoinHandle<()>)> = {
            let mut queues = shared.queues.lock().await;
            queues
                .drain()
                .map(|(key, entry)| (key, entry.queue, entry.worker))
                .collect()
        };
        for (key, queue, mut worker) in entries {
            let remaining = deadline_at.saturating_duration_since(tokio::time::Instant::now());
            if timeout(remaining, &mut worker).await.is_err() {
                warn!(group = %key.group, type_tag = %key.type_tag, "worker missed shutdown deadline");
                worker.abort();
            }
            for item in queue.drain().await {
                shared
                    .fail_lease(item.lease_id, "scheduler shutdown".to_string())
                    .await;
            }
        }

        // sweep any lease still pending after the drain
        let pending: Vec<LeaseId> = {
            let leases = shared.leases.read().await;
            leases
                .iter()
                .filter(|(_, e)| e.lease.status == LeaseStatus::Pending)
                .map(|(id, _)| *id)
                .collect()
        };
        for lease_id in pending {
            shared
                .fail_lease(lease_id, "scheduler shutdown".to_string())
                .await;
        }

        // expiry ticker stops last
        if let Some(ticker) = shared.ticker.lock().await.take() {
            ticker.abort();
            let _ = ticker.await;
        }
        info!("lease scheduler stopped");
        Ok(())
    }
}

impl Shared {
    async fn enqueue(self: &Arc<Self>, key: QueueKey, item: QueuedReq) {
        let queue = {
            let mut queues = self.queues.lock().await;
            // stop drains this map under the same lock; re-check the
            // shutdown edge here so a racing submit cannot revive a worker
            // after the drain and leave its lease granted past stop
            if *self.shutdown_tx.borrow() {
                None
            } else {
                Some(match queues.get(&key) {
                    Some(entry) => Arc::clone(&entry.queue),
                    None => {
                        let queue = Arc::new(RequestQueue::new());
                        let worker = tokio::spawn(worker_loop(
                            Arc::clone(self),
                            key.clone(),
                            Arc::clone(&queue),
                            self.shutdown_tx.subscribe(),
                        ));
                        queues.insert(
                            key,
                            QueueEntry {
                                queue: Arc::clone(&queue),
                                worker,
                            },
                        );
                        queue
                    }
                })
            }
        };
        match queue {
            Some(queue) => queue.push(item).await,
            None => {
                self.fail_lease(item.lease_id, "scheduler shutdown".to_string())
                    .await;
            }
        }
    }

    async fn lease_status(&self, lease_id: LeaseId) -> Option<LeaseStatus> {
        let leases = self.leases.read().await;
        leases.get(&lease_id).map(|e| e.lease.status)
    }

    /// One service attempt on a queue head.
    async fn try_grant(&self, key: &QueueKey, item: &QueuedReq) -> SchedulerResult<GrantOutcome> {
        let group = Group::new(key.group.clone(), Arc::clone(&self.index));
        let factory = self.index.factory();
        let req = &item.req;
        let needed = req.count as usize;

        // static satisfiability against the entire group inventory, leased
        // or not: a chain that can never match enough resources fails the
        // lease instead of stalling forever
        let members = group.all().await?;
        let static_matches = apply_req_filters(req, factory.as_ref(), members)?;
        if static_matches.len() < needed {
            return Err(SchedulerError::Unsatisfiable(format!(
                "group {:?} holds {} resource(s) of type {:?} matching the filters, need {}",
                key.group,
                static_matches.len(),
                req.type_tag,
                req.count,
            )));
        }

        // one full retry after losing a lease race; persistent loss stalls
        for _ in 0..2 {
            let free = group.free_pool().await?;
            let mut candidates = apply_req_filters(req, factory.as_ref(), free)?;
            candidates.retain(|r| r.status().is_grantable());
            if candidates.len() < needed {
                return Ok(GrantOutcome::Stalled);
            }
            // deterministic grant order: ascending resource id
            candidates.sort_by_key(|r| r.id());
            let chosen: Vec<ResourceId> =
                candidates.iter().take(needed).map(|r| r.id()).collect();

            let mut granted: Vec<ResourceId> = Vec::with_capacity(needed);
            let mut lost_race = false;
            for id in &chosen {
                match group.lease(*id).await {
                    Ok(()) => granted.push(*id),
                    Err(InventoryError::AlreadyLeased(_)) => {
                        lost_race = true;
                        break;
                    }
                    Err(e) => {
                        self.release_all(&granted).await;
                        return Err(e.into());
                    }
                }
            }
            if lost_race {
                self.release_all(&granted).await;
                continue;
            }

            if self.attach_grants(item.lease_id, &granted).await {
                return Ok(GrantOutcome::Done);
            }
            // lease went terminal while we were granting; hand it all back
            self.release_all(&granted).await;
            return Ok(GrantOutcome::Done);
        }
        Ok(GrantOutcome::Stalled)
    }

    /// Record a satisfied demand; activates the lease when it was the last
    /// one. Returns false when the lease is gone or no longer pending.
    async fn attach_grants(&self, lease_id: LeaseId, granted: &[ResourceId]) -> bool {
        let event = {
            let mut leases = self.leases.write().await;
            let Some(entry) = leases.get_mut(&lease_id) else {
                return false;
            };
            if entry.lease.status != LeaseStatus::Pending {
                return false;
            }
            entry.lease.grants.extend_from_slice(granted);
            entry.remaining = entry.remaining.saturating_sub(1);
            if entry.remaining == 0 {
                entry.lease.status = LeaseStatus::Active;
                entry.lease.activated_at = Some(Utc::now());
                entry.tx.send_replace(LeaseStatus::Active);
                Some(LeaseEvent {
                    lease_id,
                    owner: entry.lease.owner.clone(),
                    status: LeaseStatus::Active,
                    reason: None,
                })
            } else {
                None
            }
        };
        if let Some(event) = event {
            self.stats.activated.fetch_add(1, Ordering::Relaxed);
            info!(lease = %lease_id, "lease activated");
            self.notifier.lease_changed(event).await;
        }
        true
    }

    async fn fail_lease(&self, lease_id: LeaseId, reason: String) {
        let taken = {
            let mut leases = self.leases.write().await;
            let Some(entry) = leases.get_mut(&lease_id) else {
                return;
            };
            if entry.lease.status.is_terminal() {
                return;
            }
            entry.lease.status = LeaseStatus::Failed;
            entry.lease.reason = Some(reason.clone());
            entry.tx.send_replace(LeaseStatus::Failed);
            (
                entry.lease.grants.clone(),
                LeaseEvent {
                    lease_id,
                    owner: entry.lease.owner.clone(),
                    status: LeaseStatus::Failed,
                    reason: Some(reason.clone()),
                },
            )
        };
        let (grants, event) = taken;
        self.release_all(&grants).await;
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        warn!(lease = %lease_id, reason = %reason, "lease failed");
        self.notifier.lease_changed(event).await;
    }

    async fn cancel(&self, lease_id: LeaseId) -> SchedulerResult<()> {
        let taken = {
            let mut leases = self.leases.write().await;
            let entry = leases
                .get_mut(&lease_id)
                .ok_or(SchedulerError::NotFound(lease_id))?;
            if entry.lease.status.is_terminal() {
                return Err(SchedulerError::Terminal(lease_id));
            }
            entry.lease.status = LeaseStatus::Released;
            entry.tx.send_replace(LeaseStatus::Released);
            (
                entry.lease.grants.clone(),
                LeaseEvent {
                    lease_id,
                    owner: entry.lease.owner.clone(),
                    status: LeaseStatus::Released,
                    reason: None,
                },
            )
        };
        let (grants, event) = taken;
        self.release_all(&grants).await;
        self.stats.released.fetch_add(1, Ordering::Relaxed);
        info!(lease = %lease_id, "lease released");
        self.notifier.lease_changed(event).await;
        Ok(())
    }

    /// Expire overdue active leases and free their grants.
    async fn expire_due(&self, now: DateTime<Utc>) {
        let expired = {
            let mut leases = self.leases.write().await;
            let mut out = Vec::new();
            for (id, entry) in leases.iter_mut() {
                if entry.lease.is_expired_at(now) {
                    entry.lease.status = LeaseStatus::Expired;
                    entry.tx.send_replace(LeaseStatus::Expired);
                    out.push((
                        *id,
                        entry.lease.grants.clone(),
                        entry.lease.owner.clone(),
                    ));
                }
            }
            out
        };
        for (lease_id, grants, owner) in expired {
            self.release_all(&grants).await;
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            info!(lease = %lease_id, "lease expired");
            self.notifier
                .lease_changed(LeaseEvent {
                    lease_id,
                    owner,
                    status: LeaseStatus::Expired,
                    reason: None,
                })
                .await;
        }
    }

    /// Return grants to the free pool, one wake signal per freed resource.
    async fn release_all(&self, ids: &[ResourceId]) {
        for id in ids {
            if let Err(e) = self.index.release(*id).await {
                // the resource may have been deleted since the grant
                debug!(id = %id, error = %e, "release skipped");
            }
            self.gate.signal();
        }
    }
}

/// Dedicated worker for one (group, type) queue.
async fn worker_loop(
    shared: Arc<Shared>,
    key: QueueKey,
    queue: Arc<RequestQueue>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(group = %key.group, type_tag = %key.type_tag, "queue worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = queue.wait_non_empty() => {}
            _ = shutdown.changed() => continue,
        }
        while let Some(item) = queue.peek().await {
            if *shutdown.borrow() {
                break;
            }
            // drop demand whose lease is no longer pending (cancelled, or a
            // sibling demand already failed it)
            if shared.lease_status(item.lease_id).await != Some(LeaseStatus::Pending) {
                queue.pop().await;
                continue;
            }
            // observe the wake epoch before evaluating candidates so a
            // release landing mid-evaluation cannot be slept through
            let observed = shared.gate.epoch();
            match shared.try_grant(&key, &item).await {
                Ok(GrantOutcome::Done) => {
                    queue.pop().await;
                }
                Ok(GrantOutcome::Stalled) => {
                    shared.stats.stalls.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        group = %key.group,
                        type_tag = %key.type_tag,
                        lease = %item.lease_id,
                        "insufficient free inventory, stalling"
                    );
                    tokio::select! {
                        _ = shared.gate.wait(observed) => {}
                        _ = shutdown.changed() => {}
                    }
                    // re-evaluate the same head from scratch
                }
                Err(e) => {
                    shared.fail_lease(item.lease_id, e.to_string()).await;
                    queue.pop().await;
                }
            }
        }
    }

    // shutdown drain: one non-blocking pass over the remainder; demand that
    // would stall fails instead
    while let Some(item) = queue.pop().await {
        if shared.lease_status(item.lease_id).await != Some(LeaseStatus::Pending) {
            continue;
        }
        match shared.try_grant(&key, &item).await {
            Ok(GrantOutcome::Done) => {}
            Ok(GrantOutcome::Stalled) => {
                shared
                    .fail_lease(item.lease_id, "scheduler shutdown".to_string())
                    .await;
            }
            Err(e) => {
                shared.fail_lease(item.lease_id, e.to_string()).await;
            }
        }
    }
    debug!(group = %key.group, type_tag = %key.type_tag, "queue worker exited");
}

async fn expiry_loop(shared: Arc<Shared>) {
    let mut ticker = interval(shared.config.expiry_tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        shared.expire_due(Utc::now()).await;
    }
}

/// Candidate chain for one demand: type filter, then the request's filters
/// in order, then the optional exact-name match last.
fn apply_req_filters(
    req: &ResourceReq,
    factory: &dyn ResourceFactory,
    seq: Vec<Resource>,
) -> SchedulerResult<Vec<Resource>> {
    let mut seq = filter_type(&[req.type_tag.as_str()], seq);
    for filter in &req.filters {
        seq = match filter.scope {
            FilterScope::Label => filter_label(&filter.query, seq)?,
            FilterScope::Property => filter_property(&filter.query, factory, seq)?,
        };
    }
    if let Some(name) = req.name.as_deref() {
        if !name.is_empty() {
            seq = filter_property(&Query::equal("name", name), factory, seq)?;
        }
    }
    Ok(seq)
}
