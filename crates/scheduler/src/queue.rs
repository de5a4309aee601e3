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

//! Per-(group, type) FIFO request queue.
//!
//! A mutex-guarded deque plus a non-empty `Notify`. Queue non-emptiness and
//! stall-wake are deliberately separate primitives: this one signals items,
//! the stall gate signals inventory. The lock is never held across an index
//! operation.

use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify};

use crate::lease::{LeaseId, ResourceReq};

/// One enqueued demand, annotated with its parent lease.
#[derive(Debug, Clone)]
pub(crate) struct QueuedReq {
    pub lease_id: LeaseId,
    pub req: ResourceReq,
}

/// FIFO of pending demand for one (group, type) key.
pub(crate) struct RequestQueue {
    items: Mutex<VecDeque<QueuedReq>>,
    non_empty: Notify,
}

impl RequestQueue {
    pub fn new() -> Self {
        RequestQueue {
            items: Mutex::new(VecDeque::new()),
            non_empty: Notify::new(),
        }
    }

    /// Append and wake the worker.
    pub async fn push(&self, item: QueuedReq) {
        self.items.lock().await.push_back(item);
        // notify_one stores a permit, so a push racing the worker's wait
        // cannot be lost
        self.non_empty.notify_one();
    }

    /// Copy of the head without removing it.
    pub async fn peek(&self) -> Option<QueuedReq> {
        self.items.lock().await.front().cloned()
    }

    /// Remove and return the head.
    pub async fn pop(&self) -> Option<QueuedReq> {
        self.items.lock().await.pop_front()
    }

    /// Remove everything (shutdown sweep).
    pub async fn drain(&self) -> Vec<QueuedReq> {
        self.items.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Suspend until at least one item is queued.
    pub async fn wait_non_empty(&self) {
        loop {
            if !self.is_empty().await {
                return;
            }
            self.non_empty.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::ResourceReq;
    use std::sync::Arc;
    use std::time::Duration;

    fn item() -> QueuedReq {
        QueuedReq {
            lease_id: LeaseId::generate(),
            req: ResourceReq::new("switch", 1),
        }
    }

    #[tokio::test]
    async fn fifo_order_preserved() {
        let queue = RequestQueue::new();
        let first = item();
        let second = item();
        queue.push(first.clone()).await;
        queue.push(second.clone()).await;

        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.peek().await.unwrap().lease_id, first.lease_id);
        assert_eq!(queue.pop().await.unwrap().lease_id, first.lease_id);
        assert_eq!(queue.pop().await.unwrap().lease_id, second.lease_id);
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn wait_non_empty_wakes_on_push() {
        let queue = Arc::new(RequestQueue::new());
        let waiter = queue.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_non_empty().await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        queue.push(item()).await;
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
