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

//! Stall/wake coordination between workers and inventory changes.
//!
//! Workers that cannot satisfy their queue head suspend here until a
//! `signal()` reports that inventory changed (a resource went Free or new
//! stock arrived). The gate is epoch-based: a worker records the epoch
//! before evaluating candidates and passes it to `wait`; if any signal
//! lands in between, `wait` returns immediately instead of sleeping through
//! the wake. Spurious wakes are allowed; woken workers re-evaluate from
//! scratch.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

/// Epoch-counting wake gate shared by all queue workers.
#[derive(Debug, Default)]
pub struct StallGate {
    epoch: AtomicU64,
    stalled: AtomicU64,
    signals: AtomicU64,
    notify: Notify,
}

impl StallGate {
    /// Fresh gate with no outstanding stalls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch; capture before candidate evaluation.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Report an inventory change and wake stalled workers.
    pub fn signal(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.signals.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Suspend until a signal lands after `observed`.
    pub async fn wait(&self, observed: u64) {
        self.stalled.fetch_add(1, Ordering::SeqCst);
        loop {
            if self.epoch.load(Ordering::SeqCst) != observed {
                break;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register interest before the re-check so a signal between the
            // check and the await cannot be lost
            notified.as_mut().enable();
            if self.epoch.load(Ordering::SeqCst) != observed {
                break;
            }
            notified.await;
            break;
        }
        self.stalled.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of workers currently suspended in `wait`.
    pub fn stalled(&self) -> u64 {
        self.stalled.load(Ordering::SeqCst)
    }

    /// Total signals issued.
    pub fn signals(&self) -> u64 {
        self.signals.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_when_signaled() {
        let gate = Arc::new(StallGate::new());
        let observed = gate.epoch();

        let waiter = gate.clone();
        let handle = tokio::spawn(async move {
            waiter.wait(observed).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(gate.stalled(), 1);

        gate.signal();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("stalled worker should wake")
            .unwrap();
        assert_eq!(gate.stalled(), 0);
    }

    #[tokio::test]
    async fn signal_before_wait_is_not_lost() {
        let gate = StallGate::new();
        let observed = gate.epoch();
        gate.signal();
        // epoch moved past the observation; wait must return immediately
        tokio::time::timeout(Duration::from_millis(100), gate.wait(observed))
            .await
            .expect("wait must not sleep through an earlier signal");
    }

    #[tokio::test]
    async fn signal_wakes_all_stalled_workers() {
        let gate = Arc::new(StallGate::new());
        let observed = gate.epoch();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let waiter = gate.clone();
            handles.push(tokio::spawn(async move { waiter.wait(observed).await }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gate.stalled(), 3);

        gate.signal();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("worker should wake")
                .unwrap();
        }
    }
}
