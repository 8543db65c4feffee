// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid locks serializing the transactions on a shared connection.
//!
//! Both locks count holder and waiters in a single atomic. An uncontended
//! acquisition is a single atomic increment. Contended callers wait on a
//! signal that is set exactly once per release with waiters present, so a
//! release wakes at most one of them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

mod async_hybrid;
mod hybrid;

pub use self::{
    async_hybrid::{AsyncHybridLock, AsyncHybridLockGuard},
    hybrid::{HybridLock, HybridLockGuard},
};

/// Contention counters of one or more locks.
///
/// Shared via `Arc` between the locks that should be accounted together.
#[derive(Debug, Default)]
pub struct LockMetrics {
    fast: AtomicU64,
    contended: AtomicU64,
    waiting: AtomicUsize,
    cancelled: AtomicU64,
}

/// Point-in-time copy of [`LockMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Acquisitions without waiting.
    pub fast_acquisitions: u64,
    /// Acquisitions that had to wait for another holder.
    pub contended_acquisitions: u64,
    /// Callers currently waiting.
    pub waiting: usize,
    /// Waits that have been abandoned before the lock was acquired.
    pub cancelled: u64,
}

impl LockMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> LockStats {
        LockStats {
            fast_acquisitions: self.fast.load(Ordering::Relaxed),
            contended_acquisitions: self.contended.load(Ordering::Relaxed),
            waiting: self.waiting.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    fn on_fast(&self) {
        self.fast.fetch_add(1, Ordering::Relaxed);
    }

    fn on_wait(&self) {
        self.waiting.fetch_add(1, Ordering::Relaxed);
    }

    fn on_acquired_after_wait(&self) {
        self.waiting.fetch_sub(1, Ordering::Relaxed);
        self.contended.fetch_add(1, Ordering::Relaxed);
    }

    fn on_cancelled(&self) {
        self.waiting.fetch_sub(1, Ordering::Relaxed);
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }
}
