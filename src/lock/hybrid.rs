// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
};

use super::LockMetrics;

/// Auto-reset event: every `set` releases exactly one `wait`.
#[derive(Debug, Default)]
struct Signal {
    permits: Mutex<usize>,
    cond: Condvar,
}

impl Signal {
    fn set(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *permits += 1;
        self.cond.notify_one();
    }

    fn wait(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *permits == 0 {
            permits = self
                .cond
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }
}

/// Blocking lock with a lock-free uncontended path.
///
/// Not reentrant: locking twice from the same thread deadlocks.
pub struct HybridLock<T> {
    /// Holder plus waiters
    state: AtomicUsize,
    signal: Signal,
    metrics: Option<Arc<LockMetrics>>,
    /// Never contended, only the admitted caller locks it.
    data: Mutex<T>,
}

impl<T> HybridLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            signal: Signal::default(),
            metrics: None,
            data: Mutex::new(data),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LockMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Block the current thread until the lock is acquired.
    pub fn lock(&self) -> HybridLockGuard<'_, T> {
        if self.state.fetch_add(1, Ordering::AcqRel) == 0 {
            if let Some(metrics) = &self.metrics {
                metrics.on_fast();
            }
        } else {
            if let Some(metrics) = &self.metrics {
                metrics.on_wait();
            }
            self.signal.wait();
            if let Some(metrics) = &self.metrics {
                metrics.on_acquired_after_wait();
            }
        }
        HybridLockGuard::new(self)
    }

    /// Acquire the lock only if nobody holds or waits for it.
    pub fn try_lock(&self) -> Option<HybridLockGuard<'_, T>> {
        self.state
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed)
            .ok()?;
        if let Some(metrics) = &self.metrics {
            metrics.on_fast();
        }
        Some(HybridLockGuard::new(self))
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        if self.state.fetch_sub(1, Ordering::AcqRel) != 1 {
            self.signal.set();
        }
    }
}

impl<T> fmt::Debug for HybridLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridLock")
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Releases the admission when dropped.
struct Admission<'a, T>(&'a HybridLock<T>);

impl<T> Drop for Admission<'_, T> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Releases the [`HybridLock`] when dropped.
#[must_use = "the lock is released immediately if the guard is not used"]
pub struct HybridLockGuard<'a, T> {
    // Dropped before the admission, the next holder finds `data` unlocked.
    data: MutexGuard<'a, T>,
    _admission: Admission<'a, T>,
}

impl<'a, T> HybridLockGuard<'a, T> {
    fn new(lock: &'a HybridLock<T>) -> Self {
        let admission = Admission(lock);
        let data = lock.data.lock().unwrap_or_else(PoisonError::into_inner);
        Self {
            data,
            _admission: admission,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HybridLockGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HybridLockGuard").field(&**self).finish()
    }
}

impl<T> Deref for HybridLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for HybridLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}
