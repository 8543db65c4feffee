// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    fmt, hint,
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use futures_util::future::{BoxFuture, FutureExt as _};
use tokio::sync::{AcquireError, Mutex, MutexGuard, Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;

use super::LockMetrics;
use crate::{Error, Result};

/// Asynchronous lock with a lock-free uncontended path.
///
/// Contended callers are suspended instead of blocking a thread. A waiting
/// caller may leave the queue at any time, either through a
/// [`CancellationToken`] or by dropping the future.
pub struct AsyncHybridLock<T> {
    /// Holder plus waiters
    state: AtomicUsize,
    /// One permit per hand-over from a releasing holder to a waiter.
    signal: Semaphore,
    metrics: Option<Arc<LockMetrics>>,
    /// Never contended, only the admitted caller locks it.
    data: Mutex<T>,
}

impl<T> AsyncHybridLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            signal: Semaphore::new(0),
            metrics: None,
            data: Mutex::new(data),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LockMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn try_fast(&self) -> bool {
        if self.state.fetch_add(1, Ordering::AcqRel) == 0 {
            if let Some(metrics) = &self.metrics {
                metrics.on_fast();
            }
            return true;
        }
        if let Some(metrics) = &self.metrics {
            metrics.on_wait();
        }
        false
    }

    /// Suspend until the lock is acquired.
    pub async fn lock(&self) -> AsyncHybridLockGuard<'_, T> {
        if self.try_fast() {
            return AsyncHybridLockGuard::new(self).await;
        }
        Waiter::new(self).wait().await
    }

    /// Suspend until the lock is acquired or `token` is cancelled.
    pub async fn lock_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<AsyncHybridLockGuard<'_, T>> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.try_fast() {
            return Ok(AsyncHybridLockGuard::new(self).await);
        }
        let mut waiter = Waiter::new(self);
        let guard = tokio::select! {
            biased;
            guard = waiter.wait() => Some(guard),
            () = token.cancelled() => None,
        };
        guard.ok_or_else(|| {
            log::debug!("Cancelled while waiting for the lock");
            drop(waiter);
            Error::Cancelled
        })
    }

    /// Acquire the lock only if nobody holds or waits for it.
    pub fn try_lock(&self) -> Option<AsyncHybridLockGuard<'_, T>> {
        self.state
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed)
            .ok()?;
        if let Some(metrics) = &self.metrics {
            metrics.on_fast();
        }
        let admission = Admission(self);
        let data = self.data.try_lock().ok()?;
        Some(AsyncHybridLockGuard {
            data,
            _admission: admission,
        })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn release(&self) {
        if self.state.fetch_sub(1, Ordering::AcqRel) != 1 {
            self.signal.add_permits(1);
        }
    }

    /// Leave the queue without having acquired the lock.
    fn abandon(&self) {
        let mut state = self.state.load(Ordering::Acquire);
        let mut spins = 0_u32;
        loop {
            if state == 1 {
                // Nobody else is left, so the last release handed the lock
                // over to this waiter. Its permit may not have arrived yet.
                if let Ok(permit) = self.signal.try_acquire() {
                    permit.forget();
                    self.release();
                    return;
                }
                spins += 1;
                if spins < 64 {
                    hint::spin_loop();
                } else {
                    thread::yield_now();
                }
                state = self.state.load(Ordering::Acquire);
                continue;
            }
            match self.state.compare_exchange_weak(
                state,
                state - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => state = actual,
            }
        }
    }
}

impl<T> fmt::Debug for AsyncHybridLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHybridLock")
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

type Acquire<'a> = BoxFuture<'a, std::result::Result<SemaphorePermit<'a>, AcquireError>>;

/// A caller counted in `state` that does not hold the lock yet.
///
/// Dropped before [`Waiter::wait`] has finished it leaves the queue.
struct Waiter<'a, T> {
    lock: &'a AsyncHybridLock<T>,
    acquire: Option<Acquire<'a>>,
    done: bool,
}

impl<'a, T> Waiter<'a, T> {
    fn new(lock: &'a AsyncHybridLock<T>) -> Self {
        Self {
            lock,
            acquire: Some(lock.signal.acquire().boxed()),
            done: false,
        }
    }

    async fn wait(&mut self) -> AsyncHybridLockGuard<'a, T> {
        if let Some(acquire) = self.acquire.as_mut() {
            match acquire.await {
                Ok(permit) => permit.forget(),
                Err(_) => unreachable!("semaphore is never closed"),
            }
        }
        self.acquire = None;
        self.done = true;
        if let Some(metrics) = &self.lock.metrics {
            metrics.on_acquired_after_wait();
        }
        AsyncHybridLockGuard::new(self.lock).await
    }
}

impl<T> Drop for Waiter<'_, T> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // Returns a permit that has already been assigned to this waiter.
        self.acquire = None;
        if let Some(metrics) = &self.lock.metrics {
            metrics.on_cancelled();
        }
        self.lock.abandon();
    }
}

/// Releases the admission when dropped.
struct Admission<'a, T>(&'a AsyncHybridLock<T>);

impl<T> Drop for Admission<'_, T> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Releases the [`AsyncHybridLock`] when dropped.
#[must_use = "the lock is released immediately if the guard is not used"]
pub struct AsyncHybridLockGuard<'a, T> {
    // Dropped before the admission, the next holder finds `data` unlocked.
    data: MutexGuard<'a, T>,
    _admission: Admission<'a, T>,
}

impl<'a, T> AsyncHybridLockGuard<'a, T> {
    /// Only called once admitted, `data` is free at that point.
    async fn new(lock: &'a AsyncHybridLock<T>) -> AsyncHybridLockGuard<'a, T> {
        let admission = Admission(lock);
        let data = lock.data.lock().await;
        Self {
            data,
            _admission: admission,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for AsyncHybridLockGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AsyncHybridLockGuard").field(&**self).finish()
    }
}

impl<T> Deref for AsyncHybridLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for AsyncHybridLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}
