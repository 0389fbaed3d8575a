//! Blocking mutex with owner identity, and a condition variable bound to it.
//!
//! Grounded in the teacher's `spinlock::Mutex<T>` / `sleeplock::SleepLock<T>`
//! pair (owner tracking plus an RAII guard that releases on `Drop`), redesigned
//! per the spec's own guidance: since this kernel runs its threads on a real
//! OS rather than one logical CPU, the lock blocks on a real condition
//! variable instead of spinning or masking interrupts, and the sleep/wake
//! atomicity `std::sync::Condvar` already gives us is exactly the atomicity
//! the spec asks the condition variable to provide.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar as StdCondvar, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::thread::{self, ThreadId};

/// A blocking mutex that remembers which thread holds it.
pub struct Mutex<T> {
    inner: StdMutex<T>,
    owner: StdMutex<Option<ThreadId>>,
}

pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
    guard: Option<StdMutexGuard<'a, T>>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Mutex {
            inner: StdMutex::new(value),
            owner: StdMutex::new(None),
        }
    }

    /// Blocks until the mutex is free, then acquires it.
    pub fn acquire(&self) -> MutexGuard<'_, T> {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *self.owner.lock().unwrap() = Some(thread::current().id());
        MutexGuard {
            mutex: self,
            guard: Some(guard),
        }
    }

    /// True if the calling thread currently holds the mutex.
    pub fn is_held_by_current(&self) -> bool {
        *self.owner.lock().unwrap() == Some(thread::current().id())
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Mutex::new(T::default())
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            *self.mutex.owner.lock().unwrap() = None;
        }
        self.guard = None;
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.guard.as_ref().unwrap()
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().unwrap()
    }
}

/// A condition variable bound to a specific [`Mutex`], mirroring the spec's
/// `sleep`/`wake`/`wakeAll` trio. The mutex is shared via `Arc` so that a
/// struct can own both the mutex and one or more condition variables over it
/// without a self-referential borrow.
pub struct CondVar<T> {
    mutex: Arc<Mutex<T>>,
    inner: StdCondvar,
    /// Number of threads currently parked in `sleep`. Decremented by the
    /// waker in `wake`, not by the sleeper, per the spec.
    waiters: AtomicUsize,
}

impl<T> CondVar<T> {
    pub fn new(mutex: Arc<Mutex<T>>) -> Self {
        CondVar {
            mutex,
            inner: StdCondvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    pub fn mutex(&self) -> &Arc<Mutex<T>> {
        &self.mutex
    }

    /// Atomically releases the mutex and suspends the calling thread; on wake,
    /// reacquires the mutex before returning. Precondition: `guard` is this
    /// condition's mutex, currently held by the calling thread.
    pub fn sleep<'g>(&self, mut guard: MutexGuard<'g, T>) -> MutexGuard<'g, T> {
        assert!(std::ptr::eq(guard.mutex, &*self.mutex));
        let mutex = guard.mutex;
        self.waiters.fetch_add(1, Ordering::SeqCst);

        // The owner slot must read "unheld" for the duration of the park,
        // since another thread is about to hold the underlying std mutex.
        *mutex.owner.lock().unwrap() = None;
        let std_guard = guard.guard.take().expect("sleep without holding the mutex");

        let std_guard = self
            .inner
            .wait(std_guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        *mutex.owner.lock().unwrap() = Some(thread::current().id());
        MutexGuard {
            mutex,
            guard: Some(std_guard),
        }
    }

    /// Wakes one waiter, if any. Precondition: the mutex is held by the caller.
    pub fn wake(&self, _guard: &MutexGuard<'_, T>) {
        assert!(self.mutex.is_held_by_current());
        if self.waiters.load(Ordering::SeqCst) > 0 {
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            self.inner.notify_one();
        }
    }

    /// Wakes every waiter currently enqueued.
    pub fn wake_all(&self, guard: &MutexGuard<'_, T>) {
        while self.waiters.load(Ordering::SeqCst) > 0 {
            self.wake(guard);
        }
    }
}
