use crate::{Scheduler, SpinLock, TaskId, WaitChannel};
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// Blocking lock for long-held content.
///
/// A task that finds the lock taken is suspended through the [`Scheduler`]
/// until the holder releases it. The holder itself may suspend while holding
/// the lock (e.g. while waiting for a disk transfer).
///
/// The lock remembers which task holds it so callers can detect protocol
/// misuse with [`holding`](Self::holding).
pub struct SleepLock<T> {
    /// Name used in diagnostics.
    name: &'static str,
    /// `Some(task)` while locked.
    holder: SpinLock<Option<TaskId>>,
    data: UnsafeCell<T>,
}

// Safety: access to `data` is serialized by `holder`.
unsafe impl<T: Send> Sync for SleepLock<T> {}

impl<T> SleepLock<T> {
    pub const fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            holder: SpinLock::new(None),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock on behalf of the current task, sleeping while another
    /// task holds it.
    ///
    /// Re-acquiring a lock the current task already holds never returns.
    pub fn lock<'a>(&'a self, sched: &'a dyn Scheduler) -> SleepLockGuard<'a, T> {
        let task = sched.current_task();
        loop {
            if let Some(guard) = self.try_lock_as(task, sched) {
                return guard;
            }
            sched.sleep(self.channel(), &|| self.is_locked());
        }
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_lock<'a>(&'a self, sched: &'a dyn Scheduler) -> Option<SleepLockGuard<'a, T>> {
        self.try_lock_as(sched.current_task(), sched)
    }

    /// Whether `task` is the current holder.
    pub fn holding(&self, task: TaskId) -> bool {
        self.holder.with_lock(|h| *h == Some(task))
    }

    pub fn is_locked(&self) -> bool {
        self.holder.with_lock(|h| h.is_some())
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The channel waiters sleep on.
    #[must_use]
    pub fn channel(&self) -> WaitChannel {
        WaitChannel::of(self)
    }

    /// Mutable access when you have `&mut self` (no contention possible).
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn try_lock_as<'a>(
        &'a self,
        task: TaskId,
        sched: &'a dyn Scheduler,
    ) -> Option<SleepLockGuard<'a, T>> {
        let mut holder = self.holder.lock();
        if holder.is_some() {
            return None;
        }
        *holder = Some(task);
        Some(SleepLockGuard {
            lock: self,
            sched,
            _not_auto: PhantomData,
        })
    }
}

/// Exclusive access to a [`SleepLock`]'s content.
///
/// Dropping the guard releases the lock and wakes all waiters.
pub struct SleepLockGuard<'a, T> {
    lock: &'a SleepLock<T>,
    sched: &'a dyn Scheduler,
    _not_auto: PhantomData<*const ()>,
}

// Safety: the guard may be handed to another task; shared access through the
// guard only exposes `&T`.
unsafe impl<T: Send> Send for SleepLockGuard<'_, T> {}
unsafe impl<T: Sync> Sync for SleepLockGuard<'_, T> {}

impl<T> SleepLockGuard<'_, T> {
    /// Whether the task calling this is the one holding the lock.
    pub fn held_by_current(&self) -> bool {
        self.lock.holding(self.sched.current_task())
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.lock.name
    }
}

impl<T> Deref for SleepLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SleepLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SleepLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.holder.with_lock(|h| *h = None);
        self.sched.wakeup(self.lock.channel());
    }
}
