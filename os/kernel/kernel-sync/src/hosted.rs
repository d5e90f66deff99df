//! # Hosted scheduler and CPU seams
//!
//! OS threads stand in for kernel tasks and cores: each thread is one task,
//! and each thread claims a core index with [`ThreadCpus::bind`]. Used by the
//! test suites and by host-side simulations of kernel subsystems.

use crate::{Cpu, Scheduler, TaskId, WaitChannel};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

static NEXT_TASK: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static TASK: TaskId = TaskId::new(NEXT_TASK.fetch_add(1, Ordering::Relaxed));
    static CORE: Cell<usize> = const { Cell::new(0) };
    static NOFF: Cell<usize> = const { Cell::new(0) };
}

/// [`Scheduler`] backed by a single condition variable.
///
/// Every OS thread is a distinct task. Sleepers on all channels share one
/// wait queue; a wakeup wakes them all and each re-checks its own condition.
#[derive(Default)]
pub struct ThreadScheduler {
    queue: Mutex<()>,
    wake: Condvar,
}

impl ThreadScheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(()),
            wake: Condvar::new(),
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn current_task(&self) -> TaskId {
        TASK.with(|t| *t)
    }

    fn sleep(&self, chan: WaitChannel, still_blocked: &dyn Fn() -> bool) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        while still_blocked() {
            log::trace!("{} sleeping on {chan:?}", self.current_task());
            queue = self
                .wake
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn wakeup(&self, _chan: WaitChannel) {
        let _queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_all();
    }
}

/// [`Cpu`] backed by thread-local state.
///
/// A thread runs on core 0 until it calls [`bind`](Self::bind).
#[derive(Default, Copy, Clone)]
pub struct ThreadCpus;

impl ThreadCpus {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Declare that the calling thread executes on `core` from now on.
    ///
    /// # Panics
    /// If the thread is currently pinned.
    pub fn bind(core: usize) {
        assert_eq!(
            NOFF.with(Cell::get),
            0,
            "bind: cannot migrate a pinned thread"
        );
        CORE.with(|c| c.set(core));
    }

    /// Current `push_off` nesting depth of the calling thread.
    #[must_use]
    pub fn depth() -> usize {
        NOFF.with(Cell::get)
    }
}

impl Cpu for ThreadCpus {
    fn id(&self) -> usize {
        debug_assert!(Self::depth() > 0, "cpuid: migration not suppressed");
        CORE.with(Cell::get)
    }

    fn push_off(&self) {
        NOFF.with(|n| n.set(n.get() + 1));
    }

    fn pop_off(&self) {
        NOFF.with(|n| {
            let depth = n.get();
            assert!(depth > 0, "pop_off: not pushed");
            n.set(depth - 1);
        });
    }
}
