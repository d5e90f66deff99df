use core::fmt;

/// Identity of a schedulable task (a process or kernel thread).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TaskId(u64);

impl TaskId {
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {}", self.0)
    }
}

/// Opaque rendezvous key that sleepers and wakers agree on.
///
/// By convention this is the address of the object being waited for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct WaitChannel(usize);

impl WaitChannel {
    /// The channel identified by the address of `object`.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized>(object: &T) -> Self {
        Self(core::ptr::from_ref(object).addr())
    }
}

/// The scheduler services a blocking lock needs.
///
/// The scheduler itself lives outside this crate; kernels implement this on
/// top of their process table, the [`hosted`](crate::hosted) module on top of
/// OS threads.
pub trait Scheduler: Sync {
    /// The task executing on the calling thread of control.
    fn current_task(&self) -> TaskId;

    /// Suspend the caller on `chan` while `still_blocked()` returns `true`.
    ///
    /// Implementations must evaluate `still_blocked` and enter the wait
    /// atomically with respect to [`wakeup`](Self::wakeup) on the same
    /// channel, so that a wakeup issued after the state change the caller is
    /// waiting for is never lost. Spurious returns are allowed; callers
    /// re-check their condition.
    fn sleep(&self, chan: WaitChannel, still_blocked: &dyn Fn() -> bool);

    /// Wake every task sleeping on `chan`.
    fn wakeup(&self, chan: WaitChannel);
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn current_task(&self) -> TaskId {
        (**self).current_task()
    }

    fn sleep(&self, chan: WaitChannel, still_blocked: &dyn Fn() -> bool) {
        (**self).sleep(chan, still_blocked);
    }

    fn wakeup(&self, chan: WaitChannel) {
        (**self).wakeup(chan);
    }
}

/// Whether the running task is unwinding from a panic.
///
/// Always `false` without the `std` feature; kernel panics do not unwind.
#[inline]
#[must_use]
pub fn panicking() -> bool {
    #[cfg(feature = "std")]
    {
        std::thread::panicking()
    }
    #[cfg(not(feature = "std"))]
    {
        false
    }
}
