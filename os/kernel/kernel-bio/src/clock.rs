use core::sync::atomic::{AtomicU64, Ordering};

/// Logical time source used to order buffer releases.
///
/// Only the ordering of values matters; ticks need not relate to wall time,
/// but must never decrease.
pub trait Clock: Sync {
    fn ticks(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn ticks(&self) -> u64 {
        (**self).ticks()
    }
}

/// Monotonic tick counter, advanced by the timer interrupt.
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicU64,
}

impl TickCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Advance by one tick and return the new value.
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Clock for TickCounter {
    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}
