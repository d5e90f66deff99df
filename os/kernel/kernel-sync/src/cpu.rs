use core::marker::PhantomData;

/// Per-core execution context.
///
/// On hardware, `push_off`/`pop_off` disable and restore interrupts (and with
/// them, preemption) with nesting, and `id` reads the executing core's index.
pub trait Cpu: Sync {
    /// Index of the executing core.
    ///
    /// Only stable while migration is suppressed, i.e. inside a [`CorePin`].
    fn id(&self) -> usize;

    /// Suppress migration. Calls nest.
    fn push_off(&self);

    /// Undo one [`push_off`](Self::push_off).
    fn pop_off(&self);
}

impl<C: Cpu + ?Sized> Cpu for &C {
    fn id(&self) -> usize {
        (**self).id()
    }

    fn push_off(&self) {
        (**self).push_off();
    }

    fn pop_off(&self) {
        (**self).pop_off();
    }
}

/// RAII guard that keeps the caller on its current core.
///
/// `CorePin::new` suppresses migration and snapshots the core id; dropping
/// the pin restores the previous state. The core id returned by
/// [`core`](Self::core) is the core that executes the whole scope.
///
/// # Examples
///
/// ```no_run
/// use kernel_sync::{CorePin, hosted::ThreadCpus};
///
/// let cpus = ThreadCpus::new();
/// {
///     let pin = CorePin::new(&cpus);
///     let _core = pin.core(); // stays valid until the pin drops
/// }
/// ```
pub struct CorePin<'a, C: Cpu + ?Sized> {
    cpu: &'a C,
    core: usize,
    /// A pin belongs to the thread of control that created it.
    _not_send: PhantomData<*mut ()>,
}

impl<'a, C: Cpu + ?Sized> CorePin<'a, C> {
    #[inline]
    #[must_use]
    pub fn new(cpu: &'a C) -> Self {
        cpu.push_off();
        let core = cpu.id();
        Self {
            cpu,
            core,
            _not_send: PhantomData,
        }
    }

    /// The core this scope runs on.
    #[inline]
    #[must_use]
    pub const fn core(&self) -> usize {
        self.core
    }
}

impl<C: Cpu + ?Sized> Drop for CorePin<'_, C> {
    fn drop(&mut self) {
        self.cpu.pop_off();
    }
}
