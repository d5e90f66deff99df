use crate::{BlockDevice, BlockId, BufferCache, Clock};
use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use kernel_info::params::BSIZE;
use kernel_sync::{Scheduler, SleepLockGuard};
use log::{error, warn};

/// A locked buffer handed out by [`BufferCache::acquire`] or
/// [`BufferCache::read`].
///
/// The handle owns one reference and the buffer's sleep lock. It dereferences
/// to the block payload. Hand it back with [`BufferCache::release`]; dropping
/// it has the same effect.
///
/// # Panics
/// Dropping the handle in a task that does not hold the buffer's lock panics.
/// The lock and the reference stay with their holder. While unwinding they are
/// leaked without a second panic.
pub struct Buf<'a, D, S, C, const NBUF: usize, const NBUCKET: usize>
where
    D: BlockDevice,
    S: Scheduler,
    C: Clock,
{
    cache: &'a BufferCache<D, S, C, NBUF, NBUCKET>,
    slot: usize,
    block: BlockId,
    content: ManuallyDrop<SleepLockGuard<'a, [u8; BSIZE]>>,
}

impl<'a, D, S, C, const NBUF: usize, const NBUCKET: usize> Buf<'a, D, S, C, NBUF, NBUCKET>
where
    D: BlockDevice,
    S: Scheduler,
    C: Clock,
{
    pub(crate) const fn new(
        cache: &'a BufferCache<D, S, C, NBUF, NBUCKET>,
        slot: usize,
        block: BlockId,
        content: SleepLockGuard<'a, [u8; BSIZE]>,
    ) -> Self {
        Self {
            cache,
            slot,
            block,
            content: ManuallyDrop::new(content),
        }
    }

    #[inline]
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    #[inline]
    #[must_use]
    pub const fn dev(&self) -> u32 {
        self.block.dev
    }

    #[inline]
    #[must_use]
    pub const fn blockno(&self) -> u32 {
        self.block.blockno
    }

    /// Index of the cache slot backing this buffer.
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8; BSIZE] {
        &self.content
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8; BSIZE] {
        &mut self.content
    }

    /// Whether the calling task holds this buffer's lock.
    ///
    /// False when the handle was passed on to another task.
    #[must_use]
    pub fn held_by_current(&self) -> bool {
        self.cache.holding(self.slot)
    }
}

impl<D, S, C, const NBUF: usize, const NBUCKET: usize> Deref for Buf<'_, D, S, C, NBUF, NBUCKET>
where
    D: BlockDevice,
    S: Scheduler,
    C: Clock,
{
    type Target = [u8; BSIZE];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl<D, S, C, const NBUF: usize, const NBUCKET: usize> DerefMut for Buf<'_, D, S, C, NBUF, NBUCKET>
where
    D: BlockDevice,
    S: Scheduler,
    C: Clock,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl<D, S, C, const NBUF: usize, const NBUCKET: usize> fmt::Debug for Buf<'_, D, S, C, NBUF, NBUCKET>
where
    D: BlockDevice,
    S: Scheduler,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf")
            .field("block", &self.block)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl<D, S, C, const NBUF: usize, const NBUCKET: usize> Drop for Buf<'_, D, S, C, NBUF, NBUCKET>
where
    D: BlockDevice,
    S: Scheduler,
    C: Clock,
{
    fn drop(&mut self) {
        if !self.held_by_current() {
            let task = self.cache.scheduler().current_task();
            if kernel_sync::panicking() {
                warn!("brelse: {} left locked, {task} is unwinding", self.block);
                return;
            }
            error!("brelse: {} dropped by {task}, which does not hold it", self.block);
            panic!("brelse: buffer not locked by caller");
        }

        // Content lock first, then the reference under the bucket lock.
        // SAFETY: `content` is not used after this point.
        unsafe { ManuallyDrop::drop(&mut self.content) };
        self.cache.unref(self.slot, self.block);
    }
}
