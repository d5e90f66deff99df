//! Per-buffer state.
//!
//! Metadata lives in atomics so that it can be guarded by whichever bucket
//! lock currently owns the buffer; plain loads and stores are enough because
//! every access happens under that lock (or, for eviction, under the bucket
//! lock plus the eviction lock).

use crate::BlockId;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use kernel_info::params::BSIZE;
use kernel_sync::SleepLock;

/// End-of-chain marker for [`BufSlot::next`].
const NIL: usize = usize::MAX;

pub(crate) struct BufSlot {
    /// Packed [`BlockId`], or [`BlockId::UNASSIGNED`].
    key: AtomicU64,
    refcnt: AtomicU32,
    /// Tick of the release that dropped `refcnt` to zero.
    last_use: AtomicU64,
    /// Successor on the bucket chain.
    next: AtomicUsize,
    /// Has the content been read from disk? Written by the content holder, or
    /// by eviction while nobody references the buffer.
    valid: AtomicBool,
    pub(crate) content: SleepLock<[u8; BSIZE]>,
}

impl BufSlot {
    pub(crate) const fn new() -> Self {
        Self {
            key: AtomicU64::new(BlockId::UNASSIGNED),
            refcnt: AtomicU32::new(0),
            last_use: AtomicU64::new(0),
            next: AtomicUsize::new(NIL),
            valid: AtomicBool::new(false),
            content: SleepLock::new("buffer", [0; BSIZE]),
        }
    }

    pub(crate) fn block(&self) -> Option<BlockId> {
        BlockId::unpack(self.key.load(Ordering::Relaxed))
    }

    pub(crate) fn holds(&self, block: BlockId) -> bool {
        self.key.load(Ordering::Relaxed) == block.pack()
    }

    /// Recycle for `block` with the caller as the only reference.
    pub(crate) fn assign(&self, block: BlockId) {
        self.key.store(block.pack(), Ordering::Relaxed);
        self.valid.store(false, Ordering::Release);
        self.refcnt.store(1, Ordering::Relaxed);
    }

    pub(crate) fn refcnt(&self) -> u32 {
        self.refcnt.load(Ordering::Relaxed)
    }

    pub(crate) fn add_ref(&self) {
        self.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop one reference and return the remaining count.
    pub(crate) fn drop_ref(&self) -> u32 {
        let prev = self.refcnt.fetch_sub(1, Ordering::Relaxed);
        assert!(prev > 0, "brelse: reference count underflow");
        prev - 1
    }

    pub(crate) fn last_use(&self) -> u64 {
        self.last_use.load(Ordering::Relaxed)
    }

    pub(crate) fn stamp(&self, ticks: u64) {
        self.last_use.store(ticks, Ordering::Relaxed);
    }

    pub(crate) fn next(&self) -> Option<usize> {
        match self.next.load(Ordering::Relaxed) {
            NIL => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn set_next(&self, next: Option<usize>) {
        self.next.store(next.unwrap_or(NIL), Ordering::Relaxed);
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub(crate) fn mark_valid(&self) {
        self.valid.store(true, Ordering::Release);
    }
}
