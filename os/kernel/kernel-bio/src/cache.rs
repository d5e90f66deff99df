use crate::buf::Buf;
use crate::slot::BufSlot;
use crate::{BlockDevice, BlockId, BlockIo, Clock};
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_info::params;
use kernel_sync::{Scheduler, SpinLock, SpinLockGuard};
use log::{debug, error, info, trace};

/// A buffer cache sized by the kernel's configured [`params::NBUF`] and
/// [`params::NBUCKET`].
pub type Bcache<D, S, C> = BufferCache<D, S, C, { params::NBUF }, { params::NBUCKET }>;

/// Hash chain of one bucket.
#[derive(Default)]
struct Chain {
    head: Option<usize>,
}

/// Best eviction candidate found so far, with its bucket still locked.
struct Victim<'a> {
    bucket: usize,
    prev: Option<usize>,
    slot: usize,
    last_use: u64,
    chain: SpinLockGuard<'a, Chain>,
}

/// Snapshot of the cache's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found their block resident.
    pub hits: u64,
    /// Lookups that recycled a buffer.
    pub misses: u64,
    /// Blocks read from the device.
    pub reads: u64,
    /// Blocks written to the device.
    pub writes: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fixed-capacity cache of `NBUF` block buffers spread over `NBUCKET`
/// hash buckets.
///
/// The cache is created once and shared by every task that does block I/O.
/// `D` performs the transfers, `S` suspends tasks waiting for a busy buffer
/// and `C` provides the recency timestamps used for eviction.
pub struct BufferCache<D, S, C, const NBUF: usize, const NBUCKET: usize> {
    disk: D,
    sched: S,
    clock: C,
    evict: SpinLock<()>,
    buckets: [SpinLock<Chain>; NBUCKET],
    slots: [BufSlot; NBUF],
    stats: Counters,
}

impl<D, S, C, const NBUF: usize, const NBUCKET: usize> BufferCache<D, S, C, NBUF, NBUCKET>
where
    D: BlockDevice,
    S: Scheduler,
    C: Clock,
{
    /// Create the cache with every buffer unassigned.
    ///
    /// Buffer `i` starts out on bucket `i % NBUCKET`.
    #[must_use]
    pub fn new(disk: D, sched: S, clock: C) -> Self {
        const { assert!(NBUCKET > 0, "buffer cache needs at least one bucket") };

        let mut cache = Self {
            disk,
            sched,
            clock,
            evict: SpinLock::new(()),
            buckets: core::array::from_fn(|_| SpinLock::new(Chain::default())),
            slots: core::array::from_fn(|_| BufSlot::new()),
            stats: Counters::default(),
        };

        for slot in 0..NBUF {
            let chain = cache.buckets[slot % NBUCKET].get_mut();
            cache.slots[slot].set_next(chain.head);
            chain.head = Some(slot);
        }

        info!("bcache: {NBUF} buffers in {NBUCKET} buckets");
        cache
    }

    /// Return the locked buffer for `dev`/`blockno` without reading it.
    ///
    /// Blocks while another task holds the buffer.
    ///
    /// # Panics
    /// If the block is not cached and every buffer is referenced.
    pub fn acquire(&self, dev: u32, blockno: u32) -> Buf<'_, D, S, C, NBUF, NBUCKET> {
        self.get(BlockId::new(dev, blockno))
    }

    /// Return the locked buffer for `dev`/`blockno` with the block's content.
    ///
    /// # Panics
    /// If the block is not cached and every buffer is referenced.
    pub fn read(&self, dev: u32, blockno: u32) -> Buf<'_, D, S, C, NBUF, NBUCKET> {
        let block = BlockId::new(dev, blockno);
        let mut buf = self.get(block);
        let slot = &self.slots[buf.slot()];
        if !slot.is_valid() {
            self.disk.transfer(block, BlockIo::Read(buf.data_mut()));
            Counters::bump(&self.stats.reads);
            slot.mark_valid();
        }
        buf
    }

    /// Write the buffer's content to disk.
    ///
    /// # Panics
    /// If the calling task does not hold the buffer's lock.
    pub fn write(&self, buf: &Buf<'_, D, S, C, NBUF, NBUCKET>) {
        if !buf.held_by_current() {
            error!(
                "bwrite: {} not locked by {}",
                buf.block(),
                self.sched.current_task()
            );
            panic!("bwrite: buffer not locked by caller");
        }
        self.disk.transfer(buf.block(), BlockIo::Write(buf.data()));
        Counters::bump(&self.stats.writes);
    }

    /// Release a locked buffer.
    ///
    /// Once the last reference is gone the buffer records the current tick
    /// as its recency timestamp and becomes an eviction candidate.
    ///
    /// # Panics
    /// If the calling task does not hold the buffer's lock.
    pub fn release(&self, buf: Buf<'_, D, S, C, NBUF, NBUCKET>) {
        if !buf.held_by_current() {
            error!(
                "brelse: {} not locked by {}",
                buf.block(),
                self.sched.current_task()
            );
            panic!("brelse: buffer not locked by caller");
        }
        drop(buf);
    }

    /// Take an extra reference so the buffer stays resident after release.
    pub fn pin(&self, buf: &Buf<'_, D, S, C, NBUF, NBUCKET>) {
        let _chain = self.buckets[Self::bucket_of(buf.block())].lock();
        self.slots[buf.slot()].add_ref();
    }

    /// Drop a reference taken by [`pin`](Self::pin).
    ///
    /// # Panics
    /// If the buffer is not pinned.
    pub fn unpin(&self, buf: &Buf<'_, D, S, C, NBUF, NBUCKET>) {
        let _chain = self.buckets[Self::bucket_of(buf.block())].lock();
        let slot = &self.slots[buf.slot()];
        assert!(slot.refcnt() > 1, "bunpin: {} is not pinned", buf.block());
        slot.drop_ref();
    }

    /// Whether `dev`/`blockno` currently has a buffer.
    #[must_use]
    pub fn resident(&self, dev: u32, blockno: u32) -> bool {
        self.refcount(dev, blockno).is_some()
    }

    /// Reference count of the buffer holding `dev`/`blockno`, if resident.
    #[must_use]
    pub fn refcount(&self, dev: u32, blockno: u32) -> Option<u32> {
        let block = BlockId::new(dev, blockno);
        let chain = self.buckets[Self::bucket_of(block)].lock();
        self.find(&chain, block).map(|slot| self.slots[slot].refcnt())
    }

    /// Snapshot of the hit, miss and transfer counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            reads: self.stats.reads.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
        }
    }

    /// The backing block device.
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.disk
    }

    /// The clock that stamps released buffers.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// The scheduler that suspends tasks waiting for a buffer.
    #[must_use]
    pub const fn scheduler(&self) -> &S {
        &self.sched
    }

    /// Look up `block`, recycling a buffer on a miss, and lock it.
    fn get(&self, block: BlockId) -> Buf<'_, D, S, C, NBUF, NBUCKET> {
        debug_assert_ne!(block.pack(), BlockId::UNASSIGNED, "reserved block id");
        let bucket = Self::bucket_of(block);

        let hit = {
            let chain = self.buckets[bucket].lock();
            self.find(&chain, block).inspect(|&slot| {
                self.slots[slot].add_ref();
            })
        };

        let slot = if let Some(slot) = hit {
            Counters::bump(&self.stats.hits);
            trace!("bcache: hit {block} in slot {slot}");
            slot
        } else {
            self.recycle(bucket, block)
        };

        // All spin locks are released; waiting for the content may sleep.
        Buf::new(self, slot, block, self.slots[slot].content.lock(&self.sched))
    }

    /// Miss path: under the eviction lock, find the least recently released
    /// unreferenced buffer and move it into `bucket` for `block`.
    fn recycle(&self, bucket: usize, block: BlockId) -> usize {
        let _evict = self.evict.lock();

        // Another task may have brought the block in while we waited.
        {
            let chain = self.buckets[bucket].lock();
            if let Some(slot) = self.find(&chain, block) {
                self.slots[slot].add_ref();
                Counters::bump(&self.stats.hits);
                trace!("bcache: late hit {block} in slot {slot}");
                return slot;
            }
        }

        let Some(victim) = self.select_victim() else {
            error!("bcache: all {NBUF} buffers referenced, cannot cache {block}");
            panic!("bget: no buffers");
        };

        let Victim {
            bucket: from,
            prev,
            slot,
            mut chain,
            ..
        } = victim;

        let buffer = &self.slots[slot];
        let evicted = buffer.block();
        buffer.assign(block);

        if from != bucket {
            self.unlink(&mut chain, prev, slot);
            drop(chain);
            let mut target = self.buckets[bucket].lock();
            self.push_front(&mut target, slot);
        }

        Counters::bump(&self.stats.misses);
        match evicted {
            Some(old) => debug!("bcache: slot {slot} recycled from {old} to {block}"),
            None => debug!("bcache: slot {slot} assigned to {block}"),
        }
        slot
    }

    /// Scan every bucket in index order for the unreferenced buffer with the
    /// smallest release timestamp. Ties go to the first one found.
    ///
    /// The winning bucket stays locked until a strictly older candidate shows
    /// up elsewhere, so the victim cannot be claimed before it is relinked.
    /// Must be called with the eviction lock held.
    fn select_victim(&self) -> Option<Victim<'_>> {
        debug_assert!(self.evict.is_locked());
        let mut best: Option<Victim<'_>> = None;

        for (bucket, lock) in self.buckets.iter().enumerate() {
            let chain = lock.lock();
            let mut oldest = best.as_ref().map(|v| v.last_use);
            let mut found = None;

            for (prev, slot) in self.chain(&chain) {
                let buffer = &self.slots[slot];
                if buffer.refcnt() != 0 {
                    continue;
                }
                let last_use = buffer.last_use();
                if oldest.is_none_or(|t| last_use < t) {
                    oldest = Some(last_use);
                    found = Some((prev, slot, last_use));
                }
            }

            if let Some((prev, slot, last_use)) = found {
                // Replacing `best` releases the superseded bucket.
                best = Some(Victim {
                    bucket,
                    prev,
                    slot,
                    last_use,
                    chain,
                });
            }
        }

        best
    }

    /// Release path shared by [`release`](Self::release) and dropping a [`Buf`].
    pub(crate) fn unref(&self, slot: usize, block: BlockId) {
        let _chain = self.buckets[Self::bucket_of(block)].lock();
        let buffer = &self.slots[slot];
        if buffer.drop_ref() == 0 {
            buffer.stamp(self.clock.ticks());
        }
    }

    pub(crate) fn holding(&self, slot: usize) -> bool {
        self.slots[slot].content.holding(self.sched.current_task())
    }

    fn find(&self, chain: &Chain, block: BlockId) -> Option<usize> {
        self.chain(chain)
            .map(|(_, slot)| slot)
            .find(|&slot| self.slots[slot].holds(block))
    }

    /// Walk a locked chain, yielding `(predecessor, slot)` pairs.
    fn chain<'g>(&'g self, chain: &'g Chain) -> impl Iterator<Item = (Option<usize>, usize)> + 'g {
        let mut prev = None;
        let mut cursor = chain.head;
        core::iter::from_fn(move || {
            let slot = cursor?;
            let item = (prev, slot);
            prev = Some(slot);
            cursor = self.slots[slot].next();
            Some(item)
        })
    }

    fn unlink(&self, chain: &mut Chain, prev: Option<usize>, slot: usize) {
        let next = self.slots[slot].next();
        match prev {
            Some(prev) => self.slots[prev].set_next(next),
            None => chain.head = next,
        }
        self.slots[slot].set_next(None);
    }

    fn push_front(&self, chain: &mut Chain, slot: usize) {
        self.slots[slot].set_next(chain.head);
        chain.head = Some(slot);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bucket_of(block: BlockId) -> usize {
        let key = (u64::from(block.dev) << 27) | u64::from(block.blockno);
        (key % NBUCKET as u64) as usize
    }
}
