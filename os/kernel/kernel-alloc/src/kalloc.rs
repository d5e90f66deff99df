//! # Per-core page allocator
//!
//! Every core owns a pool of free 4 KiB pages. Allocation and release touch
//! only the executing core's pool, so cores do not contend on a global lock.
//! A core whose pool runs dry steals half of the richest other pool.
//!
//! Free pages form an intrusive LIFO list: the first eight bytes of a free
//! page hold the physical address of the next one.
//!
//! ## Locking
//!
//! The executing core is pinned ([`CorePin`]) while it picks and locks its
//! pool. Stealing never holds its own pool lock while locking remote pools:
//!
//! 1. Scan the other pools, keeping the richest one found locked. At most two
//!    remote locks are held at once, and only during the comparison.
//! 2. Detach the stolen run from the donor and drop the donor's lock.
//! 3. Keep the run's first page for the caller. Lock the own pool again and
//!    splice the rest in front of its list.
//!
//! Two cores stealing from each other therefore cannot deadlock, and a thief
//! never loses its page to another thief between splice and pop.

use crate::{MemoryRange, PhysAddr, PhysMapper};
use core::ptr;
use kernel_info::params::{self, PAGE_SIZE};
use kernel_sync::{CorePin, Cpu, SpinLock, SpinLockGuard};
use log::{debug, error, info, warn};

/// Byte pattern written over a page when it is handed out.
pub const ALLOC_FILL: u8 = 0x05;

/// Byte pattern written over a page when it is returned.
pub const FREE_FILL: u8 = 0x01;

#[allow(clippy::cast_possible_truncation)]
const PAGE_BYTES: usize = PAGE_SIZE as usize;

/// End-of-list marker in a free page's link word. Never page aligned.
const NIL: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("out of physical memory")]
    OutOfMemory,
}

/// The page allocator with the kernel's core count.
pub type Kmem<M, C> = PageAllocator<M, C, { params::NCPU }>;

/// Per-core physical page allocator over a fixed [`MemoryRange`].
pub struct PageAllocator<M, C, const NCPU: usize> {
    mapper: M,
    cpu: C,
    range: MemoryRange,
    pools: [CorePool; NCPU],
}

#[repr(C, align(64))] // avoid false sharing between cores
#[derive(Default)]
struct CorePool {
    free: SpinLock<Pool>,
}

/// Free list of one core. The count always equals the list length.
#[derive(Default)]
struct Pool {
    head: Option<PhysAddr>,
    pages: usize,
}

/// A detached run of free pages, linked from `head` to `tail`.
struct Run {
    head: PhysAddr,
    tail: PhysAddr,
    pages: usize,
}

impl<M: PhysMapper, C: Cpu, const NCPU: usize> PageAllocator<M, C, NCPU> {
    /// Create an allocator with empty pools. Call [`init`](Self::init) to
    /// hand it the pages of `range`.
    #[must_use]
    pub fn new(mapper: M, cpu: C, range: MemoryRange) -> Self {
        const { assert!(NCPU > 0, "kalloc: at least one core is required") };
        Self {
            mapper,
            cpu,
            range,
            pools: core::array::from_fn(|_| CorePool::default()),
        }
    }

    /// Free every whole page of the range into the executing core's pool.
    /// Returns the number of pages.
    ///
    /// # Safety
    /// The range must be unused RAM, writable through the mapper, and `init`
    /// must run once.
    pub unsafe fn init(&self) -> usize {
        let mut pages = 0;
        for pa in self.range.pages() {
            // SAFETY: the caller hands over the whole range.
            unsafe { self.free(pa) };
            pages += 1;
        }
        info!("kalloc: {pages} pages in {}", self.range);
        pages
    }

    /// Allocate one page, filled with [`ALLOC_FILL`].
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] when the executing core's pool is empty and
    /// no other pool has a page to spare.
    ///
    /// # Panics
    /// If the executing core's index is not below `NCPU`.
    pub fn allocate(&self) -> Result<PhysAddr, AllocError> {
        let page = {
            let pin = CorePin::new(&self.cpu);
            let core = Self::pool_index(pin.core());
            let popped = self.pools[core].free.lock().pop(&self.mapper);
            popped.or_else(|| self.steal(core))
        };

        let Some(pa) = page else {
            warn!("kalloc: out of memory");
            return Err(AllocError::OutOfMemory);
        };

        // SAFETY: the page just left the free lists and belongs to the caller.
        unsafe { self.fill(pa, ALLOC_FILL) };
        Ok(pa)
    }

    /// Return a page to the executing core's pool, filled with [`FREE_FILL`].
    ///
    /// # Safety
    /// `pa` must have come from [`allocate`](Self::allocate) (or be part of
    /// the range during [`init`](Self::init)) and must not be used afterwards.
    ///
    /// # Panics
    /// If `pa` is not page aligned or not a page of the managed range.
    pub unsafe fn free(&self, pa: PhysAddr) {
        if !pa.is_page_aligned() || !self.range.contains_page(pa) {
            error!("kfree: {pa} is not a page of {}", self.range);
            panic!("kfree");
        }

        // SAFETY: the caller gives up the page.
        unsafe { self.fill(pa, FREE_FILL) };

        let pin = CorePin::new(&self.cpu);
        let core = Self::pool_index(pin.core());
        self.pools[core].free.lock().push(&self.mapper, pa);
    }

    /// Free pages currently in the pool of `core`.
    ///
    /// # Panics
    /// If `core` is not below `NCPU`.
    #[must_use]
    pub fn free_pages(&self, core: usize) -> usize {
        self.pools[Self::pool_index(core)].free.lock().pages
    }

    /// Free pages across all pools. Not a snapshot while other cores run.
    #[must_use]
    pub fn total_free_pages(&self) -> usize {
        self.pools.iter().map(|p| p.free.lock().pages).sum()
    }

    #[must_use]
    pub const fn range(&self) -> MemoryRange {
        self.range
    }

    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Move pages from the richest other pool to `core`. The first stolen page
    /// is returned to the caller, the rest lands in the pool of `core`.
    fn steal(&self, core: usize) -> Option<PhysAddr> {
        let mut richest: Option<(usize, SpinLockGuard<'_, Pool>)> = None;
        for (other, pool) in self.pools.iter().enumerate() {
            if other == core {
                continue;
            }
            let candidate = pool.free.lock();
            let best = richest.as_ref().map_or(0, |(_, p)| p.pages);
            if candidate.pages > best {
                richest = Some((other, candidate));
            }
        }

        let Some((donor, mut pool)) = richest else {
            debug!("kalloc: core {core} found no pages to steal");
            return None;
        };

        let available = pool.pages;
        let take = (available / 2).max(1);
        let run = pool.detach(&self.mapper, take)?;
        drop(pool);

        let (page, rest) = run.split_first(&self.mapper);
        if let Some(rest) = rest {
            self.pools[core].free.lock().splice(&self.mapper, rest);
        }
        debug!("kalloc: core {core} took {take} of {available} pages from core {donor}");
        Some(page)
    }

    /// Fill a whole page with `byte`.
    ///
    /// # Safety
    /// The caller must own the page at `pa`.
    unsafe fn fill(&self, pa: PhysAddr, byte: u8) {
        let page: *mut u8 = self.mapper.phys_to_ptr(pa);
        // SAFETY: an owned page is mapped writable for PAGE_BYTES.
        unsafe { ptr::write_bytes(page, byte, PAGE_BYTES) };
    }

    fn pool_index(core: usize) -> usize {
        assert!(core < NCPU, "kalloc: core {core} out of range");
        core
    }
}

impl Pool {
    fn push<M: PhysMapper>(&mut self, mapper: &M, pa: PhysAddr) {
        // SAFETY: the page is being handed to this pool.
        unsafe { set_link(mapper, pa, self.head) };
        self.head = Some(pa);
        self.pages += 1;
    }

    fn pop<M: PhysMapper>(&mut self, mapper: &M) -> Option<PhysAddr> {
        let pa = self.head?;
        // SAFETY: pages on the list belong to this pool.
        self.head = unsafe { link(mapper, pa) };
        self.pages -= 1;
        Some(pa)
    }

    /// Unlink the first `pages` pages.
    fn detach<M: PhysMapper>(&mut self, mapper: &M, pages: usize) -> Option<Run> {
        debug_assert!(pages > 0 && pages <= self.pages);
        let head = self.head?;
        let mut tail = head;
        for _ in 1..pages {
            // SAFETY: pages on the list belong to this pool.
            tail = unsafe { link(mapper, tail) }?;
        }
        // SAFETY: as above.
        unsafe {
            self.head = link(mapper, tail);
            set_link(mapper, tail, None);
        }
        self.pages -= pages;
        Some(Run { head, tail, pages })
    }

    /// Put a detached run in front of the list.
    fn splice<M: PhysMapper>(&mut self, mapper: &M, run: Run) {
        // SAFETY: the run was detached for this pool.
        unsafe { set_link(mapper, run.tail, self.head) };
        self.head = Some(run.head);
        self.pages += run.pages;
    }
}

impl Run {
    /// Split off the first page.
    fn split_first<M: PhysMapper>(self, mapper: &M) -> (PhysAddr, Option<Self>) {
        // SAFETY: a detached run belongs to the stealing core.
        let next = unsafe { link(mapper, self.head) };
        let rest = next.map(|head| Self {
            head,
            tail: self.tail,
            pages: self.pages - 1,
        });
        (self.head, rest)
    }
}

/// Read the link word of a free page.
///
/// # Safety
/// `pa` must be a free page owned by the caller's pool.
unsafe fn link<M: PhysMapper>(mapper: &M, pa: PhysAddr) -> Option<PhysAddr> {
    // SAFETY: see above; pages are aligned well beyond `u64`.
    let next = unsafe { ptr::read(mapper.phys_to_ptr::<u64>(pa)) };
    (next != NIL).then_some(PhysAddr::from_u64(next))
}

/// Write the link word of a free page.
///
/// # Safety
/// `pa` must be a free page owned by the caller's pool.
unsafe fn set_link<M: PhysMapper>(mapper: &M, pa: PhysAddr, next: Option<PhysAddr>) {
    let word = next.map_or(NIL, PhysAddr::as_u64);
    // SAFETY: see above.
    unsafe { ptr::write(mapper.phys_to_ptr::<u64>(pa), word) };
}
