#![allow(dead_code)]

use kernel_alloc::{MemoryRange, PAGE_SIZE, PageAllocator, PhysAddr, PhysMapper};
use kernel_sync::hosted::ThreadCpus;
use std::cell::UnsafeCell;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Simulated physical address of the first arena frame.
pub const RAM_BASE: u64 = 0x8000_0000;

#[allow(clippy::cast_possible_truncation)]
const FRAME: usize = PAGE_SIZE as usize;

#[repr(C, align(4096))]
struct Frame(UnsafeCell<[u8; FRAME]>);

/// Heap-backed "physical memory": frame `i` lives at `RAM_BASE + i * PAGE_SIZE`.
pub struct TestPhys {
    frames: Box<[Frame]>,
}

// SAFETY: the allocator hands each frame to one owner at a time.
unsafe impl Sync for TestPhys {}

impl TestPhys {
    pub fn new(frames: usize) -> Self {
        Self {
            frames: (0..frames)
                .map(|_| Frame(UnsafeCell::new([0; FRAME])))
                .collect(),
        }
    }

    pub fn end(&self) -> PhysAddr {
        PhysAddr::from_u64(RAM_BASE + self.frames.len() as u64 * PAGE_SIZE)
    }

    /// Copy of the page at `pa`.
    pub fn page(&self, pa: PhysAddr) -> [u8; FRAME] {
        let p: *mut [u8; FRAME] = self.phys_to_ptr(pa);
        unsafe { p.read() }
    }
}

impl PhysMapper for TestPhys {
    fn phys_to_ptr<T>(&self, pa: PhysAddr) -> *mut T {
        let off = (pa.as_u64() - RAM_BASE) as usize;
        let frame = &self.frames[off / FRAME];
        unsafe { frame.0.get().cast::<u8>().add(off % FRAME).cast::<T>() }
    }
}

pub type TestAlloc<const NCPU: usize> = PageAllocator<TestPhys, ThreadCpus, NCPU>;

/// Allocator over `frames` arena frames, with the first `reserved` bytes
/// standing in for the kernel image. All pages start in core 0's pool.
pub fn allocator<const NCPU: usize>(frames: usize, reserved: u64) -> TestAlloc<NCPU> {
    let phys = TestPhys::new(frames);
    let range = MemoryRange::new(PhysAddr::from_u64(RAM_BASE + reserved), phys.end())
        .expect("valid test range");
    let kmem = PageAllocator::new(phys, ThreadCpus::new(), range);
    ThreadCpus::bind(0);
    unsafe { kmem.init() };
    kmem
}

pub fn page(index: u64) -> PhysAddr {
    PhysAddr::from_u64(RAM_BASE + index * PAGE_SIZE)
}

pub fn panic_message(f: impl FnOnce()) -> String {
    let err = catch_unwind(AssertUnwindSafe(f)).expect_err("expected a panic");
    err.downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_default()
}
