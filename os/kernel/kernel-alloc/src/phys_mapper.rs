//! # Access to physical memory
//!
//! The page allocator never dereferences a physical address directly. It asks
//! a [`PhysMapper`] for a pointer in the current address space, which lets the
//! same allocator run on a direct-mapped kernel, a higher-half direct map
//! (HHDM), or a simulated RAM arena in tests.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::{OffsetMapper, PhysAddr, PhysMapper};
//!
//! let mut page = [0u8; 16];
//! let pa = PhysAddr::from_u64(page.as_mut_ptr().expose_provenance() as u64);
//! let p: *mut u8 = OffsetMapper::identity().phys_to_ptr(pa);
//! unsafe { p.write(7) };
//! assert_eq!(page[0], 7);
//! ```

use crate::PhysAddr;

/// Converts physical addresses to pointers usable in the current address space.
///
/// # Safety contract
/// Producing the pointer is safe; dereferencing it is only sound if `pa` is
/// mapped writable for the accessed size and nobody else aliases it.
pub trait PhysMapper: Sync {
    fn phys_to_ptr<T>(&self, pa: PhysAddr) -> *mut T;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    fn phys_to_ptr<T>(&self, pa: PhysAddr) -> *mut T {
        (**self).phys_to_ptr(pa)
    }
}

/// [`PhysMapper`] for kernels that map all of RAM at a fixed offset.
///
/// With offset 0 this is the identity map of a direct-mapped kernel; with the
/// HHDM base it is a higher-half direct map.
#[derive(Copy, Clone, Debug, Default)]
pub struct OffsetMapper {
    offset: u64,
}

impl OffsetMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self::new(0)
    }
}

impl PhysMapper for OffsetMapper {
    #[allow(clippy::cast_possible_truncation)]
    fn phys_to_ptr<T>(&self, pa: PhysAddr) -> *mut T {
        let va = self.offset.wrapping_add(pa.as_u64());
        core::ptr::with_exposed_provenance_mut(va as usize)
    }
}
