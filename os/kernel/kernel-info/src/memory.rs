//! # Memory Layout

/// Physical address where the kernel image is loaded. RAM starts here.
pub const KERNBASE: u64 = 0x8000_0000;

/// Amount of RAM the kernel manages above [`KERNBASE`].
pub const PHYS_MEMORY_SIZE: u64 = 128 * 1024 * 1024;

/// First physical address past usable RAM.
pub const PHYSTOP: u64 = KERNBASE + PHYS_MEMORY_SIZE;

const _: () = {
    assert!(KERNBASE.is_multiple_of(crate::params::PAGE_SIZE));
    assert!(PHYSTOP.is_multiple_of(crate::params::PAGE_SIZE));
    assert!(PHYSTOP > KERNBASE);
};
