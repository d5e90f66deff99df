//! # Kernel Parameters

/// Maximum number of CPU cores; one page pool exists per core.
pub const NCPU: usize = 8;

/// Maximum number of blocks any single filesystem operation writes.
pub const MAXOPBLOCKS: usize = 10;

/// Number of buffers in the block cache.
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// Number of hash buckets in the block cache.
///
/// A prime keeps consecutive block numbers spread across all buckets.
pub const NBUCKET: usize = 13;

/// Size of one disk block in bytes.
pub const BSIZE: usize = 1024;

/// Size of one physical page in bytes.
pub const PAGE_SIZE: u64 = 4096;

const _: () = {
    assert!(NCPU > 0);
    assert!(NBUCKET > 0);
    assert!(NBUF >= NBUCKET, "every bucket starts with at least one buffer");
    assert!(BSIZE.is_power_of_two());
    assert!(PAGE_SIZE.is_power_of_two());
};
