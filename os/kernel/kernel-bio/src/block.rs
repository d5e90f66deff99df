use core::fmt;
use kernel_info::params::BSIZE;

/// Cache key: a block number on a device.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId {
    pub dev: u32,
    pub blockno: u32,
}

impl BlockId {
    /// Packed value that marks a buffer which never held a block.
    ///
    /// Equals the packing of `dev = u32::MAX, blockno = u32::MAX`, which is
    /// therefore not a usable block.
    pub(crate) const UNASSIGNED: u64 = u64::MAX;

    #[inline]
    #[must_use]
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }

    #[inline]
    pub(crate) fn pack(self) -> u64 {
        (u64::from(self.dev) << 32) | u64::from(self.blockno)
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn unpack(raw: u64) -> Option<Self> {
        if raw == Self::UNASSIGNED {
            None
        } else {
            Some(Self::new((raw >> 32) as u32, raw as u32))
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.blockno)
    }
}

/// One direction of a block transfer, carrying the payload.
pub enum BlockIo<'a> {
    /// Fill the payload from the device.
    Read(&'a mut [u8; BSIZE]),
    /// Store the payload on the device.
    Write(&'a [u8; BSIZE]),
}

/// Synchronous block transfer (the disk driver).
///
/// `transfer` returns once the device has completed the exchange. The caller
/// holds the buffer's sleep lock for the duration and may be suspended.
pub trait BlockDevice: Sync {
    fn transfer(&self, block: BlockId, io: BlockIo<'_>);
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn transfer(&self, block: BlockId, io: BlockIo<'_>) {
        (**self).transfer(block, io);
    }
}
