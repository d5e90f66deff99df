use crate::PhysAddr;
use core::fmt;
use kernel_info::memory::PHYSTOP;
use kernel_info::params::PAGE_SIZE;

/// The physical range `[start, end)` handed to the page allocator.
///
/// `start` is normally the first address past the kernel image and need not
/// be aligned; `end` is the top of usable RAM and must be.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRange {
    start: PhysAddr,
    end: PhysAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("empty physical range {start}..{end}")]
    Empty { start: PhysAddr, end: PhysAddr },
    #[error("end of physical memory {0} is not page aligned")]
    UnalignedEnd(PhysAddr),
    #[error("physical range {start}..{end} holds no whole page")]
    NoWholePage { start: PhysAddr, end: PhysAddr },
}

impl MemoryRange {
    /// # Errors
    /// If the range is empty, `end` is unaligned, or no whole page fits.
    pub const fn new(start: PhysAddr, end: PhysAddr) -> Result<Self, LayoutError> {
        if start.as_u64() >= end.as_u64() {
            return Err(LayoutError::Empty { start, end });
        }
        if !end.is_page_aligned() {
            return Err(LayoutError::UnalignedEnd(end));
        }
        if start.page_round_up().as_u64().saturating_add(PAGE_SIZE) > end.as_u64() {
            return Err(LayoutError::NoWholePage { start, end });
        }
        Ok(Self { start, end })
    }

    /// Everything from the end of the kernel image to [`PHYSTOP`].
    ///
    /// # Errors
    /// If `kernel_end` leaves no whole page below `PHYSTOP`.
    pub const fn above_kernel(kernel_end: PhysAddr) -> Result<Self, LayoutError> {
        Self::new(kernel_end, PhysAddr::from_u64(PHYSTOP))
    }

    #[must_use]
    pub const fn start(&self) -> PhysAddr {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> PhysAddr {
        self.end
    }

    /// Whether the page at `pa` lies completely inside the range.
    #[must_use]
    pub const fn contains_page(&self, pa: PhysAddr) -> bool {
        pa.as_u64() >= self.start.as_u64()
            && pa.as_u64() < self.end.as_u64()
            && self.end.as_u64() - pa.as_u64() >= PAGE_SIZE
    }

    /// Page-aligned addresses of every whole page in the range, ascending.
    #[allow(clippy::cast_possible_truncation)]
    pub fn pages(&self) -> impl Iterator<Item = PhysAddr> + use<> {
        let first = self.start.page_round_up().as_u64();
        let end = self.end.as_u64();
        (first..end)
            .step_by(PAGE_SIZE as usize)
            .take_while(move |pa| end - pa >= PAGE_SIZE)
            .map(PhysAddr::from_u64)
    }

    /// Number of whole pages in the range.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        (self.end.as_u64() - self.start.page_round_up().as_u64()) / PAGE_SIZE
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
