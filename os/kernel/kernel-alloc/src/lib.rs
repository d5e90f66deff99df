//! # Physical Page Allocation
//!
//! Hands out the 4 KiB pages of physical memory between the end of the kernel
//! image and the top of RAM. Each core keeps its own pool of free pages; a
//! core with an empty pool steals from the richest other pool.
//!
//! ```text
//! ┌──────────────┐ ┌──────────────┐       ┌──────────────┐
//! │ core 0 pool  │ │ core 1 pool  │  ...  │ core N pool  │   SpinLock each
//! │ head ─▶ page │ │ head ─▶ page │       │ head ─▶ ∅    │
//! └──────┬───────┘ └──────────────┘       └──────┬───────┘
//!        └──────────── steal half ◀──────────────┘
//!                         │
//!                    PhysMapper           physical address → pointer
//! ```
//!
//! ## Components
//!
//! * [`PhysAddr`] and [`MemoryRange`]: the managed physical range.
//! * [`PhysMapper`]: how the allocator reaches physical memory. The kernel uses
//!   an [`OffsetMapper`]; tests use a simulated RAM arena.
//! * [`PageAllocator`]: the per-core allocator itself.
//!
//! Allocated pages are filled with [`ALLOC_FILL`], freed pages with
//! [`FREE_FILL`], so stale or uninitialized use shows up quickly.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod addr;
mod kalloc;
mod layout;
pub mod phys_mapper;

pub use addr::PhysAddr;
pub use kalloc::{ALLOC_FILL, AllocError, FREE_FILL, Kmem, PageAllocator};
pub use kernel_info::params::PAGE_SIZE;
pub use layout::{LayoutError, MemoryRange};
pub use phys_mapper::{OffsetMapper, PhysMapper};
