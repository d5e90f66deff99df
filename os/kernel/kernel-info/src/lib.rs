//! # Kernel Configuration
//!
//! Compile-time parameters shared by the kernel's resource managers. Every
//! consumer sizes its static pools from the constants defined here so that the
//! buffer cache, the page allocator and the boot code agree on one closed,
//! bounded universe of slots.
//!
//! ## Modules
//!
//! ### Parameters ([`params`])
//! Pool sizes and geometry:
//! * **`NCPU`**: number of per-core page pools
//! * **`NBUF`** / **`NBUCKET`**: buffer cache capacity and hash bucket count
//! * **`BSIZE`**: size of one disk block payload
//!
//! ### Memory Layout ([`memory`])
//! Physical memory boundaries handed to the page allocator:
//!
//! ```text
//! Physical Memory Layout:
//! KERNBASE    ┌─────────────────────────────────┐ 0x8000_0000
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//! end         ├─────────────────────────────────┤ (linker symbol)
//!             │    Free Pages                   │
//!             │  (Per-core page pools)          │
//! PHYSTOP     └─────────────────────────────────┘ KERNBASE + 128 MiB
//! ```
//!
//! Both modules validate their invariants with `const` assertions, so an
//! inconsistent configuration fails the build instead of the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod params;
