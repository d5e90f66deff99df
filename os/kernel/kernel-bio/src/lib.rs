//! # Block Buffer Cache
//!
//! A fixed pool of block-sized buffers caching disk blocks in memory. The cache
//! is the synchronization point for disk blocks used by several tasks: at most
//! one buffer holds a given block, and only one task at a time uses it.
//!
//! ## Interface
//!
//! * [`BufferCache::read`] returns a locked buffer with the block's content.
//! * [`BufferCache::write`] writes a locked buffer's content to disk.
//! * [`BufferCache::release`] hands the buffer back.
//! * [`BufferCache::pin`] / [`BufferCache::unpin`] keep a buffer resident.
//!
//! Do not keep buffers longer than necessary; an exhausted cache is fatal.
//!
//! ## Structure
//!
//! ```text
//! BufferCache
//!   ├── evict:   SpinLock<()>              serializes victim selection
//!   ├── buckets: [SpinLock<Chain>; NBUCKET] hash(dev, blockno) % NBUCKET
//!   │                 └── head ─▶ slot ─▶ slot ─▶ ∅   (index links)
//!   └── slots:   [BufSlot; NBUF]
//!                     ├── key / refcnt / last_use / next   (bucket lock)
//!                     └── SleepLock<[u8; BSIZE]>           (content)
//! ```
//!
//! Buffers never leave the pool. A miss recycles the unreferenced buffer with
//! the oldest release timestamp and moves it into the bucket of its new block.
//!
//! ## Locking
//!
//! * A bucket lock guards the chain and the metadata of every buffer on it.
//! * The eviction lock admits one victim search at a time, which is what
//!   keeps two concurrent misses from picking the same victim or creating two
//!   buffers for the same block.
//! * A buffer's sleep lock guards its content and may be held across disk
//!   transfers. It is only ever acquired after all spin locks are dropped.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod block;
mod buf;
mod cache;
mod clock;
mod slot;

pub use block::{BlockDevice, BlockId, BlockIo};
pub use buf::Buf;
pub use cache::{Bcache, BufferCache, CacheStats};
pub use clock::{Clock, TickCounter};
pub use kernel_info::params::BSIZE;
