//! # Kernel synchronization primitives
//!
//! Two kinds of locks guard the kernel's shared resources:
//!
//! * [`SpinLock`]: short-held mutual exclusion for metadata. A holder never
//!   suspends while holding one.
//! * [`SleepLock`]: a blocking, queueing lock for content that stays locked
//!   across slow operations such as a disk transfer. Waiters are suspended
//!   through the [`Scheduler`] instead of spinning.
//!
//! Core-local state is reached through a [`CorePin`], which keeps the caller on
//! its current core for as long as the pin is alive.
//!
//! With the `std` feature, the [`hosted`] module backs the scheduler and CPU
//! seams with OS threads so the same code runs under the host's test harness.

#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![allow(unsafe_code)]

mod cpu;
#[cfg(feature = "std")]
pub mod hosted;
mod sched;
mod sleep_lock;
mod spin_lock;

pub use cpu::{CorePin, Cpu};
pub use sched::{Scheduler, TaskId, WaitChannel, panicking};
pub use sleep_lock::{SleepLock, SleepLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
