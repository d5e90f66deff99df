mod common;

use common::{TestCache, cache};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

/// Concurrent acquirers of one block always get the same buffer and take
/// turns on its content.
#[test]
fn same_block_maps_to_one_buffer() {
    let bc: TestCache<8, 13> = cache();
    let slots = Mutex::new(HashSet::new());
    let inside = AtomicUsize::new(0);
    let start = Barrier::new(6);

    thread::scope(|s| {
        for _ in 0..6 {
            s.spawn(|| {
                start.wait();
                for _ in 0..100 {
                    let b = bc.read(1, 77);
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    slots.lock().unwrap().insert(b.slot());
                    inside.fetch_sub(1, Ordering::SeqCst);
                    bc.release(b);
                }
            });
        }
    });

    assert_eq!(slots.lock().unwrap().len(), 1);
    assert_eq!(bc.device().reads_of(1, 77), 1);
}

/// Read-modify-write cycles over more blocks than buffers. A duplicate cache
/// entry or a double eviction would lose increments.
#[test]
fn no_lost_updates_under_eviction() {
    const THREADS: usize = 8;
    const ITERS: usize = 300;
    const BLOCKS: usize = 16;

    let bc: TestCache<10, 13> = cache();
    let start = Barrier::new(THREADS);

    thread::scope(|s| {
        for t in 0..THREADS {
            let bc = &bc;
            let start = &start;
            s.spawn(move || {
                start.wait();
                for i in 0..ITERS {
                    let blockno = u32::try_from((i * 7 + t * 3) % BLOCKS).unwrap();
                    let mut b = bc.read(2, blockno);
                    let count = u32::from_le_bytes(b[..4].try_into().unwrap());
                    b[..4].copy_from_slice(&(count + 1).to_le_bytes());
                    bc.write(&b);
                    bc.release(b);
                    bc.clock().tick();
                }
            });
        }
    });

    let total: u32 = (0..BLOCKS)
        .map(|n| {
            let block = bc.device().block(2, u32::try_from(n).unwrap());
            u32::from_le_bytes(block[..4].try_into().unwrap())
        })
        .sum();
    assert_eq!(total as usize, THREADS * ITERS);

    let stats = bc.stats();
    assert_eq!(stats.hits + stats.misses, (THREADS * ITERS) as u64);
    assert_eq!(stats.writes, (THREADS * ITERS) as u64);
}

/// Never more distinct blocks resident than there are buffers, and every
/// buffer ends up unreferenced.
#[test]
fn residency_is_bounded() {
    const NBUF: usize = 6;
    let bc: TestCache<NBUF, 13> = cache();

    thread::scope(|s| {
        for t in 0..4u32 {
            let bc = &bc;
            s.spawn(move || {
                for i in 0..200u32 {
                    let b = bc.acquire(t, i % 9);
                    bc.release(b);
                }
            });
        }
    });

    let resident = (0..4u32)
        .flat_map(|dev| (0..9u32).map(move |n| (dev, n)))
        .filter(|&(dev, n)| bc.resident(dev, n))
        .inspect(|&(dev, n)| assert_eq!(bc.refcount(dev, n), Some(0)))
        .count();
    assert!(resident <= NBUF);
    assert!(resident > 0);
}
