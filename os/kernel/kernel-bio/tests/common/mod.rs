#![allow(dead_code)]

use kernel_bio::{BSIZE, BlockDevice, BlockId, BlockIo, BufferCache, TickCounter};
use kernel_sync::hosted::ThreadScheduler;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory disk that counts transfers per block.
#[derive(Default)]
pub struct RamDisk {
    blocks: Mutex<HashMap<BlockId, [u8; BSIZE]>>,
    reads: Mutex<HashMap<BlockId, usize>>,
    total_reads: AtomicUsize,
    total_writes: AtomicUsize,
}

impl RamDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `byte` repeated over the whole block, bypassing the cache.
    pub fn fill(&self, dev: u32, blockno: u32, byte: u8) {
        self.blocks
            .lock()
            .unwrap()
            .insert(BlockId::new(dev, blockno), [byte; BSIZE]);
    }

    pub fn block(&self, dev: u32, blockno: u32) -> [u8; BSIZE] {
        self.blocks
            .lock()
            .unwrap()
            .get(&BlockId::new(dev, blockno))
            .copied()
            .unwrap_or([0; BSIZE])
    }

    pub fn reads_of(&self, dev: u32, blockno: u32) -> usize {
        self.reads
            .lock()
            .unwrap()
            .get(&BlockId::new(dev, blockno))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.total_reads.load(Ordering::SeqCst)
    }

    pub fn total_writes(&self) -> usize {
        self.total_writes.load(Ordering::SeqCst)
    }
}

impl BlockDevice for RamDisk {
    fn transfer(&self, block: BlockId, io: BlockIo<'_>) {
        match io {
            BlockIo::Read(data) => {
                *data = self
                    .blocks
                    .lock()
                    .unwrap()
                    .get(&block)
                    .copied()
                    .unwrap_or([0; BSIZE]);
                *self.reads.lock().unwrap().entry(block).or_default() += 1;
                self.total_reads.fetch_add(1, Ordering::SeqCst);
            }
            BlockIo::Write(data) => {
                self.blocks.lock().unwrap().insert(block, *data);
                self.total_writes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

pub type TestCache<const NBUF: usize, const NBUCKET: usize> =
    BufferCache<RamDisk, ThreadScheduler, TickCounter, NBUF, NBUCKET>;

pub fn cache<const NBUF: usize, const NBUCKET: usize>() -> TestCache<NBUF, NBUCKET> {
    BufferCache::new(RamDisk::new(), ThreadScheduler::new(), TickCounter::new())
}

pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    }
}
