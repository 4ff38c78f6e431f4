//! In-memory cache of disk blocks.
//!
//! Every access to the disk goes through a [`BlockCache`], which holds one
//! block's bytes, remembers whether they were modified, and writes them back
//! on `sync` or when the cache entry is dropped. The manager hands out shared
//! handles and evicts the least recently inserted idle block when full.

use std::sync::Arc;

use log::error;
use spin::Mutex;

use crate::block_dev::BlockDevice;
use crate::config::{BLOCK_CACHE_SIZE, BLOCK_SIZE};
use crate::error::FsResult;

// 8-byte alignment so typed views taken at block offsets stay aligned.
#[repr(C, align(8))]
struct BlockBuf([u8; BLOCK_SIZE]);

/// One cached block.
pub struct BlockCache {
    buf: BlockBuf,
    block_id: usize,
    device: Arc<dyn BlockDevice>,
    modified: bool,
}

impl BlockCache {
    /// Load block `block_id` from `device`.
    pub fn new(block_id: usize, device: Arc<dyn BlockDevice>) -> FsResult<Self> {
        let mut buf = BlockBuf([0u8; BLOCK_SIZE]);
        device.read_block(block_id, &mut buf.0)?;
        Ok(Self {
            buf,
            block_id,
            device,
            modified: false,
        })
    }

    fn addr_of_offset(&self, offset: usize) -> usize {
        core::ptr::from_ref(&self.buf.0[offset]) as usize
    }

    fn as_ref<T>(&self, offset: usize) -> &T
    where
        T: Sized,
    {
        let type_size = core::mem::size_of::<T>();
        assert!(offset + type_size <= BLOCK_SIZE);
        assert!(offset % core::mem::align_of::<T>() == 0);
        let addr = self.addr_of_offset(offset);
        unsafe { &*(addr as *const T) }
    }

    fn as_mut_ref<T>(&mut self, offset: usize) -> &mut T
    where
        T: Sized,
    {
        let type_size = core::mem::size_of::<T>();
        assert!(offset + type_size <= BLOCK_SIZE);
        assert!(offset % core::mem::align_of::<T>() == 0);
        self.modified = true;
        let addr = self.addr_of_offset(offset);
        unsafe { &mut *(addr as *mut T) }
    }

    /// Call `f` over the `T` stored at `offset`.
    pub fn read<T, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.as_ref(offset))
    }

    /// Call `f` over the `T` stored at `offset`, marking the block dirty.
    pub fn modify<T, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.as_mut_ref(offset))
    }

    /// Write the block back if it was modified.
    pub fn sync(&mut self) -> FsResult<()> {
        if self.modified {
            self.modified = false;
            self.device.write_block(self.block_id, &self.buf.0)?;
        }
        Ok(())
    }

    /// Forget any modifications without writing them back.
    fn discard(&mut self) {
        self.modified = false;
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            error!("failed to write back block {}: {e}", self.block_id);
        }
    }
}

/// Cache of up to `BLOCK_CACHE_SIZE` blocks, owned by one filesystem.
pub struct BlockCacheManager {
    queue: Vec<(usize, Arc<Mutex<BlockCache>>)>,
}

impl BlockCacheManager {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    /// Get a handle to block `block_id`, loading it on a miss.
    pub fn get(
        &mut self,
        block_id: usize,
        device: &Arc<dyn BlockDevice>,
    ) -> FsResult<Arc<Mutex<BlockCache>>> {
        if let Some((_, cache)) = self.queue.iter().find(|(id, _)| *id == block_id) {
            return Ok(Arc::clone(cache));
        }
        if self.queue.len() == BLOCK_CACHE_SIZE {
            // only a block nobody else holds may be written back and dropped
            let idx = self
                .queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1)
                .expect("run out of block cache");
            self.queue.swap_remove(idx);
        }
        let cache = Arc::new(Mutex::new(BlockCache::new(block_id, Arc::clone(device))?));
        self.queue.push((block_id, Arc::clone(&cache)));
        Ok(cache)
    }

    /// Write back every modified block.
    pub fn sync_all(&mut self) -> FsResult<()> {
        for (_, cache) in &self.queue {
            cache.lock().sync()?;
        }
        Ok(())
    }

    /// Drop every cached block without writing anything back. Used when the
    /// disk is rewritten underneath the cache.
    pub fn purge(&mut self) {
        for (_, cache) in &self.queue {
            cache.lock().discard();
        }
        self.queue.clear();
    }
}
