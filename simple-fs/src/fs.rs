//! The filesystem manager: owns the block device, the cached blocks, the
//! super block, both allocation bitmaps, the current directory and the
//! open-file table. Formatting, mounting and the allocators live here;
//! directory, file and namespace operations are in their own modules.

use std::path::Path;
use std::sync::Arc;

use log::{error, info, trace, warn};

use crate::bitmap::{Bitmap, BitmapBlock};
use crate::block_cache::{BlockCache, BlockCacheManager};
use crate::block_dev::{BlockDevice, BlockFile};
use crate::config::{
    BLOCK_SIZE, DATA_AREA_START, DATA_BITMAP_BLOCKS, DATA_BITMAP_START, DIRENT_SIZE, DISK_BLOCKS,
    INODE_BITMAP_BLOCKS, INODE_BITMAP_START, INODE_SIZE, SUPER_BLOCK_START, TOTAL_INODES,
};
use crate::error::{FsError, FsResult};
use crate::fd::FileHandle;
use crate::layout::{DataBlock, DirBlock, DirEntry, DiskInode, InodeKind, SuperBlock};

/// Inode id of the root directory
pub(crate) const ROOT_INODE: i32 = 0;

/// A simulated filesystem persisted inside one backing file.
pub struct SimFileSystem {
    device: Arc<dyn BlockDevice>,
    cache: BlockCacheManager,
    super_block: SuperBlock,
    inode_bitmap: Bitmap,
    data_bitmap: Bitmap,
    current_dir: i32,
    pub(crate) fds: Vec<Option<FileHandle>>,
}

impl SimFileSystem {
    /// Open the disk image at `path`, formatting a fresh one when the file
    /// does not exist yet.
    pub fn new(path: impl AsRef<Path>) -> FsResult<Self> {
        if BlockFile::exists(&path) {
            let device: Arc<dyn BlockDevice> = Arc::new(BlockFile::open(&path)?);
            let mut fs = Self::from_device(device);
            fs.mount()?;
            Ok(fs)
        } else {
            info!("disk not found, formatting a new one");
            let device: Arc<dyn BlockDevice> = Arc::new(BlockFile::create(&path)?);
            let mut fs = Self::from_device(device);
            fs.format()?;
            Ok(fs)
        }
    }

    /// Wrap an already-open block device. The filesystem is unusable until
    /// `format` or `mount` has run.
    pub fn from_device(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            cache: BlockCacheManager::new(),
            super_block: SuperBlock::formatted(),
            inode_bitmap: Bitmap::new(INODE_BITMAP_START, INODE_BITMAP_BLOCKS, TOTAL_INODES),
            data_bitmap: Bitmap::new(DATA_BITMAP_START, DATA_BITMAP_BLOCKS, DISK_BLOCKS),
            current_dir: ROOT_INODE,
            fds: Vec::new(),
        }
    }

    /// Destructive initialisation: wipe every block, rebuild the metadata
    /// regions and create the root directory as inode 0.
    pub fn format(&mut self) -> FsResult<()> {
        self.cache.purge();
        let zeroes = [0u8; BLOCK_SIZE];
        for block_id in 0..DISK_BLOCKS {
            self.device.write_block(block_id, &zeroes)?;
        }

        self.super_block = SuperBlock::formatted();
        self.inode_bitmap.reset();
        self.data_bitmap.reset();
        for block_id in 0..DATA_AREA_START {
            self.data_bitmap.set(block_id);
        }

        let root_id = self.alloc_inode()?;
        assert_eq!(root_id, ROOT_INODE, "root inode id is not 0");
        let root_block = self.alloc_data_block()?;
        let mut root = DiskInode::new(root_id, InodeKind::Directory);
        root.size = (2 * DIRENT_SIZE) as i32;
        root.blocks = 1;
        root.direct[0] = root_block;
        self.write_inode(root_id, &root)?;

        let dot = DirEntry::new(".", root_id)?;
        let dotdot = DirEntry::new("..", root_id)?;
        self.cache_block(root_block as usize)?
            .lock()
            .modify(0, |entries: &mut DirBlock| {
                entries[0] = dot;
                entries[1] = dotdot;
                for slot in entries.iter_mut().skip(2) {
                    *slot = DirEntry::free();
                }
            });

        self.current_dir = ROOT_INODE;
        self.fds.clear();
        self.commit()?;
        info!("disk formatted");
        Ok(())
    }

    /// Load the persisted super block and bitmaps and reset the current
    /// directory to root. Safe to call more than once.
    pub fn mount(&mut self) -> FsResult<()> {
        let super_block = self
            .cache_block(SUPER_BLOCK_START)?
            .lock()
            .read(0, |sb: &SuperBlock| *sb);
        if !super_block.matches_geometry() {
            warn!("super block does not match compiled geometry, mounting anyway");
        }
        self.super_block = super_block;

        for index in 0..self.inode_bitmap.blocks() {
            let words = self
                .cache_block(self.inode_bitmap.start_block() + index)?
                .lock()
                .read(0, |words: &BitmapBlock| *words);
            self.inode_bitmap.load_block_words(index, &words);
        }
        for index in 0..self.data_bitmap.blocks() {
            let words = self
                .cache_block(self.data_bitmap.start_block() + index)?
                .lock()
                .read(0, |words: &BitmapBlock| *words);
            self.data_bitmap.load_block_words(index, &words);
        }

        self.current_dir = ROOT_INODE;
        info!("file system mounted");
        Ok(())
    }

    /// Persist the super block and both bitmaps, then flush every cached
    /// block. Every metadata-mutating operation ends here.
    pub fn sync(&mut self) -> FsResult<()> {
        self.commit()
    }

    pub(crate) fn commit(&mut self) -> FsResult<()> {
        let super_block = self.super_block;
        self.cache_block(SUPER_BLOCK_START)?
            .lock()
            .modify(0, |sb: &mut SuperBlock| *sb = super_block);

        for index in 0..self.inode_bitmap.blocks() {
            let cache = self
                .cache
                .get(self.inode_bitmap.start_block() + index, &self.device)?;
            cache.lock().modify(0, |words: &mut BitmapBlock| {
                words.copy_from_slice(self.inode_bitmap.block_words(index));
            });
        }
        for index in 0..self.data_bitmap.blocks() {
            let cache = self
                .cache
                .get(self.data_bitmap.start_block() + index, &self.device)?;
            cache.lock().modify(0, |words: &mut BitmapBlock| {
                words.copy_from_slice(self.data_bitmap.block_words(index));
            });
        }

        self.cache.sync_all()
    }

    pub(crate) fn sync_cache(&mut self) -> FsResult<()> {
        self.cache.sync_all()
    }

    pub(crate) fn cache_block(
        &mut self,
        block_id: usize,
    ) -> FsResult<Arc<spin::Mutex<BlockCache>>> {
        self.cache.get(block_id, &self.device)
    }

    /// Free counters as recorded in the super block.
    pub fn free_counts(&self) -> (i32, i32) {
        (self.super_block.free_blocks, self.super_block.free_inodes)
    }

    /// Free bits actually present in the in-memory bitmaps; kept equal to
    /// the super-block counters by every operation.
    pub fn bitmap_free_counts(&self) -> (usize, usize) {
        (self.data_bitmap.free_bits(), self.inode_bitmap.free_bits())
    }

    pub(crate) fn current_dir(&self) -> i32 {
        self.current_dir
    }

    pub(crate) fn set_current_dir(&mut self, inode_id: i32) {
        self.current_dir = inode_id;
    }
}

// Allocators and the inode table.
impl SimFileSystem {
    pub(crate) fn alloc_inode(&mut self) -> FsResult<i32> {
        let id = self.inode_bitmap.alloc().ok_or(FsError::NoSpace)?;
        self.super_block.free_inodes -= 1;
        trace!("alloc inode {id}");
        Ok(id as i32)
    }

    /// Release an inode and zero its table slot. A no-op when the id is out
    /// of range or already free.
    pub(crate) fn free_inode(&mut self, inode_id: i32) -> FsResult<()> {
        if inode_id < 0 || inode_id >= self.super_block.total_inodes {
            return Ok(());
        }
        if !self.inode_bitmap.test(inode_id as usize) {
            return Ok(());
        }
        self.inode_bitmap.clear(inode_id as usize);
        if self.super_block.free_inodes < self.super_block.total_inodes {
            self.super_block.free_inodes += 1;
        }
        let (block_id, offset) = DiskInode::position(inode_id);
        self.cache_block(block_id)?
            .lock()
            .modify(offset, |slot: &mut [u8; INODE_SIZE]| slot.fill(0));
        trace!("free inode {inode_id}");
        Ok(())
    }

    pub(crate) fn alloc_data_block(&mut self) -> FsResult<i32> {
        // system bits are permanently set, so the lowest clear bit is
        // always inside the data area
        let block_id = self.data_bitmap.alloc().ok_or(FsError::NoSpace)?;
        debug_assert!(block_id >= DATA_AREA_START);
        self.super_block.free_blocks -= 1;
        trace!("alloc data block {block_id}");
        Ok(block_id as i32)
    }

    /// Release a data block and zero its payload. Ids outside the data area
    /// and already-free blocks are ignored.
    pub(crate) fn free_data_block(&mut self, block_id: i32) -> FsResult<()> {
        let block_id = block_id as isize;
        if block_id < DATA_AREA_START as isize || block_id >= DISK_BLOCKS as isize {
            return Ok(());
        }
        let block_id = block_id as usize;
        if !self.data_bitmap.test(block_id) {
            return Ok(());
        }
        self.data_bitmap.clear(block_id);
        if self.super_block.free_blocks < self.super_block.total_blocks {
            self.super_block.free_blocks += 1;
        }
        self.cache_block(block_id)?
            .lock()
            .modify(0, |data: &mut DataBlock| data.fill(0));
        trace!("free data block {block_id}");
        Ok(())
    }

    pub(crate) fn read_inode(&mut self, inode_id: i32) -> FsResult<DiskInode> {
        let (block_id, offset) = DiskInode::position(inode_id);
        Ok(self
            .cache_block(block_id)?
            .lock()
            .read(offset, |inode: &DiskInode| *inode))
    }

    pub(crate) fn write_inode(&mut self, inode_id: i32, inode: &DiskInode) -> FsResult<()> {
        let (block_id, offset) = DiskInode::position(inode_id);
        self.cache_block(block_id)?
            .lock()
            .modify(offset, |slot: &mut DiskInode| *slot = *inode);
        Ok(())
    }
}

impl Drop for SimFileSystem {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            error!("failed to persist filesystem state on shutdown: {e}");
        }
    }
}
