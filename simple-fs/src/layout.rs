//! On-disk data structures: the super block, inode records and directory
//! entries. All of them are `repr(C)` and read/written in place through the
//! block cache, so their byte layout is exactly the persisted format
//! (little-endian integers on the supported hosts).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{
    BLOCK_SIZE, DATA_AREA_START, DATA_BITMAP_START, DIRENT_SIZE, DIR_ENTRIES_PER_BLOCK,
    DISK_BLOCKS, INODE_AREA_START, INODE_BITMAP_START, INODE_DIRECT_COUNT, INODE_SIZE,
    NAME_LENGTH_LIMIT, NO_BLOCK, TOTAL_INODES,
};
use crate::error::{FsError, FsResult};

/// One data block viewed as raw bytes
pub type DataBlock = [u8; BLOCK_SIZE];
/// One directory block viewed as entry slots
pub type DirBlock = [DirEntry; DIR_ENTRIES_PER_BLOCK];

/// Seconds since the epoch, widened to the on-disk timestamp width.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The super block: totals, free counters and region starts.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SuperBlock {
    /// Total blocks on the disk
    pub total_blocks: i32,
    /// Total inode slots in the table
    pub total_inodes: i32,
    /// Clear bits in the data bitmap
    pub free_blocks: i32,
    /// Clear bits in the inode bitmap
    pub free_inodes: i32,
    /// First block of the inode bitmap
    pub inode_bitmap_start: i32,
    /// First block of the data bitmap
    pub data_bitmap_start: i32,
    /// First block of the inode table
    pub inode_area_start: i32,
    /// First block of the data area
    pub data_area_start: i32,
}

impl SuperBlock {
    /// The super block of a freshly formatted disk, before the root
    /// directory takes its inode and first data block.
    pub fn formatted() -> Self {
        Self {
            total_blocks: DISK_BLOCKS as i32,
            total_inodes: TOTAL_INODES as i32,
            free_blocks: (DISK_BLOCKS - DATA_AREA_START) as i32,
            free_inodes: TOTAL_INODES as i32,
            inode_bitmap_start: INODE_BITMAP_START as i32,
            data_bitmap_start: DATA_BITMAP_START as i32,
            inode_area_start: INODE_AREA_START as i32,
            data_area_start: DATA_AREA_START as i32,
        }
    }

    /// Whether the persisted geometry matches the compiled one.
    pub fn matches_geometry(&self) -> bool {
        self.total_blocks == DISK_BLOCKS as i32
            && self.total_inodes == TOTAL_INODES as i32
            && self.inode_area_start == INODE_AREA_START as i32
            && self.data_area_start == DATA_AREA_START as i32
    }
}

/// Kind tag stored in every inode record.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InodeKind {
    /// Regular file
    Regular = 0,
    /// Directory
    Directory = 1,
}

/// One inode record, packed into a fixed 128-byte table slot.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct DiskInode {
    /// Inode id, equal to the slot index
    pub id: i32,
    /// File or directory
    pub kind: InodeKind,
    /// Content size in bytes
    pub size: i32,
    /// Data blocks held by the direct table
    pub blocks: i32,
    /// Last access time
    pub atime: i64,
    /// Last modification time
    pub mtime: i64,
    /// Creation time
    pub ctime: i64,
    /// Direct block pointers; `NO_BLOCK` marks an unallocated slot
    pub direct: [i32; INODE_DIRECT_COUNT],
    /// Reserved first-indirect pointer, always `NO_BLOCK`
    pub indirect1: i32,
    // explicit tail padding; keeps the persisted record free of
    // uninitialised bytes
    _reserved: i32,
}

impl DiskInode {
    /// A fresh record for a newly allocated object.
    pub fn new(id: i32, kind: InodeKind) -> Self {
        let now = unix_now();
        Self {
            id,
            kind,
            size: 0,
            blocks: 0,
            atime: now,
            mtime: now,
            ctime: now,
            direct: [NO_BLOCK; INODE_DIRECT_COUNT],
            indirect1: NO_BLOCK,
            _reserved: 0,
        }
    }

    /// Whether this inode is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    /// Whether this inode is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == InodeKind::Regular
    }

    /// Table position of inode `id` as `(block, offset)`.
    pub fn position(id: i32) -> (usize, usize) {
        let id = id as usize;
        (
            INODE_AREA_START + id / (BLOCK_SIZE / INODE_SIZE),
            (id % (BLOCK_SIZE / INODE_SIZE)) * INODE_SIZE,
        )
    }
}

/// A fixed-width directory entry: NUL-terminated name plus inode id.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DirEntry {
    name: [u8; NAME_LENGTH_LIMIT + 1],
    inode_id: i32,
}

impl DirEntry {
    /// Build an entry, rejecting empty, oversized or NUL-containing names.
    pub fn new(name: &str, inode_id: i32) -> FsResult<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_LENGTH_LIMIT || bytes.contains(&0) {
            return Err(FsError::InvalidPath);
        }
        let mut buf = [0u8; NAME_LENGTH_LIMIT + 1];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            name: buf,
            inode_id,
        })
    }

    /// An unused slot, as written into a fresh directory block.
    pub fn free() -> Self {
        Self {
            name: [0u8; NAME_LENGTH_LIMIT + 1],
            inode_id: NO_BLOCK,
        }
    }

    /// Whether the slot is empty or tombstoned.
    pub fn is_free(&self) -> bool {
        self.inode_id == NO_BLOCK || self.name[0] == 0
    }

    /// Turn the slot into a tombstone. The whole name buffer is zeroed so a
    /// netting add/remove leaves the block byte-identical.
    pub fn tombstone(&mut self) {
        self.inode_id = NO_BLOCK;
        self.name.fill(0);
    }

    /// The entry name.
    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// The referenced inode id.
    pub fn inode_id(&self) -> i32 {
        self.inode_id
    }
}

const _: () = assert!(core::mem::size_of::<SuperBlock>() == 32);
const _: () = assert!(core::mem::size_of::<DiskInode>() <= INODE_SIZE);
const _: () = assert!(core::mem::size_of::<DirEntry>() == DIRENT_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_positions_walk_the_table() {
        assert_eq!(DiskInode::position(0), (INODE_AREA_START, 0));
        assert_eq!(DiskInode::position(7), (INODE_AREA_START, 7 * INODE_SIZE));
        assert_eq!(DiskInode::position(8), (INODE_AREA_START + 1, 0));
        assert_eq!(
            DiskInode::position(TOTAL_INODES as i32 - 1),
            (INODE_AREA_START + 127, 7 * INODE_SIZE)
        );
    }

    #[test]
    fn dir_entry_names_are_bounded() {
        let entry = DirEntry::new("file.txt", 3).unwrap();
        assert_eq!(entry.name(), "file.txt");
        assert_eq!(entry.inode_id(), 3);
        assert!(!entry.is_free());

        assert!(matches!(
            DirEntry::new("", 1),
            Err(FsError::InvalidPath)
        ));
        let long = "x".repeat(NAME_LENGTH_LIMIT);
        assert!(DirEntry::new(&long, 1).is_ok());
        let too_long = "x".repeat(NAME_LENGTH_LIMIT + 1);
        assert!(matches!(
            DirEntry::new(&too_long, 1),
            Err(FsError::InvalidPath)
        ));
        assert!(matches!(
            DirEntry::new("a\0b", 1),
            Err(FsError::InvalidPath)
        ));
    }

    #[test]
    fn tombstone_zeroes_the_slot() {
        let mut entry = DirEntry::new("victim", 9).unwrap();
        entry.tombstone();
        assert!(entry.is_free());
        assert_eq!(entry.inode_id(), NO_BLOCK);
        assert!(entry.name.iter().all(|&b| b == 0));
    }

    #[test]
    fn fresh_slots_carry_the_tombstone_sentinel() {
        let slot = DirEntry::free();
        assert!(slot.is_free());
        assert_eq!(slot.inode_id(), -1);
        assert_eq!(slot.name(), "");
    }
}
