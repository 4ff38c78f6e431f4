//! On-disk layout constants. Every region start is derived from the sizes of
//! the regions before it, so the numbers stay consistent when one changes.

/// Size of one disk block in bytes
pub const BLOCK_SIZE: usize = 1024;
/// Total number of blocks in the backing file (10 MiB disk)
pub const DISK_BLOCKS: usize = 10240;
/// Size of the backing file in bytes
pub const DISK_SIZE: u64 = (DISK_BLOCKS * BLOCK_SIZE) as u64;

/// Blocks reserved for the boot record
pub const BOOT_BLOCK_COUNT: usize = 1;
/// Blocks holding the super block
pub const SUPER_BLOCK_COUNT: usize = 1;
/// Blocks holding the inode bitmap
pub const INODE_BITMAP_BLOCKS: usize = 1;
/// Blocks holding the data-block bitmap
pub const DATA_BITMAP_BLOCKS: usize = 4;
/// Blocks holding the inode table
pub const INODE_AREA_BLOCKS: usize = 128;

/// First block of the boot record
pub const BOOT_BLOCK_START: usize = 0;
/// Block holding the super block
pub const SUPER_BLOCK_START: usize = BOOT_BLOCK_START + BOOT_BLOCK_COUNT;
/// First block of the inode bitmap
pub const INODE_BITMAP_START: usize = SUPER_BLOCK_START + SUPER_BLOCK_COUNT;
/// First block of the data bitmap
pub const DATA_BITMAP_START: usize = INODE_BITMAP_START + INODE_BITMAP_BLOCKS;
/// First block of the inode table
pub const INODE_AREA_START: usize = DATA_BITMAP_START + DATA_BITMAP_BLOCKS;
/// First block of the data area
pub const DATA_AREA_START: usize = INODE_AREA_START + INODE_AREA_BLOCKS;

/// Fixed width of one inode slot in the table
pub const INODE_SIZE: usize = 128;
/// Inode slots per table block
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
/// Total number of inodes the table can hold
pub const TOTAL_INODES: usize = INODE_AREA_BLOCKS * INODES_PER_BLOCK;

/// Direct block pointers per inode
pub const INODE_DIRECT_COUNT: usize = 10;
/// Largest file the direct-pointer table can address
pub const MAX_FILE_SIZE: usize = INODE_DIRECT_COUNT * BLOCK_SIZE;

/// Longest usable entry name; the 252-byte buffer keeps one byte for NUL
pub const NAME_LENGTH_LIMIT: usize = 251;
/// Fixed width of one directory entry
pub const DIRENT_SIZE: usize = 256;
/// Directory entries per block
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

/// Blocks kept in the in-memory cache
pub const BLOCK_CACHE_SIZE: usize = 16;

/// Sentinel for an unallocated pointer slot or a tombstoned entry
pub const NO_BLOCK: i32 = -1;

const _: () = assert!(INODES_PER_BLOCK * INODE_AREA_BLOCKS == TOTAL_INODES);
const _: () = assert!(INODE_BITMAP_BLOCKS * BLOCK_SIZE * 8 >= TOTAL_INODES);
const _: () = assert!(DATA_BITMAP_BLOCKS * BLOCK_SIZE * 8 >= DISK_BLOCKS);
const _: () = assert!(DATA_AREA_START < DISK_BLOCKS);
