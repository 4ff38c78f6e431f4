//! A simulated UNIX-like filesystem living inside one fixed-size backing file.
//!
//! The disk is a contiguous run of 1 KiB blocks laid out as
//! boot | super | inode bitmap | data bitmap | inode table | data area.
//! [`SimFileSystem`] owns the backing file, the in-memory bitmaps, the super
//! block and the open-file table, and exposes the engine API consumed by the
//! shell: `create`/`open`/`read`/`write`/`close`, `mkdir`/`rmdir`/`rm`,
//! `ls`/`chdir`/`cwd`, `format`/`mount`.

#![deny(missing_docs)]

mod bitmap;
mod block_cache;
mod block_dev;
mod config;
mod dir;
mod error;
mod fd;
mod file;
mod fs;
mod layout;
mod path;
mod vfs;

#[cfg(test)]
mod tests;

pub use block_dev::{BlockDevice, BlockFile};
pub use config::{
    BLOCK_SIZE, DATA_AREA_START, DISK_BLOCKS, INODE_DIRECT_COUNT, MAX_FILE_SIZE,
    NAME_LENGTH_LIMIT, TOTAL_INODES,
};
pub use error::{FsError, FsResult};
pub use fd::OpenFlags;
pub use fs::SimFileSystem;
pub use layout::InodeKind;
pub use vfs::DirEntryInfo;
