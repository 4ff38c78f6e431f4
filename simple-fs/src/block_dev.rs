//! Block device interface and the backing-file implementation.
//!
//! A block device stores data in fixed-size blocks addressed by index. The
//! engine only ever talks to the disk through [`BlockDevice`]; the one
//! implementation here, [`BlockFile`], maps blocks onto a plain host file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::config::{BLOCK_SIZE, DISK_BLOCKS, DISK_SIZE};
use crate::error::{FsError, FsResult};

/// Fixed-size block read/write by block index.
pub trait BlockDevice: Send + Sync {
    /// Read block `block_id` into `buf` (`buf.len() == BLOCK_SIZE`)
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> FsResult<()>;
    /// Write `buf` (`buf.len() == BLOCK_SIZE`) to block `block_id`
    fn write_block(&self, block_id: usize, buf: &[u8]) -> FsResult<()>;
}

/// A virtual disk backed by one host file of exactly `DISK_SIZE` bytes.
pub struct BlockFile(Mutex<File>);

impl BlockFile {
    /// Open an existing disk image.
    pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self(Mutex::new(file)))
    }

    /// Create a fresh disk image of `DISK_BLOCKS` zeroed blocks, replacing
    /// whatever was at `path`.
    pub fn create(path: impl AsRef<Path>) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(DISK_SIZE)?;
        Ok(Self(Mutex::new(file)))
    }

    /// Whether a disk image already exists at `path`.
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    fn seek_to(file: &mut File, block_id: usize) -> io::Result<()> {
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map(|_| ())
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> FsResult<()> {
        assert_eq!(buf.len(), BLOCK_SIZE, "not a complete block");
        if block_id >= DISK_BLOCKS {
            return Err(block_range_error(block_id));
        }
        let mut file = self.0.lock().expect("block file lock poisoned");
        Self::seek_to(&mut file, block_id)?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> FsResult<()> {
        assert_eq!(buf.len(), BLOCK_SIZE, "not a complete block");
        if block_id >= DISK_BLOCKS {
            return Err(block_range_error(block_id));
        }
        let mut file = self.0.lock().expect("block file lock poisoned");
        Self::seek_to(&mut file, block_id)?;
        file.write_all(buf)?;
        Ok(())
    }
}

fn block_range_error(block_id: usize) -> FsError {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("block id {block_id} out of range"),
    )
    .into()
}
