//! The open-file table and the descriptor-based read/write surface.
//!
//! A descriptor is a small integer indexing a slot that remembers the path,
//! the open flags and a byte cursor. The path is re-resolved on every
//! operation, so a file removed while open surfaces `NotFound` on the next
//! access. A slot goes `free -> open -> free`; any operation on a free or
//! out-of-range slot fails with `BadFd`.

use bitflags::bitflags;
use log::debug;

use crate::error::{FsError, FsResult};
use crate::fs::SimFileSystem;

bitflags! {
    /// Open flags; a bit set with `RDWR` being both access bits at once.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading
        const RDONLY = 1;
        /// Open for writing
        const WRONLY = 2;
        /// Open for reading and writing
        const RDWR = 3;
        /// Create the file when it does not exist
        const CREAT = 4;
        /// Truncate to zero length on open
        const TRUNC = 8;
        /// Position every write at the current end of file
        const APPEND = 16;
    }
}

/// State of one open descriptor slot.
pub(crate) struct FileHandle {
    path: String,
    flags: OpenFlags,
    offset: usize,
}

impl SimFileSystem {
    /// Open `path` with `flags`, returning a descriptor.
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> FsResult<usize> {
        if !flags.intersects(OpenFlags::RDWR) {
            return Err(FsError::BadFlags);
        }
        let inode_id = match self.find_inode_by_path(path) {
            Ok(inode_id) => inode_id,
            Err(FsError::NotFound) if flags.contains(OpenFlags::CREAT) => {
                self.create(path)?;
                self.find_inode_by_path(path)?
            }
            Err(e) => return Err(e),
        };
        if self.read_inode(inode_id)?.is_dir() {
            return Err(FsError::IsDirectory);
        }
        if flags.contains(OpenFlags::TRUNC) {
            self.truncate(inode_id)?;
        }
        let offset = if flags.contains(OpenFlags::APPEND) {
            self.read_inode(inode_id)?.size as usize
        } else {
            0
        };

        let handle = FileHandle {
            path: path.to_string(),
            flags,
            offset,
        };
        let fd = match self.fds.iter().position(Option::is_none) {
            Some(fd) => {
                self.fds[fd] = Some(handle);
                fd
            }
            None => {
                self.fds.push(Some(handle));
                self.fds.len() - 1
            }
        };
        debug!("open {path} ({flags:?}) -> fd {fd}");
        Ok(fd)
    }

    /// Read up to `count` bytes from the descriptor's cursor, advancing it
    /// by the number of bytes returned. Reading past end-of-file returns an
    /// empty buffer, not an error.
    pub fn read(&mut self, fd: usize, count: usize) -> FsResult<Vec<u8>> {
        let handle = self.handle(fd)?;
        if !handle.flags.contains(OpenFlags::RDONLY) {
            return Err(FsError::BadFlags);
        }
        let (path, offset) = (handle.path.clone(), handle.offset);

        let inode_id = self.find_inode_by_path(&path)?;
        let size = self.read_inode(inode_id)?.size as usize;
        let mut buf = vec![0u8; count.min(size.saturating_sub(offset))];
        let read = self.read_at(inode_id, offset, &mut buf)?;
        buf.truncate(read);
        self.handle_mut(fd)?.offset += read;
        Ok(buf)
    }

    /// Write `data` at the descriptor's cursor (at end-of-file first when
    /// `APPEND`), overlaying existing content and growing the file as
    /// needed. Returns the bytes persisted; the cursor advances by that
    /// amount.
    pub fn write(&mut self, fd: usize, data: &[u8]) -> FsResult<usize> {
        let handle = self.handle(fd)?;
        if !handle.flags.contains(OpenFlags::WRONLY) {
            return Err(FsError::BadFlags);
        }
        let (path, flags, mut offset) = (handle.path.clone(), handle.flags, handle.offset);

        let inode_id = self.find_inode_by_path(&path)?;
        if flags.contains(OpenFlags::APPEND) {
            offset = self.read_inode(inode_id)?.size as usize;
        }
        let written = self.write_at(inode_id, offset, data)?;
        self.handle_mut(fd)?.offset = offset + written;
        Ok(written)
    }

    /// Release the descriptor. Closing a free slot fails.
    pub fn close(&mut self, fd: usize) -> FsResult<()> {
        let slot = self.fds.get_mut(fd).ok_or(FsError::BadFd)?;
        if slot.is_none() {
            return Err(FsError::BadFd);
        }
        *slot = None;
        debug!("close fd {fd}");
        Ok(())
    }

    fn handle(&self, fd: usize) -> FsResult<&FileHandle> {
        self.fds
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(FsError::BadFd)
    }

    fn handle_mut(&mut self, fd: usize) -> FsResult<&mut FileHandle> {
        self.fds
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::BadFd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rdwr_covers_both_access_bits() {
        assert!(OpenFlags::RDWR.contains(OpenFlags::RDONLY));
        assert!(OpenFlags::RDWR.contains(OpenFlags::WRONLY));
        assert!(!OpenFlags::RDONLY.contains(OpenFlags::WRONLY));
        assert!(!OpenFlags::WRONLY.contains(OpenFlags::RDONLY));
    }

    #[test]
    fn flag_words_parse_like_the_shell_passes_them() {
        assert_eq!(OpenFlags::from_bits(3), Some(OpenFlags::RDWR));
        assert_eq!(
            OpenFlags::from_bits(1 | 4 | 8),
            Some(OpenFlags::RDONLY | OpenFlags::CREAT | OpenFlags::TRUNC)
        );
        assert_eq!(OpenFlags::from_bits(64), None);
    }
}
