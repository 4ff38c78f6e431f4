//! File content I/O over an inode's direct-pointer table, in block-sized
//! windows. Writes allocate blocks on demand; a write that runs out of
//! pointer slots or free blocks keeps the bytes that already went out.

use crate::config::{BLOCK_SIZE, INODE_DIRECT_COUNT, NO_BLOCK};
use crate::error::{FsError, FsResult};
use crate::fs::SimFileSystem;
use crate::layout::{unix_now, DataBlock};

impl SimFileSystem {
    /// Read up to `buf.len()` bytes at `offset` from regular file
    /// `inode_id`. Reading at or past end-of-file yields 0 bytes.
    pub(crate) fn read_at(
        &mut self,
        inode_id: i32,
        offset: usize,
        buf: &mut [u8],
    ) -> FsResult<usize> {
        let mut inode = self.read_inode(inode_id)?;
        if !inode.is_file() {
            return Err(FsError::IsDirectory);
        }
        let size = inode.size as usize;
        let want = buf.len().min(size.saturating_sub(offset));
        if want == 0 {
            return Ok(0);
        }

        let mut read = 0;
        while read < want {
            let pos = offset + read;
            let block_index = pos / BLOCK_SIZE;
            if block_index >= INODE_DIRECT_COUNT || inode.direct[block_index] == NO_BLOCK {
                break;
            }
            let block_offset = pos % BLOCK_SIZE;
            let len = (BLOCK_SIZE - block_offset).min(want - read);
            let dst = &mut buf[read..read + len];
            self.cache_block(inode.direct[block_index] as usize)?
                .lock()
                .read(0, |data: &DataBlock| {
                    dst.copy_from_slice(&data[block_offset..block_offset + len]);
                });
            read += len;
        }

        inode.atime = unix_now();
        self.write_inode(inode_id, &inode)?;
        self.sync_cache()?;
        Ok(read)
    }

    /// Write `data` at `offset` into regular file `inode_id`, growing the
    /// file as needed. Returns the number of bytes persisted, which is less
    /// than `data.len()` when the direct table or the allocator runs out;
    /// `NoSpace` is returned only when not a single byte fit.
    pub(crate) fn write_at(
        &mut self,
        inode_id: i32,
        offset: usize,
        data: &[u8],
    ) -> FsResult<usize> {
        let mut inode = self.read_inode(inode_id)?;
        if !inode.is_file() {
            return Err(FsError::IsDirectory);
        }

        let mut written = 0;
        let mut exhausted = false;
        while written < data.len() {
            let pos = offset + written;
            let block_index = pos / BLOCK_SIZE;
            if block_index >= INODE_DIRECT_COUNT {
                exhausted = true;
                break;
            }
            let block_id = if inode.direct[block_index] == NO_BLOCK {
                match self.alloc_data_block() {
                    Ok(block_id) => {
                        inode.direct[block_index] = block_id;
                        inode.blocks += 1;
                        block_id
                    }
                    Err(FsError::NoSpace) => {
                        exhausted = true;
                        break;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                inode.direct[block_index]
            };

            let block_offset = pos % BLOCK_SIZE;
            let len = (BLOCK_SIZE - block_offset).min(data.len() - written);
            let src = &data[written..written + len];
            self.cache_block(block_id as usize)?
                .lock()
                .modify(0, |block: &mut DataBlock| {
                    block[block_offset..block_offset + len].copy_from_slice(src);
                });
            written += len;
        }

        inode.size = inode.size.max((offset + written) as i32);
        inode.mtime = unix_now();
        self.write_inode(inode_id, &inode)?;
        self.commit()?;

        if written == 0 && exhausted {
            return Err(FsError::NoSpace);
        }
        Ok(written)
    }

    /// Free every data block of `inode_id`, reset the direct table to
    /// sentinels and zero the size. Works on files and directories alike;
    /// used before removal and by `O_TRUNC`.
    pub(crate) fn truncate(&mut self, inode_id: i32) -> FsResult<()> {
        let mut inode = self.read_inode(inode_id)?;
        for slot in inode.direct.iter_mut() {
            if *slot != NO_BLOCK {
                let block_id = *slot;
                *slot = NO_BLOCK;
                self.free_data_block(block_id)?;
            }
        }
        inode.blocks = 0;
        inode.size = 0;
        let now = unix_now();
        inode.mtime = now;
        inode.atime = now;
        self.write_inode(inode_id, &inode)?;
        self.commit()
    }
}
