//! Directory encoding: a directory's data blocks are arrays of fixed-width
//! `(name, inode id)` slots. A slot with inode id `-1` (or a NUL first name
//! byte) is free; removing an entry tombstones its slot in place.

use crate::config::{DIRENT_SIZE, INODE_DIRECT_COUNT, NO_BLOCK};
use crate::error::{FsError, FsResult};
use crate::fs::SimFileSystem;
use crate::layout::{unix_now, DirBlock, DirEntry, DiskInode};

impl SimFileSystem {
    /// Look `name` up in directory `dir_id`, returning the entry's inode id.
    pub(crate) fn find_in_dir(&mut self, dir_id: i32, name: &str) -> FsResult<Option<i32>> {
        let dir = self.read_inode(dir_id)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }
        for &block_id in dir.direct.iter() {
            if block_id == NO_BLOCK {
                break;
            }
            let found = self
                .cache_block(block_id as usize)?
                .lock()
                .read(0, |entries: &DirBlock| {
                    entries
                        .iter()
                        .find(|entry| !entry.is_free() && entry.name() == name)
                        .map(DirEntry::inode_id)
                });
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Add `(name, child_id)` to directory `dir_id`, reusing the first free
    /// slot and growing the directory by one block when every existing slot
    /// is taken.
    pub(crate) fn add_entry(&mut self, dir_id: i32, name: &str, child_id: i32) -> FsResult<()> {
        let entry = DirEntry::new(name, child_id)?;
        let mut dir = self.read_inode(dir_id)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }

        for index in 0..INODE_DIRECT_COUNT {
            let block_id = if dir.direct[index] == NO_BLOCK {
                let fresh = self.alloc_data_block()?;
                dir.direct[index] = fresh;
                dir.blocks += 1;
                self.cache_block(fresh as usize)?
                    .lock()
                    .modify(0, |entries: &mut DirBlock| {
                        for slot in entries.iter_mut() {
                            *slot = DirEntry::free();
                        }
                    });
                fresh
            } else {
                dir.direct[index]
            };

            let placed = self
                .cache_block(block_id as usize)?
                .lock()
                .modify(0, |entries: &mut DirBlock| {
                    match entries.iter_mut().find(|slot| slot.is_free()) {
                        Some(slot) => {
                            *slot = entry;
                            true
                        }
                        None => false,
                    }
                });
            if placed {
                dir.size += DIRENT_SIZE as i32;
                let now = unix_now();
                dir.mtime = now;
                dir.atime = now;
                self.write_inode(dir_id, &dir)?;
                return Ok(());
            }
        }
        Err(FsError::DirFull)
    }

    /// Tombstone the entry called `name` in directory `dir_id`.
    pub(crate) fn remove_entry(&mut self, dir_id: i32, name: &str) -> FsResult<()> {
        let mut dir = self.read_inode(dir_id)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }
        for &block_id in dir.direct.iter() {
            if block_id == NO_BLOCK {
                break;
            }
            let removed = self
                .cache_block(block_id as usize)?
                .lock()
                .modify(0, |entries: &mut DirBlock| {
                    match entries
                        .iter_mut()
                        .find(|entry| !entry.is_free() && entry.name() == name)
                    {
                        Some(entry) => {
                            entry.tombstone();
                            true
                        }
                        None => false,
                    }
                });
            if removed {
                if dir.size >= DIRENT_SIZE as i32 {
                    dir.size -= DIRENT_SIZE as i32;
                }
                let now = unix_now();
                dir.mtime = now;
                dir.atime = now;
                self.write_inode(dir_id, &dir)?;
                return Ok(());
            }
        }
        Err(FsError::NotFound)
    }

    /// Whether the directory holds nothing beyond `.` and `..`.
    pub(crate) fn directory_is_empty(&mut self, dir: &DiskInode) -> FsResult<bool> {
        for &block_id in dir.direct.iter() {
            if block_id == NO_BLOCK {
                break;
            }
            let occupied = self
                .cache_block(block_id as usize)?
                .lock()
                .read(0, |entries: &DirBlock| {
                    entries.iter().any(|entry| {
                        !entry.is_free() && entry.name() != "." && entry.name() != ".."
                    })
                });
            if occupied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// All live `(name, inode id)` pairs of directory `dir_id`, in slot order.
    pub(crate) fn dir_entries(&mut self, dir_id: i32) -> FsResult<Vec<(String, i32)>> {
        let dir = self.read_inode(dir_id)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let mut entries = Vec::new();
        for &block_id in dir.direct.iter() {
            if block_id == NO_BLOCK {
                break;
            }
            self.cache_block(block_id as usize)?
                .lock()
                .read(0, |slots: &DirBlock| {
                    for slot in slots.iter().filter(|slot| !slot.is_free()) {
                        entries.push((slot.name().to_string(), slot.inode_id()));
                    }
                });
        }
        Ok(entries)
    }

    /// The name under which `child_id` appears in directory `dir_id`,
    /// ignoring the `.` and `..` self-references.
    pub(crate) fn child_name(&mut self, dir_id: i32, child_id: i32) -> FsResult<Option<String>> {
        Ok(self
            .dir_entries(dir_id)?
            .into_iter()
            .find(|(name, id)| *id == child_id && name != "." && name != "..")
            .map(|(name, _)| name))
    }
}
