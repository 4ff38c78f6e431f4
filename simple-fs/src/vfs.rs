//! Namespace operations: creating, listing, removing and walking files and
//! directories by path. Within one removal the guaranteed order is
//! truncate data blocks, free the inode, tombstone the parent entry, then
//! persist bitmaps and super block.

use log::debug;

use crate::config::DIRENT_SIZE;
use crate::error::{FsError, FsResult};
use crate::fs::{SimFileSystem, ROOT_INODE};
use crate::layout::{DirBlock, DirEntry, DiskInode, InodeKind};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    /// Entry name
    pub name: String,
    /// File or directory
    pub kind: InodeKind,
    /// Content size in bytes
    pub size: i32,
}

impl SimFileSystem {
    /// Create an empty regular file at `path`.
    pub fn create(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = self.resolve_parent(path)?;
        if self.find_in_dir(parent, &name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let inode_id = self.alloc_inode()?;
        let inode = DiskInode::new(inode_id, InodeKind::Regular);
        self.write_inode(inode_id, &inode)?;
        if let Err(e) = self.add_entry(parent, &name, inode_id) {
            self.free_inode(inode_id)?;
            self.commit()?;
            return Err(e);
        }
        debug!("create {path} -> inode {inode_id}");
        self.commit()
    }

    /// Create an empty directory at `path` with its `.` and `..` entries.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = self.resolve_parent(path)?;
        if self.find_in_dir(parent, &name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let inode_id = self.alloc_inode()?;
        let block_id = match self.alloc_data_block() {
            Ok(block_id) => block_id,
            Err(e) => {
                self.free_inode(inode_id)?;
                self.commit()?;
                return Err(e);
            }
        };
        let mut inode = DiskInode::new(inode_id, InodeKind::Directory);
        inode.size = (2 * DIRENT_SIZE) as i32;
        inode.blocks = 1;
        inode.direct[0] = block_id;
        self.write_inode(inode_id, &inode)?;

        let dot = DirEntry::new(".", inode_id)?;
        let dotdot = DirEntry::new("..", parent)?;
        self.cache_block(block_id as usize)?
            .lock()
            .modify(0, |entries: &mut DirBlock| {
                entries[0] = dot;
                entries[1] = dotdot;
                for slot in entries.iter_mut().skip(2) {
                    *slot = DirEntry::free();
                }
            });

        if let Err(e) = self.add_entry(parent, &name, inode_id) {
            self.free_data_block(block_id)?;
            self.free_inode(inode_id)?;
            self.commit()?;
            return Err(e);
        }
        debug!("mkdir {path} -> inode {inode_id}");
        self.commit()
    }

    /// Remove the regular file at `path`.
    pub fn remove_file(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = self.resolve_parent(path)?;
        if name == "." || name == ".." {
            return Err(FsError::InvalidPath);
        }
        let inode_id = self
            .find_in_dir(parent, &name)?
            .ok_or(FsError::NotFound)?;
        if !self.read_inode(inode_id)?.is_file() {
            return Err(FsError::IsDirectory);
        }
        self.truncate(inode_id)?;
        self.free_inode(inode_id)?;
        self.remove_entry(parent, &name)?;
        debug!("remove file {path}");
        self.commit()
    }

    /// Remove the empty directory at `path`. Root is never removable.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FsError::InvalidPath);
        }
        let (parent, name) = self.resolve_parent(path)?;
        if name == "." || name == ".." {
            return Err(FsError::InvalidPath);
        }
        let inode_id = self
            .find_in_dir(parent, &name)?
            .ok_or(FsError::NotFound)?;
        if inode_id == ROOT_INODE {
            return Err(FsError::InvalidPath);
        }
        let inode = self.read_inode(inode_id)?;
        if !inode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if !self.directory_is_empty(&inode)? {
            return Err(FsError::NotEmpty);
        }
        self.truncate(inode_id)?;
        self.free_inode(inode_id)?;
        self.remove_entry(parent, &name)?;
        debug!("rmdir {path}");
        self.commit()
    }

    /// Remove `path`. Directories need `recursive`; `force` absorbs a
    /// missing target and child failures. Removing root always fails, even
    /// with `force`.
    pub fn rm(&mut self, path: &str, recursive: bool, force: bool) -> FsResult<()> {
        if path.is_empty() {
            return if force { Ok(()) } else { Err(FsError::InvalidPath) };
        }
        if path == "/" {
            return Err(FsError::InvalidPath);
        }
        let inode_id = match self.find_inode_by_path(path) {
            Ok(inode_id) => inode_id,
            Err(e) => return if force { Ok(()) } else { Err(e) },
        };
        if inode_id == ROOT_INODE {
            return Err(FsError::InvalidPath);
        }

        if self.read_inode(inode_id)?.is_file() {
            return match self.remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if force => {
                    debug!("rm -f absorbing failure on {path}: {e}");
                    Ok(())
                }
                Err(e) => Err(e),
            };
        }

        if !recursive {
            return Err(FsError::IsDirectory);
        }
        let children: Vec<String> = self
            .dir_entries(inode_id)?
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name != "." && name != "..")
            .collect();
        for child in children {
            let child_path = format!("{}/{}", path.trim_end_matches('/'), child);
            if let Err(e) = self.rm(&child_path, true, force) {
                if !force {
                    return Err(e);
                }
            }
        }
        match self.rmdir(path) {
            Ok(()) => Ok(()),
            Err(e) if force => {
                debug!("rm -rf absorbing failure on {path}: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// List the directory at `path`, tombstones excluded, `.` and `..`
    /// included.
    pub fn ls(&mut self, path: &str) -> FsResult<Vec<DirEntryInfo>> {
        let dir_id = self.find_inode_by_path(path)?;
        let entries = self.dir_entries(dir_id)?;
        let mut listing = Vec::with_capacity(entries.len());
        for (name, inode_id) in entries {
            let inode = self.read_inode(inode_id)?;
            listing.push(DirEntryInfo {
                name,
                kind: inode.kind,
                size: inode.size,
            });
        }
        Ok(listing)
    }

    /// Change the current directory.
    pub fn chdir(&mut self, path: &str) -> FsResult<()> {
        let inode_id = self.find_inode_by_path(path)?;
        if !self.read_inode(inode_id)?.is_dir() {
            return Err(FsError::NotDirectory);
        }
        self.set_current_dir(inode_id);
        Ok(())
    }

    /// The absolute path of the current directory, rebuilt by walking `..`
    /// upwards and looking the child's inode id up in each parent.
    pub fn cwd(&mut self) -> FsResult<String> {
        let mut components = Vec::new();
        let mut current = self.current_dir();
        while current != ROOT_INODE {
            let parent = self
                .find_in_dir(current, "..")?
                .ok_or(FsError::NotFound)?;
            if parent == current {
                break;
            }
            match self.child_name(parent, current)? {
                Some(name) => components.push(name),
                None => break,
            }
            current = parent;
        }
        if components.is_empty() {
            return Ok("/".to_string());
        }
        let mut path = String::new();
        for name in components.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        Ok(path)
    }
}
