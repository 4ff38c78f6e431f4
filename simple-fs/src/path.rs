//! Path resolution. A path starting with `/` walks from root, anything else
//! from the current directory; `..` is an ordinary directory entry, so
//! interior `..` components resolve through the normal lookup.

use crate::error::{FsError, FsResult};
use crate::fs::{SimFileSystem, ROOT_INODE};

impl SimFileSystem {
    /// Resolve `path` to an inode id.
    ///
    /// A path of exactly `".."` resolves relative to the current directory
    /// through its `..` entry; it is not treated as a generic prefix.
    pub(crate) fn find_inode_by_path(&mut self, path: &str) -> FsResult<i32> {
        if path.is_empty() {
            return Err(FsError::InvalidPath);
        }
        if path == "/" {
            return Ok(ROOT_INODE);
        }
        if path == "." {
            return Ok(self.current_dir());
        }
        if path == ".." {
            let current = self.current_dir();
            return self
                .find_in_dir(current, "..")?
                .ok_or(FsError::NotFound);
        }

        let mut current = if path.starts_with('/') {
            ROOT_INODE
        } else {
            self.current_dir()
        };
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let mut components = trimmed.split('/').peekable();
        while let Some(component) = components.next() {
            if component.is_empty() {
                return Err(FsError::InvalidPath);
            }
            let next = self
                .find_in_dir(current, component)?
                .ok_or(FsError::NotFound)?;
            if components.peek().is_some() && !self.read_inode(next)?.is_dir() {
                return Err(FsError::NotDirectory);
            }
            current = next;
        }
        Ok(current)
    }

    /// Split `path` into its parent directory's inode and the terminal
    /// component name. The parent must exist and be a directory.
    pub(crate) fn resolve_parent(&mut self, path: &str) -> FsResult<(i32, String)> {
        if path.is_empty() {
            return Err(FsError::InvalidPath);
        }
        let (parent_path, last) = match path.rfind('/') {
            None => (".", path),
            Some(0) => ("/", &path[1..]),
            Some(pos) => (&path[..pos], &path[pos + 1..]),
        };
        if last.is_empty() {
            return Err(FsError::InvalidPath);
        }
        let parent = self.find_inode_by_path(parent_path)?;
        if !self.read_inode(parent)?.is_dir() {
            return Err(FsError::NotDirectory);
        }
        Ok((parent, last.to_string()))
    }
}
