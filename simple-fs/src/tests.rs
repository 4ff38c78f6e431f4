use std::path::{Path, PathBuf};

use crate::config::{BLOCK_SIZE, DATA_AREA_START, DISK_BLOCKS, INODE_AREA_START, TOTAL_INODES};
use crate::error::FsError;
use crate::fd::OpenFlags;
use crate::fs::SimFileSystem;
use crate::layout::InodeKind;
use crate::MAX_FILE_SIZE;

/// Free counts right after `format`: every inode but root, every data block
/// but root's first directory block.
const FORMATTED_FREE_BLOCKS: i32 = (DISK_BLOCKS - DATA_AREA_START) as i32 - 1;
const FORMATTED_FREE_INODES: i32 = TOTAL_INODES as i32 - 1;

fn disk_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("simple-fs-{}-{name}.img", std::process::id()))
}

fn fresh_fs(name: &str) -> (SimFileSystem, PathBuf) {
    let path = disk_path(name);
    let _ = std::fs::remove_file(&path);
    let fs = SimFileSystem::new(&path).unwrap();
    (fs, path)
}

fn names(fs: &mut SimFileSystem, path: &str) -> Vec<String> {
    fs.ls(path)
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect()
}

/// The super-block counters must always equal the free bits in the bitmaps.
fn assert_counts_consistent(fs: &SimFileSystem) {
    let (free_blocks, free_inodes) = fs.free_counts();
    let (bitmap_blocks, bitmap_inodes) = fs.bitmap_free_counts();
    assert_eq!(free_blocks as usize, bitmap_blocks);
    assert_eq!(free_inodes as usize, bitmap_inodes);
}

#[test]
fn format_creates_only_root() {
    let (mut fs, _path) = fresh_fs("format-root");
    assert_eq!(names(&mut fs, "/"), vec![".", ".."]);
    let listing = fs.ls("/").unwrap();
    assert!(listing.iter().all(|e| e.kind == InodeKind::Directory));
    assert_eq!(
        fs.free_counts(),
        (FORMATTED_FREE_BLOCKS, FORMATTED_FREE_INODES)
    );
    assert_counts_consistent(&fs);
    assert_eq!(fs.cwd().unwrap(), "/");
}

#[test]
fn format_and_mount_are_idempotent() {
    let (mut fs, _path) = fresh_fs("idempotent");
    fs.mkdir("/a").unwrap();
    fs.mount().unwrap();
    fs.mount().unwrap();
    assert_eq!(names(&mut fs, "/"), vec![".", "..", "a"]);
    fs.format().unwrap();
    fs.format().unwrap();
    assert_eq!(names(&mut fs, "/"), vec![".", ".."]);
    assert_eq!(
        fs.free_counts(),
        (FORMATTED_FREE_BLOCKS, FORMATTED_FREE_INODES)
    );
}

#[test]
fn mkdir_nested_and_cwd() {
    let (mut fs, _path) = fresh_fs("nested-cwd");
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    fs.chdir("/a/b").unwrap();
    assert_eq!(fs.cwd().unwrap(), "/a/b");
    fs.chdir("..").unwrap();
    assert_eq!(fs.cwd().unwrap(), "/a");
    fs.chdir(".").unwrap();
    assert_eq!(fs.cwd().unwrap(), "/a");
    fs.chdir("/").unwrap();
    assert_eq!(fs.cwd().unwrap(), "/");
}

#[test]
fn relative_paths_resolve_from_the_current_directory() {
    let (mut fs, _path) = fresh_fs("relative");
    fs.mkdir("/a").unwrap();
    fs.chdir("/a").unwrap();
    fs.create("f").unwrap();
    assert_eq!(names(&mut fs, "/a"), vec![".", "..", "f"]);
    assert!(fs.find_inode_by_path("f").is_ok());
    fs.mkdir("/b").unwrap();
    assert!(fs.find_inode_by_path("../b").is_ok());
}

#[test]
fn write_then_read_roundtrip() {
    let (mut fs, _path) = fresh_fs("roundtrip");
    fs.create("/f").unwrap();
    let fd = fs.open("/f", OpenFlags::RDWR).unwrap();
    assert_eq!(fs.write(fd, b"abc").unwrap(), 3);
    fs.close(fd).unwrap();

    let fd = fs.open("/f", OpenFlags::RDONLY).unwrap();
    assert_eq!(fs.read(fd, 10).unwrap(), b"abc");
    assert_eq!(fs.read(fd, 10).unwrap(), b"");
    fs.close(fd).unwrap();
}

#[test]
fn echo_then_cat_shape() {
    let (mut fs, _path) = fresh_fs("echo-cat");
    fs.create("/f").unwrap();
    let fd = fs
        .open("/f", OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC)
        .unwrap();
    assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
    fs.close(fd).unwrap();

    let fd = fs.open("/f", OpenFlags::RDONLY).unwrap();
    assert_eq!(fs.read(fd, 4096).unwrap(), b"hello");
    fs.close(fd).unwrap();
}

#[test]
fn append_positions_writes_at_end_of_file() {
    let (mut fs, _path) = fresh_fs("append");
    let fd = fs
        .open("/log", OpenFlags::WRONLY | OpenFlags::CREAT)
        .unwrap();
    fs.write(fd, b"hello").unwrap();
    fs.close(fd).unwrap();

    let fd = fs
        .open("/log", OpenFlags::WRONLY | OpenFlags::APPEND)
        .unwrap();
    fs.write(fd, b" world").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("/log", OpenFlags::RDONLY).unwrap();
    assert_eq!(fs.read(fd, 64).unwrap(), b"hello world");
    fs.close(fd).unwrap();
}

#[test]
fn trunc_frees_blocks_and_zeroes_length() {
    let (mut fs, _path) = fresh_fs("trunc");
    let fd = fs
        .open("/f", OpenFlags::WRONLY | OpenFlags::CREAT)
        .unwrap();
    fs.write(fd, &[7u8; 3 * BLOCK_SIZE]).unwrap();
    fs.close(fd).unwrap();
    let (free_after_write, _) = fs.free_counts();
    assert_eq!(free_after_write, FORMATTED_FREE_BLOCKS - 3);

    let fd = fs
        .open("/f", OpenFlags::WRONLY | OpenFlags::TRUNC)
        .unwrap();
    let (free_after_trunc, _) = fs.free_counts();
    assert_eq!(free_after_trunc, FORMATTED_FREE_BLOCKS);
    fs.write(fd, b"x").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("/f", OpenFlags::RDONLY).unwrap();
    assert_eq!(fs.read(fd, 16).unwrap(), b"x");
    fs.close(fd).unwrap();
    assert_counts_consistent(&fs);
}

#[test]
fn overlay_write_in_the_middle() {
    let (mut fs, _path) = fresh_fs("overlay");
    let fd = fs
        .open("/f", OpenFlags::RDWR | OpenFlags::CREAT)
        .unwrap();
    fs.write(fd, b"abcdef").unwrap();
    fs.close(fd).unwrap();

    let id = fs.find_inode_by_path("/f").unwrap();
    assert_eq!(fs.write_at(id, 2, b"XY").unwrap(), 2);
    let mut buf = [0u8; 6];
    assert_eq!(fs.read_at(id, 0, &mut buf).unwrap(), 6);
    assert_eq!(&buf, b"abXYef");
}

#[test]
fn create_then_remove_restores_counts() {
    let (mut fs, _path) = fresh_fs("create-remove");
    let before = fs.free_counts();
    fs.create("/f").unwrap();
    let fd = fs.open("/f", OpenFlags::WRONLY).unwrap();
    fs.write(fd, &[1u8; 2 * BLOCK_SIZE]).unwrap();
    fs.close(fd).unwrap();
    assert_ne!(fs.free_counts(), before);

    fs.rm("/f", false, false).unwrap();
    assert_eq!(fs.free_counts(), before);
    assert_counts_consistent(&fs);
    assert!(matches!(fs.ls("/f"), Err(FsError::NotFound)));
}

#[test]
fn mkdir_then_rmdir_restores_counts() {
    let (mut fs, _path) = fresh_fs("mkdir-rmdir");
    let before = fs.free_counts();
    fs.mkdir("/d").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(fs.free_counts(), before);
    assert_counts_consistent(&fs);
}

#[test]
fn rmdir_refuses_non_empty_directories() {
    let (mut fs, _path) = fresh_fs("rmdir-nonempty");
    fs.mkdir("/d").unwrap();
    fs.create("/d/x").unwrap();
    let counts = fs.free_counts();
    assert!(matches!(fs.rmdir("/d"), Err(FsError::NotEmpty)));
    assert_eq!(fs.free_counts(), counts);
    assert_eq!(names(&mut fs, "/d"), vec![".", "..", "x"]);
}

#[test]
fn rm_needs_recursive_for_directories() {
    let (mut fs, _path) = fresh_fs("rm-recursive-flag");
    fs.mkdir("/d").unwrap();
    assert!(matches!(fs.rm("/d", false, false), Err(FsError::IsDirectory)));
}

#[test]
fn rm_recursive_removes_a_tree() {
    let (mut fs, _path) = fresh_fs("rm-tree");
    fs.mkdir("/d").unwrap();
    fs.create("/d/x").unwrap();
    fs.mkdir("/d/sub").unwrap();
    fs.create("/d/sub/y").unwrap();
    let fd = fs.open("/d/sub/y", OpenFlags::WRONLY).unwrap();
    fs.write(fd, &[9u8; BLOCK_SIZE + 1]).unwrap();
    fs.close(fd).unwrap();

    fs.rm("/d", true, true).unwrap();
    assert!(matches!(fs.ls("/d"), Err(FsError::NotFound)));
    assert_eq!(
        fs.free_counts(),
        (FORMATTED_FREE_BLOCKS, FORMATTED_FREE_INODES)
    );
    assert_counts_consistent(&fs);
}

#[test]
fn rm_root_always_fails() {
    let (mut fs, _path) = fresh_fs("rm-root");
    assert!(matches!(fs.rm("/", true, true), Err(FsError::InvalidPath)));
    assert!(matches!(fs.rm("/", false, false), Err(FsError::InvalidPath)));
}

#[test]
fn rm_force_absorbs_missing_targets() {
    let (mut fs, _path) = fresh_fs("rm-force");
    assert!(matches!(fs.rm("/nope", false, false), Err(FsError::NotFound)));
    fs.rm("/nope", false, true).unwrap();
    fs.rm("", false, true).unwrap();
    assert!(matches!(fs.rm("", false, false), Err(FsError::InvalidPath)));
}

#[test]
fn directories_cannot_be_opened_as_files() {
    let (mut fs, _path) = fresh_fs("open-dir");
    fs.mkdir("/d").unwrap();
    assert!(matches!(
        fs.open("/d", OpenFlags::RDONLY),
        Err(FsError::IsDirectory)
    ));
}

#[test]
fn descriptor_state_machine() {
    let (mut fs, _path) = fresh_fs("fd-states");
    fs.create("/f").unwrap();
    let first = fs.open("/f", OpenFlags::RDWR).unwrap();
    let second = fs.open("/f", OpenFlags::RDONLY).unwrap();
    assert_eq!((first, second), (0, 1));

    fs.close(first).unwrap();
    assert!(matches!(fs.close(first), Err(FsError::BadFd)));
    assert!(matches!(fs.read(first, 1), Err(FsError::BadFd)));
    assert!(matches!(fs.read(99, 1), Err(FsError::BadFd)));

    // lowest free slot is reused before the table grows
    assert_eq!(fs.open("/f", OpenFlags::RDONLY).unwrap(), 0);
}

#[test]
fn access_bits_gate_read_and_write() {
    let (mut fs, _path) = fresh_fs("access-bits");
    fs.create("/f").unwrap();
    let writer = fs.open("/f", OpenFlags::WRONLY).unwrap();
    assert!(matches!(fs.read(writer, 1), Err(FsError::BadFlags)));
    let reader = fs.open("/f", OpenFlags::RDONLY).unwrap();
    assert!(matches!(fs.write(reader, b"x"), Err(FsError::BadFlags)));
    assert!(matches!(
        fs.open("/f", OpenFlags::CREAT),
        Err(FsError::BadFlags)
    ));
}

#[test]
fn open_creat_creates_missing_files_only_when_asked() {
    let (mut fs, _path) = fresh_fs("open-creat");
    assert!(matches!(
        fs.open("/f", OpenFlags::RDWR),
        Err(FsError::NotFound)
    ));
    let fd = fs
        .open("/f", OpenFlags::RDWR | OpenFlags::CREAT)
        .unwrap();
    fs.close(fd).unwrap();
    assert_eq!(names(&mut fs, "/"), vec![".", "..", "f"]);
}

#[test]
fn stale_descriptor_surfaces_not_found() {
    let (mut fs, _path) = fresh_fs("stale-fd");
    fs.create("/f").unwrap();
    let fd = fs.open("/f", OpenFlags::RDWR).unwrap();
    fs.rm("/f", false, false).unwrap();
    assert!(matches!(fs.write(fd, b"x"), Err(FsError::NotFound)));
    assert!(matches!(fs.read(fd, 1), Err(FsError::NotFound)));
}

#[test]
fn direct_table_bounds_file_size() {
    let (mut fs, _path) = fresh_fs("direct-limit");
    let before = fs.free_counts();
    let fd = fs
        .open("/big", OpenFlags::RDWR | OpenFlags::CREAT)
        .unwrap();
    let payload = vec![b'A'; MAX_FILE_SIZE];
    assert_eq!(fs.write(fd, &payload).unwrap(), MAX_FILE_SIZE);
    assert!(matches!(fs.write(fd, b"B"), Err(FsError::NoSpace)));
    fs.close(fd).unwrap();

    let id = fs.find_inode_by_path("/big").unwrap();
    assert_eq!(fs.read_inode(id).unwrap().size as usize, MAX_FILE_SIZE);
    let (free_blocks, free_inodes) = fs.free_counts();
    assert_eq!(free_blocks, before.0 - 10);
    assert_eq!(free_inodes, before.1 - 1);
    assert_counts_consistent(&fs);

    // the last addressable byte is writable, one past it is not
    assert_eq!(fs.write_at(id, MAX_FILE_SIZE - 1, b"z").unwrap(), 1);
    assert!(matches!(
        fs.write_at(id, MAX_FILE_SIZE, b"z"),
        Err(FsError::NoSpace)
    ));
}

#[test]
fn partial_write_keeps_the_persisted_prefix() {
    let (mut fs, _path) = fresh_fs("partial-write");
    fs.create("/f").unwrap();
    let id = fs.find_inode_by_path("/f").unwrap();
    assert_eq!(fs.write_at(id, MAX_FILE_SIZE - 2, b"xyz").unwrap(), 2);
    assert_eq!(fs.read_inode(id).unwrap().size as usize, MAX_FILE_SIZE);
    let mut buf = [0u8; 2];
    assert_eq!(fs.read_at(id, MAX_FILE_SIZE - 2, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"xy");
    assert_counts_consistent(&fs);
}

#[test]
fn tombstoned_slots_are_reused_in_order() {
    let (mut fs, _path) = fresh_fs("tombstone-reuse");
    fs.create("/a").unwrap();
    fs.create("/b").unwrap();
    fs.rm("/a", false, false).unwrap();
    fs.create("/c").unwrap();
    assert_eq!(names(&mut fs, "/"), vec![".", "..", "c", "b"]);
}

#[test]
fn directory_grows_until_the_direct_table_is_full() {
    let (mut fs, _path) = fresh_fs("dir-full");
    fs.mkdir("/d").unwrap();
    // 10 blocks x 4 slots, minus "." and ".."
    for index in 0..38 {
        fs.create(&format!("/d/f{index}")).unwrap();
    }
    let counts = fs.free_counts();
    assert!(matches!(fs.create("/d/straw"), Err(FsError::DirFull)));
    // the failed create must not leak the inode it allocated
    assert_eq!(fs.free_counts(), counts);
    assert_counts_consistent(&fs);
}

#[test]
fn duplicate_names_are_rejected() {
    let (mut fs, _path) = fresh_fs("duplicates");
    fs.create("/f").unwrap();
    assert!(matches!(fs.create("/f"), Err(FsError::AlreadyExists)));
    assert!(matches!(fs.mkdir("/f"), Err(FsError::AlreadyExists)));
}

#[test]
fn path_edge_cases() {
    let (mut fs, _path) = fresh_fs("path-edges");
    fs.create("/f").unwrap();
    assert!(matches!(fs.ls("/f"), Err(FsError::NotDirectory)));
    assert!(matches!(fs.chdir("/f"), Err(FsError::NotDirectory)));
    assert!(matches!(
        fs.create("/missing/child"),
        Err(FsError::NotFound)
    ));
    assert!(matches!(fs.create("/f/child"), Err(FsError::NotDirectory)));
    assert!(matches!(fs.create("/a//b"), Err(FsError::InvalidPath)));
    assert!(matches!(fs.mkdir("/"), Err(FsError::InvalidPath)));
    let long = format!("/{}", "n".repeat(300));
    assert!(matches!(fs.create(&long), Err(FsError::InvalidPath)));
}

#[test]
fn remount_preserves_the_whole_tree() {
    let (mut fs, path) = fresh_fs("remount");
    fs.mkdir("/a").unwrap();
    fs.create("/a/f").unwrap();
    let fd = fs.open("/a/f", OpenFlags::WRONLY).unwrap();
    fs.write(fd, b"persistent data").unwrap();
    fs.close(fd).unwrap();
    fs.chdir("/a").unwrap();
    let counts = fs.free_counts();
    drop(fs);

    let mut fs = SimFileSystem::new(&path).unwrap();
    assert_eq!(fs.cwd().unwrap(), "/");
    assert_eq!(names(&mut fs, "/a"), vec![".", "..", "f"]);
    let fd = fs.open("/a/f", OpenFlags::RDONLY).unwrap();
    assert_eq!(fs.read(fd, 64).unwrap(), b"persistent data");
    fs.close(fd).unwrap();
    assert_eq!(fs.free_counts(), counts);
    assert_counts_consistent(&fs);
}

/// A netting sequence of operations must leave the disk byte-identical to
/// the post-format image, apart from the root inode's refreshed
/// atime/mtime.
#[test]
fn net_empty_sequence_restores_the_format_image() {
    let (fs, path) = fresh_fs("net-empty");
    drop(fs);
    let formatted = masked_image(&path);

    let mut fs = SimFileSystem::new(&path).unwrap();
    fs.mkdir("/a").unwrap();
    fs.create("/a/f").unwrap();
    let fd = fs.open("/a/f", OpenFlags::WRONLY).unwrap();
    fs.write(fd, &[42u8; 2 * BLOCK_SIZE + 17]).unwrap();
    fs.close(fd).unwrap();
    fs.create("/top").unwrap();
    fs.rm("/top", false, false).unwrap();
    fs.rm("/a", true, false).unwrap();
    drop(fs);

    assert_eq!(masked_image(&path), formatted);
}

fn masked_image(path: &Path) -> Vec<u8> {
    let mut image = std::fs::read(path).unwrap();
    let root_inode = INODE_AREA_START * BLOCK_SIZE;
    // atime and mtime of the root inode move legitimately
    image[root_inode + 16..root_inode + 32].fill(0);
    image
}
