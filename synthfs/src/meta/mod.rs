//! Inode metadata: attributes, directory entries and the fixed inode table.
//!
//! The table is built once at startup and never mutated afterwards, so it is
//! shared between concurrent requests without locking.

mod table;

pub use table::{InodeTable, InodeTableBuilder};

use std::time::{SystemTime, UNIX_EPOCH};

pub type InodeId = u64;

/// The kernel always addresses the mount root as inode 1.
pub const ROOT_INODE: InodeId = 1;

// Well-known inodes of the standard namespace.
pub const HELLO_INODE: InodeId = 2;
pub const DIR_INODE: InodeId = 3;
pub const WORLD_INODE: InodeId = 4;
pub const AGE_INODE: InodeId = 5;
pub const WEEKDAY_INODE: InodeId = 6;

pub const HELLO_WORLD: &str = "Hello, world!";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    File,
    Directory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InodeAttributes {
    /// Zero means the size is not known ahead of open.
    pub size: u64,
    pub nlink: u32,
    pub perm: u16,
    pub kind: FileKind,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub crtime: SystemTime,
}

impl InodeAttributes {
    pub fn dir(perm: u16) -> Self {
        Self::new(FileKind::Directory, perm, 0)
    }

    pub fn file(perm: u16, size: u64) -> Self {
        Self::new(FileKind::File, perm, size)
    }

    fn new(kind: FileKind, perm: u16, size: u64) -> Self {
        Self {
            size,
            nlink: 1,
            perm,
            kind,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Nothing tracks real times here; every report says "now".
    pub fn stamp(&mut self, now: SystemTime) {
        self.atime = now;
        self.mtime = now;
        self.crtime = now;
    }
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dirent {
    /// Offset at which a listing resumes after this entry.
    pub offset: u64,
    pub ino: InodeId,
    pub name: String,
    pub kind: FileKind,
}

#[derive(Clone, Debug)]
pub struct InodeInfo {
    pub attributes: InodeAttributes,
    /// Empty for files.
    pub children: Vec<Dirent>,
}

impl InodeInfo {
    pub fn is_dir(&self) -> bool {
        self.attributes.is_dir()
    }
}
