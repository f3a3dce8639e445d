//! FUSE binding.
//!
//! Implements `rfuse3::raw::Filesystem` for `SynthFs` so the kernel can drive
//! it. Each callback forwards to the matching handler and turns its typed
//! failure into an errno. Operations the namespace does not support keep the
//! trait's default (ENOSYS) reply.
pub mod mount;

use std::ffi::{OsStr, OsString};
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use rfuse3::raw::reply::{
    DirectoryEntry, DirectoryEntryPlus, FileAttr, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEntry, ReplyInit, ReplyOpen, ReplyStatFs,
};
use rfuse3::raw::{Filesystem, Request};
use rfuse3::{FileType as FuseFileType, Result as FuseResult, Timestamp};
use tracing::{debug, warn};

use crate::error::{Error, ErrorKind};
use crate::meta::{FileKind, InodeAttributes, InodeId};
use crate::vfs::fs::SynthFs;

const TTL: Duration = Duration::from_secs(1);
const BLOCK_SIZE: u32 = 4096;
const NAME_MAX: u32 = 255;
const MAX_WRITE: u32 = 128 * 1024;

/// `FOPEN_DIRECT_IO` from the FUSE ABI.
pub const FOPEN_DIRECT_IO: u32 = 1 << 0;

fn to_errno(op: &'static str, e: Error) -> rfuse3::Errno {
    // Misses are routine (shells probe for files); anything else is worth a look.
    if e.kind() == ErrorKind::NotFound {
        debug!(op, error = %e, "request failed");
    } else {
        warn!(op, error = %e, "request failed");
    }
    e.into()
}

fn kind_to_fuse(k: FileKind) -> FuseFileType {
    match k {
        FileKind::Directory => FuseFileType::Directory,
        FileKind::File => FuseFileType::RegularFile,
    }
}

fn to_fuse_attr(ino: InodeId, a: &InodeAttributes, req: &Request) -> FileAttr {
    FileAttr {
        ino,
        size: a.size,
        blocks: a.size.div_ceil(512),
        atime: Timestamp::from(a.atime),
        mtime: Timestamp::from(a.mtime),
        ctime: Timestamp::from(a.mtime),
        #[cfg(target_os = "macos")]
        crtime: Timestamp::from(a.crtime),
        kind: kind_to_fuse(a.kind),
        perm: a.perm,
        nlink: a.nlink,
        uid: req.uid,
        gid: req.gid,
        rdev: 0,
        #[cfg(target_os = "macos")]
        flags: 0,
        blksize: BLOCK_SIZE,
    }
}

impl Filesystem for SynthFs {
    type DirEntryStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntry>> + Send + 'a>>
    where
        Self: 'a;

    // readdirplus is not offered; the type is still required by the trait.
    type DirEntryPlusStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntryPlus>> + Send + 'a>>
    where
        Self: 'a;

    async fn init(&self, _req: Request) -> FuseResult<ReplyInit> {
        let max_write = NonZeroU32::new(MAX_WRITE).unwrap_or(NonZeroU32::MIN);
        Ok(ReplyInit { max_write })
    }

    async fn destroy(&self, _req: Request) {}

    async fn lookup(&self, req: Request, parent: u64, name: &OsStr) -> FuseResult<ReplyEntry> {
        // Names that are not UTF-8 cannot match any entry.
        let Some(name) = name.to_str() else {
            return Err(libc::ENOENT.into());
        };
        let entry = self
            .look_up_inode(parent, name)
            .map_err(|e| to_errno("lookup", e))?;
        Ok(ReplyEntry {
            ttl: TTL,
            attr: to_fuse_attr(entry.child, &entry.attributes, &req),
            generation: 0,
        })
    }

    async fn forget(&self, _req: Request, _inode: u64, _nlookup: u64) {}

    async fn getattr(
        &self,
        req: Request,
        ino: u64,
        _fh: Option<u64>,
        _flags: u32,
    ) -> FuseResult<ReplyAttr> {
        let attr = self
            .get_inode_attributes(ino)
            .map_err(|e| to_errno("getattr", e))?;
        Ok(ReplyAttr {
            ttl: TTL,
            attr: to_fuse_attr(ino, &attr, &req),
        })
    }

    async fn open(&self, _req: Request, ino: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        let opened = self.open_file(ino).map_err(|e| to_errno("open", e))?;
        let flags = if opened.direct_io { FOPEN_DIRECT_IO } else { 0 };
        Ok(ReplyOpen {
            fh: opened.handle,
            flags,
        })
    }

    async fn read(
        &self,
        _req: Request,
        _ino: u64,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> FuseResult<ReplyData> {
        let mut buf = vec![0u8; size as usize];
        let n = self
            .read_file(fh, offset, &mut buf)
            .map_err(|e| to_errno("read", e))?;
        buf.truncate(n);
        Ok(ReplyData {
            data: Bytes::from(buf),
        })
    }

    async fn release(
        &self,
        _req: Request,
        _inode: u64,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> FuseResult<()> {
        self.release_file(fh).map_err(|e| to_errno("release", e))
    }

    async fn flush(&self, _req: Request, _inode: u64, _fh: u64, _lock_owner: u64) -> FuseResult<()> {
        Ok(())
    }

    async fn opendir(&self, _req: Request, ino: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        self.open_directory(ino)
            .map_err(|e| to_errno("opendir", e))?;
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: i64,
    ) -> FuseResult<ReplyDirectory<Self::DirEntryStream<'a>>> {
        let entries = self
            .directory_entries(ino, offset.max(0) as u64)
            .map_err(|e| to_errno("readdir", e))?;
        let stream = stream::iter(entries.iter().map(|e| -> FuseResult<DirectoryEntry> {
            Ok(DirectoryEntry {
                inode: e.ino,
                kind: kind_to_fuse(e.kind),
                name: OsString::from(&e.name),
                offset: e.offset as i64,
            })
        }));
        let boxed: Self::DirEntryStream<'a> = Box::pin(stream);
        Ok(ReplyDirectory { entries: boxed })
    }

    async fn releasedir(&self, _req: Request, _inode: u64, _fh: u64, _flags: u32) -> FuseResult<()> {
        Ok(())
    }

    async fn statfs(&self, _req: Request, _ino: u64) -> FuseResult<ReplyStatFs> {
        let stats = self.stat_fs().map_err(|e| to_errno("statfs", e))?;
        Ok(ReplyStatFs {
            blocks: stats.blocks,
            bfree: stats.blocks_free,
            bavail: stats.blocks_free,
            files: stats.inodes,
            ffree: stats.inodes_free,
            bsize: BLOCK_SIZE,
            namelen: NAME_MAX,
            frsize: BLOCK_SIZE,
        })
    }
}
