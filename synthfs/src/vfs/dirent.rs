//! `struct fuse_dirent` encoding.
//!
//! ```text
//! u64 ino | u64 off | u32 namelen | u32 type | name | zero padding to 8
//! ```

use crate::meta::{Dirent, FileKind};

const HEADER_LEN: usize = 24;
const ALIGN: usize = 8;

pub const DT_DIR: u32 = libc::DT_DIR as u32;
pub const DT_REG: u32 = libc::DT_REG as u32;

pub fn dirent_type(kind: FileKind) -> u32 {
    match kind {
        FileKind::Directory => DT_DIR,
        FileKind::File => DT_REG,
    }
}

/// Encoded size of an entry with a `name_len`-byte name.
pub fn dirent_size(name_len: usize) -> usize {
    (HEADER_LEN + name_len).next_multiple_of(ALIGN)
}

/// Writes `e` at the start of `dst` and returns the bytes used, or 0 if the
/// whole entry does not fit. Never writes a partial entry.
pub fn write_dirent(dst: &mut [u8], e: &Dirent) -> usize {
    let name = e.name.as_bytes();
    let size = dirent_size(name.len());
    if size > dst.len() {
        return 0;
    }
    dst[0..8].copy_from_slice(&e.ino.to_ne_bytes());
    dst[8..16].copy_from_slice(&e.offset.to_ne_bytes());
    dst[16..20].copy_from_slice(&(name.len() as u32).to_ne_bytes());
    dst[20..24].copy_from_slice(&dirent_type(e.kind).to_ne_bytes());
    dst[HEADER_LEN..HEADER_LEN + name.len()].copy_from_slice(name);
    dst[HEADER_LEN + name.len()..size].fill(0);
    size
}

/// Decodes one entry from the start of `src`, returning it with its encoded
/// size. `None` if `src` is truncated or the type is unknown.
pub fn read_dirent(src: &[u8]) -> Option<(Dirent, usize)> {
    let header = src.get(..HEADER_LEN)?;
    let ino = u64::from_ne_bytes(header[0..8].try_into().ok()?);
    let offset = u64::from_ne_bytes(header[8..16].try_into().ok()?);
    let name_len = u32::from_ne_bytes(header[16..20].try_into().ok()?) as usize;
    let kind = match u32::from_ne_bytes(header[20..24].try_into().ok()?) {
        DT_DIR => FileKind::Directory,
        DT_REG => FileKind::File,
        _ => return None,
    };
    let size = dirent_size(name_len);
    if src.len() < size {
        return None;
    }
    let name = String::from_utf8_lossy(&src[HEADER_LEN..HEADER_LEN + name_len]).into_owned();
    Some((
        Dirent {
            offset,
            ino,
            name,
            kind,
        },
        size,
    ))
}
