use thiserror::Error;

use crate::meta::InodeId;
use crate::vfs::handles::HandleId;

/// Failures reported to the transport. Each maps onto one errno.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("inode {0} not found")]
    InodeNotFound(InodeId),

    #[error("no entry named {name:?} under inode {parent}")]
    NameNotFound { parent: InodeId, name: String },

    #[error("inode {0} is not a directory")]
    NotADirectory(InodeId),

    #[error("offset {offset} is past the {len} entries of inode {ino}")]
    OffsetOutOfRange { ino: InodeId, offset: u64, len: usize },

    #[error("inode {0} cannot be opened as a file")]
    NotOpenable(InodeId),

    #[error("unknown file handle {0}")]
    UnknownHandle(HandleId),

    #[error("invalid inode table: {0}")]
    InvalidTable(String),
}

/// Coarse failure kind, the only thing the transport needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Io,
    InvalidArgument,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InodeNotFound(_) | Error::NameNotFound { .. } => ErrorKind::NotFound,
            Error::NotADirectory(_) | Error::OffsetOutOfRange { .. } => ErrorKind::Io,
            Error::NotOpenable(_) | Error::UnknownHandle(_) | Error::InvalidTable(_) => {
                ErrorKind::InvalidArgument
            }
        }
    }

    pub fn errno(&self) -> libc::c_int {
        match self.kind() {
            ErrorKind::NotFound => libc::ENOENT,
            ErrorKind::Io => libc::EIO,
            ErrorKind::InvalidArgument => libc::EINVAL,
        }
    }
}

impl From<Error> for rfuse3::Errno {
    fn from(e: Error) -> Self {
        e.errno().into()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
