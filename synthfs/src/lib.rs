//! synthfs: a read-only, in-memory namespace served over FUSE.
//!
//! - `meta`: the fixed inode table and name resolution
//! - `vfs`: handle table, content generators and the request handlers
//! - `fuse`: binding to rfuse3 and mount helpers
pub mod clock;
pub mod config;
pub mod error;
pub mod fuse;
pub mod meta;
pub mod vfs;

pub use error::{Error, ErrorKind, Result};
