//! VFS layer
//!
//! Responsibilities:
//! - Answer the transport's requests against the inode table.
//! - Manage file handles and the content frozen into them at open.
//!
//! Submodules:
//! - `handles`: handle allocation and per-handle content
//! - `content`: which inodes can be opened and how their bytes are generated
//! - `dirent`: kernel directory entry encoding
//! - `fs`: the request handlers
pub mod content;
pub mod dirent;
pub mod fs;
pub mod handles;
