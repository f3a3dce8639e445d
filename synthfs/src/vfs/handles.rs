//! Open file handles and the content materialized for each of them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;

use crate::error::{Error, Result};

pub type HandleId = u64;

#[derive(Debug, Default)]
struct HandleState {
    next: HandleId,
    contents: HashMap<HandleId, Bytes>,
}

impl HandleState {
    /// Probe upward from the counter for an id nobody holds.
    fn allocate(&mut self) -> HandleId {
        let mut fh = self.next;
        while self.contents.contains_key(&fh) {
            fh = fh.wrapping_add(1);
        }
        self.next = fh.wrapping_add(1);
        fh
    }
}

/// Handle id -> content map behind a single lock.
///
/// Content is written once at open and only read afterwards.
#[derive(Debug, Default)]
pub struct HandleTable {
    state: Mutex<HandleState>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HandleState> {
        // The state is consistent between statements, so a panic elsewhere
        // does not leave it half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocates a handle and stores `content` under it in one critical
    /// section.
    pub fn open(&self, content: impl Into<Bytes>) -> HandleId {
        let content = content.into();
        self.open_with(|| content)
    }

    /// Like `open`, but `make` runs inside the same critical section, so
    /// handles are issued in the order their content was produced.
    ///
    /// `make` must not call back into this table; the lock is not reentrant.
    pub fn open_with<F>(&self, make: F) -> HandleId
    where
        F: FnOnce() -> Bytes,
    {
        let mut state = self.state();
        let content = make();
        let fh = state.allocate();
        state.contents.insert(fh, content);
        fh
    }

    pub fn get(&self, fh: HandleId) -> Option<Bytes> {
        self.state().contents.get(&fh).cloned()
    }

    /// Copies content of `fh` from `offset` into `dst`. Reading at or past the
    /// end copies nothing and is not an error.
    pub fn read(&self, fh: HandleId, offset: u64, dst: &mut [u8]) -> Result<usize> {
        let content = self.get(fh).ok_or(Error::UnknownHandle(fh))?;
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= content.len() {
            return Ok(0);
        }
        let n = dst.len().min(content.len() - start);
        dst[..n].copy_from_slice(&content[start..start + n]);
        Ok(n)
    }

    /// Returns whether `fh` was open.
    pub fn release(&self, fh: HandleId) -> bool {
        self.state().contents.remove(&fh).is_some()
    }

    pub fn len(&self) -> usize {
        self.state().contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
