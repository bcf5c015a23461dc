//! Volatile map-backed page store.
//!
//! Backs memory-only trees and the test suite. Handles are issued
//! sequentially starting at 1, so handle 0 keeps its "absent" meaning for
//! free. The accounting accessors exist for tests that assert blobs are
//! released on the paths that must release them; they are not part of the
//! [`PageStore`] contract.

use eyre::Result;
use hashbrown::HashMap;

use super::PageStore;
use crate::error::TreeError;

/// In-memory [`PageStore`] backed by a handle-to-blob map.
#[derive(Debug, Default)]
pub struct MemStore {
    next: u64,
    blobs: HashMap<u64, Box<[u8]>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live blobs.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// Total bytes held across all live blobs.
    pub fn byte_count(&self) -> usize {
        self.blobs.values().map(|b| b.len()).sum()
    }
}

impl PageStore for MemStore {
    fn alloc(&mut self, bytes: &[u8]) -> Result<u64> {
        self.next += 1;
        self.blobs.insert(self.next, bytes.into());
        Ok(self.next)
    }

    fn get(&self, handle: u64) -> Result<Vec<u8>> {
        match self.blobs.get(&handle) {
            Some(blob) => Ok(blob.to_vec()),
            None => Err(TreeError::UnknownHandle { handle }.into()),
        }
    }

    fn realloc(&mut self, handle: u64, bytes: &[u8]) -> Result<()> {
        match self.blobs.get_mut(&handle) {
            Some(blob) => {
                *blob = bytes.into();
                Ok(())
            }
            None => Err(TreeError::UnknownHandle { handle }.into()),
        }
    }

    fn free(&mut self, handle: u64) -> Result<()> {
        match self.blobs.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(TreeError::UnknownHandle { handle }.into()),
        }
    }
}
