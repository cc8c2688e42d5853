// src/storage/memory.rs
//! In-memory content-addressed store.
//!
//! Keeps blocks in a hashmap keyed by their [`ContentId`]. Suitable for
//! tests, local development and single-process deployments; data is lost
//! when the process exits.

use super::{ContentStore, StorageError};
use crate::models::ContentId;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory block storage.
///
/// - Safe for concurrent `put`/`get` from any number of tasks
/// - Identical bytes map to one entry; re-`put` is a no-op
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<ContentId, Arc<[u8]>>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        MemoryStore {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.blocks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks whether an object exists without copying it out.
    pub fn contains(&self, cid: &ContentId) -> bool {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(cid)
    }

    /// Overwrites the bytes under `cid` without re-addressing them, so tests
    /// can simulate a corrupted or malicious backend.
    #[cfg(test)]
    pub(crate) fn replace_unchecked(&self, cid: ContentId, bytes: Vec<u8>) {
        self.blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cid, bytes.into());
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId, StorageError> {
        let cid = ContentId::for_bytes(bytes);
        let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        if blocks.contains_key(&cid) {
            debug!("{cid} already stored");
        } else {
            debug!("storing {} bytes under {cid}", bytes.len());
            blocks.insert(cid, Arc::from(bytes));
        }
        Ok(cid)
    }

    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>, StorageError> {
        let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
        blocks
            .get(cid)
            .map(|bytes| bytes.to_vec())
            .ok_or(StorageError::NotFound(*cid))
    }
}
