// src/storage/mod.rs
//! Content-addressed storage for certificates.
//!
//! The storage network is an external collaborator reached through the
//! [`ContentStore`] trait. Two backends are provided:
//! - [`IpfsStorage`] talks to an IPFS node over its HTTP API
//! - [`MemoryStore`] keeps blocks in process, for tests and local runs
//!
//! [`RetryingStore`] wraps either one with bounded exponential backoff on
//! transient failures and an overall deadline per call.

pub mod ipfs_client;
pub mod memory;

pub use ipfs_client::IpfsStorage;
pub use memory::MemoryStore;

use crate::models::ContentId;
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;

/// Error type for storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Backend or network failure. Retryable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Nothing is stored under the identifier. Not retried.
    #[error("no object stored under {0}")]
    NotFound(ContentId),

    /// The call did not finish before its deadline.
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend addressed the bytes differently than expected.
    #[error("storage returned CID {actual}, expected {expected}")]
    CidMismatch { expected: ContentId, actual: String },

    /// The backend answered with an identifier that is not a CIDv1 raw
    /// sha2-256 CID.
    #[error("storage returned an unrecognised CID: {0}")]
    InvalidCid(String),
}

impl StorageError {
    /// Whether a retry could succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// A content-addressed block store.
///
/// Implementations must be safe for concurrent use. `put` is idempotent:
/// storing identical bytes again returns the same identifier and leaves a
/// single object behind.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return their identifier.
    async fn put(&self, bytes: &[u8]) -> Result<ContentId, StorageError>;

    /// Fetch the bytes stored under `cid`.
    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>, StorageError>;
}

#[async_trait]
impl<S: ContentStore + ?Sized> ContentStore for std::sync::Arc<S> {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId, StorageError> {
        (**self).put(bytes).await
    }

    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>, StorageError> {
        (**self).get(cid).await
    }
}

/// Retry and deadline settings for store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Deadline for the whole call, retries included.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Store wrapper adding retries on [`StorageError::Unavailable`] and a
/// deadline on every call.
///
/// Dropping a returned future cancels the call. Because objects are only
/// reachable by the digest of their complete bytes, an abandoned `put`
/// never leaves a partial object behind.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ContentStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        RetryingStore { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn with_retries<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, StorageError>> + Send,
    {
        let attempts = self.policy.max_attempts.max(1);
        let retried = async {
            let mut attempt = 1;
            loop {
                match call().await {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_retryable() && attempt < attempts => {
                        let delay = self.policy.delay_after(attempt);
                        warn!("{op} attempt {attempt}/{attempts} failed: {e}; retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => {
                        debug!("{op} failed after {attempt} attempt(s): {e}");
                        return Err(e);
                    }
                }
            }
        };

        tokio::time::timeout(self.policy.timeout, retried)
            .await
            .unwrap_or(Err(StorageError::Timeout(self.policy.timeout)))
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for RetryingStore<S> {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId, StorageError> {
        self.with_retries("put", || self.inner.put(bytes)).await
    }

    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>, StorageError> {
        self.with_retries("get", || self.inner.get(cid)).await
    }
}
