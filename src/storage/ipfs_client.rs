// src/storage/ipfs_client.rs
//! IPFS storage client for certificate blocks.
//!
//! Provides thread-safe interaction with an IPFS node's HTTP API:
//! - Blocks are added with CIDv1, raw leaves and sha2-256, so a certificate
//!   (well under one chunk) is stored as a single raw block whose CID equals
//!   [`ContentId::for_bytes`] of its bytes
//! - Retrieval streams the block back with `cat`
//! - Dropping a call's future (caller cancel or retry deadline) aborts the
//!   HTTP request on the node thread
//!
//! # Security Considerations
//! - All stored data is public by default (IPFS is a public network)
//! - Certificates carry no secrets, only signed claims

use super::{ContentStore, StorageError};
use crate::models::ContentId;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use ipfs_api_backend_hyper::request::Add;
use ipfs_api_backend_hyper::{IpfsApi, IpfsClient, TryFromUri};
use log::debug;
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task;

/// Thread-safe IPFS client wrapper.
///
/// Uses `ipfs-api-backend-hyper` under the hood. The hyper client's futures
/// are not `Send`, so each call runs on a blocking thread with its own
/// current-thread runtime; the returned futures are `Send` and can be shared
/// across tasks.
#[derive(Clone)]
pub struct IpfsStorage {
    /// Shared IPFS client instance (thread-safe via Arc)
    client: Arc<IpfsClient>,
    /// API endpoint, kept for log messages
    endpoint: String,
}

impl IpfsStorage {
    /// Creates a client for the local node at `http://localhost:5001`.
    pub fn new() -> Self {
        IpfsStorage {
            client: Arc::new(IpfsClient::default()),
            endpoint: "http://localhost:5001".to_string(),
        }
    }

    /// Creates a client for the node API at `url`.
    ///
    /// # Errors
    /// [`StorageError::Unavailable`] if the URL is not a valid URI.
    pub fn with_url(url: &str) -> Result<Self, StorageError> {
        let client = IpfsClient::from_str(url)
            .map_err(|e| StorageError::Unavailable(format!("invalid IPFS API url {url}: {e}")))?;
        Ok(IpfsStorage {
            client: Arc::new(client),
            endpoint: url.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Maps a client error onto the storage taxonomy. The node reports
    /// missing blocks through its error message; everything else is treated
    /// as a transient backend failure.
    fn classify(cid: Option<&ContentId>, error: impl std::fmt::Display) -> StorageError {
        let message = error.to_string();
        let lowered = message.to_lowercase();
        match cid {
            Some(cid) if lowered.contains("not found") || lowered.contains("no link named") => {
                StorageError::NotFound(*cid)
            }
            _ => StorageError::Unavailable(message),
        }
    }

    /// Runs one node request on a blocking thread with a private runtime.
    ///
    /// The returned future owns the sending half of a oneshot channel. If it
    /// is dropped before the request finishes, the receiver fires and the
    /// request future is dropped on the node thread, closing its connection.
    async fn run_on_node<T, F, Fut>(&self, call: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<IpfsClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let client = self.client.clone();
        let (_cancel, cancelled) = oneshot::channel::<()>();

        task::spawn_blocking(move || -> Result<T, StorageError> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            rt.block_on(async move {
                tokio::select! {
                    result = call(client) => result,
                    _ = cancelled => Err(StorageError::Unavailable("request cancelled".to_string())),
                }
            })
        })
        .await
        .map_err(|join_err| StorageError::Unavailable(join_err.to_string()))?
    }
}

impl Default for IpfsStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for IpfsStorage {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId, StorageError> {
        let data_owned = bytes.to_vec();
        debug!("adding {} bytes to IPFS at {}", data_owned.len(), self.endpoint);

        let hash = self
            .run_on_node(move |client| async move {
                let options = Add {
                    cid_version: Some(1),
                    raw_leaves: Some(true),
                    hash: Some("sha2-256"),
                    pin: Some(true),
                    ..Default::default()
                };
                client
                    .add_with_options(Cursor::new(data_owned), options)
                    .await
                    .map(|res| res.hash)
                    .map_err(|e| Self::classify(None, e))
            })
            .await?;

        hash.parse::<ContentId>()
            .map_err(|_| StorageError::InvalidCid(hash))
    }

    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>, StorageError> {
        let target = *cid;
        debug!("fetching {cid} from IPFS at {}", self.endpoint);

        let data = self
            .run_on_node(move |client| async move {
                client
                    .cat(&target.to_string())
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await
                    .map_err(|e| Self::classify(Some(&target), e))
            })
            .await?;

        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::fast_policy;
    use crate::storage::RetryingStore;
    use mockito::{mock, Matcher};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_put_parses_node_cid() {
        let cid = ContentId::for_bytes(b"certificate bytes");
        let _m = mock("POST", Matcher::Regex(r"^/api/v0/add".to_string()))
            .match_body(Matcher::Regex("certificate bytes".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"Name":"{cid}","Hash":"{cid}","Size":"17"}}"#))
            .create();

        let store = IpfsStorage::with_url(&mockito::server_url()).unwrap();
        assert_eq!(store.put(b"certificate bytes").await.unwrap(), cid);
    }

    #[tokio::test]
    async fn test_put_rejects_non_raw_cid() {
        // A CIDv0 (dag-pb) answer means the node ignored the add options.
        let v0 = "QmWATWQ7fVPP2EFGu71UkfnqhYXDYH566qy47CnJDgvs8u";
        let _m = mock("POST", Matcher::Regex(r"^/api/v0/add".to_string()))
            .match_body(Matcher::Regex("wind-2 chunked upload".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"Name":"{v0}","Hash":"{v0}","Size":"21"}}"#))
            .create();

        let store = IpfsStorage::with_url(&mockito::server_url()).unwrap();
        let err = store.put(b"wind-2 chunked upload").await.unwrap_err();
        assert_eq!(err, StorageError::InvalidCid(v0.to_string()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_collects_streamed_block() {
        let bytes = b"solar-farm-1 produced 12.5 MWh".to_vec();
        let cid = ContentId::for_bytes(&bytes);
        let _m = mock("POST", Matcher::Regex(r"^/api/v0/cat".to_string()))
            .match_query(Matcher::UrlEncoded("arg".into(), cid.to_string()))
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body(&bytes)
            .create();

        let store = IpfsStorage::with_url(&mockito::server_url()).unwrap();
        assert_eq!(store.get(&cid).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_missing_block_is_not_found_and_not_retried() {
        let cid = ContentId::for_bytes(b"wind-2 certificate never added");
        let m = mock("POST", Matcher::Regex(r"^/api/v0/cat".to_string()))
            .match_query(Matcher::UrlEncoded("arg".into(), cid.to_string()))
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Message":"block was not found locally (offline)","Code":0,"Type":"error"}"#)
            .expect(1)
            .create();

        let store = RetryingStore::new(
            IpfsStorage::with_url(&mockito::server_url()).unwrap(),
            fast_policy(),
        );
        assert_eq!(store.get(&cid).await.unwrap_err(), StorageError::NotFound(cid));
        m.assert();
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dropped_call_aborts_node_request() {
        let store = IpfsStorage::new();
        let aborted = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(aborted.clone());

        let call = store.run_on_node(move |_client| async move {
            let _guard = guard;
            futures::future::pending::<Result<(), StorageError>>().await
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), call).await.is_err());

        for _ in 0..200 {
            if aborted.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(aborted.load(Ordering::SeqCst));
    }

    #[test]
    fn test_classify_errors() {
        let cid = ContentId::for_bytes(b"gone");
        assert_eq!(
            IpfsStorage::classify(Some(&cid), "api returned error: block was not found locally"),
            StorageError::NotFound(cid)
        );
        assert!(IpfsStorage::classify(Some(&cid), "connection refused").is_retryable());
        assert!(IpfsStorage::classify(None, "not found").is_retryable());
    }

    #[test]
    fn test_invalid_url() {
        assert!(IpfsStorage::with_url("not a url with spaces").is_err());
    }
}
