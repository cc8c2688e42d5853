// src/services/registry.rs
//! Certificate registry: the entry point for issuing and verifying
//! certificates.
//!
//! Issuance runs factory → store; verification runs store → verifier with a
//! public key supplied by the caller. The registry keeps no key registry of
//! its own and caches no verification outcomes.
//!
//! Bytes returned by the store are checked against the requested CID: a
//! certificate is only ever accepted under the identifier of its own bytes.

use crate::error::{CertificateError, Result};
use crate::models::{Certificate, ContentId, InvalidReason, VerificationResult};
use crate::services::certificate_factory::CertificateFactory;
use crate::services::verifier::SignatureVerifier;
use crate::storage::{ContentStore, RetryPolicy, RetryingStore, StorageError};
use crate::wallet::{EcdsaKeyManager, KeyManager, PrivateKey, PublicKey};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;

/// Orchestrates issuance and verification over a content store.
///
/// The registry is `Send + Sync` when its store is, and is meant to be
/// shared behind an `Arc` by all in-flight requests.
pub struct CertificateRegistry<S, K = EcdsaKeyManager> {
    factory: CertificateFactory<K>,
    verifier: SignatureVerifier<K>,
    store: RetryingStore<S>,
}

impl<S: ContentStore> CertificateRegistry<S, EcdsaKeyManager> {
    /// Creates a registry using secp256k1 ECDSA keys.
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self::with_key_manager(store, EcdsaKeyManager::new(), policy)
    }
}

impl<S: ContentStore, K: KeyManager> CertificateRegistry<S, K> {
    /// Creates a registry with an explicit key manager.
    ///
    /// # Arguments
    /// * `store` - Content-addressed backend; wrapped with `policy`
    /// * `key_manager` - Shared by the factory and the verifier
    /// * `policy` - Retry and deadline settings for store calls
    pub fn with_key_manager(store: S, key_manager: K, policy: RetryPolicy) -> Self {
        let key_manager = Arc::new(key_manager);
        CertificateRegistry {
            factory: CertificateFactory::new(key_manager.clone()),
            verifier: SignatureVerifier::new(key_manager),
            store: RetryingStore::new(store, policy),
        }
    }

    pub fn store(&self) -> &S {
        self.store.inner()
    }

    /// Issues a certificate and stores it.
    ///
    /// # Returns
    /// The CID under which the certificate was stored.
    ///
    /// # Errors
    /// - [`CertificateError::InvalidFormat`] / [`CertificateError::Signing`]
    ///   from the factory
    /// - [`CertificateError::Storage`] if the store fails after retries, or
    ///   addresses the bytes under a different CID
    pub async fn issue_certificate(
        &self,
        issuer: &str,
        mwh: &str,
        valid_until: &str,
        private_key: &PrivateKey,
    ) -> Result<ContentId> {
        let certificate = self.factory.issue(issuer, mwh, valid_until, private_key)?;
        self.store_certificate(&certificate).await
    }

    /// Stores an already issued certificate.
    pub async fn store_certificate(&self, certificate: &Certificate) -> Result<ContentId> {
        let expected = certificate.cid();
        let stored = self.store.put(&certificate.to_bytes()).await?;
        if stored != expected {
            return Err(StorageError::CidMismatch {
                expected,
                actual: stored.to_string(),
            }
            .into());
        }
        info!(
            "issued certificate {} ({} MWh from {})",
            stored,
            certificate.payload().mwh(),
            certificate.payload().issuer()
        );
        Ok(stored)
    }

    /// Fetches and decodes a certificate without verifying its signature.
    ///
    /// # Errors
    /// - [`StorageError::CidMismatch`] if the store returned bytes that are
    ///   not addressed by `cid`
    /// - [`CertificateError::InvalidFormat`] if the bytes do not decode
    pub async fn fetch_certificate(&self, cid: &ContentId) -> Result<Certificate> {
        let bytes = self.store.get(cid).await?;
        if !cid.matches(&bytes) {
            return Err(CertificateError::Storage(StorageError::CidMismatch {
                expected: *cid,
                actual: ContentId::for_bytes(&bytes).to_string(),
            }));
        }
        Certificate::from_bytes(&bytes)
    }

    /// Verifies the certificate stored under `cid` against the current time.
    pub async fn verify_certificate(&self, cid: &ContentId, public_key: &PublicKey) -> Result<VerificationResult> {
        self.verify_certificate_at(cid, public_key, Utc::now()).await
    }

    /// Verifies the certificate stored under `cid` at time `now`.
    ///
    /// Bytes that do not hash to `cid` never verify. When the verifier would
    /// accept them they are reported as `Invalid(Signature)`.
    ///
    /// # Errors
    /// - [`CertificateError::Storage`] with [`StorageError::NotFound`],
    ///   [`StorageError::Unavailable`] or [`StorageError::Timeout`]
    /// - [`CertificateError::InvalidPublicKey`] for a malformed key
    pub async fn verify_certificate_at(
        &self,
        cid: &ContentId,
        public_key: &PublicKey,
        now: DateTime<Utc>,
    ) -> Result<VerificationResult> {
        let bytes = self.store.get(cid).await?;
        let mut result = self.verifier.verify_bytes(&bytes, public_key, now)?;
        if !cid.matches(&bytes) && !matches!(result, VerificationResult::Invalid(_)) {
            warn!("store returned {} for {cid}", ContentId::for_bytes(&bytes));
            result = VerificationResult::Invalid(InvalidReason::Signature);
        }
        info!("verified certificate {cid}: {result}");
        Ok(result)
    }
}
