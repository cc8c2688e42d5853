// src/services/certificate_factory.rs
//! Certificate issuance.
//!
//! Builds a payload, signs its canonical encoding and derives the content
//! identifier of the signed bytes. The factory performs no I/O; persisting
//! the result is the registry's job.

use crate::error::Result;
use crate::models::{Certificate, CertificatePayload};
use crate::utils::encoding::CanonicalEncoder;
use crate::wallet::{KeyManager, PrivateKey};
use log::debug;
use std::sync::Arc;

/// Produces signed, content-addressed certificates.
pub struct CertificateFactory<K> {
    key_manager: Arc<K>,
}

impl<K: KeyManager> CertificateFactory<K> {
    /// Creates a factory that signs with `key_manager`.
    pub fn new(key_manager: Arc<K>) -> Self {
        CertificateFactory { key_manager }
    }

    /// Issues a certificate from API-layer text.
    ///
    /// # Arguments
    /// * `issuer` - Issuer identifier, e.g. `"solar-farm-1"`
    /// * `mwh` - Non-negative decimal amount, at most six decimal places
    /// * `valid_until` - RFC 3339 timestamp
    /// * `private_key` - The issuer's signing key
    ///
    /// # Errors
    /// - [`crate::CertificateError::InvalidFormat`] for a negative or
    ///   malformed amount, a malformed timestamp, or an empty issuer
    /// - [`crate::CertificateError::Signing`] for malformed key material
    pub fn issue(
        &self,
        issuer: &str,
        mwh: &str,
        valid_until: &str,
        private_key: &PrivateKey,
    ) -> Result<Certificate> {
        let payload = CertificatePayload::parse(issuer, mwh, valid_until)?;
        self.issue_payload(payload, private_key)
    }

    /// Signs an already constructed payload.
    pub fn issue_payload(&self, payload: CertificatePayload, private_key: &PrivateKey) -> Result<Certificate> {
        let bytes = CanonicalEncoder::encode(&payload);
        let signature = self.key_manager.sign(private_key, &bytes)?;
        let certificate = Certificate::new(payload, signature);
        debug!("signed certificate {} for {}", certificate.cid(), certificate.payload().issuer());
        Ok(certificate)
    }
}

impl<K> Clone for CertificateFactory<K> {
    fn clone(&self) -> Self {
        CertificateFactory {
            key_manager: self.key_manager.clone(),
        }
    }
}
