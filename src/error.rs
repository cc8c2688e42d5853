// src/error.rs
//! Error taxonomy for certificate issuance and verification.
//!
//! Cryptographic, encoding and storage failures each get their own variant so
//! callers can tell a forged certificate apart from a malformed one or from an
//! unreachable storage backend. An expired certificate is not an error; see
//! [`crate::models::certificate::VerificationResult`].

use crate::storage::StorageError;

/// Errors raised by the certificate lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// The entropy source could not produce key material.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// The private key could not be used to sign.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A payload, certificate, CID or input value is not well formed.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Signature bytes are structurally malformed (length or scalar range).
    #[error("malformed signature: {0}")]
    SignatureFormat(String),

    /// Public key bytes do not describe a point on the curve.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CertificateError {
    pub(crate) fn invalid_format(msg: impl Into<String>) -> Self {
        CertificateError::InvalidFormat(msg.into())
    }
}

pub type Result<T, E = CertificateError> = std::result::Result<T, E>;
