// src/lib.rs

//! # Energy Certificates
//!
//! Issues, stores and verifies signed energy certificates: claims that an
//! issuer produced a number of megawatt-hours, valid until a point in time,
//! anchored to a content-addressed storage network.
//!
//! ## Architecture Overview
//! 1. **Wallet Layer**: `KeyManager` for key generation, signing and signature checks
//! 2. **Models**: certificate payloads, certificates, content identifiers
//! 3. **Services Layer**: certificate factory, signature verifier and the registry
//! 4. **Storage Layer**: IPFS and in-memory content stores with retries
//!
//! ## Example
//! ```no_run
//! use energy_certificates::{CertificateRegistry, IpfsStorage, KeyManager, EcdsaKeyManager, RetryPolicy};
//!
//! # async fn run() -> Result<(), energy_certificates::CertificateError> {
//! let registry = CertificateRegistry::new(IpfsStorage::new(), RetryPolicy::default());
//! let issuer = EcdsaKeyManager::new().generate_key_pair()?;
//!
//! let cid = registry
//!     .issue_certificate("solar-farm-1", "12.5", "2030-01-01T00:00:00Z", &issuer.private_key)
//!     .await?;
//! let result = registry.verify_certificate(&cid, &issuer.public_key).await?;
//! assert!(result.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use crate::config::Settings;
pub use crate::error::{CertificateError, Result};
pub use crate::models::{Certificate, CertificatePayload, ContentId, InvalidReason, Mwh, VerificationResult};
pub use crate::services::{CertificateFactory, CertificateRegistry, SignatureVerifier};
pub use crate::storage::{ContentStore, IpfsStorage, MemoryStore, RetryPolicy, RetryingStore, StorageError};
pub use crate::utils::encoding::CanonicalEncoder;
pub use crate::wallet::{EcdsaKeyManager, KeyManager, KeyPair, PrivateKey, PublicKey, Signature};
