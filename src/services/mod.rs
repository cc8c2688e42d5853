// src/services/mod.rs
//! Issuance, verification and the registry that ties them to storage.

pub mod certificate_factory;
pub mod registry;
pub mod verifier;

pub use certificate_factory::CertificateFactory;
pub use registry::CertificateRegistry;
pub use verifier::SignatureVerifier;
