// src/models/mod.rs
//! Certificate data structures.

pub mod certificate;
pub mod content_id;

pub use certificate::{Certificate, CertificatePayload, InvalidReason, Mwh, VerificationResult};
pub use content_id::ContentId;
