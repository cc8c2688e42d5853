// src/utils/crypto.rs
//! Hashing and text-encoding helpers used for content addressing.
//!
//! CIDs are built from SHA-256 digests (the IPFS default multihash) and
//! rendered with the RFC 4648 base32 alphabet in lowercase, without padding,
//! which is the multibase form IPFS prints for CIDv1.

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha256};

/// Computes a SHA-256 digest of the input data.
///
/// # Arguments
/// * `data` - Binary data to hash
///
/// # Returns
/// Fixed-size 32-byte array containing the digest.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Encodes bytes as lowercase, unpadded RFC 4648 base32.
pub fn base32_encode(data: &[u8]) -> String {
    BASE32_NOPAD.encode(data).to_lowercase()
}

/// Decodes lowercase, unpadded RFC 4648 base32.
///
/// # Returns
/// - `Some(bytes)` on success
/// - `None` for uppercase input, characters outside the alphabet, an
///   impossible length, or non-zero trailing bits
pub fn base32_decode(text: &str) -> Option<Vec<u8>> {
    // One spelling per byte string: multibase `b` is lowercase only.
    if text.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    BASE32_NOPAD.decode(text.to_ascii_uppercase().as_bytes()).ok()
}
