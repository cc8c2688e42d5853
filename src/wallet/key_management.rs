// src/wallet/key_management.rs
//! Cryptographic key management for certificate issuers.
//!
//! Provides generation, signing and verification for the keys that issue
//! energy certificates:
//! - secp256k1 curve (via `k256` crate)
//! - ECDSA with RFC 6979 deterministic nonces and SHA-256 message digests
//! - Key material drawn from the operating system RNG
//!
//! The key manager holds no key material itself. Issuers own their
//! [`KeyPair`] and hand the private half in for each signing call, so one
//! manager instance can serve any number of issuers concurrently.

use crate::error::{CertificateError, Result};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Length of a secp256k1 private scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Length of a compact (r || s) ECDSA signature.
pub const SIGNATURE_LEN: usize = 64;

/// Opaque private key bytes.
///
/// The bytes are only interpreted when signing, so a `PrivateKey` may hold
/// malformed material; [`KeyManager::sign`] reports that as a signing error.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        PrivateKey(bytes.into())
    }

    /// Parses a hex-encoded key, with or without `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self> {
        let text = text.trim();
        let text = text.strip_prefix("0x").unwrap_or(text);
        hex::decode(text)
            .map(PrivateKey)
            .map_err(|e| CertificateError::invalid_format(format!("private key is not hex: {e}")))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// SEC1-encoded public key bytes (33 bytes when compressed).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        PublicKey(bytes.into())
    }

    /// Parses a hex-encoded key, with or without `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self> {
        let text = text.trim();
        let text = text.strip_prefix("0x").unwrap_or(text);
        hex::decode(text)
            .map(PublicKey)
            .map_err(|e| CertificateError::invalid_format(format!("public key is not hex: {e}")))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// A private key together with the public key derived from it.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

/// A structurally valid compact ECDSA signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Wraps signature bytes, checking only the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            CertificateError::SignatureFormat(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Signature(array))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

/// Key generation, signing and signature verification.
///
/// Injected into the certificate factory and verifier as an explicit
/// instance; implementations must be stateless with respect to issuers.
pub trait KeyManager: Send + Sync {
    /// Generates a fresh key pair from the system entropy source.
    ///
    /// # Errors
    /// [`CertificateError::KeyGeneration`] if the entropy source fails.
    fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Derives the public key for a private key.
    ///
    /// # Errors
    /// [`CertificateError::Signing`] if the private key is malformed.
    fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey>;

    /// Signs a message.
    ///
    /// # Errors
    /// [`CertificateError::Signing`] if the private key is malformed.
    fn sign(&self, private_key: &PrivateKey, message: &[u8]) -> Result<Signature>;

    /// Checks a signature over `message`.
    ///
    /// # Returns
    /// - `Ok(true)` if the signature matches
    /// - `Ok(false)` if it is well formed but does not match
    ///
    /// # Errors
    /// - [`CertificateError::SignatureFormat`] if the signature bytes are
    ///   structurally malformed
    /// - [`CertificateError::InvalidPublicKey`] if the public key is not a
    ///   curve point
    fn verify_signature(&self, public_key: &PublicKey, message: &[u8], signature: &[u8])
        -> Result<bool>;
}

/// secp256k1 ECDSA key manager.
///
/// # Security Notes
/// - Uses deterministic ECDSA (RFC 6979), so identical key and message always
///   produce the identical signature
/// - Signatures are normalized to low-S; high-S signatures do not verify
#[derive(Clone, Copy, Debug, Default)]
pub struct EcdsaKeyManager;

impl EcdsaKeyManager {
    pub fn new() -> Self {
        EcdsaKeyManager
    }

    fn signing_key(private_key: &PrivateKey) -> Result<SigningKey> {
        // from_slice left-pads short input; only exact-width scalars are keys here.
        if private_key.as_bytes().len() != PRIVATE_KEY_LEN {
            return Err(CertificateError::Signing(format!(
                "private key must be {PRIVATE_KEY_LEN} bytes, got {}",
                private_key.as_bytes().len()
            )));
        }
        SigningKey::from_slice(private_key.as_bytes())
            .map_err(|_| CertificateError::Signing("malformed private key".into()))
    }

    fn encode_public(signing_key: &SigningKey) -> PublicKey {
        let point = signing_key.verifying_key().to_encoded_point(true);
        PublicKey(point.as_bytes().to_vec())
    }
}

impl KeyManager for EcdsaKeyManager {
    fn generate_key_pair(&self) -> Result<KeyPair> {
        let mut bytes = [0u8; PRIVATE_KEY_LEN];
        // A uniformly random 32-byte string is a valid scalar with overwhelming
        // probability; loop on the rare zero or out-of-range draw.
        loop {
            OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| CertificateError::KeyGeneration(e.to_string()))?;
            if let Ok(signing_key) = SigningKey::from_slice(&bytes) {
                let public_key = Self::encode_public(&signing_key);
                return Ok(KeyPair {
                    private_key: PrivateKey(bytes.to_vec()),
                    public_key,
                });
            }
        }
    }

    fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey> {
        let signing_key = Self::signing_key(private_key)?;
        Ok(Self::encode_public(&signing_key))
    }

    fn sign(&self, private_key: &PrivateKey, message: &[u8]) -> Result<Signature> {
        let signing_key = Self::signing_key(private_key)?;
        let signature: EcdsaSignature = signing_key
            .try_sign(message)
            .map_err(|e| CertificateError::Signing(e.to_string()))?;
        Signature::from_slice(signature.to_bytes().as_slice())
    }

    fn verify_signature(
        &self,
        public_key: &PublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        let verifying_key = VerifyingKey::from_sec1_bytes(public_key.as_bytes())
            .map_err(|_| CertificateError::InvalidPublicKey("not a secp256k1 point".into()))?;
        let signature = EcdsaSignature::from_slice(signature)
            .map_err(|_| CertificateError::SignatureFormat("not a compact ECDSA signature".into()))?;
        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_pair_is_consistent() {
        let km = EcdsaKeyManager::new();
        let pair = km.generate_key_pair().unwrap();

        assert_eq!(pair.private_key.as_bytes().len(), PRIVATE_KEY_LEN);
        assert_eq!(pair.public_key.as_bytes().len(), 33);
        assert_eq!(km.derive_public_key(&pair.private_key).unwrap(), pair.public_key);
    }

    #[test]
    fn test_generated_pairs_differ() {
        let km = EcdsaKeyManager::new();
        let a = km.generate_key_pair().unwrap();
        let b = km.generate_key_pair().unwrap();
        assert_ne!(a.private_key, b.private_key);
    }

    #[test]
    fn test_sign_and_verify() {
        let km = EcdsaKeyManager::new();
        let pair = km.generate_key_pair().unwrap();
        let sig = km.sign(&pair.private_key, b"12.5 MWh").unwrap();

        assert!(km.verify_signature(&pair.public_key, b"12.5 MWh", sig.as_bytes()).unwrap());
        assert!(!km.verify_signature(&pair.public_key, b"12.6 MWh", sig.as_bytes()).unwrap());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let km = EcdsaKeyManager::new();
        let pair = km.generate_key_pair().unwrap();
        let a = km.sign(&pair.private_key, b"payload").unwrap();
        let b = km.sign(&pair.private_key, b"payload").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_key_returns_false() {
        let km = EcdsaKeyManager::new();
        let signer = km.generate_key_pair().unwrap();
        let other = km.generate_key_pair().unwrap();
        let sig = km.sign(&signer.private_key, b"payload").unwrap();

        assert!(!km.verify_signature(&other.public_key, b"payload", sig.as_bytes()).unwrap());
    }

    #[test]
    fn test_malformed_signature_is_format_error() {
        let km = EcdsaKeyManager::new();
        let pair = km.generate_key_pair().unwrap();

        let short = km.verify_signature(&pair.public_key, b"payload", &[1u8; 63]);
        assert!(matches!(short, Err(CertificateError::SignatureFormat(_))));

        // r = 0 is out of range for ECDSA.
        let zero = km.verify_signature(&pair.public_key, b"payload", &[0u8; SIGNATURE_LEN]);
        assert!(matches!(zero, Err(CertificateError::SignatureFormat(_))));
    }

    #[test]
    fn test_malformed_private_key_is_signing_error() {
        let km = EcdsaKeyManager::new();

        let short = km.sign(&PrivateKey::from_bytes(vec![7u8; 31]), b"payload");
        assert!(matches!(short, Err(CertificateError::Signing(_))));

        let zero = km.sign(&PrivateKey::from_bytes(vec![0u8; 32]), b"payload");
        assert!(matches!(zero, Err(CertificateError::Signing(_))));
    }

    #[test]
    fn test_invalid_public_key() {
        let km = EcdsaKeyManager::new();
        let pair = km.generate_key_pair().unwrap();
        let sig = km.sign(&pair.private_key, b"payload").unwrap();

        let result = km.verify_signature(&PublicKey::from_bytes(vec![2u8; 5]), b"payload", sig.as_bytes());
        assert!(matches!(result, Err(CertificateError::InvalidPublicKey(_))));
    }

    #[test]
    fn test_hex_round_trip_and_redacted_debug() {
        let km = EcdsaKeyManager::new();
        let pair = km.generate_key_pair().unwrap();

        let restored = PrivateKey::from_hex(&format!("0x{}", pair.private_key.to_hex())).unwrap();
        assert_eq!(restored, pair.private_key);
        assert_eq!(PublicKey::from_hex(&pair.public_key.to_hex()).unwrap(), pair.public_key);
        assert!(!format!("{:?}", pair.private_key).contains(&pair.private_key.to_hex()));
        assert!(matches!(PrivateKey::from_hex("zz"), Err(CertificateError::InvalidFormat(_))));
    }
}
