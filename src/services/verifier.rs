// src/services/verifier.rs
//! Certificate verification.
//!
//! Each call runs the same three checks in a fixed order and keeps no state
//! between calls:
//! 1. Format: the payload must survive a canonical encode/decode
//! 2. Authenticity: the signature must match under the expected public key
//! 3. Validity window: `now` must not be past `valid_until`
//!
//! Authenticity is decided before expiry, so a forged certificate is always
//! reported as [`InvalidReason::Signature`] even when it has also expired.

use crate::error::{CertificateError, Result};
use crate::models::{Certificate, InvalidReason, VerificationResult};
use crate::utils::encoding::CanonicalEncoder;
use crate::wallet::{KeyManager, PublicKey};
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;

/// Checks certificates against an expected public key and a time reference.
pub struct SignatureVerifier<K> {
    key_manager: Arc<K>,
}

impl<K: KeyManager> SignatureVerifier<K> {
    /// Creates a verifier backed by `key_manager`.
    pub fn new(key_manager: Arc<K>) -> Self {
        SignatureVerifier { key_manager }
    }

    /// Verifies a certificate value.
    ///
    /// # Arguments
    /// * `certificate` - The certificate to check
    /// * `public_key` - The key the issuer is expected to have signed with
    /// * `now` - Time reference for the validity window
    ///
    /// # Returns
    /// The verification outcome. Expired and forged certificates are
    /// outcomes, not errors.
    ///
    /// # Errors
    /// [`CertificateError::InvalidPublicKey`] if `public_key` is not a valid
    /// key; this is a caller error rather than a property of the certificate.
    pub fn verify(
        &self,
        certificate: &Certificate,
        public_key: &PublicKey,
        now: DateTime<Utc>,
    ) -> Result<VerificationResult> {
        let message = CanonicalEncoder::encode(certificate.payload());
        match CanonicalEncoder::decode(&message) {
            Ok((decoded, used)) if used == message.len() && &decoded == certificate.payload() => {}
            _ => return Ok(VerificationResult::Invalid(InvalidReason::Format)),
        }

        let authentic = match self.key_manager.verify_signature(
            public_key,
            &message,
            certificate.signature().as_bytes(),
        ) {
            Ok(authentic) => authentic,
            Err(CertificateError::SignatureFormat(reason)) => {
                debug!("{}: malformed signature: {reason}", certificate.cid());
                false
            }
            Err(e) => return Err(e),
        };
        if !authentic {
            return Ok(VerificationResult::Invalid(InvalidReason::Signature));
        }

        if certificate.payload().is_expired_at(now) {
            return Ok(VerificationResult::Expired);
        }
        Ok(VerificationResult::Valid)
    }

    /// Verifies persisted certificate bytes.
    ///
    /// Bytes that do not decode as a certificate yield
    /// [`InvalidReason::Format`].
    pub fn verify_bytes(
        &self,
        bytes: &[u8],
        public_key: &PublicKey,
        now: DateTime<Utc>,
    ) -> Result<VerificationResult> {
        match Certificate::from_bytes(bytes) {
            Ok(certificate) => self.verify(&certificate, public_key, now),
            Err(e) => {
                debug!("stored bytes do not decode: {e}");
                Ok(VerificationResult::Invalid(InvalidReason::Format))
            }
        }
    }
}

impl<K> Clone for SignatureVerifier<K> {
    fn clone(&self) -> Self {
        SignatureVerifier {
            key_manager: self.key_manager.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::certificate_factory::CertificateFactory;
    use crate::wallet::{EcdsaKeyManager, KeyPair};
    use chrono::Duration;

    struct Fixture {
        factory: CertificateFactory<EcdsaKeyManager>,
        verifier: SignatureVerifier<EcdsaKeyManager>,
        pair: KeyPair,
        now: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        let km = Arc::new(EcdsaKeyManager::new());
        let pair = km.generate_key_pair().unwrap();
        Fixture {
            factory: CertificateFactory::new(km.clone()),
            verifier: SignatureVerifier::new(km),
            pair,
            now: Utc::now(),
        }
    }

    fn rfc3339(at: DateTime<Utc>) -> String {
        at.to_rfc3339()
    }

    impl Fixture {
        fn issue(&self, valid_until: DateTime<Utc>) -> Certificate {
            self.factory
                .issue("solar-farm-1", "12.5", &rfc3339(valid_until), &self.pair.private_key)
                .unwrap()
        }
    }

    #[test]
    fn test_valid_certificate() {
        let f = fixture();
        let cert = f.issue(f.now + Duration::days(30));
        assert_eq!(
            f.verifier.verify(&cert, &f.pair.public_key, f.now).unwrap(),
            VerificationResult::Valid
        );
    }

    #[test]
    fn test_expired_certificate() {
        let f = fixture();
        let cert = f.issue(f.now - Duration::days(1));
        assert_eq!(
            f.verifier.verify(&cert, &f.pair.public_key, f.now).unwrap(),
            VerificationResult::Expired
        );
    }

    #[test]
    fn test_wrong_key_is_invalid_signature() {
        let f = fixture();
        let cert = f.issue(f.now + Duration::days(30));
        let other = EcdsaKeyManager::new().generate_key_pair().unwrap();
        assert_eq!(
            f.verifier.verify(&cert, &other.public_key, f.now).unwrap(),
            VerificationResult::Invalid(InvalidReason::Signature)
        );
    }

    #[test]
    fn test_forgery_takes_precedence_over_expiry() {
        let f = fixture();
        let cert = f.issue(f.now - Duration::days(1));

        let mut bytes = cert.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert_eq!(
            f.verifier.verify_bytes(&bytes, &f.pair.public_key, f.now).unwrap(),
            VerificationResult::Invalid(InvalidReason::Signature)
        );
    }

    #[test]
    fn test_expired_with_wrong_key_is_invalid_signature() {
        let f = fixture();
        let cert = f.issue(f.now - Duration::days(1));
        let other = EcdsaKeyManager::new().generate_key_pair().unwrap();
        assert_eq!(
            f.verifier.verify(&cert, &other.public_key, f.now).unwrap(),
            VerificationResult::Invalid(InvalidReason::Signature)
        );
    }

    #[test]
    fn test_payload_tampering_is_invalid_signature() {
        let f = fixture();
        let cert = f.issue(f.now + Duration::days(30));
        let bytes = cert.to_bytes();
        let payload_len = bytes.len() - crate::wallet::SIGNATURE_LEN;

        // Field contents: issuer after [version][len], amount and timestamp
        // after their own length prefixes.
        let issuer_len = cert.payload().issuer().len();
        let issuer = 5..5 + issuer_len;
        let mwh = issuer.end + 4..issuer.end + 12;
        // The two high timestamp bytes are skipped: flipping them leaves the
        // representable date range, which is a format error instead.
        let valid_until = mwh.end + 6..mwh.end + 12;
        assert_eq!(valid_until.end, payload_len);

        for i in issuer.chain(mwh).chain(valid_until) {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                f.verifier.verify_bytes(&tampered, &f.pair.public_key, f.now).unwrap(),
                VerificationResult::Invalid(InvalidReason::Signature),
                "flip at byte {i}"
            );
        }
    }

    #[test]
    fn test_no_single_byte_flip_verifies() {
        let f = fixture();
        let cert = f.issue(f.now + Duration::days(30));
        let bytes = cert.to_bytes();

        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x80;
            let result = f.verifier.verify_bytes(&tampered, &f.pair.public_key, f.now).unwrap();
            assert!(!result.is_valid(), "flip at byte {i} still verified");
        }
    }

    #[test]
    fn test_garbage_is_invalid_format() {
        let f = fixture();
        let samples: [&[u8]; 3] = [b"", b"not a certificate", &[0x01, 0, 0, 0]];
        for bytes in samples {
            assert_eq!(
                f.verifier.verify_bytes(bytes, &f.pair.public_key, f.now).unwrap(),
                VerificationResult::Invalid(InvalidReason::Format)
            );
        }
    }

    #[test]
    fn test_malformed_signature_is_invalid_signature() {
        let f = fixture();
        let cert = f.issue(f.now + Duration::days(30));
        let mut bytes = cert.to_bytes();
        let sig_start = bytes.len() - crate::wallet::SIGNATURE_LEN;
        bytes[sig_start..].fill(0);

        assert_eq!(
            f.verifier.verify_bytes(&bytes, &f.pair.public_key, f.now).unwrap(),
            VerificationResult::Invalid(InvalidReason::Signature)
        );
    }

    #[test]
    fn test_invalid_public_key_is_an_error() {
        let f = fixture();
        let cert = f.issue(f.now + Duration::days(30));
        let result = f.verifier.verify(&cert, &PublicKey::from_bytes(vec![0u8; 33]), f.now);
        assert!(matches!(result, Err(CertificateError::InvalidPublicKey(_))));
    }

    #[test]
    fn test_outcome_is_not_cached() {
        let f = fixture();
        let valid_until = f.now + Duration::days(1);
        let cert = f.issue(valid_until);

        assert!(f.verifier.verify(&cert, &f.pair.public_key, f.now).unwrap().is_valid());
        assert_eq!(
            f.verifier
                .verify(&cert, &f.pair.public_key, valid_until + Duration::seconds(1))
                .unwrap(),
            VerificationResult::Expired
        );
        assert!(f.verifier.verify(&cert, &f.pair.public_key, f.now).unwrap().is_valid());
    }
}
