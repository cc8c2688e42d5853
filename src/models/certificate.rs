// src/models/certificate.rs
//! Energy certificate data model.
//!
//! A certificate claims that an issuer produced a quantity of energy and that
//! the claim is valid until a point in time. The payload is signed by the
//! issuer and the signed bytes are content-addressed.
//!
//! All types here are plain immutable values. Verification is performed by
//! [`crate::services::verifier::SignatureVerifier`], never by a method on the
//! certificate itself.

use crate::error::{CertificateError, Result};
use crate::models::content_id::ContentId;
use crate::utils::encoding::CanonicalEncoder;
use crate::wallet::Signature;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Decimal places carried by [`Mwh`].
pub const MWH_DECIMALS: u32 = 6;
const MICRO_PER_MWH: u64 = 10u64.pow(MWH_DECIMALS);

/// Non-negative energy amount in megawatt-hours, fixed-point with six
/// decimal places.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mwh(u64);

impl Mwh {
    pub const ZERO: Mwh = Mwh(0);

    pub fn from_micro(micro_mwh: u64) -> Self {
        Mwh(micro_mwh)
    }

    pub fn as_micro(&self) -> u64 {
        self.0
    }
}

impl FromStr for Mwh {
    type Err = CertificateError;

    /// Parses a plain decimal such as `12`, `12.5` or `0.000001`.
    ///
    /// Signs, exponents and more than six fractional digits are rejected.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(CertificateError::invalid_format(format!("mwh must be non-negative: {s}")));
        }
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());

        if whole.is_empty() || !is_digits(whole) || !is_digits(fraction) {
            return Err(CertificateError::invalid_format(format!("mwh is not a decimal: {s:?}")));
        }
        if s.ends_with('.') {
            return Err(CertificateError::invalid_format(format!("mwh is not a decimal: {s:?}")));
        }
        if fraction.len() > MWH_DECIMALS as usize {
            return Err(CertificateError::invalid_format(format!(
                "mwh supports at most {MWH_DECIMALS} decimal places: {s}"
            )));
        }

        let overflow = || CertificateError::invalid_format(format!("mwh is too large: {s}"));
        let whole: u64 = whole.parse().map_err(|_| overflow())?;
        let fraction_micro = if fraction.is_empty() {
            0
        } else {
            let scale = 10u64.pow(MWH_DECIMALS - fraction.len() as u32);
            fraction.parse::<u64>().map_err(|_| overflow())? * scale
        };

        whole
            .checked_mul(MICRO_PER_MWH)
            .and_then(|micro| micro.checked_add(fraction_micro))
            .map(Mwh)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for Mwh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICRO_PER_MWH;
        let fraction = self.0 % MICRO_PER_MWH;
        if fraction == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{fraction:06}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl Serialize for Mwh {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The signed content of a certificate.
///
/// Fields are private and fixed at construction; `valid_until` is truncated
/// to whole seconds so the value survives the canonical encoding unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CertificatePayload {
    issuer: String,
    mwh: Mwh,
    valid_until: DateTime<Utc>,
}

impl CertificatePayload {
    /// Builds a payload.
    ///
    /// # Errors
    /// [`CertificateError::InvalidFormat`] if the issuer is empty or
    /// `valid_until` lies before the Unix epoch.
    pub fn new(issuer: impl Into<String>, mwh: Mwh, valid_until: DateTime<Utc>) -> Result<Self> {
        let issuer = issuer.into();
        if issuer.is_empty() {
            return Err(CertificateError::invalid_format("issuer must not be empty"));
        }
        if issuer.len() > u32::MAX as usize {
            return Err(CertificateError::invalid_format("issuer is too long"));
        }
        let seconds = valid_until.timestamp();
        if seconds < 0 {
            return Err(CertificateError::invalid_format(format!(
                "valid_until precedes the Unix epoch: {valid_until}"
            )));
        }
        let valid_until = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| CertificateError::invalid_format("valid_until is out of range"))?;

        Ok(CertificatePayload {
            issuer,
            mwh,
            valid_until,
        })
    }

    /// Builds a payload from API-layer text: a decimal MWh amount and an
    /// RFC 3339 timestamp.
    pub fn parse(issuer: &str, mwh: &str, valid_until: &str) -> Result<Self> {
        let mwh: Mwh = mwh.parse()?;
        let valid_until = DateTime::parse_from_rfc3339(valid_until.trim())
            .map_err(|e| {
                CertificateError::invalid_format(format!("valid_until is not RFC 3339 ({e}): {valid_until}"))
            })?
            .with_timezone(&Utc);
        Self::new(issuer, mwh, valid_until)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn mwh(&self) -> Mwh {
        self.mwh
    }

    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    /// Whether the validity window has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}

/// A signed, content-addressed energy certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Certificate {
    cid: ContentId,
    #[serde(flatten)]
    payload: CertificatePayload,
    #[serde(serialize_with = "serialize_signature")]
    signature: Signature,
}

fn serialize_signature<S: Serializer>(signature: &Signature, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&signature.to_hex())
}

impl Certificate {
    /// Assembles a certificate and computes its CID over the persisted bytes.
    pub fn new(payload: CertificatePayload, signature: Signature) -> Self {
        let bytes = CanonicalEncoder::encode_certificate(&payload, &signature);
        Certificate {
            cid: ContentId::for_bytes(&bytes),
            payload,
            signature,
        }
    }

    /// Parses persisted certificate bytes.
    ///
    /// # Errors
    /// [`CertificateError::InvalidFormat`] if the bytes are not a canonical
    /// payload followed by a 64-byte signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (payload, signature) = CanonicalEncoder::decode_certificate(bytes)?;
        Ok(Certificate {
            cid: ContentId::for_bytes(bytes),
            payload,
            signature,
        })
    }

    /// The persisted form: canonical payload followed by the signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        CanonicalEncoder::encode_certificate(&self.payload, &self.signature)
    }

    pub fn cid(&self) -> ContentId {
        self.cid
    }

    pub fn payload(&self) -> &CertificatePayload {
        &self.payload
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Issuer: {}, MWh: {}, ValidUntil: {}, CID: {}",
            self.payload.issuer,
            self.payload.mwh,
            self.payload.valid_until.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.cid
        )
    }
}

/// Why a certificate failed verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The signature does not match the payload under the given key.
    Signature,
    /// The stored bytes are not a well-formed certificate.
    Format,
}

/// Outcome of a single verification call. Computed fresh on every call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum VerificationResult {
    Valid,
    Expired,
    Invalid(InvalidReason),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Valid => f.write_str("valid"),
            VerificationResult::Expired => f.write_str("expired"),
            VerificationResult::Invalid(InvalidReason::Signature) => f.write_str("invalid (signature)"),
            VerificationResult::Invalid(InvalidReason::Format) => f.write_str("invalid (format)"),
        }
    }
}
