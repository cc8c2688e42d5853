// src/utils/encoding.rs
//! Canonical byte encoding of certificate payloads.
//!
//! The same bytes are signed, hashed into the CID and written to storage, so
//! the encoding has exactly one representation per payload:
//!
//! ```text
//! [version: u8]
//! [len: u32 BE][issuer: UTF-8]
//! [len: u32 BE][mwh: u64 BE, micro-MWh]
//! [len: u32 BE][valid_until: i64 BE, Unix seconds]
//! ```
//!
//! Every field carries a length prefix, so adjacent fields cannot bleed into
//! one another. The stored form of a certificate is the encoded payload
//! followed by the 64-byte signature.

use crate::error::{CertificateError, Result};
use crate::models::certificate::{CertificatePayload, Mwh};
use crate::wallet::{Signature, SIGNATURE_LEN};
use chrono::DateTime;

/// Current encoding version tag.
pub const ENCODING_VERSION: u8 = 0x01;

const LEN_PREFIX: usize = 4;

/// Versioned, length-prefixed payload codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalEncoder;

impl CanonicalEncoder {
    /// Encodes a payload. Total and side-effect free.
    pub fn encode(payload: &CertificatePayload) -> Vec<u8> {
        let issuer = payload.issuer().as_bytes();
        let mut out = Vec::with_capacity(1 + 3 * LEN_PREFIX + issuer.len() + 16);

        out.push(ENCODING_VERSION);
        write_field(&mut out, issuer);
        write_field(&mut out, &payload.mwh().as_micro().to_be_bytes());
        write_field(&mut out, &payload.valid_until().timestamp().to_be_bytes());
        out
    }

    /// Decodes a payload from the front of `bytes`.
    ///
    /// # Returns
    /// The payload and the number of bytes it occupied.
    ///
    /// # Errors
    /// [`CertificateError::InvalidFormat`] if the version tag is unknown, a
    /// length prefix overruns the buffer, a fixed-width field has the wrong
    /// length, or a field value is out of range.
    pub fn decode(bytes: &[u8]) -> Result<(CertificatePayload, usize)> {
        let mut reader = Reader::new(bytes);

        let version = reader.take(1)?[0];
        if version != ENCODING_VERSION {
            return Err(CertificateError::invalid_format(format!(
                "unsupported encoding version {version:#04x}"
            )));
        }

        let issuer = std::str::from_utf8(reader.field()?)
            .map_err(|_| CertificateError::invalid_format("issuer is not UTF-8"))?
            .to_owned();
        let mwh = u64::from_be_bytes(fixed(reader.field()?, "mwh")?);
        let seconds = i64::from_be_bytes(fixed(reader.field()?, "valid_until")?);
        let valid_until = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| CertificateError::invalid_format("valid_until is out of range"))?;

        let payload = CertificatePayload::new(issuer, Mwh::from_micro(mwh), valid_until)?;
        Ok((payload, reader.position()))
    }

    /// Encodes the persisted form of a certificate.
    pub fn encode_certificate(payload: &CertificatePayload, signature: &Signature) -> Vec<u8> {
        let mut out = Self::encode(payload);
        out.extend_from_slice(signature.as_bytes());
        out
    }

    /// Splits persisted certificate bytes into payload and signature.
    ///
    /// # Errors
    /// [`CertificateError::InvalidFormat`] if the payload does not decode or
    /// is not followed by exactly one signature.
    pub fn decode_certificate(bytes: &[u8]) -> Result<(CertificatePayload, Signature)> {
        let (payload, used) = Self::decode(bytes)?;
        let rest = &bytes[used..];
        if rest.len() != SIGNATURE_LEN {
            return Err(CertificateError::invalid_format(format!(
                "expected {SIGNATURE_LEN} signature bytes after payload, found {}",
                rest.len()
            )));
        }
        let signature = Signature::from_slice(rest)
            .map_err(|e| CertificateError::invalid_format(e.to_string()))?;
        Ok((payload, signature))
    }
}

fn write_field(out: &mut Vec<u8>, value: &[u8]) {
    // Payload constructors cap issuer length at u32::MAX.
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
}

fn fixed<const N: usize>(value: &[u8], name: &str) -> Result<[u8; N]> {
    value.try_into().map_err(|_| {
        CertificateError::invalid_format(format!("{name} must be {N} bytes, got {}", value.len()))
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                CertificateError::invalid_format(format!(
                    "need {n} bytes at offset {}, buffer has {}",
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn field(&mut self) -> Result<&'a [u8]> {
        let len = u32::from_be_bytes(fixed(self.take(LEN_PREFIX)?, "length prefix")?);
        self.take(len as usize)
    }

    fn position(&self) -> usize {
        self.pos
    }
}
