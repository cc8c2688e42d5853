// src/models/content_id.rs
//! Content identifiers for stored certificates.
//!
//! A [`ContentId`] is a CIDv1 with the `raw` codec and a sha2-256 multihash,
//! printed as multibase base32 (`b` prefix). This is the identifier an IPFS
//! node assigns to a single raw block added with `cid-version=1`, so the
//! identifier computed locally at issuance matches the one the network
//! returns.

use crate::error::{CertificateError, Result};
use crate::utils::crypto::{base32_decode, base32_encode, hash_data};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const CID_VERSION: u8 = 0x01;
const RAW_CODEC: u8 = 0x55;
const SHA2_256_CODE: u8 = 0x12;
const SHA2_256_LEN: u8 = 0x20;
const MULTIBASE_BASE32: char = 'b';

/// Deterministic identifier of stored bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId {
    digest: [u8; 32],
}

impl ContentId {
    /// Computes the identifier of `bytes`.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        ContentId {
            digest: hash_data(bytes),
        }
    }

    /// The sha2-256 digest this identifier wraps.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Whether `bytes` hash to this identifier.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        hash_data(bytes) == self.digest
    }

    /// Binary CID form: version, codec, multihash code, digest length, digest.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.digest.len());
        out.extend_from_slice(&[CID_VERSION, RAW_CODEC, SHA2_256_CODE, SHA2_256_LEN]);
        out.extend_from_slice(&self.digest);
        out
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MULTIBASE_BASE32, base32_encode(&self.to_bytes()))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({self})")
    }
}

impl FromStr for ContentId {
    type Err = CertificateError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix(MULTIBASE_BASE32)
            .ok_or_else(|| CertificateError::invalid_format(format!("unsupported CID multibase: {s}")))?;
        let bytes = base32_decode(body)
            .ok_or_else(|| CertificateError::invalid_format(format!("CID is not base32: {s}")))?;

        match bytes.as_slice() {
            [CID_VERSION, RAW_CODEC, SHA2_256_CODE, SHA2_256_LEN, digest @ ..] if digest.len() == 32 => {
                let mut out = [0u8; 32];
                out.copy_from_slice(digest);
                Ok(ContentId { digest: out })
            }
            _ => Err(CertificateError::invalid_format(format!(
                "CID is not a raw sha2-256 CIDv1: {s}"
            ))),
        }
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_ipfs_raw_block_cid() {
        // `echo -n hello | ipfs add --cid-version=1 --raw-leaves`
        let cid = ContentId::for_bytes(b"hello");
        assert_eq!(
            cid.to_string(),
            "bafkreibm6jg3ux5qumhcn2b3flc3tyu6dmlb4xa7u5bf44yegnrjhc4yeq"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let cid = ContentId::for_bytes(b"solar-farm-1");
        let parsed: ContentId = cid.to_string().parse().unwrap();
        assert_eq!(parsed, cid);
        assert!(parsed.matches(b"solar-farm-1"));
        assert!(!parsed.matches(b"solar-farm-2"));
    }

    #[test]
    fn test_same_bytes_same_cid() {
        assert_eq!(ContentId::for_bytes(b"abc"), ContentId::for_bytes(b"abc"));
        assert_ne!(ContentId::for_bytes(b"abc"), ContentId::for_bytes(b"abd"));
    }

    #[test]
    fn test_rejects_foreign_cids() {
        // CIDv0 (base58btc, dag-pb)
        assert!("QmWATWQ7fVPP2EFGu71UkfnqhYXDYH566qy47CnJDgvs8u".parse::<ContentId>().is_err());
        // base32 but dag-pb codec
        assert!("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
            .parse::<ContentId>()
            .is_err());
        assert!("b".parse::<ContentId>().is_err());
        assert!("".parse::<ContentId>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let cid = ContentId::for_bytes(b"x");
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!("\"{cid}\""));
        let back: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cid);
    }
}
