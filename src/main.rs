// src/main.rs

//! # Energy Certificates - Command Line Entry Point
//!
//! Wires settings, logging, the IPFS store and the certificate registry,
//! then runs a single command.
//!
//! ## Commands
//! - `keygen`: print a fresh issuer key pair as hex
//! - `issue <issuer> <mwh> <valid_until>`: sign and store a certificate,
//!   print its CID (key from `CERTS_ISSUER_PRIVATE_KEY`)
//! - `verify <cid> <public_key_hex>`: fetch a certificate and print the outcome
//!
//! ## Environment Variables
//! - `CERTS_IPFS_API_URL`: (Optional) IPFS node URL (default: http://localhost:5001)
//! - `CERTS_ISSUER_PRIVATE_KEY`: hex issuer key, required by `issue`
//! - `CERTS_RETRY_ATTEMPTS`, `CERTS_RETRY_BASE_DELAY_MS`,
//!   `CERTS_RETRY_MAX_DELAY_MS`, `CERTS_STORE_TIMEOUT_MS`: store retry policy
//! - `RUST_LOG`: log filter (default: `info`)

use anyhow::{bail, Context};
use dotenv::dotenv;
use energy_certificates::{
    Certificate, CertificateRegistry, ContentId, ContentStore, EcdsaKeyManager, IpfsStorage, KeyManager,
    PrivateKey, PublicKey, Settings, VerificationResult,
};
use log::{info, warn};

const USAGE: &str = "usage:
  energy-certificates keygen
  energy-certificates issue <issuer> <mwh> <valid_until>
  energy-certificates verify <cid> <public_key_hex>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("failed to load settings")?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["keygen"] => {
            let pair = EcdsaKeyManager::new().generate_key_pair()?;
            println!("private_key: {}", pair.private_key.to_hex());
            println!("public_key:  {}", pair.public_key.to_hex());
        }
        ["issue", issuer, mwh, valid_until] => {
            let key_hex = settings
                .issuer_private_key
                .as_deref()
                .context("CERTS_ISSUER_PRIVATE_KEY must be set to issue certificates")?;
            let private_key = PrivateKey::from_hex(key_hex)?;
            let registry = registry(&settings)?;

            info!("storing certificates at {}", registry.store().endpoint());
            let cid = registry
                .issue_certificate(issuer, mwh, valid_until, &private_key)
                .await?;
            println!("{cid}");
        }
        ["verify", cid, public_key] => {
            let cid: ContentId = cid.parse()?;
            let public_key = PublicKey::from_hex(public_key)?;
            let registry = registry(&settings)?;

            let (result, certificate) = verify(&registry, &cid, &public_key).await?;
            println!("{}", serde_json::to_string(&result)?);
            if let Some(certificate) = certificate {
                println!("{certificate}");
            }
        }
        _ => bail!(USAGE),
    }
    Ok(())
}

fn registry(settings: &Settings) -> anyhow::Result<CertificateRegistry<IpfsStorage>> {
    let store = IpfsStorage::with_url(&settings.ipfs_api_url)?;
    Ok(CertificateRegistry::new(store, settings.retry_policy()))
}

/// Verifies first, then fetches the certificate for display. A block that
/// cannot be shown still gets its verification outcome.
async fn verify<S: ContentStore>(
    registry: &CertificateRegistry<S>,
    cid: &ContentId,
    public_key: &PublicKey,
) -> anyhow::Result<(VerificationResult, Option<Certificate>)> {
    let result = registry.verify_certificate(cid, public_key).await?;
    let certificate = match registry.fetch_certificate(cid).await {
        Ok(certificate) => Some(certificate),
        Err(e) => {
            warn!("cannot display {cid}: {e}");
            None
        }
    };
    Ok((result, certificate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use energy_certificates::{InvalidReason, RetryPolicy, StorageError};

    /// Serves the same unreadable block for every CID.
    struct CorruptStore;

    #[async_trait]
    impl ContentStore for CorruptStore {
        async fn put(&self, bytes: &[u8]) -> Result<ContentId, StorageError> {
            Ok(ContentId::for_bytes(bytes))
        }

        async fn get(&self, _cid: &ContentId) -> Result<Vec<u8>, StorageError> {
            Ok(b"not a certificate".to_vec())
        }
    }

    #[tokio::test]
    async fn test_verify_reports_corrupt_block_as_invalid_format() {
        let registry = CertificateRegistry::new(CorruptStore, RetryPolicy::default());
        let pair = EcdsaKeyManager::new().generate_key_pair().unwrap();
        let cid = ContentId::for_bytes(b"solar-farm-1 12.5 MWh");

        let (result, certificate) = verify(&registry, &cid, &pair.public_key).await.unwrap();
        assert_eq!(result, VerificationResult::Invalid(InvalidReason::Format));
        assert!(certificate.is_none());
    }
}
