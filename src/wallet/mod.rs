// src/wallet/mod.rs
//! Issuer key material and the signing primitives built on it.

pub mod key_management;

pub use key_management::{
    EcdsaKeyManager, KeyManager, KeyPair, PrivateKey, PublicKey, Signature, SIGNATURE_LEN,
};
