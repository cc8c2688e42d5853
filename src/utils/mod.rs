// src/utils/mod.rs
//! Hashing, text encodings and the canonical certificate codec.

pub mod crypto;
pub mod encoding;
