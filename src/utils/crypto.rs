// src/utils/crypto.rs
//! Digest helpers shared by the issuer, the verifier and the key manager.
//!
//! Two digests are in play:
//! - SHA-256 derives the credential identifier (CID) from the user token
//! - SHA-512 prehashes the signed message, matching the 512-bit curve order

use ring::digest::{digest, SHA256, SHA512};

/// Computes the SHA-256 digest of `data`.
///
/// # Example
/// ```
/// let hash = dpht::utils::crypto::sha256(b"hello world");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest(&SHA256, data).as_ref());
    out
}

/// Computes the SHA-512 digest of `data`, the prehash fed to ECDSA.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(digest(&SHA512, data).as_ref());
    out
}
