// src/wallet/key_management.rs
//! Issuer key management on brainpoolP512r1.
//!
//! Provides generation, loading, signing and verification for the issuer's
//! ECDSA key pair.
//!
//! Uses the following cryptographic primitives:
//! - brainpoolP512r1 curve (via the `openssl` crate)
//! - SHA-512 prehashing (via `ring`)
//! - ECDSA with a randomized nonce from OpenSSL's CSPRNG
//!
//! The nonce scheme is fixed for this crate but invisible to verifiers: any
//! valid ECDSA signature over the SHA-512 prehash verifies.

use crate::error::{KeyError, KeyGenerationError};
use crate::utils::crypto::sha512;
use log::debug;
use openssl::bn::BigNumContext;
use openssl::ec::{EcGroup, EcKey, EcPoint, PointConversionForm};
use openssl::ecdsa::EcdsaSig;
use openssl::nid::Nid;
use openssl::pkey::{HasParams, Private, Public};
use std::fmt;

/// Curve used for every issuer key.
pub const CURVE: Nid = Nid::BRAINPOOL_P512R1;

/// Length of an uncompressed SEC1 point on the curve (0x04 || X || Y).
pub const PUBLIC_KEY_LEN: usize = 1 + 2 * 64;

fn curve_group() -> Result<EcGroup, openssl::error::ErrorStack> {
    EcGroup::from_curve_name(CURVE)
}

fn is_on_curve<T: HasParams>(key: &EcKey<T>) -> bool {
    key.group().curve_name() == Some(CURVE)
}

/// Issuer public key distributed out of band to verifiers.
#[derive(Clone)]
pub struct PublicKey {
    key: EcKey<Public>,
}

impl PublicKey {
    /// Parses an uncompressed or compressed SEC1 point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let group = curve_group().map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        let mut ctx = BigNumContext::new().map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        let point = EcPoint::from_bytes(&group, bytes, &mut ctx)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        let key = EcKey::from_public_key(&group, &point)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        key.check_key()
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { key })
    }

    /// Parses a PEM `PUBLIC KEY` (SubjectPublicKeyInfo) block.
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        let key = EcKey::public_key_from_pem(pem).map_err(|e| KeyError::InvalidPem(e.to_string()))?;
        if !is_on_curve(&key) {
            return Err(KeyError::WrongCurve);
        }
        key.check_key()
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { key })
    }

    /// Uncompressed SEC1 encoding, [`PUBLIC_KEY_LEN`] bytes.
    pub fn to_sec1_bytes(&self) -> Result<Vec<u8>, KeyError> {
        let mut ctx = BigNumContext::new().map_err(|e| KeyError::Export(e.to_string()))?;
        self.key
            .public_key()
            .to_bytes(self.key.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)
            .map_err(|e| KeyError::Export(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<Vec<u8>, KeyError> {
        self.key
            .public_key_to_pem()
            .map_err(|e| KeyError::Export(e.to_string()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_sec1_bytes(), other.to_sec1_bytes()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fingerprint = self
            .to_sec1_bytes()
            .map(|b| hex::encode(&crate::utils::crypto::sha256(&b)[..8]))
            .unwrap_or_else(|_| "<unencodable>".to_string());
        write!(f, "PublicKey(brainpoolP512r1, {})", fingerprint)
    }
}

/// Issuer signing key pair.
///
/// # Security Notes
/// - The private key never leaves this struct except through [`KeyManager::to_pem`]
/// - Signing consumes fresh OpenSSL randomness for every nonce
#[derive(Clone)]
pub struct KeyManager {
    /// Private scalar, never exposed
    secret_key: EcKey<Private>,
    /// Derived public key for verification
    pub public_key: PublicKey,
}

impl KeyManager {
    /// Generates a fresh key pair on brainpoolP512r1.
    ///
    /// # Errors
    /// `KeyGenerationError` if OpenSSL cannot build the curve or its RNG
    /// fails to produce a scalar.
    pub fn generate() -> Result<Self, KeyGenerationError> {
        let group = curve_group().map_err(|e| KeyGenerationError::Backend(e.to_string()))?;
        let secret_key =
            EcKey::generate(&group).map_err(|e| KeyGenerationError::RandomSource(e.to_string()))?;
        let key_manager = Self::from_private(secret_key)
            .map_err(|e| KeyGenerationError::Backend(e.to_string()))?;
        debug!("generated issuer key {:?}", key_manager.public_key);
        Ok(key_manager)
    }

    /// Loads a PEM `EC PRIVATE KEY` or PKCS#8 `PRIVATE KEY` block.
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        let secret_key =
            EcKey::private_key_from_pem(pem).map_err(|e| KeyError::InvalidPem(e.to_string()))?;
        if !is_on_curve(&secret_key) {
            return Err(KeyError::WrongCurve);
        }
        secret_key
            .check_key()
            .map_err(|e| KeyError::InvalidPem(e.to_string()))?;
        Self::from_private(secret_key)
    }

    fn from_private(secret_key: EcKey<Private>) -> Result<Self, KeyError> {
        let key = EcKey::from_public_key(secret_key.group(), secret_key.public_key())
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Ok(KeyManager {
            secret_key,
            public_key: PublicKey { key },
        })
    }

    pub fn to_pem(&self) -> Result<Vec<u8>, KeyError> {
        self.secret_key
            .private_key_to_pem()
            .map_err(|e| KeyError::Export(e.to_string()))
    }

    /// Signs `message` with ECDSA over its SHA-512 digest.
    ///
    /// # Returns
    /// DER-encoded `(r, s)`; at most 139 bytes on this curve.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let hash = sha512(message);
        let signature =
            EcdsaSig::sign(&hash, &self.secret_key).map_err(|e| KeyError::Signing(e.to_string()))?;
        signature.to_der().map_err(|e| KeyError::Signing(e.to_string()))
    }
}

/// Verifies a DER signature over `message` against `public_key`.
///
/// Never fails: malformed DER, non-canonical encodings, out-of-range
/// `(r, s)` and backend errors all come back as `false`.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    let parsed = match EcdsaSig::from_der(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    // Reject alternate encodings of the same (r, s).
    match parsed.to_der() {
        Ok(canonical) if canonical == signature => {}
        _ => return false,
    }
    let hash = sha512(message);
    parsed.verify(&hash, &public_key.key).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyManager::generate().unwrap();
        let signature = keys.sign(b"health token").unwrap();
        assert!(verify_signature(&keys.public_key, b"health token", &signature));
        assert!(!verify_signature(&keys.public_key, b"health tokem", &signature));
    }

    #[test]
    fn test_wrong_key_rejects() {
        let issuer = KeyManager::generate().unwrap();
        let stranger = KeyManager::generate().unwrap();
        let signature = issuer.sign(b"payload").unwrap();
        assert!(!verify_signature(&stranger.public_key, b"payload", &signature));
    }

    #[test]
    fn test_garbage_signatures_return_false() {
        let keys = KeyManager::generate().unwrap();
        assert!(!verify_signature(&keys.public_key, b"m", &[]));
        assert!(!verify_signature(&keys.public_key, b"m", &[0x30, 0x02, 0x01]));
        assert!(!verify_signature(&keys.public_key, b"m", &[0xFF; 139]));

        // Valid DER but r = s = 0.
        let zero_sig = [0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00];
        assert!(!verify_signature(&keys.public_key, b"m", &zero_sig));
    }

    #[test]
    fn test_trailing_bytes_after_der_rejected() {
        let keys = KeyManager::generate().unwrap();
        let mut signature = keys.sign(b"m").unwrap();
        signature.push(0x00);
        assert!(!verify_signature(&keys.public_key, b"m", &signature));
    }

    #[test]
    fn test_public_key_sec1_round_trip() {
        let keys = KeyManager::generate().unwrap();
        let bytes = keys.public_key.to_sec1_bytes().unwrap();
        assert_eq!(bytes.len(), PUBLIC_KEY_LEN);
        let parsed = PublicKey::from_sec1_bytes(&bytes).unwrap();
        assert_eq!(parsed, keys.public_key);
    }

    #[test]
    fn test_point_off_curve_rejected() {
        let mut bytes = vec![0x04];
        bytes.extend_from_slice(&[0x01; 128]);
        assert!(PublicKey::from_sec1_bytes(&bytes).is_err());
    }

    #[test]
    fn test_pem_round_trip() {
        let keys = KeyManager::generate().unwrap();
        let restored = KeyManager::from_pem(&keys.to_pem().unwrap()).unwrap();
        assert_eq!(restored.public_key, keys.public_key);

        let public = PublicKey::from_pem(&keys.public_key.to_pem().unwrap()).unwrap();
        let signature = restored.sign(b"m").unwrap();
        assert!(verify_signature(&public, b"m", &signature));
    }

    #[test]
    fn test_pem_on_other_curve_rejected() {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let other = EcKey::generate(&group).unwrap();
        let pem = other.private_key_to_pem().unwrap();
        assert!(matches!(KeyManager::from_pem(&pem), Err(KeyError::WrongCurve)));
    }
}
