// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Mints health tokens: a fresh random user token, signed by the issuer key.
//!
//! Issuance is stateless. The issuer keeps no record of which token went to
//! which holder; unlinkability rests on that.

use crate::error::{DphtError, KeyGenerationError};
use crate::models::credential::{signed_message, Credential, USER_TOKEN_LEN};
use crate::utils::serialization;
use crate::wallet::key_management::{KeyManager, PublicKey};
use log::debug;
use rand::rngs::OsRng;
use rand::RngCore;

/// Service for issuing signed health tokens.
#[derive(Clone)]
pub struct CredentialIssuer {
    /// Issuer signing keys
    key_manager: KeyManager,

    /// Stamp an issuance time (layout v2) into every credential
    stamp_issued_at: bool,
}

impl CredentialIssuer {
    /// Creates an issuer producing layout v1 credentials (token only).
    pub fn new(key_manager: KeyManager) -> Self {
        Self {
            key_manager,
            stamp_issued_at: false,
        }
    }

    /// Switches issuance to layout v2, signing the current Unix time along
    /// with the token.
    pub fn with_issued_at(mut self, stamp: bool) -> Self {
        self.stamp_issued_at = stamp;
        self
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.key_manager.public_key
    }

    /// Issues a new credential.
    ///
    /// # Errors
    /// - `KeyGenerationError` if the OS random source fails
    /// - `KeyError` if the signing backend fails
    pub fn issue(&self) -> Result<Credential, DphtError> {
        let mut user_token = [0u8; USER_TOKEN_LEN];
        OsRng
            .try_fill_bytes(&mut user_token)
            .map_err(|e| KeyGenerationError::RandomSource(e.to_string()))?;

        let issued_at = if self.stamp_issued_at {
            Some(chrono::Utc::now().timestamp().max(0) as u64)
        } else {
            None
        };

        let signature = self.key_manager.sign(&signed_message(&user_token, issued_at))?;
        let credential = Credential::new(user_token, issued_at, signature);
        debug!("issued credential cid={}", credential.cid());
        Ok(credential)
    }

    /// Issues a credential and returns its binary encoding.
    pub fn issue_encoded(&self) -> Result<Vec<u8>, DphtError> {
        let credential = self.issue()?;
        Ok(serialization::encode(&credential)?)
    }
}
