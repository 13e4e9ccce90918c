// src/services/verifier.rs
//! Offline credential verification.
//!
//! A verifier holds the issuer public key and a handle to the local
//! revocation registry. Checks run in a fixed order:
//! 1. structural decode (cheapest, no key material)
//! 2. issuer signature
//! 3. revocation lookup, only for genuine credentials
//!
//! Every input yields exactly one [`Verdict`]; adversarial bytes never
//! produce an error.

use crate::error::DecodingError;
use crate::models::credential::{Cid, Credential};
use crate::storage::revocation_registry::RevocationRegistry;
use crate::utils::serialization;
use crate::wallet::key_management::{verify_signature, PublicKey};
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// Terminal outcome of verifying one presented credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    RejectedBadSignature,
    RejectedRevoked,
    RejectedMalformed(DecodingError),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Short, stable label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::RejectedBadSignature => "rejected_bad_signature",
            Verdict::RejectedRevoked => "rejected_revoked",
            Verdict::RejectedMalformed(_) => "rejected_malformed",
        }
    }
}

/// Serializable summary of a verification, for display by scanning tools.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub verdict: &'static str,
    /// Set once the payload decoded
    pub cid: Option<Cid>,
    pub issued_at: Option<u64>,
    /// Decoding failure reason, for malformed payloads
    pub reason: Option<String>,
}

/// Offline verifier bound to one issuer key.
#[derive(Clone)]
pub struct Verifier {
    issuer_key: PublicKey,
    registry: Arc<RevocationRegistry>,
}

impl Verifier {
    pub fn new(issuer_key: PublicKey, registry: Arc<RevocationRegistry>) -> Self {
        Self {
            issuer_key,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<RevocationRegistry> {
        &self.registry
    }

    /// Verifies raw credential bytes as scanned from a barcode.
    pub fn verify(&self, presented: &[u8]) -> Verdict {
        match serialization::decode(presented) {
            Ok(credential) => self.verify_credential(&credential),
            Err(reason) => {
                debug!("malformed credential: {}", reason);
                Verdict::RejectedMalformed(reason)
            }
        }
    }

    /// Verifies the base64 armoured form.
    pub fn verify_transport(&self, armoured: &str) -> Verdict {
        match serialization::from_transport_string(armoured) {
            Ok(bytes) => self.verify(&bytes),
            Err(reason) => Verdict::RejectedMalformed(reason),
        }
    }

    /// Verifies an already decoded credential (signature, then revocation).
    pub fn verify_credential(&self, credential: &Credential) -> Verdict {
        if !verify_signature(
            &self.issuer_key,
            &credential.signed_message(),
            credential.signature(),
        ) {
            debug!("bad signature on cid={}", credential.cid());
            return Verdict::RejectedBadSignature;
        }

        let cid = credential.cid();
        if self.registry.contains(&cid) {
            debug!("revoked cid={}", cid);
            return Verdict::RejectedRevoked;
        }

        debug!("accepted cid={}", cid);
        Verdict::Accepted
    }

    /// Verifies and packages the outcome with whatever the payload revealed.
    pub fn report(&self, presented: &[u8]) -> VerificationReport {
        match serialization::decode(presented) {
            Ok(credential) => VerificationReport {
                verdict: self.verify_credential(&credential).label(),
                cid: Some(credential.cid()),
                issued_at: credential.issued_at(),
                reason: None,
            },
            Err(reason) => VerificationReport {
                verdict: Verdict::RejectedMalformed(reason.clone()).label(),
                cid: None,
                issued_at: None,
                reason: Some(reason.to_string()),
            },
        }
    }
}
