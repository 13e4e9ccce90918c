// src/error.rs
//! Error taxonomy for the health token system.
//!
//! Issuance and key handling surface real errors. Verification never does:
//! every structural or cryptographic failure is folded into a
//! [`Verdict`](crate::services::verifier::Verdict) at the verifier boundary.

use thiserror::Error;

/// The random source or curve backend could not produce key material.
#[derive(Debug, Error)]
pub enum KeyGenerationError {
    #[error("random source unavailable: {0}")]
    RandomSource(String),

    #[error("curve backend failure: {0}")]
    Backend(String),
}

/// Loading or exporting an existing key failed.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid PEM key: {0}")]
    InvalidPem(String),

    #[error("key is not on brainpoolP512r1")]
    WrongCurve,

    #[error("invalid public key encoding: {0}")]
    InvalidPublicKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key export failed: {0}")]
    Export(String),
}

/// Programmer misuse while laying out a credential.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("signature is empty")]
    EmptySignature,

    #[error("signature of {0} bytes does not fit a one-byte length prefix")]
    SignatureTooLong(usize),
}

/// Structural failure while reading a presented credential.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodingError {
    #[error("empty payload")]
    Empty,

    #[error("unknown layout version {0:#04x}")]
    UnknownVersion(u8),

    #[error("payload truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("signature length prefix is zero")]
    EmptySignature,

    #[error("signature truncated: expected {expected} bytes, got {actual}")]
    TruncatedSignature { expected: usize, actual: usize },

    #[error("{0} trailing bytes after signature")]
    TrailingBytes(usize),

    #[error("transport armour is not valid base64: {0}")]
    Armour(String),
}

/// A distributed revocation list could not be applied.
#[derive(Debug, Error)]
pub enum RevocationListError {
    #[error("line {line}: {reason}")]
    InvalidEntry { line: usize, reason: String },

    #[error("replacement list omits {missing} revoked CIDs")]
    WouldUnrevoke { missing: usize },

    #[error("failed to read revocation list: {0}")]
    Io(#[from] std::io::Error),
}

/// Privacy parameters outside their valid domain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PrivacyError {
    #[error("epsilon must be positive and finite, got {0}")]
    InvalidEpsilon(f64),

    #[error("sensitivity must be positive and finite, got {0}")]
    InvalidSensitivity(f64),

    #[error("prevalence must lie in [0, 1], got {0}")]
    InvalidPrevalence(f64),

    #[error("epsilon {epsilon} with sensitivity {sensitivity} gives a noise scale outside f64 range")]
    UnrepresentableNoise { epsilon: f64, sensitivity: f64 },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("simulation grid is empty: {0}")]
    EmptyGrid(&'static str),

    #[error("trial count must be at least 1")]
    NoTrials,

    #[error(transparent)]
    Privacy(#[from] PrivacyError),

    #[error("failed to write simulation output: {0}")]
    Output(String),
}

/// Top-level error for library consumers that do not care which stage failed.
#[derive(Debug, Error)]
pub enum DphtError {
    #[error(transparent)]
    KeyGeneration(#[from] KeyGenerationError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Decoding(#[from] DecodingError),

    #[error(transparent)]
    RevocationList(#[from] RevocationListError),

    #[error(transparent)]
    Privacy(#[from] PrivacyError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, DphtError>;
