// src/lib.rs

//! # Differentially Private Health Tokens
//!
//! Self-contained health credentials that a verifier checks offline, plus the
//! differential-privacy machinery used to estimate aggregate usage from
//! noised counts.
//!
//! ## Architecture Overview
//! 1. **Wallet Layer**: `KeyManager` for brainpoolP512r1 issuer keys
//! 2. **Models / Utils**: credential layout, CID digests and the binary codec
//! 3. **Services Layer**: stateless issuance and offline verification
//! 4. **Storage Layer**: snapshot-swapped revocation registry
//! 5. **Privacy Layer**: Laplace, geometric and randomized-response
//!    mechanisms and the error simulation harness
//!
//! ## Example
//! ```no_run
//! use dpht::services::credential_issuer::CredentialIssuer;
//! use dpht::services::verifier::{Verdict, Verifier};
//! use dpht::storage::revocation_registry::RevocationRegistry;
//! use dpht::wallet::key_management::KeyManager;
//! use std::sync::Arc;
//!
//! let issuer = CredentialIssuer::new(KeyManager::generate()?);
//! let registry = Arc::new(RevocationRegistry::new());
//! let verifier = Verifier::new(issuer.public_key().clone(), registry.clone());
//!
//! let bytes = issuer.issue_encoded()?;
//! assert_eq!(verifier.verify(&bytes), Verdict::Accepted);
//! # Ok::<(), dpht::error::DphtError>(())
//! ```

pub mod config;      // Layered configuration
pub mod error;       // Error taxonomy
pub mod models;      // Credential data model
pub mod privacy;     // Differential privacy and simulation
pub mod services;    // Issuance and verification
pub mod storage;     // Revocation registry
pub mod utils;       // Digests and codec
pub mod wallet;      // Issuer key management

pub use error::{DphtError, Result};
pub use models::credential::{Cid, Credential};
pub use services::credential_issuer::CredentialIssuer;
pub use services::verifier::{Verdict, Verifier};
pub use storage::revocation_registry::{LoadMode, RevocationRegistry};
pub use wallet::key_management::{KeyManager, PublicKey};
