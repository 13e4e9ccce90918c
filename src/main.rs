// src/main.rs

//! # Health Token Demonstrator - Main Entry Point
//!
//! Issues and verifies one health token, then runs the configured privacy
//! simulation and prints per-cell error summaries as JSON lines on stdout.
//! The transport string printed for the token is the payload an external
//! tool renders as a QR code.
//!
//! ## Configuration
//! See [`dpht::config`]. Commonly used variables:
//! - `DPHT_ISSUER__KEY_PATH`: PEM issuer key (generated when unset)
//! - `DPHT_REVOCATION__LIST_PATH`: hex CID revocation list
//! - `DPHT_SIMULATION__SEED`: fixes the simulation RNG
//! - `RUST_LOG`: log filter (falls back to `log_level`)

use anyhow::{Context, Result};
use dpht::config::AppConfig;
use dpht::privacy::simulation::{write_json_lines, SimulationHarness};
use dpht::utils::serialization;
use dpht::{CredentialIssuer, KeyManager, LoadMode, RevocationRegistry, Verifier};
use dotenv::dotenv;
use log::{info, warn};
use std::fs;
use std::io::{self, BufReader};
use std::sync::Arc;

fn load_issuer_keys(config: &AppConfig) -> Result<KeyManager> {
    match &config.issuer.key_path {
        Some(path) => {
            let pem = fs::read(path)
                .with_context(|| format!("failed to read issuer key {}", path.display()))?;
            let keys = KeyManager::from_pem(&pem)
                .with_context(|| format!("invalid issuer key {}", path.display()))?;
            info!("loaded issuer key from {}", path.display());
            Ok(keys)
        }
        None => {
            warn!("no issuer key configured, generating an ephemeral one");
            Ok(KeyManager::generate()?)
        }
    }
}

fn load_revocations(config: &AppConfig) -> Result<Arc<RevocationRegistry>> {
    let registry = Arc::new(RevocationRegistry::new());
    if let Some(path) = &config.revocation.list_path {
        let file = fs::File::open(path)
            .with_context(|| format!("failed to open revocation list {}", path.display()))?;
        registry
            .load_from_reader(BufReader::new(file), LoadMode::Merge)
            .with_context(|| format!("invalid revocation list {}", path.display()))?;
    }
    Ok(registry)
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let keys = load_issuer_keys(&config)?;
    let issuer = CredentialIssuer::new(keys).with_issued_at(config.issuer.stamp_issued_at);
    let verifier = Verifier::new(issuer.public_key().clone(), load_revocations(&config)?);

    let credential = issuer.issue()?;
    let encoded = serialization::encode(&credential)?;
    info!("token cid: {}", credential.cid());
    info!("token payload: {}", serialization::to_transport_string(&encoded));

    let verdict = verifier.verify(&encoded);
    info!("verification: {}", verdict.label());

    let harness = SimulationHarness::new(config.simulation.clone())?;
    let summaries = harness.summarize()?;
    write_json_lines(io::stdout().lock(), &summaries)?;

    Ok(())
}
