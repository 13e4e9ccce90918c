// src/config/mod.rs
//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults ([`AppConfig::default`])
//! 2. optional `dpht.toml` in the working directory
//! 3. environment variables prefixed `DPHT_`, with `__` between sections,
//!    e.g. `DPHT_SIMULATION__TRIALS=100` or `DPHT_SIMULATION__EPSILONS=0.1,1.0`
//!
//! `main` loads a `.env` file first, so its entries count as environment.

use crate::privacy::simulation::SimulationConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "dpht.toml";
pub const ENV_PREFIX: &str = "DPHT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// PEM private key; a fresh key is generated when unset
    pub key_path: Option<PathBuf>,
    /// Issue layout v2 credentials carrying a signed issuance time
    pub stamp_issued_at: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevocationConfig {
    /// Hex CID list, one per line
    pub list_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub issuer: IssuerConfig,
    pub revocation: RevocationConfig,
    pub simulation: SimulationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            issuer: IssuerConfig::default(),
            revocation: RevocationConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl AppConfig {
    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder().add_source(Config::try_from(&AppConfig::default())?))
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("simulation.population_sizes")
            .with_list_parse_key("simulation.epsilons")
    }

    /// Loads defaults, `dpht.toml` if present, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from(path).required(false))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with an in-memory TOML document. Ignores the
    /// environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privacy::mechanism::MechanismKind;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.simulation.trials, 50);
        assert!(config.issuer.key_path.is_none());
    }

    #[test]
    fn test_toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            log_level = "debug"

            [issuer]
            key_path = "keys/sign_key.pem"
            stamp_issued_at = true

            [simulation]
            population_sizes = [1, 2, 3]
            epsilons = [0.25]
            trials = 5
            seed = 99
            mechanism = { kind = "randomized_response", prevalence = 0.02 }
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.issuer.key_path, Some(PathBuf::from("keys/sign_key.pem")));
        assert!(config.issuer.stamp_issued_at);
        assert_eq!(config.simulation.population_sizes, vec![1, 2, 3]);
        assert_eq!(config.simulation.epsilons, vec![0.25]);
        assert_eq!(config.simulation.seed, Some(99));
        assert_eq!(
            config.simulation.mechanism,
            MechanismKind::RandomizedResponse { prevalence: 0.02 }
        );
        // Untouched keys keep their defaults.
        assert_eq!(config.simulation.sensitivity, 1.0);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config = AppConfig::load_from(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.issuer, IssuerConfig::default());
    }
}
