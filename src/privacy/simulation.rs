// src/privacy/simulation.rs
//! Estimation-error sweeps over `(num_users, epsilon, trial)`.
//!
//! Each `(num_users, epsilon)` cell owns a ChaCha8 stream derived from the
//! base seed and the cell index, so cells share no RNG state and can run on
//! separate workers. A configured seed reproduces every row exactly; without
//! one, the base seed is drawn from the OS each time a sweep starts.

use crate::error::{DphtError, PrivacyError, SimulationError};
use crate::privacy::mechanism::{
    validate_sensitivity, GeometricMechanism, LaplaceMechanism, MechanismKind,
    NoiseMechanism, RandomizedResponse,
};
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::verifier::Verifier;
use crate::storage::revocation_registry::RevocationRegistry;
use crate::wallet::key_management::KeyManager;
use log::{debug, info};
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

/// Sweep parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub population_sizes: Vec<u64>,
    pub epsilons: Vec<f64>,
    pub trials: usize,
    pub sensitivity: f64,
    pub mechanism: MechanismKind,
    /// Fixes every draw when set
    pub seed: Option<u64>,
    /// Derive each true count by issuing and verifying real credentials
    pub issue_credentials: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population_sizes: vec![10, 50, 100, 200],
            epsilons: vec![0.1, 0.5, 1.0, 2.0],
            trials: 50,
            sensitivity: 1.0,
            mechanism: MechanismKind::Laplace,
            seed: None,
            issue_credentials: false,
        }
    }
}

/// One trial in one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    pub num_users: u64,
    pub epsilon: f64,
    pub trial: usize,
    /// Count, or realised prevalence for randomized response
    pub true_value: f64,
    pub estimate: f64,
    pub signed_error: f64,
    pub abs_error: f64,
}

/// Aggregate over all trials of one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSummary {
    pub num_users: u64,
    pub epsilon: f64,
    pub trials: usize,
    pub mean_error: f64,
    pub mean_abs_error: f64,
    /// Sample variance of the signed error
    pub error_variance: f64,
    /// Closed-form mean absolute error for comparison
    pub expected_abs_error: f64,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    num_users: u64,
    epsilon: f64,
}

enum CellMechanism {
    Laplace(LaplaceMechanism),
    Geometric(GeometricMechanism),
    RandomizedResponse(RandomizedResponse, f64),
}

impl CellMechanism {
    fn expected_abs_error(&self, num_users: u64) -> f64 {
        match self {
            CellMechanism::Laplace(m) => m.expected_abs_error(),
            CellMechanism::Geometric(m) => m.expected_abs_error(),
            CellMechanism::RandomizedResponse(rr, _) => rr.expected_abs_error(num_users),
        }
    }
}

struct Pipeline {
    issuer: CredentialIssuer,
    verifier: Verifier,
}

/// Drives the privacy mechanisms (and optionally the credential pipeline)
/// across a configured grid.
pub struct SimulationHarness {
    config: SimulationConfig,
    pipeline: Option<Pipeline>,
}

impl SimulationHarness {
    /// Validates the grid. With `issue_credentials` set, a throwaway issuer
    /// key is generated for the sweep.
    pub fn new(config: SimulationConfig) -> Result<Self, DphtError> {
        if config.population_sizes.is_empty() {
            return Err(SimulationError::EmptyGrid("population_sizes").into());
        }
        if config.epsilons.is_empty() {
            return Err(SimulationError::EmptyGrid("epsilons").into());
        }
        if config.trials == 0 {
            return Err(SimulationError::NoTrials.into());
        }
        validate_sensitivity(config.sensitivity)?;
        if let MechanismKind::RandomizedResponse { prevalence } = config.mechanism {
            if !(0.0..=1.0).contains(&prevalence) {
                return Err(PrivacyError::InvalidPrevalence(prevalence).into());
            }
        }
        for &epsilon in &config.epsilons {
            Self::mechanism_for(&config, epsilon)?;
        }

        let pipeline = if config.issue_credentials {
            let issuer = CredentialIssuer::new(KeyManager::generate()?);
            let verifier = Verifier::new(issuer.public_key().clone(), Arc::new(RevocationRegistry::new()));
            Some(Pipeline { issuer, verifier })
        } else {
            None
        };

        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn cells(&self) -> Vec<Cell> {
        self.config
            .population_sizes
            .iter()
            .flat_map(|&num_users| {
                self.config
                    .epsilons
                    .iter()
                    .map(move |&epsilon| Cell { num_users, epsilon })
            })
            .collect()
    }

    fn base_seed(&self) -> u64 {
        self.config.seed.unwrap_or_else(|| OsRng.next_u64())
    }

    fn cell_rng(base_seed: u64, cell_index: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
        rng.set_stream(cell_index as u64);
        rng
    }

    fn mechanism_for(config: &SimulationConfig, epsilon: f64) -> Result<CellMechanism, PrivacyError> {
        let sensitivity = config.sensitivity;
        Ok(match config.mechanism {
            MechanismKind::Laplace => CellMechanism::Laplace(LaplaceMechanism::new(epsilon, sensitivity)?),
            MechanismKind::Geometric => {
                CellMechanism::Geometric(GeometricMechanism::new(epsilon, sensitivity)?)
            }
            MechanismKind::RandomizedResponse { prevalence } => {
                CellMechanism::RandomizedResponse(RandomizedResponse::new(epsilon)?, prevalence)
            }
        })
    }

    fn true_count(&self, num_users: u64) -> Result<u64, DphtError> {
        let pipeline = match &self.pipeline {
            Some(pipeline) => pipeline,
            None => return Ok(num_users),
        };
        let mut accepted = 0;
        for _ in 0..num_users {
            let bytes = pipeline.issuer.issue_encoded()?;
            if pipeline.verifier.verify(&bytes).is_accepted() {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    fn run_trial(
        &self,
        cell: Cell,
        mechanism: &CellMechanism,
        trial: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<TrialRecord, DphtError> {
        let (true_value, estimate) = match mechanism {
            CellMechanism::Laplace(m) => {
                let count = self.true_count(cell.num_users)?;
                (count as f64, m.release(count, rng))
            }
            CellMechanism::Geometric(m) => {
                let count = self.true_count(cell.num_users)?;
                (count as f64, m.release(count, rng))
            }
            CellMechanism::RandomizedResponse(rr, prevalence) => {
                let mut positive = 0u64;
                let mut reported = 0u64;
                for _ in 0..cell.num_users {
                    let status = rng.gen_bool(*prevalence);
                    positive += status as u64;
                    reported += rr.respond(status, rng) as u64;
                }
                let total = cell.num_users.max(1) as f64;
                (positive as f64 / total, rr.estimate(reported, cell.num_users))
            }
        };
        let signed_error = estimate - true_value;
        Ok(TrialRecord {
            num_users: cell.num_users,
            epsilon: cell.epsilon,
            trial,
            true_value,
            estimate,
            signed_error,
            abs_error: signed_error.abs(),
        })
    }

    fn summarize_cell(&self, cell_index: usize, cell: Cell, base_seed: u64) -> Result<CellSummary, DphtError> {
        let mechanism = Self::mechanism_for(&self.config, cell.epsilon)?;
        let mut rng = Self::cell_rng(base_seed, cell_index);
        let records = (0..self.config.trials)
            .map(|trial| self.run_trial(cell, &mechanism, trial, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;
        let summary = summarize_records(cell, &records, mechanism.expected_abs_error(cell.num_users));
        debug!(
            "cell n={} eps={} mae={:.4} expected={:.4}",
            summary.num_users, summary.epsilon, summary.mean_abs_error, summary.expected_abs_error
        );
        Ok(summary)
    }

    /// Lazily yields every trial, cell by cell. Each call starts a fresh
    /// sweep.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            harness: self,
            cells: self.cells(),
            base_seed: self.base_seed(),
            cell_index: 0,
            trial: 0,
            current: None,
        }
    }

    /// Runs the whole grid and aggregates each cell.
    pub fn summarize(&self) -> Result<Vec<CellSummary>, DphtError> {
        let base_seed = self.base_seed();
        let cells = self.cells();
        info!(
            "simulating {} cells x {} trials ({:?})",
            cells.len(),
            self.config.trials,
            self.config.mechanism
        );
        cells
            .into_iter()
            .enumerate()
            .map(|(index, cell)| self.summarize_cell(index, cell, base_seed))
            .collect()
    }

    /// Same results as [`summarize`](Self::summarize) for a seeded config,
    /// with cells spread across the rayon pool.
    #[cfg(feature = "parallel")]
    pub fn summarize_parallel(&self) -> Result<Vec<CellSummary>, DphtError> {
        use rayon::prelude::*;

        let base_seed = self.base_seed();
        let cells = self.cells();
        info!(
            "simulating {} cells x {} trials in parallel ({:?})",
            cells.len(),
            self.config.trials,
            self.config.mechanism
        );
        cells
            .into_par_iter()
            .enumerate()
            .map(|(index, cell)| self.summarize_cell(index, cell, base_seed))
            .collect()
    }
}

fn summarize_records(cell: Cell, records: &[TrialRecord], expected_abs_error: f64) -> CellSummary {
    let n = records.len() as f64;
    let mean_error = records.iter().map(|r| r.signed_error).sum::<f64>() / n;
    let mean_abs_error = records.iter().map(|r| r.abs_error).sum::<f64>() / n;
    let error_variance = if records.len() > 1 {
        records
            .iter()
            .map(|r| (r.signed_error - mean_error).powi(2))
            .sum::<f64>()
            / (n - 1.0)
    } else {
        0.0
    };
    CellSummary {
        num_users: cell.num_users,
        epsilon: cell.epsilon,
        trials: records.len(),
        mean_error,
        mean_abs_error,
        error_variance,
        expected_abs_error,
    }
}

/// Lazy iterator over [`TrialRecord`]s. See [`SimulationHarness::rows`].
pub struct Rows<'a> {
    harness: &'a SimulationHarness,
    cells: Vec<Cell>,
    base_seed: u64,
    cell_index: usize,
    trial: usize,
    current: Option<(CellMechanism, ChaCha8Rng)>,
}

impl<'a> Iterator for Rows<'a> {
    type Item = Result<TrialRecord, DphtError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = *self.cells.get(self.cell_index)?;
        if self.current.is_none() {
            let mechanism = match SimulationHarness::mechanism_for(&self.harness.config, cell.epsilon) {
                Ok(mechanism) => mechanism,
                Err(e) => {
                    self.cell_index = self.cells.len();
                    return Some(Err(e.into()));
                }
            };
            let rng = SimulationHarness::cell_rng(self.base_seed, self.cell_index);
            self.current = Some((mechanism, rng));
        }

        let trial = self.trial;
        let result = match self.current.as_mut() {
            Some((mechanism, rng)) => self.harness.run_trial(cell, mechanism, trial, rng),
            None => return None,
        };

        self.trial += 1;
        if self.trial == self.harness.config.trials {
            self.trial = 0;
            self.cell_index += 1;
            self.current = None;
        }
        Some(result)
    }
}

/// Writes one JSON object per line, the format external plotting consumes.
pub fn write_json_lines<W, T, I>(mut writer: W, items: I) -> Result<(), SimulationError>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    for item in items {
        serde_json::to_writer(&mut writer, &item).map_err(|e| SimulationError::Output(e.to_string()))?;
        writer
            .write_all(b"\n")
            .map_err(|e| SimulationError::Output(e.to_string()))?;
    }
    writer.flush().map_err(|e| SimulationError::Output(e.to_string()))
}
