// src/privacy/mechanism.rs
//! Differential privacy mechanisms for usage statistics.
//!
//! For neighbouring datasets D and D' whose true counts differ by at most
//! `sensitivity`, every mechanism here satisfies
//!
//! ```text
//! P[M(D) = y] <= e^epsilon * P[M(D') = y]
//! ```
//!
//! - [`LaplaceMechanism`]: continuous noise, scale `sensitivity / epsilon`
//! - [`GeometricMechanism`]: integer noise, `P(z) ∝ exp(-epsilon |z| / sensitivity)`
//! - [`RandomizedResponse`]: per-holder noised status bit carried in the token
//!
//! Noise is drawn fresh on every call; nothing is cached between releases.
//! The random source only needs to be statistically sound.

use crate::error::PrivacyError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Checks that `epsilon` is a usable privacy budget.
///
/// # Arguments
/// * `epsilon` - Privacy loss parameter
///
/// # Returns
/// `epsilon` unchanged when it is positive and finite.
pub fn validate_epsilon(epsilon: f64) -> Result<f64, PrivacyError> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(epsilon)
    } else {
        Err(PrivacyError::InvalidEpsilon(epsilon))
    }
}

/// Checks that `sensitivity` is a usable L1 sensitivity.
///
/// # Arguments
/// * `sensitivity` - Largest change one holder can make to the true count
///
/// # Returns
/// `sensitivity` unchanged when it is positive and finite.
pub fn validate_sensitivity(sensitivity: f64) -> Result<f64, PrivacyError> {
    if sensitivity.is_finite() && sensitivity > 0.0 {
        Ok(sensitivity)
    } else {
        Err(PrivacyError::InvalidSensitivity(sensitivity))
    }
}

/// A count-release mechanism calibrated to `(epsilon, sensitivity)`.
pub trait NoiseMechanism {
    /// Releases a noised version of `true_count`.
    fn release<R: Rng + ?Sized>(&self, true_count: u64, rng: &mut R) -> f64;

    /// Expected `|release(c) - c|`, independent of `c`.
    fn expected_abs_error(&self) -> f64;

    fn epsilon(&self) -> f64;
}

/// Laplace mechanism with scale `b = sensitivity / epsilon`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplaceMechanism {
    epsilon: f64,
    scale: f64,
}

impl LaplaceMechanism {
    /// Builds a Laplace mechanism.
    ///
    /// # Arguments
    /// * `epsilon` - Privacy loss parameter, positive and finite
    /// * `sensitivity` - L1 sensitivity of the count, positive and finite
    ///
    /// # Errors
    /// `PrivacyError` for out-of-domain parameters, or when
    /// `sensitivity / epsilon` overflows.
    pub fn new(epsilon: f64, sensitivity: f64) -> Result<Self, PrivacyError> {
        let epsilon = validate_epsilon(epsilon)?;
        let sensitivity = validate_sensitivity(sensitivity)?;
        let scale = sensitivity / epsilon;
        if !scale.is_finite() {
            return Err(PrivacyError::UnrepresentableNoise { epsilon, sensitivity });
        }
        Ok(Self { epsilon, scale })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// One zero-mean Laplace draw by inverse CDF.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        // u in (-0.5, 0.5); the open lower end keeps ln() finite.
        let u = loop {
            let u = rng.gen::<f64>() - 0.5;
            if u > -0.5 {
                break u;
            }
        };
        -self.scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
    }
}

impl NoiseMechanism for LaplaceMechanism {
    fn release<R: Rng + ?Sized>(&self, true_count: u64, rng: &mut R) -> f64 {
        true_count as f64 + self.sample(rng)
    }

    fn expected_abs_error(&self) -> f64 {
        self.scale
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

/// Two-sided geometric mechanism, the discrete analogue of Laplace.
///
/// Noise `z` has `P(z) = (1 - α) / (1 + α) · α^|z|` with
/// `α = exp(-epsilon / sensitivity)`; releases are whole numbers.
///
/// Only `ln α` is stored. For small `epsilon / sensitivity`, `α` itself
/// rounds to 1 and would lose the noise entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricMechanism {
    epsilon: f64,
    ln_alpha: f64,
}

impl GeometricMechanism {
    /// Builds a two-sided geometric mechanism.
    ///
    /// # Arguments
    /// * `epsilon` - Privacy loss parameter, positive and finite
    /// * `sensitivity` - L1 sensitivity of the count, positive and finite
    ///
    /// # Errors
    /// `PrivacyError` for out-of-domain parameters, or when
    /// `epsilon / sensitivity` underflows to zero.
    pub fn new(epsilon: f64, sensitivity: f64) -> Result<Self, PrivacyError> {
        let epsilon = validate_epsilon(epsilon)?;
        let sensitivity = validate_sensitivity(sensitivity)?;
        let ln_alpha = -epsilon / sensitivity;
        if ln_alpha == 0.0 {
            return Err(PrivacyError::UnrepresentableNoise { epsilon, sensitivity });
        }
        Ok(Self { epsilon, ln_alpha })
    }

    /// Decay ratio `α` of the noise distribution, in `[0, 1)` up to rounding.
    pub fn alpha(&self) -> f64 {
        self.ln_alpha.exp()
    }

    // One-sided geometric on {0, 1, ...} with P(k) = (1 - α) α^k.
    fn one_sided<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u = 1.0 - rng.gen::<f64>(); // (0, 1]
        (u.ln() / self.ln_alpha).floor()
    }

    /// One draw of integer noise, the difference of two one-sided draws.
    ///
    /// # Returns
    /// A whole number. It is kept as `f64` since at small `epsilon` the
    /// draws exceed the `i64` range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.one_sided(rng) - self.one_sided(rng)
    }
}

impl NoiseMechanism for GeometricMechanism {
    fn release<R: Rng + ?Sized>(&self, true_count: u64, rng: &mut R) -> f64 {
        true_count as f64 + self.sample(rng)
    }

    fn expected_abs_error(&self) -> f64 {
        // 2α / (1 - α²) without forming α.
        1.0 / (-self.ln_alpha).sinh()
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

/// Releases `true_count` with Laplace noise of scale `sensitivity / epsilon`.
///
/// Draws from the thread-local RNG, independently on every call.
pub fn noisy_count(true_count: u64, epsilon: f64, sensitivity: f64) -> Result<f64, PrivacyError> {
    let mechanism = LaplaceMechanism::new(epsilon, sensitivity)?;
    Ok(mechanism.release(true_count, &mut rand::thread_rng()))
}

/// Randomized response over a single status bit carried in each token.
///
/// With probability `q = (e^ε - 1) / (e^ε + 1) = tanh(ε / 2)` the token
/// carries the true bit, otherwise a fair coin. A population's prevalence is
/// recovered from the fraction `x` of tokens carrying `1` as
/// `(x - (1 - q) / 2) / q`. At `ε = ln 3` this is the two-coin scheme with
/// estimator `2(x - 1/4)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomizedResponse {
    epsilon: f64,
    truth_probability: f64,
}

impl RandomizedResponse {
    /// Builds randomized response for a one-bit status.
    ///
    /// # Arguments
    /// * `epsilon` - Privacy loss parameter, positive and finite
    ///
    /// # Errors
    /// `PrivacyError` for an out-of-domain `epsilon`, or one so small that
    /// the truth probability rounds to zero.
    pub fn new(epsilon: f64) -> Result<Self, PrivacyError> {
        let epsilon = validate_epsilon(epsilon)?;
        // tanh saturates at 1 where (e - 1) / (e + 1) turns into inf / inf.
        let truth_probability = (epsilon / 2.0).tanh();
        if truth_probability == 0.0 {
            return Err(PrivacyError::UnrepresentableNoise {
                epsilon,
                sensitivity: 1.0,
            });
        }
        Ok(Self {
            epsilon,
            truth_probability,
        })
    }

    /// The two-coin scheme: report truthfully on heads, otherwise flip again.
    pub fn two_coin() -> Self {
        Self {
            epsilon: 3f64.ln(),
            truth_probability: 0.5,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Probability `q` that a token carries the holder's true bit.
    pub fn truth_probability(&self) -> f64 {
        self.truth_probability
    }

    /// Bit embedded in the holder's token.
    pub fn respond<R: Rng + ?Sized>(&self, status: bool, rng: &mut R) -> bool {
        if rng.gen_bool(self.truth_probability) {
            status
        } else {
            rng.gen_bool(0.5)
        }
    }

    /// Unbiased prevalence estimate from `ones` reported bits out of `total`.
    pub fn estimate(&self, ones: u64, total: u64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let x = ones as f64 / total as f64;
        (x - (1.0 - self.truth_probability) / 2.0) / self.truth_probability
    }

    /// Normal approximation of the mean absolute error against the realised
    /// prevalence of `total` holders.
    ///
    /// Given the true bits, each reported bit has variance `(1 - q²) / 4`
    /// whatever its status, so the curve does not depend on prevalence.
    pub fn expected_abs_error(&self, total: u64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let q = self.truth_probability;
        (2.0 / PI).sqrt() * ((1.0 - q * q) / (4.0 * total as f64)).sqrt() / q
    }
}

/// Mechanism selection for simulation sweeps and configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MechanismKind {
    Laplace,
    Geometric,
    /// Status bits with the given true prevalence in `[0, 1]`
    RandomizedResponse { prevalence: f64 },
}

impl Default for MechanismKind {
    fn default() -> Self {
        MechanismKind::Laplace
    }
}
