use dpht::privacy::mechanism::{
    GeometricMechanism, LaplaceMechanism, MechanismKind, NoiseMechanism,
};
use dpht::privacy::simulation::{SimulationConfig, SimulationHarness};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

fn histogram(mechanism: &GeometricMechanism, true_count: u64, draws: usize, seed: u64) -> HashMap<i64, usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut counts = HashMap::new();
    for _ in 0..draws {
        *counts.entry(mechanism.release(true_count, &mut rng) as i64).or_insert(0) += 1;
    }
    counts
}

#[test]
fn neighbouring_counts_stay_within_exp_epsilon() {
    let epsilon = 0.5;
    let mechanism = GeometricMechanism::new(epsilon, 1.0).unwrap();
    let draws = 200_000;
    let d = histogram(&mechanism, 100, draws, 1);
    let d_prime = histogram(&mechanism, 101, draws, 2);

    let bound = epsilon.exp() * 1.1;
    for output in 97..=104 {
        let p = *d.get(&output).unwrap_or(&0) as f64;
        let q = *d_prime.get(&output).unwrap_or(&0) as f64;
        assert!(p > 0.0 && q > 0.0, "output {} unobserved", output);
        assert!(p / q <= bound, "output {}: ratio {}", output, p / q);
        assert!(q / p <= bound, "output {}: ratio {}", output, q / p);
    }
}

#[test]
fn laplace_density_ratio_is_bounded() {
    let epsilon = 1.0;
    let mechanism = LaplaceMechanism::new(epsilon, 1.0).unwrap();
    let draws = 200_000;
    let bucket = |c: u64, seed: u64| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut buckets = HashMap::new();
        for _ in 0..draws {
            let y = mechanism.release(c, &mut rng);
            *buckets.entry((y * 2.0).floor() as i64).or_insert(0usize) += 1;
        }
        buckets
    };
    let d = bucket(50, 3);
    let d_prime = bucket(51, 4);

    // Half-unit buckets between the two centres and either side of them.
    let bound = epsilon.exp() * 1.1;
    for b in 98..=104 {
        let p = *d.get(&b).unwrap_or(&0) as f64;
        let q = *d_prime.get(&b).unwrap_or(&0) as f64;
        assert!(p / q <= bound && q / p <= bound, "bucket {}: {} vs {}", b, p, q);
    }
}

#[test]
fn mean_abs_error_scales_with_sensitivity_over_epsilon() {
    let config = SimulationConfig {
        population_sizes: vec![100],
        epsilons: vec![0.25, 0.5, 1.0, 2.0],
        trials: 4_000,
        sensitivity: 2.0,
        mechanism: MechanismKind::Laplace,
        seed: Some(2020),
        issue_credentials: false,
    };
    let summaries = SimulationHarness::new(config).unwrap().summarize().unwrap();
    for summary in summaries {
        let expected = 2.0 / summary.epsilon;
        assert_eq!(summary.expected_abs_error, expected);
        let relative = (summary.mean_abs_error - expected).abs() / expected;
        assert!(relative < 0.07, "eps {}: mae {} vs {}", summary.epsilon, summary.mean_abs_error, expected);
    }
}

#[test]
fn mean_abs_error_is_independent_of_population() {
    let config = SimulationConfig {
        population_sizes: vec![10, 1_000, 100_000],
        epsilons: vec![0.5],
        trials: 4_000,
        sensitivity: 1.0,
        mechanism: MechanismKind::Geometric,
        seed: Some(7),
        issue_credentials: false,
    };
    let summaries = SimulationHarness::new(config).unwrap().summarize().unwrap();
    let maes: Vec<f64> = summaries.iter().map(|s| s.mean_abs_error).collect();
    let expected = summaries[0].expected_abs_error;
    for mae in maes {
        assert!((mae - expected).abs() / expected < 0.08, "mae {} vs {}", mae, expected);
    }
}

#[test]
fn randomized_response_error_shrinks_with_population() {
    let config = SimulationConfig {
        population_sizes: vec![20, 2_000],
        epsilons: vec![3f64.ln()],
        trials: 200,
        sensitivity: 1.0,
        mechanism: MechanismKind::RandomizedResponse { prevalence: 0.98 },
        seed: Some(11),
        issue_credentials: false,
    };
    let summaries = SimulationHarness::new(config).unwrap().summarize().unwrap();
    assert!(summaries[1].mean_abs_error < summaries[0].mean_abs_error / 4.0);
    for summary in &summaries {
        let relative = (summary.mean_abs_error - summary.expected_abs_error).abs() / summary.expected_abs_error;
        assert!(relative < 0.25, "n {}: {} vs {}", summary.num_users, summary.mean_abs_error, summary.expected_abs_error);
    }
}

#[test]
fn calibration_holds_at_tiny_epsilon() {
    let draws = 20_000;
    for epsilon in [1e-12, 1e-17] {
        let laplace = LaplaceMechanism::new(epsilon, 1.0).unwrap();
        let geometric = GeometricMechanism::new(epsilon, 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let laplace_mae = (0..draws)
            .map(|_| (laplace.release(100, &mut rng) - 100.0).abs())
            .sum::<f64>()
            / draws as f64;
        let geometric_mae = (0..draws)
            .map(|_| (geometric.release(100, &mut rng) - 100.0).abs())
            .sum::<f64>()
            / draws as f64;

        let expected = 1.0 / epsilon;
        assert!((laplace_mae - expected).abs() / expected < 0.05, "eps {}: {}", epsilon, laplace_mae);
        assert!(
            (geometric_mae - geometric.expected_abs_error()).abs() / expected < 0.05,
            "eps {}: {}",
            epsilon,
            geometric_mae
        );
    }
}
