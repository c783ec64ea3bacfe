//! Compressed sensing demo: recover a sparse vector from a small random
//! subset of its Fourier coefficients.
//!
//! Run with: cargo run -p waveprox_core --example sensing_demo -- -v
//! Options: --len 512 --sparsity 0.01 --sampling 0.1 --iterations 500 --seed 0

mod common;

use ndarray::{Array1, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::info;
use waveprox_core::{recover_sparse_signal_with_observer, FourierPlans, SparseRecoveryConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    common::init_logging(common::verbosity(&args));

    let len = common::parse_arg(&args, "--len", 512usize);
    let sparsity = common::parse_arg(&args, "--sparsity", 0.01f64);
    let sampling = common::parse_arg(&args, "--sampling", 0.1f64);
    let iterations = common::parse_arg(&args, "--iterations", 500usize);
    let seed = common::parse_arg(&args, "--seed", 0u64);

    let mut rng = StdRng::seed_from_u64(seed);

    // Gaussian entries on a random support
    let nonzero = (sparsity * len as f64).floor() as usize;
    let mut positions: Vec<usize> = (0..len).collect();
    positions.shuffle(&mut rng);
    let mut truth = Array1::<f64>::zeros(len);
    for &i in &positions[..nonzero] {
        truth[i] = rng.sample(StandardNormal);
    }

    let plans = FourierPlans::<f64>::for_signal(len)?;
    let spectrum = plans.rfft_ortho(truth.view())?;
    let observed = (sampling * spectrum.len() as f64).floor() as usize;
    let mut bins: Vec<usize> = (0..spectrum.len()).collect();
    bins.shuffle(&mut rng);
    let mut mask = Array1::<f64>::zeros(spectrum.len());
    for &b in &bins[..observed] {
        mask[b] = 1.0;
    }
    let sampled = Zip::from(&spectrum)
        .and(&mask)
        .map_collect(|&s, &m| s * m);
    info!(len, nonzero, observed, "sampled spectrum");

    let config = SparseRecoveryConfig {
        step: 1.0,
        iterations,
    };
    let mut final_l1 = 0.0;
    let recovered =
        recover_sparse_signal_with_observer(sampled.view(), mask.view(), len, &config, |report| {
            final_l1 = report.objective
        })?;

    let error: f64 = truth
        .iter()
        .zip(recovered.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt();
    let norm: f64 = truth.iter().map(|v| v * v).sum::<f64>().sqrt();

    println!("sparse recovery, length {len}, {nonzero} non-zeros, {observed} Fourier samples");
    println!("  l1 norm of estimate = {final_l1:.4}");
    println!("  relative l2 error   = {:.3e}", error / norm.max(f64::MIN_POSITIVE));
    Ok(())
}
