//! Denoising and compression demo on a synthetic image.
//!
//! Compares wavelet shrinkage with total-variation denoising, then compresses
//! the clean image by keeping its largest wavelet coefficients.
//!
//! Run with: cargo run -p waveprox_core --example denoising_demo -- -v
//! Options: --size 256 --noise 0.1 --wavelet-lambda 0.15 --tv-lambda 0.0005
//!          --order 3 --keep 0.01 --seed 0

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::time::Instant;
use tracing::info;
use waveprox_core::{compress, denoise_total_variation, denoise_wavelet, TotalVariationConfig};

/// Weight of the significance map: one bit per coefficient against an
/// 8-bit stored value.
const SIGNIFICANCE_MAP_WEIGHT: f64 = 1.0 / 8.0;

/// Storage of the kept values plus an entropy-coded significance map,
/// relative to storing every coefficient.
fn compression_factor(keep: f64) -> f64 {
    if keep <= 0.0 || keep >= 1.0 {
        return keep.clamp(0.0, 1.0);
    }
    let entropy = -(keep * keep.log2() + (1.0 - keep) * (1.0 - keep).log2());
    keep + SIGNIFICANCE_MAP_WEIGHT * entropy
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    common::init_logging(common::verbosity(&args));

    let size = common::parse_arg(&args, "--size", 256usize);
    let noise_level = common::parse_arg(&args, "--noise", 0.1f64);
    let wavelet_lambda = common::parse_arg(&args, "--wavelet-lambda", 0.15f64);
    let tv_lambda = common::parse_arg(&args, "--tv-lambda", 0.0005f64);
    let order = common::parse_arg(&args, "--order", 3usize);
    let keep = common::parse_arg(&args, "--keep", 0.01f64);
    let seed = common::parse_arg(&args, "--seed", 0u64);

    let mut rng = StdRng::seed_from_u64(seed);
    let truth = common::phantom(size, size);
    let noise = Normal::new(0.0, noise_level)?;
    let noisy = truth.mapv(|v| v + rng.sample(noise));

    let start = Instant::now();
    let wavelet = denoise_wavelet(noisy.view(), wavelet_lambda, order)?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "wavelet denoising done");

    let start = Instant::now();
    let config = TotalVariationConfig {
        lambda: tv_lambda,
        iterations: 200,
    };
    let tv = denoise_total_variation(noisy.view(), &config)?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "total-variation denoising done");

    let (compressed, kept) = compress(truth.view(), order, keep)?;

    println!("denoising {size}x{size}, noise sigma {noise_level}");
    println!("  noisy            rmse = {:.4}", common::rmse(&noisy, &truth));
    println!("  wavelet shrink   rmse = {:.4}", common::rmse(&wavelet, &truth));
    println!("  total variation  rmse = {:.4}", common::rmse(&tv, &truth));
    println!(
        "compression: kept {kept} of {} coefficients, rmse = {:.4}, compressed by a factor of {:.1}",
        truth.len(),
        common::rmse(&compressed, &truth),
        1.0 / compression_factor(keep)
    );
    Ok(())
}
