//! Inpainting demo: recover a synthetic image from a random subset of its
//! pixels with the Danzig (Douglas-Rachford) and lasso (forward-backward)
//! estimators.
//!
//! Run with: cargo run -p waveprox_core --example inpainting_demo -- -v
//! Options: --size 128 --fraction 0.3 --order 2 --iterations 50 --seed 0

mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::info;
use waveprox_core::{
    reconstruct_douglas_rachford_with_observer, reconstruct_forward_backward,
    DouglasRachfordConfig, ForwardBackwardConfig, Measurement,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    common::init_logging(common::verbosity(&args));

    let size = common::parse_arg(&args, "--size", 128usize);
    let fraction = common::parse_arg(&args, "--fraction", 0.3f64);
    let order = common::parse_arg(&args, "--order", 2usize);
    let iterations = common::parse_arg(&args, "--iterations", 50usize);
    let seed = common::parse_arg(&args, "--seed", 0u64);

    let mut rng = StdRng::seed_from_u64(seed);
    let truth = common::phantom(size, size);
    let mask = common::bernoulli_mask((size, size), fraction, &mut rng);
    let sampled = &truth * &mask;
    info!(size, fraction, "sampled image");

    let measurement = Measurement::Spatial {
        image: sampled.clone(),
        mask,
    };

    let start = Instant::now();
    let config = DouglasRachfordConfig {
        step: 0.3,
        order,
        iterations,
    };
    let mut last_objective = 0.0;
    let danzig = reconstruct_douglas_rachford_with_observer(&measurement, &config, |report| {
        last_objective = report.objective
    })?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        wavelet_l1 = last_objective,
        "Danzig estimate done"
    );

    let start = Instant::now();
    let config = ForwardBackwardConfig {
        lambda: 0.05,
        order,
        iterations,
        clip: Some((0.0, 1.0)),
    };
    let lasso = reconstruct_forward_backward(&measurement, &config)?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "lasso estimate done"
    );

    println!("inpainting {size}x{size}, {:.0}% of pixels observed", fraction * 100.0);
    println!("  zero fill  rmse = {:.4}", common::rmse(&sampled, &truth));
    println!("  Danzig     rmse = {:.4}", common::rmse(&danzig, &truth));
    println!("  lasso      rmse = {:.4}", common::rmse(&lasso, &truth));
    Ok(())
}
