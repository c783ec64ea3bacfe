//! Reconstruction demo: recover a synthetic image from a random subset of its
//! orthonormal Fourier coefficients.
//!
//! Run with: cargo run -p waveprox_core --example fourier_reconstruction_demo -- -v
//! Options: --size 128 --fraction 0.3 --order 2 --iterations 100 --seed 0

mod common;

use ndarray::Zip;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use waveprox_core::{
    reconstruct_douglas_rachford, reconstruct_forward_backward_with_observer,
    DouglasRachfordConfig, FourierPlans, ForwardBackwardConfig, Measurement,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    common::init_logging(common::verbosity(&args));

    let size = common::parse_arg(&args, "--size", 128usize);
    let fraction = common::parse_arg(&args, "--fraction", 0.3f64);
    let order = common::parse_arg(&args, "--order", 2usize);
    let iterations = common::parse_arg(&args, "--iterations", 100usize);
    let seed = common::parse_arg(&args, "--seed", 0u64);

    let mut rng = StdRng::seed_from_u64(seed);
    let truth = common::phantom(size, size);
    let plans = FourierPlans::<f64>::new(size, size)?;
    let spectrum = plans.rfft2_ortho(truth.view())?;
    let mask = common::bernoulli_mask(plans.spectrum_shape(), fraction, &mut rng);
    let sampled = Zip::from(&spectrum)
        .and(&mask)
        .map_collect(|&s, &m| s * m);
    let naive = plans.irfft2_ortho(sampled.view())?;
    info!(size, fraction, "sampled spectrum");

    let measurement = Measurement::Fourier {
        spectrum: sampled,
        mask,
        shape: (size, size),
    };

    let danzig = reconstruct_douglas_rachford(
        &measurement,
        &DouglasRachfordConfig {
            step: 0.1,
            order,
            iterations,
        },
    )?;

    let config = ForwardBackwardConfig {
        lambda: 0.01,
        order,
        iterations,
        clip: None,
    };
    let lasso = reconstruct_forward_backward_with_observer(&measurement, &config, |report| {
        if report.iteration % 10 == 0 {
            info!(iteration = report.iteration, objective = report.objective, "lasso progress");
        }
    })?;

    println!(
        "reconstruction {size}x{size}, {:.0}% of Fourier coefficients observed",
        fraction * 100.0
    );
    println!("  zero fill  rmse = {:.4}", common::rmse(&naive, &truth));
    println!("  Danzig     rmse = {:.4}", common::rmse(&danzig, &truth));
    println!("  lasso      rmse = {:.4}", common::rmse(&lasso, &truth));
    Ok(())
}
