//! Shared helpers for the demo programs: argument parsing, logging setup and
//! synthetic test data.

#![allow(dead_code)]

use ndarray::Array2;
use rand::Rng;
use tracing_subscriber::EnvFilter;

pub fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse::<T>().ok())
        .unwrap_or(default)
}

/// Count `-v` flags (`-v -v` or `-vv`).
pub fn verbosity(args: &[String]) -> u8 {
    args.iter()
        .filter(|a| a.starts_with("-v") && a[1..].chars().all(|c| c == 'v'))
        .map(|a| (a.len() - 1) as u8)
        .sum()
}

/// Initialize tracing based on verbosity level.
///
/// Mapping:
/// - 0 (none) -> warn
/// - 1 (-v)   -> info
/// - 2 (-vv)  -> debug
/// - 3+ (-vvv)-> trace
///
/// `RUST_LOG` env var overrides the flag if set.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let default_filter = format!("waveprox_core={level},{}={level}", env!("CARGO_CRATE_NAME"));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Piecewise-smooth phantom in [0, 1]: a shaded background, a bright disc
/// and a dark rectangle.
pub fn phantom(rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let y = r as f64 / rows as f64 - 0.5;
        let x = c as f64 / cols as f64 - 0.5;
        let mut value = 0.35 + 0.15 * (4.0 * x).cos() * (3.0 * y).cos();
        if (x + 0.1).powi(2) + (y - 0.05).powi(2) < 0.06 {
            value += 0.4;
        }
        if (0.15..0.35).contains(&x) && (-0.3..-0.1).contains(&y) {
            value -= 0.25;
        }
        value.clamp(0.0, 1.0)
    })
}

/// Bernoulli mask: each entry is 1 with probability `fraction`.
pub fn bernoulli_mask<R: Rng>(shape: (usize, usize), fraction: f64, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_fn(shape, |_| {
        if rng.gen::<f64>() < fraction {
            1.0
        } else {
            0.0
        }
    })
}

/// Root mean squared difference.
pub fn rmse(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    let sum: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (sum / a.len() as f64).sqrt()
}
