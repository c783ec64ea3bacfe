//! Integration tests for filter synthesis and the multiresolution transform.

use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use waveprox_core::{
    filters, forward_1d, forward_2d, inverse_1d, inverse_2d, FourierPlans,
    MultiresolutionTransform, WaveproxError, MAX_STABLE_ORDER,
};

fn rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

fn random_signal(len: usize, rng: &mut StdRng) -> Array1<f64> {
    Array1::from_shape_fn(len, |_| rng.gen_range(-1.0..1.0))
}

fn random_image(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
}

fn energy<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.map(|v| v * v).sum()
}

#[test]
fn filter_pairs_are_orthonormal_qmf() {
    for order in 0..=MAX_STABLE_ORDER {
        let pair = filters(order).unwrap();
        let p = pair.principal();
        let w = pair.wavelet();
        let len = p.len();
        assert_eq!(len, 2 * (order + 1));

        assert_abs_diff_eq!(energy(p.iter()), 1.0, epsilon = 1e-10);
        for j in 0..len {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            assert_abs_diff_eq!(w[j], p[len - 1 - j] * sign, epsilon = 1e-15);
        }
        let cross: f64 = p.iter().zip(w).map(|(a, b)| a * b).sum();
        assert_abs_diff_eq!(cross, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn filters_are_cached() {
    let a = filters(4).unwrap();
    let b = filters(4).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

#[test]
fn round_trip_1d_all_orders() {
    let mut rng = rng();
    for order in 0..=MAX_STABLE_ORDER {
        for len in [1, 2, 16, 256] {
            let signal = random_signal(len, &mut rng);
            let coeffs = forward_1d(signal.view(), order).unwrap();
            let back = inverse_1d(coeffs.view(), order).unwrap();
            let scale = energy(signal.iter()).sqrt().max(1.0);
            for (a, b) in signal.iter().zip(back.iter()) {
                assert!(
                    (a - b).abs() <= 1e-9 * scale,
                    "order {order}, len {len}: {a} vs {b}"
                );
            }
        }
    }
}

#[test]
fn round_trip_2d_all_orders() {
    let mut rng = rng();
    for order in 0..=MAX_STABLE_ORDER {
        let image = random_image(32, 16, &mut rng);
        let coeffs = forward_2d(image.view(), order).unwrap();
        let back = inverse_2d(coeffs.view(), order).unwrap();
        let scale = energy(image.iter()).sqrt();
        for (a, b) in image.iter().zip(back.iter()) {
            assert!((a - b).abs() <= 1e-9 * scale, "order {order}");
        }
    }
}

#[test]
fn forward_transform_is_an_isometry() {
    let mut rng = rng();
    for order in [0, 1, 3, 7, 10] {
        let image = random_image(64, 64, &mut rng);
        let coeffs = forward_2d(image.view(), order).unwrap();
        let before = energy(image.iter());
        let after = energy(coeffs.iter());
        assert!((before - after).abs() <= 1e-10 * before, "order {order}");
    }
}

#[test]
fn large_images_use_parallel_rows_consistently() {
    let mut rng = rng();
    let image = random_image(128, 256, &mut rng);
    let transform = MultiresolutionTransform::<f64>::new(2).unwrap();
    let coeffs = transform.forward_2d(image.view()).unwrap();

    // Compare one row of the separable result with the 1D transform
    // applied to the row-transformed image's columns.
    let mut rows_done = image.clone();
    for mut row in rows_done.rows_mut() {
        let t = transform.forward_1d(row.view()).unwrap();
        row.assign(&t);
    }
    let column = transform.forward_1d(rows_done.column(5)).unwrap();
    for (a, b) in column.iter().zip(coeffs.column(5).iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn haar_pyramid_of_impulse_8x8() {
    // 1D Haar pyramid of an impulse at index 3 of length 8
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let v = [h / 2.0, h / 2.0, -0.5, 0.0, 0.0, -h, 0.0, 0.0];

    let mut signal = Array1::<f64>::zeros(8);
    signal[3] = 1.0;
    let coeffs = forward_1d(signal.view(), 0).unwrap();
    for (a, b) in coeffs.iter().zip(v.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }

    // The 2D transform is separable, so the impulse at (3, 3) gives v vᵀ
    let mut image = Array2::<f64>::zeros((8, 8));
    image[[3, 3]] = 1.0;
    let coeffs = forward_2d(image.view(), 0).unwrap();
    for ((r, c), value) in coeffs.indexed_iter() {
        assert_abs_diff_eq!(*value, v[r] * v[c], epsilon = 1e-12);
    }
    let back = inverse_2d(coeffs.view(), 0).unwrap();
    for (a, b) in image.iter().zip(back.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn f32_round_trip() {
    let mut rng = rng();
    let image = Array2::<f32>::from_shape_fn((16, 16), |_| rng.gen_range(-1.0f32..1.0));
    let coeffs = forward_2d(image.view(), 3).unwrap();
    let back = inverse_2d(coeffs.view(), 3).unwrap();
    for (a, b) in image.iter().zip(back.iter()) {
        assert!((a - b).abs() < 1e-4);
    }
}

#[test]
fn fourier_ortho_round_trip_and_parseval() {
    let mut rng = rng();
    let image = random_image(16, 32, &mut rng);
    let plans = FourierPlans::<f64>::new(16, 32).unwrap();
    let spectrum = plans.rfft2_ortho(image.view()).unwrap();
    assert_eq!(spectrum.dim(), (16, 17));

    let back = plans.irfft2_ortho(spectrum.view()).unwrap();
    for (a, b) in image.iter().zip(back.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }

    let mut spectral_energy = 0.0;
    for ((_, c), value) in spectrum.indexed_iter() {
        let weight = if c == 0 || c == 16 { 1.0 } else { 2.0 };
        spectral_energy += weight * value.norm_sqr();
    }
    let spatial_energy = energy(image.iter());
    assert!((spectral_energy - spatial_energy).abs() <= 1e-10 * spatial_energy);
}

#[test]
fn non_power_of_two_rejected() {
    let image = Array2::<f64>::zeros((8, 12));
    assert_eq!(
        forward_2d(image.view(), 0).unwrap_err(),
        WaveproxError::NotPowerOfTwo { axis: 1, len: 12 }
    );
    let signal = Array1::<f64>::zeros(0);
    assert_eq!(
        forward_1d(signal.view(), 0).unwrap_err(),
        WaveproxError::NotPowerOfTwo { axis: 0, len: 0 }
    );
}

#[test]
fn unsupported_order_rejected() {
    let signal = Array1::<f64>::zeros(8);
    let err = forward_1d(signal.view(), MAX_STABLE_ORDER + 1).unwrap_err();
    assert_eq!(
        err,
        WaveproxError::UnsupportedOrder {
            order: MAX_STABLE_ORDER + 1,
            max: MAX_STABLE_ORDER
        }
    );
    assert_eq!(
        err.to_string(),
        "filter order 11 is unsupported (maximum stable order is 10)"
    );
}
