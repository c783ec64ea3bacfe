//! Projections onto measurement-consistent sets.
//!
//! A mask weights each measured entry: 1 means the entry is observed and must
//! be reproduced, 0 means it is free. Fractional weights blend the two.
//! Spatial masks act on pixels (inpainting), Fourier masks act on the
//! half-plane orthonormal spectrum (reconstruction from frequency samples).

use ndarray::{Array2, ArrayView2, Zip};
use rustfft::num_complex::Complex;

use crate::error::Result;
use crate::float_trait::ProxFloat;
use crate::transforms::FourierPlans;
use crate::utils::{ensure_same_shape, ensure_unit_interval};

/// Replace observed pixels of `estimate` by the measurement:
/// `mask ⊙ measurement + (1 - mask) ⊙ estimate`.
pub fn project_spatial<F: ProxFloat>(
    estimate: ArrayView2<F>,
    measurement: ArrayView2<F>,
    mask: ArrayView2<F>,
) -> Result<Array2<F>> {
    ensure_same_shape("measurement", estimate.shape(), measurement.shape())?;
    ensure_same_shape("mask", estimate.shape(), mask.shape())?;
    Ok(Zip::from(&estimate)
        .and(&measurement)
        .and(&mask)
        .map_collect(|&x, &m, &w| w * m + (F::one() - w) * x))
}

/// Replace observed frequencies of `estimate` by `spectrum`.
pub fn project_fourier<F: ProxFloat>(
    estimate: ArrayView2<F>,
    spectrum: ArrayView2<Complex<F>>,
    mask: ArrayView2<F>,
    plans: &FourierPlans<F>,
) -> Result<Array2<F>> {
    ensure_same_shape("mask", spectrum.shape(), mask.shape())?;
    let mut current = plans.rfft2_ortho(estimate)?;
    ensure_same_shape("spectrum", current.shape(), spectrum.shape())?;
    Zip::from(&mut current)
        .and(&spectrum)
        .and(&mask)
        .for_each(|c, &s, &w| *c = s * w + *c * (F::one() - w));
    plans.irfft2_ortho(current.view())
}

/// `‖mask ⊙ (estimate - measurement)‖₂`
pub fn spatial_error<F: ProxFloat>(
    estimate: ArrayView2<F>,
    measurement: ArrayView2<F>,
    mask: ArrayView2<F>,
) -> Result<F> {
    ensure_same_shape("measurement", estimate.shape(), measurement.shape())?;
    ensure_same_shape("mask", estimate.shape(), mask.shape())?;
    let mut acc = F::zero();
    Zip::from(&estimate)
        .and(&measurement)
        .and(&mask)
        .for_each(|&x, &m, &w| {
            let r = w * (x - m);
            acc += r * r;
        });
    Ok(acc.sqrt())
}

/// `‖mask ⊙ (F estimate - spectrum)‖₂` over the stored half plane.
pub fn fourier_error<F: ProxFloat>(
    estimate: ArrayView2<F>,
    spectrum: ArrayView2<Complex<F>>,
    mask: ArrayView2<F>,
    plans: &FourierPlans<F>,
) -> Result<F> {
    ensure_same_shape("mask", spectrum.shape(), mask.shape())?;
    let current = plans.rfft2_ortho(estimate)?;
    ensure_same_shape("spectrum", current.shape(), spectrum.shape())?;
    let mut acc = F::zero();
    Zip::from(&current)
        .and(&spectrum)
        .and(&mask)
        .for_each(|&c, &s, &w| acc += ((c - s) * w).norm_sqr());
    Ok(acc.sqrt())
}

/// Closed convex set a splitting solver projects onto.
pub trait ConstraintSet<F: ProxFloat> {
    /// Image shape this constraint acts on.
    fn shape(&self) -> (usize, usize);

    /// Orthogonal projection of `estimate` onto the set.
    fn project(&self, estimate: ArrayView2<F>) -> Result<Array2<F>>;

    /// Masked distance between `estimate` and the measurement.
    fn residual_norm(&self, estimate: ArrayView2<F>) -> Result<F>;

    /// Starting point derived from the measurement alone.
    fn initial_estimate(&self) -> Result<Array2<F>>;
}

/// Pixels under the mask are pinned to the measurement.
#[derive(Debug, Clone)]
pub struct SpatialConstraint<F: ProxFloat> {
    measurement: Array2<F>,
    mask: Array2<F>,
}

impl<F: ProxFloat> SpatialConstraint<F> {
    pub fn new(measurement: Array2<F>, mask: Array2<F>) -> Result<Self> {
        ensure_same_shape("mask", measurement.shape(), mask.shape())?;
        ensure_unit_interval("mask", mask.view())?;
        Ok(Self { measurement, mask })
    }

    pub fn measurement(&self) -> ArrayView2<F> {
        self.measurement.view()
    }

    pub fn mask(&self) -> ArrayView2<F> {
        self.mask.view()
    }
}

impl<F: ProxFloat> ConstraintSet<F> for SpatialConstraint<F> {
    fn shape(&self) -> (usize, usize) {
        self.measurement.dim()
    }

    fn project(&self, estimate: ArrayView2<F>) -> Result<Array2<F>> {
        project_spatial(estimate, self.measurement.view(), self.mask.view())
    }

    fn residual_norm(&self, estimate: ArrayView2<F>) -> Result<F> {
        spatial_error(estimate, self.measurement.view(), self.mask.view())
    }

    fn initial_estimate(&self) -> Result<Array2<F>> {
        Ok(self.measurement.clone())
    }
}

/// Frequencies under the mask are pinned to the sampled spectrum.
#[derive(Debug)]
pub struct FourierConstraint<F: ProxFloat> {
    spectrum: Array2<Complex<F>>,
    mask: Array2<F>,
    plans: FourierPlans<F>,
}

impl<F: ProxFloat> FourierConstraint<F> {
    /// `shape` is the spatial image shape; the spectrum and mask must have
    /// the half-plane shape `(rows, cols/2 + 1)`.
    pub fn new(spectrum: Array2<Complex<F>>, mask: Array2<F>, shape: (usize, usize)) -> Result<Self> {
        let plans = FourierPlans::new(shape.0, shape.1)?;
        let (rows, half) = plans.spectrum_shape();
        ensure_same_shape("spectrum", &[rows, half], spectrum.shape())?;
        ensure_same_shape("mask", &[rows, half], mask.shape())?;
        ensure_unit_interval("mask", mask.view())?;
        Ok(Self {
            spectrum,
            mask,
            plans,
        })
    }

    pub fn plans(&self) -> &FourierPlans<F> {
        &self.plans
    }
}

impl<F: ProxFloat> ConstraintSet<F> for FourierConstraint<F> {
    fn shape(&self) -> (usize, usize) {
        self.plans.shape()
    }

    fn project(&self, estimate: ArrayView2<F>) -> Result<Array2<F>> {
        project_fourier(estimate, self.spectrum.view(), self.mask.view(), &self.plans)
    }

    fn residual_norm(&self, estimate: ArrayView2<F>) -> Result<F> {
        fourier_error(estimate, self.spectrum.view(), self.mask.view(), &self.plans)
    }

    fn initial_estimate(&self) -> Result<Array2<F>> {
        let sampled = Zip::from(&self.spectrum)
            .and(&self.mask)
            .map_collect(|&s, &w| s * w);
        self.plans.irfft2_ortho(sampled.view())
    }
}

/// What was observed, and where.
#[derive(Debug, Clone)]
pub enum Measurement<F: ProxFloat> {
    /// Pixel samples: inpainting.
    Spatial { image: Array2<F>, mask: Array2<F> },
    /// Half-plane orthonormal spectrum samples of a `shape` image.
    Fourier {
        spectrum: Array2<Complex<F>>,
        mask: Array2<F>,
        shape: (usize, usize),
    },
}

impl<F: ProxFloat> Measurement<F> {
    /// Spatial shape of the image to recover.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Measurement::Spatial { image, .. } => image.dim(),
            Measurement::Fourier { shape, .. } => *shape,
        }
    }

    /// Validate shapes and build the matching constraint set.
    pub fn constraint(&self) -> Result<Box<dyn ConstraintSet<F> + Send + Sync>> {
        Ok(match self {
            Measurement::Spatial { image, mask } => {
                Box::new(SpatialConstraint::new(image.clone(), mask.clone())?)
            }
            Measurement::Fourier {
                spectrum,
                mask,
                shape,
            } => Box::new(FourierConstraint::new(
                spectrum.clone(),
                mask.clone(),
                *shape,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WaveproxError;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    struct SimpleLcg {
        state: u64,
    }

    impl SimpleLcg {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_f64(&mut self) -> f64 {
            self.state = self
                .state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.state >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    fn random_image(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = SimpleLcg::new(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.next_f64())
    }

    fn random_mask(rows: usize, cols: usize, seed: u64, fraction: f64) -> Array2<f64> {
        let mut rng = SimpleLcg::new(seed);
        Array2::from_shape_fn((rows, cols), |_| {
            if rng.next_f64() < fraction {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_project_spatial_values() {
        let estimate = array![[1.0f64, 2.0], [3.0, 4.0]];
        let measurement = array![[10.0f64, 20.0], [30.0, 40.0]];
        let mask = array![[1.0f64, 0.0], [0.5, 0.0]];
        let out = project_spatial(estimate.view(), measurement.view(), mask.view()).unwrap();
        assert_eq!(out, array![[10.0, 2.0], [16.5, 4.0]]);
    }

    #[test]
    fn test_project_spatial_idempotent() {
        let estimate = random_image(8, 8, 1);
        let measurement = random_image(8, 8, 2);
        let mask = random_mask(8, 8, 3, 0.4);
        let once = project_spatial(estimate.view(), measurement.view(), mask.view()).unwrap();
        let twice = project_spatial(once.view(), measurement.view(), mask.view()).unwrap();
        assert_eq!(once, twice);
        assert_abs_diff_eq!(
            spatial_error(once.view(), measurement.view(), mask.view()).unwrap(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_project_spatial_shape_mismatch() {
        let a = Array2::<f64>::zeros((4, 4));
        let b = Array2::<f64>::zeros((4, 2));
        let err = project_spatial(a.view(), a.view(), b.view()).unwrap_err();
        assert!(matches!(err, WaveproxError::ShapeMismatch { name: "mask", .. }));
    }

    #[test]
    fn test_spatial_error_value() {
        let estimate = array![[1.0f64, 1.0]];
        let measurement = array![[4.0f64, 100.0]];
        let mask = array![[1.0f64, 0.0]];
        let err = spatial_error(estimate.view(), measurement.view(), mask.view()).unwrap();
        assert_abs_diff_eq!(err, 3.0, epsilon = 1e-15);
    }

    #[test]
    fn test_project_fourier_matches_samples() {
        let truth = random_image(8, 8, 5);
        let plans = FourierPlans::<f64>::new(8, 8).unwrap();
        let spectrum = plans.rfft2_ortho(truth.view()).unwrap();
        let mut mask = random_mask(8, 5, 6, 0.5);
        // Columns 0 and 4 hold both members of each conjugate pair
        for c in [0, 4] {
            for r in 5..8 {
                mask[[r, c]] = mask[[8 - r, c]];
            }
        }

        let estimate = random_image(8, 8, 7);
        let projected =
            project_fourier(estimate.view(), spectrum.view(), mask.view(), &plans).unwrap();
        let projected_spectrum = plans.rfft2_ortho(projected.view()).unwrap();
        for ((idx, &w), s) in mask.indexed_iter().zip(spectrum.iter()) {
            if w == 1.0 {
                assert_abs_diff_eq!(projected_spectrum[idx].re, s.re, epsilon = 1e-12);
                assert_abs_diff_eq!(projected_spectrum[idx].im, s.im, epsilon = 1e-12);
            }
        }

        let again =
            project_fourier(projected.view(), spectrum.view(), mask.view(), &plans).unwrap();
        for (a, b) in projected.iter().zip(again.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_project_fourier_full_mask_recovers_truth() {
        let truth = random_image(8, 16, 11);
        let plans = FourierPlans::<f64>::new(8, 16).unwrap();
        let spectrum = plans.rfft2_ortho(truth.view()).unwrap();
        let mask = Array2::<f64>::ones(spectrum.dim());
        let estimate = Array2::<f64>::zeros((8, 16));
        let out = project_fourier(estimate.view(), spectrum.view(), mask.view(), &plans).unwrap();
        for (a, b) in truth.iter().zip(out.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(
            fourier_error(out.view(), spectrum.view(), mask.view(), &plans).unwrap(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_fourier_constraint_rejects_bad_shapes() {
        let spectrum = Array2::<Complex<f64>>::zeros((8, 8));
        let mask = Array2::<f64>::zeros((8, 8));
        let err = FourierConstraint::new(spectrum, mask, (8, 8)).unwrap_err();
        assert!(matches!(
            err,
            WaveproxError::ShapeMismatch {
                name: "spectrum",
                ..
            }
        ));
    }

    #[test]
    fn test_spatial_constraint_rejects_bad_mask() {
        let image = Array2::<f64>::zeros((4, 4));
        let mask = Array2::<f64>::from_elem((4, 4), 2.0);
        assert!(matches!(
            SpatialConstraint::new(image, mask),
            Err(WaveproxError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_measurement_constraint_dispatch() {
        let image = random_image(4, 8, 12);
        let mask = random_mask(4, 8, 13, 0.5);
        let spatial = Measurement::Spatial {
            image: image.clone(),
            mask: mask.clone(),
        };
        assert_eq!(spatial.shape(), (4, 8));
        let constraint = spatial.constraint().unwrap();
        assert_eq!(constraint.shape(), (4, 8));
        assert_eq!(constraint.initial_estimate().unwrap(), image);

        let plans = FourierPlans::<f64>::new(4, 8).unwrap();
        let spectrum = plans.rfft2_ortho(image.view()).unwrap();
        let fourier = Measurement::Fourier {
            spectrum,
            mask: Array2::ones((4, 5)),
            shape: (4, 8),
        };
        let constraint = fourier.constraint().unwrap();
        assert_eq!(constraint.shape(), (4, 8));
        let initial = constraint.initial_estimate().unwrap();
        for (a, b) in image.iter().zip(initial.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(constraint.residual_norm(initial.view()).unwrap(), 0.0, epsilon = 1e-12);
    }
}
