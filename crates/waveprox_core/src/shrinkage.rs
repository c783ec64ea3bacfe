//! Soft-thresholding in the wavelet domain.
//!
//! `shrink(x, λ)` is the proximal map of `λ·‖W x‖₁` for an orthonormal
//! transform `W`: transform, soft-threshold every coefficient, transform back.
//! The same module hosts coefficient-budget compression, which keeps only the
//! largest wavelet coefficients.

use std::cmp::Ordering;

use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Dimension};
use tracing::debug;

use crate::error::{Result, WaveproxError};
use crate::float_trait::ProxFloat;
use crate::utils::{ensure_non_negative, par_map_inplace, sum_abs};
use crate::wavelet::MultiresolutionTransform;

/// `sign(c) · max(|c| - λ, 0)`.
#[inline]
pub fn soft_threshold<F: ProxFloat>(value: F, lambda: F) -> F {
    let magnitude = value.abs() - lambda;
    if magnitude > F::zero() {
        value.signum() * magnitude
    } else {
        F::zero()
    }
}

/// Soft-threshold every element of `data` in place.
pub fn soft_threshold_inplace<F: ProxFloat, D: Dimension>(data: &mut Array<F, D>, lambda: F) {
    par_map_inplace(data, |v| soft_threshold(v, lambda));
}

/// Wavelet shrinkage bound to one filter order.
#[derive(Debug, Clone)]
pub struct ShrinkageOperator<F: ProxFloat> {
    transform: MultiresolutionTransform<F>,
}

impl<F: ProxFloat> ShrinkageOperator<F> {
    pub fn new(order: usize) -> Result<Self> {
        Ok(Self {
            transform: MultiresolutionTransform::new(order)?,
        })
    }

    pub fn order(&self) -> usize {
        self.transform.order()
    }

    pub fn transform(&self) -> &MultiresolutionTransform<F> {
        &self.transform
    }

    /// Proximal map of `lambda · ‖W x‖₁` for an image.
    pub fn shrink(&self, image: ArrayView2<F>, lambda: F) -> Result<Array2<F>> {
        ensure_non_negative("lambda", lambda)?;
        let mut coeffs = self.transform.forward_2d(image)?;
        soft_threshold_inplace(&mut coeffs, lambda);
        self.transform.inverse_2d(coeffs.view())
    }

    /// Proximal map of `lambda · ‖W x‖₁` for a signal.
    pub fn shrink_1d(&self, signal: ArrayView1<F>, lambda: F) -> Result<Array1<F>> {
        ensure_non_negative("lambda", lambda)?;
        let mut coeffs = self.transform.forward_1d(signal)?;
        soft_threshold_inplace(&mut coeffs, lambda);
        self.transform.inverse_1d(coeffs.view())
    }

    /// `‖W x‖₁` for an image.
    pub fn l1(&self, image: ArrayView2<F>) -> Result<F> {
        Ok(sum_abs(self.transform.forward_2d(image)?.view()))
    }

    /// `‖W x‖₁` for a signal.
    pub fn l1_1d(&self, signal: ArrayView1<F>) -> Result<F> {
        Ok(sum_abs(self.transform.forward_1d(signal)?.view()))
    }
}

/// Wavelet shrinkage of an image with the filter pair of `order`.
///
/// `lambda == 0` returns the input up to rounding.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::InvalidParameter`] | `lambda` negative or not finite |
/// | [`WaveproxError::NotPowerOfTwo`] | either dimension is not a power of two |
/// | [`WaveproxError::UnsupportedOrder`] | `order` above the stable range |
pub fn shrink<F: ProxFloat>(image: ArrayView2<F>, lambda: F, order: usize) -> Result<Array2<F>> {
    ShrinkageOperator::new(order)?.shrink(image, lambda)
}

/// 1D counterpart of [`shrink`].
pub fn shrink_1d<F: ProxFloat>(signal: ArrayView1<F>, lambda: F, order: usize) -> Result<Array1<F>> {
    ShrinkageOperator::new(order)?.shrink_1d(signal, lambda)
}

/// Sum of absolute wavelet coefficients of an image.
pub fn wavelet_l1<F: ProxFloat>(image: ArrayView2<F>, order: usize) -> Result<F> {
    ShrinkageOperator::new(order)?.l1(image)
}

/// Sum of absolute wavelet coefficients of a signal.
pub fn wavelet_l1_1d<F: ProxFloat>(signal: ArrayView1<F>, order: usize) -> Result<F> {
    ShrinkageOperator::new(order)?.l1_1d(signal)
}

/// Wavelet denoising by a single shrinkage step.
pub fn denoise_wavelet<F: ProxFloat>(
    noisy: ArrayView2<F>,
    lambda: F,
    order: usize,
) -> Result<Array2<F>> {
    let denoised = shrink(noisy, lambda, order)?;
    debug!(order, lambda = lambda.as_f64(), "wavelet denoising done");
    Ok(denoised)
}

/// Keep the `floor(len · keep_fraction)` largest wavelet coefficients of
/// `image` and reconstruct from them.
///
/// Coefficients tied with the smallest kept magnitude are kept as well, so
/// the returned count can exceed the budget. A budget of zero drops every
/// coefficient.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::InvalidParameter`] | `keep_fraction` outside `[0, 1]` |
/// | [`WaveproxError::NotPowerOfTwo`] | either dimension is not a power of two |
/// | [`WaveproxError::UnsupportedOrder`] | `order` above the stable range |
pub fn compress<F: ProxFloat>(
    image: ArrayView2<F>,
    order: usize,
    keep_fraction: f64,
) -> Result<(Array2<F>, usize)> {
    if !(0.0..=1.0).contains(&keep_fraction) {
        return Err(WaveproxError::InvalidParameter(format!(
            "keep_fraction must lie in [0, 1], got {keep_fraction}"
        )));
    }

    let transform = MultiresolutionTransform::new(order)?;
    let mut coeffs = transform.forward_2d(image)?;
    let budget = (coeffs.len() as f64 * keep_fraction).floor() as usize;

    let kept = if budget == 0 {
        coeffs.fill(F::zero());
        0
    } else {
        let mut magnitudes: Vec<F> = coeffs.iter().map(|c| c.abs()).collect();
        // Descending; the budget-th largest magnitude is the cutoff
        let (_, cutoff, _) = magnitudes.select_nth_unstable_by(budget - 1, |a, b| {
            b.partial_cmp(a).unwrap_or(Ordering::Equal)
        });
        let cutoff = *cutoff;
        let mut kept = 0usize;
        coeffs.mapv_inplace(|c| {
            if c.abs() >= cutoff {
                kept += 1;
                c
            } else {
                F::zero()
            }
        });
        kept
    };

    debug!(
        order,
        budget,
        kept,
        total = coeffs.len(),
        "wavelet compression"
    );
    Ok((transform.inverse_2d(coeffs.view())?, kept))
}
