//! Periodic multiresolution (discrete wavelet) transform.
//!
//! The forward transform splits a line of length `n` into `n/2` low-pass and
//! `n/2` high-pass coefficients with circular indexing, then repeats on the
//! low half until one coefficient is left. The result is a pyramid of the same
//! length: `[coarsest | details (coarse to fine)]`. The 2D transform is
//! separable: rows first, then columns.
//!
//! For an orthonormal [`FilterPair`](crate::filters::FilterPair) the transform
//! is an isometry and `inverse(forward(x)) == x` up to rounding.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use rayon::prelude::*;

use crate::error::{Result, WaveproxError};
use crate::filters::filters;
use crate::float_trait::ProxFloat;

/// Minimum number of lines before a pass is split across rayon workers.
/// Below this the per-task overhead outweighs the work.
const PARALLEL_LINE_THRESHOLD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

/// Transform engine bound to one filter order.
///
/// Holds the filter taps converted to `F`, so repeated transforms inside a
/// solver loop skip the cache lookup.
#[derive(Debug, Clone)]
pub struct MultiresolutionTransform<F: ProxFloat> {
    order: usize,
    principal: Vec<F>,
    wavelet: Vec<F>,
}

/// Require a power-of-two length on `axis`.
pub(crate) fn check_power_of_two(axis: usize, len: usize) -> Result<()> {
    if len.is_power_of_two() {
        Ok(())
    } else {
        Err(WaveproxError::NotPowerOfTwo { axis, len })
    }
}

impl<F: ProxFloat> MultiresolutionTransform<F> {
    /// Look up (or synthesize) the filter pair for `order`.
    pub fn new(order: usize) -> Result<Self> {
        let pair = filters(order)?;
        Ok(Self {
            order,
            principal: pair.principal().iter().map(|&v| F::from_f64_c(v)).collect(),
            wavelet: pair.wavelet().iter().map(|&v| F::from_f64_c(v)).collect(),
        })
    }

    /// Filter order of this transform.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Forward transform of a 1D signal.
    pub fn forward_1d(&self, signal: ArrayView1<F>) -> Result<Array1<F>> {
        check_power_of_two(0, signal.len())?;
        let mut line = signal.to_vec();
        let mut scratch = vec![F::zero(); line.len()];
        self.forward_line(&mut line, &mut scratch);
        Ok(Array1::from(line))
    }

    /// Inverse transform of a 1D coefficient pyramid.
    pub fn inverse_1d(&self, coeffs: ArrayView1<F>) -> Result<Array1<F>> {
        check_power_of_two(0, coeffs.len())?;
        let mut line = coeffs.to_vec();
        let mut scratch = vec![F::zero(); line.len()];
        self.inverse_line(&mut line, &mut scratch);
        Ok(Array1::from(line))
    }

    /// Separable forward transform: every row, then every column.
    pub fn forward_2d(&self, image: ArrayView2<F>) -> Result<Array2<F>> {
        let (rows, cols) = image.dim();
        check_power_of_two(0, rows)?;
        check_power_of_two(1, cols)?;

        let mut data = image.as_standard_layout().into_owned();
        self.transform_rows(&mut data, Direction::Forward);
        let mut transposed = data.t().as_standard_layout().into_owned();
        self.transform_rows(&mut transposed, Direction::Forward);
        Ok(transposed.t().as_standard_layout().into_owned())
    }

    /// Separable inverse transform: every column, then every row.
    pub fn inverse_2d(&self, coeffs: ArrayView2<F>) -> Result<Array2<F>> {
        let (rows, cols) = coeffs.dim();
        check_power_of_two(0, rows)?;
        check_power_of_two(1, cols)?;

        let mut transposed = coeffs.t().as_standard_layout().into_owned();
        self.transform_rows(&mut transposed, Direction::Inverse);
        let mut data = transposed.t().as_standard_layout().into_owned();
        self.transform_rows(&mut data, Direction::Inverse);
        Ok(data)
    }

    /// Apply the 1D transform to each row of `data` in place.
    fn transform_rows(&self, data: &mut Array2<F>, direction: Direction) {
        let (rows, cols) = data.dim();
        if rows == 0 || cols <= 1 {
            return;
        }

        if rows >= PARALLEL_LINE_THRESHOLD {
            let lines: Vec<ArrayViewMut1<F>> = data.axis_iter_mut(Axis(0)).collect();
            lines.into_par_iter().for_each_init(
                || (Vec::with_capacity(cols), vec![F::zero(); cols]),
                |(line, scratch), row| self.transform_view(row, line, scratch, direction),
            );
        } else {
            let mut line = Vec::with_capacity(cols);
            let mut scratch = vec![F::zero(); cols];
            for row in data.axis_iter_mut(Axis(0)) {
                self.transform_view(row, &mut line, &mut scratch, direction);
            }
        }
    }

    #[inline]
    fn transform_view(
        &self,
        mut row: ArrayViewMut1<F>,
        line: &mut Vec<F>,
        scratch: &mut [F],
        direction: Direction,
    ) {
        line.clear();
        line.extend(row.iter().copied());
        match direction {
            Direction::Forward => self.forward_line(line, scratch),
            Direction::Inverse => self.inverse_line(line, scratch),
        }
        for (dst, &src) in row.iter_mut().zip(line.iter()) {
            *dst = src;
        }
    }

    /// Full pyramid on one line, finest scale first.
    fn forward_line(&self, line: &mut [F], scratch: &mut [F]) {
        let mut n = line.len();
        while n > 1 {
            let half = n / 2;
            for i in 0..half {
                let mut low = F::zero();
                let mut high = F::zero();
                for (j, (&p, &w)) in self.principal.iter().zip(&self.wavelet).enumerate() {
                    let v = line[(2 * i + j) % n];
                    low += p * v;
                    high += w * v;
                }
                scratch[i] = low;
                scratch[half + i] = high;
            }
            line[..n].copy_from_slice(&scratch[..n]);
            n = half;
        }
    }

    /// Undo [`Self::forward_line`], coarsest scale first.
    fn inverse_line(&self, line: &mut [F], scratch: &mut [F]) {
        let len = line.len();
        let taps_per_phase = self.principal.len() / 2;
        let mut n = 2;
        while n <= len {
            let half = n / 2;
            for (i, out) in scratch.iter_mut().enumerate().take(n) {
                let phase = i % 2;
                let base = i / 2;
                let mut acc = F::zero();
                for j in 0..taps_per_phase {
                    // (base - j) mod half
                    let idx = (base + half - j % half) % half;
                    let k = phase + 2 * j;
                    acc += self.principal[k] * line[idx] + self.wavelet[k] * line[idx + half];
                }
                *out = acc;
            }
            line[..n].copy_from_slice(&scratch[..n]);
            n *= 2;
        }
    }
}

/// Forward transform of a 1D signal with the filter pair of `order`.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::NotPowerOfTwo`] | signal length is not a power of two |
/// | [`WaveproxError::UnsupportedOrder`] | `order` above the stable range |
pub fn forward_1d<F: ProxFloat>(signal: ArrayView1<F>, order: usize) -> Result<Array1<F>> {
    MultiresolutionTransform::new(order)?.forward_1d(signal)
}

/// Inverse of [`forward_1d`].
pub fn inverse_1d<F: ProxFloat>(coeffs: ArrayView1<F>, order: usize) -> Result<Array1<F>> {
    MultiresolutionTransform::new(order)?.inverse_1d(coeffs)
}

/// Forward 2D transform (rows, then columns).
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::NotPowerOfTwo`] | either dimension is not a power of two |
/// | [`WaveproxError::UnsupportedOrder`] | `order` above the stable range |
pub fn forward_2d<F: ProxFloat>(image: ArrayView2<F>, order: usize) -> Result<Array2<F>> {
    MultiresolutionTransform::new(order)?.forward_2d(image)
}

/// Inverse of [`forward_2d`].
pub fn inverse_2d<F: ProxFloat>(coeffs: ArrayView2<F>, order: usize) -> Result<Array2<F>> {
    MultiresolutionTransform::new(order)?.inverse_2d(coeffs)
}
