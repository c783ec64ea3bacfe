use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{Result, WaveproxError};
use crate::float_trait::ProxFloat;

/// Number of stored columns of a half-plane spectrum for `cols` input columns.
#[inline]
pub fn half_spectrum_cols(cols: usize) -> usize {
    cols / 2 + 1
}

/// Pre-computed FFT plans for one image shape.
///
/// Planning is the expensive part of rustfft, so solvers build one
/// `FourierPlans` up front and reuse it for every projection.
///
/// All transforms here are orthonormal ("ortho" normalization): forward and
/// inverse are both scaled by `1/sqrt(rows*cols)`, which makes the forward
/// transform energy preserving. Spectra are stored as the half plane
/// `(rows, cols/2 + 1)` of a real-input transform.
pub struct FourierPlans<F: ProxFloat> {
    rows: usize,
    cols: usize,
    fft_row: Arc<dyn Fft<F>>,
    fft_col: Arc<dyn Fft<F>>,
    ifft_row: Arc<dyn Fft<F>>,
    ifft_col: Arc<dyn Fft<F>>,
}

impl<F: ProxFloat> std::fmt::Debug for FourierPlans<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FourierPlans")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl<F: ProxFloat> FourierPlans<F> {
    /// Plan forward and inverse transforms for a `(rows, cols)` image.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(WaveproxError::InvalidParameter(format!(
                "cannot plan a Fourier transform for a {rows}x{cols} array"
            )));
        }
        let mut planner = FftPlanner::<F>::new();
        Ok(Self {
            rows,
            cols,
            fft_row: planner.plan_fft_forward(cols),
            fft_col: planner.plan_fft_forward(rows),
            ifft_row: planner.plan_fft_inverse(cols),
            ifft_col: planner.plan_fft_inverse(rows),
        })
    }

    /// Plans for a 1D signal of length `len`, treated as a single row.
    pub fn for_signal(len: usize) -> Result<Self> {
        Self::new(1, len)
    }

    /// Image shape these plans were built for.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Shape of the half-plane spectrum.
    pub fn spectrum_shape(&self) -> (usize, usize) {
        (self.rows, half_spectrum_cols(self.cols))
    }

    #[inline]
    fn ortho_scale(&self) -> F {
        F::one() / F::usize_as(self.rows * self.cols).sqrt()
    }

    fn check_image(&self, shape: (usize, usize)) -> Result<()> {
        if shape != (self.rows, self.cols) {
            return Err(WaveproxError::ShapeMismatch {
                name: "image",
                expected: vec![self.rows, self.cols],
                actual: vec![shape.0, shape.1],
            });
        }
        Ok(())
    }

    fn check_spectrum(&self, shape: (usize, usize)) -> Result<()> {
        let expected = self.spectrum_shape();
        if shape != expected {
            return Err(WaveproxError::ShapeMismatch {
                name: "spectrum",
                expected: vec![expected.0, expected.1],
                actual: vec![shape.0, shape.1],
            });
        }
        Ok(())
    }

    /// Orthonormal real-input 2D FFT, half plane `(rows, cols/2 + 1)`.
    pub fn rfft2_ortho(&self, image: ArrayView2<F>) -> Result<Array2<Complex<F>>> {
        self.check_image(image.dim())?;
        let (rows, cols) = (self.rows, self.cols);

        // 1. Transform rows
        let mut intermediate = Array2::<Complex<F>>::zeros((rows, cols));
        let mut row_vec = vec![Complex::new(F::zero(), F::zero()); cols];
        for r in 0..rows {
            for (c, &v) in image.row(r).iter().enumerate() {
                row_vec[c] = Complex::new(v, F::zero());
            }
            self.fft_row.process(&mut row_vec);
            for c in 0..cols {
                intermediate[[r, c]] = row_vec[c];
            }
        }

        // 2. Transform the kept columns
        let half = half_spectrum_cols(cols);
        let scale = self.ortho_scale();
        let mut output = Array2::<Complex<F>>::zeros((rows, half));
        let mut col_vec = vec![Complex::new(F::zero(), F::zero()); rows];
        for c in 0..half {
            for r in 0..rows {
                col_vec[r] = intermediate[[r, c]];
            }
            self.fft_col.process(&mut col_vec);
            for r in 0..rows {
                output[[r, c]] = col_vec[r] * scale;
            }
        }

        Ok(output)
    }

    /// Inverse of [`Self::rfft2_ortho`].
    ///
    /// The missing half plane is rebuilt by Hermitian symmetry; imaginary
    /// parts that a real image cannot carry are discarded, matching a
    /// real-output inverse transform.
    pub fn irfft2_ortho(&self, spectrum: ArrayView2<Complex<F>>) -> Result<Array2<F>> {
        self.check_spectrum(spectrum.dim())?;
        let (rows, cols) = (self.rows, self.cols);
        let half = half_spectrum_cols(cols);

        let mut full = Array2::<Complex<F>>::zeros((rows, cols));
        full.slice_mut(s![.., ..half.min(cols)])
            .assign(&spectrum.slice(s![.., ..half.min(cols)]));
        for r in 0..rows {
            let mirror_r = (rows - r) % rows;
            for c in half..cols {
                full[[r, c]] = spectrum[[mirror_r, cols - c]].conj();
            }
        }

        // 1. Transform columns
        let mut col_vec = vec![Complex::new(F::zero(), F::zero()); rows];
        for c in 0..cols {
            for r in 0..rows {
                col_vec[r] = full[[r, c]];
            }
            self.ifft_col.process(&mut col_vec);
            for r in 0..rows {
                full[[r, c]] = col_vec[r];
            }
        }

        // 2. Transform rows
        let scale = self.ortho_scale();
        let mut output = Array2::<F>::zeros((rows, cols));
        let mut row_vec = vec![Complex::new(F::zero(), F::zero()); cols];
        for r in 0..rows {
            for c in 0..cols {
                row_vec[c] = full[[r, c]];
            }
            self.ifft_row.process(&mut row_vec);
            for c in 0..cols {
                output[[r, c]] = row_vec[c].re * scale;
            }
        }

        Ok(output)
    }

    /// Orthonormal real-input FFT of a 1D signal, `len/2 + 1` bins.
    pub fn rfft_ortho(&self, signal: ArrayView1<F>) -> Result<Array1<Complex<F>>> {
        let spectrum = self.rfft2_ortho(signal.insert_axis(Axis(0)))?;
        Ok(spectrum.index_axis_move(Axis(0), 0))
    }

    /// Inverse of [`Self::rfft_ortho`].
    pub fn irfft_ortho(&self, spectrum: ArrayView1<Complex<F>>) -> Result<Array1<F>> {
        let signal = self.irfft2_ortho(spectrum.insert_axis(Axis(0)))?;
        Ok(signal.index_axis_move(Axis(0), 0))
    }
}
