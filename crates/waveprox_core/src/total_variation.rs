//! Total-variation denoising.
//!
//! Solves `min_x ½‖x − f‖² + λ Σ ‖∇x‖₂` through its dual: with `g` a vector
//! field bounded pointwise by `λ`, minimize `½‖div g − f‖²` by accelerated
//! forward-backward splitting, then recover `x = f − div g`.
//!
//! The image is piecewise constant and the dual field piecewise bilinear, so
//! the gradient of an `H × W` image lives on the `(H−1) × (W−1)` interior
//! vertices and vanishes on the boundary. Derivatives are scaled by the image
//! size along each axis (unit-square domain).

use ndarray::{s, Array2, ArrayView2, Zip};
use tracing::info;

use crate::error::{Result, WaveproxError};
use crate::float_trait::ProxFloat;
use crate::solvers::{emit_objective, IterationReport, NoObserver};
use crate::utils::{ensure_non_negative, ensure_same_shape, sum_squares};

// =============================================================================
// Constants
// =============================================================================

/// Default regularization weight
const DEFAULT_LAMBDA: f64 = 1.0;

/// Default number of accelerated iterations
const DEFAULT_ITERATIONS: usize = 200;

/// Smallest image (per axis) with a non-empty gradient field
const MIN_IMAGE_SIZE: usize = 2;

// =============================================================================
// Types
// =============================================================================

/// Discrete vector field on the interior vertices of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField<F: ProxFloat> {
    /// Derivative along rows (axis 0).
    pub x: Array2<F>,
    /// Derivative along columns (axis 1).
    pub y: Array2<F>,
}

impl<F: ProxFloat> GradientField<F> {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            x: Array2::zeros(shape),
            y: Array2::zeros(shape),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.x.dim()
    }

    /// Per-vertex Euclidean magnitude `sqrt(x² + y²)`.
    pub fn magnitude(&self) -> Array2<F> {
        Zip::from(&self.x)
            .and(&self.y)
            .map_collect(|&gx, &gy| (gx * gx + gy * gy).sqrt())
    }

    fn check_channels(&self) -> Result<()> {
        ensure_same_shape("gradient y channel", self.x.shape(), self.y.shape())
    }
}

/// Extrapolation weights of the accelerated scheme.
///
/// `q₀ = 0`, `q₁ = √5 − 1`, `q_{k+1} = sqrt((q_k + 2)² + 1) − 1`, and step
/// `k` extrapolates with `α_k = q_k / (2 + q_{k+1})`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    q: f64,
    q_next: f64,
}

impl Default for Momentum {
    fn default() -> Self {
        Self {
            q: 0.0,
            q_next: 5f64.sqrt() - 1.0,
        }
    }
}

impl Momentum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current `q_k`.
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Return `α_k` and move on to `k + 1`.
    pub fn advance(&mut self) -> f64 {
        let alpha = self.q / (2.0 + self.q_next);
        self.q = self.q_next;
        self.q_next = ((self.q + 2.0).powi(2) + 1.0).sqrt() - 1.0;
        alpha
    }
}

/// Configuration for total-variation denoising.
#[derive(Debug, Clone)]
pub struct TotalVariationConfig<F: ProxFloat> {
    /// Weight of the total-variation term. Default: 1.0
    pub lambda: F,
    /// Iteration count. Default: 200
    pub iterations: usize,
}

impl<F: ProxFloat> Default for TotalVariationConfig<F> {
    fn default() -> Self {
        Self {
            lambda: F::from_f64_c(DEFAULT_LAMBDA),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl<F: ProxFloat> TotalVariationConfig<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lambda.is_finite() || self.lambda < F::zero() {
            return Err(WaveproxError::InvalidConfig(
                "lambda must be finite and >= 0".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(WaveproxError::InvalidConfig(
                "iterations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Operators
// =============================================================================

fn check_image_size(rows: usize, cols: usize) -> Result<()> {
    if rows < MIN_IMAGE_SIZE || cols < MIN_IMAGE_SIZE {
        return Err(WaveproxError::ImageTooSmall {
            rows,
            cols,
            min: MIN_IMAGE_SIZE,
        });
    }
    Ok(())
}

/// Discrete gradient of an `H × W` image, shape `(H − 1, W − 1)`.
pub fn gradient<F: ProxFloat>(image: ArrayView2<F>) -> Result<GradientField<F>> {
    let (rows, cols) = image.dim();
    check_image_size(rows, cols)?;
    let half = F::from_f64_c(0.5);
    let hx = F::usize_as(rows) * half;
    let hy = F::usize_as(cols) * half;

    let top_left = image.slice(s![..-1, ..-1]);
    let top_right = image.slice(s![..-1, 1..]);
    let bottom_left = image.slice(s![1.., ..-1]);
    let bottom_right = image.slice(s![1.., 1..]);

    let x = Zip::from(&top_left)
        .and(&top_right)
        .and(&bottom_left)
        .and(&bottom_right)
        .map_collect(|&a, &b, &c, &d| hx * (a + b - c - d));
    let y = Zip::from(&top_left)
        .and(&top_right)
        .and(&bottom_left)
        .and(&bottom_right)
        .map_collect(|&a, &b, &c, &d| hy * (a - b + c - d));

    Ok(GradientField { x, y })
}

/// Adjoint of [`gradient`]: maps a `(H − 1, W − 1)` field to an `H × W`
/// image, with `⟨gradient(u), g⟩ = ⟨u, divergence(g)⟩`.
pub fn divergence<F: ProxFloat>(field: &GradientField<F>) -> Result<Array2<F>> {
    field.check_channels()?;
    let (inner_rows, inner_cols) = field.dim();
    let (rows, cols) = (inner_rows + 1, inner_cols + 1);
    let half = F::from_f64_c(0.5);
    let hx = F::usize_as(rows) * half;
    let hy = F::usize_as(cols) * half;

    let mut out = Array2::<F>::zeros((rows, cols));
    // Scatter each vertex value onto its four surrounding pixels.
    Zip::from(out.slice_mut(s![..-1, ..-1]))
        .and(&field.x)
        .and(&field.y)
        .for_each(|o, &gx, &gy| *o += hx * gx + hy * gy);
    Zip::from(out.slice_mut(s![..-1, 1..]))
        .and(&field.x)
        .and(&field.y)
        .for_each(|o, &gx, &gy| *o += hx * gx - hy * gy);
    Zip::from(out.slice_mut(s![1.., ..-1]))
        .and(&field.x)
        .and(&field.y)
        .for_each(|o, &gx, &gy| *o += hy * gy - hx * gx);
    Zip::from(out.slice_mut(s![1.., 1..]))
        .and(&field.x)
        .and(&field.y)
        .for_each(|o, &gx, &gy| *o -= hx * gx + hy * gy);

    Ok(out)
}

fn project_linf_inplace<F: ProxFloat>(field: &mut GradientField<F>, lambda: F) {
    if lambda == F::zero() {
        field.x.fill(F::zero());
        field.y.fill(F::zero());
        return;
    }
    Zip::from(&mut field.x)
        .and(&mut field.y)
        .for_each(|gx, gy| {
            let norm = (*gx * *gx + *gy * *gy).sqrt();
            let scale = lambda / norm.max(lambda);
            *gx *= scale;
            *gy *= scale;
        });
}

/// Project each vertex vector onto the disc of radius `lambda`.
///
/// This is the proximal map of the dual of `λ Σ ‖·‖₂`. `lambda == 0`
/// collapses the field to zero.
pub fn project_linf<F: ProxFloat>(field: &GradientField<F>, lambda: F) -> Result<GradientField<F>> {
    ensure_non_negative("lambda", lambda)?;
    field.check_channels()?;
    let mut projected = field.clone();
    project_linf_inplace(&mut projected, lambda);
    Ok(projected)
}

/// `½‖div g − f‖²`
pub fn dual_objective<F: ProxFloat>(field: &GradientField<F>, noisy: ArrayView2<F>) -> Result<F> {
    let mut residual = divergence(field)?;
    ensure_same_shape("noisy image", residual.shape(), noisy.shape())?;
    residual.zip_mut_with(&noisy, |r, &f| *r -= f);
    Ok(F::from_f64_c(0.5) * sum_squares(residual.view()))
}

/// `½‖x − f‖² + λ Σ ‖∇x‖₂`
pub fn primal_energy<F: ProxFloat>(image: ArrayView2<F>, noisy: ArrayView2<F>, lambda: F) -> Result<F> {
    ensure_same_shape("noisy image", image.shape(), noisy.shape())?;
    let fidelity = Zip::from(&image)
        .and(&noisy)
        .fold(F::zero(), |acc, &x, &f| acc + (x - f) * (x - f));
    let variation = gradient(image)?.magnitude().sum();
    Ok(F::from_f64_c(0.5) * fidelity + lambda * variation)
}

fn recover_primal<F: ProxFloat>(noisy: ArrayView2<F>, dual: &GradientField<F>) -> Result<Array2<F>> {
    let mut image = noisy.to_owned();
    let correction = divergence(dual)?;
    image.zip_mut_with(&correction, |x, &d| *x -= d);
    Ok(image)
}

// =============================================================================
// Solver
// =============================================================================

/// Total-variation denoising of `noisy`.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::InvalidConfig`] | config fails validation |
/// | [`WaveproxError::ImageTooSmall`] | either dimension below 2 |
pub fn denoise_total_variation<F: ProxFloat>(
    noisy: ArrayView2<F>,
    config: &TotalVariationConfig<F>,
) -> Result<Array2<F>> {
    solve_total_variation(noisy, config, None::<NoObserver<F>>)
}

/// [`denoise_total_variation`] with a per-iteration observer receiving the
/// primal energy of the current estimate.
pub fn denoise_total_variation_with_observer<F, O>(
    noisy: ArrayView2<F>,
    config: &TotalVariationConfig<F>,
    observer: O,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    solve_total_variation(noisy, config, Some(observer))
}

#[tracing::instrument(skip_all, fields(rows = noisy.nrows(), cols = noisy.ncols()))]
fn solve_total_variation<F, O>(
    noisy: ArrayView2<F>,
    config: &TotalVariationConfig<F>,
    mut observer: Option<O>,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    config.validate()?;
    let (rows, cols) = noisy.dim();
    check_image_size(rows, cols)?;
    let lambda = config.lambda;
    let largest = F::usize_as(rows.max(cols));
    let step = F::one() / (F::from_f64_c(8.0) * largest * largest);
    info!(
        lambda = lambda.as_f64(),
        iterations = config.iterations,
        "total-variation denoising started"
    );

    let mut dual = GradientField::zeros((rows - 1, cols - 1));
    let mut extrapolated = dual.clone();
    let mut momentum = Momentum::new();
    emit_objective(&mut observer, 0, || primal_energy(noisy, noisy, lambda));

    for iteration in 1..=config.iterations {
        // Gradient of the dual objective at the extrapolated point
        let mut residual = divergence(&extrapolated)?;
        residual.zip_mut_with(&noisy, |r, &f| *r -= f);
        let descent = gradient(residual.view())?;

        let mut next = GradientField {
            x: Zip::from(&extrapolated.x)
                .and(&descent.x)
                .map_collect(|&g, &d| g - step * d),
            y: Zip::from(&extrapolated.y)
                .and(&descent.y)
                .map_collect(|&g, &d| g - step * d),
        };
        project_linf_inplace(&mut next, lambda);

        let alpha = F::from_f64_c(momentum.advance());
        Zip::from(&mut extrapolated.x)
            .and(&next.x)
            .and(&dual.x)
            .for_each(|e, &n, &p| *e = n + alpha * (n - p));
        Zip::from(&mut extrapolated.y)
            .and(&next.y)
            .and(&dual.y)
            .for_each(|e, &n, &p| *e = n + alpha * (n - p));
        dual = next;

        emit_objective(&mut observer, iteration, || {
            let estimate = recover_primal(noisy, &dual)?;
            primal_energy(estimate.view(), noisy, lambda)
        });
    }

    info!("total-variation denoising finished");
    recover_primal(noisy, &dual)
}
