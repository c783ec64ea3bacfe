//! Proximal splitting solvers.
//!
//! Two estimators are supported for recovering an image `x` from masked
//! measurements:
//!
//! - **Danzig**: `min ‖W x‖₁` subject to `x` matching the measurement,
//!   solved with Douglas-Rachford splitting.
//! - **Lasso**: `min ½‖mask ⊙ (A x - b)‖² + λ‖W x‖₁`, solved with
//!   forward-backward splitting (unit step, the Lipschitz constant of the
//!   data term).
//!
//! Every solver runs a fixed number of iterations. The objective is reported
//! after the initial estimate (iteration 0) and after each iteration.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rustfft::num_complex::Complex;
use tracing::{debug, info, warn, Level};

use crate::error::{Result, WaveproxError};
use crate::float_trait::ProxFloat;
use crate::projection::{ConstraintSet, FourierConstraint, Measurement};
use crate::shrinkage::{soft_threshold_inplace, ShrinkageOperator};
use crate::utils::{clip_inplace, ensure_non_negative, ensure_same_shape, sum_abs};
use crate::wavelet::check_power_of_two;

// =============================================================================
// Constants
// =============================================================================

/// Default Douglas-Rachford step (threshold of the reflected prox)
const DEFAULT_DR_STEP: f64 = 0.1;

/// Default forward-backward regularization weight
const DEFAULT_FB_LAMBDA: f64 = 0.1;

/// Default sparse recovery step
const DEFAULT_SPARSE_STEP: f64 = 0.5;

/// Default filter order (Haar)
const DEFAULT_ORDER: usize = 0;

/// Default iteration count for all splitting solvers
const DEFAULT_ITERATIONS: usize = 100;

// =============================================================================
// Types
// =============================================================================

/// Observer type for calls that run without one, e.g. `None::<NoObserver<f64>>`.
pub type NoObserver<F> = fn(IterationReport<F>);

/// Objective value handed to an observer once per iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport<F: ProxFloat> {
    /// 0 for the initial estimate, then 1..=iterations.
    pub iteration: usize,
    pub objective: F,
}

/// A convex penalty with a cheap proximal map.
pub trait SparsityPenalty<F: ProxFloat> {
    /// `argmin_z λ·norm(z) + ½‖z - x‖²`
    fn prox(&self, x: ArrayView2<F>, lambda: F) -> Result<Array2<F>>;

    fn norm(&self, x: ArrayView2<F>) -> Result<F>;
}

/// `‖W x‖₁` for the orthonormal wavelet transform of one filter order.
#[derive(Debug, Clone)]
pub struct WaveletPenalty<F: ProxFloat> {
    shrinkage: ShrinkageOperator<F>,
}

impl<F: ProxFloat> WaveletPenalty<F> {
    pub fn new(order: usize) -> Result<Self> {
        Ok(Self {
            shrinkage: ShrinkageOperator::new(order)?,
        })
    }

    pub fn order(&self) -> usize {
        self.shrinkage.order()
    }
}

impl<F: ProxFloat> SparsityPenalty<F> for WaveletPenalty<F> {
    fn prox(&self, x: ArrayView2<F>, lambda: F) -> Result<Array2<F>> {
        self.shrinkage.shrink(x, lambda)
    }

    fn norm(&self, x: ArrayView2<F>) -> Result<F> {
        self.shrinkage.l1(x)
    }
}

/// Plain `‖x‖₁` on the samples themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoefficientPenalty;

impl<F: ProxFloat> SparsityPenalty<F> for CoefficientPenalty {
    fn prox(&self, x: ArrayView2<F>, lambda: F) -> Result<Array2<F>> {
        ensure_non_negative("lambda", lambda)?;
        let mut out = x.to_owned();
        soft_threshold_inplace(&mut out, lambda);
        Ok(out)
    }

    fn norm(&self, x: ArrayView2<F>) -> Result<F> {
        Ok(sum_abs(x))
    }
}

/// Configuration for the Danzig estimator.
#[derive(Debug, Clone)]
pub struct DouglasRachfordConfig<F: ProxFloat> {
    /// Shrinkage threshold of the reflected prox. Default: 0.1
    pub step: F,
    /// Wavelet filter order. Default: 0 (Haar)
    pub order: usize,
    /// Iteration count. Default: 100
    pub iterations: usize,
}

impl<F: ProxFloat> Default for DouglasRachfordConfig<F> {
    fn default() -> Self {
        Self {
            step: F::from_f64_c(DEFAULT_DR_STEP),
            order: DEFAULT_ORDER,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl<F: ProxFloat> DouglasRachfordConfig<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.step.is_finite() || self.step < F::zero() {
            return Err(WaveproxError::InvalidConfig(
                "step must be finite and >= 0".to_string(),
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

/// Configuration for the lasso estimator.
#[derive(Debug, Clone)]
pub struct ForwardBackwardConfig<F: ProxFloat> {
    /// Weight of the wavelet l1 term. Default: 0.1
    pub lambda: F,
    /// Wavelet filter order. Default: 0 (Haar)
    pub order: usize,
    /// Iteration count. Default: 100
    pub iterations: usize,
    /// Clamp the final estimate to `[lo, hi]`. Default: None
    pub clip: Option<(F, F)>,
}

impl<F: ProxFloat> Default for ForwardBackwardConfig<F> {
    fn default() -> Self {
        Self {
            lambda: F::from_f64_c(DEFAULT_FB_LAMBDA),
            order: DEFAULT_ORDER,
            iterations: DEFAULT_ITERATIONS,
            clip: None,
        }
    }
}

impl<F: ProxFloat> ForwardBackwardConfig<F> {
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
        if let Some((lo, hi)) = self.clip {
            if !(lo <= hi) {
                return Err(WaveproxError::InvalidConfig(
                    "clip lower bound must be <= upper bound".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for 1D compressed sensing.
#[derive(Debug, Clone)]
pub struct SparseRecoveryConfig<F: ProxFloat> {
    /// Soft-threshold of the reflected prox. Default: 0.5
    pub step: F,
    /// Iteration count. Default: 100
    pub iterations: usize,
}

impl<F: ProxFloat> Default for SparseRecoveryConfig<F> {
    fn default() -> Self {
        Self {
            step: F::from_f64_c(DEFAULT_SPARSE_STEP),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl<F: ProxFloat> SparseRecoveryConfig<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.step.is_finite() || self.step < F::zero() {
            return Err(WaveproxError::InvalidConfig(
                "step must be finite and >= 0".to_string(),
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
// Helper Functions
// =============================================================================

/// Evaluate the objective, log it and forward it to the observer.
///
/// `evaluate` only runs when an observer is attached or debug logging is
/// enabled. Evaluation failures are logged and swallowed.
pub(crate) fn emit_objective<F, O, E>(observer: &mut Option<O>, iteration: usize, evaluate: E)
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
    E: FnOnce() -> Result<F>,
{
    if observer.is_none() && !tracing::enabled!(Level::DEBUG) {
        return;
    }
    match evaluate() {
        Ok(objective) => {
            debug!(iteration, objective = objective.as_f64(), "objective");
            if let Some(observer) = observer.as_mut() {
                observer(IterationReport {
                    iteration,
                    objective,
                });
            }
        }
        Err(err) => warn!(iteration, error = %err, "objective evaluation failed"),
    }
}

fn lasso_objective<F, P, C>(penalty: &P, constraint: &C, estimate: ArrayView2<F>, lambda: F) -> Result<F>
where
    F: ProxFloat,
    P: SparsityPenalty<F> + ?Sized,
    C: ConstraintSet<F> + ?Sized,
{
    let residual = constraint.residual_norm(estimate)?;
    let penalty_value = penalty.norm(estimate)?;
    Ok(F::from_f64_c(0.5) * residual * residual + lambda * penalty_value)
}

fn check_start<F, C>(initial: ArrayView2<F>, constraint: &C) -> Result<()>
where
    F: ProxFloat,
    C: ConstraintSet<F> + ?Sized,
{
    let (rows, cols) = constraint.shape();
    ensure_same_shape("initial estimate", &[rows, cols], initial.shape())
}

fn check_wavelet_shape((rows, cols): (usize, usize)) -> Result<()> {
    check_power_of_two(0, rows)?;
    check_power_of_two(1, cols)
}

// =============================================================================
// Solvers
// =============================================================================

/// Douglas-Rachford splitting for `min penalty(x)` over `constraint`.
///
/// Per iteration, with `y` the reflected variable:
/// 1. `y ← 2·prox(y, step) − y`
/// 2. `x ← P_C(y)`
/// 3. `y ← 2x − y`
/// 4. `y ← ½y + ½y_prev`
///
/// Returns the last `x`. When `observer` is set, it receives
/// `penalty.norm(x)` for the start and after every iteration.
#[tracing::instrument(skip_all, fields(iterations = iterations, step = step.as_f64()))]
pub fn douglas_rachford<F, P, C, O>(
    initial: ArrayView2<F>,
    penalty: &P,
    constraint: &C,
    step: F,
    iterations: usize,
    mut observer: Option<O>,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    P: SparsityPenalty<F> + ?Sized,
    C: ConstraintSet<F> + ?Sized,
    O: FnMut(IterationReport<F>),
{
    ensure_non_negative("step", step)?;
    check_start(initial, constraint)?;
    info!("Douglas-Rachford started");

    let two = F::from_f64_c(2.0);
    let half = F::from_f64_c(0.5);
    let mut estimate = initial.to_owned();
    let mut reflected = estimate.clone();
    emit_objective(&mut observer, 0, || penalty.norm(estimate.view()));

    for iteration in 1..=iterations {
        let previous = reflected.clone();
        let proximal = penalty.prox(reflected.view(), step)?;
        Zip::from(&mut reflected)
            .and(&proximal)
            .for_each(|y, &p| *y = two * p - *y);
        estimate = constraint.project(reflected.view())?;
        Zip::from(&mut reflected)
            .and(&estimate)
            .and(&previous)
            .for_each(|y, &x, &prev| *y = half * (two * x - *y) + half * prev);
        emit_objective(&mut observer, iteration, || {
            penalty.norm(estimate.view())
        });
    }

    info!("Douglas-Rachford finished");
    Ok(estimate)
}

/// Forward-backward splitting for `½ residual² + λ·penalty(x)`.
///
/// The forward step is the projection onto the constraint (a unit gradient
/// step on the masked data term), the backward step is `prox(·, λ)`.
/// `observer` receives `½ residual² + λ·penalty(x)`.
#[tracing::instrument(skip_all, fields(iterations = iterations, lambda = lambda.as_f64()))]
pub fn forward_backward<F, P, C, O>(
    initial: ArrayView2<F>,
    penalty: &P,
    constraint: &C,
    lambda: F,
    iterations: usize,
    mut observer: Option<O>,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    P: SparsityPenalty<F> + ?Sized,
    C: ConstraintSet<F> + ?Sized,
    O: FnMut(IterationReport<F>),
{
    ensure_non_negative("lambda", lambda)?;
    check_start(initial, constraint)?;
    info!("forward-backward started");

    let mut estimate = initial.to_owned();
    emit_objective(&mut observer, 0, || {
        lasso_objective(penalty, constraint, estimate.view(), lambda)
    });

    for iteration in 1..=iterations {
        let projected = constraint.project(estimate.view())?;
        estimate = penalty.prox(projected.view(), lambda)?;
        emit_objective(&mut observer, iteration, || {
            lasso_objective(penalty, constraint, estimate.view(), lambda)
        });
    }

    info!("forward-backward finished");
    Ok(estimate)
}

// =============================================================================
// Entry Points
// =============================================================================

/// Danzig estimate: minimal wavelet l1 norm among images consistent with
/// the measurement. Spatial measurements give inpainting, Fourier
/// measurements give reconstruction from frequency samples.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::InvalidConfig`] | config fails validation |
/// | [`WaveproxError::ShapeMismatch`] | mask and measurement disagree |
/// | [`WaveproxError::NotPowerOfTwo`] | image shape unsuitable for the wavelet transform |
/// | [`WaveproxError::UnsupportedOrder`] | `config.order` above the stable range |
pub fn reconstruct_douglas_rachford<F: ProxFloat>(
    measurement: &Measurement<F>,
    config: &DouglasRachfordConfig<F>,
) -> Result<Array2<F>> {
    solve_douglas_rachford(measurement, config, None::<NoObserver<F>>)
}

/// [`reconstruct_douglas_rachford`] with a per-iteration observer.
pub fn reconstruct_douglas_rachford_with_observer<F, O>(
    measurement: &Measurement<F>,
    config: &DouglasRachfordConfig<F>,
    observer: O,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    solve_douglas_rachford(measurement, config, Some(observer))
}

fn solve_douglas_rachford<F, O>(
    measurement: &Measurement<F>,
    config: &DouglasRachfordConfig<F>,
    observer: Option<O>,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    config.validate()?;
    let constraint = measurement.constraint()?;
    check_wavelet_shape(constraint.shape())?;
    let penalty = WaveletPenalty::new(config.order)?;
    let initial = constraint.initial_estimate()?;
    douglas_rachford(
        initial.view(),
        &penalty,
        constraint.as_ref(),
        config.step,
        config.iterations,
        observer,
    )
}

/// Lasso estimate by forward-backward splitting, optionally clipped.
///
/// # Errors
///
/// Same as [`reconstruct_douglas_rachford`].
pub fn reconstruct_forward_backward<F: ProxFloat>(
    measurement: &Measurement<F>,
    config: &ForwardBackwardConfig<F>,
) -> Result<Array2<F>> {
    solve_forward_backward(measurement, config, None::<NoObserver<F>>)
}

/// [`reconstruct_forward_backward`] with a per-iteration observer.
pub fn reconstruct_forward_backward_with_observer<F, O>(
    measurement: &Measurement<F>,
    config: &ForwardBackwardConfig<F>,
    observer: O,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    solve_forward_backward(measurement, config, Some(observer))
}

fn solve_forward_backward<F, O>(
    measurement: &Measurement<F>,
    config: &ForwardBackwardConfig<F>,
    observer: Option<O>,
) -> Result<Array2<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    config.validate()?;
    let constraint = measurement.constraint()?;
    check_wavelet_shape(constraint.shape())?;
    let penalty = WaveletPenalty::new(config.order)?;
    let initial = constraint.initial_estimate()?;
    let mut estimate = forward_backward(
        initial.view(),
        &penalty,
        constraint.as_ref(),
        config.lambda,
        config.iterations,
        observer,
    )?;
    if let Some((lo, hi)) = config.clip {
        clip_inplace(&mut estimate, lo, hi)?;
    }
    Ok(estimate)
}

/// Recover a sparse signal of length `len` from samples of its orthonormal
/// real spectrum (`len/2 + 1` bins).
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::InvalidConfig`] | config fails validation |
/// | [`WaveproxError::ShapeMismatch`] | spectrum or mask not `len/2 + 1` long |
/// | [`WaveproxError::InvalidParameter`] | `len == 0` or mask outside `[0, 1]` |
pub fn recover_sparse_signal<F: ProxFloat>(
    spectrum: ArrayView1<Complex<F>>,
    mask: ArrayView1<F>,
    len: usize,
    config: &SparseRecoveryConfig<F>,
) -> Result<Array1<F>> {
    solve_sparse_recovery(spectrum, mask, len, config, None::<NoObserver<F>>)
}

/// [`recover_sparse_signal`] with a per-iteration observer.
pub fn recover_sparse_signal_with_observer<F, O>(
    spectrum: ArrayView1<Complex<F>>,
    mask: ArrayView1<F>,
    len: usize,
    config: &SparseRecoveryConfig<F>,
    observer: O,
) -> Result<Array1<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    solve_sparse_recovery(spectrum, mask, len, config, Some(observer))
}

fn solve_sparse_recovery<F, O>(
    spectrum: ArrayView1<Complex<F>>,
    mask: ArrayView1<F>,
    len: usize,
    config: &SparseRecoveryConfig<F>,
    observer: Option<O>,
) -> Result<Array1<F>>
where
    F: ProxFloat,
    O: FnMut(IterationReport<F>),
{
    config.validate()?;
    let constraint = FourierConstraint::new(
        spectrum.insert_axis(Axis(0)).to_owned(),
        mask.insert_axis(Axis(0)).to_owned(),
        (1, len),
    )?;
    let initial = constraint.initial_estimate()?;
    let recovered = douglas_rachford(
        initial.view(),
        &CoefficientPenalty,
        &constraint,
        config.step,
        config.iterations,
        observer,
    )?;
    Ok(recovered.index_axis_move(Axis(0), 0))
}
