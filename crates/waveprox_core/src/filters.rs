//! Orthonormal filter synthesis.
//!
//! Builds the low-pass (`principal`) / high-pass (`wavelet`) quadrature mirror
//! pair of a given order by spectral factorization of the maximally flat
//! Daubechies polynomial. Order 0 is the Haar pair. Pairs are synthesized in
//! f64 once per order and cached for the lifetime of the process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use rustc_hash::FxHashMap;
use rustfft::num_complex::Complex64;
use tracing::debug;

use crate::error::{Result, WaveproxError};
use crate::polynomial::{binomial_row, polynomial_roots, solve_linear};

// =============================================================================
// Constants
// =============================================================================

/// Largest order for which root finding stays well conditioned.
pub const MAX_STABLE_ORDER: usize = 10;

/// Roots with imaginary part above this are treated as one of a conjugate pair.
const CONJUGATE_TOLERANCE: f64 = 1e-10;

/// Largest imaginary residue (relative to the filter norm) tolerated after
/// factorization before the result is rejected.
const IMAGINARY_RESIDUE_TOLERANCE: f64 = 1e-6;

/// Largest even-shift autocorrelation accepted for a synthesized principal
/// filter.
const ORTHOGONALITY_TOLERANCE: f64 = 1e-8;

// =============================================================================
// Types
// =============================================================================

/// An orthonormal quadrature mirror filter pair.
///
/// Both sequences have length `2 * (order + 1)`. `principal` has unit L2 norm
/// and `wavelet[j] = principal[L - 1 - j] * (-1)^j`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPair {
    order: usize,
    principal: Vec<f64>,
    wavelet: Vec<f64>,
}

impl FilterPair {
    /// Build a pair from a principal filter, deriving the wavelet filter by
    /// time reversal with alternating sign.
    fn from_principal(order: usize, principal: Vec<f64>) -> Self {
        let len = principal.len();
        let wavelet = (0..len)
            .map(|j| {
                let tap = principal[len - 1 - j];
                if j % 2 == 1 {
                    -tap
                } else {
                    tap
                }
            })
            .collect();
        Self {
            order,
            principal,
            wavelet,
        }
    }

    /// Order this pair was synthesized for.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Low-pass (scaling) taps.
    pub fn principal(&self) -> &[f64] {
        &self.principal
    }

    /// High-pass (wavelet) taps.
    pub fn wavelet(&self) -> &[f64] {
        &self.wavelet
    }

    /// Number of taps in each filter.
    pub fn len(&self) -> usize {
        self.principal.len()
    }

    /// Always false; a valid pair has at least two taps.
    pub fn is_empty(&self) -> bool {
        self.principal.is_empty()
    }
}

/// Per-order slot; filled at most once.
type Slot = Arc<Mutex<Option<Arc<FilterPair>>>>;

/// Process-wide cache of synthesized filter pairs.
///
/// The map of per-order slots sits behind a read/write lock. Synthesis runs
/// under the slot's own mutex, so concurrent misses on one order compute the
/// pair once while other orders proceed. Entries are never evicted.
#[derive(Debug, Default)]
pub struct FilterCache {
    slots: RwLock<FxHashMap<usize, Slot>>,
    synthesized: AtomicUsize,
}

impl FilterCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared cache used by [`filters`].
    pub fn global() -> &'static FilterCache {
        static GLOBAL: OnceLock<FilterCache> = OnceLock::new();
        GLOBAL.get_or_init(FilterCache::new)
    }

    /// Return the pair for `order`, synthesizing it on first use.
    pub fn get(&self, order: usize) -> Result<Arc<FilterPair>> {
        if order > MAX_STABLE_ORDER {
            return Err(WaveproxError::UnsupportedOrder {
                order,
                max: MAX_STABLE_ORDER,
            });
        }

        let slot = self.slot(order);
        let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pair) = guard.as_ref() {
            return Ok(Arc::clone(pair));
        }

        // A failed synthesis leaves the slot empty; the next caller retries.
        let pair = Arc::new(synthesize(order)?);
        self.synthesized.fetch_add(1, Ordering::Relaxed);
        debug!(order, taps = pair.len(), "synthesized filter pair");
        *guard = Some(Arc::clone(&pair));
        Ok(pair)
    }

    fn slot(&self, order: usize) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&order)
        {
            return Arc::clone(slot);
        }
        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(order).or_default())
    }

    /// Number of cached orders.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .is_some()
            })
            .count()
    }

    /// Number of synthesis runs performed by this cache.
    pub(crate) fn synthesis_count(&self) -> usize {
        self.synthesized.load(Ordering::Relaxed)
    }

    /// True when nothing has been synthesized yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Filter pair of the given order from the global cache.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`WaveproxError::UnsupportedOrder`] | `order > MAX_STABLE_ORDER` |
/// | [`WaveproxError::FilterConstruction`] | singular system, failed root finding, non-finite taps |
pub fn filters(order: usize) -> Result<Arc<FilterPair>> {
    FilterCache::global().get(order)
}

// =============================================================================
// Synthesis
// =============================================================================

/// Multiply the polynomial in `poly` (lowest degree first) by `(x - z)` in place.
/// The top coefficient must have room, i.e. be zero before the call.
#[inline]
fn multiply_linear_factor(poly: &mut [Complex64], z: Complex64) {
    for j in (1..poly.len()).rev() {
        poly[j] = poly[j - 1] - z * poly[j];
    }
    poly[0] *= -z;
}

/// Largest absolute autocorrelation of `taps` at a non-zero even shift.
fn max_even_shift_correlation(taps: &[f64]) -> f64 {
    (2..taps.len())
        .step_by(2)
        .map(|shift| {
            (0..taps.len() - shift)
                .map(|j| taps[j] * taps[j + shift])
                .sum::<f64>()
                .abs()
        })
        .fold(0.0, f64::max)
}

fn synthesize(order: usize) -> Result<FilterPair> {
    if order == 0 {
        let tap = std::f64::consts::FRAC_1_SQRT_2;
        return Ok(FilterPair::from_principal(0, vec![tap, tap]));
    }

    let len = 2 * order + 2;
    let binomial = binomial_row(order);

    // Flatness conditions for the coefficients of q(z) q(1/z).
    let n = order + 1;
    let mut matrix = vec![vec![0.0; n]; n];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, &b) in binomial.iter().enumerate().take(2 * i + 1) {
            let col = 2 * i - j;
            if col < n {
                row[col] += b;
            }
        }
    }
    let mut target = vec![0.0; n];
    target[0] = 1.0;
    let coeffs = solve_linear(matrix, target)?;
    let roots = polynomial_roots(&coeffs)?;

    let mut poly = vec![Complex64::new(0.0, 0.0); len];
    poly[0] = Complex64::new(1.0, 0.0);
    for root in roots {
        if root.im <= -CONJUGATE_TOLERANCE {
            continue;
        }
        let root = if root.im < CONJUGATE_TOLERANCE {
            Complex64::new(root.re, 0.0)
        } else {
            root
        };
        let z = root + (root * root - 1.0).sqrt();
        multiply_linear_factor(&mut poly, z);
        if root.im > CONJUGATE_TOLERANCE {
            multiply_linear_factor(&mut poly, z.conj());
        }
    }

    let residue = poly.iter().map(|c| c.im.abs()).fold(0.0, f64::max);
    let mut principal: Vec<f64> = poly.iter().map(|c| c.re).collect();

    // Zeros at z = -1: multiply by (1 + x) order + 1 times.
    for _ in 0..=order {
        for j in (1..len).rev() {
            principal[j] += principal[j - 1];
        }
    }

    let norm = principal.iter().map(|v| v * v).sum::<f64>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(WaveproxError::FilterConstruction(format!(
            "order {order} filter has non-finite or zero norm"
        )));
    }
    let scale = poly.iter().map(|c| c.norm()).fold(0.0, f64::max).max(1.0);
    if residue > IMAGINARY_RESIDUE_TOLERANCE * scale {
        return Err(WaveproxError::FilterConstruction(format!(
            "order {order} factorization left an imaginary residue of {residue:e}"
        )));
    }
    for tap in principal.iter_mut() {
        *tap /= norm;
    }
    if principal.iter().any(|v| !v.is_finite()) {
        return Err(WaveproxError::FilterConstruction(format!(
            "order {order} filter has non-finite taps"
        )));
    }
    let correlation = max_even_shift_correlation(&principal);
    if !(correlation < ORTHOGONALITY_TOLERANCE) {
        return Err(WaveproxError::FilterConstruction(format!(
            "order {order} filter is not orthogonal to its even shifts ({correlation:e})"
        )));
    }

    Ok(FilterPair::from_principal(order, principal))
}
