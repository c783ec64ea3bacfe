//! Small dense numerics used by filter synthesis.
//!
//! Everything here runs in f64 on systems of size `order + 1 <= 11`, so plain
//! Gaussian elimination and an Aberth-Ehrlich root finder are sufficient.

use rustfft::num_complex::Complex64;

use crate::error::{Result, WaveproxError};

/// Pivot magnitude below which the system is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-14;

/// Maximum Aberth-Ehrlich sweeps before giving up on convergence.
const MAX_ROOT_ITERATIONS: usize = 500;

/// Relative step size at which the root iteration stops early.
const ROOT_TOLERANCE: f64 = 1e-15;

/// Largest relative step in the final sweep for which an exhausted iteration
/// budget still counts as converged. Higher orders stall at rounding noise
/// (around 1e-11) above `ROOT_TOLERANCE`.
const ROOT_ACCEPT_TOLERANCE: f64 = 1e-8;

/// Newton steps applied to each root after the simultaneous iteration.
const POLISH_STEPS: usize = 3;

/// Angular offset of the initial guesses, avoids symmetric stalls on real polynomials.
const INITIAL_ANGLE_OFFSET: f64 = 0.4;

/// Coefficients of `(1 + x)^(order + 1)`, lowest degree first.
///
/// The returned vector has `order + 2` entries.
pub(crate) fn binomial_row(order: usize) -> Vec<f64> {
    let mut row = vec![0.0; order + 2];
    row[0] = 1.0;
    for _ in 0..=order {
        for j in (0..=order).rev() {
            row[j + 1] += row[j];
        }
    }
    row
}

/// Solve the dense square system `matrix * x = rhs` by Gaussian elimination
/// with partial pivoting. `matrix` is row-major.
pub(crate) fn solve_linear(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>> {
    let n = rhs.len();
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(WaveproxError::FilterConstruction(format!(
            "linear system is not {n}x{n}"
        )));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .unwrap_or(col);
        if matrix[pivot][col].abs() < SINGULAR_EPSILON {
            return Err(WaveproxError::FilterConstruction(
                "flatness system is singular".into(),
            ));
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        let pivot_row = matrix[col].clone();
        let pivot_rhs = rhs[col];
        for row in (col + 1)..n {
            let factor = matrix[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for (k, &p) in pivot_row.iter().enumerate().skip(col) {
                matrix[row][k] -= factor * p;
            }
            rhs[row] -= factor * pivot_rhs;
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for k in (row + 1)..n {
            acc -= matrix[row][k] * solution[k];
        }
        solution[row] = acc / matrix[row][row];
    }

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(WaveproxError::FilterConstruction(
            "flatness system produced non-finite coefficients".into(),
        ));
    }
    Ok(solution)
}

/// Evaluate a polynomial and its derivative at `z` (Horner's scheme).
/// Coefficients are lowest degree first.
#[inline]
fn horner(coeffs: &[Complex64], z: Complex64) -> (Complex64, Complex64) {
    let mut value = Complex64::new(0.0, 0.0);
    let mut derivative = Complex64::new(0.0, 0.0);
    for &c in coeffs.iter().rev() {
        derivative = derivative * z + value;
        value = value * z + c;
    }
    (value, derivative)
}

#[inline]
fn is_finite(z: Complex64) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

/// All complex roots of the real polynomial `Σ coeffs[k] x^k`.
///
/// Uses the Aberth-Ehrlich simultaneous iteration followed by a few Newton
/// polishing steps per root. The leading coefficient must be non-zero.
pub(crate) fn polynomial_roots(coeffs: &[f64]) -> Result<Vec<Complex64>> {
    aberth_roots(coeffs, MAX_ROOT_ITERATIONS)
}

fn aberth_roots(coeffs: &[f64], max_iterations: usize) -> Result<Vec<Complex64>> {
    let Some(degree) = coeffs.len().checked_sub(1) else {
        return Ok(Vec::new());
    };
    let lead = coeffs[degree];
    if lead == 0.0 || !lead.is_finite() {
        return Err(WaveproxError::FilterConstruction(
            "polynomial has a vanishing leading coefficient".into(),
        ));
    }
    if degree == 0 {
        return Ok(Vec::new());
    }

    let monic: Vec<Complex64> = coeffs
        .iter()
        .map(|&c| Complex64::new(c / lead, 0.0))
        .collect();

    // Geometric mean of the root magnitudes is |c0|^(1/n) for a monic polynomial.
    let radius = {
        let r = monic[0].norm().powf(1.0 / degree as f64);
        if r.is_finite() && r > 0.0 {
            r
        } else {
            1.0
        }
    };
    let mut roots: Vec<Complex64> = (0..degree)
        .map(|k| {
            let theta =
                2.0 * std::f64::consts::PI * k as f64 / degree as f64 + INITIAL_ANGLE_OFFSET;
            Complex64::from_polar(radius, theta)
        })
        .collect();

    let one = Complex64::new(1.0, 0.0);
    let mut last_step = f64::INFINITY;
    for _ in 0..max_iterations {
        let mut max_step: f64 = 0.0;
        for k in 0..degree {
            let (value, derivative) = horner(&monic, roots[k]);
            if value.norm() == 0.0 || derivative.norm() == 0.0 {
                continue;
            }
            let ratio = value / derivative;
            let repulsion: Complex64 = (0..degree)
                .filter(|&j| j != k)
                .map(|j| (roots[k] - roots[j]).inv())
                .sum();
            let step = ratio / (one - ratio * repulsion);
            if !is_finite(step) {
                continue;
            }
            roots[k] -= step;
            max_step = max_step.max(step.norm() / (1.0 + roots[k].norm()));
        }
        last_step = max_step;
        if max_step < ROOT_TOLERANCE {
            break;
        }
    }
    if !(last_step < ROOT_ACCEPT_TOLERANCE) {
        return Err(WaveproxError::FilterConstruction(format!(
            "root finding did not converge (last relative step {last_step:e})"
        )));
    }

    for root in roots.iter_mut() {
        for _ in 0..POLISH_STEPS {
            let (value, derivative) = horner(&monic, *root);
            if derivative.norm() == 0.0 {
                break;
            }
            let candidate = *root - value / derivative;
            if !is_finite(candidate) || horner(&monic, candidate).0.norm() > value.norm() {
                break;
            }
            *root = candidate;
        }
    }

    if roots.iter().any(|r| !is_finite(*r)) {
        return Err(WaveproxError::FilterConstruction(
            "root finding produced non-finite values".into(),
        ));
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted_real_parts(roots: &[Complex64]) -> Vec<f64> {
        let mut re: Vec<f64> = roots.iter().map(|r| r.re).collect();
        re.sort_by(|a, b| a.total_cmp(b));
        re
    }

    #[test]
    fn test_binomial_row_values() {
        assert_eq!(binomial_row(0), vec![1.0, 1.0]);
        assert_eq!(binomial_row(1), vec![1.0, 2.0, 1.0]);
        assert_eq!(binomial_row(3), vec![1.0, 4.0, 6.0, 4.0, 1.0]);
    }

    #[test]
    fn test_solve_linear_2x2() {
        // x + 0y = 1, x + 2y = 0
        let matrix = vec![vec![1.0, 0.0], vec![1.0, 2.0]];
        let x = solve_linear(matrix, vec![1.0, 0.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-15);
        assert!((x[1] + 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_solve_linear_needs_pivoting() {
        let matrix = vec![vec![0.0, 1.0], vec![1.0, 1.0]];
        let x = solve_linear(matrix, vec![2.0, 3.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-14);
        assert!((x[1] - 2.0).abs() < 1e-14);
    }

    #[test]
    fn test_solve_linear_singular() {
        let matrix = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let err = solve_linear(matrix, vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, WaveproxError::FilterConstruction(_)));
    }

    #[test]
    fn test_roots_linear() {
        // 1 - x/2 has its root at 2
        let roots = polynomial_roots(&[1.0, -0.5]).unwrap();
        assert_eq!(roots.len(), 1);
        assert!((roots[0].re - 2.0).abs() < 1e-12);
        assert!(roots[0].im.abs() < 1e-12);
    }

    #[test]
    fn test_roots_real_cubic() {
        // (x - 1)(x - 2)(x + 3) = x^3 - 7x + 6
        let roots = polynomial_roots(&[6.0, -7.0, 0.0, 1.0]).unwrap();
        let re = sorted_real_parts(&roots);
        assert!((re[0] + 3.0).abs() < 1e-10);
        assert!((re[1] - 1.0).abs() < 1e-10);
        assert!((re[2] - 2.0).abs() < 1e-10);
        for r in &roots {
            assert!(r.im.abs() < 1e-10);
        }
    }

    #[test]
    fn test_roots_complex_pair() {
        // x^2 + 1
        let roots = polynomial_roots(&[1.0, 0.0, 1.0]).unwrap();
        let mut im: Vec<f64> = roots.iter().map(|r| r.im).collect();
        im.sort_by(|a, b| a.total_cmp(b));
        assert!((im[0] + 1.0).abs() < 1e-12);
        assert!((im[1] - 1.0).abs() < 1e-12);
        for r in &roots {
            assert!(r.re.abs() < 1e-12);
        }
    }

    #[test]
    fn test_roots_residuals_degree_ten() {
        let coeffs = [3.0, -1.0, 4.0, 1.0, -5.0, 9.0, 2.0, -6.0, 5.0, 3.0, 1.0];
        let roots = polynomial_roots(&coeffs).unwrap();
        assert_eq!(roots.len(), 10);
        let poly: Vec<Complex64> = coeffs.iter().map(|&c| Complex64::new(c, 0.0)).collect();
        for r in &roots {
            let (value, _) = horner(&poly, *r);
            assert!(value.norm() < 1e-8 * (1.0 + r.norm().powi(10)));
        }
    }

    #[test]
    fn test_roots_exhausted_budget_rejected() {
        let err = aberth_roots(&[6.0, -7.0, 0.0, 1.0], 1).unwrap_err();
        match err {
            WaveproxError::FilterConstruction(msg) => {
                assert!(msg.starts_with("root finding did not converge"), "{msg}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_roots_zero_leading_rejected() {
        let err = polynomial_roots(&[1.0, 2.0, 0.0]).unwrap_err();
        assert!(matches!(err, WaveproxError::FilterConstruction(_)));
    }
}
