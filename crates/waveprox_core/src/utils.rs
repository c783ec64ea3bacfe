use ndarray::{Array, ArrayView, Dimension};
use rayon::prelude::*;

use crate::error::{Result, WaveproxError};
use crate::float_trait::ProxFloat;

/// Element count above which elementwise maps run on the rayon pool.
const PARALLEL_ELEMENT_THRESHOLD: usize = 1 << 16;

/// Fail with [`WaveproxError::ShapeMismatch`] unless `actual == expected`.
pub fn ensure_same_shape(name: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(WaveproxError::ShapeMismatch {
            name,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

/// Reject negative or non-finite thresholds and step sizes.
pub fn ensure_non_negative<F: ProxFloat>(name: &str, value: F) -> Result<()> {
    if !value.is_finite() || value < F::zero() {
        return Err(WaveproxError::InvalidParameter(format!(
            "{name} must be finite and >= 0, got {value}"
        )));
    }
    Ok(())
}

/// Masks weight observed entries by 1 and missing ones by 0.
pub fn ensure_unit_interval<F: ProxFloat, D: Dimension>(
    name: &str,
    values: ArrayView<F, D>,
) -> Result<()> {
    if values
        .iter()
        .any(|&v| !(v >= F::zero() && v <= F::one()))
    {
        return Err(WaveproxError::InvalidParameter(format!(
            "{name} values must lie in [0, 1]"
        )));
    }
    Ok(())
}

/// Sum of absolute values (l1 norm).
pub fn sum_abs<F: ProxFloat, D: Dimension>(values: ArrayView<F, D>) -> F {
    values.iter().fold(F::zero(), |acc, &v| acc + v.abs())
}

/// Sum of squares.
pub fn sum_squares<F: ProxFloat, D: Dimension>(values: ArrayView<F, D>) -> F {
    values.iter().fold(F::zero(), |acc, &v| acc + v * v)
}

/// Euclidean (Frobenius) norm.
pub fn l2_norm<F: ProxFloat, D: Dimension>(values: ArrayView<F, D>) -> F {
    sum_squares(values).sqrt()
}

/// Apply `op` to every element in place.
///
/// Large contiguous arrays are split across rayon workers, everything else
/// goes through `mapv_inplace`.
pub fn par_map_inplace<F, D, Op>(data: &mut Array<F, D>, op: Op)
where
    F: ProxFloat,
    D: Dimension,
    Op: Fn(F) -> F + Sync + Send,
{
    if data.len() >= PARALLEL_ELEMENT_THRESHOLD {
        if let Some(slice) = data.as_slice_memory_order_mut() {
            slice.par_iter_mut().for_each(|v| *v = op(*v));
            return;
        }
    }
    data.mapv_inplace(|v| op(v));
}

/// Clamp every element to `[lo, hi]`.
pub fn clip_inplace<F: ProxFloat, D: Dimension>(data: &mut Array<F, D>, lo: F, hi: F) -> Result<()> {
    if !(lo <= hi) {
        return Err(WaveproxError::InvalidParameter(format!(
            "clip range [{lo}, {hi}] is empty"
        )));
    }
    par_map_inplace(data, |v| v.max(lo).min(hi));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_ensure_same_shape() {
        assert!(ensure_same_shape("mask", &[4, 4], &[4, 4]).is_ok());
        let err = ensure_same_shape("mask", &[4, 4], &[4, 2]).unwrap_err();
        assert_eq!(
            err,
            WaveproxError::ShapeMismatch {
                name: "mask",
                expected: vec![4, 4],
                actual: vec![4, 2],
            }
        );
    }

    #[test]
    fn test_ensure_non_negative() {
        assert!(ensure_non_negative("lambda", 0.0f64).is_ok());
        assert!(ensure_non_negative("lambda", 2.5f64).is_ok());
        assert!(ensure_non_negative("lambda", -1e-3f64).is_err());
        assert!(ensure_non_negative("lambda", f64::NAN).is_err());
        assert!(ensure_non_negative("lambda", f64::INFINITY).is_err());
    }

    #[test]
    fn test_ensure_unit_interval() {
        let ok = array![[0.0f64, 1.0], [0.5, 0.25]];
        assert!(ensure_unit_interval("mask", ok.view()).is_ok());
        let bad = array![[0.0f64, 1.5]];
        assert!(ensure_unit_interval("mask", bad.view()).is_err());
        let nan = array![f64::NAN];
        assert!(ensure_unit_interval("mask", nan.view()).is_err());
    }

    #[test]
    fn test_norms() {
        let a = array![[3.0f64, -4.0], [0.0, 0.0]];
        assert_eq!(sum_abs(a.view()), 7.0);
        assert_eq!(sum_squares(a.view()), 25.0);
        assert_eq!(l2_norm(a.view()), 5.0);
    }

    #[test]
    fn test_par_map_inplace_small_and_large() {
        let mut small = Array2::<f64>::from_elem((4, 4), 2.0);
        par_map_inplace(&mut small, |v| v * 3.0);
        assert!(small.iter().all(|&v| v == 6.0));

        let mut large = Array2::<f64>::from_elem((512, 256), 1.0);
        par_map_inplace(&mut large, |v| v - 0.5);
        assert!(large.iter().all(|&v| v == 0.5));

        // Inverted axis
        let mut reversed = Array2::<f64>::from_elem((512, 256), 1.0);
        reversed.invert_axis(ndarray::Axis(1));
        par_map_inplace(&mut reversed, |v| v + 1.0);
        assert!(reversed.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_clip_inplace() {
        let mut a = array![-1.0f64, 0.5, 2.0];
        clip_inplace(&mut a, 0.0, 1.0).unwrap();
        assert_eq!(a, array![0.0, 0.5, 1.0]);
        assert!(clip_inplace(&mut a, 1.0, 0.0).is_err());
    }
}
