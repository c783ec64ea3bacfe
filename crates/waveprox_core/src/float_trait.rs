//! Float trait abstraction for f32/f64 support.
//!
//! Every transform and solver in this crate is generic over [`ProxFloat`], so
//! images can be processed in either precision. Filter synthesis always runs
//! in f64 and the taps are converted once per call.

use num_traits::{Float, FromPrimitive, NumAssign};
use rustfft::FftNum;
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Trait alias for floating point types supported by the solvers.
///
/// Combines:
/// - Basic float operations (Float, NumAssign)
/// - FFT compatibility (FftNum from rustfft)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Debug/Display for diagnostics
pub trait ProxFloat:
    Float + FftNum + FromPrimitive + NumAssign + Sum + Debug + Display + Send + Sync + 'static
{
    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Widen to f64 for reporting.
    fn as_f64(self) -> f64;
}

impl ProxFloat for f32 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl ProxFloat for f64 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}
