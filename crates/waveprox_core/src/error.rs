//! Error types for the waveprox-core crate.

/// Error type for all fallible operations in waveprox-core.
///
/// Shape preconditions, filter synthesis failures and parameter validation
/// all surface here. Solvers never retry: they either finish their iteration
/// budget or fail before the first iteration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WaveproxError {
    /// A transformed dimension is not a power of two (or is empty).
    #[error("axis {axis} has length {len}, which is not a power of two")]
    NotPowerOfTwo {
        /// Axis index of the offending dimension.
        axis: usize,
        /// Length found on that axis.
        len: usize,
    },

    /// Two arrays that must agree in shape do not.
    #[error("{name} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Which operand was rejected.
        name: &'static str,
        /// Shape required by the operation.
        expected: Vec<usize>,
        /// Shape actually supplied.
        actual: Vec<usize>,
    },

    /// Requested filter order is outside the numerically stable range.
    #[error("filter order {order} is unsupported (maximum stable order is {max})")]
    UnsupportedOrder {
        /// Order that was requested.
        order: usize,
        /// Largest order the factory accepts.
        max: usize,
    },

    /// Filter synthesis produced an invalid result.
    #[error("filter construction failed: {0}")]
    FilterConstruction(String),

    /// Image is too small for the requested operator.
    #[error("image of size {rows}x{cols} is too small (need at least {min}x{min})")]
    ImageTooSmall {
        /// Number of rows supplied.
        rows: usize,
        /// Number of columns supplied.
        cols: usize,
        /// Minimum size along each axis.
        min: usize,
    },

    /// A numeric argument is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A configuration struct failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WaveproxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_not_power_of_two() {
        let err = WaveproxError::NotPowerOfTwo { axis: 1, len: 12 };
        assert_eq!(
            err.to_string(),
            "axis 1 has length 12, which is not a power of two"
        );
    }

    #[test]
    fn error_shape_mismatch() {
        let err = WaveproxError::ShapeMismatch {
            name: "mask",
            expected: vec![8, 8],
            actual: vec![8, 4],
        };
        assert_eq!(err.to_string(), "mask has shape [8, 4], expected [8, 8]");
    }

    #[test]
    fn error_unsupported_order() {
        let err = WaveproxError::UnsupportedOrder { order: 12, max: 10 };
        assert_eq!(
            err.to_string(),
            "filter order 12 is unsupported (maximum stable order is 10)"
        );
    }

    #[test]
    fn error_filter_construction() {
        let err = WaveproxError::FilterConstruction("singular system".into());
        assert_eq!(err.to_string(), "filter construction failed: singular system");
    }

    #[test]
    fn error_image_too_small() {
        let err = WaveproxError::ImageTooSmall {
            rows: 1,
            cols: 5,
            min: 2,
        };
        assert_eq!(
            err.to_string(),
            "image of size 1x5 is too small (need at least 2x2)"
        );
    }

    #[test]
    fn error_invalid_config() {
        let err = WaveproxError::InvalidConfig("iterations must be > 0".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: iterations must be > 0"
        );
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<WaveproxError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<WaveproxError>();
    }
}
