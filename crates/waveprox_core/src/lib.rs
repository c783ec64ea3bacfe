//! Waveprox Core Library
//!
//! Orthonormal wavelet transforms of arbitrary smoothness order and proximal
//! splitting solvers for sparse image and signal recovery: wavelet and
//! total-variation denoising, inpainting, reconstruction from Fourier samples
//! and 1D compressed sensing.

pub mod error;
pub mod filters;
pub mod float_trait;
mod polynomial;
pub mod projection;
pub mod shrinkage;
pub mod solvers;
pub mod total_variation;
pub mod transforms;
pub mod utils;
pub mod wavelet;

// Re-export commonly used types at the crate root
pub use error::{Result, WaveproxError};
pub use filters::{filters, FilterCache, FilterPair, MAX_STABLE_ORDER};
pub use float_trait::ProxFloat;
pub use projection::{
    fourier_error, project_fourier, project_spatial, spatial_error, ConstraintSet,
    FourierConstraint, Measurement, SpatialConstraint,
};
pub use shrinkage::{
    compress, denoise_wavelet, shrink, shrink_1d, soft_threshold, wavelet_l1, wavelet_l1_1d,
    ShrinkageOperator,
};
pub use solvers::{
    douglas_rachford, forward_backward, reconstruct_douglas_rachford,
    reconstruct_douglas_rachford_with_observer, reconstruct_forward_backward,
    reconstruct_forward_backward_with_observer, recover_sparse_signal,
    recover_sparse_signal_with_observer, CoefficientPenalty, DouglasRachfordConfig,
    ForwardBackwardConfig, IterationReport, NoObserver, SparseRecoveryConfig, SparsityPenalty,
    WaveletPenalty,
};
pub use total_variation::{
    denoise_total_variation, denoise_total_variation_with_observer, divergence, dual_objective,
    gradient, primal_energy, project_linf, GradientField, Momentum, TotalVariationConfig,
};
pub use transforms::FourierPlans;
pub use wavelet::{forward_1d, forward_2d, inverse_1d, inverse_2d, MultiresolutionTransform};
