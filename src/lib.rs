//! Tiered numerical kernels
//!
//! Umbrella crate re-exporting the dispatch core and the algorithm
//! front-ends built on it.
//!
//! ```rust
//! use tiered::{CovarianceEstimator, DenseTable};
//!
//! let data = DenseTable::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.5]]).unwrap();
//! let cov = CovarianceEstimator::<f64>::new().unwrap().correlation().compute(&data).unwrap();
//! assert!((cov.get(0, 0) - 1.0).abs() < 1e-12);
//! ```

pub use tiered_algorithms;
pub use tiered_core;

pub use tiered_algorithms::{
    covariance, distributed_moments, low_order_moments, CovarianceEstimator, CovarianceResult,
    CsrTable, DenseTable, LinearModel, LinearPredictor, Moments, MomentsEstimator, OnlineMoments,
};
pub use tiered_core::{
    ContextGuard, ContextKind, CpuContext, CpuTier, DispatchConfig, DispatchContainer, Error,
    ExecutionContext, QueueContext, Result,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use tiered_algorithms::{DenseTable, LinearModel};
    pub use tiered_core::prelude::*;
}
