//! Algorithm front-ends built on the tiered dispatch core
//!
//! Every algorithm here is written once as a kernel generic over
//! [`ComputePrimitives`](tiered_core::ComputePrimitives) and listed in a
//! static manifest for each float type and CPU tier it is built for. The
//! front-ends resolve their kernel once at construction and then run on the
//! current execution context.
//!
//! # Algorithms
//!
//! | Algorithm | Layouts | Modes | Contexts |
//! |-----------|---------|-------|----------|
//! | Low order moments | dense | batch, online, distributed | host |
//! | Covariance / correlation | dense | batch | host, device |
//! | Linear prediction | dense, CSR | batch | host |
//!
//! # Example
//!
//! ```rust
//! use tiered_algorithms::{low_order_moments, DenseTable};
//!
//! let data: DenseTable<f64> = DenseTable::from_rows(&[vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]]).unwrap();
//! let moments = low_order_moments(&data).unwrap();
//! assert_eq!(moments.nobs, 3);
//! assert!((moments.mean[1] - 20.0).abs() < 1e-12);
//! ```

use std::sync::OnceLock;

use tiered_core::{Error, KernelRegistry, Result};

pub mod covariance;
pub mod linear;
pub mod moments;
pub mod table;

pub use covariance::{covariance, CovarianceEstimator, CovarianceResult, OutputMatrix};
pub use linear::{LinearModel, LinearPredictor};
pub use moments::{
    distributed_moments, low_order_moments, Moments, MomentsEstimator, OnlineMoments,
    PartialMoments,
};
pub use table::{CsrTable, DenseTable};

static REGISTRY: OnceLock<std::result::Result<KernelRegistry, String>> = OnceLock::new();

/// The kernel manifest of this crate, built on first use
pub fn registry() -> Result<&'static KernelRegistry> {
    REGISTRY
        .get_or_init(|| build_registry().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|message| Error::Config(message.clone()))
}

/// Build a fresh registry holding every kernel of this crate
pub fn build_registry() -> Result<KernelRegistry> {
    let mut builder = KernelRegistry::builder();
    moments::register(&mut builder)?;
    covariance::register(&mut builder)?;
    linear::register(&mut builder)?;
    Ok(builder.build())
}
