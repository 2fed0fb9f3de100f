//! Capability-based kernel dispatch and execution contexts
//!
//! This crate is the dispatch core that algorithm crates build on. It
//! selects, once per call site, the best CPU-specific kernel for an
//! algorithm and float type, and runs it against an execution context that
//! abstracts host and device targets.
//!
//! # Architecture Overview
//!
//! 1. **Probe** - [`cpu::CpuFeatureProbe`] detects the host [`CpuTier`] once
//! 2. **Primitives** - one backend per tier, loops compiled with that tier's
//!    target features ([`primitives`])
//! 3. **Registry** - a static manifest of `(tag, float, tier)` kernels
//!    ([`registry::KernelRegistry`], [`register_kernels!`])
//! 4. **Dispatch** - [`DispatchContainer`] resolves once, then calls
//!    straight through a function pointer
//! 5. **Contexts** - [`context::ExecutionContext`] with a process-wide
//!    current context and scoped switching ([`context::ContextGuard`])
//!
//! # Example
//!
//! ```rust
//! use tiered_core::prelude::*;
//! use tiered_core::registry::DataLayout;
//!
//! struct Norm;
//!
//! impl<F: KernelFloat> Algorithm<F> for Norm {
//!     const TAG: AlgorithmTag = AlgorithmTag::new("norm", "l2", DataLayout::Dense);
//!     type Input = Vec<F>;
//!     type Parameter = ();
//!     type Output = F;
//! }
//!
//! fn norm<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
//!     _ctx: &KernelContext<'_>,
//!     input: &Vec<F>,
//!     _param: &(),
//! ) -> Result<F> {
//!     Ok(P::try_new()?.sum_of_squares(input).sqrt())
//! }
//!
//! let mut builder = KernelRegistry::builder();
//! tiered_core::register_kernels!(&mut builder, Norm => norm,
//!     floats: [f64],
//!     tiers: [baseline, sse42, avx2, avx512, sve],
//!     targets: [HOST],
//! )
//! .unwrap();
//! let registry = builder.build();
//!
//! let container = DispatchContainer::<Norm, f64>::new(&registry).unwrap();
//! let result = container.compute(&vec![3.0, 4.0], &()).unwrap();
//! assert!((result - 5.0).abs() < 1e-12);
//! ```

pub mod config;
pub mod context;
pub mod cpu;
pub mod dispatch;
pub mod error;
pub mod numeric;
pub mod primitives;
pub mod registry;

pub use config::DispatchConfig;
pub use context::{ContextGuard, ContextKind, CpuContext, ExecutionContext, KernelContext, QueueContext};
pub use cpu::{CpuFeatureProbe, CpuTier};
pub use dispatch::DispatchContainer;
pub use error::{Error, Result};
pub use numeric::{FloatType, KernelFloat};
pub use primitives::{ComputePrimitives, ScalarBackend, TierBackend};
pub use registry::{Algorithm, AlgorithmTag, KernelEntry, KernelRegistry};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Algorithm, AlgorithmTag, ComputePrimitives, CpuTier, DispatchContainer, Error,
        ExecutionContext, FloatType, KernelContext, KernelFloat, KernelRegistry, Result,
        TierBackend,
    };

    pub use crate::context::{ContextExt, ContextGuard};
}
