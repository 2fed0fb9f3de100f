//! Tier-specialized computational primitives
//!
//! This module is the Rust counterpart of compiling one translation unit
//! per CPU tier: every backend's loops live in `#[target_feature]`
//! functions, so a kernel body generic over `P: ComputePrimitives<F>` is
//! code-generated separately for each backend it is instantiated with.
//!
//! # Usage
//!
//! ```rust
//! use tiered_core::primitives::{ComputePrimitives, ScalarBackend, TierBackend};
//!
//! let backend = ScalarBackend::try_new().unwrap();
//! let data = [1.0f64, 2.0, 3.0, 4.0];
//! assert_eq!(backend.sum(&data), 10.0);
//! assert_eq!(backend.dot_product(&data, &data), 30.0);
//! ```

pub mod backends;
mod lanes;
pub mod traits;

pub use backends::ScalarBackend;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use backends::SseBackend;
#[cfg(target_arch = "x86_64")]
pub use backends::{Avx2Backend, Avx512Backend};
#[cfg(target_arch = "aarch64")]
pub use backends::SveBackend;
pub use traits::{ComputePrimitives, TierBackend};

