//! Concrete tier backends
//!
//! Each backend is a zero-sized type; only tiers that exist on the target
//! architecture are compiled.

pub mod scalar;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod sse;
#[cfg(target_arch = "x86_64")]
pub mod avx2;
#[cfg(target_arch = "x86_64")]
pub mod avx512;
#[cfg(target_arch = "aarch64")]
pub mod sve;

pub use scalar::ScalarBackend;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use sse::SseBackend;
#[cfg(target_arch = "x86_64")]
pub use avx2::Avx2Backend;
#[cfg(target_arch = "x86_64")]
pub use avx512::Avx512Backend;
#[cfg(target_arch = "aarch64")]
pub use sve::SveBackend;
