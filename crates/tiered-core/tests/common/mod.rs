//! Shared utilities for integration tests

#![allow(dead_code)]

use parking_lot::{Mutex, MutexGuard};
use tiered_core::context::KernelContext;
use tiered_core::registry::{
    Algorithm, AlgorithmTag, ContextTargets, DataLayout, KernelEntry, KernelRegistry,
};
use tiered_core::{CpuTier, KernelFloat, Result};

pub use approx::assert_relative_eq;

pub const EPSILON: f64 = 1e-10;

static CURRENT_CONTEXT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Serialize tests that read or swap the process-wide context
pub fn serial() -> MutexGuard<'static, ()> {
    CURRENT_CONTEXT_LOCK.lock()
}

/// Route `log` output through the test harness, `RUST_LOG` selects the level
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Array lengths around every vector width
pub fn edge_case_lengths() -> Vec<usize> {
    vec![
        0,   // Empty
        1,   // Single element
        2,   // SSE f64 width
        3,   // SSE f64 width + 1
        4,   // AVX2 f64 width
        5,   // AVX2 f64 width + 1
        7,   // AVX2 width - 1
        8,   // AVX-512 f64 width
        9,   // AVX-512 f64 width + 1
        15,  // No SIMD width divides it
        16,  // AVX-512 f32 width
        17,  // Power of 2 + 1
        31,  // Prime
        64,  // Cache line of f64
        100, // Round number
        127, // Mersenne prime
    ]
}

/// Deterministic test data
pub fn generate_data(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64 * 0.37).sin() * 10.0 + 0.5).collect()
}

/// Test algorithm whose kernel reports the tier it was registered at
pub struct TierEcho;

impl<F: KernelFloat> Algorithm<F> for TierEcho {
    const TAG: AlgorithmTag = AlgorithmTag::new("x", "default", DataLayout::Dense);
    type Input = ();
    type Parameter = ();
    type Output = CpuTier;
}

fn echo_tier<F: KernelFloat>(ctx: &KernelContext<'_>, _input: &(), _param: &()) -> Result<CpuTier> {
    Ok(ctx.tier())
}

/// A registry holding `TierEcho` kernels for f32 at `tiers`
pub fn tier_registry(tiers: &[CpuTier]) -> KernelRegistry {
    let mut builder = KernelRegistry::builder();
    for &tier in tiers {
        builder
            .register(KernelEntry::<TierEcho, f32>::new(
                tier,
                tier.name(),
                ContextTargets::all(),
                echo_tier::<f32>,
            ))
            .unwrap();
    }
    builder.build()
}
