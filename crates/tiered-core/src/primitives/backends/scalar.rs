//! Scalar backend implementation
//!
//! Portable code with no ISA assumptions. Every kernel manifest must
//! include this tier: it is the floor lookup falls back to.

use crate::cpu::CpuTier;
use crate::numeric::KernelFloat;
use crate::primitives::{ComputePrimitives, TierBackend};

/// Scalar backend - works on every host
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarBackend;

impl ScalarBackend {
    pub fn new() -> Self {
        Self
    }
}

impl TierBackend for ScalarBackend {
    const TIER: CpuTier = CpuTier::Baseline;

    unsafe fn new_unchecked() -> Self {
        Self
    }
}

// All operations use the default implementations from the trait
impl<F: KernelFloat> ComputePrimitives<F> for ScalarBackend {
    fn backend_name(&self) -> &'static str {
        "scalar"
    }
}
