//! SSE4.2 backend for older x86 processors

use crate::cpu::CpuTier;
use crate::numeric::KernelFloat;
use crate::primitives::{lanes, ComputePrimitives, TierBackend};

/// 128-bit vector width in bytes
const VECTOR_BYTES: usize = 16;

/// SSE4.2 backend
#[derive(Clone, Copy, Debug)]
pub struct SseBackend {
    _private: (),
}

impl TierBackend for SseBackend {
    const TIER: CpuTier = CpuTier::Sse42;

    unsafe fn new_unchecked() -> Self {
        Self { _private: () }
    }
}

#[target_feature(enable = "sse2,ssse3,sse4.1,sse4.2,popcnt")]
unsafe fn sum<F: KernelFloat>(data: &[F]) -> F {
    lanes::sum::<F, 8>(data)
}

#[target_feature(enable = "sse2,ssse3,sse4.1,sse4.2,popcnt")]
unsafe fn sum_of_squares<F: KernelFloat>(data: &[F]) -> F {
    lanes::sum_of_squares::<F, 8>(data)
}

#[target_feature(enable = "sse2,ssse3,sse4.1,sse4.2,popcnt")]
unsafe fn dot_product<F: KernelFloat>(a: &[F], b: &[F]) -> F {
    lanes::dot_product::<F, 8>(a, b)
}

#[target_feature(enable = "sse2,ssse3,sse4.1,sse4.2,popcnt")]
unsafe fn sparse_weighted_sum<F: KernelFloat>(data: &[F], indices: &[usize], weights: &[F]) -> F {
    lanes::sparse_weighted_sum::<F, 4>(data, indices, weights)
}

#[target_feature(enable = "sse2,ssse3,sse4.1,sse4.2,popcnt")]
unsafe fn axpy<F: KernelFloat>(alpha: F, x: &[F], y: &mut [F]) {
    lanes::axpy(alpha, x, y)
}

#[target_feature(enable = "sse2,ssse3,sse4.1,sse4.2,popcnt")]
unsafe fn min_max<F: KernelFloat>(data: &[F]) -> Option<(F, F)> {
    lanes::min_max(data)
}

// Safety for every call below: an SseBackend only exists on hosts with
// the SSE4.2 tier (see TierBackend::try_new).
impl<F: KernelFloat> ComputePrimitives<F> for SseBackend {
    fn backend_name(&self) -> &'static str {
        "sse42"
    }

    fn lanes(&self) -> usize {
        VECTOR_BYTES / F::FLOAT_TYPE.size_of()
    }

    fn sum(&self, data: &[F]) -> F {
        unsafe { sum(data) }
    }

    fn sum_of_squares(&self, data: &[F]) -> F {
        unsafe { sum_of_squares(data) }
    }

    fn dot_product(&self, a: &[F], b: &[F]) -> F {
        unsafe { dot_product(a, b) }
    }

    fn sparse_weighted_sum(&self, data: &[F], indices: &[usize], weights: &[F]) -> F {
        unsafe { sparse_weighted_sum(data, indices, weights) }
    }

    fn axpy(&self, alpha: F, x: &[F], y: &mut [F]) {
        unsafe { axpy(alpha, x, y) }
    }

    fn min_max(&self, data: &[F]) -> Option<(F, F)> {
        unsafe { min_max(data) }
    }
}
