//! AVX-512 backend for recent x86_64 processors
//!
//! Loops are compiled for the AVX-512 F/CD/BW/DQ/VL feature set and
//! vectorized by the compiler; there are no hand-written intrinsics here.

use crate::cpu::CpuTier;
use crate::numeric::KernelFloat;
use crate::primitives::{lanes, ComputePrimitives, TierBackend};

/// 512-bit vector width in bytes
const VECTOR_BYTES: usize = 64;

/// AVX-512 backend
#[derive(Clone, Copy, Debug)]
pub struct Avx512Backend {
    _private: (),
}

impl TierBackend for Avx512Backend {
    const TIER: CpuTier = CpuTier::Avx512;

    unsafe fn new_unchecked() -> Self {
        Self { _private: () }
    }
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn sum<F: KernelFloat>(data: &[F]) -> F {
    lanes::sum::<F, 16>(data)
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn sum_of_squares<F: KernelFloat>(data: &[F]) -> F {
    lanes::sum_of_squares::<F, 16>(data)
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn dot_product<F: KernelFloat>(a: &[F], b: &[F]) -> F {
    lanes::dot_product::<F, 16>(a, b)
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn sparse_weighted_sum<F: KernelFloat>(data: &[F], indices: &[usize], weights: &[F]) -> F {
    lanes::sparse_weighted_sum::<F, 8>(data, indices, weights)
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn axpy<F: KernelFloat>(alpha: F, x: &[F], y: &mut [F]) {
    lanes::axpy(alpha, x, y)
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn min_max<F: KernelFloat>(data: &[F]) -> Option<(F, F)> {
    lanes::min_max(data)
}

// Safety for every call below: an Avx512Backend only exists on hosts with
// the AVX-512 tier (see TierBackend::try_new).
impl<F: KernelFloat> ComputePrimitives<F> for Avx512Backend {
    fn backend_name(&self) -> &'static str {
        "avx512"
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
