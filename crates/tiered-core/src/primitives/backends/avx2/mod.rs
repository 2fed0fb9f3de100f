//! AVX2 backend implementation
//!
//! Hand-written AVX2/FMA intrinsics for the dense f32/f64 loops; gathers
//! and min/max use the shared lane loops compiled for the same feature set.

mod f32_ops;
mod f64_ops;

use crate::cpu::CpuTier;
use crate::primitives::{lanes, ComputePrimitives, TierBackend};

/// AVX2 backend for x86_64 processors
#[derive(Clone, Copy, Debug)]
pub struct Avx2Backend {
    _private: (),
}

impl TierBackend for Avx2Backend {
    const TIER: CpuTier = CpuTier::Avx2;

    unsafe fn new_unchecked() -> Self {
        Self { _private: () }
    }
}

#[target_feature(enable = "avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn sparse_weighted_sum<F: crate::KernelFloat>(
    data: &[F],
    indices: &[usize],
    weights: &[F],
) -> F {
    lanes::sparse_weighted_sum::<F, 4>(data, indices, weights)
}

#[target_feature(enable = "avx2,fma,bmi1,bmi2,lzcnt")]
unsafe fn min_max<F: crate::KernelFloat>(data: &[F]) -> Option<(F, F)> {
    lanes::min_max(data)
}

// Safety for every call below: an Avx2Backend only exists on hosts with
// the AVX2 tier (see TierBackend::try_new).
macro_rules! impl_avx2_primitives {
    ($float:ty, $ops:ident, $lanes:expr) => {
        impl ComputePrimitives<$float> for Avx2Backend {
            fn backend_name(&self) -> &'static str {
                "avx2"
            }

            fn lanes(&self) -> usize {
                $lanes
            }

            fn sum(&self, data: &[$float]) -> $float {
                unsafe { $ops::sum(data) }
            }

            fn sum_of_squares(&self, data: &[$float]) -> $float {
                unsafe { $ops::dot_product(data, data) }
            }

            fn dot_product(&self, a: &[$float], b: &[$float]) -> $float {
                debug_assert_eq!(a.len(), b.len(), "dot product operands differ in length");
                unsafe { $ops::dot_product(a, b) }
            }

            fn sparse_weighted_sum(
                &self,
                data: &[$float],
                indices: &[usize],
                weights: &[$float],
            ) -> $float {
                unsafe { sparse_weighted_sum(data, indices, weights) }
            }

            fn axpy(&self, alpha: $float, x: &[$float], y: &mut [$float]) {
                unsafe { $ops::axpy(alpha, x, y) }
            }

            fn min_max(&self, data: &[$float]) -> Option<($float, $float)> {
                unsafe { min_max(data) }
            }
        }
    };
}

impl_avx2_primitives!(f32, f32_ops, 8);
impl_avx2_primitives!(f64, f64_ops, 4);
