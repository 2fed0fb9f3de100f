//! Compute primitive trait shared by every tier backend

use std::fmt::Debug;

use crate::cpu::{CpuFeatures, CpuTier};
use crate::numeric::KernelFloat;
use crate::{Error, Result};

/// Low-level operations kernel bodies are written against
///
/// Default methods are plain scalar loops; tier backends override them
/// with code generated for their instruction set. A kernel generic over
/// `P: ComputePrimitives<F>` is monomorphized once per backend, so the hot
/// loops inside a resolved kernel never branch on CPU capability.
pub trait ComputePrimitives<F: KernelFloat>: Copy + Send + Sync + Debug + 'static {
    /// Get the name of this backend
    fn backend_name(&self) -> &'static str;

    /// Number of `F` lanes processed per vector operation
    fn lanes(&self) -> usize {
        1
    }

    /// Sum all elements in a slice
    fn sum(&self, data: &[F]) -> F {
        data.iter().fold(F::zero(), |acc, &x| acc + x)
    }

    /// Compute sum of squares
    fn sum_of_squares(&self, data: &[F]) -> F {
        data.iter().fold(F::zero(), |acc, &x| acc + x * x)
    }

    /// Compute dot product of two vectors over their common length
    fn dot_product(&self, a: &[F], b: &[F]) -> F {
        debug_assert_eq!(a.len(), b.len(), "dot product operands differ in length");
        a.iter()
            .zip(b.iter())
            .fold(F::zero(), |acc, (&x, &y)| acc + x * y)
    }

    /// Compute sparse weighted sum: Σ(data[indices[i]] * weights[i])
    fn sparse_weighted_sum(&self, data: &[F], indices: &[usize], weights: &[F]) -> F {
        debug_assert_eq!(
            indices.len(),
            weights.len(),
            "Indices and weights must have same length"
        );
        indices
            .iter()
            .zip(weights.iter())
            .fold(F::zero(), |acc, (&idx, &w)| acc + data[idx] * w)
    }

    /// y += alpha * x over the common length
    fn axpy(&self, alpha: F, x: &[F], y: &mut [F]) {
        for (yi, &xi) in y.iter_mut().zip(x.iter()) {
            *yi = *yi + alpha * xi;
        }
    }

    /// Minimum and maximum, ignoring NaN. `None` for empty or all-NaN input.
    fn min_max(&self, data: &[F]) -> Option<(F, F)> {
        data.iter().filter(|x| !x.is_nan()).fold(None, |acc, &x| match acc {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })
    }
}

/// A backend bound to one CPU tier
///
/// Backends carry no state; their only invariant is that a value exists
/// only on hosts that support the tier's instructions.
pub trait TierBackend: Copy + Send + Sync + Debug + 'static {
    /// The tier this backend's code is generated for
    const TIER: CpuTier;

    /// Create the backend without checking the host
    ///
    /// # Safety
    /// The host CPU must support every feature in
    /// `Self::TIER.required_features()`.
    unsafe fn new_unchecked() -> Self;

    /// Create the backend if the host supports its tier
    fn try_new() -> Result<Self> {
        let required = Self::TIER.required_features();
        if CpuFeatures::host().contains(required) {
            // Safety: required features were just checked
            Ok(unsafe { Self::new_unchecked() })
        } else {
            Err(Error::FeatureNotAvailable(format!(
                "{} backend requires {:?}",
                Self::TIER,
                required.difference(CpuFeatures::host())
            )))
        }
    }

    /// Whether this host can construct the backend
    fn is_available() -> bool {
        CpuFeatures::host().contains(Self::TIER.required_features())
    }
}
