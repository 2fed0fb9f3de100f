//! Multi-accumulator loops shared by vector tiers
//!
//! Each loop keeps `L` independent accumulators so that, once inlined into
//! a `#[target_feature]` function, the compiler can keep them in one vector
//! register of the tier's width. Everything here is `#[inline(always)]`:
//! these bodies must be code-generated inside their caller's feature set.

#![allow(clippy::needless_range_loop)]

use crate::numeric::KernelFloat;

#[inline(always)]
fn reduce<F: KernelFloat, const L: usize>(acc: [F; L]) -> F {
    acc.iter().fold(F::zero(), |total, &x| total + x)
}

#[inline(always)]
pub(crate) fn sum<F: KernelFloat, const L: usize>(data: &[F]) -> F {
    let mut acc = [F::zero(); L];
    let mut chunks = data.chunks_exact(L);
    for chunk in &mut chunks {
        for i in 0..L {
            acc[i] = acc[i] + chunk[i];
        }
    }
    chunks
        .remainder()
        .iter()
        .fold(reduce(acc), |total, &x| total + x)
}

#[inline(always)]
pub(crate) fn dot_product<F: KernelFloat, const L: usize>(a: &[F], b: &[F]) -> F {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let mut acc = [F::zero(); L];
    let full = n - n % L;
    for (ca, cb) in a[..full].chunks_exact(L).zip(b[..full].chunks_exact(L)) {
        for i in 0..L {
            acc[i] = acc[i] + ca[i] * cb[i];
        }
    }
    a[full..]
        .iter()
        .zip(&b[full..])
        .fold(reduce(acc), |total, (&x, &y)| total + x * y)
}

#[inline(always)]
pub(crate) fn sum_of_squares<F: KernelFloat, const L: usize>(data: &[F]) -> F {
    dot_product::<F, L>(data, data)
}

#[inline(always)]
pub(crate) fn sparse_weighted_sum<F: KernelFloat, const L: usize>(
    data: &[F],
    indices: &[usize],
    weights: &[F],
) -> F {
    let n = indices.len().min(weights.len());
    let mut acc = [F::zero(); L];
    let full = n - n % L;
    for (ci, cw) in indices[..full]
        .chunks_exact(L)
        .zip(weights[..full].chunks_exact(L))
    {
        for i in 0..L {
            acc[i] = acc[i] + data[ci[i]] * cw[i];
        }
    }
    indices[full..n]
        .iter()
        .zip(&weights[full..n])
        .fold(reduce(acc), |total, (&idx, &w)| total + data[idx] * w)
}

#[inline(always)]
pub(crate) fn axpy<F: KernelFloat>(alpha: F, x: &[F], y: &mut [F]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = *yi + alpha * xi;
    }
}

#[inline(always)]
pub(crate) fn min_max<F: KernelFloat>(data: &[F]) -> Option<(F, F)> {
    let mut values = data.iter().copied().filter(|x| !x.is_nan());
    let first = values.next()?;
    Some(values.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x))))
}
