//! AVX2 loops for f32

use std::arch::x86_64::*;

#[target_feature(enable = "avx")]
#[inline]
unsafe fn horizontal_sum(v: __m256) -> f32 {
    let mut lanes = [0.0f32; 8];
    _mm256_storeu_ps(lanes.as_mut_ptr(), v);
    lanes.iter().sum()
}

/// AVX2 implementation of sum for f32
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn sum(data: &[f32]) -> f32 {
    let n = data.len();
    let chunks = n / 8;

    let mut sum_vec = _mm256_setzero_ps();

    // Main loop - process 8 elements at a time
    for i in 0..chunks {
        let data_vec = _mm256_loadu_ps(data.as_ptr().add(i * 8));
        sum_vec = _mm256_add_ps(sum_vec, data_vec);
    }

    let mut sum = horizontal_sum(sum_vec);
    for &x in &data[chunks * 8..] {
        sum += x;
    }
    sum
}

/// AVX2 implementation of dot product for f32
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 8;

    let mut sum_vec = _mm256_setzero_ps();

    for i in 0..chunks {
        let offset = i * 8;
        let a_vec = _mm256_loadu_ps(a.as_ptr().add(offset));
        let b_vec = _mm256_loadu_ps(b.as_ptr().add(offset));
        sum_vec = _mm256_fmadd_ps(a_vec, b_vec, sum_vec);
    }

    let mut sum = horizontal_sum(sum_vec);
    for i in chunks * 8..n {
        sum += a[i] * b[i];
    }
    sum
}

/// AVX2 implementation of y += alpha * x for f32
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn axpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    let n = x.len().min(y.len());
    let chunks = n / 8;
    let alpha_vec = _mm256_set1_ps(alpha);

    for i in 0..chunks {
        let offset = i * 8;
        let x_vec = _mm256_loadu_ps(x.as_ptr().add(offset));
        let y_ptr = y.as_mut_ptr().add(offset);
        let y_vec = _mm256_loadu_ps(y_ptr);
        _mm256_storeu_ps(y_ptr, _mm256_fmadd_ps(alpha_vec, x_vec, y_vec));
    }

    for i in chunks * 8..n {
        y[i] += alpha * x[i];
    }
}
