//! AVX2 loops for f64

use std::arch::x86_64::*;

#[target_feature(enable = "avx")]
#[inline]
unsafe fn horizontal_sum(v: __m256d) -> f64 {
    let mut lanes = [0.0f64; 4];
    _mm256_storeu_pd(lanes.as_mut_ptr(), v);
    lanes[0] + lanes[1] + lanes[2] + lanes[3]
}

/// AVX2 implementation of sum for f64
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn sum(data: &[f64]) -> f64 {
    let n = data.len();
    let chunks = n / 4;

    let mut sum_vec = _mm256_setzero_pd();

    // Main loop - process 4 elements at a time
    for i in 0..chunks {
        let data_vec = _mm256_loadu_pd(data.as_ptr().add(i * 4));
        sum_vec = _mm256_add_pd(sum_vec, data_vec);
    }

    let mut sum = horizontal_sum(sum_vec);
    for &x in &data[chunks * 4..] {
        sum += x;
    }
    sum
}

/// AVX2 implementation of dot product for f64
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let chunks = n / 4;

    let mut sum_vec = _mm256_setzero_pd();

    for i in 0..chunks {
        let offset = i * 4;
        let a_vec = _mm256_loadu_pd(a.as_ptr().add(offset));
        let b_vec = _mm256_loadu_pd(b.as_ptr().add(offset));
        sum_vec = _mm256_fmadd_pd(a_vec, b_vec, sum_vec);
    }

    let mut sum = horizontal_sum(sum_vec);
    for i in chunks * 4..n {
        sum += a[i] * b[i];
    }
    sum
}

/// AVX2 implementation of y += alpha * x for f64
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    let n = x.len().min(y.len());
    let chunks = n / 4;
    let alpha_vec = _mm256_set1_pd(alpha);

    for i in 0..chunks {
        let offset = i * 4;
        let x_vec = _mm256_loadu_pd(x.as_ptr().add(offset));
        let y_ptr = y.as_mut_ptr().add(offset);
        let y_vec = _mm256_loadu_pd(y_ptr);
        _mm256_storeu_pd(y_ptr, _mm256_fmadd_pd(alpha_vec, x_vec, y_vec));
    }

    for i in chunks * 4..n {
        y[i] += alpha * x[i];
    }
}
