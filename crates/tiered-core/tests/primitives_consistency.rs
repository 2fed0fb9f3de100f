//! Every compiled tier backend agrees with the scalar backend

mod common;

use common::{assert_relative_eq, edge_case_lengths, generate_data};
use tiered_core::primitives::{ComputePrimitives, ScalarBackend, TierBackend};

fn check_against_scalar<P>(backend: P)
where
    P: ComputePrimitives<f64> + ComputePrimitives<f32> + TierBackend,
{
    let scalar = ScalarBackend::new();
    for n in edge_case_lengths() {
        let a = generate_data(n);
        let b: Vec<f64> = a.iter().rev().map(|x| x * 0.5 - 1.0).collect();
        let context = format!("{} backend, n = {n}", P::TIER);

        assert_relative_eq!(
            ComputePrimitives::<f64>::sum(&backend, &a),
            ComputePrimitives::<f64>::sum(&scalar, &a),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            ComputePrimitives::<f64>::dot_product(&backend, &a, &b),
            ComputePrimitives::<f64>::dot_product(&scalar, &a, &b),
            epsilon = 1e-8
        );
        assert_relative_eq!(
            ComputePrimitives::<f64>::sum_of_squares(&backend, &a),
            ComputePrimitives::<f64>::sum_of_squares(&scalar, &a),
            epsilon = 1e-8
        );
        assert_eq!(
            ComputePrimitives::<f64>::min_max(&backend, &a),
            ComputePrimitives::<f64>::min_max(&scalar, &a),
            "{context}"
        );

        let indices: Vec<usize> = (0..n).map(|i| (i * 7 + 3) % n.max(1)).collect();
        if n > 0 {
            assert_relative_eq!(
                ComputePrimitives::<f64>::sparse_weighted_sum(&backend, &a, &indices, &b),
                ComputePrimitives::<f64>::sparse_weighted_sum(&scalar, &a, &indices, &b),
                epsilon = 1e-8
            );
        }

        let mut y = b.clone();
        let mut expected = b.clone();
        ComputePrimitives::<f64>::axpy(&backend, 1.5, &a, &mut y);
        ComputePrimitives::<f64>::axpy(&scalar, 1.5, &a, &mut expected);
        for (got, want) in y.iter().zip(&expected) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }

        let a32: Vec<f32> = a.iter().map(|&x| x as f32).collect();
        assert_relative_eq!(
            ComputePrimitives::<f32>::sum(&backend, &a32),
            ComputePrimitives::<f32>::sum(&scalar, &a32),
            epsilon = 1e-3
        );
    }
}

#[test]
fn test_scalar_backend_is_always_available() {
    assert!(ScalarBackend::is_available());
    check_against_scalar(ScalarBackend::try_new().unwrap());
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[test]
fn test_sse_backend() {
    use tiered_core::primitives::SseBackend;
    match SseBackend::try_new() {
        Ok(backend) => check_against_scalar(backend),
        Err(e) => println!("Skipping: {e}"),
    }
}

#[cfg(target_arch = "x86_64")]
#[test]
fn test_avx2_backend() {
    use tiered_core::primitives::Avx2Backend;
    match Avx2Backend::try_new() {
        Ok(backend) => check_against_scalar(backend),
        Err(e) => println!("Skipping: {e}"),
    }
}

#[cfg(target_arch = "x86_64")]
#[test]
fn test_avx512_backend() {
    use tiered_core::primitives::Avx512Backend;
    match Avx512Backend::try_new() {
        Ok(backend) => check_against_scalar(backend),
        Err(e) => println!("Skipping: {e}"),
    }
}

#[cfg(target_arch = "aarch64")]
#[test]
fn test_sve_backend() {
    use tiered_core::primitives::SveBackend;
    match SveBackend::try_new() {
        Ok(backend) => check_against_scalar(backend),
        Err(e) => println!("Skipping: {e}"),
    }
}
