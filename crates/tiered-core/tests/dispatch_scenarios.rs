//! End-to-end resolution scenarios

mod common;

use common::{init_logging, tier_registry, TierEcho};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tiered_core::context::KernelContext;
use tiered_core::cpu::CpuFeatureProbe;
use tiered_core::registry::{
    Algorithm, AlgorithmTag, ContextTargets, DataLayout, KernelEntry, KernelRegistry,
};
use tiered_core::{CpuContext, CpuTier, DispatchContainer, Error, Result};

#[test]
fn test_avx2_host_prefers_avx2_over_neighbours() {
    init_logging();
    let registry = tier_registry(&[CpuTier::Baseline, CpuTier::Avx2, CpuTier::Avx512]);
    let container = DispatchContainer::<TierEcho, f32>::with_tier(&registry, CpuTier::Avx2).unwrap();

    assert_eq!(container.resolved_tier(), CpuTier::Avx2);
    let ran_at = container.compute_in(&CpuContext::new(), &(), &()).unwrap();
    assert_eq!(ran_at, CpuTier::Avx2);
}

#[test]
fn test_avx512_host_falls_back_to_avx2() {
    let registry = tier_registry(&[CpuTier::Baseline, CpuTier::Avx2]);
    let container = DispatchContainer::<TierEcho, f32>::with_tier(&registry, CpuTier::Avx512).unwrap();
    assert_eq!(container.resolved_tier(), CpuTier::Avx2);
    assert_eq!(container.entry().symbol(), "avx2");
}

#[test]
fn test_missing_float_type_fails_construction() {
    let registry = tier_registry(&[CpuTier::Baseline, CpuTier::Avx2]);
    let err = DispatchContainer::<TierEcho, f64>::with_tier(&registry, CpuTier::Avx2).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.to_string(), "Unsupported combination: x/default/dense has no kernels for f64");
}

static PROBE_DETECTIONS: AtomicUsize = AtomicUsize::new(0);

fn counting_detector() -> CpuTier {
    PROBE_DETECTIONS.fetch_add(1, Ordering::SeqCst);
    CpuTier::Avx2
}

static COUNTING_PROBE: CpuFeatureProbe = CpuFeatureProbe::new(counting_detector);

struct Counted;

impl<F: tiered_core::KernelFloat> Algorithm<F> for Counted {
    const TAG: AlgorithmTag = AlgorithmTag::new("counted", "default", DataLayout::Dense);
    type Input = Vec<f64>;
    type Parameter = ();
    type Output = f64;
}

static KERNEL_CALLS: AtomicUsize = AtomicUsize::new(0);

fn counted_kernel(_ctx: &KernelContext<'_>, input: &Vec<f64>, _param: &()) -> Result<f64> {
    KERNEL_CALLS.fetch_add(1, Ordering::SeqCst);
    Ok(input.iter().sum())
}

#[test]
fn test_resolution_happens_once_per_container() {
    let mut builder = KernelRegistry::builder();
    builder
        .register(KernelEntry::<Counted, f64>::new(
            CpuTier::Avx2,
            "counted_kernel<f64, avx2>",
            ContextTargets::HOST,
            counted_kernel,
        ))
        .unwrap();
    let registry = builder.build();

    let container = DispatchContainer::<Counted, f64>::with_probe(&registry, &COUNTING_PROBE).unwrap();
    assert_eq!(PROBE_DETECTIONS.load(Ordering::SeqCst), 1);

    let ctx = CpuContext::new();
    assert_eq!(container.compute_in(&ctx, &vec![1.0, 2.0], &()).unwrap(), 3.0);
    assert_eq!(container.compute_in(&ctx, &vec![5.0, 5.0, 5.0], &()).unwrap(), 15.0);
    assert_eq!(KERNEL_CALLS.load(Ordering::SeqCst), 2);

    // A second container reuses the cached probe
    let second = DispatchContainer::<Counted, f64>::with_probe(&registry, &COUNTING_PROBE).unwrap();
    assert_eq!(second.entry().symbol(), container.entry().symbol());
    assert_eq!(PROBE_DETECTIONS.load(Ordering::SeqCst), 1);
}

static RACE_DETECTIONS: AtomicUsize = AtomicUsize::new(0);

fn slow_detector() -> CpuTier {
    RACE_DETECTIONS.fetch_add(1, Ordering::SeqCst);
    thread::sleep(std::time::Duration::from_millis(20));
    CpuTier::Sse42
}

static RACE_PROBE: CpuFeatureProbe = CpuFeatureProbe::new(slow_detector);

#[test]
fn test_concurrent_containers_share_one_detection() {
    init_logging();
    let registry = Arc::new(tier_registry(&[CpuTier::Baseline, CpuTier::Sse42]));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                DispatchContainer::<TierEcho, f32>::with_probe(&registry, &RACE_PROBE)
                    .map(|c| c.resolved_tier())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), CpuTier::Sse42);
    }
    assert_eq!(RACE_DETECTIONS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_host_probe_resolution_is_runnable() {
    let registry = tier_registry(&CpuTier::ALL);
    let container = DispatchContainer::<TierEcho, f32>::new(&registry).unwrap();
    let host = tiered_core::cpu::host_tier();
    assert_eq!(container.host_tier(), host);
    assert!(host.can_run(container.resolved_tier()));

    match DispatchContainer::<TierEcho, f64>::new(&registry) {
        Err(Error::UnsupportedCombination { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}
