//! Resolve-once kernel dispatch
//!
//! A [`DispatchContainer`] performs the only CPU-tier branch in the
//! library: at construction it reads the probed tier, looks up the best
//! kernel and keeps its function pointer. Every `compute` afterwards is a
//! direct call through that pointer.

use std::fmt;

use crate::context::{self, ExecutionContext, KernelContext};
use crate::cpu::{self, CpuFeatureProbe, CpuTier};
use crate::numeric::KernelFloat;
use crate::registry::{Algorithm, AlgorithmTag, KernelEntry, KernelRegistry};
use crate::{Error, Result};

/// A kernel of `A` for `F`, resolved for one host tier
pub struct DispatchContainer<A: Algorithm<F>, F: KernelFloat> {
    entry: KernelEntry<A, F>,
    host_tier: CpuTier,
}

impl<A: Algorithm<F>, F: KernelFloat> DispatchContainer<A, F> {
    /// Resolve against the process-wide host probe
    pub fn new(registry: &KernelRegistry) -> Result<Self> {
        Self::with_probe(registry, cpu::host_probe())
    }

    /// Resolve against a specific probe
    pub fn with_probe(registry: &KernelRegistry, probe: &CpuFeatureProbe) -> Result<Self> {
        Self::with_tier(registry, probe.detect())
    }

    /// Resolve as if the host were at `tier`
    pub fn with_tier(registry: &KernelRegistry, tier: CpuTier) -> Result<Self> {
        let entry = registry.lookup::<A, F>(tier)?;
        log::debug!(
            "Resolved {}/{} to {} (tier {}, host {})",
            A::TAG,
            F::FLOAT_TYPE,
            entry.symbol(),
            entry.tier(),
            tier
        );
        Ok(Self {
            entry,
            host_tier: tier,
        })
    }

    /// Run the kernel against the current execution context
    pub fn compute(&self, input: &A::Input, parameter: &A::Parameter) -> Result<A::Output> {
        let ctx = context::current();
        self.compute_in(ctx.as_ref(), input, parameter)
    }

    /// Run the kernel against an explicit execution context
    ///
    /// Fails with [`Error::ContextMismatch`] before the kernel runs when the
    /// kernel was not built for the context's kind. The kernel's own status
    /// is returned unchanged.
    pub fn compute_in(
        &self,
        ctx: &dyn ExecutionContext,
        input: &A::Input,
        parameter: &A::Parameter,
    ) -> Result<A::Output> {
        let targets = self.entry.targets();
        if !targets.supports(ctx.kind()) {
            return Err(Error::context_mismatch(
                self.entry.symbol(),
                targets.preferred(),
                ctx.kind(),
            ));
        }

        let kernel_ctx = KernelContext::new(ctx, A::TAG, self.entry.tier(), self.entry.symbol());
        (self.entry.function())(&kernel_ctx, input, parameter)
    }

    pub fn entry(&self) -> &KernelEntry<A, F> {
        &self.entry
    }

    /// Tier of the resolved kernel
    pub fn resolved_tier(&self) -> CpuTier {
        self.entry.tier()
    }

    /// Host tier the container was resolved for
    pub fn host_tier(&self) -> CpuTier {
        self.host_tier
    }

    pub fn tag(&self) -> AlgorithmTag {
        A::TAG
    }
}

impl<A: Algorithm<F>, F: KernelFloat> Clone for DispatchContainer<A, F> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry,
            host_tier: self.host_tier,
        }
    }
}

impl<A: Algorithm<F>, F: KernelFloat> fmt::Debug for DispatchContainer<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContainer")
            .field("entry", &self.entry)
            .field("host_tier", &self.host_tier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::serial;
    use crate::context::{ContextKind, CpuContext, QueueContext};
    use crate::registry::{ContextTargets, DataLayout, KernelFn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scale;

    impl<F: KernelFloat> Algorithm<F> for Scale {
        const TAG: AlgorithmTag = AlgorithmTag::new("scale", "default", DataLayout::Dense);
        type Input = Vec<F>;
        type Parameter = F;
        type Output = Vec<F>;
    }

    fn scale(ctx: &KernelContext<'_>, input: &Vec<f64>, factor: &f64) -> Result<Vec<f64>> {
        assert_eq!(ctx.tier(), CpuTier::Sse42);
        Ok(input.iter().map(|x| x * factor).collect())
    }

    static COUNTED_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counted(ctx: &KernelContext<'_>, input: &Vec<f64>, factor: &f64) -> Result<Vec<f64>> {
        COUNTED_CALLS.fetch_add(1, Ordering::SeqCst);
        scale(ctx, input, factor)
    }

    static HOST_ONLY_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn host_only(ctx: &KernelContext<'_>, input: &Vec<f64>, factor: &f64) -> Result<Vec<f64>> {
        HOST_ONLY_CALLS.fetch_add(1, Ordering::SeqCst);
        scale(ctx, input, factor)
    }

    fn fail(_ctx: &KernelContext<'_>, _input: &Vec<f64>, _factor: &f64) -> Result<Vec<f64>> {
        Err(Error::Computation("factor is not finite".into()))
    }

    fn registry(function: KernelFn<Scale, f64>) -> KernelRegistry {
        let mut builder = KernelRegistry::builder();
        builder
            .register(KernelEntry::<Scale, f64>::new(
                CpuTier::Sse42,
                "scale",
                ContextTargets::HOST,
                function,
            ))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_repeated_compute_uses_resolved_entry() {
        let registry = registry(counted);
        let container = DispatchContainer::<Scale, f64>::with_tier(&registry, CpuTier::Avx512).unwrap();
        assert_eq!(container.resolved_tier(), CpuTier::Sse42);
        assert_eq!(container.host_tier(), CpuTier::Avx512);

        let ctx = CpuContext::new();
        assert_eq!(container.compute_in(&ctx, &vec![1.0, 2.0], &3.0).unwrap(), vec![3.0, 6.0]);
        assert_eq!(container.compute_in(&ctx, &vec![4.0], &0.5).unwrap(), vec![2.0]);
        assert_eq!(COUNTED_CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_construction_fails_without_kernel() {
        let registry = registry(scale);
        let err = DispatchContainer::<Scale, f64>::with_tier(&registry, CpuTier::Baseline).unwrap_err();
        assert!(matches!(err, Error::KernelNotFound { .. }));

        let err = DispatchContainer::<Scale, f32>::with_tier(&registry, CpuTier::Avx2).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCombination { .. }));
    }

    #[test]
    fn test_context_mismatch_is_reported_before_running() {
        let registry = registry(host_only);
        let container = DispatchContainer::<Scale, f64>::with_tier(&registry, CpuTier::Avx2).unwrap();
        let device = QueueContext::new("mismatch").unwrap();

        match container.compute_in(&device, &vec![1.0], &1.0) {
            Err(Error::ContextMismatch { required, actual, .. }) => {
                assert_eq!(required, ContextKind::Host);
                assert_eq!(actual, ContextKind::Device);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(HOST_ONLY_CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_compute_follows_current_context() {
        let _lock = serial();
        let registry = registry(scale);
        let container = DispatchContainer::<Scale, f64>::with_tier(&registry, CpuTier::Sse42).unwrap();

        assert!(container.compute(&vec![1.0], &2.0).is_ok());

        let device: Arc<dyn ExecutionContext> = Arc::new(QueueContext::new("current").unwrap());
        let result = context::with_context(device, || container.compute(&vec![1.0], &2.0));
        assert!(matches!(result, Err(Error::ContextMismatch { .. })));
    }

    #[test]
    fn test_kernel_error_propagates_unchanged() {
        let mut builder = KernelRegistry::builder();
        builder
            .register(KernelEntry::<Scale, f64>::new(
                CpuTier::Baseline,
                "fail",
                ContextTargets::all(),
                fail,
            ))
            .unwrap();
        let registry = builder.build();
        let container = DispatchContainer::<Scale, f64>::with_tier(&registry, CpuTier::Avx2).unwrap();

        let err = container.compute_in(&CpuContext::new(), &vec![1.0], &f64::NAN).unwrap_err();
        assert_eq!(err.to_string(), "Computation error: factor is not finite");
    }
}
