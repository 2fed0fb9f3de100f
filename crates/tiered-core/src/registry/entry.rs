//! Kernel entries

use bitflags::bitflags;
use std::fmt;

use super::{Algorithm, AlgorithmTag};
use crate::context::{ContextKind, KernelContext};
use crate::cpu::CpuTier;
use crate::numeric::{FloatType, KernelFloat};
use crate::Result;

bitflags! {
    /// Execution contexts a kernel can run under
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContextTargets: u8 {
        const HOST = 1 << 0;
        const DEVICE = 1 << 1;
    }
}

impl ContextTargets {
    pub fn supports(self, kind: ContextKind) -> bool {
        match kind {
            ContextKind::Host => self.contains(Self::HOST),
            ContextKind::Device => self.contains(Self::DEVICE),
        }
    }

    /// The context kind to report when `actual` is not supported
    pub fn preferred(self) -> ContextKind {
        if self.contains(Self::HOST) {
            ContextKind::Host
        } else {
            ContextKind::Device
        }
    }
}

/// Entry point of a tier- and type-specialized kernel
pub type KernelFn<A, F> = fn(
    &KernelContext<'_>,
    &<A as Algorithm<F>>::Input,
    &<A as Algorithm<F>>::Parameter,
) -> Result<<A as Algorithm<F>>::Output>;

/// A registered kernel: one algorithm, one float type, one tier
pub struct KernelEntry<A: Algorithm<F>, F: KernelFloat> {
    tier: CpuTier,
    symbol: &'static str,
    targets: ContextTargets,
    function: KernelFn<A, F>,
}

impl<A: Algorithm<F>, F: KernelFloat> KernelEntry<A, F> {
    pub fn new(
        tier: CpuTier,
        symbol: &'static str,
        targets: ContextTargets,
        function: KernelFn<A, F>,
    ) -> Self {
        Self {
            tier,
            symbol,
            targets,
            function,
        }
    }

    pub fn tag(&self) -> AlgorithmTag {
        A::TAG
    }

    pub fn float_type(&self) -> FloatType {
        F::FLOAT_TYPE
    }

    /// Tier the kernel was compiled for
    pub fn tier(&self) -> CpuTier {
        self.tier
    }

    /// Name of the compiled instantiation, for logs and diagnostics
    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    pub fn targets(&self) -> ContextTargets {
        self.targets
    }

    pub fn function(&self) -> KernelFn<A, F> {
        self.function
    }
}

impl<A: Algorithm<F>, F: KernelFloat> Clone for KernelEntry<A, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: Algorithm<F>, F: KernelFloat> Copy for KernelEntry<A, F> {}

impl<A: Algorithm<F>, F: KernelFloat> fmt::Debug for KernelEntry<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelEntry")
            .field("tag", &A::TAG)
            .field("float_type", &F::FLOAT_TYPE)
            .field("tier", &self.tier)
            .field("symbol", &self.symbol)
            .field("targets", &self.targets)
            .finish()
    }
}
