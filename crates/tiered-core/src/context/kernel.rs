//! What a running kernel sees

use super::{ContextKind, ExecutionContext};
use crate::cpu::CpuTier;
use crate::registry::AlgorithmTag;
use crate::{Error, Result};

/// Context handed to every kernel invocation
///
/// Kernels reach memory and queues only through [`context`](Self::context),
/// never through a concrete backend.
#[derive(Debug, Clone, Copy)]
pub struct KernelContext<'a> {
    context: &'a dyn ExecutionContext,
    tag: AlgorithmTag,
    tier: CpuTier,
    symbol: &'static str,
}

impl<'a> KernelContext<'a> {
    pub fn new(
        context: &'a dyn ExecutionContext,
        tag: AlgorithmTag,
        tier: CpuTier,
        symbol: &'static str,
    ) -> Self {
        Self {
            context,
            tag,
            tier,
            symbol,
        }
    }

    /// The execution context the kernel runs against
    pub fn context(&self) -> &'a dyn ExecutionContext {
        self.context
    }

    pub fn kind(&self) -> ContextKind {
        self.context.kind()
    }

    pub fn tag(&self) -> AlgorithmTag {
        self.tag
    }

    /// Tier of the running kernel
    pub fn tier(&self) -> CpuTier {
        self.tier
    }

    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    /// Fail unless the context is of kind `required`
    pub fn require(&self, required: ContextKind) -> Result<()> {
        let actual = self.kind();
        if actual == required {
            Ok(())
        } else {
            Err(Error::context_mismatch(&self.tag.to_string(), required, actual))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CpuContext, QueueContext};
    use crate::registry::DataLayout;

    const TAG: AlgorithmTag = AlgorithmTag::new("solve", "cholesky", DataLayout::Dense);

    #[test]
    fn test_require() {
        let host = CpuContext::new();
        let ctx = KernelContext::new(&host, TAG, CpuTier::Baseline, "solve<f64, baseline>");
        assert!(ctx.require(ContextKind::Host).is_ok());

        let err = ctx.require(ContextKind::Device).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Execution context mismatch in solve/cholesky/dense: requires device, current context is host"
        );

        let device = QueueContext::new("kernel").unwrap();
        let ctx = KernelContext::new(&device, TAG, CpuTier::Baseline, "solve<f64, baseline>");
        assert!(ctx.require(ContextKind::Device).is_ok());
        assert_eq!(ctx.context().name(), "kernel");
    }
}
