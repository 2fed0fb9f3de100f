//! The process-wide current context and scoped switching

use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{CpuContext, ExecutionContext};
use crate::config;

lazy_static! {
    static ref CURRENT: RwLock<Arc<dyn ExecutionContext>> = RwLock::new(default_context());
}

fn default_context() -> Arc<dyn ExecutionContext> {
    match CpuContext::from_config(config::global()) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            log::warn!("Falling back to default CPU context: {e}");
            Arc::new(CpuContext::new())
        }
    }
}

/// The context kernels currently run against
///
/// Starts as a [`CpuContext`] built from the global configuration.
pub fn current() -> Arc<dyn ExecutionContext> {
    Arc::clone(&CURRENT.read())
}

/// Replace the current context, returning the previous one
pub fn set_current(ctx: Arc<dyn ExecutionContext>) -> Arc<dyn ExecutionContext> {
    log::debug!("Switching execution context to {} ({})", ctx.name(), ctx.id());
    std::mem::replace(&mut *CURRENT.write(), ctx)
}

/// Scoped override of the current context
///
/// Installing a guard makes its context current; dropping it restores the
/// context that was current before, on normal exit and while unwinding.
/// Outstanding device work is not waited on. Guards must be dropped in
/// reverse order of creation, which scoping enforces, and stay on the
/// thread that created them.
#[must_use = "the previous context is restored as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<Arc<dyn ExecutionContext>>,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    pub fn install(ctx: Arc<dyn ExecutionContext>) -> Self {
        Self {
            previous: Some(set_current(ctx)),
            _not_send: PhantomData,
        }
    }

    /// The context that will be restored
    pub fn previous(&self) -> Option<&Arc<dyn ExecutionContext>> {
        self.previous.as_ref()
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            set_current(previous);
        }
    }
}

impl std::fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGuard")
            .field("previous", &self.previous.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

/// Run `f` with `ctx` as the current context
pub fn with_context<R>(ctx: Arc<dyn ExecutionContext>, f: impl FnOnce() -> R) -> R {
    let _guard = ContextGuard::install(ctx);
    f()
}
