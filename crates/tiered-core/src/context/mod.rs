//! Execution contexts
//!
//! An [`ExecutionContext`] is where kernel primitives run: it owns memory
//! and a queue of work. Kernels talk to the context instead of a concrete
//! backend, so the same kernel body runs against the synchronous host
//! context ([`CpuContext`]) or a queue-based device ([`QueueContext`]).
//!
//! # Current context
//!
//! The process has a single current context (see [`current`]). It can be
//! swapped for a scope with [`ContextGuard`], which restores the previous
//! context on every exit path including unwinding:
//!
//! ```rust
//! use std::sync::Arc;
//! use tiered_core::context::{self, ContextGuard, ContextKind, QueueContext};
//!
//! let device = Arc::new(QueueContext::new("reference-device").unwrap());
//! {
//!     let _guard = ContextGuard::install(device);
//!     assert_eq!(context::current().kind(), ContextKind::Device);
//! }
//! assert_eq!(context::current().kind(), ContextKind::Host);
//! ```
//!
//! The current context is process-wide, not per thread. Threads that swap
//! it concurrently must be serialized by the caller; threads that only
//! read it must agree on one context while their kernels run.

mod current;
mod host;
mod kernel;
mod memory;
mod queue;

pub use current::{current, set_current, with_context, ContextGuard};
pub use host::CpuContext;
pub use kernel::KernelContext;
pub use memory::{Buffer, Memory};
pub use queue::QueueContext;

use bytemuck::{Pod, Zeroable};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::sync::Arc;
use uuid::Uuid;

use crate::{Error, Result};

/// Where a context executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// Host CPU, synchronous, host memory
    Host,
    /// Accelerator queue, asynchronous, device memory
    Device,
}

impl Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Host => f.write_str("host"),
            ContextKind::Device => f.write_str("device"),
        }
    }
}

/// Unique identity of a context instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Unit of work submitted to a context
///
/// Tasks run with exclusive access to the context's memory. Their status
/// is delivered unchanged through the returned [`Event`].
///
/// A task must only touch the `&mut Memory` it is handed. The context holds
/// its memory lock while the task runs, so calling back into the same
/// context (`allocate`, `read`, `enqueue`, ...) from inside a task
/// deadlocks; on a queue context a `read` would also wait on the task
/// itself. Scratch space comes from [`Memory::allocate`].
pub type Task = Box<dyn FnOnce(&mut Memory) -> Result<()> + Send + 'static>;

#[derive(Default)]
struct EventState {
    status: Mutex<Option<Result<()>>>,
    done: Condvar,
}

/// Completion handle for submitted work
///
/// Host contexts return events that are already complete; device events
/// complete when the queue reaches the work.
pub struct Event {
    state: Arc<EventState>,
}

impl Event {
    /// An event that is already complete with `status`
    pub fn completed(status: Result<()>) -> Self {
        let event = Self::pending();
        event.complete(status);
        event
    }

    pub(crate) fn pending() -> Self {
        Self {
            state: Arc::new(EventState::default()),
        }
    }

    /// A second handle used by the executor to signal completion
    pub(crate) fn signal(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }

    pub(crate) fn complete(&self, status: Result<()>) {
        let mut slot = self.state.status.lock();
        *slot = Some(status);
        self.state.done.notify_all();
    }

    /// Whether the work has finished
    pub fn is_complete(&self) -> bool {
        self.state.status.lock().is_some()
    }

    /// Block until the work has finished and return its status
    pub fn wait(self) -> Result<()> {
        let mut slot = self.state.status.lock();
        while slot.is_none() {
            self.state.done.wait(&mut slot);
        }
        slot.take().unwrap_or(Ok(()))
    }
}

impl Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Primitive operations a compute target offers to kernels
///
/// Device backends plug in by implementing this trait. Operations on a
/// device are asynchronous relative to the host: `write` and `enqueue`
/// return as soon as work is queued. `read` and `synchronize` block.
pub trait ExecutionContext: Send + Sync + Debug {
    /// Identity of this context instance
    fn id(&self) -> ContextId;

    fn kind(&self) -> ContextKind;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Threads available to host-side work
    fn num_threads(&self) -> usize {
        1
    }

    /// Allocate `bytes` of zeroed context memory
    fn allocate(&self, bytes: usize) -> Result<Buffer>;

    /// Free a buffer. Work already queued against it must have completed.
    fn release(&self, buffer: Buffer) -> Result<()>;

    /// Copy host bytes into `buffer` at `offset`
    fn write(&self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<Event>;

    /// Copy `out.len()` bytes from `buffer` at `offset` into host memory,
    /// after all previously submitted work
    fn read(&self, buffer: &Buffer, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Submit a task. See [`Task`] for what a task may touch.
    fn enqueue(&self, task: Task) -> Result<Event>;

    /// Block until all submitted work has completed
    fn synchronize(&self) -> Result<()>;
}

/// Typed helpers over the byte-level context primitives
pub trait ContextExt: ExecutionContext {
    /// Allocate a buffer and copy `data` into it
    fn upload<T: Pod>(&self, data: &[T]) -> Result<Buffer> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = self.allocate(bytes.len())?;
        self.write(&buffer, 0, bytes)?.wait()?;
        Ok(buffer)
    }

    /// Copy a whole buffer back to the host as `T` elements
    fn download<T: Pod + Zeroable>(&self, buffer: &Buffer) -> Result<Vec<T>> {
        let size = std::mem::size_of::<T>();
        if size == 0 || buffer.len() % size != 0 {
            return Err(Error::Memory(format!(
                "buffer of {} bytes is not a whole number of {size}-byte elements",
                buffer.len()
            )));
        }
        let mut out = vec![T::zeroed(); buffer.len() / size];
        self.read(buffer, 0, bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    /// Submit a closure as a task
    fn submit<F>(&self, f: F) -> Result<Event>
    where
        F: FnOnce(&mut Memory) -> Result<()> + Send + 'static,
    {
        self.enqueue(Box::new(f))
    }
}

impl<C: ExecutionContext + ?Sized> ContextExt for C {}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::{Mutex, MutexGuard};

    static CURRENT_CONTEXT_LOCK: Mutex<()> = parking_lot::const_mutex(());

    /// Serialize unit tests that read or swap the process-wide context
    pub(crate) fn serial() -> MutexGuard<'static, ()> {
        CURRENT_CONTEXT_LOCK.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_event() {
        let event = Event::completed(Ok(()));
        assert!(event.is_complete());
        assert!(event.wait().is_ok());

        let event = Event::completed(Err(Error::Computation("singular".into())));
        assert!(matches!(event.wait(), Err(Error::Computation(_))));
    }

    #[test]
    fn test_event_signalled_from_other_thread() {
        let event = Event::pending();
        let signal = event.signal();
        assert!(!event.is_complete());
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            signal.complete(Ok(()));
        });
        assert!(event.wait().is_ok());
        handle.join().unwrap();
    }

    #[test]
    fn test_context_kind_display() {
        assert_eq!(ContextKind::Host.to_string(), "host");
        assert_eq!(ContextKind::Device.to_string(), "device");
    }
}
