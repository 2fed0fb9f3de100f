//! Synchronous host execution context

use parking_lot::Mutex;
#[cfg(feature = "parallel")]
use std::sync::Arc;

use super::{Buffer, ContextId, ContextKind, Event, ExecutionContext, Memory, Task};
use crate::config::DispatchConfig;
use crate::Result;

/// Host CPU context
///
/// Every operation completes before it returns, so its events are always
/// complete. Tasks run on the calling thread, inside the context's Rayon
/// pool when one was configured, so parallel iterators used by a kernel
/// honour the configured thread count.
#[derive(Debug)]
pub struct CpuContext {
    id: ContextId,
    memory: Mutex<Memory>,
    #[cfg(feature = "parallel")]
    thread_pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuContext {
    /// Create a context using Rayon's global pool
    pub fn new() -> Self {
        let id = ContextId::new();
        Self {
            id,
            memory: Mutex::new(Memory::new(id, None)),
            #[cfg(feature = "parallel")]
            thread_pool: None,
        }
    }

    /// Create a context with a dedicated pool of `num_threads`
    #[cfg(feature = "parallel")]
    pub fn with_num_threads(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| crate::Error::Execution(format!("Failed to create thread pool: {e}")))?;

        Ok(Self {
            thread_pool: Some(Arc::new(pool)),
            ..Self::new()
        })
    }

    /// Create the context described by a configuration
    ///
    /// The pool gets `config.effective_threads()` threads, one per core
    /// unless `num_threads` is set.
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        #[cfg(feature = "parallel")]
        {
            config.validate()?;
            Self::with_num_threads(config.effective_threads())
        }
        #[cfg(not(feature = "parallel"))]
        {
            let _ = config;
            Ok(Self::new())
        }
    }

    /// Run `f` in this context's thread pool
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = &self.thread_pool {
                return pool.install(f);
            }
        }
        f()
    }
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for CpuContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn kind(&self) -> ContextKind {
        ContextKind::Host
    }

    fn name(&self) -> &str {
        "cpu"
    }

    fn num_threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            match &self.thread_pool {
                Some(pool) => pool.current_num_threads(),
                None => rayon::current_num_threads(),
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    fn allocate(&self, bytes: usize) -> Result<Buffer> {
        self.memory.lock().allocate(bytes)
    }

    fn release(&self, buffer: Buffer) -> Result<()> {
        self.memory.lock().release(&buffer)
    }

    fn write(&self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<Event> {
        self.memory.lock().write(buffer, offset, data)?;
        Ok(Event::completed(Ok(())))
    }

    fn read(&self, buffer: &Buffer, offset: usize, out: &mut [u8]) -> Result<()> {
        self.memory.lock().read(buffer, offset, out)
    }

    fn enqueue(&self, task: Task) -> Result<Event> {
        let mut memory = self.memory.lock();
        let memory: &mut Memory = &mut memory;
        let status = self.install(move || task(memory));
        Ok(Event::completed(status))
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}
