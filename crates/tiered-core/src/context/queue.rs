//! Queue-based device context
//!
//! A reference device backend: device memory is an arena that only the
//! queue's worker thread touches while work runs, and every copy or task
//! is executed in submission order, asynchronously to the host. Real
//! accelerator backends implement [`ExecutionContext`] the same way around
//! their native queue.

use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use super::{Buffer, ContextId, ContextKind, Event, ExecutionContext, Memory, Task};
use crate::{Error, Result};

struct Job {
    task: Task,
    signal: Event,
}

#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Outstanding {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait_drained(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }
}

/// In-order asynchronous device queue
pub struct QueueContext {
    id: ContextId,
    name: String,
    memory: Arc<Mutex<Memory>>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    outstanding: Arc<Outstanding>,
}

impl QueueContext {
    /// Create a device with unbounded memory
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::build(name.into(), None)
    }

    /// Create a device with `capacity` bytes of memory
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Result<Self> {
        Self::build(name.into(), Some(capacity))
    }

    fn build(name: String, capacity: Option<usize>) -> Result<Self> {
        let id = ContextId::new();
        let memory = Arc::new(Mutex::new(Memory::new(id, capacity)));
        let outstanding = Arc::new(Outstanding::default());
        let (sender, receiver) = mpsc::channel::<Job>();

        let worker = {
            let memory = Arc::clone(&memory);
            let outstanding = Arc::clone(&outstanding);
            std::thread::Builder::new()
                .name(format!("tiered-queue-{name}"))
                .spawn(move || {
                    for job in receiver {
                        let status = {
                            let mut memory = memory.lock();
                            let task = job.task;
                            catch_unwind(AssertUnwindSafe(|| task(&mut memory))).unwrap_or_else(
                                |_| Err(Error::Execution("device task panicked".to_string())),
                            )
                        };
                        job.signal.complete(status);
                        outstanding.decrement();
                    }
                })?
        };

        log::debug!("Created device queue '{name}' ({id})");
        Ok(Self {
            id,
            name,
            memory,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            outstanding,
        })
    }

    fn submit_job(&self, task: Task) -> Result<Event> {
        let event = Event::pending();
        let job = Job {
            task,
            signal: event.signal(),
        };

        let sender = self.sender.lock();
        let sender = sender
            .as_ref()
            .ok_or_else(|| Error::Execution(format!("device queue '{}' is shut down", self.name)))?;
        self.outstanding.increment();
        if sender.send(job).is_err() {
            self.outstanding.decrement();
            return Err(Error::Execution(format!(
                "device queue '{}' worker has stopped",
                self.name
            )));
        }
        Ok(event)
    }

    /// Bytes of device memory currently allocated
    pub fn allocated_bytes(&self) -> usize {
        self.memory.lock().allocated_bytes()
    }

    /// Work submitted but not yet completed
    pub fn pending_tasks(&self) -> usize {
        *self.outstanding.count.lock()
    }
}

impl std::fmt::Debug for QueueContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

impl ExecutionContext for QueueContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn kind(&self) -> ContextKind {
        ContextKind::Device
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn allocate(&self, bytes: usize) -> Result<Buffer> {
        self.memory.lock().allocate(bytes)
    }

    fn release(&self, buffer: Buffer) -> Result<()> {
        self.memory.lock().release(&buffer)
    }

    fn write(&self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<Event> {
        let target = buffer.clone();
        let staged = data.to_vec();
        self.submit_job(Box::new(move |memory: &mut Memory| {
            memory.write(&target, offset, &staged)
        }))
    }

    fn read(&self, buffer: &Buffer, offset: usize, out: &mut [u8]) -> Result<()> {
        let source = buffer.clone();
        let staged = Arc::new(Mutex::new(vec![0u8; out.len()]));
        let sink = Arc::clone(&staged);
        self.submit_job(Box::new(move |memory: &mut Memory| {
            memory.read(&source, offset, &mut sink.lock())
        }))?
        .wait()?;
        out.copy_from_slice(&staged.lock());
        Ok(())
    }

    fn enqueue(&self, task: Task) -> Result<Event> {
        self.submit_job(task)
    }

    fn synchronize(&self) -> Result<()> {
        self.outstanding.wait_drained();
        Ok(())
    }
}

impl Drop for QueueContext {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain queued work and exit
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::error!("Device queue '{}' worker panicked", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextExt;
    use std::time::Duration;

    #[test]
    fn test_work_runs_in_submission_order() {
        let device = QueueContext::new("test").unwrap();
        let buffer = device.upload(&[0.0f64; 4]).unwrap();

        for step in 1..=3 {
            let target = buffer.clone();
            device
                .submit(move |memory| {
                    let values = memory.slice_mut::<f64>(&target)?;
                    for x in values.iter_mut() {
                        *x = *x * 10.0 + step as f64;
                    }
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(device.download::<f64>(&buffer).unwrap(), vec![123.0; 4]);
    }

    #[test]
    fn test_enqueue_is_asynchronous() {
        let device = QueueContext::new("async").unwrap();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let remote = Arc::clone(&gate);

        let event = device
            .submit(move |_| {
                let (open, cv) = &*remote;
                let mut open = open.lock();
                while !*open {
                    cv.wait(&mut open);
                }
                Ok(())
            })
            .unwrap();

        // The host returned while the task is blocked on the gate
        std::thread::sleep(Duration::from_millis(5));
        assert!(!event.is_complete());
        assert_eq!(device.pending_tasks(), 1);

        let (open, cv) = &*gate;
        *open.lock() = true;
        cv.notify_all();

        event.wait().unwrap();
        device.synchronize().unwrap();
        assert_eq!(device.pending_tasks(), 0);
    }

    #[test]
    fn test_task_error_and_panic_status() {
        let device = QueueContext::new("errors").unwrap();
        let failing = device
            .submit(|_| Err(Error::Computation("not positive definite".into())))
            .unwrap();
        assert!(matches!(failing.wait(), Err(Error::Computation(_))));

        let panicking = device.submit(|_| panic!("kernel bug")).unwrap();
        assert!(matches!(panicking.wait(), Err(Error::Execution(_))));

        // The queue keeps serving work after a panic
        let buffer = device.upload(&[7u32]).unwrap();
        assert_eq!(device.download::<u32>(&buffer).unwrap(), vec![7]);
    }

    #[test]
    fn test_capacity_and_ownership() {
        let device = QueueContext::with_capacity("small", 16).unwrap();
        let buffer = device.allocate(16).unwrap();
        assert!(matches!(device.allocate(1), Err(Error::Memory(_))));
        assert_eq!(device.allocated_bytes(), 16);
        device.release(buffer).unwrap();
        assert_eq!(device.allocated_bytes(), 0);

        let _held = device.allocate(8).unwrap();
        assert!(matches!(device.allocate(usize::MAX), Err(Error::Memory(_))));
        assert_eq!(device.allocated_bytes(), 8);

        let other = QueueContext::new("other").unwrap();
        let foreign = other.allocate(8).unwrap();
        assert!(device.write(&foreign, 0, &[0u8; 8]).unwrap().wait().is_err());
    }

    #[test]
    fn test_task_uses_scratch_from_its_memory() {
        let device = QueueContext::new("scratch").unwrap();
        let input = device.upload(&[1.0f64, 2.0, 3.0]).unwrap();
        let output = device.allocate(8).unwrap();

        let (source, target) = (input.clone(), output.clone());
        device
            .submit(move |memory| {
                let scratch = memory.allocate(24)?;
                let doubled: Vec<f64> = memory.slice::<f64>(&source)?.iter().map(|x| x * 2.0).collect();
                memory.slice_mut::<f64>(&scratch)?.copy_from_slice(&doubled);
                let total = memory.slice::<f64>(&scratch)?.iter().sum::<f64>();
                memory.slice_mut::<f64>(&target)?[0] = total;
                memory.release(&scratch)
            })
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(device.download::<f64>(&output).unwrap(), vec![12.0]);
        assert_eq!(device.allocated_bytes(), 32);
    }

    #[test]
    fn test_drop_drains_queue() {
        let observed = Arc::new(Mutex::new(0usize));
        {
            let device = QueueContext::new("drain").unwrap();
            for _ in 0..10 {
                let observed = Arc::clone(&observed);
                device
                    .submit(move |_| {
                        *observed.lock() += 1;
                        Ok(())
                    })
                    .unwrap();
            }
        }
        assert_eq!(*observed.lock(), 10);
    }
}
