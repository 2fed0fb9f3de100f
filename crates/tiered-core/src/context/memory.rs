//! Context-owned memory arenas

use bytemuck::Pod;
use std::collections::HashMap;

use super::ContextId;
use crate::{Error, Result};

/// Handle to an allocation owned by one context
///
/// A buffer is only meaningful to the context that allocated it; passing it
/// to another context fails with [`Error::Memory`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Buffer {
    id: u64,
    len: usize,
    context: ContextId,
}

impl Buffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The context that owns this buffer
    pub fn context(&self) -> ContextId {
        self.context
    }
}

#[derive(Debug)]
struct Block {
    // u64 words keep every block 8-byte aligned for f32/f64 views
    words: Vec<u64>,
    len: usize,
}

/// Memory arena of a context
///
/// Tasks receive `&mut Memory` while they run, which is the only way to
/// touch buffer contents from kernel code.
#[derive(Debug)]
pub struct Memory {
    owner: ContextId,
    capacity: Option<usize>,
    used: usize,
    next_id: u64,
    blocks: HashMap<u64, Block>,
}

impl Memory {
    pub(crate) fn new(owner: ContextId, capacity: Option<usize>) -> Self {
        Self {
            owner,
            capacity,
            used: 0,
            next_id: 1,
            blocks: HashMap::new(),
        }
    }

    /// Bytes currently allocated
    pub fn allocated_bytes(&self) -> usize {
        self.used
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.blocks.len()
    }

    /// Allocate `bytes` of zeroed memory, usable from inside a task
    pub fn allocate(&mut self, bytes: usize) -> Result<Buffer> {
        let used = self
            .used
            .checked_add(bytes)
            .ok_or_else(|| Error::Memory(format!("cannot allocate {bytes} bytes: size overflow")))?;
        if let Some(capacity) = self.capacity {
            if used > capacity {
                return Err(Error::Memory(format!(
                    "cannot allocate {bytes} bytes: {} of {capacity} bytes in use",
                    self.used
                )));
            }
        }

        let mut words = Vec::new();
        words
            .try_reserve_exact(bytes.div_ceil(8))
            .map_err(|e| Error::Memory(format!("cannot allocate {bytes} bytes: {e}")))?;
        words.resize(bytes.div_ceil(8), 0u64);

        let id = self.next_id;
        self.next_id += 1;
        self.blocks.insert(id, Block { words, len: bytes });
        self.used = used;
        Ok(Buffer {
            id,
            len: bytes,
            context: self.owner,
        })
    }

    pub fn release(&mut self, buffer: &Buffer) -> Result<()> {
        self.check_owner(buffer)?;
        let block = self
            .blocks
            .remove(&buffer.id)
            .ok_or_else(|| released(buffer))?;
        self.used -= block.len;
        Ok(())
    }

    fn check_owner(&self, buffer: &Buffer) -> Result<()> {
        if buffer.context != self.owner {
            return Err(Error::Memory(format!(
                "buffer {} belongs to context {}, not {}",
                buffer.id, buffer.context, self.owner
            )));
        }
        Ok(())
    }

    fn block(&self, buffer: &Buffer) -> Result<&Block> {
        self.check_owner(buffer)?;
        self.blocks.get(&buffer.id).ok_or_else(|| released(buffer))
    }

    fn block_mut(&mut self, buffer: &Buffer) -> Result<&mut Block> {
        self.check_owner(buffer)?;
        self.blocks.get_mut(&buffer.id).ok_or_else(|| released(buffer))
    }

    /// Raw contents of a buffer
    pub fn bytes(&self, buffer: &Buffer) -> Result<&[u8]> {
        let block = self.block(buffer)?;
        Ok(&bytemuck::cast_slice::<u64, u8>(&block.words)[..block.len])
    }

    /// Mutable raw contents of a buffer
    pub fn bytes_mut(&mut self, buffer: &Buffer) -> Result<&mut [u8]> {
        let block = self.block_mut(buffer)?;
        let len = block.len;
        Ok(&mut bytemuck::cast_slice_mut::<u64, u8>(&mut block.words)[..len])
    }

    /// View a buffer as a slice of `T`
    pub fn slice<T: Pod>(&self, buffer: &Buffer) -> Result<&[T]> {
        let block = self.block(buffer)?;
        let count = element_count::<T>(block.len)?;
        let all = bytemuck::try_cast_slice::<u64, T>(&block.words)
            .map_err(|e| Error::Memory(format!("cannot view buffer {}: {e}", buffer.id)))?;
        Ok(&all[..count])
    }

    /// View a buffer as a mutable slice of `T`
    pub fn slice_mut<T: Pod>(&mut self, buffer: &Buffer) -> Result<&mut [T]> {
        let id = buffer.id;
        let block = self.block_mut(buffer)?;
        let count = element_count::<T>(block.len)?;
        let all = bytemuck::try_cast_slice_mut::<u64, T>(&mut block.words)
            .map_err(|e| Error::Memory(format!("cannot view buffer {id}: {e}")))?;
        Ok(&mut all[..count])
    }

    pub(crate) fn write(&mut self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<()> {
        let bytes = self.bytes_mut(buffer)?;
        let range = checked_range(offset, data.len(), bytes.len())?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn read(&self, buffer: &Buffer, offset: usize, out: &mut [u8]) -> Result<()> {
        let bytes = self.bytes(buffer)?;
        let range = checked_range(offset, out.len(), bytes.len())?;
        out.copy_from_slice(&bytes[range]);
        Ok(())
    }
}

fn released(buffer: &Buffer) -> Error {
    Error::Memory(format!("buffer {} was released", buffer.id))
}

fn element_count<T>(len: usize) -> Result<usize> {
    let size = std::mem::size_of::<T>();
    if size == 0 || len % size != 0 {
        return Err(Error::Memory(format!(
            "{len} bytes is not a whole number of {size}-byte elements"
        )));
    }
    Ok(len / size)
}

fn checked_range(offset: usize, count: usize, len: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(Error::Memory(format!(
            "access of {count} bytes at offset {offset} exceeds buffer of {len} bytes"
        ))),
    }
}
