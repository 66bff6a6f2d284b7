//! Chunked linear sub-allocator over host-visible buffers: a
//! bump-allocate / submit-then-retire lifecycle with a default 64 MiB
//! chunk size and an oversize-dedicated-chunk fallback for transfers
//! larger than one chunk.

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use rhi_types::Timeline;

use super::memory::{AllocatedBuffer, MemoryAllocator};

pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;
pub const DEFAULT_ALIGNMENT: u64 = 256;

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

struct Chunk {
    buffer: AllocatedBuffer,
    mapped_ptr: *mut u8,
    offset: u64,
    /// Set by `submit`; chunks with no pending submission are in the
    /// free list, not this field.
    last_submission: u64,
}

// SAFETY: the mapped pointer is only touched while holding
// `StagingAllocator`'s mutex.
unsafe impl Send for Chunk {}

pub struct StagingAllocation {
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub size: u64,
    pub ptr: *mut u8,
}

struct Inner {
    free: Vec<Chunk>,
    in_flight: VecDeque<Chunk>,
    current: Option<Chunk>,
}

pub struct StagingAllocator {
    allocator: Arc<MemoryAllocator>,
    chunk_size: u64,
    inner: Mutex<Inner>,
}

impl StagingAllocator {
    pub fn new(allocator: Arc<MemoryAllocator>) -> Self {
        Self::with_chunk_size(allocator, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(allocator: Arc<MemoryAllocator>, chunk_size: u64) -> Self {
        Self {
            allocator,
            chunk_size,
            inner: Mutex::new(Inner {
                free: Vec::new(),
                in_flight: VecDeque::new(),
                current: None,
            }),
        }
    }

    fn create_chunk(&self, size: u64) -> anyhow::Result<Chunk> {
        let buffer = self.allocator.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            rhi_types::MemoryUsage::CpuToGpu,
            "staging-chunk",
        )?;
        let mapped_ptr = buffer
            .mapped_ptr()
            .ok_or_else(|| anyhow::anyhow!("staging chunk was not host-mapped"))?;
        Ok(Chunk {
            buffer,
            mapped_ptr,
            offset: 0,
            last_submission: 0,
        })
    }

    /// Aligns the current chunk's bump pointer and carves out `size`
    /// bytes, creating or recycling a chunk as needed. `size == 0` is a
    /// contract violation.
    pub fn allocate(&self, size: u64, alignment: u64) -> anyhow::Result<StagingAllocation> {
        assert!(size > 0, "zero-size staging allocation requested");
        let alignment = alignment.max(1);
        let mut inner = self.inner.lock();

        if let Some(chunk) = inner.current.as_mut() {
            let aligned = align_up(chunk.offset, alignment);
            if aligned + size <= chunk.buffer.size {
                chunk.offset = aligned + size;
                return Ok(StagingAllocation {
                    buffer: chunk.buffer.buffer,
                    offset: aligned,
                    size,
                    ptr: unsafe { chunk.mapped_ptr.add(aligned as usize) },
                });
            }
        }

        // Current chunk doesn't fit: stash it back as in-flight-less
        // free space isn't possible (it may still be referenced by a
        // pending submission), so park it and look for another.
        if let Some(old) = inner.current.take() {
            inner.free.push(old);
        }

        let needed = size.max(alignment);
        let reuse_index = inner
            .free
            .iter()
            .position(|c| c.buffer.size >= needed && c.offset == 0);
        let mut chunk = if let Some(index) = reuse_index {
            inner.free.remove(index)
        } else {
            self.create_chunk(self.chunk_size.max(size))?
        };

        let aligned = align_up(chunk.offset, alignment);
        chunk.offset = aligned + size;
        let allocation = StagingAllocation {
            buffer: chunk.buffer.buffer,
            offset: aligned,
            size,
            ptr: unsafe { chunk.mapped_ptr.add(aligned as usize) },
        };
        inner.current = Some(chunk);
        Ok(allocation)
    }

    /// Stamps whichever chunk is currently active with `submission` and
    /// moves it to the in-flight queue so `retire` can reclaim it once
    /// the issuing queue's timeline passes `submission`.
    pub fn submit(&self, submission: Timeline) {
        let mut inner = self.inner.lock();
        if let Some(mut chunk) = inner.current.take() {
            chunk.last_submission = submission.0;
            inner.in_flight.push_back(chunk);
        }
    }

    /// Pops chunks off the front of the in-flight queue while their
    /// stamped submission has completed, resetting each one's bump
    /// offset to 0 and returning it to the free list.
    pub fn retire(&self, completed: Timeline) {
        let mut inner = self.inner.lock();
        while let Some(front) = inner.in_flight.front() {
            if front.last_submission > completed.0 {
                break;
            }
            let mut chunk = inner.in_flight.pop_front().unwrap();
            chunk.offset = 0;
            chunk.last_submission = 0;
            inner.free.push(chunk);
        }
    }

    pub fn free_chunk_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    pub fn in_flight_chunk_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Destroys every chunk (free, in-flight, and current) regardless
    /// of outstanding submissions — callers must have already waited
    /// for the owning queue(s) to go idle.
    pub fn destroy_all(&self) {
        let mut inner = self.inner.lock();
        let mut chunks: Vec<_> = inner.free.drain(..).collect();
        chunks.extend(inner.in_flight.drain(..));
        chunks.extend(inner.current.take());
        for chunk in chunks {
            self.allocator.destroy_buffer(chunk.buffer);
        }
    }
}

impl Drop for StagingAllocator {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_next_multiple() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    /// Mirrors `retire`'s pop-while-completed loop over a minimal stand-in
    /// for `Chunk` — constructing a real `Chunk` needs a live device-backed
    /// `AllocatedBuffer`, which this crate's tests never touch.
    struct StampedChunk {
        last_submission: u64,
    }

    fn retire_stamped(queue: &mut VecDeque<StampedChunk>, completed: u64) -> usize {
        let mut retired = 0;
        while let Some(front) = queue.front() {
            if front.last_submission > completed {
                break;
            }
            queue.pop_front();
            retired += 1;
        }
        retired
    }

    #[test]
    fn retire_pops_only_completed_chunks_in_order() {
        let mut in_flight = VecDeque::new();
        in_flight.push_back(StampedChunk { last_submission: 1 });
        in_flight.push_back(StampedChunk { last_submission: 3 });

        let retired = retire_stamped(&mut in_flight, 2);
        assert_eq!(retired, 1);
        assert_eq!(in_flight.len(), 1);
    }

    #[test]
    fn retire_stops_at_first_incomplete_chunk() {
        let mut in_flight = VecDeque::new();
        in_flight.push_back(StampedChunk { last_submission: 5 });
        in_flight.push_back(StampedChunk { last_submission: 1 });

        let retired = retire_stamped(&mut in_flight, 10);
        assert_eq!(retired, 1);
        assert_eq!(in_flight.front().unwrap().last_submission, 1);
    }
}
