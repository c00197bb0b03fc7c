use std::sync::Arc;

use crate::backend::{BufferId, GpuBackend};

/// Every row slot starts at a multiple of this many bytes.
///
/// Chosen to satisfy the alignment requirements of every [`gk_codec::ElementKind`]
/// this crate supports (the widest is 8 bytes) with generous headroom, matching
/// the 256-byte row alignment the specification mandates.
pub const ROW_ALIGNMENT: u64 = 256;

#[inline]
pub fn round_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// One device buffer in a store's append-only chunk list.
///
/// `used_bytes` is a high-water mark: it only ever grows, even when rows
/// inside the chunk are later marked inactive. There is no free list.
#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    pub index: u32,
    pub buffer: BufferId,
    pub capacity: u64,
    pub used_bytes: u64,
    pub row_count: u32,
}

/// Where a newly allocated row landed.
#[derive(Debug, Clone, Copy)]
pub struct Allocation {
    pub chunk_index: u32,
    pub buffer: BufferId,
    pub offset: u64,
}

/// Bump-style allocator over one store's chunk list (C2).
///
/// Packs variable-length rows into a growing sequence of device buffers.
/// Never reclaims space within a chunk; a full chunk is simply abandoned in
/// favor of a new one. The only way bytes are freed is [`ChunkAllocator::clear`],
/// which destroys every chunk and starts over.
#[derive(Debug)]
pub struct ChunkAllocator {
    backend: Arc<dyn GpuBackend>,
    label: String,
    default_capacity: u64,
    usage: wgpu::BufferUsages,
    chunks: Vec<Chunk>,
}

impl ChunkAllocator {
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        label: impl Into<String>,
        default_capacity: u64,
        usage: wgpu::BufferUsages,
    ) -> Self {
        Self {
            backend,
            label: label.into(),
            default_capacity,
            usage: usage | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            chunks: Vec::new(),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: u32) -> Option<&Chunk> {
        self.chunks.get(index as usize)
    }

    /// Implements the three-step algorithm of §4.2: reuse tail space in the
    /// last chunk if it fits, otherwise start a new chunk.
    pub fn allocate(&mut self, required_bytes: u64) -> Allocation {
        if let Some(last) = self.chunks.last_mut() {
            let aligned = round_up(last.used_bytes, ROW_ALIGNMENT);
            if aligned + required_bytes <= last.capacity {
                last.used_bytes = round_up(aligned + required_bytes, ROW_ALIGNMENT);
                last.row_count += 1;
                return Allocation {
                    chunk_index: last.index,
                    buffer: last.buffer,
                    offset: aligned,
                };
            }
        }

        let capacity = self
            .default_capacity
            .max(round_up(required_bytes, ROW_ALIGNMENT));
        let index = self.chunks.len() as u32;
        let buffer = self.backend.create_buffer(
            &format!("{}-chunk-{index}", self.label),
            capacity,
            self.usage,
        );
        self.chunks.push(Chunk {
            index,
            buffer,
            capacity,
            used_bytes: round_up(required_bytes, ROW_ALIGNMENT),
            row_count: 1,
        });
        Allocation {
            chunk_index: index,
            buffer,
            offset: 0,
        }
    }

    /// Create an empty chunk of the default capacity without consuming any
    /// of it, used by `clear(store)` (§4.7) to leave the store immediately
    /// writable after destroying everything it had.
    pub fn allocate_empty_chunk(&mut self) -> Allocation {
        let index = self.chunks.len() as u32;
        let buffer = self.backend.create_buffer(
            &format!("{}-chunk-{index}", self.label),
            self.default_capacity,
            self.usage,
        );
        self.chunks.push(Chunk {
            index,
            buffer,
            capacity: self.default_capacity,
            used_bytes: 0,
            row_count: 0,
        });
        Allocation {
            chunk_index: index,
            buffer,
            offset: 0,
        }
    }

    /// Destroy every chunk and drop them from the list. The store coordinator
    /// is responsible for immediately allocating a fresh chunk afterwards if
    /// the caller expects the store to remain writable (`clear(store)`, §4.7).
    pub fn clear(&mut self) {
        for chunk in self.chunks.drain(..) {
            self.backend.destroy_buffer(chunk.buffer);
        }
    }
}
