//! An in-process stand-in for a real GPU, implementing [`GpuBackend`] over
//! plain host memory.
//!
//! Lets the rest of the workspace run its full test suite without a physical
//! adapter, the same way this codebase's renderer crates support a headless
//! software adapter for CI. The bitonic pass is executed on the CPU against
//! the same byte layout the real shader operates on, so a test that sorts
//! through [`FakeBackend`] exercises the identical comparison/swap logic the
//! compute shader performs on device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{BitonicPassParams, BufferCopy, BufferId, GpuBackend};
use crate::error::DeviceError;

#[derive(Debug, Default)]
pub struct FakeBackend {
    buffers: RwLock<std::collections::HashMap<BufferId, Vec<u8>>>,
    next_id: AtomicU64,
    max_storage_binding_size: u64,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            buffers: RwLock::new(std::collections::HashMap::new()),
            next_id: AtomicU64::new(1),
            // A generous stand-in for a real device's storage binding limit;
            // tests that want to exercise the device-limit guard override it.
            max_storage_binding_size: 128 * 1024 * 1024,
        }
    }

    pub fn with_max_storage_binding_size(max: u64) -> Self {
        Self {
            max_storage_binding_size: max,
            ..Self::new()
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl GpuBackend for FakeBackend {
    fn create_buffer(&self, _label: &str, size: u64, _usage: wgpu::BufferUsages) -> BufferId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.buffers.write().insert(id, vec![0u8; size as usize]);
        id
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        self.buffers.write().remove(&buffer);
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let mut buffers = self.buffers.write();
        let bytes = buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::UnknownBuffer(buffer))?;
        let offset = offset as usize;
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn copy_buffers(&self, copies: &[BufferCopy]) -> Result<(), DeviceError> {
        let mut buffers = self.buffers.write();
        for copy in copies {
            let src_bytes = buffers
                .get(&copy.src)
                .ok_or(DeviceError::UnknownBuffer(copy.src))?
                [copy.src_offset as usize..(copy.src_offset + copy.size) as usize]
                .to_vec();
            let dst = buffers
                .get_mut(&copy.dst)
                .ok_or(DeviceError::UnknownBuffer(copy.dst))?;
            let dst_offset = copy.dst_offset as usize;
            dst[dst_offset..dst_offset + copy.size as usize].copy_from_slice(&src_bytes);
        }
        Ok(())
    }

    fn map_read(&self, buffer: BufferId, size: u64) -> Result<Vec<u8>, DeviceError> {
        let buffers = self.buffers.read();
        let bytes = buffers
            .get(&buffer)
            .ok_or(DeviceError::UnknownBuffer(buffer))?;
        Ok(bytes[..size as usize].to_vec())
    }

    fn poll_wait(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn max_storage_buffer_binding_size(&self) -> u64 {
        self.max_storage_binding_size
    }

    fn run_bitonic_pass(&self, items: BufferId, params: BitonicPassParams) -> Result<(), DeviceError> {
        let mut buffers = self.buffers.write();
        let bytes = buffers
            .get_mut(&items)
            .ok_or(DeviceError::UnknownBuffer(items))?;
        let words: &mut [u32] = bytemuck::cast_slice_mut(bytes);

        let stride = 1 + params.fields_per_item as usize;
        for i in 0..params.padded_count {
            let mate = i ^ params.half_size;
            if mate <= i || mate >= params.padded_count {
                continue;
            }
            if i >= params.row_count || mate >= params.row_count {
                continue;
            }

            let base_i = i as usize * stride;
            let base_mate = mate as usize * stride;

            let key_i = &words[base_i + 1..base_i + stride];
            let key_mate = &words[base_mate + 1..base_mate + stride];
            let ascending = i & params.size == 0;
            let should_swap = if ascending {
                key_i > key_mate
            } else {
                key_i < key_mate
            };
            if should_swap {
                for w in 0..stride {
                    words.swap(base_i + w, base_mate + w);
                }
            }
        }
        Ok(())
    }
}
