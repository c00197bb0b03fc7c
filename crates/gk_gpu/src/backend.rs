use crate::error::DeviceError;

/// An opaque handle to a device-side buffer.
///
/// Handles are assigned by a [`GpuBackend`] and are only meaningful to the
/// backend that issued them; nothing above this crate inspects their value.
pub type BufferId = u64;

/// One `src[src_offset..src_offset+size] -> dst[dst_offset..dst_offset+size]`
/// device-to-device copy, as submitted in a single command encoder by the
/// bulk reader (C5) and the flush engine.
#[derive(Debug, Clone, Copy)]
pub struct BufferCopy {
    pub src: BufferId,
    pub src_offset: u64,
    pub dst: BufferId,
    pub dst_offset: u64,
    pub size: u64,
}

/// One bitonic compare-and-swap pass over a sort-item buffer.
///
/// Mirrors the `params` uniform bound at binding 1 of the bitonic compute
/// shader (see `crates/gk_gpu/src/shader/bitonic_sort.wgsl`).
#[derive(Debug, Clone, Copy)]
pub struct BitonicPassParams {
    pub row_count: u32,
    pub padded_count: u32,
    pub fields_per_item: u32,
    pub size: u32,
    pub half_size: u32,
}

/// The narrow device surface the rest of this crate needs: buffer lifetime,
/// host-to-device writes, device-to-device copies, one host readback, and one
/// compute dispatch shape (the bitonic pass).
///
/// This is deliberately not `wgpu::Device`/`wgpu::Queue` themselves, both so a
/// software stand-in can run the test suite without a physical adapter (see
/// [`crate::fake::FakeBackend`]) and so every caller above this crate talks in
/// terms of the operations §4 of the specification actually performs, not the
/// full generality of the `wgpu` API.
pub trait GpuBackend: Send + Sync + std::fmt::Debug {
    /// Create a new device buffer and return a handle to it.
    fn create_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> BufferId;

    /// Destroy a previously created buffer. Idempotent: destroying an unknown
    /// or already-destroyed handle is a no-op, matching `wgpu::Buffer::destroy`.
    fn destroy_buffer(&self, buffer: BufferId);

    /// Host-to-device write, `wgpu::Queue::write_buffer` on the real backend.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// Submit a batch of device-to-device copies in a single command encoder.
    fn copy_buffers(&self, copies: &[BufferCopy]) -> Result<(), DeviceError>;

    /// Map `buffer` for host read, copy its contents out, and unmap it.
    fn map_read(&self, buffer: BufferId, size: u64) -> Result<Vec<u8>, DeviceError>;

    /// Block until all previously submitted device work has completed.
    fn poll_wait(&self) -> Result<(), DeviceError>;

    /// `wgpu::Limits::max_storage_buffer_binding_size`, used by the sort
    /// engine's device-limit guard (§4.6).
    fn max_storage_buffer_binding_size(&self) -> u64;

    /// Run one bitonic compare-and-swap pass over `items`, in place.
    fn run_bitonic_pass(&self, items: BufferId, params: BitonicPassParams) -> Result<(), DeviceError>;
}
