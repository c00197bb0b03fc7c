//! The real [`GpuBackend`], backed by an opened `wgpu::Device`/`wgpu::Queue`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use wgpu::util::DeviceExt as _;

use crate::backend::{BitonicPassParams, BufferCopy, BufferId, GpuBackend};
use crate::error::DeviceError;

const BITONIC_SHADER: &str = include_str!("shader/bitonic_sort.wgsl");

/// Opens a device and compiles the bitonic-sort pipeline once, at construction.
///
/// Mirrors the one-time pipeline-compilation pattern this codebase's
/// wgpu-based renderer crate uses for its render pipelines: the pipeline and
/// its bind group layout are built exactly once and reused by every store's
/// sort engine (§4.8).
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: RwLock<HashMap<BufferId, wgpu::Buffer>>,
    next_id: AtomicU64,
    bitonic_pipeline: wgpu::ComputePipeline,
    bitonic_bind_group_layout: wgpu::BindGroupLayout,
    max_storage_buffer_binding_size: u64,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("buffers", &self.buffers.read().len())
            .finish()
    }
}

impl WgpuBackend {
    /// Opens the default adapter/device pair and compiles the bitonic shader.
    ///
    /// Blocking: internally drives `wgpu`'s async adapter/device request with
    /// [`pollster::block_on`], since construction of a [`crate::GpuBackend`]
    /// is a one-time, synchronous step in this crate's API (`GpuKvEngine::new`).
    pub fn new() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|_| {
            gk_log::error!("no wgpu adapter available for gpukv device");
            DeviceError::NoAdapter
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("gpukv device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|err| {
            gk_log::error!("failed to open wgpu device: {err}");
            DeviceError::RequestDevice(err)
        })?;

        gk_log::info!("opened wgpu adapter {:?}", adapter.get_info().name);
        Self::from_device(device, queue)
    }

    /// Wraps an already-opened device/queue pair, for callers that manage
    /// adapter selection themselves (surface-bound apps, test harnesses that
    /// still want a real (if software) adapter).
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, DeviceError> {
        let max_storage_buffer_binding_size =
            device.limits().max_storage_buffer_binding_size as u64;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gpukv bitonic sort bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gpukv bitonic sort pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gpukv bitonic sort shader"),
            source: wgpu::ShaderSource::Wgsl(BITONIC_SHADER.into()),
        });

        let bitonic_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("gpukv bitonic sort pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            buffers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            bitonic_pipeline,
            bitonic_bind_group_layout: bind_group_layout,
            max_storage_buffer_binding_size,
        })
    }
}

impl GpuBackend for WgpuBackend {
    fn create_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> BufferId {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.buffers.write().insert(id, buffer);
        id
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.write().remove(&buffer) {
            buffer.destroy();
        }
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffers = self.buffers.read();
        let buffer = buffers
            .get(&buffer)
            .ok_or(DeviceError::UnknownBuffer(buffer))?;
        self.queue.write_buffer(buffer, offset, data);
        Ok(())
    }

    fn copy_buffers(&self, copies: &[BufferCopy]) -> Result<(), DeviceError> {
        let buffers = self.buffers.read();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpukv copy encoder"),
            });
        for copy in copies {
            let src = buffers
                .get(&copy.src)
                .ok_or(DeviceError::UnknownBuffer(copy.src))?;
            let dst = buffers
                .get(&copy.dst)
                .ok_or(DeviceError::UnknownBuffer(copy.dst))?;
            encoder.copy_buffer_to_buffer(src, copy.src_offset, dst, copy.dst_offset, copy.size);
        }
        drop(buffers);
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn map_read(&self, buffer_id: BufferId, size: u64) -> Result<Vec<u8>, DeviceError> {
        let buffers = self.buffers.read();
        let buffer = buffers
            .get(&buffer_id)
            .ok_or(DeviceError::UnknownBuffer(buffer_id))?;
        let slice = buffer.slice(..size);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait).map_err(|err| {
            DeviceError::DeviceLost(format!("poll while mapping buffer failed: {err}"))
        })?;
        rx.recv()
            .map_err(|_| DeviceError::MapFailed {
                buffer: buffer_id,
                reason: "map callback channel closed before firing".to_owned(),
            })?
            .map_err(|err| DeviceError::MapFailed {
                buffer: buffer_id,
                reason: err.to_string(),
            })?;

        let data = slice.get_mapped_range().to_vec();
        drop(slice);
        buffer.unmap();
        Ok(data)
    }

    fn poll_wait(&self) -> Result<(), DeviceError> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|err| DeviceError::DeviceLost(err.to_string()))
    }

    fn max_storage_buffer_binding_size(&self) -> u64 {
        self.max_storage_buffer_binding_size
    }

    fn run_bitonic_pass(&self, items: BufferId, params: BitonicPassParams) -> Result<(), DeviceError> {
        let buffers = self.buffers.read();
        let items_buffer = buffers
            .get(&items)
            .ok_or(DeviceError::UnknownBuffer(items))?;

        #[repr(C)]
        #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
        struct ShaderParams {
            size: u32,
            half_size: u32,
            row_count: u32,
            padded_count: u32,
            fields_per_item: u32,
            _pad: [u32; 3],
        }
        let shader_params = ShaderParams {
            size: params.size,
            half_size: params.half_size,
            row_count: params.row_count,
            padded_count: params.padded_count,
            fields_per_item: params.fields_per_item,
            _pad: [0; 3],
        };
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("gpukv bitonic pass params"),
                contents: bytemuck::bytes_of(&shader_params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let debug_swapped = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gpukv bitonic debug_swapped"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: true,
        });
        debug_swapped
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(&0u32.to_ne_bytes());
        debug_swapped.unmap();

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gpukv bitonic sort bind group"),
            layout: &self.bitonic_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: items_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: debug_swapped.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpukv bitonic pass encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("gpukv bitonic pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.bitonic_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let workgroups = params.padded_count.div_ceil(256);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        drop(buffers);
        self.queue.submit(Some(encoder.finish()));
        debug_swapped.destroy();

        Ok(())
    }
}
