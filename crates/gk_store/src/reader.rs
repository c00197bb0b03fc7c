use gk_gpu::{BufferCopy, BufferId, GpuBackend};

use crate::error::StoreError;

/// One row's location, as recorded by the row directory: which buffer, at
/// what byte offset, for how many bytes.
#[derive(Debug, Clone, Copy)]
pub struct RowLocation {
    pub buffer: BufferId,
    pub offset: u64,
    pub length: u64,
}

/// Bulk-read rows scattered across (possibly many) chunk buffers in two
/// device round trips total, regardless of row count (C5, §4.5):
///
/// 1. One `copy_buffers` call scatters every row into a single contiguous
///    gather buffer.
/// 2. One more copy stages the gather buffer for host access, one `poll_wait`,
///    one `map_read`.
///
/// `locations[i] == None` is carried through untouched to `results[i]` so
/// callers can mix resolved and unresolved keys in one call without the
/// unresolved ones costing any device work.
pub fn gather_rows(
    backend: &dyn GpuBackend,
    label: &str,
    locations: &[Option<RowLocation>],
) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
    let resolved: Vec<(usize, RowLocation)> = locations
        .iter()
        .enumerate()
        .filter_map(|(i, loc)| loc.map(|loc| (i, loc)))
        .collect();

    if resolved.is_empty() {
        return Ok(locations.iter().map(|_| None).collect());
    }

    let mut gather_offsets = Vec::with_capacity(resolved.len());
    let mut cursor = 0u64;
    for (_, loc) in &resolved {
        gather_offsets.push(cursor);
        cursor += gk_gpu::round_up(loc.length, gk_gpu::ROW_ALIGNMENT);
    }
    let gather_size = cursor.max(1);

    let gather_buffer = backend.create_buffer(
        &format!("{label}-gather"),
        gather_size,
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
    );

    let scatter_copies: Vec<BufferCopy> = resolved
        .iter()
        .zip(&gather_offsets)
        .map(|((_, loc), &gather_offset)| BufferCopy {
            src: loc.buffer,
            src_offset: loc.offset,
            dst: gather_buffer,
            dst_offset: gather_offset,
            size: loc.length,
        })
        .collect();
    backend.copy_buffers(&scatter_copies)?;

    let staging = backend.create_buffer(
        &format!("{label}-gather-staging"),
        gather_size,
        wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
    );
    backend.copy_buffers(&[BufferCopy {
        src: gather_buffer,
        src_offset: 0,
        dst: staging,
        dst_offset: 0,
        size: gather_size,
    }])?;
    backend.poll_wait()?;
    let mapped = backend.map_read(staging, gather_size)?;
    backend.destroy_buffer(gather_buffer);
    backend.destroy_buffer(staging);

    let mut results: Vec<Option<Vec<u8>>> = locations.iter().map(|_| None).collect();
    for ((index, loc), gather_offset) in resolved.into_iter().zip(gather_offsets) {
        let start = gather_offset as usize;
        let end = start + loc.length as usize;
        results[index] = Some(mapped[start..end].to_vec());
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_gpu::fake::FakeBackend;

    #[test]
    fn gather_rows_preserves_order_and_unresolved_slots() {
        let backend = FakeBackend::new();
        let buffer = backend.create_buffer("rows", 4096, wgpu::BufferUsages::empty());
        backend.write_buffer(buffer, 0, b"hello...").unwrap();
        backend.write_buffer(buffer, 256, b"world!!!").unwrap();

        let locations = vec![
            Some(RowLocation {
                buffer,
                offset: 0,
                length: 8,
            }),
            None,
            Some(RowLocation {
                buffer,
                offset: 256,
                length: 8,
            }),
        ];
        let results = gather_rows(&backend, "test", &locations).unwrap();
        assert_eq!(results[0].as_deref(), Some(&b"hello..."[..]));
        assert!(results[1].is_none());
        assert_eq!(results[2].as_deref(), Some(&b"world!!!"[..]));
    }

    #[test]
    fn gather_rows_with_all_unresolved_does_no_device_work() {
        let backend = FakeBackend::new();
        let results = gather_rows(&backend, "test", &[None, None]).unwrap();
        assert_eq!(results, vec![None, None]);
    }
}
