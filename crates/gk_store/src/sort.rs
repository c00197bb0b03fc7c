use bytemuck::cast_slice;
use gk_codec::SortDefinition;
use gk_gpu::{next_power_of_two, BitonicPassParams, ChunkAllocator, GpuBackend};

use crate::error::StoreError;
use crate::reader::{gather_rows, RowLocation};
use crate::row::{RowDirectory, RowId};

/// Rebuild the ordered row-id sequence for one sort definition on one store
/// (C6), run after a flush of a JSON store whose sorts-dirty flag is set.
///
/// `offsets_directory`/`offsets_chunks` belong to the store's `<name>-offsets`
/// companion; `primary_directory` is the JSON store's own row directory,
/// consulted only to resolve each offsets row's owning primary row id.
///
/// Returns `Ok(None)` (and logs a warning) when the definition's item array
/// would exceed the device's storage binding limit — sorting is skipped and
/// the caller keeps whatever order it had cached.
pub fn rebuild_sort_order(
    backend: &dyn GpuBackend,
    store_name: &str,
    definition: &SortDefinition,
    primary_directory: &RowDirectory,
    offsets_directory: &RowDirectory,
    offsets_chunks: &ChunkAllocator,
) -> Result<Option<Vec<RowId>>, StoreError> {
    let suffix = format!("::{}", definition.name);
    let mut locations = Vec::new();
    let mut primary_keys = Vec::new();
    for key in offsets_directory.keys_in_order() {
        let Some(primary_key) = key.strip_suffix(&suffix) else {
            continue;
        };
        let Some(record) = offsets_directory.find_active(key) else {
            continue;
        };
        let Some(chunk) = offsets_chunks.chunk(record.chunk_index) else {
            continue;
        };
        locations.push(Some(RowLocation {
            buffer: chunk.buffer,
            offset: record.offset,
            length: record.length,
        }));
        primary_keys.push(primary_key.to_owned());
    }

    let row_count = locations.len() as u32;
    if row_count == 0 {
        return Ok(Some(Vec::new()));
    }

    let rows = gather_rows(backend, &format!("{store_name}-sort-{}", definition.name), &locations)?;

    let fields_per_item = definition.words_per_row() as u32;
    let stride = 1 + fields_per_item as usize;
    let padded_count = next_power_of_two(row_count);

    let item_bytes = padded_count as u64 * stride as u64 * 4;
    let limit = backend.max_storage_buffer_binding_size();
    if item_bytes > limit {
        gk_log::warn_once!(
            "sort definition {:?} on store {store_name:?} needs {item_bytes} bytes, exceeding the device's {limit}-byte storage binding limit; keeping previous order",
            definition.name
        );
        return Ok(None);
    }

    let mut words = vec![0u32; padded_count as usize * stride];
    for (index, (row, primary_key)) in rows.into_iter().zip(&primary_keys).enumerate() {
        let Some(bytes) = row else { continue };
        let Some(primary_row) = primary_directory.find_active(primary_key) else {
            continue;
        };
        let field_words: &[u32] = cast_slice(&bytes);
        let base = index * stride;
        words[base] = primary_row.row_id;
        words[base + 1..base + 1 + fields_per_item as usize]
            .copy_from_slice(&field_words[..fields_per_item as usize]);
    }

    let items_buffer = backend.create_buffer(
        &format!("{store_name}-sort-{}-items", definition.name),
        item_bytes,
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
    );
    backend.write_buffer(items_buffer, 0, cast_slice(&words))?;

    let mut size = 2u32;
    while size <= padded_count {
        let mut half_size = size / 2;
        while half_size >= 1 {
            backend.run_bitonic_pass(
                items_buffer,
                BitonicPassParams {
                    row_count,
                    padded_count,
                    fields_per_item,
                    size,
                    half_size,
                },
            )?;
            half_size /= 2;
        }
        size *= 2;
    }

    backend.poll_wait()?;
    let sorted_bytes = backend.map_read(items_buffer, item_bytes)?;
    backend.destroy_buffer(items_buffer);
    let sorted_words: &[u32] = cast_slice(&sorted_bytes);

    let mut ordered = Vec::with_capacity(row_count as usize);
    for i in 0..row_count as usize {
        ordered.push(sorted_words[i * stride]);
    }
    Ok(Some(ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::WriteMode;
    use gk_codec::{DataKind, SortDirection, SortField};
    use gk_gpu::fake::FakeBackend;
    use gk_gpu::ROW_ALIGNMENT;

    fn field(path: &str) -> SortField {
        SortField {
            path: path.to_owned(),
            kind: DataKind::Number,
            direction: SortDirection::Ascending,
        }
    }

    /// Writes one offsets row for `primary_key` holding `words` and records it
    /// in both directories the way the store coordinator would.
    fn seed_row(
        backend: &dyn GpuBackend,
        primary_dir: &mut RowDirectory,
        offsets_dir: &mut RowDirectory,
        offsets_chunks: &mut ChunkAllocator,
        def_name: &str,
        primary_key: &str,
        words: &[u32],
    ) {
        primary_dir
            .plan_update(primary_key, 4, WriteMode::Add)
            .unwrap();
        primary_dir.commit_allocate(primary_key, 0, 0, 4);

        let bytes: &[u8] = cast_slice(words);
        let offsets_key = format!("{primary_key}::{def_name}");
        let alloc = offsets_chunks.allocate(bytes.len() as u64);
        backend.write_buffer(alloc.buffer, alloc.offset, bytes).unwrap();
        offsets_dir.commit_allocate(
            &offsets_key,
            alloc.chunk_index,
            alloc.offset,
            bytes.len() as u64,
        );
    }

    #[test]
    fn rebuild_sort_order_yields_ascending_permutation() {
        let backend = std::sync::Arc::new(FakeBackend::new());
        let mut primary_dir = RowDirectory::new();
        let mut offsets_dir = RowDirectory::new();
        let mut offsets_chunks = ChunkAllocator::new(
            backend.clone(),
            "offsets",
            ROW_ALIGNMENT * 64,
            wgpu::BufferUsages::empty(),
        );

        let definition = SortDefinition {
            name: "by_age".to_owned(),
            fields: vec![field("age")],
        };

        let ages: [(&str, u32); 4] = [("d", 40), ("b", 10), ("a", 5), ("c", 20)];
        for (key, age) in ages {
            seed_row(
                backend.as_ref(),
                &mut primary_dir,
                &mut offsets_dir,
                &mut offsets_chunks,
                &definition.name,
                key,
                &[0, age],
            );
        }

        let ordered = rebuild_sort_order(
            backend.as_ref(),
            "people",
            &definition,
            &primary_dir,
            &offsets_dir,
            &offsets_chunks,
        )
        .unwrap()
        .unwrap();

        assert_eq!(ordered.len(), 4);
        let ordered_keys: Vec<&str> = ordered
            .iter()
            .map(|&row_id| primary_dir.key_for_row(row_id).unwrap())
            .collect();
        assert_eq!(ordered_keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn oversized_definition_is_skipped_not_fatal() {
        let backend = std::sync::Arc::new(FakeBackend::with_max_storage_binding_size(8));
        let mut primary_dir = RowDirectory::new();
        let mut offsets_dir = RowDirectory::new();
        let mut offsets_chunks = ChunkAllocator::new(
            backend.clone(),
            "offsets",
            ROW_ALIGNMENT * 64,
            wgpu::BufferUsages::empty(),
        );
        let definition = SortDefinition {
            name: "by_age".to_owned(),
            fields: vec![field("age")],
        };
        seed_row(
            backend.as_ref(),
            &mut primary_dir,
            &mut offsets_dir,
            &mut offsets_chunks,
            &definition.name,
            "a",
            &[0, 1],
        );

        let result = rebuild_sort_order(
            backend.as_ref(),
            "people",
            &definition,
            &primary_dir,
            &offsets_dir,
            &offsets_chunks,
        )
        .unwrap();
        assert!(result.is_none());
    }
}
