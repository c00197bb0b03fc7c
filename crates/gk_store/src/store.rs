use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use gk_codec::{
    decode_payload, encode_payload, encode_sort_words, CodecError, PayloadKind, SortKeyCache,
};
use gk_gpu::{ChunkAllocator, GpuBackend};

use crate::error::StoreError;
use crate::options::StoreOptions;
use crate::queue::{PendingWrite, WriteOp, WriteQueue};
use crate::reader::{gather_rows, RowLocation};
use crate::row::{RowDirectory, RowId, UpdatePlan, WriteMode};
use crate::wildcard;

/// A sort-key row the engine must write to (or remove from) this store's
/// `<name>-offsets` companion after a mutation completes (§3). Only produced
/// for `JsonDocument` stores with at least one sort definition; every other
/// store's mutations return an empty list.
#[derive(Debug, Clone)]
pub enum OffsetsWrite {
    Put { key: String, words: Vec<u32> },
    Delete { key: String },
}

/// What a mutation did, for the engine to act on: the offsets-store writes it
/// must apply next, and whether the batch threshold was crossed (§4.4), in
/// which case the engine should flush immediately rather than wait out the
/// debounce.
#[derive(Debug, Clone, Default)]
pub struct MutationResult {
    pub offsets_writes: Vec<OffsetsWrite>,
    pub should_flush: bool,
}

/// Ascending or descending key order for [`Store::cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// An optional string-key range for [`Store::cursor`], each bound independently
/// inclusive or exclusive.
#[derive(Debug, Clone, Default)]
pub struct KeyRange {
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
}

impl KeyRange {
    fn contains(&self, key: &str) -> bool {
        if let Some(lower) = &self.lower {
            match (self.lower_inclusive, key.cmp(lower.as_str())) {
                (true, std::cmp::Ordering::Less) => return false,
                (false, std::cmp::Ordering::Less | std::cmp::Ordering::Equal) => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match (self.upper_inclusive, key.cmp(upper.as_str())) {
                (true, std::cmp::Ordering::Greater) => return false,
                (false, std::cmp::Ordering::Greater | std::cmp::Ordering::Equal) => return false,
                _ => {}
            }
        }
        true
    }
}

/// The store coordinator (C7): one named, typed record store. Owns its own
/// chunk allocator, row directory, write queue, and (for JSON stores) sort-key
/// cache, but never the device itself or another store's state — see §4.11.
#[derive(Debug)]
pub struct Store {
    name: String,
    options: StoreOptions,
    payload_kind: PayloadKind,
    allocator: ChunkAllocator,
    directory: RowDirectory,
    queue: WriteQueue,
    sort_key_cache: SortKeyCache,
    sort_orders: AHashMap<String, Vec<RowId>>,
    sorts_dirty: bool,
}

impl Store {
    pub fn new(
        name: impl Into<String>,
        options: StoreOptions,
        backend: Arc<dyn GpuBackend>,
        batch_threshold: usize,
        debounce: std::time::Duration,
    ) -> Result<Self, StoreError> {
        let name = name.into();
        let payload_kind = options.payload_kind()?;
        let allocator = ChunkAllocator::new(
            backend,
            format!("{name}-data"),
            options.buffer_capacity_bytes,
            wgpu::BufferUsages::STORAGE,
        );
        Ok(Self {
            name,
            options,
            payload_kind,
            allocator,
            directory: RowDirectory::new(),
            queue: WriteQueue::new(batch_threshold, debounce),
            sort_key_cache: SortKeyCache::new(),
            sort_orders: AHashMap::new(),
            sorts_dirty: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn directory(&self) -> &RowDirectory {
        &self.directory
    }

    pub fn allocator(&self) -> &ChunkAllocator {
        &self.allocator
    }

    pub fn is_ready(&self) -> bool {
        self.queue.is_ready()
    }

    pub fn needs_sort_rebuild(&self) -> bool {
        self.sorts_dirty && !self.options.sort_definitions.is_empty()
    }

    pub fn mark_sorts_clean(&mut self) {
        self.sorts_dirty = false;
        self.sort_key_cache.clear();
    }

    pub fn set_sort_order(&mut self, definition_name: &str, order: Vec<RowId>) {
        self.sort_orders.insert(definition_name.to_owned(), order);
    }

    /// Keys in the cached order for `definition_name`, most recently rebuilt
    /// by the sort engine. `None` if that definition has never completed a
    /// rebuild (e.g. the store was just created, or every pass so far hit
    /// [`StoreError::SortBudgetExceeded`]).
    pub fn ordered_keys(&self, definition_name: &str) -> Option<Vec<&str>> {
        let order = self.sort_orders.get(definition_name)?;
        Some(
            order
                .iter()
                .filter_map(|&row_id| self.directory.key_for_row(row_id))
                .collect(),
        )
    }

    /// Debounce-timer state for `GpuKvEngine::tick`, see [`WriteQueue::debounce_elapsed`].
    pub fn debounce_elapsed(&self, now: Instant) -> bool {
        self.queue.debounce_elapsed(now)
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn add(
        &mut self,
        key: &str,
        bytes: &[u8],
        now: Instant,
    ) -> Result<MutationResult, StoreError> {
        self.write(key, bytes, WriteMode::Add, now)
    }

    pub fn put(
        &mut self,
        key: &str,
        bytes: &[u8],
        now: Instant,
    ) -> Result<MutationResult, StoreError> {
        self.write(key, bytes, WriteMode::Put, now)
    }

    fn write(
        &mut self,
        key: &str,
        bytes: &[u8],
        mode: WriteMode,
        now: Instant,
    ) -> Result<MutationResult, StoreError> {
        let encoded = encode_payload(&self.payload_kind, bytes).map_err(|err| match err {
            CodecError::MisalignedNumericArray { .. } => StoreError::TypeMismatch {
                store: self.name.clone(),
                reason: err.to_string(),
            },
            other => StoreError::from(other),
        })?;
        let new_length = encoded.len() as u64;

        let plan = self
            .directory
            .plan_update(key, new_length, mode)
            .map_err(|_| StoreError::DuplicateKey {
                store: self.name.clone(),
                key: key.to_owned(),
            })?;

        let (buffer, offset) = match plan {
            UpdatePlan::ReuseInPlace { row_id } => {
                self.directory.commit_reuse(row_id, new_length);
                let record = self
                    .directory
                    .record(row_id)
                    .expect("row directory just committed this row id");
                let chunk = self
                    .allocator
                    .chunk(record.chunk_index)
                    .expect("row directory and allocator chunk lists stay in sync");
                (chunk.buffer, record.offset)
            }
            UpdatePlan::Allocate => {
                let alloc = self.allocator.allocate(new_length);
                self.directory
                    .commit_allocate(key, alloc.chunk_index, alloc.offset, new_length);
                (alloc.buffer, alloc.offset)
            }
            UpdatePlan::Reallocate { old_row_id } => {
                let alloc = self.allocator.allocate(new_length);
                self.directory.commit_reallocate(
                    key,
                    old_row_id,
                    alloc.chunk_index,
                    alloc.offset,
                    new_length,
                );
                (alloc.buffer, alloc.offset)
            }
        };

        let op = match mode {
            WriteMode::Add => WriteOp::Add,
            WriteMode::Put => WriteOp::Put,
        };
        let should_flush = self.queue.enqueue(
            PendingWrite {
                buffer,
                offset,
                payload: encoded,
                op,
                key: key.to_owned(),
            },
            now,
        );

        let mut offsets_writes = Vec::new();
        if matches!(self.payload_kind, PayloadKind::JsonDocument)
            && !self.options.sort_definitions.is_empty()
        {
            let document: serde_json::Value =
                serde_json::from_slice(bytes).map_err(CodecError::InvalidJson)?;
            for definition in &self.options.sort_definitions {
                let words = encode_sort_words(definition, &document, &mut self.sort_key_cache);
                offsets_writes.push(OffsetsWrite::Put {
                    key: format!("{key}::{}", definition.name),
                    words,
                });
            }
            self.sorts_dirty = true;
        }

        Ok(MutationResult {
            offsets_writes,
            should_flush,
        })
    }

    /// Mark `key`'s row inactive and enqueue a zero-fill write over its old
    /// slot (§4.3). A missing or already-inactive key is a silent no-op
    /// (§4.7), returning an empty result.
    pub fn delete(&mut self, key: &str, now: Instant) -> MutationResult {
        let Some(record) = self.directory.delete(key) else {
            return MutationResult::default();
        };
        let Some(chunk) = self.allocator.chunk(record.chunk_index) else {
            return MutationResult::default();
        };
        let should_flush = self.queue.enqueue(
            PendingWrite {
                buffer: chunk.buffer,
                offset: record.offset,
                payload: vec![0u8; record.length as usize],
                op: WriteOp::Delete,
                key: key.to_owned(),
            },
            now,
        );

        let mut offsets_writes = Vec::new();
        if !self.options.sort_definitions.is_empty() {
            offsets_writes.extend(self.options.sort_definitions.iter().map(|definition| {
                OffsetsWrite::Delete {
                    key: format!("{key}::{}", definition.name),
                }
            }));
            self.sorts_dirty = true;
        }

        MutationResult {
            offsets_writes,
            should_flush,
        }
    }

    pub fn flush(&mut self, backend: &dyn GpuBackend) -> Result<(), StoreError> {
        self.queue.flush(backend)
    }

    /// Destroy every chunk, reset the directory and pending queue, then
    /// immediately allocate a fresh empty chunk so the store stays writable
    /// (§4.7).
    pub fn clear(&mut self) {
        self.allocator.clear();
        self.directory.clear();
        self.queue.clear();
        self.sort_orders.clear();
        self.sort_key_cache.clear();
        self.sorts_dirty = false;
        self.allocator.allocate_empty_chunk();
    }

    pub fn get(&mut self, key: &str, backend: &dyn GpuBackend) -> Result<Option<Vec<u8>>, StoreError> {
        self.flush(backend)?;
        let mut results = self.resolve_and_decode(std::slice::from_ref(&key.to_owned()), backend)?;
        Ok(results.pop().flatten())
    }

    /// Resolve `patterns` (each either a literal key or a `%`/`_` wildcard
    /// pattern) against the store's current active-key set, preserving caller
    /// order; non-matching patterns and inactive keys leave a `None` at their
    /// position (§4.5, §8 invariant 7).
    pub fn get_many(
        &mut self,
        patterns: &[String],
        backend: &dyn GpuBackend,
    ) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.flush(backend)?;
        let active_keys: Vec<&str> = self
            .directory
            .keys_in_order()
            .filter(|key| self.directory.find_active(key).is_some())
            .collect();

        let mut expanded = Vec::new();
        for pattern in patterns {
            if wildcard::contains_wildcard(pattern) {
                expanded.extend(wildcard::expand(pattern, active_keys.iter().copied()));
            } else {
                expanded.push(pattern.clone());
            }
        }
        self.resolve_and_decode(&expanded, backend)
    }

    /// Pagination over the store's current key enumeration order (insertion
    /// order, §4.5) rather than any sorted order.
    pub fn get_page(
        &mut self,
        skip: usize,
        take: usize,
        backend: &dyn GpuBackend,
    ) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.flush(backend)?;
        let keys: Vec<String> = self
            .directory
            .keys_in_order()
            .skip(skip)
            .take(take)
            .map(str::to_owned)
            .collect();
        self.resolve_and_decode(&keys, backend)
    }

    /// Active rows whose key falls in `range`, lexicographically ordered and
    /// fetched through the bulk reader (§4.7).
    pub fn cursor(
        &mut self,
        range: &KeyRange,
        direction: Direction,
        backend: &dyn GpuBackend,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        self.flush(backend)?;
        let mut keys: Vec<String> = self
            .directory
            .keys_in_order()
            .filter(|key| self.directory.find_active(key).is_some())
            .filter(|key| range.contains(key))
            .map(str::to_owned)
            .collect();
        keys.sort();
        if direction == Direction::Descending {
            keys.reverse();
        }

        let values = self.resolve_and_decode(&keys, backend)?;
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect())
    }

    fn resolve_and_decode(
        &self,
        keys: &[String],
        backend: &dyn GpuBackend,
    ) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let locations: Vec<Option<RowLocation>> = keys
            .iter()
            .map(|key| {
                let record = self.directory.find_active(key)?;
                let chunk = self.allocator.chunk(record.chunk_index)?;
                Some(RowLocation {
                    buffer: chunk.buffer,
                    offset: record.offset,
                    length: record.length,
                })
            })
            .collect();

        let rows = gather_rows(backend, &self.name, &locations)?;
        rows.into_iter()
            .map(|row| {
                row.map(|bytes| decode_payload(&self.payload_kind, &bytes).map_err(StoreError::from))
                    .transpose()
            })
            .collect()
    }
}
