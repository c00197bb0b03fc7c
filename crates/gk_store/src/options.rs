use gk_codec::{ElementKind, PayloadKind, SortDefinition};

use crate::error::StoreError;

/// The payload discipline a store is created with. `ElementKind` is carried
/// separately (not folded into this enum) so `create_store` can detect and
/// reject the "numeric without an element kind" case with a dedicated error
/// (§4.7: `dataType == NumericArray ⇒ element_kind must be provided`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Opaque,
    Numeric,
    Json,
}

/// `create_store`'s configuration, mirroring §6's `options` object.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub data_type: DataType,
    pub element_kind: Option<ElementKind>,
    pub buffer_capacity_bytes: u64,
    pub fixed_row_bytes: Option<u64>,
    pub total_rows: u32,
    pub sort_definitions: Vec<SortDefinition>,
}

impl StoreOptions {
    pub fn opaque(buffer_capacity_bytes: u64, total_rows: u32) -> Self {
        Self {
            data_type: DataType::Opaque,
            element_kind: None,
            buffer_capacity_bytes,
            fixed_row_bytes: None,
            total_rows,
            sort_definitions: Vec::new(),
        }
    }

    pub fn numeric(element_kind: ElementKind, buffer_capacity_bytes: u64, total_rows: u32) -> Self {
        Self {
            data_type: DataType::Numeric,
            element_kind: Some(element_kind),
            buffer_capacity_bytes,
            fixed_row_bytes: None,
            total_rows,
            sort_definitions: Vec::new(),
        }
    }

    pub fn json(buffer_capacity_bytes: u64, total_rows: u32) -> Self {
        Self {
            data_type: DataType::Json,
            element_kind: None,
            buffer_capacity_bytes,
            fixed_row_bytes: None,
            total_rows,
            sort_definitions: Vec::new(),
        }
    }

    pub fn with_sort_definitions(mut self, defs: Vec<SortDefinition>) -> Self {
        self.sort_definitions = defs;
        self
    }

    /// Resolve the [`PayloadKind`] this store encodes/decodes with, failing
    /// if a `Numeric` store was declared without an `element_kind`.
    pub fn payload_kind(&self) -> Result<PayloadKind, StoreError> {
        match self.data_type {
            DataType::Opaque => Ok(PayloadKind::OpaqueBytes),
            DataType::Json => Ok(PayloadKind::JsonDocument),
            DataType::Numeric => self
                .element_kind
                .map(PayloadKind::NumericArray)
                .ok_or(StoreError::MissingElementKind),
        }
    }

    /// Options for this store's implicit `<store>-offsets` companion
    /// (§3, §4.7, §9 item 4): `NumericArray(U32)`, sized to
    /// `sort_definitions.len() * total_rows` so every `(key, definition)`
    /// pair has room.
    pub fn offsets_companion(&self) -> StoreOptions {
        StoreOptions::numeric(
            ElementKind::U32,
            10 * 1024 * 1024,
            self.sort_definitions.len() as u32 * self.total_rows,
        )
    }
}

/// Engine-wide tuning, analogous to this codebase's `DataStoreConfig`: the
/// write coalescer's batch threshold and nominal debounce interval (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Number of pending writes that forces an immediate flush.
    pub batch_threshold: usize,
    /// Nominal debounce interval; see [`crate::engine::GpuKvEngine::tick`]
    /// for how this crate models the timer without an async runtime.
    pub debounce: std::time::Duration,
}

impl EngineConfig {
    pub const DEFAULT_BATCH_THRESHOLD: usize = 10_000;
    pub const DEFAULT_DEBOUNCE: std::time::Duration = std::time::Duration::from_millis(250);
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_threshold: Self::DEFAULT_BATCH_THRESHOLD,
            debounce: Self::DEFAULT_DEBOUNCE,
        }
    }
}
