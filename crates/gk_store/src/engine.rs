use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use gk_gpu::{GpuBackend, WgpuBackend};

use crate::error::StoreError;
use crate::options::{DataType, EngineConfig, StoreOptions};
use crate::sort;
use crate::store::{Direction, KeyRange, OffsetsWrite, Store};

/// The top-level object a caller constructs (C8, §4.8): owns the device/queue
/// (behind the narrow [`GpuBackend`] trait) and every named store behind one
/// lock, matching the single-owner rule of §9/§4.11. Every store's compiled
/// bitonic pipeline is the one built once inside the backend at construction.
#[derive(Debug)]
pub struct GpuKvEngine {
    backend: Arc<dyn GpuBackend>,
    stores: RwLock<HashMap<String, Store>>,
    config: EngineConfig,
}

impl GpuKvEngine {
    /// Opens the default GPU adapter/device and returns an engine ready for
    /// `create_store` calls.
    pub fn new(config: EngineConfig) -> Result<Arc<Self>, StoreError> {
        let backend: Arc<dyn GpuBackend> = Arc::new(WgpuBackend::new()?);
        Ok(Self::with_backend(backend, config))
    }

    /// Construct an engine over a caller-supplied backend, e.g.
    /// [`gk_gpu::fake::FakeBackend`] for tests that run without a physical
    /// adapter, or a `WgpuBackend` wrapping an already-opened device.
    pub fn with_backend(backend: Arc<dyn GpuBackend>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            stores: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Create a named store and, for a `JsonDocument` store with ≥1 sort
    /// definition, its implicit `<name>-offsets` companion (§3, §4.7).
    pub fn create_store(
        self: &Arc<Self>,
        name: &str,
        options: StoreOptions,
    ) -> Result<StoreHandle, StoreError> {
        let mut table = self.stores.write();
        if table.contains_key(name) {
            return Err(StoreError::DuplicateStore {
                name: name.to_owned(),
            });
        }
        let needs_offsets =
            matches!(options.data_type, DataType::Json) && !options.sort_definitions.is_empty();
        let offsets_name = format!("{name}-offsets");

        let store = Store::new(
            name,
            options.clone(),
            self.backend.clone(),
            self.config.batch_threshold,
            self.config.debounce,
        )?;
        table.insert(name.to_owned(), store);

        if needs_offsets {
            let offsets_store = Store::new(
                offsets_name.clone(),
                options.offsets_companion(),
                self.backend.clone(),
                self.config.batch_threshold,
                self.config.debounce,
            )?;
            table.insert(offsets_name, offsets_store);
        }

        Ok(StoreHandle {
            engine: self.clone(),
            name: name.to_owned(),
        })
    }

    /// Look up a previously created store without creating anything.
    pub fn store(self: &Arc<Self>, name: &str) -> Result<StoreHandle, StoreError> {
        if !self.stores.read().contains_key(name) {
            return Err(StoreError::NoSuchStore {
                name: name.to_owned(),
            });
        }
        Ok(StoreHandle {
            engine: self.clone(),
            name: name.to_owned(),
        })
    }

    pub fn drop_store(&self, name: &str) -> Result<(), StoreError> {
        let mut table = self.stores.write();
        table
            .remove(name)
            .ok_or_else(|| StoreError::NoSuchStore {
                name: name.to_owned(),
            })?;
        table.remove(&format!("{name}-offsets"));
        Ok(())
    }

    /// Every user-created store name, excluding implicit `-offsets` companions.
    pub fn list_stores(&self) -> Vec<String> {
        self.stores
            .read()
            .keys()
            .filter(|name| !name.ends_with("-offsets"))
            .cloned()
            .collect()
    }

    pub fn add(&self, store: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.mutate(store, key, value, true)
    }

    pub fn put(&self, store: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.mutate(store, key, value, false)
    }

    fn mutate(&self, store: &str, key: &str, value: &[u8], is_add: bool) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut table = self.stores.write();
        let result = {
            let target = table
                .get_mut(store)
                .ok_or_else(|| StoreError::NoSuchStore {
                    name: store.to_owned(),
                })?;
            if is_add {
                target.add(key, value, now)?
            } else {
                target.put(key, value, now)?
            }
        };
        let offsets_should_flush =
            self.apply_offsets_writes(&mut table, store, result.offsets_writes, now)?;
        let should_flush = result.should_flush || offsets_should_flush;
        drop(table);
        if should_flush {
            self.flush_store(store)?;
        }
        Ok(())
    }

    pub fn delete(&self, store: &str, key: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut table = self.stores.write();
        let result = {
            let target = table
                .get_mut(store)
                .ok_or_else(|| StoreError::NoSuchStore {
                    name: store.to_owned(),
                })?;
            target.delete(key, now)
        };
        let offsets_should_flush =
            self.apply_offsets_writes(&mut table, store, result.offsets_writes, now)?;
        let should_flush = result.should_flush || offsets_should_flush;
        drop(table);
        if should_flush {
            self.flush_store(store)?;
        }
        Ok(())
    }

    /// Apply the offsets-store writes a primary-store mutation produced.
    /// Sequential, not concurrent: this borrows the offsets store's table
    /// entry only after the primary mutation's borrow has already ended,
    /// since a single `HashMap` cannot hand out two simultaneous `&mut`
    /// entries (§4.8's single-owner table rule applies here too).
    fn apply_offsets_writes(
        &self,
        table: &mut HashMap<String, Store>,
        store: &str,
        writes: Vec<OffsetsWrite>,
        now: Instant,
    ) -> Result<bool, StoreError> {
        if writes.is_empty() {
            return Ok(false);
        }
        let offsets_name = format!("{store}-offsets");
        let offsets_store = table
            .get_mut(&offsets_name)
            .ok_or_else(|| StoreError::NoSuchStore {
                name: offsets_name.clone(),
            })?;
        let mut should_flush = false;
        for write in writes {
            match write {
                OffsetsWrite::Put { key, words } => {
                    let result = offsets_store.put(&key, bytemuck::cast_slice(&words), now)?;
                    should_flush |= result.should_flush;
                }
                OffsetsWrite::Delete { key } => {
                    let result = offsets_store.delete(&key, now);
                    should_flush |= result.should_flush;
                }
            }
        }
        Ok(should_flush)
    }

    /// `false` between any mutation on `store` and the end of the next
    /// successful flush (§4.4). Callers that want to observe batching
    /// behavior rather than just read-your-writes consistency use this
    /// instead of `get`, since `get` always flushes internally first.
    pub fn is_ready(&self, store: &str) -> Result<bool, StoreError> {
        let table = self.stores.read();
        let target = table.get(store).ok_or_else(|| StoreError::NoSuchStore {
            name: store.to_owned(),
        })?;
        Ok(target.is_ready())
    }

    /// Keys in the order the sort engine last produced for `definition_name`,
    /// or `None` if that definition has never completed a rebuild (§4.6).
    pub fn ordered_keys(
        &self,
        store: &str,
        definition_name: &str,
    ) -> Result<Option<Vec<String>>, StoreError> {
        let table = self.stores.read();
        let target = table.get(store).ok_or_else(|| StoreError::NoSuchStore {
            name: store.to_owned(),
        })?;
        Ok(target
            .ordered_keys(definition_name)
            .map(|keys| keys.into_iter().map(str::to_owned).collect()))
    }

    pub fn get(&self, store: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut table = self.stores.write();
        let target = table
            .get_mut(store)
            .ok_or_else(|| StoreError::NoSuchStore {
                name: store.to_owned(),
            })?;
        target.get(key, self.backend.as_ref())
    }

    pub fn get_many(&self, store: &str, patterns: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let mut table = self.stores.write();
        let target = table
            .get_mut(store)
            .ok_or_else(|| StoreError::NoSuchStore {
                name: store.to_owned(),
            })?;
        target.get_many(patterns, self.backend.as_ref())
    }

    pub fn get_page(
        &self,
        store: &str,
        skip: usize,
        take: usize,
    ) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let mut table = self.stores.write();
        let target = table
            .get_mut(store)
            .ok_or_else(|| StoreError::NoSuchStore {
                name: store.to_owned(),
            })?;
        target.get_page(skip, take, self.backend.as_ref())
    }

    pub fn cursor(
        &self,
        store: &str,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut table = self.stores.write();
        let target = table
            .get_mut(store)
            .ok_or_else(|| StoreError::NoSuchStore {
                name: store.to_owned(),
            })?;
        target.cursor(range, direction, self.backend.as_ref())
    }

    pub fn clear(&self, store: &str) -> Result<(), StoreError> {
        let mut table = self.stores.write();
        table
            .get_mut(store)
            .ok_or_else(|| StoreError::NoSuchStore {
                name: store.to_owned(),
            })?
            .clear();
        if let Some(offsets) = table.get_mut(&format!("{store}-offsets")) {
            offsets.clear();
        }
        Ok(())
    }

    /// Flush a store's pending writes, flush its offsets companion if it has
    /// one, then rebuild every sort definition whose order went stale (§4.6).
    pub fn flush_store(&self, name: &str) -> Result<(), StoreError> {
        let mut table = self.stores.write();
        {
            let store = table
                .get_mut(name)
                .ok_or_else(|| StoreError::NoSuchStore {
                    name: name.to_owned(),
                })?;
            store.flush(self.backend.as_ref())?;
        }

        let offsets_name = format!("{name}-offsets");
        if let Some(offsets_store) = table.get_mut(&offsets_name) {
            offsets_store.flush(self.backend.as_ref())?;
        }

        let needs_rebuild = table
            .get(name)
            .map(|store| store.needs_sort_rebuild())
            .unwrap_or(false);
        if needs_rebuild {
            let definitions = table.get(name).unwrap().options().sort_definitions.clone();
            for definition in &definitions {
                let order = {
                    let primary = table.get(name).unwrap();
                    let offsets = table.get(&offsets_name).unwrap();
                    sort::rebuild_sort_order(
                        self.backend.as_ref(),
                        name,
                        definition,
                        primary.directory(),
                        offsets.directory(),
                        offsets.allocator(),
                    )?
                };
                if let Some(order) = order {
                    table
                        .get_mut(name)
                        .unwrap()
                        .set_sort_order(&definition.name, order);
                }
            }
            table.get_mut(name).unwrap().mark_sorts_clean();
        }
        Ok(())
    }

    /// Flush every store that currently has pending writes.
    pub fn await_ready(&self) -> Result<(), StoreError> {
        let names: Vec<String> = self.stores.read().keys().cloned().collect();
        for name in names {
            self.flush_store(&name)?;
        }
        Ok(())
    }

    /// Drive the debounce timer (§4.4): flush every store whose debounce
    /// deadline has passed `now` and which still has unflushed writes. There
    /// is no background timer thread in this crate's dependency stack; a
    /// caller (an event loop, a test, a scheduled task) calls this
    /// periodically instead.
    pub fn tick(&self, now: Instant) -> Result<(), StoreError> {
        let names: Vec<String> = {
            let table = self.stores.read();
            table
                .iter()
                .filter(|(_, store)| store.has_pending_writes() && store.debounce_elapsed(now))
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in names {
            self.flush_store(&name)?;
        }
        Ok(())
    }
}

/// A cheap, cloneable reference to a store through which the public API is
/// called (§4.8). Not a second owner of the store's state: it carries only
/// the store's name and a reference-counted pointer back to the engine that
/// actually owns the table.
#[derive(Clone)]
pub struct StoreHandle {
    engine: Arc<GpuKvEngine>,
    name: String,
}

impl StoreHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> Result<bool, StoreError> {
        self.engine.is_ready(&self.name)
    }

    pub fn add(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.engine.add(&self.name, key, value)
    }

    pub fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.engine.put(&self.name, key, value)
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.engine.get(&self.name, key)
    }

    pub fn get_many(&self, patterns: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.engine.get_many(&self.name, patterns)
    }

    pub fn get_page(&self, skip: usize, take: usize) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.engine.get_page(&self.name, skip, take)
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.engine.delete(&self.name, key)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.engine.clear(&self.name)
    }

    pub fn cursor(
        &self,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        self.engine.cursor(&self.name, range, direction)
    }

    pub fn ordered_keys(&self, definition_name: &str) -> Result<Option<Vec<String>>, StoreError> {
        self.engine.ordered_keys(&self.name, definition_name)
    }

    pub fn await_ready(&self) -> Result<(), StoreError> {
        self.engine.flush_store(&self.name)
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").field("name", &self.name).finish()
    }
}
