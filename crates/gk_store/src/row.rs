use indexmap::IndexMap;

/// `row_record.flags` bit marking a row as superseded. Never cleared once set.
pub const INACTIVE: u8 = 0x1;

pub type RowId = u32;

/// `(chunk_index, offset_in_chunk, length_bytes, flags)` plus the row id that
/// names this slot. Never mutated in place except to shrink `length` (an
/// in-place overwrite, §4.3) or set the `INACTIVE` bit (a delete or a grow
/// that reallocates).
#[derive(Debug, Clone, Copy)]
pub struct RowRecord {
    pub row_id: RowId,
    pub chunk_index: u32,
    pub offset: u64,
    pub length: u64,
    pub flags: u8,
}

impl RowRecord {
    pub fn is_active(&self) -> bool {
        self.flags & INACTIVE == 0
    }
}

/// What [`RowDirectory::create_or_update`] decided to do with a key's row.
#[derive(Debug)]
pub enum UpdatePlan {
    /// No existing active row (or `mode` was `Add`): allocate a brand new slot.
    Allocate,
    /// An active row exists and the new payload fits in its current slot.
    ReuseInPlace { row_id: RowId },
    /// An active row exists but the new payload is larger: the old row is
    /// marked `INACTIVE` and a new slot must be allocated.
    Reallocate { old_row_id: RowId },
}

/// Whether [`RowDirectory::create_or_update`] is being called for an `add`
/// (fails on an active duplicate) or a `put` (upsert).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Add,
    Put,
}

/// Per-store `key -> row_id` and `row_id -> row_record` maps (C3).
///
/// The key map is an [`IndexMap`] so pagination (`get_page`) and the
/// store-coordinator's wildcard/cursor scans can enumerate keys in stable
/// insertion order (§4.5's "current key enumeration order ... insertion
/// order, not a sorted order").
#[derive(Debug, Default)]
pub struct RowDirectory {
    records: Vec<RowRecord>,
    keys: IndexMap<String, RowId>,
    /// `owner_keys[row_id - 1]` is the key that row was created for. Kept
    /// alongside `records` purely so the sort engine can turn a sorted row id
    /// back into a key without a reverse scan of `keys`.
    owner_keys: Vec<String>,
}

impl RowDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, row_id: RowId) -> Option<&RowRecord> {
        self.records.get(row_id as usize - 1)
    }

    /// Keys in insertion order, including ones whose row is now inactive
    /// (callers filter with [`Self::find_active`] as needed).
    pub fn keys_in_order(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn row_id_for_key(&self, key: &str) -> Option<RowId> {
        self.keys.get(key).copied()
    }

    pub fn key_for_row(&self, row_id: RowId) -> Option<&str> {
        self.owner_keys.get(row_id as usize - 1).map(String::as_str)
    }

    /// Resolve `key` to its row record, but only if that row is active.
    pub fn find_active(&self, key: &str) -> Option<RowRecord> {
        let row_id = *self.keys.get(key)?;
        let record = self.record(row_id)?;
        record.is_active().then_some(*record)
    }

    /// Decide what `create_or_update` must do for `key`, without performing
    /// any allocation itself: the caller (the store coordinator) allocates
    /// space via [`gk_gpu::ChunkAllocator`] and then calls [`Self::commit_allocate`]
    /// / [`Self::commit_reuse`] / [`Self::commit_reallocate`] to record the
    /// outcome.
    pub fn plan_update(
        &self,
        key: &str,
        new_length: u64,
        mode: WriteMode,
    ) -> Result<UpdatePlan, DuplicateKeyError> {
        match self.find_active(key) {
            None => Ok(UpdatePlan::Allocate),
            Some(existing) => match mode {
                WriteMode::Add => Err(DuplicateKeyError),
                WriteMode::Put => {
                    if new_length <= existing.length {
                        Ok(UpdatePlan::ReuseInPlace {
                            row_id: existing.row_id,
                        })
                    } else {
                        Ok(UpdatePlan::Reallocate {
                            old_row_id: existing.row_id,
                        })
                    }
                }
            },
        }
    }

    /// Shrink (or keep) the slot of an existing active row in place.
    pub fn commit_reuse(&mut self, row_id: RowId, new_length: u64) {
        let record = &mut self.records[row_id as usize - 1];
        debug_assert!(record.is_active());
        record.length = new_length;
    }

    /// Mark `old_row_id` inactive and append a fresh row bound to `key`.
    pub fn commit_reallocate(
        &mut self,
        key: &str,
        old_row_id: RowId,
        chunk_index: u32,
        offset: u64,
        length: u64,
    ) -> RowId {
        self.records[old_row_id as usize - 1].flags |= INACTIVE;
        self.append(key, chunk_index, offset, length)
    }

    /// Append a brand new row and bind `key` to it (fresh key, or the first
    /// write of a key that has never existed before).
    pub fn commit_allocate(
        &mut self,
        key: &str,
        chunk_index: u32,
        offset: u64,
        length: u64,
    ) -> RowId {
        self.append(key, chunk_index, offset, length)
    }

    fn append(&mut self, key: &str, chunk_index: u32, offset: u64, length: u64) -> RowId {
        let row_id = self.records.len() as RowId + 1;
        self.records.push(RowRecord {
            row_id,
            chunk_index,
            offset,
            length,
            flags: 0,
        });
        self.owner_keys.push(key.to_owned());
        self.keys.insert(key.to_owned(), row_id);
        row_id
    }

    /// Mark `key`'s active row inactive, returning the record that was
    /// cleared (the store coordinator enqueues a zero-fill write for it, §4.3)
    /// or `None` if `key` had no active row (a silent no-op, §4.7).
    pub fn delete(&mut self, key: &str) -> Option<RowRecord> {
        let row_id = *self.keys.get(key)?;
        let record = &mut self.records[row_id as usize - 1];
        if !record.is_active() {
            return None;
        }
        record.flags |= INACTIVE;
        Some(*record)
    }

    /// Every active row, in row-id order. Used by the sort engine to build
    /// the permutation check and by the coordinator's invariant checks.
    pub fn active_rows(&self) -> impl Iterator<Item = &RowRecord> {
        self.records.iter().filter(|r| r.is_active())
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.keys.clear();
        self.owner_keys.clear();
    }
}

#[derive(Debug)]
pub struct DuplicateKeyError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_key_plans_allocate() {
        let dir = RowDirectory::new();
        assert!(matches!(
            dir.plan_update("k", 16, WriteMode::Put).unwrap(),
            UpdatePlan::Allocate
        ));
    }

    #[test]
    fn add_on_active_key_fails() {
        let mut dir = RowDirectory::new();
        dir.commit_allocate("k", 0, 0, 16);
        assert!(dir.plan_update("k", 16, WriteMode::Add).is_err());
    }

    #[test]
    fn put_with_shorter_length_reuses_slot() {
        let mut dir = RowDirectory::new();
        let row_id = dir.commit_allocate("k", 0, 0, 64);
        match dir.plan_update("k", 32, WriteMode::Put).unwrap() {
            UpdatePlan::ReuseInPlace { row_id: r } => assert_eq!(r, row_id),
            other => panic!("expected ReuseInPlace, got {other:?}"),
        }
    }

    #[test]
    fn put_with_longer_length_reallocates() {
        let mut dir = RowDirectory::new();
        let row_id = dir.commit_allocate("k", 0, 0, 16);
        match dir.plan_update("k", 64, WriteMode::Put).unwrap() {
            UpdatePlan::Reallocate { old_row_id } => assert_eq!(old_row_id, row_id),
            other => panic!("expected Reallocate, got {other:?}"),
        }
    }

    #[test]
    fn reallocate_marks_old_row_inactive_and_keeps_one_active_row_per_key() {
        let mut dir = RowDirectory::new();
        let old = dir.commit_allocate("k", 0, 0, 16);
        let new = dir.commit_reallocate("k", old, 0, 256, 64);
        assert_ne!(old, new);
        assert!(!dir.record(old).unwrap().is_active());
        assert!(dir.record(new).unwrap().is_active());
        assert_eq!(dir.find_active("k").unwrap().row_id, new);
    }

    #[test]
    fn delete_missing_key_is_a_no_op() {
        let mut dir = RowDirectory::new();
        assert!(dir.delete("nope").is_none());
    }

    #[test]
    fn delete_then_add_succeeds_with_a_fresh_row() {
        let mut dir = RowDirectory::new();
        let first = dir.commit_allocate("k", 0, 0, 16);
        dir.delete("k");
        assert!(dir.find_active("k").is_none());
        assert!(matches!(
            dir.plan_update("k", 16, WriteMode::Add).unwrap(),
            UpdatePlan::Allocate
        ));
        let second = dir.commit_allocate("k", 1, 0, 16);
        assert_ne!(first, second);
    }

    #[test]
    fn row_ids_are_never_reused() {
        let mut dir = RowDirectory::new();
        let a = dir.commit_allocate("a", 0, 0, 16);
        dir.delete("a");
        let b = dir.commit_allocate("b", 0, 256, 16);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn keys_in_order_reflects_insertion_order() {
        let mut dir = RowDirectory::new();
        dir.commit_allocate("z", 0, 0, 4);
        dir.commit_allocate("a", 0, 256, 4);
        dir.commit_allocate("m", 0, 512, 4);
        assert_eq!(
            dir.keys_in_order().collect::<Vec<_>>(),
            vec!["z", "a", "m"]
        );
    }

    #[test]
    fn clear_resets_owner_keys_so_row_ids_do_not_resolve_to_stale_keys() {
        let mut dir = RowDirectory::new();
        dir.commit_allocate("old", 0, 0, 16);
        dir.clear();
        let new = dir.commit_allocate("new", 0, 0, 16);
        assert_eq!(dir.key_for_row(new), Some("new"));
    }
}
