use std::collections::HashMap;
use std::time::Instant;

use gk_error::ResultExt as _;
use gk_gpu::{BufferId, GpuBackend};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Add,
    Put,
    Delete,
}

/// One queued mutation, not yet submitted to the device.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub buffer: BufferId,
    pub offset: u64,
    pub payload: Vec<u8>,
    pub op: WriteOp,
    pub key: String,
}

/// The write coalescer / flush engine (C4): batches mutations per store and
/// submits them to the device as grouped, offset-ordered writes.
#[derive(Debug)]
pub struct WriteQueue {
    pending: Vec<PendingWrite>,
    batch_threshold: usize,
    debounce: std::time::Duration,
    ready: bool,
    debounce_deadline: Option<Instant>,
}

impl WriteQueue {
    pub fn new(batch_threshold: usize, debounce: std::time::Duration) -> Self {
        Self {
            pending: Vec::new(),
            batch_threshold,
            debounce,
            ready: true,
            debounce_deadline: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Append a mutation in call order. Returns `true` once the batch
    /// threshold (§4.4, nominally 10,000) is reached, signalling the caller
    /// should flush immediately rather than wait for the debounce timer.
    pub fn enqueue(&mut self, write: PendingWrite, now: Instant) -> bool {
        self.pending.push(write);
        self.ready = false;
        self.debounce_deadline = Some(now + self.debounce);
        self.pending.len() >= self.batch_threshold
    }

    /// `true` once `now` has passed the debounce deadline set by the most
    /// recent [`Self::enqueue`]. This crate has no background timer thread
    /// (neither the teacher codebase nor this spec's dependency stack pulls
    /// in an async runtime), so the nominal 250ms debounce is modelled as an
    /// explicit deadline a caller checks — see
    /// [`crate::engine::GpuKvEngine::tick`].
    pub fn debounce_elapsed(&self, now: Instant) -> bool {
        self.debounce_deadline.is_none_or(|deadline| now >= deadline)
    }

    /// Drop every pending write and reset readiness, used by `clear(store)`
    /// (§4.7) since every buffer a pending write might target is about to be
    /// destroyed.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.ready = true;
        self.debounce_deadline = None;
    }

    /// Partition pending writes by target buffer, sort each partition by
    /// offset ascending, submit every write, then wait for device completion
    /// once for the whole flush (§4.4 steps 1-4). Entries whose submission
    /// fails are logged and retained for the next flush attempt; everything
    /// else is pruned from the queue.
    pub fn flush(&mut self, backend: &dyn GpuBackend) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            self.ready = true;
            return Ok(());
        }

        let mut by_buffer: HashMap<BufferId, Vec<usize>> = HashMap::new();
        for (index, write) in self.pending.iter().enumerate() {
            by_buffer.entry(write.buffer).or_default().push(index);
        }

        let mut failed = vec![false; self.pending.len()];
        for indices in by_buffer.values_mut() {
            indices.sort_by_key(|&index| self.pending[index].offset);
            for &index in indices.iter() {
                let write = &self.pending[index];
                let ok = backend
                    .write_buffer(write.buffer, write.offset, &write.payload)
                    .warn_on_err_once(format!(
                        "write to key {:?} failed and will retry next flush",
                        write.key
                    ))
                    .is_some();
                failed[index] = !ok;
            }
        }

        backend.poll_wait()?;

        let mut retained = Vec::with_capacity(failed.iter().filter(|f| **f).count());
        for (write, failed) in self.pending.drain(..).zip(failed) {
            if failed {
                retained.push(write);
            }
        }
        self.pending = retained;
        self.ready = self.pending.is_empty();
        if self.ready {
            self.debounce_deadline = None;
        }
        Ok(())
    }
}
