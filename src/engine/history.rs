//! Rolling History Store - bounded per-asset sample windows
//!
//! Each asset owns a fixed-capacity ring buffer; once full, every append
//! overwrites the oldest slot. Assets live in a sharded `DashMap` of
//! per-asset mutexes, so appends for different assets never contend and
//! appends for the same asset are serialized.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use super::validator::{self, ValidationError};
use crate::config::Envelope;
use crate::types::{PerSignal, RawSample, Sample};

// ============================================================================
// Ring Buffer
// ============================================================================

/// Index-addressed FIFO ring buffer.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    /// Index of the oldest element once the buffer is full
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Push a value, returning the evicted oldest value when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
            None
        } else {
            let evicted = std::mem::replace(&mut self.slots[self.head], value);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn last(&self) -> Option<&T> {
        if self.slots.is_empty() {
            None
        } else {
            let idx = (self.head + self.slots.len() - 1) % self.slots.len();
            self.slots.get(idx)
        }
    }
}

impl<T: Clone> RingBuffer<T> {
    /// The most recent `size` values, oldest first.
    pub fn tail(&self, size: usize) -> Vec<T> {
        let skip = self.len().saturating_sub(size);
        self.iter().skip(skip).cloned().collect()
    }
}

// ============================================================================
// Asset History
// ============================================================================

/// Bounded, timestamp-ordered sample history for one asset.
#[derive(Debug, Clone)]
pub struct AssetHistory {
    samples: RingBuffer<Sample>,
    total_accepted: u64,
}

impl AssetHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
            total_accepted: 0,
        }
    }

    /// Append an already-validated sample. Rejects samples that would break
    /// timestamp or engine-hour ordering.
    pub fn push(&mut self, sample: Sample) -> Result<(), ValidationError> {
        if let Some(prev) = self.samples.last() {
            validator::check_ordering(prev, &sample)?;
        }
        self.samples.push(sample);
        self.total_accepted += 1;
        Ok(())
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn window(&self, size: usize) -> Vec<Sample> {
        self.samples.tail(size)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples accepted over the asset's lifetime, including evicted ones.
    pub fn total_accepted(&self) -> u64 {
        self.total_accepted
    }
}

// ============================================================================
// History Store
// ============================================================================

type Slot = Arc<Mutex<AssetHistory>>;

/// Consistent view of one asset's history.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    /// Most recent samples, oldest first
    pub window: Vec<Sample>,
    /// Samples currently retained
    pub len: usize,
    pub total_accepted: u64,
}

/// All asset histories, keyed by asset id.
#[derive(Debug)]
pub struct HistoryStore {
    assets: DashMap<String, Slot>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            assets: DashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Validate `raw` against the asset's latest sample and append it, with
    /// both steps under the asset's lock.
    ///
    /// A sample that fails validation never creates an asset entry.
    pub fn validate_and_append(
        &self,
        raw: &RawSample,
        envelopes: &PerSignal<Envelope>,
    ) -> Result<Sample, ValidationError> {
        let slot = match raw.asset_id().and_then(|id| self.slot(id)) {
            Some(slot) => slot,
            None => {
                // Unknown asset: validate first, then create the entry.
                let sample = validator::validate(raw, None, envelopes)?;
                self.slot_or_insert(&sample.asset_id)
            }
        };

        let mut history = lock(&slot);
        let sample = validator::validate(raw, history.latest(), envelopes)?;
        history.push(sample.clone())?;
        Ok(sample)
    }

    /// Append a sample that the caller already validated.
    pub fn append(&self, sample: Sample) -> Result<(), ValidationError> {
        let slot = self.slot_or_insert(&sample.asset_id);
        let mut history = lock(&slot);
        history.push(sample)
    }

    /// Most recent `size` samples, oldest first. Empty for unknown assets.
    pub fn window(&self, asset_id: &str, size: usize) -> Vec<Sample> {
        self.slot(asset_id)
            .map(|slot| lock(&slot).window(size))
            .unwrap_or_default()
    }

    pub fn latest(&self, asset_id: &str) -> Option<Sample> {
        self.slot(asset_id).and_then(|slot| lock(&slot).latest().cloned())
    }

    /// Window and counters read under a single lock acquisition.
    pub fn snapshot(&self, asset_id: &str, size: usize) -> Option<HistorySnapshot> {
        let slot = self.slot(asset_id)?;
        let history = lock(&slot);
        Some(HistorySnapshot {
            window: history.window(size),
            len: history.len(),
            total_accepted: history.total_accepted(),
        })
    }

    /// Build a sample from the asset's latest one with `derive`, validate
    /// it, and append it, all under the asset's lock.
    ///
    /// `None` when the asset has no history to derive from.
    pub fn derive_and_append<F>(
        &self,
        asset_id: &str,
        envelopes: &PerSignal<Envelope>,
        derive: F,
    ) -> Option<Result<Sample, ValidationError>>
    where
        F: FnOnce(&Sample) -> Sample,
    {
        let slot = self.slot(asset_id)?;
        let mut history = lock(&slot);
        let baseline = history.latest()?.clone();

        let raw = RawSample::from(&derive(&baseline));
        let result = validator::validate(&raw, Some(&baseline), envelopes).and_then(|sample| {
            history.push(sample.clone())?;
            Ok(sample)
        });
        Some(result)
    }

    pub fn len(&self, asset_id: &str) -> usize {
        self.slot(asset_id).map_or(0, |slot| lock(&slot).len())
    }

    pub fn total_accepted(&self, asset_id: &str) -> u64 {
        self.slot(asset_id).map_or(0, |slot| lock(&slot).total_accepted())
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.assets.contains_key(asset_id)
    }

    /// Known asset ids, sorted ascending.
    pub fn asset_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.assets.iter().map(|e| e.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    // Clone the Arc out so the DashMap shard guard is released before the
    // asset mutex is taken.
    fn slot(&self, asset_id: &str) -> Option<Slot> {
        self.assets.get(asset_id).map(|e| Arc::clone(e.value()))
    }

    fn slot_or_insert(&self, asset_id: &str) -> Slot {
        let capacity = self.capacity;
        Arc::clone(
            self.assets
                .entry(asset_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(AssetHistory::new(capacity))))
                .value(),
        )
    }
}

fn lock(slot: &Mutex<AssetHistory>) -> MutexGuard<'_, AssetHistory> {
    slot.lock().unwrap_or_else(|poisoned| {
        warn!("asset history lock poisoned, recovering");
        poisoned.into_inner()
    })
}
