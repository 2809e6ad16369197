//! Bounded LRU cache of deserialized weight dictionaries
//!
//! The cache holds at most `bound + 1` dictionaries: `bound` spares plus the one backing
//! the active model. Entries are independent copies, so the live model can be mutated
//! (precision conversion, placement) without touching what the cache holds.

use crate::record::CheckpointRecord;
use crate::weights::WeightDictionary;
use sdswap_common::Result;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a fraction in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        #[allow(clippy::cast_precision_loss)]
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

#[derive(Debug, Default)]
pub struct WeightCache {
    bound: usize,
    entries: HashMap<CheckpointRecord, WeightDictionary>,
    /// Front is least recently used.
    lru_order: VecDeque<CheckpointRecord>,
    stats: CacheStats,
}

impl WeightCache {
    pub fn new(bound: usize) -> Self {
        Self { bound, ..Self::default() }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// A bound of zero disables caching.
    pub fn is_enabled(&self) -> bool {
        self.bound > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Residency check that does not count as an access.
    pub fn contains(&self, record: &CheckpointRecord) -> bool {
        self.entries.contains_key(record)
    }

    /// Resident records, least recently used first.
    pub fn records(&self) -> impl Iterator<Item = &CheckpointRecord> {
        self.lru_order.iter()
    }

    /// Total tensor bytes held.
    pub fn resident_bytes(&self) -> usize {
        self.entries.values().map(WeightDictionary::total_bytes).sum()
    }

    /// Look up `record`, promoting it to most recently used on a hit.
    pub fn get(&mut self, record: &CheckpointRecord) -> Option<&WeightDictionary> {
        if !self.is_enabled() || !self.entries.contains_key(record) {
            self.stats.misses += 1;
            return None;
        }
        self.stats.hits += 1;
        self.promote_lru(record);
        self.entries.get(record)
    }

    /// Store an independent copy of `weights` and enforce the bound.
    pub fn put(&mut self, record: CheckpointRecord, weights: &WeightDictionary) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let copy = weights.deep_copy()?;
        debug!("Caching weights for {} ({} tensors)", record.title(), copy.len());
        self.promote_lru(&record);
        self.entries.insert(record, copy);
        self.stats.insertions += 1;
        self.evict_to_bound(self.bound);
        Ok(())
    }

    /// Evict least recently used entries until at most `bound + 1` remain.
    pub fn evict_to_bound(&mut self, bound: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > bound + 1 {
            let Some(victim) = self.lru_order.pop_front() else {
                break;
            };
            if self.entries.remove(&victim).is_some() {
                debug!("Evicted cached weights for {}", victim.title());
                self.stats.evictions += 1;
                evicted += 1;
            }
        }
        evicted
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!("Clearing {} cached weight set(s)", self.entries.len());
        }
        self.entries.clear();
        self.lru_order.clear();
    }

    /// Change the bound. Zero clears the cache.
    pub fn set_bound(&mut self, bound: usize) {
        self.bound = bound;
        if bound == 0 {
            self.clear();
        } else {
            self.evict_to_bound(bound);
        }
    }

    fn promote_lru(&mut self, record: &CheckpointRecord) {
        self.lru_order.retain(|r| r != record);
        self.lru_order.push_back(record.clone());
    }
}
