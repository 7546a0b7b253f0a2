//! Combiner cache (C4): memoizes [`compile`] results in a fixed pool.
//!
//! The source has no documented eviction path for the 64-entry pool (§4.4,
//! §9 "Combiner pool overflow" open question). We pick policy (b) from §9 —
//! recycle the least-recently-filled slot once the pool is full — recorded
//! in `DESIGN.md`. This keeps `lookup_or_compile` total (it always returns a
//! usable entry) rather than leaving the 65th unique combiner undefined.

use crate::config::COMBINER_POOL_SIZE;
use smallvec::SmallVec;

use super::compile::{compile, CombinerId, CompiledCombiner};

pub struct CombinerCache {
    pool: SmallVec<[CompiledCombiner; COMBINER_POOL_SIZE]>,
    /// Index of the most recently used entry; checked first on every lookup.
    mru: usize,
    /// Next pool slot to fill once `pool.len() == COMBINER_POOL_SIZE`; wraps,
    /// implementing the FIFO-recycle policy.
    next_evict: usize,
}

impl CombinerCache {
    pub fn new() -> Self {
        Self {
            pool: SmallVec::new(),
            mru: 0,
            next_evict: 0,
        }
    }

    /// MRU-checked, then linear-scanned, then compiled-and-inserted lookup
    /// (§4.4). Returns the pool index so the caller can read `prg[tm]`-style
    /// per-clamp-flag shader variants alongside the compiled fingerprint.
    pub fn lookup_or_compile(&mut self, cc_id: CombinerId) -> (usize, &CompiledCombiner) {
        if let Some(entry) = self.pool.get(self.mru) {
            if entry.cc_id == cc_id {
                return (self.mru, &self.pool[self.mru]);
            }
        }
        if let Some(idx) = self.pool.iter().position(|e| e.cc_id == cc_id) {
            self.mru = idx;
            return (idx, &self.pool[idx]);
        }

        let compiled = compile(cc_id);
        let idx = if self.pool.len() < COMBINER_POOL_SIZE {
            self.pool.push(compiled);
            self.pool.len() - 1
        } else {
            let idx = self.next_evict;
            self.pool[idx] = compiled;
            self.next_evict = (self.next_evict + 1) % COMBINER_POOL_SIZE;
            idx
        };
        self.mru = idx;
        (idx, &self.pool[idx])
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl Default for CombinerCache {
    fn default() -> Self {
        Self::new()
    }
}
