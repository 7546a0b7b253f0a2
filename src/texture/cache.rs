//! Hashed, bounded texture cache (C2).
//!
//! Modeled per the design notes as a flat pool of nodes with index-based
//! `next` pointers and index-based buckets, rather than the teacher's
//! `HashMap<String, RgbaImage>` (`texture/cache.rs`) — that shape can't
//! express the hardware's evict-all-on-full chain semantics, where stale
//! bucket entries are left in place and invalidated lazily by comparing the
//! referenced index against `pool_pos` rather than unlinked eagerly.

use crate::backend::{RenderBackend, TextureId};
use crate::config::{TEXTURE_HASH_BUCKETS, TEXTURE_POOL_SIZE};

#[derive(Debug, Clone)]
struct CacheEntry {
    next: Option<usize>,
    source_addr: usize,
    fmt: u8,
    siz: u8,
    palette_index: u8,
    backend_texture_id: Option<TextureId>,
    cms: u8,
    cmt: u8,
    linear_filter: bool,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            next: None,
            source_addr: 0,
            fmt: 0,
            siz: 0,
            palette_index: 0,
            backend_texture_id: None,
            cms: 0,
            cmt: 0,
            linear_filter: false,
        }
    }
}

fn bucket_of(addr: usize) -> usize {
    (addr >> 5) & (TEXTURE_HASH_BUCKETS - 1)
}

pub struct TextureCache {
    pool: Vec<CacheEntry>,
    buckets: [Option<usize>; TEXTURE_HASH_BUCKETS],
    pool_pos: usize,
}

/// Result of a cache probe: which pool slot holds (or will hold) the entry,
/// and whether the caller still needs to decode and upload pixel data.
pub struct Lookup {
    pub slot: usize,
    pub hit: bool,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            pool: vec![CacheEntry::default(); TEXTURE_POOL_SIZE],
            buckets: [None; TEXTURE_HASH_BUCKETS],
            pool_pos: 0,
        }
    }

    /// Clears the cache by resetting `pool_pos`; existing bucket links are
    /// left dangling and validated lazily via `idx < pool_pos` at lookup
    /// time, matching the original's `*node - pool < pool_pos` check.
    pub fn invalidate_all(&mut self) {
        self.pool_pos = 0;
    }

    fn chain_is_live(&self, idx: usize) -> bool {
        idx < self.pool_pos
    }

    /// Probe the cache for `(source_addr, fmt, siz, palette_index)`. On a
    /// hit, issues `select_texture` and returns `hit: true`. On a miss,
    /// allocates (recycling the pool from the front if full), issues
    /// `new_texture`/`select_texture` for the fresh slot, resets its sampler
    /// flags, links it at the head of its bucket, and returns `hit: false`
    /// — the caller must then decode and `upload_texture`.
    pub fn lookup(
        &mut self,
        unit: usize,
        backend: &mut dyn RenderBackend,
        source_addr: usize,
        fmt: u8,
        siz: u8,
        palette_index: u8,
    ) -> Lookup {
        let bucket = bucket_of(source_addr);
        let mut cur = self.buckets[bucket];
        while let Some(idx) = cur {
            if !self.chain_is_live(idx) {
                break;
            }
            let entry = &self.pool[idx];
            if entry.source_addr == source_addr
                && entry.fmt == fmt
                && entry.siz == siz
                && entry.palette_index == palette_index
            {
                let id = entry.backend_texture_id.expect("live entry always has a texture id");
                backend.select_texture(unit, id);
                return Lookup { slot: idx, hit: true };
            }
            cur = entry.next;
        }

        if self.pool_pos >= TEXTURE_POOL_SIZE {
            self.invalidate_all();
        }
        let slot = self.pool_pos;
        self.pool_pos += 1;

        let id = backend.new_texture();
        backend.select_texture(unit, id);

        self.pool[slot] = CacheEntry {
            next: self.buckets[bucket],
            source_addr,
            fmt,
            siz,
            palette_index,
            backend_texture_id: Some(id),
            cms: 0,
            cmt: 0,
            linear_filter: false,
        };
        self.buckets[bucket] = Some(slot);

        Lookup { slot, hit: false }
    }

    pub fn sampler_state(&self, slot: usize) -> (u8, u8, bool) {
        let e = &self.pool[slot];
        (e.cms, e.cmt, e.linear_filter)
    }

    pub fn set_sampler_state(&mut self, slot: usize, cms: u8, cmt: u8, linear_filter: bool) {
        let e = &mut self.pool[slot];
        e.cms = cms;
        e.cmt = cmt;
        e.linear_filter = linear_filter;
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}
