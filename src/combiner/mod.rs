//! Color-combiner compiler + cache (C3, C4): translating the 64-bit
//! combiner identifier into a canonical shader fingerprint and per-vertex
//! input layout.

pub mod cache;
pub mod compile;

pub use cache::CombinerCache;
pub use compile::{compile, shade_only_combiner_id, CombinerId, CompiledCombiner, InputSource, RgbSelector, AlphaSelector};
