//! `fast3d`: a fixed-function GPU command-list translator for the Reality
//! Co-Processor (RCP) display-list format used by a late-1990s home
//! console's microcode. It consumes a stream of `(w0, w1)` command words and
//! re-emits equivalent draw calls against a modern rasterization backend,
//! reproducing the original pipeline's matrix stacks, vertex lighting and
//! texgen, two-cycle color/alpha combiner, tile/TMEM texture loading, and
//! blender flags — without emulating the RCP's microcode or rasterizing in
//! software.
//!
//! The crate never touches a concrete windowing or graphics API: those are
//! modeled as the [`backend`] traits, supplied by the embedding application.
//! The single entry point is [`Gfx`], constructed once and driven through a
//! `start_frame` / [`Gfx::run`] / `end_frame` cycle per frame.

pub mod backend;
pub mod combiner;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod rdp;
pub mod rsp;
pub mod texture;
pub mod triangle;

pub use backend::{AssetLoader, RenderBackend, ShaderId, TextureId, WindowBackend};
pub use context::Gfx;
pub use error::Fast3dError;
