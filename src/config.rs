//! Fixed sizing constants.
//!
//! These mirror values baked into the original RCP microcode and its
//! reference port rather than anything tunable at runtime: the invariants in
//! [`crate::rsp`] and [`crate::triangle`] are stated in terms of them.

/// Depth of the loaded-vertex pool; the top 4 slots beyond this are reserved
/// for the rectangle primitive's synthetic corners.
pub const MAX_VERTICES: usize = 64;

/// Directional lights supported, not counting the trailing ambient entry.
pub const MAX_LIGHTS: usize = 32;

/// Maximum modelview matrix stack depth.
pub const MODELVIEW_STACK_DEPTH: usize = 11;

/// Triangles buffered before an automatic flush.
pub const MAX_BUFFERED_TRIS: usize = 256;

/// Floats per vertex in the worst case (position + 2 texcoords + fog + combiner inputs).
pub const FLOATS_PER_VERTEX: usize = 32;

/// Texture-cache pool size.
pub const TEXTURE_POOL_SIZE: usize = 512;

/// Texture-cache hash bucket count.
pub const TEXTURE_HASH_BUCKETS: usize = 1024;

/// Combiner pool size.
pub const COMBINER_POOL_SIZE: usize = 64;

/// Native render-target resolution the rectangle primitive (C8) lays its
/// NDC coordinates out against, since rectangles bypass the viewport and
/// draw against the full framebuffer (§4.6). Also the dimensions the
/// widescreen fill-rectangle hack (§9) detects a full-screen fill against.
pub const NATIVE_WIDTH: f32 = 320.0;
pub const NATIVE_HEIGHT: f32 = 240.0;
