//! Triangle assembler (C7) and rectangle primitive (C8): per-primitive
//! state reconciliation, vertex clipping rejection, face culling, and
//! vertex-buffer emission.
//!
//! Grounded on the teacher's `gx::pipeline` (diff-against-last-sent-state
//! before touching the backend) and `gx::vertex`'s `VertexAccumulator`
//! (buffer-then-flush VBO emission), generalized from GX's always-on
//! streaming accumulator to the RCP's buffered-until-`MAX_BUFFERED_TRIS`
//! triangle assembler.

pub mod assembler;
pub mod rect;

pub use assembler::TriangleAssembler;

use crate::rdp::Rect;

/// Last values actually sent to the backend (§3 "Rendering state"). The
/// assembler diffs desired values against this before issuing any backend
/// call, flushing first if a diff requires one.
#[derive(Debug, Clone, Default)]
pub struct RenderingState {
    pub depth_test: bool,
    pub depth_mask: bool,
    pub decal_mode: bool,
    pub alpha_blend: bool,
    pub viewport: Rect,
    pub scissor: Rect,
    pub shader_program: Option<crate::backend::ShaderId>,
    pub bound_textures: [Option<crate::backend::TextureId>; 2],
}

/// Trivial clip rejection (§3 invariant, §4.3 step 1): a triangle is
/// rejected if all three vertices share at least one clip plane.
pub fn trivial_reject(c1: u8, c2: u8, c3: u8) -> bool {
    (c1 & c2 & c3) != 0
}
