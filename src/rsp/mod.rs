//! RSP vertex pipeline (C5, C6): matrix stacks, lighting, and the loaded
//! vertex pool that feeds the triangle assembler.
//!
//! `RspState` is the per-frame owning struct for this half of the pipeline,
//! mirroring the teacher's `GxState` shape (one struct bundling every
//! sub-concern — vertex descriptors, matrices, lighting — behind narrow
//! methods) rather than splitting matrices/lighting/vertex-pool into
//! independently-owned siblings the caller must keep in sync.

pub mod lighting;
pub mod matrix;
pub mod vertex;

use crate::config::{MAX_VERTICES, MODELVIEW_STACK_DEPTH};
use lighting::LightingState;
use matrix::MatrixState;
use vertex::LoadedVertex;

bitflags::bitflags! {
    /// Geometry mode bitset (§3). Matches the RCP's semantic groupings; exact
    /// bit positions are an ABI concern decoded in [`crate::command`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GeometryMode: u32 {
        const LIGHTING            = 1 << 0;
        const TEXTURE_GEN         = 1 << 1;
        const TEXTURE_GEN_LINEAR  = 1 << 2;
        const FOG                 = 1 << 3;
        const ZBUFFER              = 1 << 4;
        const CULL_FRONT          = 1 << 5;
        const CULL_BACK           = 1 << 6;
    }
}

impl GeometryMode {
    pub const CULL_BOTH: Self = Self::from_bits_truncate(Self::CULL_FRONT.bits() | Self::CULL_BACK.bits());
}

pub struct RspState {
    pub matrices: MatrixState,
    pub lighting: LightingState,
    pub geometry_mode: GeometryMode,

    /// 16-bit signed fog multiplier/offset.
    pub fog_mul: i16,
    pub fog_offset: i16,

    /// Texture scale factor, unsigned 0.16 fixed point.
    pub scale_s: u16,
    pub scale_t: u16,

    /// `loaded_vertices[0..MAX_VERTICES]` is the general pool;
    /// `[MAX_VERTICES..MAX_VERTICES+4]` is reserved for rectangle corners.
    pub loaded_vertices: [LoadedVertex; MAX_VERTICES + 4],

    pub segment_pointers: [u32; 16],
}

impl RspState {
    pub fn new() -> Self {
        Self {
            matrices: MatrixState::new(),
            lighting: LightingState::new(),
            geometry_mode: GeometryMode::empty(),
            fog_mul: 0,
            fog_offset: 0,
            scale_s: 0xffff,
            scale_t: 0xffff,
            loaded_vertices: [LoadedVertex::default(); MAX_VERTICES + 4],
            segment_pointers: [0; 16],
        }
    }

    /// `gfx_sp_reset`: stack size = 1, num_lights = 2, lights dirty. Segment
    /// pointers and vertex pool persist across frames.
    pub fn reset(&mut self) {
        self.matrices.reset();
        self.lighting.reset();
        self.geometry_mode = GeometryMode::empty();
    }

    /// Resolve a segmented pointer (§4.1, §9): if the top byte lies in
    /// `[0xF0, 0xFF]` and that segment is registered, add the low 24 bits to
    /// the segment base; otherwise pass the raw value through unchanged.
    /// This deliberately permits real, non-segmented pointers.
    pub fn resolve_segment(&self, addr: u32) -> u32 {
        let top = (addr >> 24) as u8;
        if (0xF0..=0xFF).contains(&top) {
            let seg = (top - 0xF0) as usize;
            let base = self.segment_pointers[seg];
            if base != 0 {
                return base.wrapping_add(addr & 0x00ff_ffff);
            }
        }
        addr
    }
}

impl Default for RspState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_single_matrix_level() {
        let mut rsp = RspState::new();
        rsp.matrices.apply(matrix::MatrixParams::PUSH, matrix::IDENTITY);
        rsp.matrices.apply(matrix::MatrixParams::PUSH, matrix::IDENTITY);
        assert_eq!(rsp.matrices.modelview_stack.len(), 3);
        rsp.reset();
        assert_eq!(rsp.matrices.modelview_stack.len(), 1);
        assert_eq!(rsp.lighting.current_num_lights, 2);
    }

    #[test]
    fn unsegmented_pointer_passes_through() {
        let rsp = RspState::new();
        assert_eq!(rsp.resolve_segment(0x8012_3456), 0x8012_3456);
    }

    #[test]
    fn segmented_pointer_resolves_against_bound_segment() {
        let mut rsp = RspState::new();
        rsp.segment_pointers[1] = 0x8000_0000;
        assert_eq!(rsp.resolve_segment(0xF100_1000), 0x8000_1000);
    }

    #[test]
    fn segmented_pointer_unbound_segment_passes_through_raw() {
        let rsp = RspState::new();
        assert_eq!(rsp.resolve_segment(0xF200_1000), 0xF200_1000);
    }

    #[test]
    fn stack_depth_const_matches_matrix_bound() {
        assert_eq!(MODELVIEW_STACK_DEPTH, 11);
    }
}
