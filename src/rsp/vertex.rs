//! Vertex loading (C6): transform, clip flags, lighting/texgen, fog.
//!
//! Grounded on the teacher's `gx/vertex.rs` `VertexAccumulator`
//! (begin/end-streaming into a `DrawCall`) for the general shape of
//! "consume raw per-vertex fields, write a processed vertex" — but this
//! loader is index-addressed into a fixed pool (`load_vertices(count,
//! dest_index, src)`) rather than `begin`/`end` streaming, since the RCP
//! format addresses vertex slots directly rather than accumulating a
//! variable-length stream.

use crate::config::MAX_VERTICES;
use crate::rsp::RspState;

pub const CLIP_X_NEG: u8 = 1 << 0;
pub const CLIP_X_POS: u8 = 1 << 1;
pub const CLIP_Y_NEG: u8 = 1 << 2;
pub const CLIP_Y_POS: u8 = 1 << 3;
pub const CLIP_Z_POS: u8 = 1 << 5;

/// A single input vertex as it appears in the source display-list buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrcVertex {
    pub ob: [f32; 3],
    pub tc: [i16; 2],
    /// Shared storage in the real encoding: interpreted as RGBA when
    /// lighting is off, or as a signed normal (+ alpha in `color[3]`) when
    /// lighting is on.
    pub color: [u8; 4],
    pub normal: [i8; 3],
}

/// A vertex after the RSP pipeline: clip-space position, computed
/// texcoord, shaded/passed-through color, and trivial-reject bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadedVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
    pub u: f32,
    pub v: f32,
    pub color: [u8; 4],
    pub clip_rej: u8,
}

impl RspState {
    /// Transform, light, and clip-classify `src`, writing the results into
    /// `loaded_vertices[dest_index .. dest_index + src.len()]`. Leaves every
    /// other slot untouched.
    pub fn load_vertices(&mut self, dest_index: usize, src: &[SrcVertex], aspect_ratio: f32) {
        self.lighting.recompute_if_dirty(self.matrices.modelview_top());
        for (i, v) in src.iter().enumerate() {
            let mp = &self.matrices.mp_matrix;
            let mut xyzw = [0.0f32; 4];
            for j in 0..4 {
                xyzw[j] =
                    v.ob[0] * mp[0][j] + v.ob[1] * mp[1][j] + v.ob[2] * mp[2][j] + 1.0 * mp[3][j];
            }
            let [mut x, y, z, w] = xyzw;
            x = x * (4.0 / 3.0) / aspect_ratio;

            let mut u = ((v.tc[0] as i32 * self.scale_s as i32) >> 16) as f32;
            let mut vcoord = ((v.tc[1] as i32 * self.scale_t as i32) >> 16) as f32;

            let mut color = [0u8; 4];
            if self.geometry_mode.contains(super::GeometryMode::LIGHTING) {
                let shaded = self.lighting.shade_vertex(v.normal);
                color[0] = shaded[0];
                color[1] = shaded[1];
                color[2] = shaded[2];
                if self.geometry_mode.contains(super::GeometryMode::TEXTURE_GEN) {
                    let linear = self.geometry_mode.contains(super::GeometryMode::TEXTURE_GEN_LINEAR);
                    let (tgu, tgv) = self.lighting.texgen(v.normal, linear);
                    u = tgu * self.scale_s as f32;
                    vcoord = tgv * self.scale_t as f32;
                }
            } else {
                color[0] = v.color[0];
                color[1] = v.color[1];
                color[2] = v.color[2];
            }

            let mut clip_rej = 0u8;
            if x < -w {
                clip_rej |= CLIP_X_NEG;
            }
            if x > w {
                clip_rej |= CLIP_X_POS;
            }
            if y < -w {
                clip_rej |= CLIP_Y_NEG;
            }
            if y > w {
                clip_rej |= CLIP_Y_POS;
            }
            // z < -w (near plane) is deliberately never tested.
            if z > w {
                clip_rej |= CLIP_Z_POS;
            }

            if self.geometry_mode.contains(super::GeometryMode::FOG) {
                let w_safe = if w.abs() < 0.001 { 0.001 } else { w };
                let mut winv = 1.0 / w_safe;
                if winv < 0.0 {
                    winv = 32767.0;
                }
                let fog_z = (z * winv * self.fog_mul as f32 + self.fog_offset as f32).clamp(0.0, 255.0);
                color[3] = fog_z as u8;
            } else {
                color[3] = v.color[3];
            }

            self.loaded_vertices[dest_index + i] = LoadedVertex {
                x,
                y,
                z,
                w,
                u,
                v: vcoord,
                color,
                clip_rej,
            };
        }
    }
}

/// Base index of the 4 synthetic rectangle-corner slots.
pub const RECT_VERTEX_BASE: usize = MAX_VERTICES;
