//! The triangle assembler itself (C7): `tri1` plus the buffered-VBO flush.
//!
//! Grounded on the teacher's `gx::pipeline::PipelineCache::get_or_create`
//! diff-then-flush-then-set-then-record pattern for state reconciliation,
//! and `gx::vertex::VertexAccumulator` for buffer-then-flush emission.

use crate::backend::{AssetLoader, RenderBackend};
use crate::combiner::cache::CombinerCache;
use crate::combiner::compile::{options, CombinerId, InputSource};
use crate::config::MAX_BUFFERED_TRIS;
use crate::rdp::RdpState;
use crate::rsp::vertex::LoadedVertex;
use crate::rsp::{GeometryMode, RspState};
use crate::texture::cache::TextureCache;
use crate::texture::import::import_texture;

use super::RenderingState;

pub struct TriangleAssembler {
    rendering_state: RenderingState,
    buf: Vec<f32>,
    floats_per_vertex: usize,
    num_tris: usize,
}

impl TriangleAssembler {
    pub fn new() -> Self {
        Self {
            rendering_state: RenderingState::default(),
            buf: Vec::new(),
            floats_per_vertex: 0,
            num_tris: 0,
        }
    }

    pub fn rendering_state(&self) -> &RenderingState {
        &self.rendering_state
    }

    pub fn buffered_tris(&self) -> usize {
        self.num_tris
    }

    /// Submit the buffered triangles to the backend and reset the buffer.
    pub fn flush(&mut self, backend: &mut dyn RenderBackend) {
        if self.num_tris == 0 {
            return;
        }
        backend.draw_triangles(&self.buf, self.buf.len(), self.num_tris);
        self.buf.clear();
        self.num_tris = 0;
    }

    /// Assemble and (eventually) submit a triangle from three loaded-vertex
    /// indices. `is_rect` suppresses lighting/culling/z-buffer geometry
    /// flags and the viewport reconciliation step, per §4.6 — the caller
    /// (the rectangle primitive) is expected to have already saved/restored
    /// the viewport around its two `tri1` calls.
    #[allow(clippy::too_many_arguments)]
    pub fn tri1(
        &mut self,
        i1: usize,
        i2: usize,
        i3: usize,
        is_rect: bool,
        rsp: &RspState,
        rdp: &mut RdpState,
        combiner_cache: &mut CombinerCache,
        texture_cache: &mut TextureCache,
        loader: &dyn AssetLoader,
        backend: &mut dyn RenderBackend,
    ) {
        let v1 = rsp.loaded_vertices[i1];
        let v2 = rsp.loaded_vertices[i2];
        let v3 = rsp.loaded_vertices[i3];

        if super::trivial_reject(v1.clip_rej, v2.clip_rej, v3.clip_rej) {
            return;
        }

        let geom = if is_rect { GeometryMode::empty() } else { rsp.geometry_mode };

        if self.cull(geom, &v1, &v2, &v3) {
            return;
        }

        self.reconcile_state(geom, is_rect, rdp, backend);

        let cc_id = self.refine_combiner_id(rdp);
        let (_slot, compiled) = combiner_cache.lookup_or_compile(cc_id);
        let compiled = compiled.clone();

        for (unit, &used) in compiled.used_textures.iter().enumerate() {
            if !used {
                continue;
            }
            let tile_index = (rdp.first_tile_index as usize + unit).min(7);
            let tmem = rdp.texture_tile[tile_index].tmem_index();
            if rdp.textures_changed[tmem] {
                self.flush(backend);
                import_texture(unit, tile_index, rdp, texture_cache, loader, backend);
            }
        }

        let prg = match backend.lookup_shader(compiled.shader_id0, compiled.shader_id1) {
            Some(prg) => prg,
            None => backend.create_and_load_new_shader(compiled.shader_id0, compiled.shader_id1),
        };
        let (num_inputs, _shader_used_textures) = backend.shader_get_info(prg);

        let alpha_used = (cc_id & options::ALPHA) != 0;

        if self.rendering_state.shader_program != Some(prg) {
            self.flush(backend);
            backend.load_shader(prg);
            self.rendering_state.shader_program = Some(prg);
        }

        let floats_per_vertex = self.compute_vertex_layout(&compiled.used_textures, num_inputs, alpha_used, geom);
        if self.floats_per_vertex != floats_per_vertex {
            self.flush(backend);
            self.floats_per_vertex = floats_per_vertex;
        }

        let z_from_0_to_1 = backend.z_is_from_0_to_1();
        for v in [v1, v2, v3] {
            self.push_vertex(
                &v,
                rdp,
                &compiled.used_textures,
                &compiled.input_mapping[0],
                num_inputs,
                alpha_used,
                geom,
                z_from_0_to_1,
            );
        }

        self.num_tris += 1;
        if self.num_tris >= MAX_BUFFERED_TRIS {
            self.flush(backend);
        }
    }

    /// §4.3 step 2: reject based on the sign of the post-divide screen-space
    /// cross product, negated if an odd number of vertices have `w < 0`.
    fn cull(&self, geom: GeometryMode, v1: &LoadedVertex, v2: &LoadedVertex, v3: &LoadedVertex) -> bool {
        if geom.intersection(GeometryMode::CULL_BOTH).is_empty() {
            return false;
        }
        if geom.contains(GeometryMode::CULL_BOTH) {
            return true;
        }

        let screen = |v: &LoadedVertex| (v.x / v.w, v.y / v.w);
        let (x1, y1) = screen(v1);
        let (x2, y2) = screen(v2);
        let (x3, y3) = screen(v3);
        let mut cross = (x1 - x2) * (y3 - y2) - (y1 - y2) * (x3 - x2);

        let neg_w_count = [v1, v2, v3].iter().filter(|v| v.w < 0.0).count();
        if neg_w_count % 2 == 1 {
            cross = -cross;
        }

        if geom.contains(GeometryMode::CULL_FRONT) && cross > 0.0 {
            return true;
        }
        if geom.contains(GeometryMode::CULL_BACK) && cross < 0.0 {
            return true;
        }
        false
    }

    /// §4.3 step 3: diff every piece of state against `rendering_state`,
    /// flushing before any backend call that depends on it changing.
    fn reconcile_state(&mut self, geom: GeometryMode, is_rect: bool, rdp: &mut RdpState, backend: &mut dyn RenderBackend) {
        let depth_test = geom.contains(GeometryMode::ZBUFFER);
        if depth_test != self.rendering_state.depth_test {
            self.flush(backend);
            backend.set_depth_test(depth_test);
            self.rendering_state.depth_test = depth_test;
        }

        let depth_mask = rdp.other_mode_l & crate::rdp::Z_UPD != 0;
        if depth_mask != self.rendering_state.depth_mask {
            self.flush(backend);
            backend.set_depth_mask(depth_mask);
            self.rendering_state.depth_mask = depth_mask;
        }

        let decal_mode = rdp.other_mode_l & crate::rdp::ZMODE_DEC == crate::rdp::ZMODE_DEC;
        if decal_mode != self.rendering_state.decal_mode {
            self.flush(backend);
            backend.set_zmode_decal(decal_mode);
            self.rendering_state.decal_mode = decal_mode;
        }

        if !is_rect && rdp.viewport_or_scissor_changed {
            if rdp.viewport != self.rendering_state.viewport {
                self.flush(backend);
                let vp = rdp.viewport;
                backend.set_viewport(vp.x as i32, vp.y as i32, vp.w as i32, vp.h as i32);
                self.rendering_state.viewport = vp;
            }
            if rdp.scissor != self.rendering_state.scissor {
                self.flush(backend);
                let sc = rdp.scissor;
                backend.set_scissor(sc.x as i32, sc.y as i32, sc.w as i32, sc.h as i32);
                self.rendering_state.scissor = sc;
            }
            rdp.viewport_or_scissor_changed = false;
        }

        let alpha_blend = rdp.other_mode_l & crate::rdp::BLEND_1MA_OVER_MEMORY != 0;
        if alpha_blend != self.rendering_state.alpha_blend {
            self.flush(backend);
            backend.set_use_alpha(alpha_blend);
            self.rendering_state.alpha_blend = alpha_blend;
        }
    }

    /// §4.3 step 4: OR option bits into the combiner id, masking out the
    /// alpha-combiner fields if alpha isn't used by this primitive.
    fn refine_combiner_id(&self, rdp: &RdpState) -> CombinerId {
        let mut cc = rdp.combine_mode;
        let mut alpha_used = false;

        if rdp.other_mode_l & crate::rdp::BLEND_1MA_OVER_MEMORY != 0 {
            cc |= options::ALPHA;
            alpha_used = true;
        }
        if rdp.other_mode_l & crate::rdp::BLEND_SRC_IS_FOG != 0 {
            cc |= options::FOG;
        }
        if rdp.other_mode_l & crate::rdp::CVG_X_ALPHA != 0 {
            cc |= options::TEXTURE_EDGE;
        }
        if rdp.other_mode_l & crate::rdp::ALPHA_COMPARE_DITHER != 0 {
            cc |= options::NOISE;
        }
        if rdp.cycle_type() == crate::rdp::CYCLE_TYPE_2CYCLE {
            cc |= options::TWO_CYCLE;
        }

        if !alpha_used {
            // Mask out both cycles' 12 alpha-selector bits (§4.4's 16..28
            // range of each 28-bit cycle record).
            let alpha_mask_per_cycle: u64 = 0xfff << 16;
            cc &= !(alpha_mask_per_cycle | (alpha_mask_per_cycle << 28));
        }
        cc
    }

    fn compute_vertex_layout(&self, used_textures: &[bool; 2], num_inputs: u32, alpha_used: bool, geom: GeometryMode) -> usize {
        let mut n = 4; // x, y, z, w
        for &used in used_textures {
            if used {
                n += 2;
            }
        }
        if geom.contains(GeometryMode::FOG) {
            n += 4;
        }
        n += num_inputs as usize * if alpha_used { 4 } else { 3 };
        n
    }

    #[allow(clippy::too_many_arguments)]
    fn push_vertex(
        &mut self,
        v: &LoadedVertex,
        rdp: &RdpState,
        used_textures: &[bool; 2],
        input_mapping: &[InputSource; 7],
        num_inputs: u32,
        alpha_used: bool,
        geom: GeometryMode,
        z_from_0_to_1: bool,
    ) {
        let z_adj = if z_from_0_to_1 { (v.z + v.w) / 2.0 } else { v.z };
        self.buf.extend_from_slice(&[v.x, v.y, z_adj, v.w]);

        for &used in used_textures {
            if used {
                self.buf.push(v.u);
                self.buf.push(v.v);
            }
        }

        if geom.contains(GeometryMode::FOG) {
            self.buf.push(rdp.fog_color.r as f32 / 255.0);
            self.buf.push(rdp.fog_color.g as f32 / 255.0);
            self.buf.push(rdp.fog_color.b as f32 / 255.0);
            self.buf.push(v.color[3] as f32 / 255.0);
        }

        let fog_on = geom.contains(GeometryMode::FOG);
        for j in 0..(num_inputs as usize).min(7) {
            let sym = input_mapping[j];
            let rgb = resolve_input_rgb(sym, rdp, v);
            self.buf.extend_from_slice(&rgb);
            if alpha_used {
                let a = if fog_on && sym == InputSource::Shade {
                    1.0
                } else {
                    resolve_input_alpha(sym, rdp, v)
                };
                self.buf.push(a);
            }
        }
    }

}

impl Default for TriangleAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_input_rgb(sym: InputSource, rdp: &RdpState, v: &LoadedVertex) -> [f32; 3] {
    let c = |v: u8| v as f32 / 255.0;
    match sym {
        InputSource::Prim => [c(rdp.prim_color.r), c(rdp.prim_color.g), c(rdp.prim_color.b)],
        InputSource::PrimAlpha => [c(rdp.prim_color.a); 3],
        InputSource::PrimLodFrac | InputSource::LodFraction | InputSource::LodOrCombined => {
            [c(rdp.prim_lod_fraction); 3]
        }
        InputSource::Shade => [c(v.color[0]), c(v.color[1]), c(v.color[2])],
        InputSource::Env => [c(rdp.env_color.r), c(rdp.env_color.g), c(rdp.env_color.b)],
        InputSource::EnvAlpha => [c(rdp.env_color.a); 3],
        InputSource::Unused => [0.0; 3],
    }
}

fn resolve_input_alpha(sym: InputSource, rdp: &RdpState, v: &LoadedVertex) -> f32 {
    let c = |v: u8| v as f32 / 255.0;
    match sym {
        InputSource::Prim | InputSource::PrimAlpha => c(rdp.prim_color.a),
        InputSource::PrimLodFrac | InputSource::LodFraction | InputSource::LodOrCombined => {
            c(rdp.prim_lod_fraction)
        }
        InputSource::Shade => c(v.color[3]),
        InputSource::Env | InputSource::EnvAlpha => c(rdp.env_color.a),
        InputSource::Unused => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureId;
    use crate::combiner::cache::CombinerCache;
    use crate::texture::cache::TextureCache;

    struct NullLoader;
    impl AssetLoader for NullLoader {
        fn load_vertices(&self, _hash: u64) -> Option<&[u8]> {
            None
        }
        fn load_display_list(&self, _hash: u64) -> Option<&[u8]> {
            None
        }
        fn load_texture(&self, _hash: u64) -> Option<&[u8]> {
            None
        }
    }

    struct RecordingBackend {
        draws: u32,
        last_tris: usize,
        next_shader: u32,
    }
    impl RecordingBackend {
        fn new() -> Self {
            Self { draws: 0, last_tris: 0, next_shader: 1 }
        }
    }
    impl RenderBackend for RecordingBackend {
        fn z_is_from_0_to_1(&self) -> bool {
            false
        }
        fn unload_shader(&mut self, _prg: u32) {}
        fn load_shader(&mut self, _prg: u32) {}
        fn lookup_shader(&self, _a: u64, _b: u32) -> Option<u32> {
            None
        }
        fn create_and_load_new_shader(&mut self, _a: u64, _b: u32) -> u32 {
            let id = self.next_shader;
            self.next_shader += 1;
            id
        }
        fn shader_get_info(&self, _prg: u32) -> (u32, [bool; 2]) {
            (0, [false, false])
        }
        fn new_texture(&mut self) -> TextureId {
            1
        }
        fn select_texture(&mut self, _unit: usize, _id: TextureId) {}
        fn upload_texture(&mut self, _rgba32: &[u8], _w: u32, _h: u32) {}
        fn set_sampler_parameters(&mut self, _u: usize, _l: bool, _cms: u8, _cmt: u8) {}
        fn set_depth_test(&mut self, _e: bool) {}
        fn set_depth_mask(&mut self, _e: bool) {}
        fn set_zmode_decal(&mut self, _e: bool) {}
        fn set_viewport(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) {}
        fn set_scissor(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) {}
        fn set_use_alpha(&mut self, _e: bool) {}
        fn draw_triangles(&mut self, _buf: &[f32], _len: usize, tris: usize) {
            self.draws += 1;
            self.last_tris = tris;
        }
        fn start_frame(&mut self) {}
        fn end_frame(&mut self) {}
        fn finish_render(&mut self) {}
        fn init(&mut self) {}
    }

    fn ndc_vertex(x: f32, y: f32) -> LoadedVertex {
        LoadedVertex { x, y, z: 0.0, w: 1.0, u: 0.0, v: 0.0, color: [255, 255, 255, 255], clip_rej: 0 }
    }

    #[test]
    fn single_triangle_emits_one_draw_after_flush() {
        let mut rsp = RspState::new();
        rsp.loaded_vertices[0] = ndc_vertex(-1.0, -1.0);
        rsp.loaded_vertices[1] = ndc_vertex(1.0, -1.0);
        rsp.loaded_vertices[2] = ndc_vertex(0.0, 1.0);

        let mut rdp = RdpState::new();
        let mut combiner_cache = CombinerCache::new();
        let mut texture_cache = TextureCache::new();
        let loader = NullLoader;
        let mut backend = RecordingBackend::new();
        let mut asm = TriangleAssembler::new();

        asm.tri1(0, 1, 2, false, &rsp, &mut rdp, &mut combiner_cache, &mut texture_cache, &loader, &mut backend);
        assert_eq!(backend.draws, 0);
        assert_eq!(asm.buffered_tris(), 1);
        asm.flush(&mut backend);
        assert_eq!(backend.draws, 1);
        assert_eq!(backend.last_tris, 1);
    }

    #[test]
    fn cull_both_always_rejects() {
        let mut rsp = RspState::new();
        rsp.loaded_vertices[0] = ndc_vertex(-1.0, -1.0);
        rsp.loaded_vertices[1] = ndc_vertex(1.0, -1.0);
        rsp.loaded_vertices[2] = ndc_vertex(0.0, 1.0);
        rsp.geometry_mode = GeometryMode::CULL_BOTH;

        let mut rdp = RdpState::new();
        let mut combiner_cache = CombinerCache::new();
        let mut texture_cache = TextureCache::new();
        let loader = NullLoader;
        let mut backend = RecordingBackend::new();
        let mut asm = TriangleAssembler::new();

        asm.tri1(0, 1, 2, false, &rsp, &mut rdp, &mut combiner_cache, &mut texture_cache, &loader, &mut backend);
        assert_eq!(asm.buffered_tris(), 0);
    }

    #[test]
    fn trivial_reject_skips_assembly_entirely() {
        let mut rsp = RspState::new();
        let far = LoadedVertex { x: 2.0, y: 0.0, z: 0.0, w: 1.0, u: 0.0, v: 0.0, color: [0; 4], clip_rej: crate::rsp::vertex::CLIP_X_POS };
        rsp.loaded_vertices[0] = far;
        rsp.loaded_vertices[1] = far;
        rsp.loaded_vertices[2] = far;

        let mut rdp = RdpState::new();
        let mut combiner_cache = CombinerCache::new();
        let mut texture_cache = TextureCache::new();
        let loader = NullLoader;
        let mut backend = RecordingBackend::new();
        let mut asm = TriangleAssembler::new();

        asm.tri1(0, 1, 2, false, &rsp, &mut rdp, &mut combiner_cache, &mut texture_cache, &loader, &mut backend);
        assert_eq!(asm.buffered_tris(), 0);
    }
}
