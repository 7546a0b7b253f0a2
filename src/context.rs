//! The translator's single owning context (§9 "Global mutable state →
//! process-wide context struct"): RSP, RDP, rendering state, and both
//! caches live here as fields of one struct rather than statics, mirroring
//! the teacher's `Renderer` owning a single `GXProcessor`/`GxState`.

use crate::backend::{AssetLoader, RenderBackend, WindowBackend};
use crate::combiner::cache::CombinerCache;
use crate::rdp::RdpState;
use crate::rsp::RspState;
use crate::texture::cache::TextureCache;
use crate::triangle::TriangleAssembler;

/// Public entry point: owns every piece of persistent translator state and
/// is the sole mutable surface the embedding application drives (§5).
pub struct Gfx {
    pub(crate) rsp: RspState,
    pub(crate) rdp: RdpState,
    pub(crate) combiner_cache: CombinerCache,
    pub(crate) texture_cache: TextureCache,
    pub(crate) assembler: TriangleAssembler,
    aspect_ratio: f32,
    frame_divisor: u32,
}

impl Gfx {
    pub fn new() -> Self {
        Self {
            rsp: RspState::new(),
            rdp: RdpState::new(),
            combiner_cache: CombinerCache::new(),
            texture_cache: TextureCache::new(),
            assembler: TriangleAssembler::new(),
            aspect_ratio: 4.0 / 3.0,
            frame_divisor: 1,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn init(&mut self, window: &mut dyn WindowBackend, backend: &mut dyn RenderBackend, name: &str, fullscreen: bool) {
        window.init(name, fullscreen);
        backend.init();
        let (w, h) = window.get_dimensions();
        if h > 0 {
            self.aspect_ratio = w as f32 / h as f32;
        }
    }

    /// `gfx_sp_reset` (§3 Lifecycles): RSP state resets at the start of
    /// every frame. RDP state, rendering state, and both caches persist.
    /// Returns `false` if the window reports the frame should be dropped —
    /// the caller must not call [`Gfx::run`] or [`Gfx::end_frame`] in that
    /// case (§7 "Dropped frames").
    pub fn start_frame(&mut self, window: &mut dyn WindowBackend, backend: &mut dyn RenderBackend) -> bool {
        window.handle_events();
        if !window.start_frame() {
            return false;
        }
        let (w, h) = window.get_dimensions();
        if h > 0 {
            self.aspect_ratio = w as f32 / h as f32;
        }
        self.rsp.reset();
        backend.start_frame();
        true
    }

    /// Consume one command list top to bottom (§4.1). Synchronous; never
    /// fails (§7).
    pub fn run(&mut self, commands: &[u8], loader: &dyn AssetLoader, backend: &mut dyn RenderBackend) {
        crate::command::run_display_list(self, commands, loader, backend, 0);
    }

    pub fn end_frame(&mut self, window: &mut dyn WindowBackend, backend: &mut dyn RenderBackend) {
        self.assembler.flush(backend);
        backend.end_frame();
        backend.finish_render();
        window.swap_buffers_begin();
        window.swap_buffers_end();
    }

    pub fn get_dimensions(&self, window: &dyn WindowBackend) -> (u32, u32) {
        window.get_dimensions()
    }

    pub fn set_framedivisor(&mut self, divisor: u32) {
        self.frame_divisor = divisor.max(1);
    }

    pub fn get_current_rendering_api(&self) -> &'static str {
        if cfg!(feature = "abi-f3d") {
            "f3d"
        } else {
            "f3dex2"
        }
    }
}

impl Default for Gfx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullWindow {
        w: u32,
        h: u32,
        ready: bool,
    }
    impl WindowBackend for NullWindow {
        fn init(&mut self, _title: &str, _fullscreen: bool) {}
        fn handle_events(&mut self) {}
        fn get_dimensions(&self) -> (u32, u32) {
            (self.w, self.h)
        }
        fn start_frame(&mut self) -> bool {
            self.ready
        }
        fn swap_buffers_begin(&mut self) {}
        fn swap_buffers_end(&mut self) {}
        fn get_time(&self) -> f64 {
            0.0
        }
        fn set_frame_divisor(&mut self, _divisor: u32) {}
    }

    struct NullBackend;
    impl RenderBackend for NullBackend {
        fn z_is_from_0_to_1(&self) -> bool {
            false
        }
        fn unload_shader(&mut self, _prg: u32) {}
        fn load_shader(&mut self, _prg: u32) {}
        fn lookup_shader(&self, _a: u64, _b: u32) -> Option<u32> {
            None
        }
        fn create_and_load_new_shader(&mut self, _a: u64, _b: u32) -> u32 {
            0
        }
        fn shader_get_info(&self, _prg: u32) -> (u32, [bool; 2]) {
            (0, [false, false])
        }
        fn new_texture(&mut self) -> u32 {
            1
        }
        fn select_texture(&mut self, _unit: usize, _id: u32) {}
        fn upload_texture(&mut self, _rgba32: &[u8], _w: u32, _h: u32) {}
        fn set_sampler_parameters(&mut self, _u: usize, _l: bool, _cms: u8, _cmt: u8) {}
        fn set_depth_test(&mut self, _e: bool) {}
        fn set_depth_mask(&mut self, _e: bool) {}
        fn set_zmode_decal(&mut self, _e: bool) {}
        fn set_viewport(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) {}
        fn set_scissor(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) {}
        fn set_use_alpha(&mut self, _e: bool) {}
        fn draw_triangles(&mut self, _buf: &[f32], _len: usize, _tris: usize) {}
        fn start_frame(&mut self) {}
        fn end_frame(&mut self) {}
        fn finish_render(&mut self) {}
        fn init(&mut self) {}
    }

    #[test]
    fn dropped_frame_reports_false() {
        let mut gfx = Gfx::new();
        let mut window = NullWindow { w: 640, h: 480, ready: false };
        let mut backend = NullBackend;
        assert!(!gfx.start_frame(&mut window, &mut backend));
    }

    #[test]
    fn ready_frame_resets_rsp_state() {
        let mut gfx = Gfx::new();
        gfx.rsp.matrices.apply(crate::rsp::matrix::MatrixParams::PUSH, crate::rsp::matrix::IDENTITY);
        let mut window = NullWindow { w: 640, h: 480, ready: true };
        let mut backend = NullBackend;
        assert!(gfx.start_frame(&mut window, &mut backend));
        assert_eq!(gfx.rsp.matrices.modelview_stack.len(), 1);
    }
}
