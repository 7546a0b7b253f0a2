//! External collaborator interfaces.
//!
//! The translator core never touches a concrete graphics API, window system,
//! or asset store. Those concerns are modeled as trait objects supplied by
//! the embedding application, mirroring how the GameCube runtime this is
//! descended from kept `GXProcessor` free of `wgpu`/`winit` types and left
//! device/surface ownership to its `Renderer`.

/// Opaque handle to a backend-side compiled shader program.
pub type ShaderId = u32;

/// Opaque handle to a backend-side texture object.
pub type TextureId = u32;

/// The rasterization backend: texture upload, sampler state, shader
/// resolution, and draw submission. Every method here corresponds to one of
/// the backend calls the triangle assembler and texture cache reconcile
/// against `rendering_state` before issuing.
pub trait RenderBackend {
    /// Whether this backend's depth buffer expects `z` in `[0, 1]` (true) or
    /// `[-1, 1]` (false); selects the `z_adj` formula in the assembler.
    fn z_is_from_0_to_1(&self) -> bool;

    fn unload_shader(&mut self, prg: ShaderId);
    fn load_shader(&mut self, prg: ShaderId);
    /// Look up a previously created shader by its canonical fingerprint.
    fn lookup_shader(&self, shader_id0: u64, shader_id1: u32) -> Option<ShaderId>;
    /// Compile and register a new shader for this fingerprint.
    fn create_and_load_new_shader(&mut self, shader_id0: u64, shader_id1: u32) -> ShaderId;
    /// Number of per-vertex combiner inputs and which texture units a shader samples.
    fn shader_get_info(&self, prg: ShaderId) -> (u32, [bool; 2]);

    fn new_texture(&mut self) -> TextureId;
    fn select_texture(&mut self, unit: usize, id: TextureId);
    fn upload_texture(&mut self, rgba32: &[u8], width: u32, height: u32);
    fn set_sampler_parameters(&mut self, unit: usize, linear_filter: bool, cms: u8, cmt: u8);

    fn set_depth_test(&mut self, enable: bool);
    fn set_depth_mask(&mut self, enable: bool);
    fn set_zmode_decal(&mut self, enable: bool);
    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn set_scissor(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn set_use_alpha(&mut self, enable: bool);

    /// `buf` is packed floats, `buf_len` the element count, `num_tris` the
    /// triangle count (`buf_len == num_tris * 3 * floats_per_vertex`).
    fn draw_triangles(&mut self, buf: &[f32], buf_len: usize, num_tris: usize);

    fn start_frame(&mut self);
    fn end_frame(&mut self);
    fn finish_render(&mut self);
    fn init(&mut self);
}

/// Window/event capability. Consumed only by the thin frame bracket in
/// [`crate::context::Gfx`] — the translator does not create windows or pump
/// events itself.
pub trait WindowBackend {
    fn init(&mut self, title: &str, fullscreen: bool);
    fn handle_events(&mut self);
    fn get_dimensions(&self) -> (u32, u32);
    /// Returns `false` to request the caller drop this frame.
    fn start_frame(&mut self) -> bool;
    fn swap_buffers_begin(&mut self);
    fn swap_buffers_end(&mut self);
    fn get_time(&self) -> f64;
    fn set_frame_divisor(&mut self, divisor: u32);
}

/// Resolves a 64-bit content hash (carried by the `*_OTR` asset-reference
/// opcodes) to raw bytes. A `None` return makes the referencing command a
/// no-op; the interpreter never treats a miss as an error.
pub trait AssetLoader {
    fn load_vertices(&self, hash: u64) -> Option<&[u8]>;
    fn load_display_list(&self, hash: u64) -> Option<&[u8]>;
    fn load_texture(&self, hash: u64) -> Option<&[u8]>;
}
