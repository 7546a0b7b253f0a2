//! End-to-end coverage driven entirely through the public `Gfx` API: raw
//! `(w0, w1)` command words in, backend calls out. Opcode values and
//! bitfield layouts below match the default `abi-f3dex2` Cargo feature.

use std::collections::HashMap;

use fast3d::{AssetLoader, Gfx, RenderBackend, ShaderId, TextureId, WindowBackend};

// f3dex2 opcode bytes (top byte of w0).
const OP_VTX: u8 = 0x01;
const OP_TRI1: u8 = 0x05;
const OP_GEOMETRYMODE: u8 = 0xd9;
const OP_SETOTHERMODE_H: u8 = 0xe3;
const OP_SETCOMBINE: u8 = 0xfc;
const OP_SETTIMG: u8 = 0xfd;
const OP_SETTILE: u8 = 0xf5;
const OP_SETTILESIZE: u8 = 0xf2;
const OP_LOADBLOCK: u8 = 0xf3;
const OP_TEXRECT: u8 = 0xe4;
const OP_MTX: u8 = 0xda;
const OP_ENDDL: u8 = 0xdf;

const CULL_BACK: u32 = 1 << 6;

fn word(opcode: u8, rest24: u32) -> u32 {
    ((opcode as u32) << 24) | (rest24 & 0x00ff_ffff)
}

fn push(buf: &mut Vec<u8>, w0: u32, w1: u32) {
    buf.extend_from_slice(&w0.to_be_bytes());
    buf.extend_from_slice(&w1.to_be_bytes());
}

fn enddl(buf: &mut Vec<u8>) {
    push(buf, word(OP_ENDDL, 0), 0);
}

/// `G_VTX`: `numv` vertices landing at `dest`, source bytes read from
/// `hash` through the asset loader.
fn vtx_cmd(buf: &mut Vec<u8>, numv: u32, dest: u32, hash: u32) {
    let top = dest + numv;
    push(buf, word(OP_VTX, (numv << 12) | (top << 1)), hash);
}

fn tri1_cmd(buf: &mut Vec<u8>, v0: u32, v1: u32, v2: u32) {
    let ops24 = (v0 * 2) << 16 | (v1 * 2) << 8 | (v2 * 2);
    push(buf, word(OP_TRI1, ops24), 0);
}

/// One vertex in the 16-byte source layout `ops::vtx` expects: position,
/// 2 unused bytes, texcoord, then either RGBA or a signed normal + alpha.
fn src_vertex(x: i16, y: i16, z: i16, s: i16, t: i16, color: [u8; 4]) -> [u8; 16] {
    let mut b = [0u8; 16];
    b[0..2].copy_from_slice(&x.to_be_bytes());
    b[2..4].copy_from_slice(&y.to_be_bytes());
    b[4..6].copy_from_slice(&z.to_be_bytes());
    b[8..10].copy_from_slice(&s.to_be_bytes());
    b[10..12].copy_from_slice(&t.to_be_bytes());
    b[12..16].copy_from_slice(&color);
    b
}

struct TestLoader {
    vertices: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, Vec<u8>>,
}

impl TestLoader {
    fn new() -> Self {
        Self { vertices: HashMap::new(), textures: HashMap::new() }
    }
}

impl AssetLoader for TestLoader {
    fn load_vertices(&self, hash: u64) -> Option<&[u8]> {
        self.vertices.get(&hash).map(Vec::as_slice)
    }
    fn load_display_list(&self, _hash: u64) -> Option<&[u8]> {
        None
    }
    fn load_texture(&self, hash: u64) -> Option<&[u8]> {
        self.textures.get(&hash).map(Vec::as_slice)
    }
}

struct TestWindow {
    w: u32,
    h: u32,
    ready: bool,
}
impl WindowBackend for TestWindow {
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

#[derive(Default)]
struct CountingBackend {
    draws: u32,
    last_tris: usize,
    uploads: u32,
    selects: u32,
    next_shader: ShaderId,
    next_texture: TextureId,
}
impl RenderBackend for CountingBackend {
    fn z_is_from_0_to_1(&self) -> bool {
        false
    }
    fn unload_shader(&mut self, _prg: ShaderId) {}
    fn load_shader(&mut self, _prg: ShaderId) {}
    fn lookup_shader(&self, _a: u64, _b: u32) -> Option<ShaderId> {
        None
    }
    fn create_and_load_new_shader(&mut self, _a: u64, _b: u32) -> ShaderId {
        self.next_shader += 1;
        self.next_shader
    }
    fn shader_get_info(&self, _prg: ShaderId) -> (u32, [bool; 2]) {
        (0, [false, false])
    }
    fn new_texture(&mut self) -> TextureId {
        self.next_texture += 1;
        self.next_texture
    }
    fn select_texture(&mut self, _unit: usize, _id: TextureId) {
        self.selects += 1;
    }
    fn upload_texture(&mut self, _rgba32: &[u8], _w: u32, _h: u32) {
        self.uploads += 1;
    }
    fn set_sampler_parameters(&mut self, _u: usize, _linear: bool, _cms: u8, _cmt: u8) {}
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

fn run_frame(gfx: &mut Gfx, commands: &[u8], loader: &dyn AssetLoader, window: &mut TestWindow, backend: &mut CountingBackend) {
    assert!(gfx.start_frame(window, backend));
    gfx.run(commands, loader, backend);
    gfx.end_frame(window, backend);
}

#[test]
fn empty_display_list_draws_nothing() {
    let mut gfx = Gfx::new();
    let loader = TestLoader::new();
    let mut window = TestWindow { w: 640, h: 480, ready: true };
    let mut backend = CountingBackend::default();

    let mut buf = Vec::new();
    enddl(&mut buf);
    run_frame(&mut gfx, &buf, &loader, &mut window, &mut backend);

    assert_eq!(backend.draws, 0);
}

#[test]
fn single_triangle_draws_once() {
    let mut gfx = Gfx::new();
    let mut loader = TestLoader::new();
    loader.vertices.insert(
        0x1000,
        [
            src_vertex(-1, -1, 0, 0, 0, [255, 255, 255, 255]),
            src_vertex(1, -1, 0, 0, 0, [255, 255, 255, 255]),
            src_vertex(0, 1, 0, 0, 0, [255, 255, 255, 255]),
        ]
        .concat(),
    );
    let mut window = TestWindow { w: 640, h: 480, ready: true };
    let mut backend = CountingBackend::default();

    let mut buf = Vec::new();
    vtx_cmd(&mut buf, 3, 0, 0x1000);
    tri1_cmd(&mut buf, 0, 1, 2);
    enddl(&mut buf);
    run_frame(&mut gfx, &buf, &loader, &mut window, &mut backend);

    assert_eq!(backend.draws, 1);
    assert_eq!(backend.last_tris, 1);
}

#[test]
fn back_facing_triangle_is_culled_with_cull_back_enabled() {
    let mut gfx = Gfx::new();
    let mut loader = TestLoader::new();
    // Same winding as `single_triangle_draws_once`: its cross product is
    // negative, so `CULL_BACK` rejects it.
    loader.vertices.insert(
        0x1000,
        [
            src_vertex(-1, -1, 0, 0, 0, [255, 255, 255, 255]),
            src_vertex(1, -1, 0, 0, 0, [255, 255, 255, 255]),
            src_vertex(0, 1, 0, 0, 0, [255, 255, 255, 255]),
        ]
        .concat(),
    );
    let mut window = TestWindow { w: 640, h: 480, ready: true };
    let mut backend = CountingBackend::default();

    let mut buf = Vec::new();
    push(&mut buf, word(OP_GEOMETRYMODE, 0), CULL_BACK);
    vtx_cmd(&mut buf, 3, 0, 0x1000);
    tri1_cmd(&mut buf, 0, 1, 2);
    enddl(&mut buf);
    run_frame(&mut gfx, &buf, &loader, &mut window, &mut backend);

    assert_eq!(backend.draws, 0);
}

/// Assembles a COPY-mode textured-rectangle command stream against a 4x4
/// RGBA16 texture staged at `texture_hash`, reusing the same tile/TMEM
/// setup every call so repeated invocations exercise the texture cache.
fn push_copy_mode_texrect(buf: &mut Vec<u8>, texture_hash: u32) {
    // G_SETOTHERMODE_H: cycle type (shift 20, 2 bits) = COPY (2).
    push(buf, word(OP_SETOTHERMODE_H, (20 << 8) | 1), 2 << 20);
    // G_SETTIMG: RGBA, 16-bit, width 4.
    push(buf, word(OP_SETTIMG, (2 << 19) | 3), texture_hash);
    // G_SETTILE: tile 0, fmt RGBA, siz 16-bit, one 8-byte line, tmem 0.
    push(buf, word(OP_SETTILE, (2 << 19) | (1 << 9)), 0);
    // G_SETTILESIZE: tile 0, bounds (0,0)-(12,12) in U10.2 -> 4x4 texels.
    push(buf, word(OP_SETTILESIZE, 0), (12 << 12) | 12);
    // G_LOADBLOCK: tile 0, 16 texels (15 encoded).
    push(buf, word(OP_LOADBLOCK, 0), 15);
    // G_SETCOMBINE: cycle0 selects TEXEL0 for the `a` RGB input.
    push(buf, word(OP_SETCOMBINE, 0), 1);
    // G_TEXRECT: (0,0)-(40,40) in U10.2, s=t=0, dsdx=dtdy=0.
    push(buf, word(OP_TEXRECT, (160 << 12) | 160), 0);
    push(buf, 0, 0);
}

#[test]
fn copy_mode_textured_rectangle_draws_two_triangles() {
    let mut gfx = Gfx::new();
    let mut loader = TestLoader::new();
    loader.textures.insert(0xbeef, vec![0xff; 32]);
    let mut window = TestWindow { w: 640, h: 480, ready: true };
    let mut backend = CountingBackend::default();

    let mut buf = Vec::new();
    push_copy_mode_texrect(&mut buf, 0xbeef);
    enddl(&mut buf);
    run_frame(&mut gfx, &buf, &loader, &mut window, &mut backend);

    assert_eq!(backend.draws, 1);
    assert_eq!(backend.last_tris, 2);
    assert_eq!(backend.uploads, 1);
}

#[test]
fn second_rectangle_with_same_texture_hits_the_cache() {
    let mut gfx = Gfx::new();
    let mut loader = TestLoader::new();
    loader.textures.insert(0xbeef, vec![0xff; 32]);
    let mut window = TestWindow { w: 640, h: 480, ready: true };
    let mut backend = CountingBackend::default();

    let mut first = Vec::new();
    push_copy_mode_texrect(&mut first, 0xbeef);
    enddl(&mut first);
    run_frame(&mut gfx, &first, &loader, &mut window, &mut backend);
    assert_eq!(backend.uploads, 1);

    let mut second = Vec::new();
    push_copy_mode_texrect(&mut second, 0xbeef);
    enddl(&mut second);
    run_frame(&mut gfx, &second, &loader, &mut window, &mut backend);

    assert_eq!(backend.uploads, 1, "repeated texture must not re-upload");
    assert!(backend.selects >= 2, "cache hit still rebinds the texture unit");
}

#[test]
fn matrix_stack_overflow_guard_caps_push_depth() {
    let mut gfx = Gfx::new();
    let mut loader = TestLoader::new();
    // An identity matrix in the fixed-point 16-word interleaved encoding
    // `abi-f3dex2` (the default feature) decodes. Words 0..8 hold integer
    // halves two-per-row (`[int(c0,c1), int(c2,c3)]`); words 8..16 hold the
    // matching fractional halves (left zero here). Diagonal cells land in
    // the high 16 bits of an even-column word or the low 16 bits of an
    // odd-column one, per `decode_fixed_point_matrix`.
    let mut words = [0i32; 16];
    words[0] = 1i32 << 16; // m[0][0]
    words[2] = 1i32; // m[1][1]
    words[5] = 1i32 << 16; // m[2][2]
    words[7] = 1i32; // m[3][3]
    let mut matrix_bytes = Vec::with_capacity(64);
    for w in words {
        matrix_bytes.extend_from_slice(&w.to_be_bytes());
    }
    loader.vertices.insert(0x2000, matrix_bytes);
    loader.vertices.insert(
        0x1000,
        [
            src_vertex(-1, -1, 0, 0, 0, [255, 255, 255, 255]),
            src_vertex(1, -1, 0, 0, 0, [255, 255, 255, 255]),
            src_vertex(0, 1, 0, 0, 0, [255, 255, 255, 255]),
        ]
        .concat(),
    );

    let mut window = TestWindow { w: 640, h: 480, ready: true };
    let mut backend = CountingBackend::default();

    let mut buf = Vec::new();
    const PARAMS_PUSH_LOAD: u32 = 0x4 | 0x2;
    for _ in 0..12 {
        push(&mut buf, word(OP_MTX, PARAMS_PUSH_LOAD), 0x2000);
    }
    vtx_cmd(&mut buf, 3, 0, 0x1000);
    tri1_cmd(&mut buf, 0, 1, 2);
    enddl(&mut buf);
    run_frame(&mut gfx, &buf, &loader, &mut window, &mut backend);

    // No public accessor exposes modelview stack depth directly — the
    // 11-deep cap itself is covered at the unit level in
    // `rsp::matrix::tests::stack_overflow_guard_caps_depth_at_eleven`. This
    // confirms the same 12-push command stream leaves the pipeline in a
    // state that still transforms and draws a triangle afterwards, i.e. the
    // guard doesn't leave the stack or `mp_matrix` corrupted.
    assert_eq!(backend.draws, 1);
    assert_eq!(backend.last_tris, 1);
}
