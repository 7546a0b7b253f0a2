//! Rectangle primitive (C8): synthesize textured/filled rectangles as two
//! triangles, funneled through the same [`TriangleAssembler::tri1`] the
//! geometry pipeline uses, via the reserved corner slots at
//! [`crate::rsp::vertex::RECT_VERTEX_BASE`].

use crate::backend::{AssetLoader, RenderBackend};
use crate::combiner::cache::CombinerCache;
use crate::config::{NATIVE_HEIGHT, NATIVE_WIDTH};
use crate::rdp::RdpState;
use crate::rsp::vertex::{LoadedVertex, RECT_VERTEX_BASE};
use crate::rsp::RspState;
use crate::texture::cache::TextureCache;

use super::TriangleAssembler;

/// U10.2 fixed point (2 fractional bits: one pixel == 4 units).
fn u10_2_to_pixels(v: i16) -> f32 {
    v as f32 / 4.0
}

fn rect_ndc(px: f32, py: f32, aspect_ratio: f32) -> (f32, f32) {
    let mut x = (px / NATIVE_WIDTH) * 2.0 - 1.0;
    let y = 1.0 - (py / NATIVE_HEIGHT) * 2.0;
    x = x * (4.0 / 3.0) / aspect_ratio;
    (x, y)
}

/// Widescreen fill-rectangle hack (§9 "Open questions"): a fill that covers
/// the full native 320x240 frame is instead drawn across a much wider
/// region so it also covers the letterboxed sides of a widescreen target.
/// Preserved as a feature, not a bug.
fn widescreen_fill_bounds(ulx: i16, uly: i16, lrx: i16, lry: i16) -> (i16, i16, i16, i16) {
    let full_screen = u10_2_to_pixels(ulx) <= 0.0
        && u10_2_to_pixels(uly) <= 0.0
        && u10_2_to_pixels(lrx) >= NATIVE_WIDTH - 1.0
        && u10_2_to_pixels(lry) >= NATIVE_HEIGHT - 1.0;
    if full_screen {
        (-1024 * 4, uly, 2048 * 4, lry)
    } else {
        (ulx, uly, lrx, lry)
    }
}

/// Saves the currently-bound viewport, binds a full-framebuffer viewport
/// for the duration of `f`, then restores the saved one. Rectangles bypass
/// the viewport entirely (§4.6).
fn with_full_framebuffer_viewport(
    assembler: &mut TriangleAssembler,
    backend: &mut dyn RenderBackend,
    f: impl FnOnce(&mut TriangleAssembler, &mut dyn RenderBackend),
) {
    let saved = assembler.rendering_state().viewport;
    assembler.flush(backend);
    backend.set_viewport(0, 0, NATIVE_WIDTH as i32, NATIVE_HEIGHT as i32);
    f(assembler, backend);
    assembler.flush(backend);
    backend.set_viewport(saved.x as i32, saved.y as i32, saved.w as i32, saved.h as i32);
}

fn write_corners(rsp: &mut RspState, corners: [(f32, f32, f32, f32); 4]) {
    for (i, (x, y, u, v)) in corners.into_iter().enumerate() {
        rsp.loaded_vertices[RECT_VERTEX_BASE + i] = LoadedVertex {
            x,
            y,
            z: -1.0,
            w: 1.0,
            u,
            v,
            color: [255, 255, 255, 255],
            clip_rej: 0,
        };
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_quad(
    rsp: &mut RspState,
    rdp: &mut RdpState,
    assembler: &mut TriangleAssembler,
    combiner_cache: &mut CombinerCache,
    texture_cache: &mut TextureCache,
    loader: &dyn AssetLoader,
    backend: &mut dyn RenderBackend,
    corners: [(f32, f32, f32, f32); 4],
) {
    write_corners(rsp, corners);
    let base = RECT_VERTEX_BASE;
    with_full_framebuffer_viewport(assembler, backend, |assembler, backend| {
        assembler.tri1(base, base + 1, base + 2, true, rsp, rdp, combiner_cache, texture_cache, loader, backend);
        assembler.tri1(base, base + 2, base + 3, true, rsp, rdp, combiner_cache, texture_cache, loader, backend);
    });
}

/// Textured rectangle (optionally U/V-flipped), §4.6.
///
/// `ulx/uly/lrx/lry` are screen coordinates in U10.2 fixed point; `s`/`t`
/// are the starting texture coordinate in S10.5; `dsdx`/`dtdy` are the
/// per-pixel texture-coordinate step in S5.10 (texels-per-pixel). In COPY
/// cycle mode the caller is expected to have already divided `dsdx` by 4
/// (§4.6 — dsdx is documented in texels-per-four-texels in that mode) and
/// extended `lrx`/`lry` by one pixel; this function only applies the POINT
/// filter override.
#[allow(clippy::too_many_arguments)]
pub fn textured_rectangle(
    rsp: &mut RspState,
    rdp: &mut RdpState,
    assembler: &mut TriangleAssembler,
    combiner_cache: &mut CombinerCache,
    texture_cache: &mut TextureCache,
    loader: &dyn AssetLoader,
    backend: &mut dyn RenderBackend,
    ulx: i16,
    uly: i16,
    lrx: i16,
    lry: i16,
    s: i16,
    t: i16,
    dsdx: i32,
    dtdy: i32,
    flip: bool,
    aspect_ratio: f32,
) {
    let copy_mode = rdp.cycle_type() == crate::rdp::CYCLE_TYPE_COPY;
    let saved_other_mode_h = rdp.other_mode_h;
    if copy_mode {
        rdp.other_mode_h &= !(0x3 << crate::rdp::G_MDSFT_TEXTFILT);
    }

    let ulx_px = u10_2_to_pixels(ulx);
    let uly_px = u10_2_to_pixels(uly);
    let lrx_px = u10_2_to_pixels(lrx);
    let lry_px = u10_2_to_pixels(lry);

    let uv_at = |px: f32, py: f32| -> (f32, f32) {
        let dx = px - ulx_px;
        let dy = py - uly_px;
        let (du, dv) = if flip { (dy, dx) } else { (dx, dy) };
        let u = s as f32 / 32.0 + (dsdx as f32 / 1024.0) * du;
        let v = t as f32 / 32.0 + (dtdy as f32 / 1024.0) * dv;
        (u, v)
    };

    let (ul_ndc_x, ul_ndc_y) = rect_ndc(ulx_px, uly_px, aspect_ratio);
    let (lr_ndc_x, lr_ndc_y) = rect_ndc(lrx_px, lry_px, aspect_ratio);
    let (ul_u, ul_v) = uv_at(ulx_px, uly_px);
    let (lr_u, lr_v) = uv_at(lrx_px, lry_px);
    let (ll_ndc_x, ll_ndc_y) = (ul_ndc_x, lr_ndc_y);
    let (ll_u, ll_v) = uv_at(ulx_px, lry_px);
    let (ur_ndc_x, ur_ndc_y) = (lr_ndc_x, ul_ndc_y);
    let (ur_u, ur_v) = uv_at(lrx_px, uly_px);

    let corners = [
        (ul_ndc_x, ul_ndc_y, ul_u, ul_v),
        (ll_ndc_x, ll_ndc_y, ll_u, ll_v),
        (lr_ndc_x, lr_ndc_y, lr_u, lr_v),
        (ur_ndc_x, ur_ndc_y, ur_u, ur_v),
    ];

    emit_quad(rsp, rdp, assembler, combiner_cache, texture_cache, loader, backend, corners);

    if copy_mode {
        rdp.other_mode_h = saved_other_mode_h;
    }
}

/// Filled rectangle, §4.6: the combiner is temporarily overridden to emit
/// the fill color as shade, `lr{x,y}` are extended by one pixel, and the
/// draw is skipped entirely if it targets the currently-bound z-buffer
/// (cleared elsewhere, outside this translator's scope).
#[allow(clippy::too_many_arguments)]
pub fn filled_rectangle(
    rsp: &mut RspState,
    rdp: &mut RdpState,
    assembler: &mut TriangleAssembler,
    combiner_cache: &mut CombinerCache,
    texture_cache: &mut TextureCache,
    loader: &dyn AssetLoader,
    backend: &mut dyn RenderBackend,
    ulx: i16,
    uly: i16,
    lrx: i16,
    lry: i16,
    aspect_ratio: f32,
) {
    if rdp.color_image_address.is_some() && rdp.color_image_address == rdp.z_buf_address {
        return;
    }

    let (ulx, uly, lrx, lry) = widescreen_fill_bounds(ulx, uly, lrx, lry);
    let lrx = lrx.saturating_add(4);
    let lry = lry.saturating_add(4);

    let saved_combine_mode = rdp.combine_mode;
    rdp.combine_mode = crate::combiner::compile::shade_only_combiner_id();

    let fill = rdp.fill_color;
    for i in 0..4 {
        rsp.loaded_vertices[RECT_VERTEX_BASE + i].color = [fill.r, fill.g, fill.b, fill.a];
    }

    let (ulx_px, uly_px) = (u10_2_to_pixels(ulx), u10_2_to_pixels(uly));
    let (lrx_px, lry_px) = (u10_2_to_pixels(lrx), u10_2_to_pixels(lry));
    let (ul_x, ul_y) = rect_ndc(ulx_px, uly_px, aspect_ratio);
    let (lr_x, lr_y) = rect_ndc(lrx_px, lry_px, aspect_ratio);

    let corners = [(ul_x, ul_y, 0.0, 0.0), (ul_x, lr_y, 0.0, 0.0), (lr_x, lr_y, 0.0, 0.0), (lr_x, ul_y, 0.0, 0.0)];

    emit_quad(rsp, rdp, assembler, combiner_cache, texture_cache, loader, backend, corners);

    rdp.combine_mode = saved_combine_mode;
}
