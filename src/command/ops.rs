//! Opcode handlers shared by both ABI variants: everything that doesn't
//! change shape between `f3d` and `f3dex2` (§4.1) — colors, tiles, the
//! combiner, other-mode words, and the rectangle primitives.

use crate::backend::{AssetLoader, RenderBackend};
use crate::combiner::compile::shade_only_combiner_id;
use crate::context::Gfx;
use crate::rdp::{Tile, CYCLE_TYPE_COPY};
use crate::rsp::matrix::{decode_fixed_point_matrix, decode_float_matrix, MatrixParams};
use crate::rsp::vertex::SrcVertex;
use crate::triangle::rect;

use super::bits::{bits, sext12};

pub fn noop() {}

pub fn unsupported(name: &str, w0: u32, w1: u32) {
    log::debug!("command: opcode {name} (w0={w0:#010x} w1={w1:#010x}) not modeled; ignored");
}

/// `G_MTX`: `addr` is a segment-resolved RDRAM pointer in real hardware.
/// This translator has no memory model, so the 16-word matrix block is
/// instead supplied inline via the asset loader's vertex channel, keyed by
/// the same resolved value treated as a hash (§9 "texture addressing"
/// precedent, generalized to matrices).
pub fn mtx(gfx: &mut Gfx, loader: &dyn AssetLoader, params_raw: u8, addr: u32) {
    let params = MatrixParams::from_bits_truncate(params_raw);
    let resolved = gfx.rsp.resolve_segment(addr);
    let Some(bytes) = loader.load_vertices(resolved as u64) else {
        log::warn!("command: G_MTX hash {resolved:#x} missed the asset loader; matrix unchanged");
        return;
    };
    // Both encodings pack a 16-word (64-byte) block; which one a given
    // command stream carries is a property of the microcode build, not of
    // the bytes themselves, so (like the rest of `command::abi`) the two
    // variants are chosen by Cargo feature rather than sniffed from `bytes`.
    if bytes.len() < 16 * 4 {
        log::warn!("command: G_MTX asset too short ({} bytes); ignored", bytes.len());
        return;
    }
    let matrix = if cfg!(feature = "abi-f3d") {
        let mut words = [0f32; 16];
        for (i, w) in words.iter_mut().enumerate() {
            *w = f32::from_be_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        decode_float_matrix(&words)
    } else {
        let mut words = [0i32; 16];
        for (i, w) in words.iter_mut().enumerate() {
            *w = i32::from_be_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        decode_fixed_point_matrix(&words)
    };
    let modelview_changed = gfx.rsp.matrices.apply(params, matrix);
    if modelview_changed {
        gfx.rsp.lighting.dirty = true;
    }
}

pub fn popmtx(gfx: &mut Gfx, count: u32) {
    gfx.rsp.matrices.pop(count);
    gfx.rsp.lighting.dirty = true;
}

/// `G_VTX`/`G_VTX_OTR`: load `numv` vertices starting at `dest`. `hash` is
/// either the zero-extended raw pointer (classic opcode) or a full 64-bit
/// content hash (`_otr` opcode, read from a trailing command word).
pub fn vtx(gfx: &mut Gfx, loader: &dyn AssetLoader, numv: u32, dest: u32, hash: u64) {
    let Some(bytes) = loader.load_vertices(hash) else {
        log::debug!("command: G_VTX hash {hash:#x} missed the asset loader; load skipped");
        return;
    };
    const SRC_VERTEX_BYTES: usize = 16;
    let numv = numv as usize;
    if bytes.len() < numv * SRC_VERTEX_BYTES {
        log::warn!(
            "command: G_VTX asset too short for {numv} vertices ({} bytes available); truncating",
            bytes.len()
        );
    }
    let available = bytes.len() / SRC_VERTEX_BYTES;
    let count = numv.min(available);
    let mut src = Vec::with_capacity(count);
    for i in 0..count {
        let b = &bytes[i * SRC_VERTEX_BYTES..(i + 1) * SRC_VERTEX_BYTES];
        let ob = [
            i16::from_be_bytes([b[0], b[1]]) as f32,
            i16::from_be_bytes([b[2], b[3]]) as f32,
            i16::from_be_bytes([b[4], b[5]]) as f32,
        ];
        let tc = [i16::from_be_bytes([b[8], b[9]]), i16::from_be_bytes([b[10], b[11]])];
        let color = [b[12], b[13], b[14], b[15]];
        let normal = [b[12] as i8, b[13] as i8, b[14] as i8];
        src.push(SrcVertex { ob, tc, color, normal });
    }
    gfx.rsp.load_vertices(dest as usize, &src, gfx.aspect_ratio());
}

#[allow(clippy::too_many_arguments)]
pub fn tri1(gfx: &mut Gfx, loader: &dyn AssetLoader, backend: &mut dyn RenderBackend, v0: usize, v1: usize, v2: usize) {
    gfx.assembler.tri1(
        v0,
        v1,
        v2,
        false,
        &gfx.rsp,
        &mut gfx.rdp,
        &mut gfx.combiner_cache,
        &mut gfx.texture_cache,
        loader,
        backend,
    );
}

#[allow(clippy::too_many_arguments)]
pub fn quad(gfx: &mut Gfx, loader: &dyn AssetLoader, backend: &mut dyn RenderBackend, v0: usize, v1: usize, v2: usize, v3: usize) {
    tri1(gfx, loader, backend, v0, v1, v2);
    tri1(gfx, loader, backend, v0, v2, v3);
}

pub fn geometrymode(gfx: &mut Gfx, clear_mask: u32, set_mask: u32) {
    let bits = (gfx.rsp.geometry_mode.bits() & !clear_mask) | set_mask;
    gfx.rsp.geometry_mode = crate::rsp::GeometryMode::from_bits_truncate(bits);
}

/// `G_MOVEWORD`, restricted to the indices this translator actually models
/// (segment table, fog coefficients, light count); the rest (`CLIP`,
/// `LIGHTCOL`, `FORCEMTX`, `PERSPNORM`) are logged and ignored (§7).
pub fn moveword(gfx: &mut Gfx, index: u8, offset: u16, data: u32) {
    const G_MW_NUMLIGHT: u8 = 0x02;
    const G_MW_SEGMENT: u8 = 0x06;
    const G_MW_FOG: u8 = 0x08;
    match index {
        G_MW_SEGMENT => {
            let seg = ((offset / 4) & 0xf) as usize;
            gfx.rsp.segment_pointers[seg] = data;
        }
        G_MW_NUMLIGHT => {
            gfx.rsp.lighting.current_num_lights = (data as u8).saturating_add(1);
            gfx.rsp.lighting.dirty = true;
        }
        G_MW_FOG => {
            gfx.rsp.fog_mul = (data >> 16) as i16;
            gfx.rsp.fog_offset = (data & 0xffff) as i16;
        }
        other => unsupported("moveword", other as u32, data),
    }
}

/// Inline light descriptor, replacing the real `G_MOVEMEM`'s memory-block
/// indirection (§9 "texture addressing" applies the same reasoning here: no
/// RDRAM model exists for this translator to read a packed `Light` struct
/// from).
pub fn setlight(gfx: &mut Gfx, index: usize, w0: u32, w1: u32) {
    let dir = [bits(w0, 16, 8) as i8, bits(w0, 8, 8) as i8, bits(w0, 0, 8) as i8];
    let col = [bits(w1, 24, 8) as u8, bits(w1, 16, 8) as u8, bits(w1, 8, 8) as u8];
    if index < gfx.rsp.lighting.lights.len() {
        gfx.rsp.lighting.lights[index] = crate::rsp::lighting::Light { dir, col };
        gfx.rsp.lighting.dirty = true;
    } else {
        log::warn!("command: G_SETLIGHT index {index} out of range; ignored");
    }
}

pub fn setlookat(gfx: &mut Gfx, index: usize, w0: u32, w1: u32) {
    let dir = [bits(w0, 16, 8) as i8, bits(w0, 8, 8) as i8, bits(w0, 0, 8) as i8];
    let col = [bits(w1, 24, 8) as u8, bits(w1, 16, 8) as u8, bits(w1, 8, 8) as u8];
    if index < 2 {
        gfx.rsp.lighting.lookat[index] = crate::rsp::lighting::Light { dir, col };
        gfx.rsp.lighting.dirty = true;
    }
}

pub fn texture(gfx: &mut Gfx, w0: u32, w1: u32) {
    let tile = bits(w0, 8, 3) as u8;
    gfx.rdp.first_tile_index = tile;
    gfx.rsp.scale_s = bits(w1, 16, 16) as u16;
    gfx.rsp.scale_t = bits(w1, 0, 16) as u16;
}

/// Inline viewport/scissor rectangle, replacing `G_MOVEMEM`'s viewport
/// indirection for the same reason as [`setlight`].
pub fn setviewport(gfx: &mut Gfx, w0: u32, w1: u32) {
    gfx.rdp.viewport = rect_from_words(w0, w1);
    gfx.rdp.viewport_or_scissor_changed = true;
}

pub fn setscissor(gfx: &mut Gfx, w0: u32, w1: u32) {
    gfx.rdp.scissor = rect_from_words(w0, w1);
    gfx.rdp.viewport_or_scissor_changed = true;
}

fn rect_from_words(w0: u32, w1: u32) -> crate::rdp::Rect {
    crate::rdp::Rect {
        x: bits(w0, 16, 16) as u16,
        y: bits(w0, 0, 16) as u16,
        w: bits(w1, 16, 16) as u16,
        h: bits(w1, 0, 16) as u16,
    }
}

pub fn setothermode_l(gfx: &mut Gfx, w0: u32, w1: u32) {
    let shift = bits(w0, 8, 8);
    let length = bits(w0, 0, 8) + 1;
    let mask = ((1u64 << length) - 1) << shift;
    let mode = (w1 as u64) & mask;
    gfx.rdp.set_other_mode(shift, length, mode);
}

pub fn setothermode_h(gfx: &mut Gfx, w0: u32, w1: u32) {
    // `shift`/`length` address a field local to the 32-bit `other_mode_h`
    // word (same range `cycle_type`/`texture_filter_is_point` read from),
    // but the combined 64-bit mode word packs `other_mode_h` above bit 32
    // (§3's "one 64-bit blender/cycle mask") — so the field must be pulled
    // out of `w1` at its local position, then shifted up before merging.
    let local_shift = bits(w0, 8, 8);
    let length = bits(w0, 0, 8) + 1;
    let local_mask = ((1u64 << length) - 1) << local_shift;
    let mode_local = (w1 as u64) & local_mask;
    gfx.rdp.set_other_mode(local_shift + 32, length, mode_local << 32);
}

pub fn setcombine(gfx: &mut Gfx, w0: u32, w1: u32) {
    let cycle0 = (w1 & 0x0fff_ffff) as u64;
    let cycle1 = (w0 & 0x0fff_ffff) as u64;
    gfx.rdp.combine_mode = cycle0 | (cycle1 << 28);
}

pub fn setprimcolor(gfx: &mut Gfx, w0: u32, w1: u32) {
    let m = bits(w0, 8, 8) as u8;
    let l = bits(w0, 0, 8) as u8;
    let r = bits(w1, 24, 8) as u8;
    let g = bits(w1, 16, 8) as u8;
    let b = bits(w1, 8, 8) as u8;
    let a = bits(w1, 0, 8) as u8;
    gfx.rdp.prim_lod_fraction = l;
    gfx.rdp.set_prim_color(m, l, r, g, b, a);
}

pub fn setenvcolor(gfx: &mut Gfx, w1: u32) {
    let [r, g, b, a] = w1.to_be_bytes();
    gfx.rdp.set_env_color(r, g, b, a);
}

pub fn setfogcolor(gfx: &mut Gfx, w1: u32) {
    let [r, g, b, a] = w1.to_be_bytes();
    gfx.rdp.set_fog_color(r, g, b, a);
}

pub fn setfillcolor(gfx: &mut Gfx, w1: u32) {
    gfx.rdp.set_fill_color(w1 as u16);
}

pub fn setcimg(gfx: &mut Gfx, hash: u64) {
    gfx.rdp.color_image_address = Some(hash);
}

pub fn setzimg(gfx: &mut Gfx, hash: u64) {
    gfx.rdp.z_buf_address = Some(hash);
}

/// `G_SETTIMG`/`G_SETTIMG_OTR`: stages the texture about to be loaded.
/// `hash` is the asset identity [`crate::rdp::TextureToLoad::addr`] is later
/// carried through [`crate::rdp::LoadedTexture::addr`] to the texture cache
/// as (§9 "texture addressing").
pub fn settimg(gfx: &mut Gfx, w0: u32, hash: u64) {
    let siz = bits(w0, 19, 2) as u8;
    let width = bits(w0, 0, 12) + 1;
    gfx.rdp.texture_to_load = crate::rdp::TextureToLoad { addr: Some(hash), siz, width };
}

pub fn settile(gfx: &mut Gfx, w0: u32, w1: u32) {
    let fmt = bits(w0, 21, 3) as u8;
    let siz = bits(w0, 19, 2) as u8;
    let line = bits(w0, 9, 9);
    let tmem = bits(w0, 0, 9);

    let tile_idx = bits(w1, 24, 3) as usize;
    let palette = bits(w1, 20, 4) as u8;
    let cmt = bits(w1, 18, 2) as u8;
    let cms = bits(w1, 8, 2) as u8;

    if tile_idx >= gfx.rdp.texture_tile.len() {
        log::warn!("command: G_SETTILE tile index {tile_idx} out of range; ignored");
        return;
    }
    let existing = gfx.rdp.texture_tile[tile_idx];
    gfx.rdp.texture_tile[tile_idx] = Tile {
        fmt,
        siz,
        cms,
        cmt,
        line_size_bytes: line * 8,
        palette_index: palette,
        tmem: (tmem * 8) as u16,
        ..existing
    };
}

pub fn settilesize(gfx: &mut Gfx, w0: u32, w1: u32) {
    let uls = sext12(bits(w0, 12, 12));
    let ult = sext12(bits(w0, 0, 12));
    let tile_idx = bits(w1, 24, 3) as usize;
    let lrs = sext12(bits(w1, 12, 12));
    let lrt = sext12(bits(w1, 0, 12));
    if tile_idx >= gfx.rdp.texture_tile.len() {
        return;
    }
    let t = &mut gfx.rdp.texture_tile[tile_idx];
    t.uls = uls;
    t.ult = ult;
    t.lrs = lrs;
    t.lrt = lrt;
}

/// `G_LOADBLOCK`: commits `texture_to_load` into the TMEM half the target
/// tile names. Over-capacity loads are a programmer invariant (§7 class 1):
/// [`crate::error::Fast3dError::LoadBlockTooLarge`] backs an `assert!` that
/// terminates the process rather than being silently skipped.
pub fn loadblock(gfx: &mut Gfx, w1: u32) {
    const TMEM_CAPACITY_BYTES: usize = 4096;
    let tile_idx = bits(w1, 24, 3) as usize;
    let texels = bits(w1, 0, 12) + 1;
    if tile_idx >= gfx.rdp.texture_tile.len() {
        return;
    }
    let siz = gfx.rdp.texture_to_load.siz;
    let bytes_per_texel_x2 = match siz {
        0 => 1u32, // 4-bit: half a byte per texel
        1 => 2,
        2 => 4,
        _ => 8,
    };
    let size_bytes = ((texels * bytes_per_texel_x2) / 2) as usize;
    assert!(
        size_bytes <= TMEM_CAPACITY_BYTES,
        "{}",
        crate::error::Fast3dError::LoadBlockTooLarge(size_bytes)
    );

    let tmem = gfx.rdp.texture_tile[tile_idx].tmem_index();
    let full_line = gfx.rdp.texture_tile[tile_idx].line_size_bytes;
    gfx.rdp.loaded_texture[tmem] = crate::rdp::LoadedTexture {
        addr: gfx.rdp.texture_to_load.addr,
        size_bytes: size_bytes as u32,
        full_image_line_size_bytes: full_line,
        line_size_bytes: full_line,
    };
    gfx.rdp.textures_changed[tmem] = true;
}

pub fn loadtile(gfx: &mut Gfx, w1: u32) {
    // Same staging as loadblock; the per-row/rect distinction only matters
    // for how much of `texture_to_load` the decoder walks, which the
    // decoder itself derives from the tile's `uls/ult/lrs/lrt` (§4.3 step 6).
    loadblock(gfx, w1);
}

pub fn loadtlut(gfx: &mut Gfx, loader: &dyn AssetLoader, hash: u64, count: usize) {
    let Some(bytes) = loader.load_texture(hash) else {
        log::debug!("command: G_LOADTLUT hash {hash:#x} missed the asset loader; palette unchanged");
        return;
    };
    let n = (count * 2).min(bytes.len()).min(gfx.rdp.palette.len());
    gfx.rdp.palette[..n].copy_from_slice(&bytes[..n]);
}

#[allow(clippy::too_many_arguments)]
pub fn texrect(
    gfx: &mut Gfx,
    loader: &dyn AssetLoader,
    backend: &mut dyn RenderBackend,
    w0: u32,
    w1: u32,
    w2: u32,
    w3: u32,
    flip: bool,
) {
    let ops0 = w0 & 0x00ff_ffff;
    let lrx = sext12(bits(ops0, 12, 12));
    let lry = sext12(bits(ops0, 0, 12));
    let ulx = sext12(bits(w1, 12, 12));
    let uly = sext12(bits(w1, 0, 12));

    let s = bits(w2, 16, 16) as i16;
    let t = bits(w2, 0, 16) as i16;
    let mut dsdx = bits(w3, 16, 16) as i16 as i32;
    let mut dtdy = bits(w3, 0, 16) as i16 as i32;

    let (mut lrx, mut lry) = (lrx, lry);
    if gfx.rdp.cycle_type() == CYCLE_TYPE_COPY {
        dsdx /= 4;
        lrx = lrx.saturating_add(4);
        lry = lry.saturating_add(4);
    }

    let aspect_ratio = gfx.aspect_ratio();
    rect::textured_rectangle(
        &mut gfx.rsp,
        &mut gfx.rdp,
        &mut gfx.assembler,
        &mut gfx.combiner_cache,
        &mut gfx.texture_cache,
        loader,
        backend,
        ulx,
        uly,
        lrx,
        lry,
        s,
        t,
        dsdx,
        dtdy,
        flip,
        aspect_ratio,
    );
    let _ = dtdy;
}

pub fn fillrect(gfx: &mut Gfx, loader: &dyn AssetLoader, backend: &mut dyn RenderBackend, w0: u32, w1: u32) {
    let ops0 = w0 & 0x00ff_ffff;
    let lrx = sext12(bits(ops0, 12, 12));
    let lry = sext12(bits(ops0, 0, 12));
    let ulx = sext12(bits(w1, 12, 12));
    let uly = sext12(bits(w1, 0, 12));
    let aspect_ratio = gfx.aspect_ratio();
    rect::filled_rectangle(
        &mut gfx.rsp,
        &mut gfx.rdp,
        &mut gfx.assembler,
        &mut gfx.combiner_cache,
        &mut gfx.texture_cache,
        loader,
        backend,
        ulx,
        uly,
        lrx,
        lry,
        aspect_ratio,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Gfx;

    #[test]
    #[should_panic(expected = "exceeds TMEM capacity")]
    fn loadblock_over_capacity_panics() {
        let mut gfx = Gfx::new();
        gfx.rdp.texture_tile[0].tmem = 0;
        gfx.rdp.texture_to_load.siz = 3; // 32-bit: 4 bytes/texel
        // texels = 1024 + 1 = 1025; 1025 * 4 bytes = 4100, past the cap.
        let w1 = (0u32 << 24) | 1024;
        loadblock(&mut gfx, w1);
    }

    #[test]
    fn loadblock_within_capacity_marks_texture_changed() {
        let mut gfx = Gfx::new();
        gfx.rdp.texture_tile[0].tmem = 0;
        gfx.rdp.texture_to_load.siz = 2; // 16-bit: 2 bytes/texel
        let w1 = (0u32 << 24) | 1023; // 1024 texels * 2 bytes = 2048 bytes
        loadblock(&mut gfx, w1);
        assert!(gfx.rdp.textures_changed[0]);
    }
}
