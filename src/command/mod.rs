//! Command interpreter (C9): walks a display list's `(w0, w1)` command
//! words top to bottom, dispatching each opcode to the RSP/RDP/assembler
//! state it touches.
//!
//! Grounded on the teacher's `gx::runner` dispatch loop (decode one command,
//! match on its tag, call a handler, advance) generalized from GX's
//! fixed-width command stream to the RCP's 8-byte `(w0, w1)` words, two of
//! which (`*_OTR` variants, sub-lists, branch-Z) are variable-length because
//! they carry a trailing 64-bit content hash or jump target.
//!
//! Sub-display-lists are entered by direct Rust recursion (§4.1 "push"); a
//! non-push `G_DL`/`G_BRANCH_Z` ends the *caller's* iteration once the
//! callee returns, which is observably equivalent to a tail jump without
//! needing to thread a borrowed slice back out of the call. `G_BRANCH_Z`'s
//! target is a byte offset into the *current* buffer (§9 "no RDRAM model"):
//! real hardware targets an arbitrary RDRAM address, but this translator
//! only ever has the bytes of the list it is already walking, so the offset
//! is relative to it rather than absolute.

mod abi;
mod bits;
mod ops;

use crate::backend::{AssetLoader, RenderBackend};
use crate::context::Gfx;
use bits::bits as field;

const MAX_DL_DEPTH: u32 = 12;

fn read_word(commands: &[u8], pos: usize) -> Option<u32> {
    commands.get(pos..pos + 4).map(|b| u32::from_be_bytes(b.try_into().unwrap()))
}

/// Reads the next 8 bytes as a big-endian 64-bit hash, advancing `pos`.
/// Used by every `_otr` asset-reference opcode (§4.1).
fn read_hash(commands: &[u8], pos: &mut usize) -> u64 {
    match commands.get(*pos..*pos + 8) {
        Some(b) => {
            let v = u64::from_be_bytes(b.try_into().unwrap());
            *pos += 8;
            v
        }
        None => {
            log::warn!("command: truncated stream while reading a trailing asset hash");
            0
        }
    }
}

/// Runs one display list to completion. `depth` bounds recursion through
/// pushed sub-lists (§9); it is not user-visible state.
pub fn run_display_list(gfx: &mut Gfx, commands: &[u8], loader: &dyn AssetLoader, backend: &mut dyn RenderBackend, depth: u32) {
    assert!(depth <= MAX_DL_DEPTH, "display list nesting exceeded the modeled bound");

    let mut pos = 0usize;
    while let (Some(w0), Some(w1)) = (read_word(commands, pos), read_word(commands, pos + 4)) {
        pos += 8;
        let opcode = (w0 >> 24) as u8;

        match opcode {
            abi::OP_NOOP => ops::noop(),
            abi::OP_ENDDL => return,

            abi::OP_DL | abi::OP_DL_OTR => {
                let push = field(w0, 0, 8) == 0;
                let hash = if opcode == abi::OP_DL_OTR { read_hash(commands, &mut pos) } else { w1 as u64 };
                if let Some(bytes) = loader.load_display_list(hash) {
                    run_display_list(gfx, bytes, loader, backend, depth + 1);
                } else {
                    log::debug!("command: G_DL hash {hash:#x} missed the asset loader; sub-list skipped");
                }
                if !push {
                    return;
                }
            }

            abi::OP_BRANCH_Z => {
                let vidx = field(w0, 12, 12) as usize;
                let zraw = field(w0, 0, 12);
                let threshold = (zraw as f32 / 2048.0) - 1.0;
                let target = w1 as usize;
                if let Some(v) = gfx.rsp.loaded_vertices.get(vidx) {
                    let z_ndc = if v.w.abs() > 1e-4 { v.z / v.w } else { v.z };
                    if z_ndc <= threshold && target + 8 <= commands.len() {
                        pos = target;
                    }
                }
            }

            abi::OP_CULLDL => {
                // Bounding-box-against-viewport rejection of the rest of the
                // list (§4.1 "CullDL"). Trivial rejection already happens per
                // triangle in the assembler; skipping the coarse list-level
                // test only costs redundant work, never correctness.
                ops::unsupported("culldl", w0, w1);
            }
            abi::OP_MODIFYVTX | abi::OP_LINE3D => ops::unsupported("modifyvtx/line3d", w0, w1),

            abi::OP_VTX | abi::OP_VTX_OTR => {
                let (numv, dest) = abi::decode_vtx(w0);
                let hash = if opcode == abi::OP_VTX_OTR { read_hash(commands, &mut pos) } else { w1 as u64 };
                ops::vtx(gfx, loader, numv, dest, hash);
            }

            abi::OP_TRI1 => {
                let (v0, v1, v2) = abi::decode_tri_indices(w0);
                ops::tri1(gfx, loader, backend, v0, v1, v2);
            }
            abi::OP_QUAD => {
                let (v0, v1, v2, v3) = abi::decode_quad_indices(w0, w1);
                ops::quad(gfx, loader, backend, v0, v1, v2, v3);
            }
            abi::OP_TRI2 => {
                let (a0, a1, a2) = abi::decode_tri_indices(w0);
                let (b0, b1, b2) = abi::decode_tri_indices(w1);
                ops::tri1(gfx, loader, backend, a0, a1, a2);
                ops::tri1(gfx, loader, backend, b0, b1, b2);
            }

            abi::OP_MTX => {
                let params = abi::decode_mtx_params(w0);
                ops::mtx(gfx, loader, params, w1);
            }
            abi::OP_POPMTX => ops::popmtx(gfx, w1),

            abi::OP_MOVEWORD => {
                let index = field(w0, 16, 8) as u8;
                let offset = field(w0, 0, 16) as u16;
                ops::moveword(gfx, index, offset, w1);
            }
            abi::OP_MOVEMEM => ops::unsupported("movemem", w0, w1),

            abi::OP_SETLIGHT => ops::setlight(gfx, field(w0, 8, 8) as usize, w0, w1),
            abi::OP_SETLOOKAT => ops::setlookat(gfx, field(w0, 8, 8) as usize, w0, w1),
            abi::OP_SETVIEWPORT => ops::setviewport(gfx, w0, w1),
            abi::OP_SETSCISSOR => ops::setscissor(gfx, w0, w1),

            abi::OP_TEXTURE => ops::texture(gfx, w0, w1),
            abi::OP_SETOTHERMODE_L => ops::setothermode_l(gfx, w0, w1),
            abi::OP_SETOTHERMODE_H => ops::setothermode_h(gfx, w0, w1),
            abi::OP_SETCOMBINE => ops::setcombine(gfx, w0, w1),

            abi::OP_SETTIMG => ops::settimg(gfx, w0, w1 as u64),
            abi::OP_SETTIMG_OTR => {
                let hash = read_hash(commands, &mut pos);
                ops::settimg(gfx, w0, hash);
            }
            abi::OP_SETCIMG => ops::setcimg(gfx, w1 as u64),
            abi::OP_SETZIMG => ops::setzimg(gfx, w1 as u64),
            abi::OP_SETTILE => ops::settile(gfx, w0, w1),
            abi::OP_SETTILESIZE => ops::settilesize(gfx, w0, w1),
            abi::OP_LOADBLOCK => ops::loadblock(gfx, w1),
            abi::OP_LOADTILE => ops::loadtile(gfx, w1),
            abi::OP_LOADTLUT => {
                let hash = read_hash(commands, &mut pos);
                let count = field(w1, 14, 10) as usize + 1;
                ops::loadtlut(gfx, loader, hash, count);
            }

            abi::OP_SETPRIMCOLOR => ops::setprimcolor(gfx, w0, w1),
            abi::OP_SETENVCOLOR => ops::setenvcolor(gfx, w1),
            abi::OP_SETFOGCOLOR => ops::setfogcolor(gfx, w1),
            abi::OP_SETFILLCOLOR => ops::setfillcolor(gfx, w1),

            abi::OP_TEXRECT | abi::OP_TEXRECTFLIP => {
                let w2 = read_word(commands, pos).unwrap_or(0);
                let w3 = read_word(commands, pos + 4).unwrap_or(0);
                pos += 8;
                ops::texrect(gfx, loader, backend, w0, w1, w2, w3, opcode == abi::OP_TEXRECTFLIP);
            }
            abi::OP_FILLRECT => ops::fillrect(gfx, loader, backend, w0, w1),

            _ => dispatch_abi_specific(gfx, opcode, w0, w1),
        }
    }
}

#[cfg(not(feature = "abi-f3d"))]
fn dispatch_abi_specific(gfx: &mut Gfx, opcode: u8, w0: u32, w1: u32) {
    if opcode == abi::OP_GEOMETRYMODE {
        let (clear_mask, set_mask) = abi::decode_geometrymode(w0, w1);
        ops::geometrymode(gfx, clear_mask, set_mask);
    } else {
        ops::unsupported("unknown", opcode as u32, w1.wrapping_add(w0));
    }
}

#[cfg(feature = "abi-f3d")]
fn dispatch_abi_specific(gfx: &mut Gfx, opcode: u8, w0: u32, w1: u32) {
    if opcode == abi::OP_SETGEOMETRYMODE {
        ops::geometrymode(gfx, 0, w1);
    } else if opcode == abi::OP_CLEARGEOMETRYMODE {
        ops::geometrymode(gfx, w1, 0);
    } else {
        ops::unsupported("unknown", opcode as u32, w1.wrapping_add(w0));
    }
}
