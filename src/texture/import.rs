//! Glue between the texture cache (C2), the pixel decoders (C1), and the
//! asset loader: the triangle assembler calls [`import_texture`] once per
//! used unit whenever `rdp.textures_changed[unit]` is set (§4.3 step 6).

use crate::backend::{AssetLoader, RenderBackend};
use crate::rdp::RdpState;
use crate::texture::cache::TextureCache;
use crate::texture::decode::{self, ImageFormat, ImageSize};

/// Resolve, and if necessary decode and upload, the texture bound to
/// `tile_index` for sampler `unit`. A cache hit only reselects the backend
/// texture; a miss decodes via the asset loader and uploads fresh RGBA8.
///
/// Asset-loader misses and the documented RGBA×4b/8b silent no-op (§4.5,
/// §7) leave the unit's previous binding untouched and are never treated as
/// errors — only an unrecognized fmt×siz combination panics.
pub fn import_texture(
    unit: usize,
    tile_index: usize,
    rdp: &mut RdpState,
    texture_cache: &mut TextureCache,
    loader: &dyn AssetLoader,
    backend: &mut dyn RenderBackend,
) {
    let tile = rdp.texture_tile[tile_index];
    let tmem = tile.tmem_index();
    let loaded = rdp.loaded_texture[tmem];

    let Some(hash) = loaded.addr else {
        log::warn!("import_texture: tile {tile_index} has no loaded texture; skipping");
        rdp.textures_changed[tmem] = false;
        return;
    };

    let source_addr = hash as usize;
    let lookup = texture_cache.lookup(unit, backend, source_addr, tile.fmt, tile.siz, tile.palette_index);
    if lookup.hit {
        rdp.textures_changed[tmem] = false;
        return;
    }

    match loader.load_texture(hash) {
        None => {
            log::debug!("import_texture: asset loader miss for hash {hash:#x}; texture left unbound");
        }
        Some(bytes) => {
            let fmt = ImageFormat::from_u8(tile.fmt);
            let siz = ImageSize::from_u8(tile.siz);
            match decode::decode(
                fmt,
                siz,
                bytes,
                tile.line_size_bytes,
                loaded.full_image_line_size_bytes,
                loaded.size_bytes,
                &rdp.palette,
            ) {
                Ok(Some((rgba, w, h))) => backend.upload_texture(&rgba, w, h),
                Ok(None) => {}
                Err(e) => panic!("{e}"),
            }
        }
    }

    let linear_filter = !rdp.texture_filter_is_point();
    texture_cache.set_sampler_state(lookup.slot, tile.cms, tile.cmt, linear_filter);
    backend.set_sampler_parameters(unit, linear_filter, tile.cms, tile.cmt);
    rdp.textures_changed[tmem] = false;
}
