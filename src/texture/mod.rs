//! Texture decoding and caching (C1, C2).

pub mod cache;
pub mod decode;
pub mod import;

pub use cache::TextureCache;
pub use decode::{decode as decode_texture, ImageFormat, ImageSize};
pub use import::import_texture;
