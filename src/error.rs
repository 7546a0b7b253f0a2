//! Error taxonomy for the translator.
//!
//! Per the design, nothing escapes [`crate::Gfx::run`]: programmer invariants
//! are asserted, unsupported encodings panic with a descriptive message built
//! from [`Fast3dError`], and soft failures are logged and silently ignored.
//! `Fast3dError` therefore has no `Result`-returning public consumer — it
//! exists to give the two abort call sites (`import_texture` on an
//! unrecognized format; `ops::loadblock` on an over-capacity load) a clear
//! message, and so the classification is unit-testable via
//! `#[should_panic]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Fast3dError {
    #[error("unsupported texture format/size combination: fmt={fmt:?} siz={siz:?}")]
    UnsupportedTextureFormat {
        fmt: crate::texture::decode::ImageFormat,
        siz: crate::texture::decode::ImageSize,
    },

    #[error("load_block size {0} exceeds TMEM capacity (4096 bytes)")]
    LoadBlockTooLarge(usize),
}
