//! Batch map-tile renderer for Minecraft's region format, Anvil.
//!
//! A world is rendered one region file at a time into 512x512 PNG tiles
//! suitable for a slippy-map viewer. Block colors are resolved from the
//! game's own asset archive (blockstate JSON -> model JSON -> texture).

pub mod tex;

mod assets;
mod biome;
mod bits;
mod build;
mod chunk;
mod config;
mod lighting;
mod meta;
mod palette;
mod pixel;
mod region;
mod render;
mod section_cache;
mod shade;

pub use assets::*;
pub use biome::*;
pub use bits::*;
pub use build::*;
pub use chunk::*;
pub use config::*;
pub use lighting::*;
pub use meta::*;
pub use palette::*;
pub use pixel::*;
pub use region::*;
pub use render::*;
pub use section_cache::*;
pub use shade::*;

#[cfg(test)]
mod test;

/// Errors from the region-file layer.
#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    UnknownCompression(u8),
    InvalidChunkMeta,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IO(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IO(e) => f.write_fmt(format_args!("io error: {e:?}")),
            Error::UnknownCompression(scheme) => f.write_fmt(format_args!(
                "compression scheme ({scheme}) was not recognised for chunk"
            )),
            Error::InvalidChunkMeta => f.write_str("chunk header was invalid"),
        }
    }
}

impl std::error::Error for Error {}
