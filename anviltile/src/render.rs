//! The world render pipeline: region traversal, chunk dispatch, tile
//! assembly and timestamp accounting.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use image::RgbaImage;
use log::warn;
use rayon::prelude::*;

use crate::{Chunk, PaletteError, Region};

/// ChunkRenderer implementations turn one chunk column into a small tile.
/// The pipeline is agnostic to what the tile depicts.
pub trait ChunkRenderer: Send + Sync {
    /// Size in pixels of the tiles `render_chunk` returns.
    fn image_size(&self) -> (usize, usize);

    /// Draw the chunk, or `None` when there is nothing to draw for it
    /// (no sections, not fully generated, ...).
    fn render_chunk(&self, chunk: &Chunk) -> RenderResult<Option<RgbaImage>>;

    /// Called once after every region is done; the pixel renderer runs
    /// its shading pass here.
    fn finalize(&self, dir: &Path) -> RenderResult<()>;
}

impl<T: ChunkRenderer> ChunkRenderer for std::sync::Arc<T> {
    fn image_size(&self) -> (usize, usize) {
        (**self).image_size()
    }

    fn render_chunk(&self, chunk: &Chunk) -> RenderResult<Option<RgbaImage>> {
        (**self).render_chunk(chunk)
    }

    fn finalize(&self, dir: &Path) -> RenderResult<()> {
        (**self).finalize(dir)
    }
}

#[derive(Debug)]
pub enum RenderError {
    Anvil(crate::Error),
    Nbt(fastnbt::error::Error),
    Palette(PaletteError),
    Image(image::ImageError),
    IO(std::io::Error),
    Pool(rayon::ThreadPoolBuildError),
    Shade(i32, i32, String),
}

impl From<crate::Error> for RenderError {
    fn from(err: crate::Error) -> Self {
        RenderError::Anvil(err)
    }
}

impl From<fastnbt::error::Error> for RenderError {
    fn from(err: fastnbt::error::Error) -> Self {
        RenderError::Nbt(err)
    }
}

impl From<PaletteError> for RenderError {
    fn from(err: PaletteError) -> Self {
        RenderError::Palette(err)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Image(err)
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IO(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for RenderError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        RenderError::Pool(err)
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Anvil(e) => f.write_fmt(format_args!("region error: {e}")),
            RenderError::Nbt(e) => f.write_fmt(format_args!("chunk nbt error: {e}")),
            RenderError::Palette(e) => f.write_fmt(format_args!("palette error: {e}")),
            RenderError::Image(e) => f.write_fmt(format_args!("image error: {e}")),
            RenderError::IO(e) => f.write_fmt(format_args!("io error: {e}")),
            RenderError::Pool(e) => f.write_fmt(format_args!("thread pool error: {e}")),
            RenderError::Shade(x, z, e) => {
                f.write_fmt(format_args!("failed to shade region ({x}, {z}): {e}"))
            }
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Options for a world render.
#[derive(Default)]
pub struct WorldRenderOpts {
    /// Regions rendered in parallel. Zero means one per available core.
    pub concurrency: usize,

    /// Per-region max chunk timestamps from a previous build. Regions
    /// with no chunk newer than their entry are skipped.
    pub region_timestamps: HashMap<String, i32>,
}

/// What a world render produced.
#[derive(Debug)]
pub struct WorldRenderResult {
    /// Max chunk timestamp drawn per region, carrying forward the
    /// previous value for skipped regions.
    pub region_timestamps: HashMap<String, i32>,

    pub rendered_chunks: u32,
}

/// Drives a [`ChunkRenderer`] over every region of a world dimension.
pub struct Renderer {
    chunk: Box<dyn ChunkRenderer>,
}

impl Renderer {
    pub fn new(chunk: Box<dyn ChunkRenderer>) -> Self {
        Self { chunk }
    }

    /// Render every region file under `src` into `dst` as
    /// `<region>.png`, then run the renderer's finalize pass.
    ///
    /// Failures opening or rendering a single region are logged and
    /// leave the other regions alone; errors writing output or
    /// finalizing abort the build.
    pub fn render_world(
        &self,
        src: &Path,
        dst: &Path,
        opts: &WorldRenderOpts,
    ) -> RenderResult<WorldRenderResult> {
        let paths = region_paths(src)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.concurrency)
            .build()?;

        let timestamps = Mutex::new(HashMap::new());
        let rendered_chunks = AtomicU32::new(0);

        pool.install(|| {
            paths.par_iter().try_for_each(|path| -> RenderResult<()> {
                let name = match region_name(path) {
                    Some(name) => name,
                    None => return Ok(()),
                };

                let file = match File::open(path) {
                    Ok(file) => file,
                    Err(e) => {
                        warn!("failed to open region file {}: {e}", path.display());
                        return Ok(());
                    }
                };

                let region = match Region::from_stream(file) {
                    Ok(region) => region,
                    Err(crate::Error::IO(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                        // empty or truncated region; nothing to draw.
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("failed to open region file {}: {e}", path.display());
                        return Ok(());
                    }
                };

                let previous_max = opts.region_timestamps.get(&name).copied().unwrap_or(0);

                let (img, max_timestamp) = match self.render_region(&region, previous_max) {
                    Ok(Some((img, max_timestamp, count))) => {
                        rendered_chunks.fetch_add(count, Ordering::SeqCst);
                        (img, max_timestamp)
                    }
                    Ok(None) => {
                        // nothing newer than the previous build.
                        timestamps.lock().unwrap().insert(name, previous_max);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("failed to render region file {}: {e}", path.display());
                        return Ok(());
                    }
                };

                timestamps.lock().unwrap().insert(name.clone(), max_timestamp);

                img.save(dst.join(format!("{name}.png")))?;

                Ok(())
            })
        })?;

        self.chunk.finalize(dst)?;

        Ok(WorldRenderResult {
            region_timestamps: timestamps.into_inner().unwrap(),
            rendered_chunks: rendered_chunks.into_inner(),
        })
    }

    /// Render one region. Returns `None` when every chunk timestamp is at
    /// or below `previous_max`; otherwise the composited region image,
    /// the max timestamp over the chunks actually drawn, and their count.
    fn render_region(
        &self,
        region: &Region<File>,
        previous_max: i32,
    ) -> RenderResult<Option<(RgbaImage, i32, u32)>> {
        let (tile_w, tile_h) = self.chunk.image_size();

        let mut need_render = false;
        for x in 0..32 {
            for z in 0..32 {
                if region.timestamp(x, z) > previous_max {
                    need_render = true;
                }
            }
        }
        if !need_render {
            return Ok(None);
        }

        let mut jobs = Vec::new();
        for x in 0..32 {
            for z in 0..32 {
                if let Some(data) = region.read_chunk(x, z)? {
                    jobs.push((x, z, region.timestamp(x, z), data));
                }
            }
        }

        let tiles = jobs
            .into_par_iter()
            .map(|(x, z, timestamp, data)| {
                Ok((x, z, timestamp, self.render_sector(&data)?))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let mut img = RgbaImage::new((tile_w * 32) as u32, (tile_h * 32) as u32);
        let mut max_timestamp = 0;
        let mut count = 0u32;

        for (x, z, timestamp, tile) in tiles {
            let tile = match tile {
                Some(tile) => tile,
                None => continue,
            };

            max_timestamp = max_timestamp.max(timestamp);
            count += 1;
            image::imageops::replace(&mut img, &tile, (x * tile_w) as u32, (z * tile_h) as u32);
        }

        Ok(Some((img, max_timestamp, count)))
    }

    fn render_sector(&self, data: &[u8]) -> RenderResult<Option<RgbaImage>> {
        let chunk: Chunk = fastnbt::from_bytes(data)?;

        if !chunk.is_renderable() {
            return Ok(None);
        }

        self.chunk.render_chunk(&chunk)
    }
}

/// Region files under a dimension directory: `r.<X>.<Z>.mca`, non-empty.
fn region_paths(src: &Path) -> std::io::Result<Vec<PathBuf>> {
    let paths = fs::read_dir(src)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let ext = path.extension();
            ext.is_some() && ext.unwrap() == "mca"
        })
        .filter(|path| fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false))
        .collect();

    Ok(paths)
}

fn region_name(path: &Path) -> Option<String> {
    Some(path.file_stem()?.to_str()?.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_name_is_the_file_stem() {
        assert_eq!(
            Some("r.-1.0".to_owned()),
            region_name(Path::new("/world/region/r.-1.0.mca"))
        );
        assert_eq!(
            Some("r.12.-7".to_owned()),
            region_name(Path::new("r.12.-7.mca"))
        );
    }
}
