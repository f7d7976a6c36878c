//! The relief-shading overlay pass for pixel maps.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

use image::RgbaImage;
use rayon::prelude::*;

use crate::{BitStorage, RenderError, RenderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Coord {
    x: i32,
    z: i32,
}

#[derive(Default)]
struct ShaderState {
    regions: HashSet<Coord>,
    heightmaps: HashMap<Coord, Arc<BitStorage>>,
}

/// Computes a relief overlay from chunk heightmaps and composites it onto
/// the already-written region tiles.
///
/// Chunks register their motion-blocking heightmap during the pixel pass;
/// `render` then runs once per touched region, reading heights across
/// chunk and region boundaries so ridges shade correctly at the seams.
pub struct PixelShader {
    state: RwLock<ShaderState>,
}

impl PixelShader {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ShaderState::default()),
        }
    }

    /// Track the heightmap of chunk (x, z) (absolute chunk coordinates)
    /// for the shading pass.
    pub fn add(&self, x: i32, z: i32, heightmap: Arc<BitStorage>) {
        let mut state = self.state.write().unwrap();

        state.regions.insert(Coord {
            x: x.div_euclid(32),
            z: z.div_euclid(32),
        });
        state.heightmaps.insert(Coord { x, z }, heightmap);
    }

    fn get(&self, coord: Coord) -> Option<Arc<BitStorage>> {
        self.state.read().unwrap().heightmaps.get(&coord).cloned()
    }

    /// Shade every region that had a chunk rendered, rewriting its PNG in
    /// `dir` with the overlay composited on top.
    pub fn render(&self, dir: &Path) -> RenderResult<()> {
        let regions: Vec<Coord> = self.state.read().unwrap().regions.iter().copied().collect();

        regions
            .par_iter()
            .try_for_each(|coord| self.render_region(dir, *coord))
    }

    fn render_region(&self, dir: &Path, region: Coord) -> RenderResult<()> {
        let mut overlay = RgbaImage::new(32 * 16, 32 * 16);

        for x in 0..32 {
            for z in 0..32 {
                let chunk = Coord {
                    x: region.x * 32 + x,
                    z: region.z * 32 + z,
                };
                if self.get(chunk).is_none() {
                    // never rendered; leave the overlay transparent here.
                    continue;
                }

                let tile = self.shade_chunk(chunk);
                image::imageops::replace(&mut overlay, &tile, (x * 16) as u32, (z * 16) as u32);
            }
        }

        let path = dir.join(format!("r.{}.{}.png", region.x, region.z));
        let base = image::open(&path)
            .map_err(|e| RenderError::Shade(region.x, region.z, e.to_string()))?;
        let mut base = base.into_rgba8();

        image::imageops::overlay(&mut base, &overlay, 0, 0);

        base.save(&path)
            .map_err(|e| RenderError::Shade(region.x, region.z, e.to_string()))?;

        Ok(())
    }

    /// The 16x16 shade tile for one chunk: each pixel darkens by how far
    /// the blocks above and to the left (north and west) rise over it.
    fn shade_chunk(&self, coord: Coord) -> RgbaImage {
        let mut img = RgbaImage::new(16, 16);

        let hm = match self.get(coord) {
            Some(hm) => hm,
            None => return img,
        };

        for x in 0..16usize {
            for z in 0..16usize {
                let height = hm.get(z * 16 + x);

                let left_height = if x == 0 {
                    // western column: the neighbor chunk's eastern edge.
                    match self.get(Coord {
                        x: coord.x - 1,
                        z: coord.z,
                    }) {
                        Some(west) => west.get(z * 16 + 15),
                        None => height,
                    }
                } else {
                    hm.get(z * 16 + (x - 1))
                };

                let top_height = if z == 0 {
                    match self.get(Coord {
                        x: coord.x,
                        z: coord.z - 1,
                    }) {
                        Some(north) => north.get(15 * 16 + x),
                        None => height,
                    }
                } else {
                    hm.get((z - 1) * 16 + x)
                };

                let mut d = 0;
                if top_height > height {
                    d = (top_height - height) * 16;
                }
                if left_height > height {
                    d += (left_height - height) * 16;
                }
                if d > 64 {
                    d = 64;
                }

                img.put_pixel(x as u32, z as u32, image::Rgba([0, 0, 0, d as u8]));
            }
        }

        img
    }
}

impl Default for PixelShader {
    fn default() -> Self {
        Self::new()
    }
}
