//! The top-down color renderer.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use crate::{
    bits_for_max, combine_color, is_air_block, narrow, widen, AssetLoader, BitStorage, Chunk,
    ChunkRenderer, Palette, PaletteResult, PixelShader, RenderResult, SectionCache,
};

/// Options for the pixel layer.
#[derive(Debug, Clone)]
pub struct PixelRendererOpts {
    /// Run the relief shading pass during finalize.
    pub shading: bool,

    /// Skip the solid ceiling above the first air gap, for nether-like
    /// dimensions where the heightmap sits on the roof.
    pub strip_ceiling: bool,
}

impl Default for PixelRendererOpts {
    fn default() -> Self {
        Self {
            shading: true,
            strip_ceiling: false,
        }
    }
}

/// Renders a chunk to a 16x16 top-down color tile.
///
/// For each column the renderer starts at the motion-blocking height and
/// descends to the first block the palette knows a color for, darkening
/// water by depth against the ocean-floor heightmap. Chunk heightmaps are
/// registered with the shader for the relief pass.
pub struct PixelRenderer {
    opts: PixelRendererOpts,
    shader: PixelShader,
    palette: Palette,
    missing_block_states: Mutex<BTreeSet<String>>,
}

impl PixelRenderer {
    pub fn new(opts: PixelRendererOpts, loader: Arc<AssetLoader>) -> PaletteResult<Self> {
        Ok(Self {
            opts,
            shader: PixelShader::new(),
            palette: Palette::new(loader)?,
            missing_block_states: Mutex::new(BTreeSet::new()),
        })
    }

    /// Block states seen during rendering that never resolved to a
    /// color, for post-build diagnostics.
    pub fn missing_block_states(&self) -> Vec<String> {
        self.missing_block_states
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .collect()
    }
}

impl ChunkRenderer for PixelRenderer {
    fn image_size(&self) -> (usize, usize) {
        (16, 16)
    }

    fn render_chunk(&self, chunk: &Chunk) -> RenderResult<Option<RgbaImage>> {
        if chunk.sections.is_empty() {
            return Ok(None);
        }

        let height_bits = bits_for_max(chunk.sections.len() * 16 + 1);
        let motion_blocking = Arc::new(BitStorage::new(
            height_bits,
            chunk
                .heightmaps
                .motion_blocking
                .as_ref()
                .map(|d| d.to_vec())
                .unwrap_or_default(),
        ));
        let ocean_floor = BitStorage::new(
            height_bits,
            chunk
                .heightmaps
                .ocean_floor
                .as_ref()
                .map(|d| d.to_vec())
                .unwrap_or_default(),
        );

        self.shader
            .add(chunk.x_pos, chunk.z_pos, Arc::clone(&motion_blocking));

        let mut img = RgbaImage::new(16, 16);
        let mut cache = SectionCache::new(&self.palette, chunk);

        for x in 0..16usize {
            for z in 0..16usize {
                let heightmap_index = z * 16 + x;
                let y_start = motion_blocking.get(heightmap_index);
                let mut under_ceiling = false;

                let mut y = y_start;
                while y > 1 {
                    let section_index = y / 16;
                    let section_y = y % 16;

                    let view = match cache.get(section_index)? {
                        Some(view) => view,
                        None => {
                            y -= 1;
                            continue;
                        }
                    };

                    let block_index = ((section_y * 16) + z) * 16 + x;
                    let state = match view.block_state(block_index) {
                        Some(state) => state,
                        None => {
                            y -= 1;
                            continue;
                        }
                    };
                    let biome = match view.biome(block_index) {
                        Some(biome) => biome,
                        None => {
                            y -= 1;
                            continue;
                        }
                    };

                    // stripping the ceiling means waiting for the first
                    // air gap strictly below the starting height.
                    if self.opts.strip_ceiling && !under_ceiling {
                        if !is_air_block(state.name()) || y == y_start {
                            y -= 1;
                            continue;
                        }
                        under_ceiling = true;
                    }

                    if is_air_block(state.name()) {
                        y -= 1;
                        continue;
                    }

                    let color = match self.palette.color_of(state, biome)? {
                        Some(color) => color,
                        None => {
                            self.missing_block_states
                                .lock()
                                .unwrap()
                                .insert(state.name().to_owned());
                            y -= 1;
                            continue;
                        }
                    };

                    // darken water with depth down to the ocean floor.
                    let color = if state.name() == "minecraft:water" {
                        let floor_y = ocean_floor.get(heightmap_index);
                        let depth = y.saturating_sub(floor_y) * 8;
                        let alpha = depth.min(128) as u8;
                        combine_color(color, widen([0, 0, 0, alpha]))
                    } else {
                        color
                    };

                    img.put_pixel(x as u32, z as u32, image::Rgba(narrow(color)));
                    break;
                }
            }
        }

        Ok(Some(img))
    }

    fn finalize(&self, dir: &Path) -> RenderResult<()> {
        for name in self.missing_block_states() {
            log::debug!("no color resolved for block state {name}");
        }

        if !self.opts.shading {
            return Ok(());
        }

        self.shader.render(dir)
    }
}
