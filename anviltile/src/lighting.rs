//! The block-light renderer: a darkness overlay from stored light levels.

use std::path::Path;

use image::RgbaImage;

use crate::{bits_for_max, BitStorage, Chunk, ChunkRenderer, RenderResult};

/// Renders each column's block light at the surface as an alpha-only
/// darkness tile. Light 15 is nearly clear, light 0 almost opaque.
pub struct LightingRenderer;

impl LightingRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LightingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkRenderer for LightingRenderer {
    fn image_size(&self) -> (usize, usize) {
        (16, 16)
    }

    fn render_chunk(&self, chunk: &Chunk) -> RenderResult<Option<RgbaImage>> {
        if chunk.sections.is_empty() {
            return Ok(None);
        }

        let bits = bits_for_max(chunk.sections.len() * 16 + 1);
        let motion_blocking = BitStorage::new(
            bits,
            chunk
                .heightmaps
                .motion_blocking
                .as_ref()
                .map(|d| d.to_vec())
                .unwrap_or_default(),
        );

        let mut img = RgbaImage::new(16, 16);

        for x in 0..16usize {
            for z in 0..16usize {
                let y_start = motion_blocking.get(z * 16 + x);
                let section_index = y_start / 16;

                let section = match chunk.sections.get(section_index) {
                    Some(section) => section,
                    None => continue,
                };

                let mut light = 0u8;
                if let Some(block_light) = &section.block_light {
                    if !block_light.is_empty() {
                        let light_index = x + ((section_index & 0x0f) << 8) + (z << 4);
                        let raw = block_light[light_index / 2] as u8;

                        light = if light_index & 1 > 0 {
                            (raw >> 4) & 0x0f
                        } else {
                            raw & 0x0f
                        };
                    }
                }

                let a = 192 - ((light + 1) * 12);
                img.put_pixel(x as u32, z as u32, image::Rgba([0, 0, 0, a]));
            }
        }

        Ok(Some(img))
    }

    fn finalize(&self, _dir: &Path) -> RenderResult<()> {
        Ok(())
    }
}
