//! Biome climate metadata and the biome layer renderer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use log::warn;
use serde::Deserialize;

use crate::{
    bits_for_max, packed_bits_per_value, AssetLoader, BitStorage, Chunk, ChunkRenderer,
    RenderResult,
};

/// The climate fields of a worldgen biome definition
/// (`data/<ns>/worldgen/biome/<name>.json`).
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct BiomeInfo {
    #[serde(default)]
    pub temperature: f64,

    #[serde(default)]
    pub downfall: f64,
}

fn clamp(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

impl BiomeInfo {
    /// Where this biome samples the 256x256 grass/foliage colormaps.
    /// Hot-and-dry lands at the bottom-right origin corner of the
    /// triangle, cold-and-wet at the top-left.
    pub fn colormap_coords(&self) -> (u32, u32) {
        let t = clamp(self.temperature);
        let r = clamp(self.downfall) * t;

        let x = (255.0 - t * 255.0).ceil() as u32;
        let y = (255.0 - r * 255.0).ceil() as u32;
        (x, y)
    }
}

/// Paints each column with a color keyed on its biome. Colors are pastel
/// shades assigned by position in the sorted list of biome ids found in
/// the asset archive, so they are stable run to run.
pub struct BiomeRenderer {
    biomes: HashMap<String, [u8; 4]>,
}

impl BiomeRenderer {
    pub fn new(loader: &Arc<AssetLoader>) -> Self {
        let mut names: Vec<String> = loader
            .file_names()
            .filter_map(biome_id_from_path)
            .collect();
        names.sort();

        let count = names.len();
        let biomes = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, pastel_color(i, count)))
            .collect();

        Self { biomes }
    }
}

fn biome_id_from_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix("data/")?;
    let (ns, file) = rest.split_once('/')?;
    let name = file.strip_prefix("worldgen/biome/")?.strip_suffix(".json")?;

    // datapack biome definitions can nest; those are not biome ids.
    if name.contains('/') {
        return None;
    }

    Some(format!("{ns}:{name}"))
}

/// A pastel shade for slot `index` of `count`: hues spread evenly around
/// the wheel at low saturation.
fn pastel_color(index: usize, count: usize) -> [u8; 4] {
    let hue = index as f64 * 360.0 / count.max(1) as f64;
    let (r, g, b) = hsv_to_rgb(hue, 0.32, 0.93);
    [r, g, b, 255]
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let c = v * s;
    let hp = (h % 360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());

    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let m = v - c;
    (
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

impl ChunkRenderer for BiomeRenderer {
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
                if section.biomes.palette.is_empty() {
                    continue;
                }

                let bits = packed_bits_per_value(16 * 16 * 16, section.biomes.longs());
                let biomes = BitStorage::new(
                    bits,
                    section.biomes.data.as_ref().map(|d| d.to_vec()).unwrap_or_default(),
                );

                let block_index = ((section_index * 16) + z) * 16 + x;
                let biome = match section.biomes.palette.get(biomes.get(block_index)) {
                    Some(biome) => biome,
                    None => continue,
                };

                match self.biomes.get(biome) {
                    Some(color) => img.put_pixel(x as u32, z as u32, image::Rgba(*color)),
                    None => warn!("unmapped biome {biome}"),
                }
            }
        }

        Ok(Some(img))
    }

    fn finalize(&self, _dir: &Path) -> RenderResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colormap_coords_for_plains() {
        let plains = BiomeInfo {
            temperature: 0.8,
            downfall: 0.4,
        };
        assert_eq!((51, 174), plains.colormap_coords());
    }

    #[test]
    fn colormap_coords_clamp() {
        let scorched = BiomeInfo {
            temperature: 2.0,
            downfall: 0.0,
        };
        assert_eq!((0, 255), scorched.colormap_coords());

        let frozen = BiomeInfo {
            temperature: -0.5,
            downfall: 0.5,
        };
        assert_eq!((255, 255), frozen.colormap_coords());
    }

    #[test]
    fn biome_ids_from_archive_paths() {
        assert_eq!(
            Some("minecraft:plains".to_owned()),
            biome_id_from_path("data/minecraft/worldgen/biome/plains.json")
        );
        assert_eq!(
            Some("byg:alps".to_owned()),
            biome_id_from_path("data/byg/worldgen/biome/alps.json")
        );
        assert_eq!(None, biome_id_from_path("data/minecraft/worldgen/noise/overworld.json"));
        assert_eq!(
            None,
            biome_id_from_path("assets/minecraft/textures/block/stone.png")
        );
    }

    #[test]
    fn chunk_columns_take_their_biome_color() {
        use crate::test::fixture::{asset_loader, test_chunk_at};

        let r = BiomeRenderer::new(&asset_loader());
        let chunk = test_chunk_at(0, 0);

        let img = r.render_chunk(&chunk).unwrap().unwrap();

        // the fixture archive defines desert, ocean and plains; sorted,
        // plains takes the third pastel slot.
        let expected = pastel_color(2, 3);
        for pixel in img.pixels() {
            assert_eq!(expected, pixel.0);
        }
    }

    #[test]
    fn unknown_biomes_stay_transparent() {
        use crate::test::fixture::{asset_loader, test_chunk_at};

        let r = BiomeRenderer::new(&asset_loader());
        let mut chunk = test_chunk_at(0, 0);
        chunk.sections[0].biomes.palette = vec!["minecraft:the_moon".to_owned()];

        let img = r.render_chunk(&chunk).unwrap().unwrap();
        assert_eq!(0, img.get_pixel(0, 0).0[3]);
    }

    #[test]
    fn empty_chunk_renders_nothing() {
        use crate::test::fixture::{asset_loader, test_chunk_at};

        let r = BiomeRenderer::new(&asset_loader());
        let mut chunk = test_chunk_at(0, 0);
        chunk.sections.clear();

        assert!(r.render_chunk(&chunk).unwrap().is_none());
    }

    #[test]
    fn pastel_colors_are_distinct_and_light() {
        let a = pastel_color(0, 8);
        let b = pastel_color(3, 8);
        assert_ne!(a, b);

        for c in [a, b] {
            // low saturation keeps every channel bright.
            assert!(c[..3].iter().all(|&ch| ch > 150), "not pastel: {c:?}");
            assert_eq!(255, c[3]);
        }
    }
}
