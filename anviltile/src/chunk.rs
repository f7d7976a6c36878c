//! The serde model for chunk NBT.

use std::collections::BTreeMap;

use fastnbt::{ByteArray, LongArray};
use serde::Deserialize;

/// A chunk column as stored in a region sector.
#[derive(Deserialize, Debug)]
pub struct Chunk {
    #[serde(rename = "xPos")]
    pub x_pos: i32,

    #[serde(rename = "zPos")]
    pub z_pos: i32,

    #[serde(rename = "Status")]
    pub status: String,

    #[serde(default)]
    pub sections: Vec<Section>,

    #[serde(rename = "Heightmaps", default)]
    pub heightmaps: Heightmaps,
}

impl Chunk {
    /// Whether the chunk has finished generating far enough to render.
    /// Anything earlier draws unpredictably (missing surface, half-carved
    /// terrain), so the pipeline drops it.
    pub fn is_renderable(&self) -> bool {
        let status = self
            .status
            .strip_prefix("minecraft:")
            .unwrap_or(&self.status);
        matches!(status, "full" | "spawn" | "postprocessed" | "fullchunk")
    }
}

/// Heightmaps the game keeps per chunk, as packed long arrays.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Heightmaps {
    pub motion_blocking: Option<LongArray>,
    pub ocean_floor: Option<LongArray>,
}

/// A vertical 16x16x16 piece of a chunk. Sections arrive ordered
/// bottom-up; renderers index them by list position.
#[derive(Deserialize, Debug)]
pub struct Section {
    #[serde(rename = "Y")]
    pub y: i8,

    #[serde(default)]
    pub block_states: PaletteContainer<BlockState>,

    #[serde(default)]
    pub biomes: PaletteContainer<String>,

    #[serde(rename = "BlockLight")]
    pub block_light: Option<ByteArray>,
}

/// A palette plus the packed indices into it. `data` is absent when the
/// palette has a single entry.
#[derive(Deserialize, Debug)]
pub struct PaletteContainer<T> {
    #[serde(default = "Vec::new")]
    pub palette: Vec<T>,

    pub data: Option<LongArray>,
}

impl<T> Default for PaletteContainer<T> {
    fn default() -> Self {
        Self {
            palette: Vec::new(),
            data: None,
        }
    }
}

impl<T> PaletteContainer<T> {
    pub fn longs(&self) -> usize {
        self.data.as_ref().map(|d| d.len()).unwrap_or(0)
    }
}

/// A block state: a namespaced id plus its properties.
///
/// The canonical description is `name/prop1=val1,prop2=val2` with
/// properties ordered by key; it is the key for every palette cache.
#[derive(Debug, Clone)]
pub struct BlockState {
    name: String,
    properties: BTreeMap<String, String>,
    encoded: String,
}

impl BlockState {
    pub fn new(name: &str, properties: &[(&str, &str)]) -> Self {
        let properties: BTreeMap<String, String> = properties
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        let encoded = encode_description(name, &properties);
        Self {
            name: name.to_owned(),
            properties,
            encoded,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn encoded_description(&self) -> &str {
        &self.encoded
    }
}

fn encode_description(name: &str, properties: &BTreeMap<String, String>) -> String {
    let mut id = name.to_owned() + "/";
    let mut sep = "";
    for (k, v) in properties {
        id = id + sep + k + "=" + v;
        sep = ",";
    }
    id
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlockStateRaw {
    name: String,

    #[serde(default)]
    properties: BTreeMap<String, String>,
}

impl<'de> Deserialize<'de> for BlockState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: BlockStateRaw = Deserialize::deserialize(deserializer)?;
        let encoded = encode_description(&raw.name, &raw.properties);

        Ok(Self {
            name: raw.name,
            properties: raw.properties,
            encoded,
        })
    }
}

/// Blocks treated as if they were not there when looking down a column.
pub fn is_air_block(name: &str) -> bool {
    matches!(
        name,
        "minecraft:air"
            | "minecraft:cave_air"
            | "minecraft:dead_bush"
            | "minecraft:short_grass"
            | "minecraft:lily_pad"
            | "minecraft:torch"
            | "minecraft:wall_torch"
    )
}
