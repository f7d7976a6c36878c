//! The block-state palette: resolves a block state to a representative
//! color through the game's asset pipeline, with biome-aware tinting.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use image::RgbaImage;
use log::debug;

use crate::tex::{split_namespace, Blockstate, Model};
use crate::{is_air_block, AssetError, AssetLoader, BiomeInfo, BlockState, Section};

/// A color with 16-bit channels, as produced by the alpha-weighted
/// texture average.
pub type Rgba16 = [u16; 4];

#[derive(Debug)]
pub enum PaletteError {
    Asset(AssetError),
    Json(String, serde_json::Error),
    NoVariant(String),
    NoTexture(String, String),
}

impl From<AssetError> for PaletteError {
    fn from(err: AssetError) -> Self {
        PaletteError::Asset(err)
    }
}

impl std::fmt::Display for PaletteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaletteError::Asset(e) => f.write_fmt(format_args!("asset error: {e}")),
            PaletteError::Json(name, e) => {
                f.write_fmt(format_args!("failed to decode json {name}: {e}"))
            }
            PaletteError::NoVariant(state) => {
                f.write_fmt(format_args!("no variant matched block state {state}"))
            }
            PaletteError::NoTexture(state, model) => f.write_fmt(format_args!(
                "could not pick a texture for {state} (model {model})"
            )),
        }
    }
}

impl std::error::Error for PaletteError {}

pub type PaletteResult<T> = std::result::Result<T, PaletteError>;

/// The resolution caches. All grow monotonically for the lifetime of a
/// build and are guarded by one writer-exclusive lock so that `prepare`
/// installs a section's entries as a unit.
#[derive(Default)]
struct Tables {
    blockstates: HashMap<String, Blockstate>,
    // TODO: key this by the model name that was fetched; keyed by block
    // name, two variants of one block overwrite each other's model.
    models: HashMap<String, Model>,
    textures: HashMap<String, Arc<RgbaImage>>,
    state_textures: HashMap<String, String>,
    state_colors: HashMap<String, Rgba16>,
}

/// Resolves block states to colors.
///
/// `prepare` must be called for a section before `color_of` is asked
/// about its states; it takes the writer lock once per section. Readers
/// (`color_of`, `get_texture`) share a read lock and never serialize on
/// the writer path once a state is cached.
pub struct Palette {
    loader: Arc<AssetLoader>,

    tables: RwLock<Tables>,

    // biome climate data has its own lock; the tint path must not
    // contend with the resolution caches.
    biomes: RwLock<HashMap<String, BiomeInfo>>,

    grass_colormap: RgbaImage,
    foliage_colormap: RgbaImage,
}

impl Palette {
    pub fn new(loader: Arc<AssetLoader>) -> PaletteResult<Self> {
        let grass_colormap = loader.load_png("assets/minecraft/textures/colormap/grass.png")?;
        let foliage_colormap = loader.load_png("assets/minecraft/textures/colormap/foliage.png")?;

        Ok(Self {
            loader,
            tables: RwLock::new(Tables::default()),
            biomes: RwLock::new(HashMap::new()),
            grass_colormap,
            foliage_colormap,
        })
    }

    /// Ensure a color is cached for every block state in the section's
    /// block palette. Safe to call from many chunk renderers at once.
    pub fn prepare(&self, section: &Section) -> PaletteResult<()> {
        let mut tables = self.tables.write().unwrap();

        for state in &section.block_states.palette {
            if tables.state_colors.contains_key(state.encoded_description()) {
                continue;
            }
            if is_air_block(state.name()) {
                continue;
            }
            self.prepare_block_state(&mut tables, state)?;
        }

        Ok(())
    }

    /// The cached color for a block state, tinted for the biome. `None`
    /// when the state was never resolved (air, or its assets were absent).
    pub fn color_of(&self, state: &BlockState, biome: &str) -> PaletteResult<Option<Rgba16>> {
        let tables = self.tables.read().unwrap();

        match tables.state_colors.get(state.encoded_description()) {
            Some(color) => Ok(Some(self.fix_color(state, *color, biome)?)),
            None => Ok(None),
        }
    }

    /// The texture a block state resolved to, if any.
    pub fn get_texture(&self, state: &BlockState) -> Option<Arc<RgbaImage>> {
        let tables = self.tables.read().unwrap();

        let name = tables.state_textures.get(state.encoded_description())?;
        tables.textures.get(name).cloned()
    }

    /// Climate data for a biome, loaded from the archive on first sighting.
    fn get_biome(&self, biome: &str) -> PaletteResult<BiomeInfo> {
        if let Some(info) = self.biomes.read().unwrap().get(biome) {
            return Ok(*info);
        }

        let mut biomes = self.biomes.write().unwrap();
        if let Some(info) = biomes.get(biome) {
            return Ok(*info);
        }

        let (ns, name) = split_namespace(biome);
        let path = format!("data/{ns}/worldgen/biome/{name}.json");
        let raw = self.loader.load_raw(&path)?;
        let info: BiomeInfo =
            serde_json::from_slice(&raw).map_err(|e| PaletteError::Json(path, e))?;

        biomes.insert(biome.to_owned(), info);
        Ok(info)
    }

    /// Post-process a cached color for blocks whose color the game
    /// special-cases by biome: grass and foliage sample the colormaps,
    /// some leaves are hardcoded, water uses a fixed per-biome table.
    fn fix_color(&self, state: &BlockState, color: Rgba16, biome: &str) -> PaletteResult<Rgba16> {
        if is_grass_block(state.name()) {
            let (x, y) = self.get_biome(biome)?.colormap_coords();
            return Ok(widen(self.grass_colormap.get_pixel(x, y).0));
        }
        if is_foliage_block(state.name()) {
            let (x, y) = self.get_biome(biome)?.colormap_coords();
            return Ok(widen(self.foliage_colormap.get_pixel(x, y).0));
        }

        match state.name() {
            "minecraft:birch_leaves" => Ok(widen([0x80, 0xa7, 0x55, 255])),
            "minecraft:spruce_leaves" => Ok(widen([0x61, 0x99, 0x61, 255])),
            "minecraft:water" => Ok(widen(water_color(biome))),
            _ => Ok(color),
        }
    }

    fn prepare_block_state(&self, tables: &mut Tables, state: &BlockState) -> PaletteResult<()> {
        let (ns, raw_name) = split_namespace(state.name());

        if !tables.blockstates.contains_key(state.name()) {
            let path = format!("assets/{ns}/blockstates/{raw_name}.json");
            let raw = match self.loader.load_raw(&path) {
                Ok(raw) => raw,
                Err(AssetError::NotFound(_)) => {
                    // no blockstate definition at all; leave the state
                    // unresolved so the renderer can report it.
                    debug!("no blockstate json for {}", state.name());
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let bs: Blockstate =
                serde_json::from_slice(&raw).map_err(|e| PaletteError::Json(path, e))?;
            tables.blockstates.insert(state.name().to_owned(), bs);
        }

        let model_name = tables.blockstates[state.name()]
            .model_for(state.properties())
            .ok_or_else(|| PaletteError::NoVariant(state.encoded_description().to_owned()))?
            .to_owned();

        if !tables.models.contains_key(&model_name) {
            let (model_ns, model_raw) = split_namespace(&model_name);
            let path = format!("assets/{model_ns}/models/{model_raw}.json");
            let raw = match self.loader.load_raw(&path) {
                Ok(raw) => raw,
                Err(AssetError::NotFound(_)) => {
                    debug!("no model json {} for {}", model_name, state.name());
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let model: Model =
                serde_json::from_slice(&raw).map_err(|e| PaletteError::Json(path, e))?;
            tables.models.insert(state.name().to_owned(), model);
        }

        let model = match tables.models.get(&model_name) {
            Some(model) => model,
            // the model landed under the block name (see the cache-key
            // note on `Tables`); fetch it from there.
            None => &tables.models[state.name()],
        };

        let texture_name = model
            .pick_texture()
            .ok_or_else(|| {
                PaletteError::NoTexture(state.encoded_description().to_owned(), model_name.clone())
            })?
            .to_owned();
        if texture_name == "#texture" {
            return Err(PaletteError::NoTexture(
                state.encoded_description().to_owned(),
                model_name,
            ));
        }

        let (tex_ns, tex_raw) = split_namespace(&texture_name);
        let texture_name = format!("{tex_ns}:{tex_raw}");

        tables
            .state_textures
            .insert(state.encoded_description().to_owned(), texture_name.clone());

        if !tables.textures.contains_key(&texture_name) {
            let path = format!("assets/{tex_ns}/textures/{tex_raw}.png");
            let img = match self.loader.load_png(&path) {
                Ok(img) => img,
                Err(AssetError::NotFound(_)) => {
                    debug!("no texture {} for {}", texture_name, state.name());
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            tables.textures.insert(texture_name.clone(), Arc::new(img));
        }

        let color = average_color(&tables.textures[&texture_name]);
        tables
            .state_colors
            .insert(state.encoded_description().to_owned(), color);

        Ok(())
    }
}

/// Blocks tinted with the grass colormap.
fn is_grass_block(name: &str) -> bool {
    matches!(
        name,
        "minecraft:grass"
            | "minecraft:grass_block"
            | "minecraft:tall_grass"
            | "minecraft:vine"
            | "minecraft:fern"
            | "minecraft:large_fern"
    )
}

/// Blocks tinted with the foliage colormap.
fn is_foliage_block(name: &str) -> bool {
    matches!(
        name,
        "minecraft:oak_leaves"
            | "minecraft:jungle_leaves"
            | "minecraft:acacia_leaves"
            | "minecraft:dark_oak_leaves"
            | "minecraft:mangrove_leaves"
            | "minecraft:azalea_leaves"
            | "minecraft:cherry_leaves"
    )
}

/// Fixed water colors by biome id.
fn water_color(biome: &str) -> [u8; 4] {
    match biome {
        "minecraft:swamp" => [0x61, 0x7B, 0x64, 255],
        "minecraft:river" => [0x3F, 0x76, 0xE4, 255],
        "minecraft:ocean" => [0x3F, 0x76, 0xE4, 255],
        "minecraft:lukewarm_ocean" => [0x45, 0xAD, 0xF2, 255],
        "minecraft:warm_ocean" => [0x43, 0xD5, 0xEE, 255],
        "minecraft:cold_ocean" => [0x3D, 0x57, 0xD6, 255],
        "minecraft:frozen_river" => [0x39, 0x38, 0xC9, 255],
        "minecraft:frozen_ocean" => [0x39, 0x38, 0xC9, 255],
        _ => [0x3f, 0x76, 0xe4, 255],
    }
}

/// Widen an 8-bit color to 16-bit channels.
pub fn widen(c: [u8; 4]) -> Rgba16 {
    [
        c[0] as u16 * 257,
        c[1] as u16 * 257,
        c[2] as u16 * 257,
        c[3] as u16 * 257,
    ]
}

/// Narrow a 16-bit color back to 8-bit channels.
pub fn narrow(c: Rgba16) -> [u8; 4] {
    [
        (c[0] >> 8) as u8,
        (c[1] >> 8) as u8,
        (c[2] >> 8) as u8,
        (c[3] >> 8) as u8,
    ]
}

/// Average the two colors channel-wise, the way the water depth overlay
/// is folded into the surface color.
pub fn combine_color(a: Rgba16, b: Rgba16) -> Rgba16 {
    [
        ((a[0] as u32 + b[0] as u32) >> 1) as u16,
        ((a[1] as u32 + b[1] as u32) >> 1) as u16,
        ((a[2] as u32 + b[2] as u32) >> 1) as u16,
        ((a[3] as u32 + b[3] as u32) >> 1) as u16,
    ]
}

/// The representative color of a texture: each pixel's RGB weighted by
/// its alpha, with the averaged alpha scaled by coverage.
fn average_color(texture: &RgbaImage) -> Rgba16 {
    let mut rr = 0f64;
    let mut gg = 0f64;
    let mut bb = 0f64;
    let mut aa = 0f64;
    let mut count = 0f64;

    for pixel in texture.pixels() {
        let [r, g, b, a] = pixel.0;
        let (r, g, b, a) = (
            r as f64 * 257.0,
            g as f64 * 257.0,
            b as f64 * 257.0,
            a as f64 * 257.0,
        );
        rr += r * a;
        gg += g * a;
        bb += b * a;
        aa += a;
        count += 1.0;
    }

    if aa == 0.0 {
        return [0, 0, 0, 0];
    }

    [
        (rr / aa) as u16,
        (gg / aa) as u16,
        (bb / aa) as u16,
        (aa / count) as u16,
    ]
}
