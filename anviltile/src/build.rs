//! The build driver: sequences maps and layers, caches the client
//! archive, and persists incremental metadata.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use flate2::read::GzDecoder;
use log::{debug, info};
use serde::Deserialize;

use crate::{
    AssetError, AssetLoader, BiomeRenderer, Config, ConfigError, LayerConfig, LightingRenderer,
    MapConfig, MetaError, PaletteError, PixelRenderer, PixelRendererOpts, RenderError, RenderKind,
    RenderMeta, Renderer, WorldRenderOpts, WorldRenderResult,
};

#[derive(Debug)]
pub enum BuildError {
    IO(std::io::Error),
    Config(ConfigError),
    Render(RenderError),
    Meta(MetaError),
    Asset(AssetError),
    Palette(PaletteError),
    Nbt(fastnbt::error::Error),
    Fetch(String, std::io::Error),
    UnknownOutput(String),
    UnknownLayer(String),
    NoWorldDirectory(PathBuf),
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        BuildError::IO(err)
    }
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        BuildError::Config(err)
    }
}

impl From<RenderError> for BuildError {
    fn from(err: RenderError) -> Self {
        BuildError::Render(err)
    }
}

impl From<MetaError> for BuildError {
    fn from(err: MetaError) -> Self {
        BuildError::Meta(err)
    }
}

impl From<AssetError> for BuildError {
    fn from(err: AssetError) -> Self {
        BuildError::Asset(err)
    }
}

impl From<PaletteError> for BuildError {
    fn from(err: PaletteError) -> Self {
        BuildError::Palette(err)
    }
}

impl From<fastnbt::error::Error> for BuildError {
    fn from(err: fastnbt::error::Error) -> Self {
        BuildError::Nbt(err)
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::IO(e) => f.write_fmt(format_args!("io error: {e}")),
            BuildError::Config(e) => f.write_fmt(format_args!("config error: {e}")),
            BuildError::Render(e) => f.write_fmt(format_args!("render error: {e}")),
            BuildError::Meta(e) => f.write_fmt(format_args!("metadata error: {e}")),
            BuildError::Asset(e) => f.write_fmt(format_args!("asset error: {e}")),
            BuildError::Palette(e) => f.write_fmt(format_args!("palette error: {e}")),
            BuildError::Nbt(e) => f.write_fmt(format_args!("level.dat error: {e}")),
            BuildError::Fetch(version, e) => {
                f.write_fmt(format_args!("failed to fetch client {version}: {e}"))
            }
            BuildError::UnknownOutput(name) => {
                f.write_fmt(format_args!("map references unknown output '{name}'"))
            }
            BuildError::UnknownLayer(name) => {
                f.write_fmt(format_args!("map references unknown layer '{name}'"))
            }
            BuildError::NoWorldDirectory(path) => f.write_fmt(format_args!(
                "cannot locate the world directory above {}",
                path.display()
            )),
        }
    }
}

impl std::error::Error for BuildError {}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Provides the game client archive for a version. The driver only calls
/// this on a cache miss for `res/client-<version>.jar`; how the archive
/// is obtained (downloaded, copied, pre-staged) is up to the caller.
pub trait ClientFetcher {
    fn fetch(&self, version: &str, dest: &Path) -> std::io::Result<()>;
}

#[derive(Debug, Default)]
pub struct BuildOpts {
    /// Ignore recorded chunk timestamps and re-render everything.
    pub force_clean: bool,
}

/// Build every configured map into its output directory.
pub fn build(config: &Config, fetcher: &dyn ClientFetcher, opts: &BuildOpts) -> BuildResult<()> {
    let mut outputs: HashMap<&str, &Path> = HashMap::new();
    for output in &config.outputs {
        fs::create_dir_all(&output.path)?;
        fs::create_dir_all(output.path.join("tiles"))?;
        fs::create_dir_all(output.path.join("res"))?;

        if output.include_static {
            debug!(
                "output '{}' asks for the static viewer, which this tool does not emit",
                output.name
            );
        }

        outputs.insert(output.name.as_str(), output.path.as_path());
    }

    let layers: HashMap<&str, &LayerConfig> = config
        .layers
        .iter()
        .map(|layer| (layer.name.as_str(), layer))
        .collect();

    for map in &config.maps {
        let output = outputs
            .get(map.output.as_str())
            .copied()
            .ok_or_else(|| BuildError::UnknownOutput(map.output.clone()))?;

        build_map(config, opts, map, &layers, output, fetcher)?;
    }

    Ok(())
}

fn build_map(
    config: &Config,
    opts: &BuildOpts,
    map: &MapConfig,
    layers: &HashMap<&str, &LayerConfig>,
    output: &Path,
    fetcher: &dyn ClientFetcher,
) -> BuildResult<()> {
    let tile_path = output.join("tiles").join(&map.name);
    fs::create_dir_all(&tile_path)?;

    let version = match &map.version {
        Some(version) => version.clone(),
        None => world_version(&map.path)?,
    };

    let jar_path = output.join("res").join(format!("client-{version}.jar"));
    if !jar_path.exists() {
        fetcher
            .fetch(&version, &jar_path)
            .map_err(|e| BuildError::Fetch(version.clone(), e))?;
    }

    let loader = Arc::new(AssetLoader::from_path(&jar_path)?);

    // previous timestamps are read once, up front: every layer of this
    // build must see the state of the *prior* build, not whatever the
    // layer before it just recorded.
    let meta_path = tile_path.join("build.json");
    let mut previous_timestamps = HashMap::new();
    if !opts.force_clean && meta_path.exists() {
        previous_timestamps = RenderMeta::load(&meta_path)?.region_timestamps;
    }

    for layer_name in &map.layers {
        let layer = layers
            .get(layer_name.as_str())
            .copied()
            .ok_or_else(|| BuildError::UnknownLayer(layer_name.clone()))?;

        fs::create_dir_all(tile_path.join(layer_name))?;

        let render_opts = WorldRenderOpts {
            concurrency: config.concurrency,
            region_timestamps: previous_timestamps.clone(),
        };

        let start = Instant::now();
        let result =
            render_layer(layer, &loader, &map.path, &tile_path.join(layer_name), &render_opts)?;

        // persisted after every layer; an interrupted build resumes from
        // the last finished one.
        let meta = RenderMeta {
            region_timestamps: result.region_timestamps,
        };
        meta.store(&meta_path)?;

        info!(
            "finished rendering {}/{} in {}ms ({} chunks)",
            map.name,
            layer_name,
            start.elapsed().as_millis(),
            result.rendered_chunks
        );
    }

    Ok(())
}

fn render_layer(
    layer: &LayerConfig,
    loader: &Arc<AssetLoader>,
    src: &Path,
    dst: &Path,
    render_opts: &WorldRenderOpts,
) -> BuildResult<WorldRenderResult> {
    let renderer = match layer.render {
        RenderKind::Pixel => {
            let pixel_opts = PixelRendererOpts {
                shading: layer.shading,
                strip_ceiling: layer.strip_ceiling,
            };
            Renderer::new(Box::new(PixelRenderer::new(pixel_opts, Arc::clone(loader))?))
        }
        RenderKind::Biome => Renderer::new(Box::new(BiomeRenderer::new(loader))),
        RenderKind::Lighting => Renderer::new(Box::new(LightingRenderer::new())),
    };

    Ok(renderer.render_world(src, dst, render_opts)?)
}

/// The game version a world was last saved with, from the `level.dat`
/// next to its region directory.
pub fn world_version(region_dir: &Path) -> BuildResult<String> {
    let world_dir = region_dir
        .parent()
        .ok_or_else(|| BuildError::NoWorldDirectory(region_dir.to_owned()))?;

    let file = fs::File::open(world_dir.join("level.dat"))?;
    let mut data = Vec::new();
    GzDecoder::new(file).read_to_end(&mut data)?;

    let level: LevelDat = fastnbt::from_bytes(&data)?;
    Ok(level.data.version.name)
}

#[derive(Deserialize)]
struct LevelDat {
    #[serde(rename = "Data")]
    data: LevelData,
}

#[derive(Deserialize)]
struct LevelData {
    #[serde(rename = "Version")]
    version: LevelVersion,
}

#[derive(Deserialize)]
struct LevelVersion {
    #[serde(rename = "Name")]
    name: String,
}
