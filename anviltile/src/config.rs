//! Build configuration: outputs, layers and maps.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug)]
pub enum ConfigError {
    IO(std::io::Error),
    Json(serde_json::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IO(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IO(e) => f.write_fmt(format_args!("io error: {e}")),
            ConfigError::Json(e) => f.write_fmt(format_args!("json error: {e}")),
        }
    }
}

impl std::error::Error for ConfigError {}

/// The kinds of chunk renderer a layer can ask for.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    Pixel,
    Biome,
    Lighting,
}

/// Top-level build configuration, loaded from JSON.
#[derive(Deserialize, Debug)]
pub struct Config {
    /// Regions rendered in parallel; zero or absent means one per core.
    #[serde(default)]
    pub concurrency: usize,

    #[serde(default)]
    pub outputs: Vec<OutputConfig>,

    #[serde(default)]
    pub layers: Vec<LayerConfig>,

    #[serde(default)]
    pub maps: Vec<MapConfig>,
}

#[derive(Deserialize, Debug)]
pub struct OutputConfig {
    pub name: String,
    pub path: PathBuf,

    /// Accepted for config compatibility; the static web viewer is not
    /// emitted by this tool.
    #[serde(default)]
    pub include_static: bool,
}

#[derive(Deserialize, Debug)]
pub struct LayerConfig {
    pub name: String,
    pub render: RenderKind,

    /// Viewer-side layer opacity; parsed so configs validate, unused here.
    #[serde(default)]
    pub opacity: Option<f64>,

    /// Run the relief shading pass (pixel layers).
    #[serde(default = "default_true")]
    pub shading: bool,

    /// Strip the solid ceiling before picking surface blocks (pixel
    /// layers on nether-like dimensions).
    #[serde(default, rename = "strip-ceiling")]
    pub strip_ceiling: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Debug)]
pub struct MapConfig {
    pub name: String,
    pub output: String,

    /// The dimension's region directory.
    pub path: PathBuf,

    pub layers: Vec<String>,

    /// Game version for the asset archive. When absent the version is
    /// read out of the world's level.dat.
    #[serde(default)]
    pub version: Option<String>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: Config = serde_json::from_str(
            r#"{
                "concurrency": 4,
                "outputs": [{"name": "site", "path": "/var/www/map", "include_static": true}],
                "layers": [
                    {"name": "terrain", "render": "pixel", "opacity": 1.0},
                    {"name": "biomes", "render": "biome"},
                    {"name": "caves", "render": "pixel", "shading": false, "strip-ceiling": true},
                    {"name": "light", "render": "lighting"}
                ],
                "maps": [{
                    "name": "overworld",
                    "output": "site",
                    "path": "/srv/world/region",
                    "layers": ["terrain", "biomes"],
                    "version": "1.20.4"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(4, config.concurrency);
        assert_eq!(RenderKind::Pixel, config.layers[0].render);
        assert!(config.layers[0].shading);
        assert!(!config.layers[2].shading);
        assert!(config.layers[2].strip_ceiling);
        assert_eq!(RenderKind::Lighting, config.layers[3].render);
        assert_eq!(Some("1.20.4".to_owned()), config.maps[0].version);
    }

    #[test]
    fn minimal_config_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(0, config.concurrency);
        assert!(config.maps.is_empty());
    }

    #[test]
    fn unknown_render_kind_is_rejected() {
        let result: Result<LayerConfig, _> =
            serde_json::from_str(r#"{"name": "x", "render": "isometric"}"#);
        assert!(result.is_err());
    }
}
