//! The incremental-build sidecar: per-region max chunk timestamps.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum MetaError {
    IO(std::io::Error),
    Json(serde_json::Error),
}

impl From<std::io::Error> for MetaError {
    fn from(err: std::io::Error) -> Self {
        MetaError::IO(err)
    }
}

impl From<serde_json::Error> for MetaError {
    fn from(err: serde_json::Error) -> Self {
        MetaError::Json(err)
    }
}

impl std::fmt::Display for MetaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaError::IO(e) => f.write_fmt(format_args!("io error: {e}")),
            MetaError::Json(e) => f.write_fmt(format_args!("json error: {e}")),
        }
    }
}

impl std::error::Error for MetaError {}

/// The contents of a layer's `build.json`. A region whose chunks are all
/// at or below its recorded timestamp is skipped on the next build.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RenderMeta {
    #[serde(rename = "RegionTimestamps", default)]
    pub region_timestamps: HashMap<String, i32>,
}

impl RenderMeta {
    pub fn load(path: &Path) -> Result<Self, MetaError> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn store(&self, path: &Path) -> Result<(), MetaError> {
        let data = serde_json::to_vec(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape_is_stable() {
        let mut meta = RenderMeta::default();
        meta.region_timestamps.insert("r.0.0".to_owned(), 1712000000);

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(r#"{"RegionTimestamps":{"r.0.0":1712000000}}"#, json);
    }

    #[test]
    fn round_trip() {
        let mut meta = RenderMeta::default();
        meta.region_timestamps.insert("r.-1.0".to_owned(), 42);
        meta.region_timestamps.insert("r.3.9".to_owned(), 7);

        let json = serde_json::to_vec(&meta).unwrap();
        let back: RenderMeta = serde_json::from_slice(&json).unwrap();

        assert_eq!(meta.region_timestamps, back.region_timestamps);
    }

    #[test]
    fn missing_map_deserializes_empty() {
        let meta: RenderMeta = serde_json::from_str("{}").unwrap();
        assert!(meta.region_timestamps.is_empty());
    }
}
