//! Published asset metadata, stored as JSON next to the asset.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Metadata record published together with a tiled asset.
///
/// `vmin`/`vmax` are the percentile-stretch color bounds; when no valid pixel
/// survived the pipeline the bounds fall back to 0..1 and `stats_available`
/// is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Name of the pollutant variable (e.g. "vertical_column_troposphere").
    pub variable: String,
    pub vmin: f64,
    pub vmax: f64,
    /// Filesystem path of the published asset.
    pub asset_path: String,
    /// Monotonic version of the published asset.
    pub asset_version: u64,
    /// False when the color bounds are the degenerate 0..1 fallback.
    #[serde(default = "default_stats_available")]
    pub stats_available: bool,
}

fn default_stats_available() -> bool {
    true
}

impl AssetMetadata {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| MetadataError::Io(path.display().to_string(), e))?;
        serde_json::from_str(&raw).map_err(MetadataError::Parse)
    }

    /// Write the metadata atomically: a temp file in the same directory,
    /// renamed over the final path.
    pub fn store(&self, path: &Path) -> Result<(), MetadataError> {
        let json = serde_json::to_string_pretty(self).map_err(MetadataError::Parse)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| MetadataError::Io(tmp.display().to_string(), e))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            MetadataError::Io(path.display().to_string(), e)
        })?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata io error at {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("invalid metadata json: {0}")]
    Parse(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_json_fields() {
        let meta = AssetMetadata {
            variable: "vertical_column_troposphere".to_string(),
            vmin: 1.2e14,
            vmax: 8.9e15,
            asset_path: "/data/aura/no2.tra".to_string(),
            asset_version: 3,
            stats_available: true,
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["variable"], "vertical_column_troposphere");
        assert_eq!(json["asset_path"], "/data/aura/no2.tra");
        assert_eq!(json["asset_version"], 3);
    }

    #[test]
    fn test_stats_available_defaults_true() {
        let json = r#"{
            "variable": "no2",
            "vmin": 0.0,
            "vmax": 1.0,
            "asset_path": "x.tra",
            "asset_version": 1
        }"#;
        let meta: AssetMetadata = serde_json::from_str(json).unwrap();
        assert!(meta.stats_available);
    }
}
