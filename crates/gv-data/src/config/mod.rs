//! Viewer configuration
//!
//! Loaded from an optional JSON file; every field has a default so a partial
//! file (or none at all) is valid.

use std::path::Path;
use std::time::Duration;

use gv_core::{CompletionRule, FitOptions, LoadSettings};
use serde::{Deserialize, Serialize};

use crate::DataError;

/// Sample file opened when no URL is given
pub const DEFAULT_URL: &str =
    "https://raw.githubusercontent.com/opengeospatial/geoparquet/main/examples/example.parquet";

/// Where unknown CRS definitions are looked up
pub const DEFAULT_PROJECTION_REGISTRY: &str = "https://spatialreference.org/ref";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// URL opened at startup
    pub default_url: String,

    /// Rows per page; 0 loads everything in one request
    pub page_size: usize,

    pub completion_rule: CompletionRule,

    pub http: HttpConfig,

    /// Base URL of the projection registry
    pub projection_registry_url: String,

    pub map: MapConfig,
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Bytes read from the end of the file on the first metadata fetch
    pub footer_prefetch_bytes: usize,
}

/// Map framing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Half-size in metres of the view around a selected point
    pub min_point_extent: f64,
    /// Padding around selected non-point features, as a fraction
    pub fit_padding_ratio: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_URL.to_owned(),
            page_size: 100,
            completion_rule: CompletionRule::default(),
            http: HttpConfig::default(),
            projection_registry_url: DEFAULT_PROJECTION_REGISTRY.to_owned(),
            map: MapConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("geoparquet-viewer/", env!("CARGO_PKG_VERSION")).to_owned(),
            footer_prefetch_bytes: 64 * 1024,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            min_point_extent: fit.min_point_extent,
            fit_padding_ratio: fit.padding_ratio,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ViewerConfig {
    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reject values the loader cannot work with
    pub fn validate(&self) -> Result<(), DataError> {
        if self.http.footer_prefetch_bytes < 8 {
            return Err(DataError::Config(
                "http.footer_prefetch_bytes must be at least 8".into(),
            ));
        }
        if !(self.map.min_point_extent > 0.0) {
            return Err(DataError::Config("map.min_point_extent must be positive".into()));
        }
        if !(self.map.fit_padding_ratio >= 0.0) {
            return Err(DataError::Config("map.fit_padding_ratio must not be negative".into()));
        }
        Ok(())
    }

    /// Settings for the application state
    pub fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            page_size: self.page_size,
            completion_rule: self.completion_rule,
            fit: FitOptions {
                min_point_extent: self.map.min_point_extent,
                padding_ratio: self.map.fit_padding_ratio,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = ViewerConfig::from_json("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.page_size, 100);
        assert_eq!(config.http.footer_prefetch_bytes, 65_536);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let config = ViewerConfig::from_json(
            r#"{"page_size": 0, "completion_rule": "short_page", "map": {"min_point_extent": 50}}"#,
        )
        .unwrap();
        assert_eq!(config.page_size, 0);
        assert_eq!(config.completion_rule, CompletionRule::ShortPage);
        assert_eq!(config.map.min_point_extent, 50.0);
        assert_eq!(config.map.fit_padding_ratio, 0.1);

        let settings = config.load_settings();
        assert_eq!(settings.fit.min_point_extent, 50.0);
        assert_eq!(settings.page_size, 0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ViewerConfig::default();
        config.http.footer_prefetch_bytes = 4;
        assert!(matches!(config.validate(), Err(DataError::Config(_))));

        assert!(ViewerConfig::from_json(r#"{"page_size": "ten"}"#).is_err());
    }
}
