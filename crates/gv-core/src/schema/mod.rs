//! File-level description of a GeoParquet file: schema columns, key/value
//! metadata and the parsed `geo` metadata block.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key under which GeoParquet stores its JSON metadata block
pub const GEO_METADATA_KEY: &str = "geo";

/// A column of the file's Arrow schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    /// Position in the file schema, stable for a file session
    pub index: usize,
    /// Declared Arrow type, rendered for display
    pub data_type: String,
}

/// Everything known about a remote file after discovery
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub url: String,
    pub byte_length: u64,
    pub total_rows: usize,
    pub row_groups: usize,
    pub created_by: Option<String>,
    pub schema: Vec<SchemaColumn>,
    /// Raw key/value metadata, in file order
    pub key_value: Vec<(String, String)>,
    pub geo: Option<GeoMetadata>,
}

impl FileInfo {
    /// Names of every schema column, in schema order
    pub fn column_names(&self) -> Vec<String> {
        self.schema.iter().map(|c| c.name.clone()).collect()
    }

    /// Look up a schema column by name
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.schema.iter().find(|c| c.name == name)
    }
}

/// Parsed `geo` metadata block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoMetadata {
    #[serde(default)]
    pub version: Option<String>,
    pub primary_column: String,
    pub columns: BTreeMap<String, GeoColumn>,
}

/// Descriptor of one geometry column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoColumn {
    pub encoding: String,
    #[serde(default)]
    pub geometry_types: Vec<String>,
    /// PROJJSON, a bare `AUTH:CODE` string, or explicit `null`.
    /// Absent means OGC:CRS84.
    #[serde(default, deserialize_with = "deserialize_crs")]
    pub crs: CrsField,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
}

/// Distinguishes an absent `crs` key from an explicit `null`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum CrsField {
    #[default]
    Absent,
    Null,
    Value(Value),
}

fn deserialize_crs<'de, D>(deserializer: D) -> Result<CrsField, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => CrsField::Null,
        other => CrsField::Value(other),
    })
}

/// Authority/code pair identifying a coordinate reference system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrsCode {
    pub authority: String,
    pub code: String,
}

impl CrsCode {
    pub fn new(authority: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            authority: authority.into().to_uppercase(),
            code: code.into(),
        }
    }

    /// Longitude/latitude on WGS84, the GeoParquet default
    pub fn crs84() -> Self {
        Self::new("OGC", "CRS84")
    }

    /// Parse `AUTH:CODE`
    pub fn parse(text: &str) -> Option<Self> {
        let (authority, code) = text.trim().split_once(':')?;
        if authority.is_empty() || code.is_empty() {
            return None;
        }
        Some(Self::new(authority, code))
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl GeoColumn {
    /// Resolve the column CRS to an authority/code pair.
    ///
    /// Returns `None` for an explicit `null` CRS or a PROJJSON document
    /// without an `id`.
    pub fn crs_code(&self) -> Option<CrsCode> {
        match &self.crs {
            CrsField::Absent => Some(CrsCode::crs84()),
            CrsField::Null => None,
            CrsField::Value(Value::String(text)) => CrsCode::parse(text),
            CrsField::Value(Value::Object(map)) => {
                let id = map.get("id")?;
                let authority = id.get("authority")?.as_str()?;
                let code = match id.get("code")? {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => return None,
                };
                Some(CrsCode::new(authority, code))
            }
            CrsField::Value(_) => None,
        }
    }

    pub fn is_wkb(&self) -> bool {
        self.encoding.eq_ignore_ascii_case("wkb")
    }
}

impl GeoMetadata {
    /// Parse the JSON value stored under [`GEO_METADATA_KEY`]
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Find and parse the `geo` entry in a file's key/value metadata.
    ///
    /// Returns `Ok(None)` when the key is not present.
    pub fn from_key_value(pairs: &[(String, String)]) -> serde_json::Result<Option<Self>> {
        pairs
            .iter()
            .find(|(key, _)| key == GEO_METADATA_KEY)
            .map(|(_, value)| Self::from_json(value))
            .transpose()
    }

    /// Geometry column names, primary column first then the rest by name.
    /// The position in this list is the column ordinal used in feature ids.
    pub fn ordered_columns(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.columns.len());
        if self.columns.contains_key(&self.primary_column) {
            names.push(self.primary_column.as_str());
        }
        names.extend(
            self.columns
                .keys()
                .map(String::as_str)
                .filter(|name| *name != self.primary_column),
        );
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1.0.0",
        "primary_column": "geometry",
        "columns": {
            "geometry": {
                "encoding": "WKB",
                "geometry_types": ["Point"],
                "crs": {"id": {"authority": "EPSG", "code": 4326}}
            },
            "centroid": {"encoding": "WKB"},
            "area": {"encoding": "WKB", "crs": null},
            "outline": {"encoding": "WKB", "crs": "epsg:27700"}
        }
    }"#;

    #[test]
    fn parses_columns_and_primary() {
        let geo = GeoMetadata::from_json(SAMPLE).unwrap();
        assert_eq!(geo.primary_column, "geometry");
        assert_eq!(geo.version.as_deref(), Some("1.0.0"));
        assert_eq!(geo.columns.len(), 4);
        assert!(geo.columns["geometry"].is_wkb());
        assert_eq!(geo.columns["geometry"].geometry_types, vec!["Point"]);
    }

    #[test]
    fn crs_resolution_rules() {
        let geo = GeoMetadata::from_json(SAMPLE).unwrap();
        assert_eq!(
            geo.columns["geometry"].crs_code(),
            Some(CrsCode::new("EPSG", "4326"))
        );
        assert_eq!(geo.columns["centroid"].crs_code(), Some(CrsCode::crs84()));
        assert_eq!(geo.columns["area"].crs_code(), None);
        assert_eq!(
            geo.columns["outline"].crs_code(),
            Some(CrsCode::new("EPSG", "27700"))
        );
    }

    #[test]
    fn primary_column_is_ordered_first() {
        let geo = GeoMetadata::from_json(SAMPLE).unwrap();
        assert_eq!(
            geo.ordered_columns(),
            vec!["geometry", "area", "centroid", "outline"]
        );
    }

    #[test]
    fn missing_geo_key_is_none() {
        let pairs = vec![("ARROW:schema".to_owned(), "...".to_owned())];
        assert_eq!(GeoMetadata::from_key_value(&pairs).unwrap(), None);
    }

    #[test]
    fn malformed_geo_value_is_an_error() {
        let pairs = vec![(GEO_METADATA_KEY.to_owned(), "{not json".to_owned())];
        assert!(GeoMetadata::from_key_value(&pairs).is_err());
    }

    #[test]
    fn crs_code_display_and_parse() {
        let code = CrsCode::parse("epsg:3857").unwrap();
        assert_eq!(code.to_string(), "EPSG:3857");
        assert!(CrsCode::parse("3857").is_none());
        assert!(CrsCode::parse(":3857").is_none());
    }
}
