//! Remote GeoParquet access for the viewer

pub mod config;
pub mod geometry;
pub mod loader;
pub mod projection;
pub mod sources;

use arrow::error::ArrowError;
use gv_core::LoadErrorKind;
use parquet::errors::ParquetError;
use thiserror::Error;

// Re-exports
pub use config::{HttpConfig, MapConfig, ViewerConfig};
pub use geometry::GeometryMaterializer;
pub use loader::Loader;
pub use projection::{Projection, ProjectionRegistry};
pub use sources::{ByteRange, GeoParquetSource, HttpRangeReader, RangeFetch, RemoteParquetReader};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("no usable content-length for {0}")]
    MissingContentLength(String),

    #[error("invalid byte range {start}..{end:?}")]
    InvalidRange { start: u64, end: Option<u64> },

    #[error("range {range} of {url} returned {actual} bytes, expected {expected}")]
    ShortBody {
        url: String,
        range: String,
        expected: u64,
        actual: u64,
    },

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid WKB in column {column}, row {row}: {message}")]
    Wkb {
        column: String,
        row: usize,
        message: String,
    },

    #[error("unsupported geometry encoding {encoding:?} in column {column}")]
    UnsupportedEncoding { column: String, encoding: String },

    #[error("projection error for {crs}: {message}")]
    Projection { crs: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// User-facing category of the failure
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            DataError::Http(_)
            | DataError::HttpStatus { .. }
            | DataError::InvalidRange { .. }
            | DataError::ShortBody { .. }
            | DataError::Io(_) => LoadErrorKind::Network,
            DataError::MissingContentLength(_) => LoadErrorKind::MissingMetadata,
            DataError::Parquet(_)
            | DataError::Arrow(_)
            | DataError::Json(_)
            | DataError::Wkb { .. }
            | DataError::UnsupportedEncoding { .. }
            | DataError::Config(_)
            | DataError::Other(_) => LoadErrorKind::Decode,
            DataError::Projection { .. } => LoadErrorKind::Projection,
        }
    }
}

impl From<DataError> for ParquetError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::Parquet(inner) => inner,
            other => ParquetError::External(Box::new(other)),
        }
    }
}

/// Recover a `DataError` that was boxed through the parquet reader
pub(crate) fn unwrap_parquet(error: ParquetError) -> DataError {
    match error {
        ParquetError::External(inner) => match inner.downcast::<DataError>() {
            Ok(data) => *data,
            Err(other) => DataError::Parquet(ParquetError::External(other)),
        },
        other => DataError::Parquet(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_onto_user_categories() {
        assert_eq!(
            DataError::MissingContentLength("u".into()).kind(),
            LoadErrorKind::MissingMetadata
        );
        assert_eq!(
            DataError::HttpStatus { status: 404, url: "u".into() }.kind(),
            LoadErrorKind::Network
        );
        assert_eq!(
            DataError::Projection { crs: "EPSG:1".into(), message: "x".into() }.kind(),
            LoadErrorKind::Projection
        );
    }

    #[test]
    fn data_error_survives_parquet_boxing() {
        let boxed: ParquetError = DataError::MissingContentLength("u".into()).into();
        assert!(matches!(unwrap_parquet(boxed), DataError::MissingContentLength(_)));
    }
}
