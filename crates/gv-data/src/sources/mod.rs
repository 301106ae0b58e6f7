pub mod geoparquet;
pub mod range;

pub use geoparquet::{GeoParquetSource, RemoteParquetReader};
pub use range::{ByteRange, HttpRangeReader, RangeFetch};
