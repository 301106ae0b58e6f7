//! Parquet files read through a [`RangeFetch`]

use std::ops::Range;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt};
use gv_core::{FileInfo, GeoMetadata, PageRequest, SchemaColumn};
use parquet::arrow::arrow_reader::{ArrowReaderMetadata, ArrowReaderOptions};
use parquet::arrow::async_reader::{AsyncFileReader, ParquetRecordBatchStreamBuilder};
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;
use parquet::file::footer::{decode_footer, decode_metadata};
use parquet::file::metadata::ParquetMetaData;
use tracing::{debug, info};

use super::range::{ByteRange, RangeFetch};
use crate::{unwrap_parquet, DataError};

/// Length of the trailing metadata-length field plus the `PAR1` magic
const FOOTER_LEN: u64 = 8;

/// Parquet's [`AsyncFileReader`] on top of a remote resource.
///
/// Metadata is read with a single suffix request when the prefetch covers
/// it; otherwise the missing head of the metadata block is fetched as well.
pub struct RemoteParquetReader {
    fetch: Arc<dyn RangeFetch>,
    length: u64,
    footer_prefetch: usize,
    metadata: Option<Arc<ParquetMetaData>>,
}

impl RemoteParquetReader {
    pub fn new(fetch: Arc<dyn RangeFetch>, length: u64, footer_prefetch: usize) -> Self {
        Self {
            fetch,
            length,
            footer_prefetch,
            metadata: None,
        }
    }

    /// Reader that will not fetch metadata again
    pub fn with_metadata(mut self, metadata: Arc<ParquetMetaData>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    async fn load_metadata(&self) -> Result<ParquetMetaData, DataError> {
        let length = self.length;
        if length < FOOTER_LEN + 4 {
            return Err(DataError::Parquet(ParquetError::General(format!(
                "{} is {length} bytes, too small to be a Parquet file",
                self.fetch.location()
            ))));
        }

        let prefetch = (self.footer_prefetch as u64).clamp(FOOTER_LEN, length);
        let suffix_start = length - prefetch;
        let suffix = self.fetch.fetch(ByteRange::new(suffix_start, length)?).await?;
        if (suffix.len() as u64) < FOOTER_LEN {
            return Err(DataError::Parquet(ParquetError::EOF(
                "footer shorter than 8 bytes".into(),
            )));
        }

        let footer_at = suffix.len() - FOOTER_LEN as usize;
        let mut footer = [0u8; FOOTER_LEN as usize];
        footer.copy_from_slice(&suffix[footer_at..]);
        let metadata_len = decode_footer(&footer)? as u64;

        if metadata_len + FOOTER_LEN > length {
            return Err(DataError::Parquet(ParquetError::General(format!(
                "metadata length {metadata_len} exceeds file length {length}"
            ))));
        }
        let metadata_start = length - FOOTER_LEN - metadata_len;

        let metadata = if metadata_start >= suffix_start {
            let from = (metadata_start - suffix_start) as usize;
            decode_metadata(&suffix[from..footer_at])?
        } else {
            debug!(
                metadata_len,
                prefetch, "metadata larger than prefetch, fetching the rest"
            );
            let head = self
                .fetch
                .fetch(ByteRange::new(metadata_start, suffix_start)?)
                .await?;
            let mut buffer = Vec::with_capacity(metadata_len as usize);
            buffer.extend_from_slice(&head);
            buffer.extend_from_slice(&suffix[..footer_at]);
            decode_metadata(&buffer)?
        };
        Ok(metadata)
    }
}

impl AsyncFileReader for RemoteParquetReader {
    fn get_bytes(&mut self, range: Range<usize>) -> BoxFuture<'_, parquet::errors::Result<Bytes>> {
        let fetch = Arc::clone(&self.fetch);
        async move {
            if range.is_empty() {
                return Ok(Bytes::new());
            }
            let range = ByteRange::new(range.start as u64, range.end as u64)?;
            Ok(fetch.fetch(range).await?)
        }
        .boxed()
    }

    fn get_metadata(&mut self) -> BoxFuture<'_, parquet::errors::Result<Arc<ParquetMetaData>>> {
        async move {
            if let Some(metadata) = &self.metadata {
                return Ok(Arc::clone(metadata));
            }
            let metadata = Arc::new(self.load_metadata().await?);
            self.metadata = Some(Arc::clone(&metadata));
            Ok(metadata)
        }
        .boxed()
    }
}

/// A discovered remote GeoParquet file
pub struct GeoParquetSource {
    fetch: Arc<dyn RangeFetch>,
    length: u64,
    metadata: ArrowReaderMetadata,
    info: Arc<FileInfo>,
}

impl GeoParquetSource {
    /// Read the file size and metadata
    pub async fn open(fetch: Arc<dyn RangeFetch>, footer_prefetch: usize) -> Result<Self, DataError> {
        let length = fetch.byte_length().await?;
        let mut reader = RemoteParquetReader::new(Arc::clone(&fetch), length, footer_prefetch);
        let metadata = ArrowReaderMetadata::load_async(&mut reader, ArrowReaderOptions::new())
            .await
            .map_err(unwrap_parquet)?;

        let info = Arc::new(file_info(fetch.location(), length, &metadata)?);
        info!(
            url = %info.url,
            bytes = length,
            rows = info.total_rows,
            row_groups = info.row_groups,
            "opened parquet file"
        );
        Ok(Self {
            fetch,
            length,
            metadata,
            info,
        })
    }

    pub fn file_info(&self) -> &Arc<FileInfo> {
        &self.info
    }

    /// Read the rows of `request`, restricted to `columns`
    pub async fn read_page(
        &self,
        request: PageRequest,
        columns: &[String],
    ) -> Result<Vec<RecordBatch>, DataError> {
        let roots = columns
            .iter()
            .map(|name| {
                self.info
                    .column(name)
                    .map(|c| c.index)
                    .ok_or_else(|| DataError::Other(format!("unknown column {name:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let reader = RemoteParquetReader::new(Arc::clone(&self.fetch), self.length, 0)
            .with_metadata(Arc::clone(self.metadata.metadata()));
        let mask = ProjectionMask::roots(self.metadata.metadata().file_metadata().schema_descr(), roots);

        let mut builder = ParquetRecordBatchStreamBuilder::new_with_metadata(reader, self.metadata.clone())
            .with_projection(mask)
            .with_offset(request.offset);
        if let Some(limit) = request.limit {
            builder = builder.with_limit(limit);
        }

        let stream = builder.build().map_err(unwrap_parquet)?;
        let batches: Vec<RecordBatch> = stream.try_collect().await.map_err(unwrap_parquet)?;
        debug!(
            offset = request.offset,
            limit = ?request.limit,
            rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
            "read page"
        );
        Ok(batches)
    }
}

fn file_info(url: &str, length: u64, metadata: &ArrowReaderMetadata) -> Result<FileInfo, DataError> {
    let parquet = metadata.metadata();
    let file = parquet.file_metadata();

    let schema = metadata
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| SchemaColumn {
            name: field.name().clone(),
            index,
            data_type: field.data_type().to_string(),
        })
        .collect();

    let key_value: Vec<(String, String)> = file
        .key_value_metadata()
        .map(|pairs| {
            pairs
                .iter()
                .map(|kv| (kv.key.clone(), kv.value.clone().unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    let geo = GeoMetadata::from_key_value(&key_value)?;

    Ok(FileInfo {
        url: url.to_owned(),
        byte_length: length,
        total_rows: usize::try_from(file.num_rows()).unwrap_or_default(),
        row_groups: parquet.num_row_groups(),
        created_by: file.created_by().map(str::to_owned),
        schema,
        key_value,
        geo,
    })
}
