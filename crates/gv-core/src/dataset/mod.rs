//! Accumulated rows of the current load session

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;

/// Column-major store of every page loaded so far.
///
/// Batches are kept as returned by the decoder; row indices are global
/// across batches.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    schema: Option<SchemaRef>,
    batches: Vec<RecordBatch>,
    /// Start row of each batch
    starts: Vec<usize>,
    row_count: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the batches of one page. All batches must share the schema of
    /// the first batch ever appended.
    pub fn append(&mut self, batches: Vec<RecordBatch>) -> Result<usize, ArrowError> {
        if let Some(expected) = self.schema.as_ref().or_else(|| batches.first().map(|b| b.schema_ref())) {
            if let Some(bad) = batches.iter().find(|b| b.schema_ref() != expected) {
                return Err(ArrowError::SchemaError(format!(
                    "page schema {:?} does not match dataset schema {:?}",
                    bad.schema(),
                    expected
                )));
            }
        }

        let mut added = 0;
        for batch in batches {
            if self.schema.is_none() {
                self.schema = Some(batch.schema());
            }
            if batch.num_rows() == 0 {
                continue;
            }
            self.starts.push(self.row_count);
            self.row_count += batch.num_rows();
            added += batch.num_rows();
            self.batches.push(batch);
        }
        Ok(added)
    }

    /// Drop every row and the schema
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .as_ref()
            .map(|s| s.fields().iter().map(|f| f.name().clone()).collect())
            .unwrap_or_default()
    }

    /// Batch index and row within that batch for a global row
    pub fn locate(&self, row: usize) -> Option<(usize, usize)> {
        if row >= self.row_count {
            return None;
        }
        let batch = match self.starts.binary_search(&row) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        Some((batch, row - self.starts[batch]))
    }

    /// Render one cell for display
    pub fn cell(&self, row: usize, column: usize) -> Option<String> {
        let (batch, local) = self.locate(row)?;
        let array = self.batches[batch].columns().get(column)?;
        Some(display_value(array, local))
    }

    /// Render one row for display
    pub fn row(&self, row: usize) -> Option<Vec<String>> {
        let (batch, local) = self.locate(row)?;
        Some(
            self.batches[batch]
                .columns()
                .iter()
                .map(|array| display_value(array, local))
                .collect(),
        )
    }
}

/// Binary columns hold WKB; show their size rather than the bytes
fn display_value(array: &ArrayRef, row: usize) -> String {
    if array.is_null(row) {
        return String::new();
    }
    match array.data_type() {
        DataType::Binary => {
            let len = array
                .as_any()
                .downcast_ref::<arrow::array::BinaryArray>()
                .map(|a| a.value(row).len())
                .unwrap_or_default();
            format!("<{len} bytes>")
        }
        DataType::LargeBinary => {
            let len = array
                .as_any()
                .downcast_ref::<arrow::array::LargeBinaryArray>()
                .map(|a| a.value(row).len())
                .unwrap_or_default();
            format!("<{len} bytes>")
        }
        _ => array_value_to_string(array, row).unwrap_or_default(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use arrow::array::{BinaryArray, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    pub(crate) fn batch(ids: std::ops::Range<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let names: Vec<String> = ids.clone().map(|i| format!("row-{i}")).collect();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids.collect::<Vec<_>>())),
                Arc::new(StringArray::from(names)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn append_accumulates_rows_across_batches() {
        let mut dataset = Dataset::new();
        assert_eq!(dataset.append(vec![batch(0..3), batch(3..5)]).unwrap(), 5);
        assert_eq!(dataset.append(vec![batch(5..6)]).unwrap(), 1);
        assert_eq!(dataset.row_count(), 6);
        assert_eq!(dataset.column_names(), vec!["id", "name"]);
        assert_eq!(dataset.locate(4), Some((1, 1)));
        assert_eq!(dataset.cell(5, 1).as_deref(), Some("row-5"));
        assert_eq!(dataset.row(2), Some(vec!["2".to_owned(), "row-2".to_owned()]));
        assert_eq!(dataset.cell(6, 0), None);
    }

    #[test]
    fn empty_batches_keep_schema_but_add_no_rows() {
        let mut dataset = Dataset::new();
        assert_eq!(dataset.append(vec![batch(0..0)]).unwrap(), 0);
        assert!(dataset.is_empty());
        assert!(dataset.schema().is_some());
    }

    #[test]
    fn mismatched_schema_is_rejected() {
        let mut dataset = Dataset::new();
        dataset.append(vec![batch(0..2)]).unwrap();

        let other = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)])),
            vec![Arc::new(Int64Array::from(vec![1]))],
        )
        .unwrap();
        assert!(dataset.append(vec![other]).is_err());
        assert_eq!(dataset.row_count(), 2);
    }

    #[test]
    fn binary_cells_show_size() {
        let schema = Arc::new(Schema::new(vec![Field::new("geometry", DataType::Binary, true)]));
        let values: Vec<Option<&[u8]>> = vec![Some(&[1, 2, 3]), None];
        let batch = RecordBatch::try_new(schema, vec![Arc::new(BinaryArray::from(values))]).unwrap();

        let mut dataset = Dataset::new();
        dataset.append(vec![batch]).unwrap();
        assert_eq!(dataset.cell(0, 0).as_deref(), Some("<3 bytes>"));
        assert_eq!(dataset.cell(1, 0).as_deref(), Some(""));
    }

    #[test]
    fn clear_resets_everything() {
        let mut dataset = Dataset::new();
        dataset.append(vec![batch(0..4)]).unwrap();
        dataset.clear();
        assert_eq!(dataset.row_count(), 0);
        assert!(dataset.schema().is_none());
        assert!(dataset.batches().is_empty());
    }
}
