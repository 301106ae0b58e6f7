//! Turns WKB geometry columns of loaded batches into map features

use std::sync::Arc;

use arrow::array::{Array, AsArray, GenericBinaryArray, OffsetSizeTrait};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use geo::{BoundingRect, MapCoords};
use geo_types::Geometry;
use geozero::wkb::Wkb;
use geozero::ToGeo;
use gv_core::{Feature, FeatureId, GeoMetadata};
use tracing::{debug, warn};

use crate::projection::{Projection, ProjectionRegistry};
use crate::DataError;

/// A geometry column that will be decoded, with its projection resolved
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub name: String,
    /// Position in the primary-first column order
    pub ordinal: usize,
    pub projection: Arc<Projection>,
}

/// Features of one page plus the problems that did not abort it
#[derive(Debug, Default)]
pub struct Materialized {
    pub features: Vec<Feature>,
    pub warnings: Vec<String>,
}

pub struct GeometryMaterializer {
    registry: Arc<ProjectionRegistry>,
}

impl GeometryMaterializer {
    pub fn new(registry: Arc<ProjectionRegistry>) -> Self {
        Self { registry }
    }

    /// Work out which geometry columns of `schema` can be drawn.
    ///
    /// Columns with an encoding other than WKB or a CRS that cannot be
    /// resolved are left out and reported as warnings.
    pub async fn plan(&self, geo: &GeoMetadata, schema: &Schema) -> (Vec<ColumnPlan>, Vec<String>) {
        let mut plans = Vec::new();
        let mut warnings = Vec::new();

        for (ordinal, name) in geo.ordered_columns().into_iter().enumerate() {
            if schema.index_of(name).is_err() {
                continue;
            }
            let column = &geo.columns[name];
            if !column.is_wkb() {
                let err = DataError::UnsupportedEncoding {
                    column: name.to_owned(),
                    encoding: column.encoding.clone(),
                };
                warnings.push(err.to_string());
                continue;
            }
            let Some(crs) = column.crs_code() else {
                warnings.push(format!("column {name} has no usable CRS; not drawn"));
                continue;
            };
            match self.registry.resolve(&crs).await {
                Ok(projection) => plans.push(ColumnPlan {
                    name: name.to_owned(),
                    ordinal,
                    projection,
                }),
                Err(err) => {
                    warn!(column = name, %crs, error = %err, "projection unavailable");
                    warnings.push(format!("column {name}: {err}"));
                }
            }
        }
        (plans, warnings)
    }

    /// Decode every drawable geometry in `batches`. Rows are numbered from
    /// `offset`, the page's first global row.
    pub async fn materialize(
        &self,
        geo: Option<&GeoMetadata>,
        batches: &[RecordBatch],
        offset: usize,
    ) -> Result<Materialized, DataError> {
        let (Some(geo), Some(first)) = (geo, batches.first()) else {
            return Ok(Materialized::default());
        };
        let (plans, mut warnings) = self.plan(geo, first.schema_ref()).await;
        let (features, skipped) = decode_columns(&plans, batches, offset)?;
        warnings.extend(skipped);
        debug!(offset, features = features.len(), columns = plans.len(), "materialized page");
        Ok(Materialized { features, warnings })
    }
}

/// Decode and project the planned columns. Invalid WKB fails the whole
/// page; coordinates that cannot be projected only drop their feature.
pub fn decode_columns(
    plans: &[ColumnPlan],
    batches: &[RecordBatch],
    offset: usize,
) -> Result<(Vec<Feature>, Vec<String>), DataError> {
    let mut features = Vec::new();
    let mut dropped = vec![0usize; plans.len()];
    let mut row_base = offset;

    for batch in batches {
        for (plan_index, plan) in plans.iter().enumerate() {
            let Some(array) = batch.column_by_name(&plan.name) else {
                continue;
            };
            let decoded = match array.data_type() {
                DataType::Binary => decode_array(plan, array.as_binary::<i32>(), row_base)?,
                DataType::LargeBinary => decode_array(plan, array.as_binary::<i64>(), row_base)?,
                other => {
                    return Err(DataError::Other(format!(
                        "geometry column {} has type {other}, expected binary",
                        plan.name
                    )))
                }
            };
            for result in decoded {
                match result {
                    Some(feature) => features.push(feature),
                    None => dropped[plan_index] += 1,
                }
            }
        }
        row_base += batch.num_rows();
    }

    let warnings = plans
        .iter()
        .zip(dropped)
        .filter(|(_, count)| *count > 0)
        .map(|(plan, count)| format!("{count} geometries in column {} could not be projected", plan.name))
        .collect();
    Ok((features, warnings))
}

/// One entry per non-null, non-empty row: the feature, or `None` when its
/// coordinates could not be projected
fn decode_array<O: OffsetSizeTrait>(
    plan: &ColumnPlan,
    array: &GenericBinaryArray<O>,
    row_base: usize,
) -> Result<Vec<Option<Feature>>, DataError> {
    let projection = plan.projection.as_ref();
    let mut out = Vec::new();
    for local in 0..array.len() {
        if array.is_null(local) {
            continue;
        }
        let row = row_base + local;
        let geometry = decode_wkb(array.value(local)).map_err(|message| DataError::Wkb {
            column: plan.name.clone(),
            row,
            message,
        })?;
        if is_empty(&geometry) {
            continue;
        }
        let id = FeatureId {
            row,
            column: plan.ordinal,
        };
        let projected = geometry.try_map_coords(|coord| projection.to_web_mercator(coord));
        out.push(projected.ok().map(|geometry| Feature::new(id, geometry)));
    }
    Ok(out)
}

/// Decode ISO or plain 2D WKB in either byte order. Z and M
/// ordinates are dropped.
fn decode_wkb(bytes: &[u8]) -> Result<Geometry<f64>, String> {
    Wkb(bytes.to_vec()).to_geo().map_err(|e| e.to_string())
}

/// Empty geometries (e.g. `POINT EMPTY`, which WKB writes as NaN) are not drawn
fn is_empty(geometry: &Geometry<f64>) -> bool {
    match geometry.bounding_rect() {
        Some(rect) => !(rect.min().x.is_finite() && rect.min().y.is_finite()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::lonlat_to_web_mercator;
    use arrow::array::BinaryArray;
    use arrow::datatypes::Field;
    use geo_types::{Coord, Point};

    /// Little-endian WKB point
    fn wkb_point(x: f64, y: f64) -> Vec<u8> {
        let mut out = vec![1u8];
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
        out
    }

    fn lonlat_plan() -> ColumnPlan {
        ColumnPlan {
            name: "geometry".into(),
            ordinal: 0,
            projection: Arc::new(Projection::LonLat),
        }
    }

    fn identity_plan() -> ColumnPlan {
        ColumnPlan {
            name: "geometry".into(),
            ordinal: 0,
            projection: Arc::new(Projection::Identity),
        }
    }

    fn geometry_batch(values: Vec<Option<Vec<u8>>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("geometry", DataType::Binary, true)]));
        let array: BinaryArray = values.iter().map(|v| v.as_deref()).collect();
        RecordBatch::try_new(schema, vec![Arc::new(array)]).unwrap()
    }

    #[test]
    fn points_are_projected_and_offset() {
        let batch = geometry_batch(vec![Some(wkb_point(10.0, 50.0)), None, Some(wkb_point(0.0, 0.0))]);
        let (features, warnings) = decode_columns(&[lonlat_plan()], &[batch], 200).unwrap();
        assert!(warnings.is_empty());

        let rows: Vec<usize> = features.iter().map(|f| f.id.row).collect();
        assert_eq!(rows, vec![200, 202]);

        let expected = lonlat_to_web_mercator(Coord { x: 10.0, y: 50.0 });
        match features[0].geometry {
            Geometry::Point(Point(c)) => {
                assert!((c.x - expected.x).abs() < 1e-6);
                assert!((c.y - expected.y).abs() < 1e-6);
            }
            ref other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn rows_continue_across_batches() {
        let a = geometry_batch(vec![Some(wkb_point(1.0, 1.0)), Some(wkb_point(2.0, 2.0))]);
        let b = geometry_batch(vec![Some(wkb_point(3.0, 3.0))]);
        let (features, _) = decode_columns(&[lonlat_plan()], &[a, b], 10).unwrap();
        let rows: Vec<usize> = features.iter().map(|f| f.id.row).collect();
        assert_eq!(rows, vec![10, 11, 12]);
    }

    #[test]
    fn malformed_wkb_fails_the_page() {
        let batch = geometry_batch(vec![Some(vec![1, 99, 0, 0])]);
        let err = decode_columns(&[lonlat_plan()], &[batch], 5).unwrap_err();
        assert!(matches!(err, DataError::Wkb { row: 5, .. }));
    }

    #[test]
    fn unknown_geometry_type_is_a_decode_error() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&99u32.to_le_bytes());
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        bytes.extend_from_slice(&2.0f64.to_le_bytes());
        let batch = geometry_batch(vec![Some(wkb_point(0.0, 0.0)), Some(bytes)]);

        let err = decode_columns(&[lonlat_plan()], &[batch], 0).unwrap_err();
        assert!(matches!(err, DataError::Wkb { row: 1, .. }));
        assert_eq!(err.kind(), gv_core::LoadErrorKind::Decode);
    }

    #[test]
    fn iso_point_z_keeps_its_horizontal_position() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&1001u32.to_le_bytes());
        for value in [10.0f64, 50.0, 123.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let batch = geometry_batch(vec![Some(bytes)]);

        let (features, warnings) = decode_columns(&[lonlat_plan()], &[batch], 0).unwrap();
        assert!(warnings.is_empty());
        let expected = lonlat_to_web_mercator(Coord { x: 10.0, y: 50.0 });
        match features[0].geometry {
            Geometry::Point(Point(c)) => {
                assert!((c.x - expected.x).abs() < 1e-6);
                assert!((c.y - expected.y).abs() < 1e-6);
            }
            ref other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn big_endian_points_decode() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&3.0f64.to_be_bytes());
        bytes.extend_from_slice(&4.0f64.to_be_bytes());
        let batch = geometry_batch(vec![Some(bytes)]);

        let (features, _) = decode_columns(&[identity_plan()], &[batch], 0).unwrap();
        assert_eq!(features[0].geometry, Geometry::Point(Point::new(3.0, 4.0)));
    }

    #[tokio::test]
    async fn null_crs_and_foreign_encoding_become_warnings() {
        let geo = GeoMetadata::from_json(
            r#"{"primary_column": "geometry", "columns": {
                "geometry": {"encoding": "WKB"},
                "nocrs": {"encoding": "WKB", "crs": null},
                "arrow": {"encoding": "point"}
            }}"#,
        )
        .unwrap();
        let schema = Schema::new(vec![
            Field::new("geometry", DataType::Binary, true),
            Field::new("nocrs", DataType::Binary, true),
            Field::new("arrow", DataType::Binary, true),
        ]);
        let materializer = GeometryMaterializer::new(Arc::new(ProjectionRegistry::offline()));
        let (plans, warnings) = materializer.plan(&geo, &schema).await;

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "geometry");
        assert_eq!(plans[0].ordinal, 0);
        assert_eq!(warnings.len(), 2);
    }

    #[tokio::test]
    async fn columns_missing_from_the_page_are_skipped() {
        let geo = GeoMetadata::from_json(
            r#"{"primary_column": "geometry", "columns": {"geometry": {"encoding": "WKB"}}}"#,
        )
        .unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(arrow::array::Int64Array::from(vec![1, 2]))],
        )
        .unwrap();
        let materializer = GeometryMaterializer::new(Arc::new(ProjectionRegistry::offline()));
        let page = materializer.materialize(Some(&geo), &[batch], 0).await.unwrap();
        assert!(page.features.is_empty());
        assert!(page.warnings.is_empty());
    }
}
