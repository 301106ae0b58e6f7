//! The map's feature source: materialized geometries in display
//! coordinates (EPSG:3857), each tied to the row it came from.

use geo::BoundingRect;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};

/// Identifies one feature: the loaded row it belongs to and the ordinal of
/// the geometry column it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId {
    pub row: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureStyle {
    #[default]
    Default,
    Highlighted,
}

/// A geometry ready for the map
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry<f64>,
    pub style: FeatureStyle,
}

impl Feature {
    pub fn new(id: FeatureId, geometry: Geometry<f64>) -> Self {
        Self {
            id,
            geometry,
            style: FeatureStyle::Default,
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        self.geometry.bounding_rect().map(Extent::from)
    }

    pub fn is_point(&self) -> bool {
        matches!(self.geometry, Geometry::Point(_))
    }
}

/// Append-only list of features shown on the map.
///
/// Only the materializer appends and only the selection synchronizer
/// restyles.
#[derive(Debug, Default, Clone)]
pub struct FeatureSource {
    features: Vec<Feature>,
    /// Bumped on every mutation so views can cache derived data
    revision: u64,
}

impl FeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append features, returning the position of the first one
    pub fn append(&mut self, features: impl IntoIterator<Item = Feature>) -> usize {
        let first = self.features.len();
        self.features.extend(features);
        self.revision += 1;
        first
    }

    pub fn clear(&mut self) {
        self.features.clear();
        self.revision += 1;
    }

    pub fn set_style(&mut self, position: usize, style: FeatureStyle) {
        if let Some(feature) = self.features.get_mut(position) {
            if feature.style != style {
                feature.style = style;
                self.revision += 1;
            }
        }
    }

    pub fn get(&self, position: usize) -> Option<&Feature> {
        self.features.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn highlighted(&self) -> impl Iterator<Item = &Feature> {
        self.features
            .iter()
            .filter(|f| f.style == FeatureStyle::Highlighted)
    }

    /// Extent of every feature
    pub fn extent(&self) -> Option<Extent> {
        self.features
            .iter()
            .filter_map(Feature::extent)
            .reduce(|a, b| a.union(&b))
    }
}

/// Axis-aligned box in display coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl From<geo_types::Rect<f64>> for Extent {
    fn from(rect: geo_types::Rect<f64>) -> Self {
        Self {
            min: [rect.min().x, rect.min().y],
            max: [rect.max().x, rect.max().y],
        }
    }
}

impl Extent {
    pub fn around(center: [f64; 2], half_size: f64) -> Self {
        Self {
            min: [center[0] - half_size, center[1] - half_size],
            max: [center[0] + half_size, center[1] + half_size],
        }
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }

    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }

    pub fn contains(&self, point: [f64; 2]) -> bool {
        point[0] >= self.min[0]
            && point[0] <= self.max[0]
            && point[1] >= self.min[1]
            && point[1] <= self.max[1]
    }

    /// Grow by `ratio` of the larger side on every edge, then make sure each
    /// half-side is at least `min_half_size`.
    pub fn padded(&self, ratio: f64, min_half_size: f64) -> Extent {
        let pad = self.width().max(self.height()) * ratio;
        let center = self.center();
        let half_w = (self.width() / 2.0 + pad).max(min_half_size);
        let half_h = (self.height() / 2.0 + pad).max(min_half_size);
        Extent {
            min: [center[0] - half_w, center[1] - half_h],
            max: [center[0] + half_w, center[1] + half_h],
        }
    }
}

/// How the map frames a selected feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Half-size of the view around a point, in display units (metres)
    pub min_point_extent: f64,
    /// Padding around non-point extents, as a fraction of the larger side
    pub padding_ratio: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            min_point_extent: 250.0,
            padding_ratio: 0.1,
        }
    }
}

impl FitOptions {
    /// View extent for a set of features belonging to one row.
    ///
    /// A lone point gets a fixed-size window; anything else its padded
    /// bounding box.
    pub fn fit<'a>(&self, features: impl IntoIterator<Item = &'a Feature>) -> Option<Extent> {
        let mut only_points = true;
        let mut extent: Option<Extent> = None;
        for feature in features {
            only_points &= feature.is_point();
            if let Some(e) = feature.extent() {
                extent = Some(match extent {
                    Some(acc) => acc.union(&e),
                    None => e,
                });
            }
        }
        let extent = extent?;
        if only_points && extent.width() == 0.0 && extent.height() == 0.0 {
            Some(Extent::around(extent.center(), self.min_point_extent))
        } else {
            Some(extent.padded(self.padding_ratio, self.min_point_extent))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon};

    fn feature(row: usize, geometry: Geometry<f64>) -> Feature {
        Feature::new(FeatureId { row, column: 0 }, geometry)
    }

    #[test]
    fn point_gets_minimum_extent_fit() {
        let options = FitOptions {
            min_point_extent: 100.0,
            padding_ratio: 0.1,
        };
        let f = feature(0, point!(x: 1_000.0, y: 2_000.0).into());
        let extent = options.fit([&f]).unwrap();
        assert_eq!(extent, Extent::around([1_000.0, 2_000.0], 100.0));
    }

    #[test]
    fn polygon_gets_padded_extent_fit() {
        let options = FitOptions {
            min_point_extent: 1.0,
            padding_ratio: 0.1,
        };
        let f = feature(
            0,
            polygon![(x: 0.0, y: 0.0), (x: 1_000.0, y: 0.0), (x: 1_000.0, y: 500.0), (x: 0.0, y: 0.0)].into(),
        );
        let extent = options.fit([&f]).unwrap();
        assert_eq!(extent.min, [-100.0, -100.0]);
        assert_eq!(extent.max, [1_100.0, 600.0]);
    }

    #[test]
    fn flat_line_is_never_zero_height() {
        let options = FitOptions::default();
        let f = feature(0, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)].into());
        let extent = options.fit([&f]).unwrap();
        assert!(extent.height() >= 2.0 * options.min_point_extent);
    }

    #[test]
    fn source_tracks_revision_and_style() {
        let mut source = FeatureSource::new();
        let first = source.append(vec![
            feature(0, point!(x: 0.0, y: 0.0).into()),
            feature(1, point!(x: 5.0, y: 5.0).into()),
        ]);
        assert_eq!(first, 0);
        let rev = source.revision();

        source.set_style(1, FeatureStyle::Highlighted);
        assert!(source.revision() > rev);
        assert_eq!(source.highlighted().count(), 1);

        let extent = source.extent().unwrap();
        assert_eq!(extent.min, [0.0, 0.0]);
        assert_eq!(extent.max, [5.0, 5.0]);

        source.clear();
        assert!(source.is_empty());
        assert_eq!(source.extent(), None);
    }
}
