//! Map view: the feature source drawn on a Web Mercator plot

use egui::{Color32, Stroke, Ui};
use egui_plot::{Line, Plot, PlotBounds, PlotPoints, Points, Polygon};
use geo::{Closest, ClosestPoint, Intersects};
use geo_types::{Coord, Geometry, LineString, Point};
use gv_core::{AppCommand, AppState, Effect, Extent, FeatureId, FeatureSource, FeatureStyle};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;
use uuid::Uuid;

use crate::{SpaceView, SpaceViewId};

/// Half the width of the Web Mercator square, in metres
const WORLD_HALF_SIZE: f64 = 20_037_508.342_789_244;

/// Map view configuration
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub point_radius: f32,
    pub line_width: f32,
    pub feature_color: Color32,
    pub highlight_color: Color32,
    /// Click distance, in screen pixels, within which a feature is hit
    pub pick_tolerance_px: f32,
    pub show_grid: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            point_radius: 3.0,
            line_width: 1.5,
            feature_color: Color32::from_rgb(31, 119, 180),
            highlight_color: Color32::from_rgb(255, 127, 14),
            pick_tolerance_px: 6.0,
            show_grid: true,
        }
    }
}

/// Plot primitives for every feature, split by style so highlighted ones can
/// be drawn last
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MapShapes {
    pub points: Vec<[f64; 2]>,
    pub highlighted_points: Vec<[f64; 2]>,
    pub lines: Vec<(Vec<[f64; 2]>, FeatureStyle)>,
    pub polygons: Vec<(Vec<[f64; 2]>, FeatureStyle)>,
}

impl MapShapes {
    pub fn from_features(features: &FeatureSource) -> Self {
        let mut shapes = Self::default();
        for feature in features.iter() {
            shapes.add(&feature.geometry, feature.style);
        }
        shapes
    }

    fn add(&mut self, geometry: &Geometry<f64>, style: FeatureStyle) {
        match geometry {
            Geometry::Point(p) => self.add_point(p.0, style),
            Geometry::MultiPoint(mp) => mp.iter().for_each(|p| self.add_point(p.0, style)),
            Geometry::Line(l) => self.lines.push((vec![xy(l.start), xy(l.end)], style)),
            Geometry::LineString(ls) => self.lines.push((ring(ls), style)),
            Geometry::MultiLineString(mls) => {
                mls.iter().for_each(|ls| self.lines.push((ring(ls), style)))
            }
            Geometry::Polygon(p) => self.add_polygon(p, style),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.add_polygon(p, style)),
            Geometry::Rect(r) => self.add_polygon(&r.to_polygon(), style),
            Geometry::Triangle(t) => self.add_polygon(&t.to_polygon(), style),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.add(g, style)),
        }
    }

    fn add_point(&mut self, coord: Coord<f64>, style: FeatureStyle) {
        match style {
            FeatureStyle::Default => self.points.push(xy(coord)),
            FeatureStyle::Highlighted => self.highlighted_points.push(xy(coord)),
        }
    }

    fn add_polygon(&mut self, polygon: &geo_types::Polygon<f64>, style: FeatureStyle) {
        self.polygons.push((ring(polygon.exterior()), style));
        // Holes are outlined only
        for interior in polygon.interiors() {
            self.lines.push((ring(interior), style));
        }
    }
}

fn xy(coord: Coord<f64>) -> [f64; 2] {
    [coord.x, coord.y]
}

fn ring(line: &LineString<f64>) -> Vec<[f64; 2]> {
    line.coords().map(|c| xy(*c)).collect()
}

/// One feature in the pick index, keyed by its bounding box
#[derive(Debug, Clone, PartialEq)]
struct PickEntry {
    id: FeatureId,
    envelope: AABB<[f64; 2]>,
    geometry: Geometry<f64>,
}

impl PickEntry {
    /// Distance from `at` to the geometry itself; 0 on or inside it
    fn distance(&self, at: Point<f64>) -> f64 {
        if self.geometry.intersects(&at) {
            return 0.0;
        }
        match self.geometry.closest_point(&at) {
            Closest::Intersection(_) => 0.0,
            Closest::SinglePoint(p) => (p.x() - at.x()).hypot(p.y() - at.y()),
            Closest::Indeterminate => self.envelope.distance_2(&[at.x(), at.y()]).sqrt(),
        }
    }
}

impl RTreeObject for PickEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index used to resolve map clicks to features
#[derive(Default)]
pub struct PickIndex {
    tree: RTree<PickEntry>,
}

impl PickIndex {
    pub fn build(features: &FeatureSource) -> Self {
        let entries = features
            .iter()
            .filter_map(|feature| {
                let extent = feature.extent()?;
                Some(PickEntry {
                    id: feature.id,
                    envelope: AABB::from_corners(extent.min, extent.max),
                    geometry: feature.geometry.clone(),
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Feature hit at `at` within `tolerance` map units of its geometry.
    /// The smallest bounding box wins, so points and lines beat polygons
    /// they lie in; among equal boxes the nearest wins.
    pub fn pick(&self, at: [f64; 2], tolerance: f64) -> Option<FeatureId> {
        let search = AABB::from_corners(
            [at[0] - tolerance, at[1] - tolerance],
            [at[0] + tolerance, at[1] + tolerance],
        );
        let point = Point::new(at[0], at[1]);
        self.tree
            .locate_in_envelope_intersecting(&search)
            .filter_map(|entry| {
                let distance = entry.distance(point);
                if distance > tolerance {
                    return None;
                }
                let lower = entry.envelope.lower();
                let upper = entry.envelope.upper();
                let area = (upper[0] - lower[0]) * (upper[1] - lower[1]);
                Some((distance, area, entry.id))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.total_cmp(&b.0)))
            .map(|(_, _, id)| id)
    }
}

/// Features on a pannable, zoomable plot in EPSG:3857 metres
pub struct MapView {
    id: SpaceViewId,
    title: String,
    pub config: MapConfig,
    pending_bounds: Option<Extent>,
    cached_revision: Option<u64>,
    shapes: MapShapes,
    index: PickIndex,
}

impl Default for MapView {
    fn default() -> Self {
        Self::new("Map")
    }
}

impl MapView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            config: MapConfig::default(),
            pending_bounds: Some(world()),
            cached_revision: None,
            shapes: MapShapes::default(),
            index: PickIndex::default(),
        }
    }

    /// Show `extent` on the next frame
    pub fn fit(&mut self, extent: Extent) {
        self.pending_bounds = Some(extent);
    }

    /// Forget cached shapes and go back to the whole world
    pub fn clear(&mut self) {
        self.cached_revision = None;
        self.shapes = MapShapes::default();
        self.index = PickIndex::default();
        self.pending_bounds = Some(world());
    }

    pub fn pending_bounds(&self) -> Option<Extent> {
        self.pending_bounds
    }

    fn refresh(&mut self, features: &FeatureSource) {
        if self.cached_revision == Some(features.revision()) {
            return;
        }
        self.shapes = MapShapes::from_features(features);
        self.index = PickIndex::build(features);
        self.cached_revision = Some(features.revision());
        debug!(features = features.len(), "map shapes rebuilt");
    }

    fn color(&self, style: FeatureStyle) -> Color32 {
        match style {
            FeatureStyle::Default => self.config.feature_color,
            FeatureStyle::Highlighted => self.config.highlight_color,
        }
    }
}

fn world() -> Extent {
    Extent {
        min: [-WORLD_HALF_SIZE, -WORLD_HALF_SIZE],
        max: [WORLD_HALF_SIZE, WORLD_HALF_SIZE],
    }
}

impl SpaceView for MapView {
    fn id(&self) -> SpaceViewId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.title
    }

    fn ui(&mut self, state: &AppState, ui: &mut Ui) -> Vec<AppCommand> {
        self.refresh(state.features());
        let bounds = self.pending_bounds.take();

        let plot = Plot::new(format!("map_{}", self.id))
            .data_aspect(1.0)
            .show_grid(self.config.show_grid)
            .show_axes([false, false])
            .allow_double_click_reset(false);

        let response = plot.show(ui, |plot_ui| {
            if let Some(extent) = bounds {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(extent.min, extent.max));
            }

            // Highlighted geometry goes last so it is drawn on top
            for pass in [FeatureStyle::Default, FeatureStyle::Highlighted] {
                let color = self.color(pass);
                let width = match pass {
                    FeatureStyle::Default => self.config.line_width,
                    FeatureStyle::Highlighted => self.config.line_width * 2.0,
                };
                for (ring, _) in self.shapes.polygons.iter().filter(|(_, s)| *s == pass) {
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::new(ring.clone()))
                            .stroke(Stroke::new(width, color))
                            .fill_color(color.linear_multiply(0.25)),
                    );
                }
                for (path, _) in self.shapes.lines.iter().filter(|(_, s)| *s == pass) {
                    plot_ui.line(Line::new(PlotPoints::new(path.clone())).color(color).width(width));
                }
            }
            if !self.shapes.points.is_empty() {
                plot_ui.points(
                    Points::new(PlotPoints::new(self.shapes.points.clone()))
                        .radius(self.config.point_radius)
                        .color(self.config.feature_color),
                );
            }
            if !self.shapes.highlighted_points.is_empty() {
                plot_ui.points(
                    Points::new(PlotPoints::new(self.shapes.highlighted_points.clone()))
                        .radius(self.config.point_radius * 2.0)
                        .color(self.config.highlight_color),
                );
            }
        });

        let mut commands = Vec::new();
        if response.response.clicked() {
            if let Some(pos) = response.response.interact_pointer_pos() {
                let value = response.transform.value_from_position(pos);
                let per_pixel = response.transform.dvalue_dpos();
                let tolerance = per_pixel[0].abs().max(per_pixel[1].abs())
                    * f64::from(self.config.pick_tolerance_px);
                if let Some(id) = self.index.pick([value.x, value.y], tolerance) {
                    debug!(row = id.row, column = id.column, "feature picked on map");
                    commands.push(AppCommand::SelectFromMap(id));
                }
            }
        }
        commands
    }

    fn on_effect(&mut self, effect: &Effect) {
        match effect {
            Effect::ClearMap => self.clear(),
            Effect::FitView(extent) => self.fit(*extent),
            _ => {}
        }
    }
}
