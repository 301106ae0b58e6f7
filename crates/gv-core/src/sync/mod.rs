//! Row-to-feature index and the selection shared by the table and the map

use ahash::AHashMap;

use crate::features::{Extent, FeatureId, FeatureSource, FeatureStyle, FitOptions};

/// Bidirectional index between loaded rows and positions in the feature
/// source. Rebuilt from scratch on every reset.
#[derive(Debug, Default, Clone)]
pub struct FeatureIndex {
    by_row: AHashMap<usize, Vec<usize>>,
    by_feature: AHashMap<FeatureId, usize>,
}

impl FeatureIndex {
    pub fn insert(&mut self, id: FeatureId, position: usize) {
        self.by_row.entry(id.row).or_default().push(position);
        self.by_feature.insert(id, position);
    }

    pub fn clear(&mut self) {
        self.by_row.clear();
        self.by_feature.clear();
    }

    /// Feature positions for a row, empty when the row has no geometry
    pub fn positions_for_row(&self, row: usize) -> &[usize] {
        self.by_row.get(&row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn position_of(&self, id: &FeatureId) -> Option<usize> {
        self.by_feature.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_feature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_feature.is_empty()
    }
}

/// Keeps a single selected row in step between the table and the map
#[derive(Debug, Default, Clone)]
pub struct SelectionSync {
    selected: Option<usize>,
    index: FeatureIndex,
}

impl SelectionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn index(&self) -> &FeatureIndex {
        &self.index
    }

    /// Record features appended to the source starting at `first_position`
    pub fn register<'a>(&mut self, first_position: usize, ids: impl IntoIterator<Item = &'a FeatureId>) {
        for (offset, id) in ids.into_iter().enumerate() {
            self.index.insert(*id, first_position + offset);
        }
    }

    /// Forget the selection and the whole index
    pub fn reset(&mut self) {
        self.selected = None;
        self.index.clear();
    }

    /// Drop the highlight of the previous selection and record `row`.
    /// Returns the previously selected row.
    pub fn select(&mut self, row: usize, features: &mut FeatureSource) -> Option<usize> {
        let previous = self.selected.replace(row);
        if let Some(prev) = previous {
            for &position in self.index.positions_for_row(prev) {
                features.set_style(position, FeatureStyle::Default);
            }
        }
        previous
    }

    /// Select a row from the table side: highlight its features and return
    /// the extent the map should fit. A row without features is left alone.
    pub fn select_on_map(
        &mut self,
        row: usize,
        features: &mut FeatureSource,
        fit: &FitOptions,
    ) -> Option<Extent> {
        if self.index.positions_for_row(row).is_empty() {
            return None;
        }
        self.select(row, features);
        self.highlight(row, features);

        let positions = self.index.positions_for_row(row);
        fit.fit(positions.iter().filter_map(|&p| features.get(p)))
    }

    /// Select a row from the map side. Returns the row to scroll into view,
    /// or `None` when the row is not loaded.
    pub fn select_in_table(
        &mut self,
        row: usize,
        loaded_rows: usize,
        features: &mut FeatureSource,
    ) -> Option<usize> {
        if row >= loaded_rows {
            return None;
        }
        self.select(row, features);
        self.highlight(row, features);
        Some(row)
    }

    fn highlight(&self, row: usize, features: &mut FeatureSource) {
        for &position in self.index.positions_for_row(row) {
            features.set_style(position, FeatureStyle::Highlighted);
        }
    }
}
