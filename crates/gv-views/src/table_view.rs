//! Table view of the loaded rows

use egui::{RichText, Sense, Ui};
use egui_extras::{Column, TableBuilder};
use gv_core::{AppCommand, AppState, Effect};
use uuid::Uuid;

use crate::{SpaceView, SpaceViewId};

/// Configuration for table views
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub show_row_numbers: bool,
    pub striped_rows: bool,
    pub resizable_columns: bool,
    /// Longer cell values are cut and end in an ellipsis
    pub max_cell_chars: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            show_row_numbers: true,
            striped_rows: true,
            resizable_columns: true,
            max_cell_chars: 50,
        }
    }
}

/// Table of every loaded row. Clicking a cell selects its row.
pub struct TableView {
    id: SpaceViewId,
    title: String,
    pub config: TableConfig,
    scroll_to: Option<usize>,
}

impl Default for TableView {
    fn default() -> Self {
        Self::new("Rows")
    }
}

impl TableView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            config: TableConfig::default(),
            scroll_to: None,
        }
    }

    /// Bring `row` into view on the next frame
    pub fn scroll_to_row(&mut self, row: usize) {
        self.scroll_to = Some(row);
    }

    pub fn pending_scroll(&self) -> Option<usize> {
        self.scroll_to
    }

    fn render_table(&mut self, ui: &mut Ui, state: &AppState) -> Vec<AppCommand> {
        let dataset = state.dataset();
        let columns = dataset.column_names();
        let num_rows = dataset.row_count();
        let selected = state.selected_row();

        let text_height = egui::TextStyle::Body.resolve(ui.style()).size * 1.5;
        let selection_bg_fill = ui.style().visuals.selection.bg_fill;
        let selection_text = ui.style().visuals.selection.stroke.color;
        let max_chars = self.config.max_cell_chars;
        let show_row_numbers = self.config.show_row_numbers;

        let mut builder = TableBuilder::new(ui)
            .striped(self.config.striped_rows)
            .resizable(self.config.resizable_columns)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .min_scrolled_height(0.0)
            .vscroll(true);

        if let Some(row) = self.scroll_to.take() {
            builder = builder.scroll_to_row(row, Some(egui::Align::Center));
        }
        if show_row_numbers {
            builder = builder.column(Column::initial(50.0).at_least(40.0));
        }
        for _ in &columns {
            builder = builder.column(
                Column::initial(150.0)
                    .at_least(60.0)
                    .at_most(400.0)
                    .clip(true)
                    .resizable(self.config.resizable_columns),
            );
        }

        let mut clicked = None;
        builder
            .header(20.0, |mut header| {
                if show_row_numbers {
                    header.col(|ui| {
                        ui.strong("#");
                    });
                }
                for name in &columns {
                    header.col(|ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|body| {
                body.rows(text_height, num_rows, |row_index, mut row| {
                    let is_selected = selected == Some(row_index);
                    let mut cell = |ui: &mut Ui, text: String| {
                        if is_selected {
                            ui.painter()
                                .rect_filled(ui.available_rect_before_wrap(), 0.0, selection_bg_fill);
                        }
                        let text = if is_selected {
                            RichText::new(text).color(selection_text)
                        } else {
                            RichText::new(text)
                        };
                        if ui.add(egui::Label::new(text).sense(Sense::click())).clicked() {
                            clicked = Some(row_index);
                        }
                    };

                    if show_row_numbers {
                        row.col(|ui| cell(ui, row_index.to_string()));
                    }
                    for column in 0..columns.len() {
                        let value = dataset.cell(row_index, column).unwrap_or_default();
                        row.col(|ui| cell(ui, truncate(value, max_chars)));
                    }
                });
            });

        clicked
            .map(AppCommand::SelectFromTable)
            .into_iter()
            .collect()
    }
}

impl SpaceView for TableView {
    fn id(&self) -> SpaceViewId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.title
    }

    fn ui(&mut self, state: &AppState, ui: &mut Ui) -> Vec<AppCommand> {
        let dataset = state.dataset();
        if dataset.is_empty() {
            ui.centered_and_justified(|ui| {
                if state.is_loading() {
                    ui.label("Loading rows...");
                } else {
                    ui.label("No rows loaded");
                }
            });
            return vec![];
        }

        ui.horizontal(|ui| {
            ui.label(format!("Rows: {}", dataset.row_count()));
            ui.separator();
            ui.label(format!("Columns: {}", dataset.column_names().len()));
            if let Some(row) = state.selected_row() {
                ui.separator();
                ui.label(format!("Selected: {row}"));
            }
        });
        ui.add_space(4.0);

        egui::ScrollArea::horizontal()
            .id_source(format!("table_{}", self.id))
            .show(ui, |ui| self.render_table(ui, state))
            .inner
    }

    fn on_effect(&mut self, effect: &Effect) {
        match effect {
            Effect::ScrollToRow(row) => self.scroll_to_row(*row),
            Effect::ClearMap => self.scroll_to = None,
            _ => {}
        }
    }
}

/// Cut `value` to at most `max_chars` characters
fn truncate(value: String, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", &value[..byte]),
        None => value,
    }
}
