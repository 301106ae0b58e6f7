//! Dialogs of the modal stack

use egui::{Context, Grid, Id, Window};
use gv_core::{AppCommand, FileInfo, GeoMetadata, Modal, ModalAction, ModalDescriptor, ModalId};
use tracing::debug;

/// Render every open dialog, bottom of the stack first
pub fn show_modals(ctx: &Context, state: &gv_core::AppState) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for descriptor in state.modals().iter() {
        if let Some(action) = show_modal(ctx, descriptor) {
            forget_input(ctx, descriptor.id);
            commands.push(dialog_command(descriptor, action));
        }
    }
    commands
}

/// Command reporting `action` on the dialog `descriptor`
fn dialog_command(descriptor: &ModalDescriptor, action: ModalAction) -> AppCommand {
    debug!(modal = descriptor.modal.title(), id = ?descriptor.id, ?action, "dialog action");
    AppCommand::ModalAction {
        id: descriptor.id,
        action,
    }
}

fn show_modal(ctx: &Context, descriptor: &ModalDescriptor) -> Option<ModalAction> {
    let mut open = true;
    let mut action = None;

    let window = Window::new(descriptor.modal.title())
        .id(Id::new(descriptor.id))
        .open(&mut open)
        .collapsible(false);

    match &descriptor.modal {
        Modal::About => {
            window.resizable(false).show(ctx, |ui| {
                ui.heading("GeoParquet Viewer");
                ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                ui.add_space(8.0);
                ui.label("Streams GeoParquet files over HTTP range requests and shows their rows on a table and a map.");
                ui.add_space(8.0);
                if ui.button("Close").clicked() {
                    action = Some(ModalAction::Close);
                }
            });
        }
        Modal::Load { url } => {
            window.default_width(480.0).show(ctx, |ui| {
                let mut text = load_input(ctx, descriptor.id, url);
                ui.label("URL of a GeoParquet file:");
                let response = ui.add(
                    egui::TextEdit::singleline(&mut text)
                        .desired_width(f32::INFINITY)
                        .hint_text("https://..."),
                );
                let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let can_submit = !text.trim().is_empty();
                    if ui.add_enabled(can_submit, egui::Button::new("Load")).clicked() || (submitted && can_submit) {
                        action = Some(ModalAction::SubmitUrl(text.trim().to_owned()));
                    }
                    if ui.button("Cancel").clicked() {
                        action = Some(ModalAction::Close);
                    }
                });
                store_input(ctx, descriptor.id, text);
            });
        }
        Modal::Metadata(info) => {
            window.default_width(520.0).resizable(true).show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(480.0).show(ui, |ui| {
                    metadata_ui(ui, info);
                });
            });
        }
    }

    if !open && action.is_none() {
        action = Some(ModalAction::Close);
    }
    action
}

fn metadata_ui(ui: &mut egui::Ui, info: &FileInfo) {
    ui.strong("File");
    key_value_grid(ui, "file_grid", &file_summary(info));

    ui.separator();
    ui.strong(format!("Schema ({} columns)", info.schema.len()));
    Grid::new("schema_grid").striped(true).num_columns(3).show(ui, |ui| {
        for column in &info.schema {
            ui.monospace(column.index.to_string());
            ui.label(&column.name);
            ui.weak(&column.data_type);
            ui.end_row();
        }
    });

    if let Some(geo) = &info.geo {
        ui.separator();
        ui.strong("Geometry columns");
        key_value_grid(ui, "geo_grid", &geometry_summary(geo));
    }

    let other: Vec<(String, String)> = info
        .key_value
        .iter()
        .filter(|(key, _)| key != gv_core::schema::GEO_METADATA_KEY)
        .cloned()
        .collect();
    if !other.is_empty() {
        ui.separator();
        ui.strong("Key/value metadata");
        key_value_grid(ui, "kv_grid", &other);
    }
}

fn key_value_grid(ui: &mut egui::Ui, id: &str, rows: &[(String, String)]) {
    Grid::new(id).striped(true).num_columns(2).show(ui, |ui| {
        for (key, value) in rows {
            ui.label(key);
            ui.label(value);
            ui.end_row();
        }
    });
}

/// Labelled facts about a file for the metadata dialog
pub fn file_summary(info: &FileInfo) -> Vec<(String, String)> {
    let mut rows = vec![
        ("URL".to_owned(), info.url.clone()),
        ("Size".to_owned(), format!("{} bytes", info.byte_length)),
        ("Rows".to_owned(), info.total_rows.to_string()),
        ("Row groups".to_owned(), info.row_groups.to_string()),
    ];
    if let Some(created_by) = &info.created_by {
        rows.push(("Created by".to_owned(), created_by.clone()));
    }
    rows
}

/// One line per geometry column: encoding, types and CRS
pub fn geometry_summary(geo: &GeoMetadata) -> Vec<(String, String)> {
    geo.ordered_columns()
        .into_iter()
        .map(|name| {
            let column = &geo.columns[name];
            let crs = column
                .crs_code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_owned());
            let types = if column.geometry_types.is_empty() {
                "any".to_owned()
            } else {
                column.geometry_types.join(", ")
            };
            let label = if name == geo.primary_column {
                format!("{name} (primary)")
            } else {
                name.to_owned()
            };
            (label, format!("{} | {types} | {crs}", column.encoding))
        })
        .collect()
}

fn input_id(id: ModalId) -> Id {
    Id::new(("load_url", id))
}

fn load_input(ctx: &Context, id: ModalId, initial: &str) -> String {
    ctx.data_mut(|d| d.get_temp::<String>(input_id(id)))
        .unwrap_or_else(|| initial.to_owned())
}

fn store_input(ctx: &Context, id: ModalId, text: String) {
    ctx.data_mut(|d| d.insert_temp(input_id(id), text));
}

fn forget_input(ctx: &Context, id: ModalId) {
    ctx.data_mut(|d| d.remove::<String>(input_id(id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialog_actions_become_commands_for_their_dialog() {
        let mut stack = gv_core::ModalStack::new();
        stack.show(Modal::Load { url: String::new() });
        let descriptor = stack.iter().next().unwrap().clone();

        let command = dialog_command(&descriptor, ModalAction::SubmitUrl("http://host/a.parquet".to_owned()));
        assert_eq!(
            command,
            AppCommand::ModalAction {
                id: descriptor.id,
                action: ModalAction::SubmitUrl("http://host/a.parquet".to_owned()),
            }
        );
    }

    #[test]
    fn geometry_summary_lists_primary_first() {
        let geo = GeoMetadata::from_json(
            r#"{"primary_column": "geom", "columns": {
                "a_bounds": {"encoding": "WKB", "crs": "EPSG:3857"},
                "geom": {"encoding": "WKB", "geometry_types": ["Point"]}
            }}"#,
        )
        .unwrap();
        let rows = geometry_summary(&geo);
        assert_eq!(rows[0].0, "geom (primary)");
        assert_eq!(rows[0].1, "WKB | Point | OGC:CRS84");
        assert_eq!(rows[1].1, "WKB | any | EPSG:3857");
    }

    #[test]
    fn file_summary_skips_missing_writer() {
        let info = FileInfo {
            url: "https://host/a.parquet".into(),
            byte_length: 2048,
            total_rows: 10,
            row_groups: 1,
            created_by: None,
            schema: vec![],
            key_value: vec![],
            geo: None,
        };
        let rows = file_summary(&info);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].1, "2048 bytes");
    }
}
