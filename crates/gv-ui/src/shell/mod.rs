use egui::{Context, TopBottomPanel};
use gv_core::{AppCommand, AppState, ModalKind};

use crate::icons;
use crate::theme::status_color;

/// Shell configuration
pub struct ShellConfig {
    pub show_menu_bar: bool,
    pub show_status_bar: bool,
    /// Upper bound of the page size control
    pub max_page_size: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            show_menu_bar: true,
            show_status_bar: true,
            max_page_size: 100_000,
        }
    }
}

/// Render the main menu bar
pub fn menu_bar(ctx: &Context, state: &AppState) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button(format!("{} Load URL...", icons::FOLDER)).clicked() {
                    commands.push(AppCommand::ShowModal(ModalKind::Load));
                    ui.close_menu();
                }

                if ui
                    .add_enabled(state.url().is_some(), egui::Button::new(format!("{} Reload", icons::RELOAD)))
                    .clicked()
                {
                    commands.push(AppCommand::Reload);
                    ui.close_menu();
                }

                ui.separator();

                if ui
                    .add_enabled(state.file().is_some(), egui::Button::new("File metadata..."))
                    .clicked()
                {
                    commands.push(AppCommand::ShowModal(ModalKind::Metadata));
                    ui.close_menu();
                }

                ui.separator();

                if ui.button("Exit").clicked() {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });

            ui.menu_button("Help", |ui| {
                if ui.button(format!("{} About", icons::INFO)).clicked() {
                    commands.push(AppCommand::ShowModal(ModalKind::About));
                    ui.close_menu();
                }
            });

            if let Some(url) = state.url() {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(url);
                });
            }
        });
    });
    commands
}

/// Render the bottom bar with load progress and paging controls
pub fn status_bar(ctx: &Context, state: &AppState, config: &ShellConfig) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if state.is_loading() {
                ui.spinner();
            }
            ui.label(row_summary(state));
            ui.separator();

            let mut page_size = state.pagination().page_size();
            ui.label("Page size:");
            let response = ui.add(
                egui::DragValue::new(&mut page_size)
                    .clamp_range(0..=config.max_page_size)
                    .speed(10.0),
            )
            .on_hover_text("Rows per page; 0 reads everything that is left");
            if response.changed() {
                commands.push(AppCommand::SetPageSize(page_size));
            }

            let enabled = can_load_more(state);
            if ui.add_enabled(enabled, egui::Button::new("Load more")).clicked() {
                commands.push(AppCommand::LoadMore);
            }
            if ui.add_enabled(enabled, egui::Button::new("Load all")).clicked() {
                commands.push(AppCommand::LoadAll);
            }

            if let Some(status) = state.status() {
                ui.separator();
                if ui.small_button(icons::CLOSE).on_hover_text("Dismiss").clicked() {
                    commands.push(AppCommand::ClearStatus);
                }
                ui.colored_label(status_color(status.level), &status.text);
            }
        });
    });
    commands
}

/// "loaded of total" text for the status bar
pub fn row_summary(state: &AppState) -> String {
    let loaded = state.dataset().row_count();
    match state.pagination().total_rows() {
        Some(total) => format!("{loaded} / {total} rows"),
        None if state.url().is_some() => format!("{loaded} rows"),
        None => "No file".to_owned(),
    }
}

/// Paging buttons are live once a file is open, nothing is in flight and
/// rows remain
pub fn can_load_more(state: &AppState) -> bool {
    state.url().is_some() && !state.is_loading() && !state.is_complete()
}
