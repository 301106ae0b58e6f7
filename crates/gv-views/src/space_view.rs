//! Base trait for the panes of the viewer

use egui::Ui;
use gv_core::{AppCommand, AppState, Effect};
use uuid::Uuid;

/// Unique identifier for a space view
pub type SpaceViewId = Uuid;

/// A pane that draws part of the application state and reports user input
/// as commands
pub trait SpaceView {
    fn id(&self) -> SpaceViewId;

    fn display_name(&self) -> &str;

    /// Draw the view; returned commands are dispatched by the app
    fn ui(&mut self, state: &AppState, ui: &mut Ui) -> Vec<AppCommand>;

    /// React to a view effect (fit, clear, scroll)
    fn on_effect(&mut self, _effect: &Effect) {}
}
