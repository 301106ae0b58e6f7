//! Window chrome for the GeoParquet viewer
//!
//! Menu bar, status bar and dialogs. Every widget reports user input as
//! [`gv_core::AppCommand`]s; nothing here mutates application state.

pub mod modals;
pub mod shell;
pub mod theme;

pub use modals::show_modals;
pub use shell::{menu_bar, status_bar, ShellConfig};
pub use theme::{apply_theme, Theme};

// Common icon definitions
pub mod icons {
    pub const FOLDER: &str = "📁";
    pub const RELOAD: &str = "🔄";
    pub const INFO: &str = "ℹ";
    pub const CLOSE: &str = "✖";
}
