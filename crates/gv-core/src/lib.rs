//! Core state for the GeoParquet viewer
//!
//! This crate holds everything that does not touch the network or the
//! screen: file metadata, the accumulated rows, paging, the map's feature
//! source, table/map selection and the dialog stack, all driven through
//! [`AppState`].

pub mod dataset;
pub mod events;
pub mod features;
pub mod modal;
pub mod pagination;
pub mod schema;
pub mod state;
pub mod sync;

// Re-export commonly used types
pub use dataset::Dataset;
pub use events::{LoadErrorKind, LoadEvent, Page, SessionId};
pub use features::{Extent, Feature, FeatureId, FeatureSource, FeatureStyle, FitOptions};
pub use modal::{Modal, ModalAction, ModalDescriptor, ModalId, ModalKind, ModalStack};
pub use pagination::{CompletionRule, PageOutcome, PageRequest, Pagination};
pub use schema::{CrsCode, CrsField, FileInfo, GeoColumn, GeoMetadata, SchemaColumn};
pub use state::{AppCommand, AppState, Effect, LoadPhase, LoadSettings, Status, StatusLevel};
pub use sync::{FeatureIndex, SelectionSync};
