//! Table and map views of the loaded GeoParquet rows

mod map_view;
mod space_view;
mod table_view;

pub use map_view::{MapConfig, MapShapes, MapView, PickIndex};
pub use space_view::{SpaceView, SpaceViewId};
pub use table_view::{TableConfig, TableView};
