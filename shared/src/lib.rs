pub mod colors;
pub mod filter;
pub mod map;
pub mod measure;
pub mod site;
pub mod view;

pub use colors::{ColorTags, MarkerColor};
pub use filter::{FilterOutcome, FilterPolicy, FilterSelection, StageSelection, apply_filters};
pub use map::{DEFAULT_ZOOM, FALLBACK_CENTER, LatLng, MapView, Marker};
pub use measure::{MeasureError, Measurement, Shape, measure};
pub use site::{CellValue, SheetLayout, SiteRecord, SiteTable};
pub use view::{DashboardView, render};
