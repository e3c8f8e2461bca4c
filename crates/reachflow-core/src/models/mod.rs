//! Data models for reaches, forecasts and favorites.
//!
//! - `ReachInfo`, `Coordinates`, `ReturnPeriods`, `CachedReach`: reach metadata
//! - `ReachSnapshot` and its series types: progressively loaded forecast data
//! - `FlowUnit`, `FlowValue`: flow amounts that always carry their unit
//! - `Favorite`, `FavoriteEnrichment`, `FavoriteView`: persisted favorites and
//!   the session-only data shown alongside them

pub mod favorite;
pub mod forecast;
pub mod reach;

pub use favorite::{
    CustomFieldsUpdate, Favorite, FavoriteEnrichment, FavoriteView, FavoritesDiff, FieldUpdate,
    FlowReading, KnownReachFields,
};
pub use forecast::{
    FlowPoint, FlowUnit, FlowValue, ForecastCategory, ForecastSeries, ForecastSummary,
    LoadingPhase, ReachSnapshot, CFS_PER_CMS, MEAN_TRACE,
};
pub use reach::{CachedReach, Coordinates, ReachInfo, ReturnPeriods};
