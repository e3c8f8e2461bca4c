//! Contracts for the collaborators the providers depend on.
//!
//! The providers never construct these themselves; each one is passed in at
//! construction so apps can plug in their HTTP clients and storage, and tests
//! can plug in fakes. [`crate::cache::CacheManager`] implements the two
//! on-device contracts ([`LocalStore`], [`ReachCache`]).

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    CachedReach, Favorite, FlowUnit, FlowValue, ForecastCategory, ForecastSeries, ReachInfo,
    ReachSnapshot, ReturnPeriods,
};

/// Remote forecast data for a reach.
#[async_trait]
pub trait ForecastService: Send + Sync {
    /// Reach identity plus just enough data for the current flow.
    async fn fetch_overview(&self, reach_id: &str) -> Result<ReachSnapshot>;

    /// One forecast range. `None` or an empty series means nothing new.
    async fn fetch_category(
        &self,
        reach_id: &str,
        category: ForecastCategory,
    ) -> Result<Option<ForecastSeries>>;

    /// Return periods and forecast summaries layered on an existing snapshot.
    async fn fetch_supplementary(
        &self,
        reach_id: &str,
        existing: &ReachSnapshot,
    ) -> Result<ReachSnapshot>;
}

/// Pure computations over forecast data.
pub trait ForecastCalculator: Send + Sync {
    /// Current flow expressed in `unit`, optionally preferring one series.
    fn current_flow(
        &self,
        snapshot: &ReachSnapshot,
        unit: FlowUnit,
        preferred: Option<ForecastCategory>,
    ) -> Option<f64>;

    /// Severity label for a flow ("normal", "action", "flood", ...).
    fn flow_category(&self, flow: FlowValue, return_periods: Option<&ReturnPeriods>)
        -> Option<String>;

    /// Single-line location, "Bend, OR" or coordinates when no place is known.
    fn formatted_location(&self, reach: &ReachInfo) -> Option<String> {
        let place = match (&reach.city, &reach.state) {
            (Some(city), Some(state)) if !city.is_empty() && !state.is_empty() => {
                Some(format!("{}, {}", city, state))
            }
            (Some(city), _) if !city.is_empty() => Some(city.clone()),
            (_, Some(state)) if !state.is_empty() => Some(state.clone()),
            _ => None,
        };
        place.or_else(|| reach.coordinates.map(|c| c.formatted()))
    }

    fn available_forecast_types(&self, snapshot: &ReachSnapshot) -> Vec<ForecastCategory> {
        snapshot.loaded_categories()
    }
}

/// Return-period thresholds from the upstream API.
#[async_trait]
pub trait ReturnPeriodService: Send + Sync {
    async fn fetch_return_periods(&self, reach_id: &str) -> Result<ReturnPeriods>;
}

/// The canonical, cloud-synced favorites list.
///
/// The boolean results report whether the store accepted the change.
#[async_trait]
pub trait FavoritesStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Favorite>>;
    async fn add(&self, reach_id: &str) -> Result<bool>;
    async fn remove(&self, reach_id: &str) -> Result<bool>;
    async fn reorder(&self, favorites: &[Favorite]) -> Result<bool>;
}

/// On-device string key-value storage.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// On-device reach metadata, used to reuse return periods.
pub trait ReachCache: Send + Sync {
    fn get(&self, reach_id: &str) -> Result<Option<CachedReach>>;
    /// Merge `reach` into any existing record.
    fn store(&self, reach: &CachedReach) -> Result<()>;
}

/// The user's active flow unit, read at the moment a flow is cached.
pub trait UnitPreference: Send + Sync {
    fn current_unit(&self) -> FlowUnit;
}
