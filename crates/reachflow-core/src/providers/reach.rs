//! Progressive forecast loading for the displayed reach.
//!
//! The `ReachDataProvider` owns one reach's [`ReachSnapshot`] and improves it
//! in phases: a fast overview first, then forecast categories and
//! supplementary data merged in as they arrive. Derived values (current flow,
//! flow category, location, available forecast types) are memoized per reach
//! and variant.
//!
//! Every load captures the selection generation when it starts. If the user
//! has moved on to another reach by the time the response arrives, the
//! response is dropped and the load reports [`ReachflowError::Superseded`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, MemoTable, UnitSensitivity};
use crate::error::{ReachflowError, Result, OVERVIEW};
use crate::lock;
use crate::models::{FlowUnit, FlowValue, ForecastCategory, LoadingPhase, ReachSnapshot};
use crate::notify::ChangeNotifier;
use crate::services::{ForecastCalculator, ForecastService, UnitPreference};
use crate::units::UnitSensitive;

/// `what` for supplementary loads in error messages.
const SUPPLEMENTARY: &str = "supplementary data";

fn category_what(category: ForecastCategory) -> &'static str {
    match category {
        ForecastCategory::Hourly => "hourly forecast",
        ForecastCategory::Medium => "medium forecast",
        ForecastCategory::Extended => "extended forecast",
    }
}

// ============================================================================
// State
// ============================================================================

struct ReachState {
    reach_id: Option<String>,
    snapshot: Option<ReachSnapshot>,
    phase: LoadingPhase,
    error: Option<ReachflowError>,
    /// Advanced whenever the displayed reach changes or is cleared.
    generation: u64,

    overview_loading: bool,
    supplementary_loading: bool,
    category_loading: HashSet<ForecastCategory>,

    /// Snapshots loaded earlier this session, by reach id.
    session: HashMap<String, ReachSnapshot>,

    current_flow: MemoTable<Option<FlowValue>>,
    flow_category: MemoTable<Option<String>>,
    location: MemoTable<Option<String>>,
    forecast_types: MemoTable<Vec<ForecastCategory>>,
}

impl ReachState {
    fn new() -> Self {
        Self {
            reach_id: None,
            snapshot: None,
            phase: LoadingPhase::None,
            error: None,
            generation: 0,
            overview_loading: false,
            supplementary_loading: false,
            category_loading: HashSet::new(),
            session: HashMap::new(),
            current_flow: MemoTable::new("current_flow", UnitSensitivity::Sensitive),
            flow_category: MemoTable::new("flow_category", UnitSensitivity::Sensitive),
            location: MemoTable::new("location", UnitSensitivity::Insensitive),
            forecast_types: MemoTable::new("forecast_types", UnitSensitivity::Insensitive),
        }
    }

    fn is_current(&self, reach_id: &str, generation: u64) -> bool {
        self.generation == generation && self.reach_id.as_deref() == Some(reach_id)
    }

    fn has_snapshot_for(&self, reach_id: &str) -> bool {
        self.reach_id.as_deref() == Some(reach_id) && self.snapshot.is_some()
    }

    /// The displayed snapshot if it is for `reach_id`, else the session copy.
    fn snapshot_for(&self, reach_id: &str) -> Option<&ReachSnapshot> {
        match (&self.reach_id, &self.snapshot) {
            (Some(id), Some(snapshot)) if id == reach_id => Some(snapshot),
            _ => self.session.get(reach_id),
        }
    }

    /// Forget the displayed reach and invalidate in-flight loads.
    fn reset_current(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.reach_id = None;
        self.snapshot = None;
        self.phase = LoadingPhase::None;
        self.error = None;
        self.overview_loading = false;
        self.supplementary_loading = false;
        self.category_loading.clear();
        self.current_flow.clear();
        self.flow_category.clear();
        self.location.clear();
        self.forecast_types.clear();
    }

    fn invalidate_reach(&mut self, reach_id: &str) {
        self.current_flow.remove_reach(reach_id);
        self.flow_category.remove_reach(reach_id);
        self.location.remove_reach(reach_id);
        self.forecast_types.remove_reach(reach_id);
    }

    /// Copy the displayed snapshot into the session cache.
    fn remember_snapshot(&mut self) {
        if let (Some(id), Some(snapshot)) = (&self.reach_id, &self.snapshot) {
            self.session.insert(id.clone(), snapshot.clone());
        }
    }

    fn current_flow(
        &mut self,
        calculator: &dyn ForecastCalculator,
        reach_id: &str,
        preferred: Option<ForecastCategory>,
        unit: FlowUnit,
    ) -> Option<FlowValue> {
        let key = CacheKey::new(reach_id).with_variant(preferred);
        match self.current_flow.get(&key) {
            // A value tagged with another unit can't be trusted
            Some(Some(cached)) if cached.unit != unit => {}
            Some(cached) => return cached,
            None => {}
        }

        let snapshot = self.snapshot_for(reach_id)?;
        let computed = calculator
            .current_flow(snapshot, unit, preferred)
            .map(|amount| FlowValue::new(amount, unit));
        self.current_flow.insert(key, computed);
        computed
    }

    fn flow_category(
        &mut self,
        calculator: &dyn ForecastCalculator,
        reach_id: &str,
        unit: FlowUnit,
    ) -> Option<String> {
        let key = CacheKey::new(reach_id);
        if let Some(cached) = self.flow_category.get(&key) {
            return cached;
        }

        let periods = self.snapshot_for(reach_id)?.reach.return_periods.clone();
        let category = self
            .current_flow(calculator, reach_id, None, unit)
            .and_then(|flow| calculator.flow_category(flow, periods.as_ref()));
        self.flow_category.insert(key, category.clone());
        category
    }

    fn formatted_location(
        &mut self,
        calculator: &dyn ForecastCalculator,
        reach_id: &str,
    ) -> Option<String> {
        let key = CacheKey::new(reach_id);
        if let Some(cached) = self.location.get(&key) {
            return cached;
        }

        let location = calculator.formatted_location(&self.snapshot_for(reach_id)?.reach);
        self.location.insert(key, location.clone());
        location
    }

    fn forecast_types(
        &mut self,
        calculator: &dyn ForecastCalculator,
        reach_id: &str,
    ) -> Vec<ForecastCategory> {
        let key = CacheKey::new(reach_id);
        if let Some(cached) = self.forecast_types.get(&key) {
            return cached;
        }

        let Some(snapshot) = self.snapshot_for(reach_id) else {
            return Vec::new();
        };
        let types = calculator.available_forecast_types(snapshot);
        self.forecast_types.insert(key, types.clone());
        types
    }

    /// Drop and recompute the default derived values for `reach_id`.
    fn prime(&mut self, calculator: &dyn ForecastCalculator, reach_id: &str, unit: FlowUnit) {
        self.invalidate_reach(reach_id);
        self.current_flow(calculator, reach_id, None, unit);
        self.flow_category(calculator, reach_id, unit);
        self.formatted_location(calculator, reach_id);
        self.forecast_types(calculator, reach_id);
    }
}

// ============================================================================
// Provider
// ============================================================================

pub struct ReachDataProvider {
    forecasts: Arc<dyn ForecastService>,
    calculator: Arc<dyn ForecastCalculator>,
    units: Arc<dyn UnitPreference>,
    state: Mutex<ReachState>,
    notifier: ChangeNotifier,
}

impl ReachDataProvider {
    pub fn new(
        forecasts: Arc<dyn ForecastService>,
        calculator: Arc<dyn ForecastCalculator>,
        units: Arc<dyn UnitPreference>,
    ) -> Self {
        Self {
            forecasts,
            calculator,
            units,
            state: Mutex::new(ReachState::new()),
            notifier: ChangeNotifier::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReachState> {
        lock(&self.state)
    }

    /// Make `reach_id` the displayed reach, resetting state if it changed.
    /// Returns the generation loads for it should capture.
    fn select(&self, reach_id: &str) -> u64 {
        let mut state = self.state();
        if state.reach_id.as_deref() != Some(reach_id) {
            debug!(reach_id, previous = ?state.reach_id, "Switching displayed reach");
            state.reset_current();
            state.reach_id = Some(reach_id.to_string());
        }
        state.generation
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Show `reach_id` as quickly as possible.
    ///
    /// A snapshot cached earlier this session is adopted as-is. Otherwise the
    /// overview (identity and current flow) is fetched. Failure is terminal
    /// for this call: the phase drops to `None` and the error is surfaced.
    pub async fn load_overview(&self, reach_id: &str) -> Result<()> {
        let generation = self.select(reach_id);
        let unit = self.units.current_unit();

        {
            let mut state = self.state();
            let cached = state.session.get(reach_id).cloned();
            if let Some(cached) = cached {
                debug!(reach_id, "Adopting session-cached snapshot");
                state.snapshot = Some(cached);
                state.phase = LoadingPhase::Complete;
                state.error = None;
                state.prime(self.calculator.as_ref(), reach_id, unit);
                drop(state);
                self.notifier.notify();
                return Ok(());
            }
            state.overview_loading = true;
            state.error = None;
        }
        self.notifier.notify();

        let result = self.forecasts.fetch_overview(reach_id).await;

        let mut state = self.state();
        if !state.is_current(reach_id, generation) {
            debug!(reach_id, "Discarding overview for superseded reach");
            return Err(ReachflowError::Superseded(reach_id.to_string()));
        }
        state.overview_loading = false;

        let outcome = match result {
            Ok(mut overview) => {
                overview.reach.reach_id = reach_id.to_string();
                match state.snapshot.as_mut() {
                    Some(existing) => {
                        existing.merge(overview);
                    }
                    None => state.snapshot = Some(overview),
                }
                state.phase = LoadingPhase::Overview;
                state.remember_snapshot();
                // The overview reflects the unit active now
                let unit = self.units.current_unit();
                state.prime(self.calculator.as_ref(), reach_id, unit);
                info!(reach_id, "Overview loaded");
                Ok(())
            }
            Err(e) => {
                let err = ReachflowError::fetch(OVERVIEW, reach_id, &e);
                error!(reach_id, error = %err, "Overview load failed");
                state.snapshot = None;
                state.phase = LoadingPhase::None;
                state.category_loading.clear();
                state.supplementary_loading = false;
                state.invalidate_reach(reach_id);
                state.error = Some(err.clone());
                Err(err)
            }
        };
        drop(state);
        self.notifier.notify();
        outcome
    }

    /// Load the overview first if nothing is shown for `reach_id` yet.
    async fn ensure_overview(&self, reach_id: &str) -> Result<()> {
        if self.state().has_snapshot_for(reach_id) {
            return Ok(());
        }
        self.load_overview(reach_id).await
    }

    /// Load one forecast range and merge it into the snapshot.
    ///
    /// A missing or empty series never replaces one already loaded. Errors
    /// leave the snapshot and phase as they were.
    pub async fn load_category(&self, reach_id: &str, category: ForecastCategory) -> Result<()> {
        if let Err(e) = self.ensure_overview(reach_id).await {
            warn!(reach_id, %category, error = %e, "Skipping category, overview unavailable");
            return Err(e);
        }

        let generation = {
            let mut state = self.state();
            state.category_loading.insert(category);
            state.generation
        };
        self.notifier.notify();

        let result = self.forecasts.fetch_category(reach_id, category).await;

        let mut state = self.state();
        if !state.is_current(reach_id, generation) {
            debug!(reach_id, %category, "Discarding category for superseded reach");
            return Err(ReachflowError::Superseded(reach_id.to_string()));
        }
        state.category_loading.remove(&category);

        let outcome = match result {
            Ok(series) => {
                let changed = state
                    .snapshot
                    .as_mut()
                    .is_some_and(|snapshot| snapshot.merge_series(category, series));
                if state.phase != LoadingPhase::Complete {
                    state.phase = LoadingPhase::Specific;
                }
                if changed {
                    state.remember_snapshot();
                    let unit = self.units.current_unit();
                    state.prime(self.calculator.as_ref(), reach_id, unit);
                } else {
                    debug!(reach_id, %category, "No new series, keeping existing data");
                }
                Ok(())
            }
            Err(e) => {
                let err = ReachflowError::fetch(category_what(category), reach_id, &e);
                warn!(reach_id, %category, error = %err, "Category load failed");
                Err(err)
            }
        };
        drop(state);
        self.notifier.notify();
        outcome
    }

    /// Add return periods and forecast summaries to the snapshot.
    ///
    /// This data is optional: failure never clears overview data and never
    /// moves the phase backwards.
    pub async fn load_supplementary_data(&self, reach_id: &str) -> Result<()> {
        self.ensure_overview(reach_id).await?;

        let (generation, existing) = {
            let mut state = self.state();
            let existing = state.snapshot.clone();
            if existing.is_some() {
                state.supplementary_loading = true;
            }
            (state.generation, existing)
        };
        let Some(existing) = existing else {
            return Err(ReachflowError::Superseded(reach_id.to_string()));
        };
        self.notifier.notify();

        let result = self.forecasts.fetch_supplementary(reach_id, &existing).await;

        let mut state = self.state();
        if !state.is_current(reach_id, generation) {
            debug!(reach_id, "Discarding supplementary data for superseded reach");
            return Err(ReachflowError::Superseded(reach_id.to_string()));
        }
        state.supplementary_loading = false;

        let outcome = match result {
            Ok(enriched) => {
                let changed = state
                    .snapshot
                    .as_mut()
                    .is_some_and(|snapshot| snapshot.merge(enriched));
                if matches!(state.phase, LoadingPhase::None | LoadingPhase::Overview) {
                    state.phase = LoadingPhase::Supplementary;
                }
                if changed {
                    state.remember_snapshot();
                    let unit = self.units.current_unit();
                    state.prime(self.calculator.as_ref(), reach_id, unit);
                }
                Ok(())
            }
            Err(e) => {
                let err = ReachflowError::fetch(SUPPLEMENTARY, reach_id, &e);
                warn!(reach_id, error = %err, "Supplementary load failed, keeping overview");
                Err(err)
            }
        };
        drop(state);
        self.notifier.notify();
        outcome
    }

    /// Reload everything for `reach_id` from the network.
    ///
    /// Steps run one after another so each merge sees the previous one. An
    /// overview failure aborts; later failures are logged and skipped.
    pub async fn comprehensive_refresh(&self, reach_id: &str) -> Result<()> {
        info!(reach_id, "Starting comprehensive refresh");
        {
            let mut state = self.state();
            state.session.remove(reach_id);
            state.invalidate_reach(reach_id);
        }

        self.load_overview(reach_id).await?;
        let generation = self.state().generation;

        for category in ForecastCategory::ALL {
            match self.load_category(reach_id, category).await {
                Err(e @ ReachflowError::Superseded(_)) => return Err(e),
                Err(e) => debug!(reach_id, %category, error = %e, "Continuing refresh"),
                Ok(()) => {}
            }
        }
        match self.load_supplementary_data(reach_id).await {
            Err(e @ ReachflowError::Superseded(_)) => return Err(e),
            Err(e) => debug!(reach_id, error = %e, "Continuing refresh"),
            Ok(()) => {}
        }

        {
            let mut state = self.state();
            if !state.is_current(reach_id, generation) || state.snapshot.is_none() {
                return Err(ReachflowError::Superseded(reach_id.to_string()));
            }
            state.phase = LoadingPhase::Complete;
            state.remember_snapshot();
        }
        self.notifier.notify();
        info!(reach_id, "Comprehensive refresh complete");
        Ok(())
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    /// Current flow in the active unit, optionally from a preferred series.
    pub fn current_flow(
        &self,
        reach_id: &str,
        preferred: Option<ForecastCategory>,
    ) -> Option<FlowValue> {
        let unit = self.units.current_unit();
        self.state()
            .current_flow(self.calculator.as_ref(), reach_id, preferred, unit)
    }

    pub fn flow_category(&self, reach_id: &str) -> Option<String> {
        let unit = self.units.current_unit();
        self.state()
            .flow_category(self.calculator.as_ref(), reach_id, unit)
    }

    pub fn formatted_location(&self, reach_id: &str) -> Option<String> {
        self.state()
            .formatted_location(self.calculator.as_ref(), reach_id)
    }

    pub fn available_forecast_types(&self, reach_id: &str) -> Vec<ForecastCategory> {
        self.state().forecast_types(self.calculator.as_ref(), reach_id)
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Drop flow-dependent memos and the session snapshots (their flows were
    /// read under the old unit), keep location and phase, and recompute the
    /// displayed reach's values in the new unit.
    pub fn clear_unit_dependent_caches(&self) {
        let unit = self.units.current_unit();
        {
            let mut state = self.state();
            let cleared = [
                state.current_flow.clear_if_unit_sensitive(),
                state.flow_category.clear_if_unit_sensitive(),
                state.location.clear_if_unit_sensitive(),
                state.forecast_types.clear_if_unit_sensitive(),
            ]
            .iter()
            .filter(|c| **c)
            .count();
            state.session.clear();

            if let Some(reach_id) = state.reach_id.clone() {
                if state.snapshot.is_some() {
                    state.remember_snapshot();
                    state.current_flow(self.calculator.as_ref(), &reach_id, None, unit);
                    state.flow_category(self.calculator.as_ref(), &reach_id, unit);
                }
            }
            debug!(%unit, tables = cleared, "Cleared unit-dependent reach caches");
        }
        self.notifier.notify();
    }

    /// Stop showing the current reach. Session snapshots are kept so coming
    /// back is instant.
    pub fn clear_current_reach(&self) {
        self.state().reset_current();
        self.notifier.notify();
    }

    /// Full reset, including the session snapshot cache.
    pub fn clear(&self) {
        {
            let mut state = self.state();
            state.reset_current();
            state.session.clear();
        }
        self.notifier.notify();
    }

    // =========================================================================
    // Read-only state
    // =========================================================================

    pub fn snapshot(&self) -> Option<ReachSnapshot> {
        self.state().snapshot.clone()
    }

    pub fn cached_snapshot(&self, reach_id: &str) -> Option<ReachSnapshot> {
        self.state().session.get(reach_id).cloned()
    }

    pub fn current_reach_id(&self) -> Option<String> {
        self.state().reach_id.clone()
    }

    pub fn phase(&self) -> LoadingPhase {
        self.state().phase
    }

    pub fn error(&self) -> Option<ReachflowError> {
        self.state().error.clone()
    }

    pub fn is_overview_loading(&self) -> bool {
        self.state().overview_loading
    }

    pub fn is_category_loading(&self, category: ForecastCategory) -> bool {
        self.state().category_loading.contains(&category)
    }

    pub fn is_supplementary_loading(&self) -> bool {
        self.state().supplementary_loading
    }

    pub fn is_loading(&self) -> bool {
        let state = self.state();
        state.overview_loading || state.supplementary_loading || !state.category_loading.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notifier.subscribe()
    }
}

impl UnitSensitive for ReachDataProvider {
    fn clear_unit_dependent_caches(&self) {
        ReachDataProvider::clear_unit_dependent_caches(self);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ForecastSummary, ReachInfo, ReturnPeriods};
    use crate::testing::{overview, series, FakeCalculator, FakeForecastService};
    use crate::units::UnitSettings;

    struct Fixture {
        forecasts: Arc<FakeForecastService>,
        calculator: Arc<FakeCalculator>,
        units: Arc<UnitSettings>,
        provider: Arc<ReachDataProvider>,
    }

    fn fixture() -> Fixture {
        let forecasts = FakeForecastService::new();
        forecasts.set_overview(overview("123", "Deschutes River", 10.0));
        forecasts.set_overview(overview("456", "Rogue River", 40.0));
        let calculator = FakeCalculator::new();
        let units = Arc::new(UnitSettings::new(FlowUnit::Cms));
        let provider = Arc::new(ReachDataProvider::new(
            forecasts.clone(),
            calculator.clone(),
            units.clone(),
        ));
        units.register(&provider);
        Fixture {
            forecasts,
            calculator,
            units,
            provider,
        }
    }

    #[tokio::test]
    async fn test_load_overview_sets_phase_and_derived_values() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();

        assert_eq!(f.provider.phase(), LoadingPhase::Overview);
        assert_eq!(f.provider.current_reach_id().as_deref(), Some("123"));
        assert_eq!(
            f.provider.current_flow("123", None),
            Some(FlowValue::new(10.0, FlowUnit::Cms))
        );
        assert_eq!(f.provider.formatted_location("123").as_deref(), Some("Bend, OR"));
        assert!(f.provider.available_forecast_types("123").is_empty());
        assert!(!f.provider.is_loading());
    }

    #[tokio::test]
    async fn test_load_overview_adopts_session_cache() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();
        f.provider.load_overview("456").await.unwrap();
        f.provider.load_overview("123").await.unwrap();

        assert_eq!(f.forecasts.call_count("overview:123"), 1);
        assert_eq!(f.provider.phase(), LoadingPhase::Complete);
        assert_eq!(
            f.provider.snapshot().unwrap().reach.name.as_deref(),
            Some("Deschutes River")
        );
    }

    #[tokio::test]
    async fn test_load_overview_failure_is_terminal() {
        let f = fixture();
        f.forecasts.fail("overview:123");

        let err = f.provider.load_overview("123").await.unwrap_err();
        assert!(err.is_terminal());
        assert_eq!(f.provider.phase(), LoadingPhase::None);
        assert!(f.provider.snapshot().is_none());
        assert_eq!(f.provider.error(), Some(err));
        assert!(!f.provider.is_overview_loading());
    }

    #[tokio::test]
    async fn test_load_category_without_snapshot_loads_overview_first() {
        let f = fixture();
        f.forecasts
            .set_category("123", ForecastCategory::Hourly, series(&[11.0, 12.0]));

        f.provider
            .load_category("123", ForecastCategory::Hourly)
            .await
            .unwrap();

        assert_eq!(f.forecasts.calls(), vec!["overview:123", "hourly:123"]);
        let snapshot = f.provider.snapshot().unwrap();
        assert_eq!(snapshot.reach.name.as_deref(), Some("Deschutes River"));
        assert_eq!(snapshot.loaded_categories(), vec![ForecastCategory::Hourly]);
        assert_eq!(f.provider.phase(), LoadingPhase::Specific);
        assert_eq!(
            f.provider.available_forecast_types("123"),
            vec![ForecastCategory::Hourly]
        );
    }

    #[tokio::test]
    async fn test_load_category_aborts_when_overview_fails() {
        let f = fixture();
        f.forecasts.fail("overview:123");

        assert!(f
            .provider
            .load_category("123", ForecastCategory::Medium)
            .await
            .is_err());
        assert_eq!(f.forecasts.call_count("medium:123"), 0);
        assert!(!f.provider.is_category_loading(ForecastCategory::Medium));
    }

    #[tokio::test]
    async fn test_empty_category_keeps_existing_series() {
        let f = fixture();
        f.forecasts
            .set_category("123", ForecastCategory::Hourly, series(&[11.0]));
        f.provider
            .load_category("123", ForecastCategory::Hourly)
            .await
            .unwrap();
        let before = f.provider.snapshot().unwrap();

        // Upstream now returns an empty hourly series
        f.forecasts.set_category(
            "123",
            ForecastCategory::Hourly,
            crate::models::ForecastSeries::new(FlowUnit::Cms),
        );
        f.provider
            .load_category("123", ForecastCategory::Hourly)
            .await
            .unwrap();

        assert_eq!(f.provider.snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_category_failure_keeps_data() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();
        f.forecasts.fail("extended:123");

        let err = f
            .provider
            .load_category("123", ForecastCategory::Extended)
            .await
            .unwrap_err();
        assert!(!err.is_terminal());
        assert!(f.provider.snapshot().is_some());
        assert!(f.provider.error().is_none());
        assert!(!f.provider.is_category_loading(ForecastCategory::Extended));

        f.forecasts.recover("extended:123");
        f.forecasts
            .set_category("123", ForecastCategory::Extended, series(&[5.0]));
        f.provider
            .load_category("123", ForecastCategory::Extended)
            .await
            .unwrap();
        assert!(f.provider.snapshot().unwrap().has_series(ForecastCategory::Extended));
    }

    #[tokio::test]
    async fn test_supplementary_failure_never_regresses() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();
        f.forecasts.fail("supplementary:123");

        assert!(f.provider.load_supplementary_data("123").await.is_err());
        assert_eq!(f.provider.phase(), LoadingPhase::Overview);
        assert!(f.provider.snapshot().is_some());
        assert!(!f.provider.is_supplementary_loading());
    }

    #[tokio::test]
    async fn test_supplementary_adds_return_periods_and_category() {
        let f = fixture();
        let mut extra = crate::models::ReachSnapshot::new(ReachInfo {
            return_periods: Some(ReturnPeriods::new([(2, 8.0), (10, 30.0)])),
            ..ReachInfo::new("123")
        });
        extra.summaries.push(ForecastSummary {
            category: ForecastCategory::Medium,
            peak_flow: FlowValue::new(14.0, FlowUnit::Cms),
            peak_time: chrono::Utc::now(),
        });
        f.forecasts.set_supplementary(extra);

        f.provider.load_overview("123").await.unwrap();
        assert_eq!(f.provider.flow_category("123"), None);

        f.provider.load_supplementary_data("123").await.unwrap();
        assert_eq!(f.provider.phase(), LoadingPhase::Supplementary);
        assert_eq!(f.provider.flow_category("123").as_deref(), Some("high"));
        assert_eq!(f.provider.snapshot().unwrap().summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_comprehensive_refresh_runs_steps_in_order() {
        let f = fixture();
        f.forecasts
            .set_category("123", ForecastCategory::Hourly, series(&[1.0]));
        f.forecasts
            .set_category("123", ForecastCategory::Extended, series(&[3.0]));
        f.forecasts.fail("medium:123");

        f.provider.comprehensive_refresh("123").await.unwrap();

        assert_eq!(
            f.forecasts.calls(),
            vec![
                "overview:123",
                "hourly:123",
                "medium:123",
                "extended:123",
                "supplementary:123"
            ]
        );
        assert_eq!(f.provider.phase(), LoadingPhase::Complete);
        assert_eq!(
            f.provider.snapshot().unwrap().loaded_categories(),
            vec![ForecastCategory::Hourly, ForecastCategory::Extended]
        );
    }

    #[tokio::test]
    async fn test_comprehensive_refresh_overview_failure() {
        let f = fixture();
        f.forecasts.fail("overview:123");

        assert!(f.provider.comprehensive_refresh("123").await.is_err());
        assert_eq!(f.provider.phase(), LoadingPhase::None);
        for category in ForecastCategory::ALL {
            assert!(!f.provider.is_category_loading(category));
        }
        assert_eq!(f.forecasts.calls(), vec!["overview:123"]);
    }

    #[tokio::test]
    async fn test_comprehensive_refresh_bypasses_session_cache() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();
        f.provider.comprehensive_refresh("123").await.unwrap();
        assert_eq!(f.forecasts.call_count("overview:123"), 2);
    }

    #[tokio::test]
    async fn test_superseded_overview_is_discarded() {
        let f = fixture();
        let release = f.forecasts.hold("overview:123");

        let slow = {
            let provider = Arc::clone(&f.provider);
            tokio::spawn(async move { provider.load_overview("123").await })
        };
        while f.forecasts.call_count("overview:123") == 0 {
            tokio::task::yield_now().await;
        }

        f.provider.load_overview("456").await.unwrap();
        release.notify_one();

        let result = slow.await.unwrap();
        assert_eq!(result, Err(ReachflowError::Superseded("123".to_string())));
        assert_eq!(f.provider.current_reach_id().as_deref(), Some("456"));
        assert_eq!(
            f.provider.snapshot().unwrap().reach.name.as_deref(),
            Some("Rogue River")
        );
    }

    #[tokio::test]
    async fn test_category_spinners_are_independent() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();
        for (category, flow) in [
            (ForecastCategory::Hourly, 11.0),
            (ForecastCategory::Medium, 12.0),
            (ForecastCategory::Extended, 13.0),
        ] {
            f.forecasts.set_category("123", category, series(&[flow]));
        }
        let hourly = f.forecasts.hold("hourly:123");
        let medium = f.forecasts.hold("medium:123");
        let extended = f.forecasts.hold("extended:123");

        let loads: Vec<_> = ForecastCategory::ALL
            .into_iter()
            .map(|category| {
                let provider = Arc::clone(&f.provider);
                tokio::spawn(async move { provider.load_category("123", category).await })
            })
            .collect();
        while ["hourly:123", "medium:123", "extended:123"]
            .iter()
            .any(|call| f.forecasts.call_count(call) == 0)
        {
            tokio::task::yield_now().await;
        }
        for category in ForecastCategory::ALL {
            assert!(f.provider.is_category_loading(category));
        }

        medium.notify_one();
        while f.provider.is_category_loading(ForecastCategory::Medium) {
            tokio::task::yield_now().await;
        }
        assert!(f.provider.is_category_loading(ForecastCategory::Hourly));
        assert!(f.provider.is_category_loading(ForecastCategory::Extended));
        assert!(f.provider.is_loading());

        hourly.notify_one();
        extended.notify_one();
        for load in loads {
            load.await.unwrap().unwrap();
        }
        for category in ForecastCategory::ALL {
            assert!(!f.provider.is_category_loading(category));
        }
        assert!(!f.provider.is_loading());
        assert_eq!(
            f.provider.snapshot().unwrap().loaded_categories(),
            ForecastCategory::ALL.to_vec()
        );
    }

    #[tokio::test]
    async fn test_superseded_category_is_discarded() {
        let f = fixture();
        f.forecasts
            .set_category("123", ForecastCategory::Hourly, series(&[11.0]));
        f.provider.load_overview("123").await.unwrap();
        let release = f.forecasts.hold("hourly:123");

        let slow = {
            let provider = Arc::clone(&f.provider);
            tokio::spawn(async move {
                provider
                    .load_category("123", ForecastCategory::Hourly)
                    .await
            })
        };
        while f.forecasts.call_count("hourly:123") == 0 {
            tokio::task::yield_now().await;
        }

        f.provider.load_overview("456").await.unwrap();
        let shown = f.provider.snapshot().unwrap();
        release.notify_one();

        let result = slow.await.unwrap();
        assert_eq!(result, Err(ReachflowError::Superseded("123".to_string())));
        assert_eq!(f.provider.current_reach_id().as_deref(), Some("456"));
        assert_eq!(f.provider.snapshot().unwrap(), shown);
        assert_eq!(f.provider.phase(), LoadingPhase::Overview);
        assert!(!f.provider.is_category_loading(ForecastCategory::Hourly));
        let earlier = f.provider.cached_snapshot("123").unwrap();
        assert!(!earlier.has_series(ForecastCategory::Hourly));
    }

    #[tokio::test]
    async fn test_superseded_supplementary_is_discarded() {
        let f = fixture();
        f.forecasts.set_supplementary(crate::models::ReachSnapshot::new(ReachInfo {
            return_periods: Some(ReturnPeriods::new([(2, 8.0)])),
            ..ReachInfo::new("123")
        }));
        f.provider.load_overview("123").await.unwrap();
        let release = f.forecasts.hold("supplementary:123");

        let slow = {
            let provider = Arc::clone(&f.provider);
            tokio::spawn(async move { provider.load_supplementary_data("123").await })
        };
        while f.forecasts.call_count("supplementary:123") == 0 {
            tokio::task::yield_now().await;
        }
        assert!(f.provider.is_supplementary_loading());

        f.provider.load_overview("456").await.unwrap();
        let shown = f.provider.snapshot().unwrap();
        release.notify_one();

        let result = slow.await.unwrap();
        assert_eq!(result, Err(ReachflowError::Superseded("123".to_string())));
        assert_eq!(f.provider.snapshot().unwrap(), shown);
        assert_eq!(f.provider.phase(), LoadingPhase::Overview);
        assert!(!f.provider.is_supplementary_loading());
        assert!(f.provider.flow_category("123").is_none());
    }

    #[tokio::test]
    async fn test_memoized_flow_is_not_recomputed() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();
        let calls = f.calculator.flow_calls();

        f.provider.current_flow("123", None);
        f.provider.current_flow("123", None);
        assert_eq!(f.calculator.flow_calls(), calls);
    }

    #[tokio::test]
    async fn test_unit_change_recomputes_flow_in_new_unit() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();
        f.provider.load_overview("456").await.unwrap();
        let location = f.provider.formatted_location("456");

        f.units.set_unit(FlowUnit::Cfs);

        let flow = f.provider.current_flow("456", None).unwrap();
        assert_eq!(flow.unit, FlowUnit::Cfs);
        assert!((flow.amount - 40.0 * crate::models::CFS_PER_CMS).abs() < 1e-6);
        // Other reaches' session snapshots were measured under the old unit
        assert!(f.provider.cached_snapshot("123").is_none());
        assert_eq!(f.provider.formatted_location("456"), location);
        assert_eq!(f.provider.phase(), LoadingPhase::Overview);
    }

    #[tokio::test]
    async fn test_clear_current_reach_resets_view() {
        let f = fixture();
        f.provider.load_overview("123").await.unwrap();

        f.provider.clear_current_reach();
        assert!(f.provider.snapshot().is_none());
        assert_eq!(f.provider.phase(), LoadingPhase::None);
        assert!(f.provider.current_reach_id().is_none());
        // Session copy still answers derived lookups
        assert!(f.provider.cached_snapshot("123").is_some());

        f.provider.clear();
        assert!(f.provider.cached_snapshot("123").is_none());
        assert_eq!(f.provider.current_flow("123", None), None);
    }
}
