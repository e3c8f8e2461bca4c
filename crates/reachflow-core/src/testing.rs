//! In-memory collaborators for provider tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::lock;
use crate::models::{
    CachedReach, Coordinates, Favorite, FlowPoint, FlowUnit, FlowValue, ForecastCategory,
    ForecastSeries, ReachInfo, ReachSnapshot, ReturnPeriods, MEAN_TRACE,
};
use crate::services::{
    FavoritesStore, ForecastCalculator, ForecastService, LocalStore, ReachCache,
    ReturnPeriodService,
};

pub fn series(flows: &[f64]) -> ForecastSeries {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let points = flows
        .iter()
        .enumerate()
        .map(|(i, f)| FlowPoint::new(start + chrono::Duration::hours(i as i64), *f))
        .collect();
    ForecastSeries::new(FlowUnit::Cms).with_trace(MEAN_TRACE, points)
}

/// Overview payload: reach metadata plus an analysis series ending at
/// `flow_cms`.
pub fn overview(reach_id: &str, name: &str, flow_cms: f64) -> ReachSnapshot {
    let mut snapshot = ReachSnapshot::new(ReachInfo {
        name: Some(name.to_string()),
        coordinates: Some(Coordinates::new(44.0, -121.0)),
        city: Some("Bend".to_string()),
        state: Some("OR".to_string()),
        ..ReachInfo::new(reach_id)
    });
    snapshot.analysis = Some(series(&[flow_cms / 2.0, flow_cms]));
    snapshot
}

// ============================================================================
// Forecast service
// ============================================================================

#[derive(Default)]
pub struct FakeForecastService {
    overviews: Mutex<HashMap<String, ReachSnapshot>>,
    categories: Mutex<HashMap<(String, ForecastCategory), ForecastSeries>>,
    supplementary: Mutex<HashMap<String, ReachSnapshot>>,
    failing: Mutex<HashSet<String>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeForecastService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_overview(&self, snapshot: ReachSnapshot) {
        lock(&self.overviews).insert(snapshot.reach_id().to_string(), snapshot);
    }

    pub fn set_category(
        &self,
        reach_id: &str,
        category: ForecastCategory,
        series: ForecastSeries,
    ) {
        lock(&self.categories).insert((reach_id.to_string(), category), series);
    }

    pub fn set_supplementary(&self, snapshot: ReachSnapshot) {
        lock(&self.supplementary).insert(snapshot.reach_id().to_string(), snapshot);
    }

    /// Fail calls named `what:reach_id`, e.g. `overview:123` or `hourly:123`.
    pub fn fail(&self, call: &str) {
        lock(&self.failing).insert(call.to_string());
    }

    pub fn recover(&self, call: &str) {
        lock(&self.failing).remove(call);
    }

    /// Block calls named `what:reach_id` until the returned `Notify` fires.
    pub fn hold(&self, call: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        lock(&self.holds).insert(call.to_string(), Arc::clone(&notify));
        notify
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    async fn enter(&self, call: String) -> Result<()> {
        lock(&self.calls).push(call.clone());
        let hold = lock(&self.holds).remove(&call);
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if lock(&self.failing).contains(&call) {
            return Err(anyhow!("simulated network error").context(call));
        }
        Ok(())
    }
}

#[async_trait]
impl ForecastService for FakeForecastService {
    async fn fetch_overview(&self, reach_id: &str) -> Result<ReachSnapshot> {
        self.enter(format!("overview:{}", reach_id)).await?;
        lock(&self.overviews)
            .get(reach_id)
            .cloned()
            .ok_or_else(|| anyhow!("reach {} not found", reach_id))
    }

    async fn fetch_category(
        &self,
        reach_id: &str,
        category: ForecastCategory,
    ) -> Result<Option<ForecastSeries>> {
        self.enter(format!("{}:{}", category, reach_id)).await?;
        Ok(lock(&self.categories)
            .get(&(reach_id.to_string(), category))
            .cloned())
    }

    async fn fetch_supplementary(
        &self,
        reach_id: &str,
        existing: &ReachSnapshot,
    ) -> Result<ReachSnapshot> {
        self.enter(format!("supplementary:{}", reach_id)).await?;
        let mut enriched = existing.clone();
        if let Some(extra) = lock(&self.supplementary).get(reach_id).cloned() {
            enriched.merge(extra);
        }
        Ok(enriched)
    }
}

// ============================================================================
// Calculator
// ============================================================================

/// Current flow is the last point of the preferred series mean, else the
/// analysis mean. Category is "high" at or above the 2-year flow.
#[derive(Default)]
pub struct FakeCalculator {
    pub flow_calls: AtomicUsize,
}

impl FakeCalculator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn flow_calls(&self) -> usize {
        self.flow_calls.load(Ordering::SeqCst)
    }
}

impl ForecastCalculator for FakeCalculator {
    fn current_flow(
        &self,
        snapshot: &ReachSnapshot,
        unit: FlowUnit,
        preferred: Option<ForecastCategory>,
    ) -> Option<f64> {
        self.flow_calls.fetch_add(1, Ordering::SeqCst);
        let series = preferred
            .and_then(|c| snapshot.series(c))
            .or(snapshot.analysis.as_ref())?;
        let last = series.mean()?.last()?;
        Some(series.unit.convert(last.flow, unit))
    }

    fn flow_category(
        &self,
        flow: FlowValue,
        return_periods: Option<&ReturnPeriods>,
    ) -> Option<String> {
        let two_year = return_periods?.threshold(2)?;
        let cms = flow.to_unit(FlowUnit::Cms).amount;
        Some(if cms >= two_year { "high" } else { "normal" }.to_string())
    }
}

// ============================================================================
// Return periods
// ============================================================================

#[derive(Default)]
pub struct FakeReturnPeriods {
    periods: Mutex<HashMap<String, ReturnPeriods>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeReturnPeriods {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, reach_id: &str, periods: ReturnPeriods) {
        lock(&self.periods).insert(reach_id.to_string(), periods);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReturnPeriodService for FakeReturnPeriods {
    async fn fetch_return_periods(&self, reach_id: &str) -> Result<ReturnPeriods> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("return period service unavailable"));
        }
        Ok(lock(&self.periods).get(reach_id).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Favorites store
// ============================================================================

#[derive(Default)]
pub struct FakeFavoritesStore {
    favorites: Mutex<Vec<Favorite>>,
    fail_list: AtomicBool,
    fail_reorder: AtomicBool,
    reject_add: AtomicBool,
    list_calls: AtomicUsize,
}

impl FakeFavoritesStore {
    pub fn with_ids(ids: &[&str]) -> Arc<Self> {
        let store = Self::default();
        *lock(&store.favorites) = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Favorite::new(*id, i))
            .collect();
        Arc::new(store)
    }

    pub fn ids(&self) -> Vec<String> {
        lock(&self.favorites).iter().map(|f| f.reach_id.clone()).collect()
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reorder(&self, fail: bool) {
        self.fail_reorder.store(fail, Ordering::SeqCst);
    }

    pub fn set_reject_add(&self, reject: bool) {
        self.reject_add.store(reject, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FavoritesStore for FakeFavoritesStore {
    async fn list(&self) -> Result<Vec<Favorite>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(anyhow!("favorites backend unavailable"));
        }
        Ok(lock(&self.favorites).clone())
    }

    async fn add(&self, reach_id: &str) -> Result<bool> {
        if self.reject_add.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut favorites = lock(&self.favorites);
        if favorites.iter().any(|f| f.reach_id == reach_id) {
            return Ok(false);
        }
        let position = favorites.len();
        favorites.push(Favorite::new(reach_id, position));
        Ok(true)
    }

    async fn remove(&self, reach_id: &str) -> Result<bool> {
        let mut favorites = lock(&self.favorites);
        let before = favorites.len();
        favorites.retain(|f| f.reach_id != reach_id);
        for (i, favorite) in favorites.iter_mut().enumerate() {
            favorite.position = i;
        }
        Ok(favorites.len() != before)
    }

    async fn reorder(&self, reordered: &[Favorite]) -> Result<bool> {
        if self.fail_reorder.load(Ordering::SeqCst) {
            return Err(anyhow!("write conflict"));
        }
        *lock(&self.favorites) = reordered.to_vec();
        Ok(true)
    }
}

// ============================================================================
// Local storage
// ============================================================================

#[derive(Default)]
pub struct MemoryLocalStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryReachCache {
    reaches: Mutex<HashMap<String, CachedReach>>,
}

impl MemoryReachCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ReachCache for MemoryReachCache {
    fn get(&self, reach_id: &str) -> Result<Option<CachedReach>> {
        Ok(lock(&self.reaches).get(reach_id).cloned())
    }

    fn store(&self, reach: &CachedReach) -> Result<()> {
        lock(&self.reaches)
            .entry(reach.reach_id.clone())
            .and_modify(|existing| existing.merge(reach.clone()))
            .or_insert_with(|| reach.clone());
        Ok(())
    }
}
