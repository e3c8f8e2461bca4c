//! Favorites list, session enrichment and background flow refreshes.
//!
//! The persisted list (ids, positions, store-side custom fields) belongs to
//! the [`FavoritesStore`]. Everything learned while the app runs (current
//! flow, river name, coordinates, return periods) is kept per reach id in a
//! [`FavoriteEnrichment`] and is never written back to that store. Custom
//! name/image overlays are the exception: they are session data that is also
//! saved to the on-device [`LocalStore`] so they survive restarts.
//!
//! Refreshes fetch a reach's overview and store its flow together with the
//! unit active at that moment. Concurrent refreshes of one id share a single
//! in-flight request.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, MemoTable, UnitSensitivity};
use crate::config::RefreshTiming;
use crate::error::{ReachflowError, Result};
use crate::lock;
use crate::models::{
    CachedReach, Coordinates, CustomFieldsUpdate, Favorite, FavoriteEnrichment, FavoriteView,
    FavoritesDiff, FlowReading, FlowValue, KnownReachFields, ReachInfo, ReturnPeriods,
};
use crate::notify::ChangeNotifier;
use crate::services::{
    FavoritesStore, ForecastCalculator, ForecastService, LocalStore, ReachCache,
    ReturnPeriodService, UnitPreference,
};
use crate::units::UnitSensitive;

/// Local store key for the custom name overlay map.
pub const CUSTOM_NAMES_KEY: &str = "favorite_custom_names";

/// Local store key for the custom image overlay map.
pub const CUSTOM_IMAGES_KEY: &str = "favorite_custom_images";

/// `what` for favorite refresh failures.
const CURRENT_FLOW: &str = "current flow";

type RefreshFuture = Shared<BoxFuture<'static, Result<()>>>;

/// Collaborators for a [`FavoritesProvider`].
pub struct FavoritesDeps {
    pub store: Arc<dyn FavoritesStore>,
    pub forecasts: Arc<dyn ForecastService>,
    pub calculator: Arc<dyn ForecastCalculator>,
    pub return_periods: Arc<dyn ReturnPeriodService>,
    pub reach_cache: Arc<dyn ReachCache>,
    pub local: Arc<dyn LocalStore>,
    pub units: Arc<dyn UnitPreference>,
}

/// Outcome of a batch refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

impl RefreshSummary {
    fn from_results<'a>(results: impl IntoIterator<Item = &'a Result<()>>) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result {
                Ok(()) => summary.refreshed += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

// ============================================================================
// State
// ============================================================================

struct FavoritesState {
    /// Persisted list, sorted by position.
    favorites: Vec<Favorite>,
    ids: HashSet<String>,
    enrichment: HashMap<String, FavoriteEnrichment>,
    refreshing: HashSet<String>,
    categories: MemoTable<Option<String>>,
    error: Option<ReachflowError>,
}

impl FavoritesState {
    fn new() -> Self {
        Self {
            favorites: Vec::new(),
            ids: HashSet::new(),
            enrichment: HashMap::new(),
            refreshing: HashSet::new(),
            categories: MemoTable::new("favorite_flow_category", UnitSensitivity::Sensitive),
            error: None,
        }
    }

    /// Drop all session data for `reach_id`.
    fn forget(&mut self, reach_id: &str) {
        self.enrichment.remove(reach_id);
        self.refreshing.remove(reach_id);
        self.categories.remove_reach(reach_id);
    }

    /// Adopt the store's list. Ids that disappeared lose their session data.
    fn replace_list(&mut self, mut favorites: Vec<Favorite>) {
        favorites.sort_by_key(|f| f.position);
        let ids: HashSet<String> = favorites.iter().map(|f| f.reach_id.clone()).collect();
        let dropped: Vec<String> = self.ids.difference(&ids).cloned().collect();
        for reach_id in &dropped {
            self.forget(reach_id);
        }
        self.ids = ids;
        self.favorites = favorites;
    }

    fn renumber(&mut self) {
        for (position, favorite) in self.favorites.iter_mut().enumerate() {
            favorite.position = position;
        }
    }

    fn overlay_maps(&self) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        let mut names = BTreeMap::new();
        let mut images = BTreeMap::new();
        for (reach_id, enrichment) in &self.enrichment {
            if let Some(name) = &enrichment.custom_name {
                names.insert(reach_id.clone(), name.clone());
            }
            if let Some(image) = &enrichment.custom_image {
                images.insert(reach_id.clone(), image.clone());
            }
        }
        (names, images)
    }
}

/// Marks a favorite as refreshing until dropped, so an early return or error
/// never leaves the flag set.
struct RefreshingGuard<'a> {
    provider: &'a FavoritesProvider,
    reach_id: &'a str,
}

impl<'a> RefreshingGuard<'a> {
    fn start(provider: &'a FavoritesProvider, reach_id: &'a str) -> Self {
        provider.state().refreshing.insert(reach_id.to_string());
        provider.notifier.notify();
        Self { provider, reach_id }
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.provider.state().refreshing.remove(self.reach_id);
        self.provider.notifier.notify();
    }
}

// ============================================================================
// Provider
// ============================================================================

pub struct FavoritesProvider {
    me: Weak<FavoritesProvider>,
    deps: FavoritesDeps,
    timing: RefreshTiming,
    state: Mutex<FavoritesState>,
    in_flight: Mutex<HashMap<String, RefreshFuture>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    notifier: ChangeNotifier,
}

impl FavoritesProvider {
    pub fn new(deps: FavoritesDeps, timing: RefreshTiming) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            deps,
            timing,
            state: Mutex::new(FavoritesState::new()),
            in_flight: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            notifier: ChangeNotifier::new(),
        })
    }

    fn state(&self) -> MutexGuard<'_, FavoritesState> {
        lock(&self.state)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load the persisted list and the custom overlays, then schedule a paced
    /// refresh of every favorite after the initial delay.
    pub async fn initialize_and_refresh(&self) -> Result<()> {
        self.load_list(true).await?;

        let delay = self.timing.initial_refresh_delay();
        self.spawn_tracked("startup refresh", move |this| async move {
            tokio::time::sleep(delay).await;
            this.refresh_all_sequential().await;
        });
        Ok(())
    }

    /// Load the persisted list. Failure here is shown to the user.
    pub async fn load(&self) -> Result<()> {
        self.load_list(false).await
    }

    /// Overlays are read before observers are notified, so the first
    /// render already shows custom names and images.
    async fn load_list(&self, with_overlays: bool) -> Result<()> {
        match self.fetch_list().await {
            Ok(()) => {
                if with_overlays {
                    self.load_overlays();
                }
                let count = self.len();
                info!(count, "Favorites loaded");
                self.state().error = None;
                self.notifier.notify();
                Ok(())
            }
            Err(e) => {
                let err = ReachflowError::favorites_list(&e);
                error!(error = %err, "Failed to load favorites");
                self.state().error = Some(err.clone());
                self.notifier.notify();
                Err(err)
            }
        }
    }

    async fn fetch_list(&self) -> anyhow::Result<()> {
        let favorites = self.deps.store.list().await?;
        self.state().replace_list(favorites);
        Ok(())
    }

    fn load_overlays(&self) {
        let names = self.read_overlay(CUSTOM_NAMES_KEY);
        let images = self.read_overlay(CUSTOM_IMAGES_KEY);
        debug!(names = names.len(), images = images.len(), "Loaded custom overlays");

        let mut state = self.state();
        for (reach_id, name) in names {
            state.enrichment.entry(reach_id).or_default().custom_name = Some(name);
        }
        for (reach_id, image) in images {
            state.enrichment.entry(reach_id).or_default().custom_image = Some(image);
        }
    }

    fn read_overlay(&self, key: &str) -> BTreeMap<String, String> {
        match self.deps.local.get(key) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(key, error = %e, "Ignoring unreadable custom overlay");
                BTreeMap::new()
            }),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(key, error = %e, "Failed to read custom overlay");
                BTreeMap::new()
            }
        }
    }

    /// Write both overlay maps to local storage.
    fn persist_overlays(&self) -> Result<()> {
        let (names, images) = self.state().overlay_maps();
        self.write_overlay(CUSTOM_NAMES_KEY, &names)?;
        self.write_overlay(CUSTOM_IMAGES_KEY, &images)
    }

    fn write_overlay(&self, key: &str, map: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string(map)
            .map_err(|e| ReachflowError::storage(&anyhow::Error::from(e)))?;
        self.deps
            .local
            .set(key, &json)
            .map_err(|e| ReachflowError::storage(&e))
    }

    // =========================================================================
    // Add / remove / reorder
    // =========================================================================

    pub async fn add(&self, reach_id: &str) -> Result<()> {
        self.add_with_fields(reach_id, KnownReachFields::default())
            .await
    }

    /// Add a favorite whose location (and possibly name) is already known,
    /// e.g. from a search result.
    pub async fn add_with_known_coordinates(
        &self,
        reach_id: &str,
        coordinates: Coordinates,
        name: Option<String>,
    ) -> Result<()> {
        let known = KnownReachFields {
            name,
            coordinates: Some(coordinates),
            flow: None,
        };
        self.add_with_fields(reach_id, known).await
    }

    /// Add a favorite from a map marker. When name, coordinates and flow are
    /// all known no background fetch is made.
    pub async fn add_from_map(&self, reach_id: &str, known: KnownReachFields) -> Result<()> {
        self.add_with_fields(reach_id, known).await
    }

    async fn add_with_fields(&self, reach_id: &str, known: KnownReachFields) -> Result<()> {
        if self.is_favorite(reach_id) {
            debug!(reach_id, "Ignoring duplicate favorite");
            return Err(ReachflowError::DuplicateFavorite(reach_id.to_string()));
        }

        match self.deps.store.add(reach_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(reach_id, "Favorites store rejected add");
                return Err(ReachflowError::StoreRejected {
                    operation: "add",
                    reach_id: reach_id.to_string(),
                });
            }
            Err(e) => {
                let err = ReachflowError::storage(&e);
                warn!(reach_id, error = %err, "Failed to add favorite");
                return Err(err);
            }
        }

        let complete = known.is_complete();
        {
            let unit = self.deps.units.current_unit();
            let mut state = self.state();
            let entry = state.enrichment.entry(reach_id.to_string()).or_default();
            if known.name.is_some() {
                entry.river_name = known.name;
            }
            if known.coordinates.is_some() {
                entry.coordinates = known.coordinates;
            }
            if let Some(flow) = known.flow {
                entry.flow = Some(FlowReading::new(flow.to_unit(unit)));
            }
        }

        if let Err(e) = self.fetch_list().await {
            warn!(reach_id, error = %e, "Reload after add failed, appending locally");
            let mut state = self.state();
            if state.ids.insert(reach_id.to_string()) {
                let position = state.favorites.len();
                state.favorites.push(Favorite::new(reach_id, position));
            }
        }
        info!(reach_id, "Favorite added");
        self.notifier.notify();

        if !complete {
            let reach_id = reach_id.to_string();
            self.spawn_tracked("add enrichment", move |this| async move {
                if let Err(e) = this.refresh_one(&reach_id).await {
                    debug!(reach_id = %reach_id, error = %e, "Enrichment after add failed");
                }
            });
        }
        Ok(())
    }

    /// Remove a favorite and every piece of session data held for it.
    pub async fn remove(&self, reach_id: &str) -> Result<()> {
        if !self.is_favorite(reach_id) {
            return Err(ReachflowError::NotFavorite(reach_id.to_string()));
        }

        match self.deps.store.remove(reach_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(reach_id, "Favorites store rejected remove");
                return Err(ReachflowError::StoreRejected {
                    operation: "remove",
                    reach_id: reach_id.to_string(),
                });
            }
            Err(e) => {
                let err = ReachflowError::storage(&e);
                warn!(reach_id, error = %err, "Failed to remove favorite");
                return Err(err);
            }
        }

        {
            let mut state = self.state();
            state.forget(reach_id);
            state.ids.remove(reach_id);
            state.favorites.retain(|f| f.reach_id != reach_id);
            state.renumber();
        }
        if let Err(e) = self.persist_overlays() {
            warn!(reach_id, error = %e, "Failed to save custom overlays after remove");
        }
        if let Err(e) = self.fetch_list().await {
            warn!(reach_id, error = %e, "Reload after remove failed");
        }

        info!(reach_id, "Favorite removed");
        self.notifier.notify();
        Ok(())
    }

    /// Move the favorite at `from` to `to`.
    ///
    /// The new order is visible immediately. If the store does not accept it,
    /// the store's order is reloaded, or the previous order restored when the
    /// reload fails too.
    pub async fn reorder(&self, from: usize, to: usize) -> Result<()> {
        let (backup, reordered) = {
            let mut state = self.state();
            let len = state.favorites.len();
            for index in [from, to] {
                if index >= len {
                    return Err(ReachflowError::InvalidIndex { index, len });
                }
            }
            if from == to {
                return Ok(());
            }

            let backup = state.favorites.clone();
            let moved = state.favorites.remove(from);
            state.favorites.insert(to, moved);
            state.renumber();
            (backup, state.favorites.clone())
        };
        self.notifier.notify();

        let failure = match self.deps.store.reorder(&reordered).await {
            Ok(true) => {
                debug!(from, to, "Favorites reordered");
                return Ok(());
            }
            Ok(false) => ReachflowError::StoreRejected {
                operation: "reorder",
                reach_id: reordered[to].reach_id.clone(),
            },
            Err(e) => ReachflowError::storage(&e),
        };

        warn!(from, to, error = %failure, "Reorder not saved, rolling back");
        if let Err(e) = self.fetch_list().await {
            warn!(error = %e, "Reload failed, restoring previous order");
            self.state().favorites = backup;
        }
        self.notifier.notify();
        Err(failure)
    }

    /// Change a favorite's custom name and/or image. Applied to the session
    /// right away, then both overlay maps are saved locally.
    pub fn update_custom_fields(&self, reach_id: &str, update: CustomFieldsUpdate) -> Result<()> {
        {
            let mut state = self.state();
            if !state.ids.contains(reach_id) {
                return Err(ReachflowError::NotFavorite(reach_id.to_string()));
            }
            let entry = state.enrichment.entry(reach_id.to_string()).or_default();
            update.custom_name.apply(&mut entry.custom_name);
            update.custom_image.apply(&mut entry.custom_image);
        }
        self.notifier.notify();
        self.persist_overlays()
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Refresh one favorite's flow, name, coordinates and return periods.
    ///
    /// A second call for an id that is already refreshing waits for the
    /// first instead of issuing another request.
    pub async fn refresh_one(&self, reach_id: &str) -> Result<()> {
        let Some(this) = self.me.upgrade() else {
            return self.refresh_flow(reach_id).await;
        };

        let (shared, started) = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(reach_id) {
                Some(existing) => {
                    debug!(reach_id, "Joining in-flight refresh");
                    (existing.clone(), false)
                }
                None => {
                    let id = reach_id.to_string();
                    let refresh = async move {
                        let result = this.refresh_flow(&id).await;
                        lock(&this.in_flight).remove(&id);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(reach_id.to_string(), refresh.clone());
                    (refresh, true)
                }
            }
        };

        if started {
            // Run to completion even if every caller stops waiting, so the
            // refreshing flag and the in-flight entry are always released
            let driver = shared.clone();
            self.spawn_tracked("favorite refresh", move |_| async move {
                let _ = driver.await;
            });
        }
        shared.await
    }

    async fn refresh_flow(&self, reach_id: &str) -> Result<()> {
        if !self.is_favorite(reach_id) {
            return Err(ReachflowError::NotFavorite(reach_id.to_string()));
        }
        let _refreshing = RefreshingGuard::start(self, reach_id);

        let overview = match self.deps.forecasts.fetch_overview(reach_id).await {
            Ok(overview) => overview,
            Err(e) => {
                let err = ReachflowError::fetch(CURRENT_FLOW, reach_id, &e);
                warn!(reach_id, error = %err, "Favorite refresh failed");
                return Err(err);
            }
        };

        {
            let mut state = self.state();
            if !state.ids.contains(reach_id) {
                debug!(reach_id, "Favorite removed during refresh");
                return Ok(());
            }
            // Flow and unit are read and stored in the same step
            let unit = self.deps.units.current_unit();
            let flow = self.deps.calculator.current_flow(&overview, unit, None);
            let entry = state.enrichment.entry(reach_id.to_string()).or_default();
            if let Some(amount) = flow {
                entry.flow = Some(FlowReading::new(FlowValue::new(amount, unit)));
            }
            if overview.reach.name.is_some() {
                entry.river_name = overview.reach.name.clone();
            }
            if overview.reach.coordinates.is_some() {
                entry.coordinates = overview.reach.coordinates;
            }
            state.categories.remove_reach(reach_id);
        }
        self.notifier.notify();

        if let Some(periods) = self.load_return_periods(reach_id, &overview.reach).await {
            let mut state = self.state();
            if state.ids.contains(reach_id) {
                state.enrichment.entry(reach_id.to_string()).or_default().return_periods =
                    Some(periods);
                state.categories.remove_reach(reach_id);
            }
        }
        debug!(reach_id, "Favorite refreshed");
        Ok(())
    }

    /// Return periods from the reach cache, or from the service on a miss.
    /// Fetched thresholds are merged into the cached record.
    async fn load_return_periods(
        &self,
        reach_id: &str,
        reach: &ReachInfo,
    ) -> Option<ReturnPeriods> {
        match self.deps.reach_cache.get(reach_id) {
            Ok(Some(cached)) if cached.has_return_periods() => {
                debug!(reach_id, "Return periods from reach cache");
                return cached.return_periods;
            }
            Ok(_) => {}
            Err(e) => warn!(reach_id, error = %e, "Reach cache read failed"),
        }

        let periods = match self.deps.return_periods.fetch_return_periods(reach_id).await {
            Ok(periods) if !periods.is_empty() => periods,
            Ok(_) => {
                debug!(reach_id, "No return periods available");
                return None;
            }
            Err(e) => {
                warn!(reach_id, error = %e, "Return period fetch failed");
                return None;
            }
        };

        let record = CachedReach {
            name: reach.name.clone(),
            coordinates: reach.coordinates,
            return_periods: Some(periods.clone()),
            ..CachedReach::new(reach_id)
        };
        if let Err(e) = self.deps.reach_cache.store(&record) {
            warn!(reach_id, error = %e, "Failed to cache return periods");
        }
        Some(periods)
    }

    /// Refresh favorites one at a time with a pause between requests.
    pub async fn refresh_all_sequential(&self) -> RefreshSummary {
        let ids = self.favorite_ids();
        let pacing = self.timing.pacing();
        info!(count = ids.len(), "Refreshing favorites");

        let mut results = Vec::with_capacity(ids.len());
        for (i, reach_id) in ids.iter().enumerate() {
            if i > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            if !self.is_favorite(reach_id) {
                continue;
            }
            results.push(self.refresh_one(reach_id).await);
        }

        let summary = RefreshSummary::from_results(&results);
        info!(
            refreshed = summary.refreshed,
            failed = summary.failed,
            "Favorites refresh complete"
        );
        summary
    }

    /// Refresh every favorite at once, for user-initiated refreshes.
    pub async fn refresh_all_concurrent(&self) -> RefreshSummary {
        self.state().categories.clear();
        let ids = self.favorite_ids();
        debug!(count = ids.len(), "Refreshing favorites concurrently");

        let results = join_all(ids.iter().map(|reach_id| self.refresh_one(reach_id))).await;
        let summary = RefreshSummary::from_results(&results);
        info!(
            refreshed = summary.refreshed,
            failed = summary.failed,
            "Favorites refresh complete"
        );
        summary
    }

    /// Drop every stored flow and the categories derived from them, then
    /// schedule a refresh in the new unit. Names and coordinates are kept.
    pub fn clear_unit_dependent_caches(&self) {
        let cleared = {
            let mut state = self.state();
            let mut cleared = 0;
            for enrichment in state.enrichment.values_mut() {
                if enrichment.flow.take().is_some() {
                    cleared += 1;
                }
            }
            state.categories.clear_if_unit_sensitive();
            cleared
        };
        debug!(flows = cleared, "Cleared favorite flows");
        self.notifier.notify();

        let delay = self.timing.unit_change_refresh_delay();
        self.spawn_tracked("unit change refresh", move |this| async move {
            tokio::time::sleep(delay).await;
            this.refresh_all_concurrent().await;
        });
    }

    fn spawn_tracked<F, Fut>(&self, name: &'static str, task: F)
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(this) = self.me.upgrade() else {
            return;
        };
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(task = name, "No async runtime, skipping background task");
                return;
            }
        };

        let join = handle.spawn(task(this));
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(join);
    }

    /// Wait for every background task this provider has started, including
    /// ones started while waiting.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *lock(&self.tasks));
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Background task failed");
                }
            }
        }
    }

    // =========================================================================
    // Read-only state
    // =========================================================================

    /// The persisted list with session data laid over it. Local custom
    /// overlays win over the store's custom fields.
    pub fn enriched_view(&self) -> Vec<FavoriteView> {
        let state = self.state();
        state
            .favorites
            .iter()
            .map(|favorite| {
                let enrichment = state.enrichment.get(&favorite.reach_id);
                FavoriteView {
                    reach_id: favorite.reach_id.clone(),
                    position: favorite.position,
                    custom_name: enrichment
                        .and_then(|e| e.custom_name.clone())
                        .or_else(|| favorite.custom_name.clone()),
                    custom_image: enrichment
                        .and_then(|e| e.custom_image.clone())
                        .or_else(|| favorite.custom_image.clone()),
                    river_name: enrichment.and_then(|e| e.river_name.clone()),
                    coordinates: enrichment.and_then(|e| e.coordinates),
                    flow: enrichment.and_then(|e| e.flow),
                    return_periods: enrichment.and_then(|e| e.return_periods.clone()),
                    is_refreshing: state.refreshing.contains(&favorite.reach_id),
                }
            })
            .collect()
    }

    /// Severity label for a favorite's last known flow.
    pub fn flow_category(&self, reach_id: &str) -> Option<String> {
        let mut state = self.state();
        let key = CacheKey::new(reach_id);
        if let Some(cached) = state.categories.get(&key) {
            return cached;
        }

        let enrichment = state.enrichment.get(reach_id)?;
        let flow = enrichment.flow?.value;
        let category = self
            .deps
            .calculator
            .flow_category(flow, enrichment.return_periods.as_ref());
        state.categories.insert(key, category.clone());
        category
    }

    /// Ids added and removed since `previous`.
    pub fn diff(&self, previous: &[String]) -> FavoritesDiff {
        let current = self.favorite_ids();
        FavoritesDiff::between(
            previous.iter().map(String::as_str),
            current.iter().map(String::as_str),
        )
    }

    pub fn favorite_ids(&self) -> Vec<String> {
        self.state()
            .favorites
            .iter()
            .map(|f| f.reach_id.clone())
            .collect()
    }

    pub fn is_favorite(&self, reach_id: &str) -> bool {
        self.state().ids.contains(reach_id)
    }

    pub fn is_refreshing(&self, reach_id: &str) -> bool {
        self.state().refreshing.contains(reach_id)
    }

    pub fn len(&self) -> usize {
        self.state().favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().favorites.is_empty()
    }

    pub fn error(&self) -> Option<ReachflowError> {
        self.state().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notifier.subscribe()
    }
}

impl UnitSensitive for FavoritesProvider {
    fn clear_unit_dependent_caches(&self) {
        FavoritesProvider::clear_unit_dependent_caches(self);
    }
}

// ============================================================================
// Tests
// ============================================================================
