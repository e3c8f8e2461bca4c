//! Forecast series, flow units and the per-reach forecast snapshot.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReachInfo;

/// Cubic feet per second in one cubic meter per second.
pub const CFS_PER_CMS: f64 = 35.3147;

/// Name of the ensemble mean inside a series.
pub const MEAN_TRACE: &str = "mean";

// ============================================================================
// Units
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowUnit {
    #[default]
    Cfs,
    Cms,
}

impl FlowUnit {
    /// Convert an amount expressed in `self` into `target`.
    pub fn convert(&self, amount: f64, target: FlowUnit) -> f64 {
        match (self, target) {
            (FlowUnit::Cfs, FlowUnit::Cms) => amount / CFS_PER_CMS,
            (FlowUnit::Cms, FlowUnit::Cfs) => amount * CFS_PER_CMS,
            _ => amount,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlowUnit::Cfs => "cfs",
            FlowUnit::Cms => "cms",
        }
    }
}

impl fmt::Display for FlowUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A flow amount together with the unit it was measured in.
///
/// Flow numbers are never stored without their unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowValue {
    pub amount: f64,
    pub unit: FlowUnit,
}

impl FlowValue {
    pub fn new(amount: f64, unit: FlowUnit) -> Self {
        Self { amount, unit }
    }

    pub fn to_unit(self, unit: FlowUnit) -> Self {
        Self {
            amount: self.unit.convert(self.amount, unit),
            unit,
        }
    }
}

impl fmt::Display for FlowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", crate::utils::format_flow_amount(self.amount), self.unit)
    }
}

// ============================================================================
// Series
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowPoint {
    #[serde(rename = "validTime")]
    pub valid_time: DateTime<Utc>,
    pub flow: f64,
}

impl FlowPoint {
    pub fn new(valid_time: DateTime<Utc>, flow: f64) -> Self {
        Self { valid_time, flow }
    }
}

/// A time-ordered forecast made of one or more named traces: an ensemble
/// `mean` and/or numbered members (`member1`, `member2`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub unit: FlowUnit,
    #[serde(default)]
    pub traces: BTreeMap<String, Vec<FlowPoint>>,
}

impl ForecastSeries {
    pub fn new(unit: FlowUnit) -> Self {
        Self {
            unit,
            traces: BTreeMap::new(),
        }
    }

    pub fn with_trace(mut self, name: impl Into<String>, points: Vec<FlowPoint>) -> Self {
        self.traces.insert(name.into(), points);
        self
    }

    pub fn mean(&self) -> Option<&[FlowPoint]> {
        self.traces.get(MEAN_TRACE).map(Vec::as_slice)
    }

    /// Ensemble members, excluding the mean.
    pub fn members(&self) -> impl Iterator<Item = (&str, &[FlowPoint])> {
        self.traces
            .iter()
            .filter(|(name, _)| name.as_str() != MEAN_TRACE)
            .map(|(name, points)| (name.as_str(), points.as_slice()))
    }

    /// A series with no points in any trace counts as missing.
    pub fn is_empty(&self) -> bool {
        self.traces.values().all(Vec::is_empty)
    }
}

/// The forecast ranges a user can ask for on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastCategory {
    /// Short range, hourly for the next 18 hours.
    Hourly,
    /// Medium range, up to 10 days.
    Medium,
    /// Long range, up to 30 days.
    Extended,
}

impl ForecastCategory {
    pub const ALL: [ForecastCategory; 3] = [
        ForecastCategory::Hourly,
        ForecastCategory::Medium,
        ForecastCategory::Extended,
    ];

    /// Series name used by the forecast service.
    pub fn series_name(&self) -> &'static str {
        match self {
            ForecastCategory::Hourly => "shortRange",
            ForecastCategory::Medium => "mediumRange",
            ForecastCategory::Extended => "longRange",
        }
    }
}

impl fmt::Display for ForecastCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastCategory::Hourly => write!(f, "hourly"),
            ForecastCategory::Medium => write!(f, "medium"),
            ForecastCategory::Extended => write!(f, "extended"),
        }
    }
}

/// Peak flow summary for one forecast range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub category: ForecastCategory,
    #[serde(rename = "peakFlow")]
    pub peak_flow: FlowValue,
    #[serde(rename = "peakTime")]
    pub peak_time: DateTime<Utc>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything loaded so far for one reach.
///
/// Loads arrive in pieces (overview, categories, supplementary) and are
/// folded in with [`ReachSnapshot::merge`]. A series that has been loaded is
/// never replaced by an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReachSnapshot {
    pub reach: ReachInfo,
    /// Recent observed/assimilated flow, used for the current value.
    #[serde(rename = "analysisAssimilation", default)]
    pub analysis: Option<ForecastSeries>,
    #[serde(rename = "shortRange", default)]
    pub short_range: Option<ForecastSeries>,
    #[serde(rename = "mediumRange", default)]
    pub medium_range: Option<ForecastSeries>,
    #[serde(rename = "longRange", default)]
    pub long_range: Option<ForecastSeries>,
    #[serde(default)]
    pub summaries: Vec<ForecastSummary>,
}

impl ReachSnapshot {
    pub fn new(reach: ReachInfo) -> Self {
        Self {
            reach,
            ..Default::default()
        }
    }

    pub fn reach_id(&self) -> &str {
        &self.reach.reach_id
    }

    pub fn series(&self, category: ForecastCategory) -> Option<&ForecastSeries> {
        match category {
            ForecastCategory::Hourly => self.short_range.as_ref(),
            ForecastCategory::Medium => self.medium_range.as_ref(),
            ForecastCategory::Extended => self.long_range.as_ref(),
        }
    }

    fn series_slot(&mut self, category: ForecastCategory) -> &mut Option<ForecastSeries> {
        match category {
            ForecastCategory::Hourly => &mut self.short_range,
            ForecastCategory::Medium => &mut self.medium_range,
            ForecastCategory::Extended => &mut self.long_range,
        }
    }

    pub fn has_series(&self, category: ForecastCategory) -> bool {
        self.series(category).is_some_and(|s| !s.is_empty())
    }

    /// Categories with a non-empty series, in display order.
    pub fn loaded_categories(&self) -> Vec<ForecastCategory> {
        ForecastCategory::ALL
            .into_iter()
            .filter(|c| self.has_series(*c))
            .collect()
    }

    /// Store a freshly fetched series for `category` unless it is missing or
    /// empty. Returns whether the snapshot changed.
    pub fn merge_series(
        &mut self,
        category: ForecastCategory,
        fetched: Option<ForecastSeries>,
    ) -> bool {
        merge_slot(self.series_slot(category), fetched)
    }

    /// Fold a partial snapshot for the same reach into this one.
    pub fn merge(&mut self, incoming: ReachSnapshot) -> bool {
        let before = self.clone();
        let ReachSnapshot {
            reach,
            analysis,
            short_range,
            medium_range,
            long_range,
            summaries,
        } = incoming;

        self.reach.merge(reach);
        merge_slot(&mut self.analysis, analysis);
        merge_slot(&mut self.short_range, short_range);
        merge_slot(&mut self.medium_range, medium_range);
        merge_slot(&mut self.long_range, long_range);
        if !summaries.is_empty() {
            self.summaries = summaries;
        }

        *self != before
    }
}

fn merge_slot(slot: &mut Option<ForecastSeries>, fetched: Option<ForecastSeries>) -> bool {
    match fetched {
        Some(series) if !series.is_empty() => {
            let changed = slot.as_ref() != Some(&series);
            *slot = Some(series);
            changed
        }
        _ => false,
    }
}

// ============================================================================
// Loading phase
// ============================================================================

/// Lifecycle stage of the displayed reach's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingPhase {
    #[default]
    None,
    /// Reach identity and current flow only.
    Overview,
    /// Overview plus return periods and summaries.
    Supplementary,
    /// Everything loaded, or adopted from the session cache.
    Complete,
    /// A single category was loaded on demand.
    Specific,
}

impl LoadingPhase {
    pub fn has_data(&self) -> bool {
        !matches!(self, LoadingPhase::None)
    }
}

impl fmt::Display for LoadingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadingPhase::None => "none",
            LoadingPhase::Overview => "overview",
            LoadingPhase::Supplementary => "supplementary",
            LoadingPhase::Complete => "complete",
            LoadingPhase::Specific => "specific",
        };
        f.write_str(name)
    }
}
