//! Reach identity and metadata.
//!
//! A reach is a modeled river segment. These types carry what the forecast
//! service knows about a reach independent of any forecast series.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Format as "44.0521, -121.3153".
    pub fn formatted(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Flood-flow thresholds keyed by recurrence interval in years.
///
/// Values are in cubic meters per second, which is what the upstream
/// return-period service reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnPeriods {
    #[serde(default)]
    pub thresholds: BTreeMap<u32, f64>,
}

impl ReturnPeriods {
    pub fn new(thresholds: impl IntoIterator<Item = (u32, f64)>) -> Self {
        Self {
            thresholds: thresholds.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn threshold(&self, years: u32) -> Option<f64> {
        self.thresholds.get(&years).copied()
    }
}

/// Reach metadata as reported by the forecast service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReachInfo {
    #[serde(rename = "reachId")]
    pub reach_id: String,
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "returnPeriods", default)]
    pub return_periods: Option<ReturnPeriods>,
}

impl ReachInfo {
    pub fn new(reach_id: impl Into<String>) -> Self {
        Self {
            reach_id: reach_id.into(),
            ..Default::default()
        }
    }

    /// Fold newer metadata into this record. Fields the newer record does
    /// not carry keep their current value.
    pub fn merge(&mut self, newer: ReachInfo) {
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.coordinates.is_some() {
            self.coordinates = newer.coordinates;
        }
        if newer.city.is_some() {
            self.city = newer.city;
        }
        if newer.state.is_some() {
            self.state = newer.state;
        }
        if let Some(periods) = newer.return_periods.filter(|p| !p.is_empty()) {
            self.return_periods = Some(periods);
        }
    }
}

/// A reach record in the on-device reach cache, used to reuse return
/// periods across sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedReach {
    #[serde(rename = "reachId")]
    pub reach_id: String,
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "returnPeriods", default)]
    pub return_periods: Option<ReturnPeriods>,
}

impl CachedReach {
    pub fn new(reach_id: impl Into<String>) -> Self {
        Self {
            reach_id: reach_id.into(),
            ..Default::default()
        }
    }

    pub fn has_return_periods(&self) -> bool {
        self.return_periods.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Merge an incoming record into this one without discarding fields the
    /// incoming record leaves empty.
    pub fn merge(&mut self, incoming: CachedReach) {
        let has_periods = incoming.has_return_periods();
        if incoming.name.is_some() {
            self.name = incoming.name;
        }
        if incoming.coordinates.is_some() {
            self.coordinates = incoming.coordinates;
        }
        if has_periods {
            self.return_periods = incoming.return_periods;
        }
    }
}
