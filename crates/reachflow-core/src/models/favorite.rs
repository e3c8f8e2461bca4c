//! Favorite reaches and their session-only enrichment.
//!
//! A [`Favorite`] is what the favorites store persists. Everything the app
//! learns about a favorite while running (flow, name, coordinates) lives in a
//! [`FavoriteEnrichment`] and is never written back to that store.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Coordinates, FlowValue, ReturnPeriods};
use crate::utils::format_age;

/// A persisted favorite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    #[serde(rename = "reachId")]
    pub reach_id: String,
    #[serde(default)]
    pub position: usize,
    #[serde(rename = "customName", default)]
    pub custom_name: Option<String>,
    #[serde(rename = "customImage", default)]
    pub custom_image: Option<String>,
}

impl Favorite {
    pub fn new(reach_id: impl Into<String>, position: usize) -> Self {
        Self {
            reach_id: reach_id.into(),
            position,
            custom_name: None,
            custom_image: None,
        }
    }
}

/// Last known flow for a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowReading {
    pub value: FlowValue,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FlowReading {
    pub fn new(value: FlowValue) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.updated_at).num_minutes()
    }

    /// "just now", "5m ago", "2h ago", "3d ago".
    pub fn age_display(&self) -> String {
        format_age(self.age_minutes())
    }
}

/// Session-only data layered over a persisted favorite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavoriteEnrichment {
    pub flow: Option<FlowReading>,
    pub river_name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub return_periods: Option<ReturnPeriods>,
    pub custom_name: Option<String>,
    pub custom_image: Option<String>,
}

impl FavoriteEnrichment {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// What the presentation layer sees for one favorite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteView {
    #[serde(rename = "reachId")]
    pub reach_id: String,
    pub position: usize,
    #[serde(rename = "customName")]
    pub custom_name: Option<String>,
    #[serde(rename = "customImage")]
    pub custom_image: Option<String>,
    #[serde(rename = "riverName")]
    pub river_name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub flow: Option<FlowReading>,
    #[serde(rename = "returnPeriods")]
    pub return_periods: Option<ReturnPeriods>,
    #[serde(rename = "isRefreshing")]
    pub is_refreshing: bool,
}

impl FavoriteView {
    /// Custom name, then river name, then the bare reach id.
    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .or(self.river_name.as_deref())
            .unwrap_or(&self.reach_id)
    }
}

/// A change to one optional field.
///
/// `Keep` means the caller did not supply the field; `Clear` removes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn apply(self, field: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => *field = None,
            FieldUpdate::Set(value) => *field = Some(value),
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `Some` sets the field, `None` clears it.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomFieldsUpdate {
    pub custom_name: FieldUpdate<String>,
    pub custom_image: FieldUpdate<String>,
}

impl CustomFieldsUpdate {
    pub fn name(mut self, name: impl Into<FieldUpdate<String>>) -> Self {
        self.custom_name = name.into();
        self
    }

    pub fn image(mut self, image: impl Into<FieldUpdate<String>>) -> Self {
        self.custom_image = image.into();
        self
    }
}

/// Fields the caller already knows when adding a favorite, e.g. from a map
/// marker. Anything missing is fetched in the background.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownReachFields {
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub flow: Option<FlowValue>,
}

impl KnownReachFields {
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.coordinates.is_some() && self.flow.is_some()
    }
}

/// Reach ids added and removed between two favorites lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl FavoritesDiff {
    /// Set difference both ways, preserving the order of each input list.
    pub fn between<'a>(
        previous: impl IntoIterator<Item = &'a str>,
        current: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let previous: Vec<&str> = previous.into_iter().collect();
        let current: Vec<&str> = current.into_iter().collect();
        let previous_set: HashSet<&str> = previous.iter().copied().collect();
        let current_set: HashSet<&str> = current.iter().copied().collect();

        Self {
            added: current
                .iter()
                .filter(|id| !previous_set.contains(*id))
                .map(|id| id.to_string())
                .collect(),
            removed: previous
                .iter()
                .filter(|id| !current_set.contains(*id))
                .map(|id| id.to_string())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
