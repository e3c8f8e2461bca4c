//! Memo tables for values derived from forecast data.
//!
//! Each table is keyed by reach id plus an optional variant (for example a
//! preferred series) and declares whether its values depend on the active
//! flow unit, so a unit change can drop exactly the tables that need it.

use std::collections::HashMap;
use std::fmt;

/// Key for a derived value: reach id plus an optional variant parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    reach_id: String,
    variant: Option<String>,
}

impl CacheKey {
    pub fn new(reach_id: impl Into<String>) -> Self {
        Self {
            reach_id: reach_id.into(),
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: Option<impl fmt::Display>) -> Self {
        self.variant = variant.map(|v| v.to_string());
        self
    }

    pub fn reach_id(&self) -> &str {
        &self.reach_id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}:{}", self.reach_id, variant),
            None => write!(f, "{}", self.reach_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSensitivity {
    /// Values change when the flow unit changes.
    Sensitive,
    /// Names, locations and similar metadata.
    Insensitive,
}

#[derive(Debug, Clone)]
pub struct MemoTable<V> {
    name: &'static str,
    sensitivity: UnitSensitivity,
    entries: HashMap<CacheKey, V>,
}

impl<V: Clone> MemoTable<V> {
    pub fn new(name: &'static str, sensitivity: UnitSensitivity) -> Self {
        Self {
            name,
            sensitivity,
            entries: HashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_unit_sensitive(&self) -> bool {
        self.sensitivity == UnitSensitivity::Sensitive
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, value: V) {
        self.entries.insert(key, value);
    }

    /// Drop every variant cached for `reach_id`.
    pub fn remove_reach(&mut self, reach_id: &str) {
        self.entries.retain(|key, _| key.reach_id != reach_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clear only if this table depends on the flow unit. Returns whether it
    /// was cleared.
    pub fn clear_if_unit_sensitive(&mut self) -> bool {
        if self.is_unit_sensitive() {
            self.entries.clear();
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForecastCategory;

    #[test]
    fn test_cache_key_display() {
        assert_eq!(CacheKey::new("123").to_string(), "123");
        assert_eq!(
            CacheKey::new("123")
                .with_variant(Some(ForecastCategory::Medium))
                .to_string(),
            "123:medium"
        );
    }

    #[test]
    fn test_variants_are_distinct_keys() {
        let mut table = MemoTable::new("current_flow", UnitSensitivity::Sensitive);
        table.insert(CacheKey::new("1"), 10.0);
        table.insert(
            CacheKey::new("1").with_variant(Some(ForecastCategory::Hourly)),
            12.0,
        );

        assert_eq!(table.get(&CacheKey::new("1")), Some(10.0));
        assert_eq!(
            table.get(&CacheKey::new("1").with_variant(Some(ForecastCategory::Hourly))),
            Some(12.0)
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_reach_drops_all_variants() {
        let mut table = MemoTable::new("current_flow", UnitSensitivity::Sensitive);
        table.insert(CacheKey::new("1"), 1);
        table.insert(CacheKey::new("1").with_variant(Some("x")), 2);
        table.insert(CacheKey::new("2"), 3);

        table.remove_reach("1");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&CacheKey::new("2")), Some(3));
    }

    #[test]
    fn test_clear_if_unit_sensitive() {
        let mut flows = MemoTable::new("current_flow", UnitSensitivity::Sensitive);
        let mut locations = MemoTable::new("location", UnitSensitivity::Insensitive);
        flows.insert(CacheKey::new("1"), 1.0);
        locations.insert(CacheKey::new("1"), "Bend, OR".to_string());

        assert!(flows.clear_if_unit_sensitive());
        assert!(!locations.clear_if_unit_sensitive());
        assert!(flows.is_empty());
        assert_eq!(locations.len(), 1);
    }
}
