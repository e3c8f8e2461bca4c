//! Flow unit preference and unit-change invalidation.
//!
//! Changing the unit is a distinguished event: every registered component
//! drops its unit-dependent cached values in the same step the unit flips,
//! then schedules its own repopulation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, Weak};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::lock;
use crate::models::FlowUnit;
use crate::services::UnitPreference;

/// A component holding values that depend on the active flow unit.
pub trait UnitSensitive: Send + Sync {
    /// Drop cached numeric flows and anything derived from them, then
    /// arrange for them to be repopulated in the new unit.
    fn clear_unit_dependent_caches(&self);
}

/// Process-wide flow unit preference.
///
/// When backed by a config file, every change is written to its
/// `flow_unit` field so the choice survives restarts.
pub struct UnitSettings {
    unit: RwLock<FlowUnit>,
    listeners: Mutex<Vec<Weak<dyn UnitSensitive>>>,
    config_file: Option<PathBuf>,
}

impl UnitSettings {
    /// In-memory preference, not persisted.
    pub fn new(unit: FlowUnit) -> Self {
        Self {
            unit: RwLock::new(unit),
            listeners: Mutex::new(Vec::new()),
            config_file: None,
        }
    }

    /// Start from the unit saved in the config at `path` and write changes
    /// back to it.
    pub fn from_config_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = Config::load_from(&path)?;
        debug!(unit = %config.flow_unit, path = %path.display(), "Loaded flow unit");
        Ok(Self {
            config_file: Some(path),
            ..Self::new(config.flow_unit)
        })
    }

    /// Backed by the default config file location.
    pub fn load_default() -> Result<Self> {
        Self::from_config_file(Config::config_path()?)
    }

    /// Register a component to be invalidated on unit changes. Only a weak
    /// reference is kept.
    pub fn register<T: UnitSensitive + 'static>(&self, listener: &Arc<T>) {
        let weak: Weak<dyn UnitSensitive> = Arc::downgrade(listener) as Weak<dyn UnitSensitive>;
        lock(&self.listeners).push(weak);
    }

    /// Switch units. Returns `false` when `unit` is already active.
    pub fn set_unit(&self, unit: FlowUnit) -> bool {
        {
            let mut current = self.unit.write().unwrap_or_else(|e| e.into_inner());
            if *current == unit {
                debug!(%unit, "Flow unit unchanged");
                return false;
            }
            *current = unit;
        }
        self.persist(unit);

        let listeners: Vec<Arc<dyn UnitSensitive>> = {
            let mut registered = lock(&self.listeners);
            registered.retain(|weak| weak.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };

        info!(%unit, listeners = listeners.len(), "Flow unit changed, invalidating caches");
        for listener in listeners {
            listener.clear_unit_dependent_caches();
        }
        true
    }
}

impl UnitSettings {
    /// Save `unit` into the backing config file, keeping its other fields.
    /// A failed write is logged; the in-memory unit stays switched.
    fn persist(&self, unit: FlowUnit) {
        let Some(path) = &self.config_file else {
            return;
        };
        let result = Config::load_from(path).and_then(|mut config| {
            config.flow_unit = unit;
            config.save_to(path)
        });
        if let Err(e) = result {
            warn!(%unit, path = %path.display(), error = %e, "Failed to save flow unit");
        }
    }
}

impl UnitPreference for UnitSettings {
    fn current_unit(&self) -> FlowUnit {
        *self.unit.read().unwrap_or_else(|e| e.into_inner())
    }
}
