use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::models::CachedReach;
use crate::services::{LocalStore, ReachCache};

/// Default age after which a cached reach record is ignored.
/// Return periods are recomputed rarely, so a month is plenty fresh.
pub const DEFAULT_REACH_STALE_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn is_older_than_days(&self, days: i64) -> bool {
        self.age_minutes() > days * 24 * 60
    }
}

/// JSON-file storage under a single directory.
///
/// Implements [`LocalStore`] (one file per key) and [`ReachCache`]
/// (one `reach_<id>.json` file per reach).
pub struct CacheManager {
    cache_dir: PathBuf,
    reach_stale_days: i64,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir: {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            reach_stale_days: DEFAULT_REACH_STALE_DAYS,
        })
    }

    /// Open the cache directory named by `config` with its staleness limit.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.cache_dir()?)?.with_reach_stale_days(config.reach_cache_stale_days))
    }

    pub fn with_reach_stale_days(mut self, days: i64) -> Self {
        self.reach_stale_days = days;
        self
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", sanitize_name(name)))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    fn reach_name(reach_id: &str) -> String {
        format!("reach_{}", reach_id)
    }
}

/// Keep keys usable as file names on every platform.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl LocalStore for CacheManager {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load::<String>(key)?.map(|cached| cached.data))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.save(key, &value)
    }
}

impl ReachCache for CacheManager {
    fn get(&self, reach_id: &str) -> Result<Option<CachedReach>> {
        let name = Self::reach_name(reach_id);
        match self.load::<CachedReach>(&name)? {
            Some(cached) if cached.is_older_than_days(self.reach_stale_days) => {
                debug!(reach_id, age_minutes = cached.age_minutes(), "Cached reach is stale");
                Ok(None)
            }
            Some(cached) => Ok(Some(cached.data)),
            None => Ok(None),
        }
    }

    fn store(&self, reach: &CachedReach) -> Result<()> {
        let name = Self::reach_name(&reach.reach_id);
        // Merge onto whatever is on disk, stale or not
        let merged = match self.load::<CachedReach>(&name) {
            Ok(Some(existing)) => {
                let mut merged = existing.data;
                merged.merge(reach.clone());
                merged
            }
            Ok(None) => reach.clone(),
            Err(e) => {
                debug!(reach_id = %reach.reach_id, error = %e, "Replacing unreadable reach cache");
                reach.clone()
            }
        };
        self.save(&name, &merged)
    }
}

// ============================================================================
// Tests
// ============================================================================
