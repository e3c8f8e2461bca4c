//! Reachflow core library.
//!
//! Data orchestration for a river-flow app: progressive forecast loading for
//! the displayed reach, the user's favorites with background flow refreshes,
//! and unit-aware caching of everything derived from flow values.
//!
//! Network and storage access are behind the traits in [`services`]; apps
//! supply implementations and observe changes through each provider's
//! `subscribe()` receiver.

use std::sync::{Mutex, MutexGuard};

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod providers;
pub mod services;
pub mod units;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, RefreshTiming};
pub use error::{ReachflowError, Result};
pub use providers::{FavoritesDeps, FavoritesProvider, ReachDataProvider, RefreshSummary};
pub use units::{UnitSensitive, UnitSettings};

/// Lock a mutex, recovering the data if another thread panicked while
/// holding it. Provider state stays usable after a failed task.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
