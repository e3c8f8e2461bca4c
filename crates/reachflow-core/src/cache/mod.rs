//! Caching for derived values and on-device data.
//!
//! - `MemoTable` / `CacheKey`: in-memory memoization of values computed from
//!   forecast data, tagged by whether they depend on the flow unit
//! - `CacheManager`: JSON files for the custom-overlay maps and cached reach
//!   records (return periods)

pub mod computed;
pub mod manager;

pub use computed::{CacheKey, MemoTable, UnitSensitivity};
pub use manager::{CacheManager, CachedData};
