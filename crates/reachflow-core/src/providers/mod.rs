//! Stateful providers the presentation layer reads from.
//!
//! - `ReachDataProvider`: phased loading of the displayed reach
//! - `FavoritesProvider`: the favorites list, custom overlays and flow
//!   refreshes
//!
//! Both register with [`crate::units::UnitSettings`] so a unit change drops
//! their flow-dependent values in the same step.

pub mod favorites;
pub mod reach;

pub use favorites::{FavoritesDeps, FavoritesProvider, RefreshSummary};
pub use reach::ReachDataProvider;
