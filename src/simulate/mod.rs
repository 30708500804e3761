//! The simulated hybrid memory: tiers, translation, hotness tracking, and
//! the controller that ties them together.

pub mod controller;
pub mod flat_memory;
pub mod meta_cache;
pub mod smart_swap;
pub mod tier;

pub use controller::{FlatController, StatsSnapshot};
pub use flat_memory::FlatMemory;
pub use meta_cache::MetaCache;
pub use tier::Tier;
