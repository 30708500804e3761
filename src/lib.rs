#[macro_use]
extern crate log;

mod cli;
mod config;
pub mod constants;
mod event;
mod simulate;
mod trace;

pub use crate::cli::Args;
pub use crate::config::{BypassPolicy, Config, ReplPolicy, SwapPolicy};
pub use crate::event::MemEvent;
pub use crate::simulate::{FlatController, FlatMemory, MetaCache, StatsSnapshot, Tier};
pub use crate::trace::{read_events, TraceRecord};
