//! Command-line surface: one positional trace file, then any number of
//! `key=value` configuration overrides.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a trace file (`index\t0xADDR\tR|W` lines).
    pub trace_file: String,

    /// Configuration overrides, e.g. `swap_policy=SmartSwap fast_block=2`.
    pub overrides: Vec<String>,
}
