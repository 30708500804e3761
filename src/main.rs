#[macro_use]
extern crate log;

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use clap::Parser;

use flatmem_sim::{read_events, Args, Config, FlatController};

pub fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::default();
    config
        .apply_overrides(args.overrides.iter().map(String::as_str))
        .context("invalid configuration override")?;
    for (key, value) in config.sorted_fields() {
        info!("config: {key} = {value}");
    }

    let trace_file = File::open(&args.trace_file)
        .with_context(|| format!("failed to open trace file `{}`", args.trace_file))?;
    let reader = BufReader::new(trace_file);

    let mut controller = FlatController::new(config);
    for mut event in read_events(reader) {
        controller.access(&mut event);
    }

    println!("{}", controller.snapshot());
    Ok(())
}
