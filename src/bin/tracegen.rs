//! Generates a synthetic trace confined to one set, for exercising the
//! swap policies without a real workload capture.

#[macro_use]
extern crate log;

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;

use flatmem_sim::constants::make_address;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a synthetic single-set memory trace", long_about = None)]
struct Args {
    /// Path to write the generated trace to.
    trace_output: String,

    /// Number of accesses to generate.
    #[arg(long, default_value_t = 200)]
    n_access: u64,

    /// Set id every generated address falls into.
    #[arg(long, default_value_t = 1)]
    set_id: u64,

    /// Inclusive upper bound on the randomly chosen region (0..=max_region).
    #[arg(long, default_value_t = 8)]
    max_region: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = File::create(&args.trace_output)
        .with_context(|| format!("failed to create `{}`", args.trace_output))?;
    let mut writer = BufWriter::new(file);
    let mut rng = rand::thread_rng();

    for index in 0..args.n_access {
        let region = rng.gen_range(0..=args.max_region);
        let is_write = rng.gen_range(0..=1u32);
        let addr = make_address(args.set_id, region, 0);
        writeln!(writer, "{index}\t{addr:#x}\t{is_write:x}")?;
    }
    writer.flush()?;
    info!("wrote {} accesses to {}", args.n_access, args.trace_output);
    Ok(())
}
