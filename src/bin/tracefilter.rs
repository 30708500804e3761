//! Filters a trace down to the accesses that fall in one set, logging a
//! histogram of how many accesses landed in each set id along the way.

#[macro_use]
extern crate log;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;

use flatmem_sim::constants::{extract_bits, ADDR_SET_BITS, ADDR_SET_LOW};

#[derive(Parser, Debug)]
#[command(author, version, about = "Filter a trace down to one set", long_about = None)]
struct Args {
    /// Path to the source trace.
    trace_input: String,

    /// Path to write the filtered trace to.
    trace_output: String,

    /// Set id to keep; every other set's accesses are dropped.
    #[arg(long, default_value_t = 0)]
    set_id: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let input = File::open(&args.trace_input)
        .with_context(|| format!("failed to open `{}`", args.trace_input))?;
    let output = File::create(&args.trace_output)
        .with_context(|| format!("failed to create `{}`", args.trace_output))?;
    let mut writer = BufWriter::new(output);

    let mut set_histogram: Vec<u64> = Vec::new();
    let mut kept = 0u64;

    for (line_no, line) in BufReader::new(input).lines().enumerate() {
        let line = line.with_context(|| format!("I/O error reading `{}`", args.trace_input))?;
        let mut fields = line.split('\t');
        let (Some(index_field), Some(addr_field), Some(write_field)) = (fields.next(), fields.next(), fields.next())
        else {
            warn!("line {}: malformed, skipping: {line:?}", line_no + 1);
            continue;
        };
        let Some(addr) = addr_field.trim().strip_prefix("0x").and_then(|hex| u64::from_str_radix(hex, 16).ok())
        else {
            warn!("line {}: bad address, skipping: {line:?}", line_no + 1);
            continue;
        };
        let set_i = extract_bits(addr, ADDR_SET_LOW, ADDR_SET_BITS) as usize;
        if set_i >= set_histogram.len() {
            set_histogram.resize(set_i + 1, 0);
        }
        set_histogram[set_i] += 1;

        if set_i as u64 == args.set_id {
            writeln!(writer, "{kept}\t{addr:#x}\t{}", write_field.trim())?;
            kept += 1;
        }
        let _ = index_field;
    }
    writer.flush()?;

    info!("per-set access histogram: {set_histogram:?}");
    info!("kept {kept} accesses for set {}", args.set_id);
    Ok(())
}
