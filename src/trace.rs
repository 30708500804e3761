//! Trace reader: the only collaborator the flat-memory core depends on.
//!
//! Accepts the tab-separated `index\t0xADDR\tW` format used throughout this
//! tool's lineage (see `main.py`, `tracegen.py`, `trace_in_set1.py`).
//! Malformed lines are logged and skipped; only I/O failure on the
//! underlying reader is fatal.

use std::io::BufRead;

use crate::event::MemEvent;

/// One parsed trace record, before it becomes a `MemEvent` with a live cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub index: u64,
    pub p_addr: u64,
    pub is_write: bool,
}

fn parse_line(line: &str) -> Option<TraceRecord> {
    let mut fields = line.split('\t');
    let index = fields.next()?.trim().parse::<u64>().ok()?;
    let addr_field = fields.next()?.trim();
    let p_addr = u64::from_str_radix(addr_field.strip_prefix("0x")?, 16).ok()?;
    let write_field = fields.next()?.trim();
    let is_write = match u32::from_str_radix(write_field, 16).ok()? {
        0 => false,
        1 => true,
        _ => return None,
    };
    Some(TraceRecord {
        index,
        p_addr,
        is_write,
    })
}

/// Reads trace records from `reader`, skipping and logging malformed lines.
///
/// Events are constructed with `current_cycle = 0`; the controller is the
/// sole owner of cycle continuity across events (mirroring `main.py`, which
/// always builds `MemEvent(addr, is_write, 0)` and relies on the controller
/// to carry timing state forward).
pub fn read_events<R: BufRead>(reader: R) -> impl Iterator<Item = MemEvent> {
    reader.lines().enumerate().filter_map(|(line_no, line)| {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("trace line {}: I/O error: {err}", line_no + 1);
                return None;
            }
        };
        if line.trim().is_empty() {
            return None;
        }
        match parse_line(&line) {
            Some(record) => Some(MemEvent::new(record.p_addr, record.is_write, 0)),
            None => {
                warn!("trace line {}: malformed, skipping: {line:?}", line_no + 1);
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_well_formed_lines() {
        let record = parse_line("0\t0x1000\t1").unwrap();
        assert_eq!(record.index, 0);
        assert_eq!(record.p_addr, 0x1000);
        assert!(record.is_write);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("not a trace line").is_none());
        assert!(parse_line("0\t1000\t1").is_none()); // missing 0x prefix
        assert!(parse_line("0\t0x1000\t9").is_none()); // bad write digit
    }

    #[test]
    fn skips_malformed_and_keeps_going() {
        let input = "0\t0x1000\t0\nbroken\n1\t0x2000\t1\n";
        let events: Vec<_> = read_events(Cursor::new(input)).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].p_addr, 0x1000);
        assert_eq!(events[1].p_addr, 0x2000);
        assert!(events[1].is_write);
    }
}
