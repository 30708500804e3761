//! The unit of work the controller consumes: one memory reference.

/// A single memory reference flowing through the flat-memory controller.
///
/// `p_addr` is the software-visible (physical) address the event carries in;
/// `m_addr` starts out equal to `p_addr` and is overwritten once the
/// controller has resolved it through the translation table. `current_cycle`
/// is updated in place by whichever tier services the request, so it reads
/// as a running timestamp rather than a fixed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemEvent {
    pub p_addr: u64,
    pub m_addr: u64,
    pub is_write: bool,
    pub current_cycle: u64,
    /// Set by the controller when this event is a synthetic half of a swap.
    /// Migration events never increment a tier's non-migration access counter.
    pub is_migration: bool,
}

impl MemEvent {
    pub fn new(p_addr: u64, is_write: bool, current_cycle: u64) -> Self {
        MemEvent {
            p_addr,
            m_addr: p_addr,
            is_write,
            current_cycle,
            is_migration: false,
        }
    }

    pub fn migration(p_addr: u64, is_write: bool, current_cycle: u64) -> Self {
        MemEvent {
            is_migration: true,
            ..MemEvent::new(p_addr, is_write, current_cycle)
        }
    }
}
