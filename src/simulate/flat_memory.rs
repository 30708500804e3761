//! Owns both tiers and the page-granularity translation table between them.

use std::collections::HashMap;

use crate::config::Config;
use crate::constants::{extract_bits, ADDR_OFFSET_BITS, ADDR_PAGE_BITS, ADDR_PAGE_LOW, ADDR_REGION_BITS, ADDR_REGION_LOW};
use crate::event::MemEvent;
use crate::simulate::tier::Tier;

/// The flat, two-tier memory: a fast pool, a slow pool, and the partial
/// physical-page → machine-page map between them.
///
/// Invariant: a physical page absent from `trans_table` is identity-mapped
/// to itself, and no entry is ever stored where key == value (see
/// `table_set`). This keeps the table bounded and gives `translate_inverse`
/// an unambiguous absent case.
pub struct FlatMemory {
    pub fast: Tier,
    pub slow: Tier,
    pub fast_block: u64,
    pub next_available_cycle: u64,
    pub trans_table_read_latency: u64,
    pub cached_fast_trans_count: u64,
    pub uncached_fast_trans_count: u64,
    trans_table: HashMap<u64, u64>,
}

impl FlatMemory {
    pub fn new(config: &Config) -> Self {
        FlatMemory {
            fast: Tier::new("fastmem", config.fast_cap, config.fast_read_lat, config.fast_write_lat),
            slow: Tier::new("slowmem", config.slow_cap, config.slow_read_lat, config.slow_write_lat),
            fast_block: config.fast_block,
            next_available_cycle: 0,
            trans_table_read_latency: config.fast_read_lat,
            cached_fast_trans_count: 0,
            uncached_fast_trans_count: 0,
            trans_table: HashMap::new(),
        }
    }

    fn region_of_page(&self, page: u64) -> u64 {
        extract_bits(page, ADDR_REGION_LOW - ADDR_PAGE_LOW, ADDR_REGION_BITS)
    }

    fn region_of_addr(&self, addr: u64) -> u64 {
        extract_bits(addr, ADDR_REGION_LOW, ADDR_REGION_BITS)
    }

    /// True iff a machine-page's region classifies it into the fast tier.
    pub fn page_in_fast(&self, m_page: u64) -> bool {
        self.region_of_page(m_page) < self.fast_block
    }

    /// True iff a machine-address's region classifies it into the fast tier.
    pub fn addr_in_fast(&self, m_addr: u64) -> bool {
        self.region_of_addr(m_addr) < self.fast_block
    }

    /// True iff `p_addr`, after translation, lands in the fast tier.
    pub fn paddr_in_fast(&self, p_addr: u64) -> bool {
        let p_page = extract_bits(p_addr, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
        let m_page = *self.trans_table.get(&p_page).unwrap_or(&p_page);
        self.page_in_fast(m_page)
    }

    /// True iff `p_page`, after translation, lands in the fast tier.
    pub fn ppage_in_fast(&self, p_page: u64) -> bool {
        let m_page = *self.trans_table.get(&p_page).unwrap_or(&p_page);
        self.page_in_fast(m_page)
    }

    /// Translates a physical address to its machine address.
    pub fn translate(&self, p_addr: u64) -> u64 {
        let p_page = extract_bits(p_addr, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
        let offset = extract_bits(p_addr, 0, ADDR_OFFSET_BITS);
        let m_page = *self.trans_table.get(&p_page).unwrap_or(&p_page);
        (m_page << ADDR_PAGE_LOW) | offset
    }

    /// Finds the physical page that currently maps to `m_page`. Since
    /// identity entries are never stored, a page absent from the table is
    /// unambiguously its own inverse.
    pub fn translate_page_inverse(&self, m_page: u64) -> u64 {
        if !self.trans_table.contains_key(&m_page) {
            return m_page;
        }
        for (&p_page_i, &m_page_i) in self.trans_table.iter() {
            if m_page_i == m_page {
                return p_page_i;
            }
        }
        // A well-formed table cannot reach this: `m_page` is a *key* (so some
        // entry maps *to* it as a value would be needed for the 2-cycle
        // invariant this function is used to maintain), but no entry's value
        // equals it. See SPEC_FULL.md open-questions: this is an internal
        // invariant violation, not a reachable run-time state.
        unreachable!("translation table entry for {m_page:#x} has no matching inverse");
    }

    /// Re-synchronizes both tiers (and self) to the later of their two
    /// next-available cycles: a serialized timing model, not an interleaved
    /// one.
    pub fn sync_cycle(&mut self) {
        self.next_available_cycle = self.fast.next_available_cycle.max(self.slow.next_available_cycle);
        self.fast.next_available_cycle = self.next_available_cycle;
        self.slow.next_available_cycle = self.next_available_cycle;
    }

    /// Charges `delta` cycles to one tier without re-synchronizing the
    /// other. Used to bill translation-cache misses to the fast tier.
    pub fn advance_cycle(&mut self, is_fast: bool, delta: u64) {
        let tier = if is_fast { &mut self.fast } else { &mut self.slow };
        tier.next_available_cycle = tier.next_available_cycle.max(self.next_available_cycle) + delta;
        tier.busy_cycles += delta;
        self.next_available_cycle = self.fast.next_available_cycle.max(self.slow.next_available_cycle);
    }

    /// Mutates the translation table, canonicalizing identity entries away.
    /// Every table mutation in the crate routes through this method so the
    /// "no identity entries stored" invariant cannot be bypassed.
    pub fn table_set(&mut self, p_page: u64, m_page: u64) {
        if p_page == m_page {
            self.trans_table.remove(&p_page);
        } else {
            self.trans_table.insert(p_page, m_page);
        }
    }

    pub fn table_remove(&mut self, p_page: u64) {
        self.trans_table.remove(&p_page);
    }

    pub fn table_len(&self) -> usize {
        self.trans_table.len()
    }

    #[cfg(test)]
    pub fn table_get(&self, p_page: u64) -> Option<u64> {
        self.trans_table.get(&p_page).copied()
    }

    /// Routes `event` through translation and into whichever tier its
    /// machine address lands in, then re-synchronizes.
    pub fn request(&mut self, event: &mut MemEvent) {
        event.m_addr = self.translate(event.p_addr);
        if self.addr_in_fast(event.m_addr) {
            self.fast.request(event);
        } else {
            self.slow.request(event);
        }
        self.sync_cycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_memory() -> FlatMemory {
        let config = Config {
            fast_cap: 0x12000,
            slow_cap: 0x16000,
            fast_read_lat: 1,
            fast_write_lat: 1,
            slow_read_lat: 2,
            slow_write_lat: 2,
            fast_block: 2,
            ..Config::default()
        };
        FlatMemory::new(&config)
    }

    #[test]
    fn identity_entries_are_never_stored() {
        let mut mem = test_memory();
        mem.table_set(5, 7);
        assert_eq!(mem.table_len(), 1);
        mem.table_set(5, 5);
        assert_eq!(mem.table_len(), 0);
    }

    #[test]
    fn table_set_identity_equivalent_to_remove() {
        let mut mem = test_memory();
        mem.table_set(9, 2);
        mem.table_remove(9);
        assert_eq!(mem.table_get(9), None);

        mem.table_set(9, 2);
        mem.table_set(9, 9);
        assert_eq!(mem.table_get(9), None);
    }

    #[test]
    fn absent_page_translates_identity() {
        let mem = test_memory();
        assert_eq!(mem.translate(0x3042), 0x3042);
    }

    #[test]
    fn translate_inverse_of_unswapped_page_is_itself() {
        let mem = test_memory();
        assert_eq!(mem.translate_page_inverse(7), 7);
    }

    #[test]
    fn sync_cycle_equalizes_both_tiers() {
        let mut mem = test_memory();
        mem.fast.next_available_cycle = 5;
        mem.slow.next_available_cycle = 2;
        mem.sync_cycle();
        assert_eq!(mem.fast.next_available_cycle, 5);
        assert_eq!(mem.slow.next_available_cycle, 5);
        assert_eq!(mem.next_available_cycle, 5);
    }

    #[test]
    fn scenario_single_fast_read() {
        // Scenario 1 from SPEC_FULL.md §8: region 0 is fast at fast_block=2.
        let mut mem = test_memory();
        let mut event = MemEvent::new(0x0000, false, 0);
        mem.request(&mut event);
        assert_eq!(mem.fast.access_count, 1);
        assert_eq!(mem.slow.access_count, 0);
    }

    #[test]
    fn request_routes_slow_region_to_slow_tier() {
        let mut mem = test_memory();
        // region 3 is >= fast_block(2), so it is slow.
        let mut event = MemEvent::new(0x03000, false, 0);
        mem.request(&mut event);
        assert_eq!(mem.slow.access_count, 1);
        assert_eq!(mem.fast.access_count, 0);
    }
}
