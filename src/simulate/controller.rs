//! The simulation driver: tracks per-set hotness, decides when to migrate a
//! page between tiers, and carries out the chosen swap policy's exchange.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;

use crate::config::{BypassPolicy, Config, ReplPolicy, SwapPolicy};
use crate::constants::{extract_bits, make_address, ADDR_PAGE_BITS, ADDR_PAGE_LOW, ADDR_SET_BITS, ADDR_SET_LOW};
use crate::event::MemEvent;
use crate::simulate::flat_memory::FlatMemory;
use crate::simulate::meta_cache::MetaCache;
use crate::simulate::smart_swap::SmartSwapPlanner;

/// Drives one simulation: one `FlatMemory`, one `MetaCache` per set touched
/// so far, and the swap-policy bookkeeping needed to report counts at the end
/// of a run.
pub struct FlatController {
    pub config: Config,
    pub flatmem: FlatMemory,
    metasets: HashMap<u64, MetaCache>,
    pub access_count: u64,
    next_available_cycle: u64,
    fast_swap_count: u64,
    slow_swap_count: u64,
    smart_swap_repl_count: u64,
    smart_swap_restore_count: u64,
}

impl FlatController {
    pub fn new(config: Config) -> Self {
        let flatmem = FlatMemory::new(&config);
        FlatController {
            flatmem,
            config,
            metasets: HashMap::new(),
            access_count: 0,
            next_available_cycle: 0,
            fast_swap_count: 0,
            slow_swap_count: 0,
            smart_swap_repl_count: 0,
            smart_swap_restore_count: 0,
        }
    }

    /// Services one event end to end: hotness tracking, translation-cache
    /// probe, the actual tier request, and the post-access migration check.
    pub fn access(&mut self, event: &mut MemEvent) {
        self.access_count += 1;
        let set_id = extract_bits(event.p_addr, ADDR_SET_LOW, ADDR_SET_BITS);
        let trans_cache_capacity = self.config.trans_cache_capacity as usize;
        let repl_policy = self.config.repl_policy;
        let meta = self
            .metasets
            .entry(set_id)
            .or_insert_with(|| MetaCache::new(set_id, trans_cache_capacity));
        meta.track_hotness(event, repl_policy);
        meta.access_trans_cache(event.p_addr, &mut self.flatmem);

        self.flatmem.request(event);
        self.sync_cycle();
        self.post_access(event);
    }

    fn sync_cycle(&mut self) {
        self.flatmem.sync_cycle();
        self.next_available_cycle = self.next_available_cycle.max(self.flatmem.next_available_cycle);
    }

    /// Whether the just-serviced `event` should trigger a migration attempt.
    /// Under `Probability`, the roll is independent of which tier served the
    /// event: a miss on the roll suppresses migration even for a slow-tier
    /// access.
    fn trig_monitor(&self, event: &MemEvent) -> bool {
        let in_fast = self.flatmem.paddr_in_fast(event.p_addr);
        match self.config.bypass_policy {
            BypassPolicy::Never => !in_fast,
            BypassPolicy::Probability => {
                if rand::thread_rng().gen::<f64>() > self.config.bypass_probability {
                    false
                } else {
                    !in_fast
                }
            }
        }
    }

    fn post_access(&mut self, event: &MemEvent) {
        let set_id = extract_bits(event.p_addr, ADDR_SET_LOW, ADDR_SET_BITS);
        if !self.trig_monitor(event) {
            return;
        }
        let victim_region = self
            .metasets
            .get(&set_id)
            .and_then(|meta| meta.find_victim(&self.flatmem));
        if let Some(victim_region) = victim_region {
            let p_address = event.p_addr;
            let victim_p_address = make_address(set_id, victim_region, 0);
            self.start_migration(victim_p_address, p_address, self.config.swap_policy);
        }
    }

    fn access_trans_cache(&mut self, set_id: u64, p_addr: u64) -> u64 {
        let meta = self
            .metasets
            .get_mut(&set_id)
            .expect("migration source set must already have a MetaCache");
        meta.access_trans_cache(p_addr, &mut self.flatmem)
    }

    /// Runs the four-event migration sequence shared by every swap policy:
    /// read both sides, then write both sides, so each page's data lands at
    /// its new machine address before the translation table is flipped.
    fn gen_swap_event(&mut self, p_addr1: u64, p_addr2: u64) {
        let cycle = self.next_available_cycle;
        for (addr, is_write) in [(p_addr1, false), (p_addr2, false), (p_addr1, true), (p_addr2, true)] {
            let mut event = MemEvent::migration(addr, is_write, cycle);
            self.flatmem.request(&mut event);
            self.flatmem.sync_cycle();
        }
    }

    /// `p_addr1` is the victim (fast-resident), `p_addr2` the challenger
    /// (slow-resident); exactly one must currently be fast.
    fn start_migration(&mut self, p_addr1: u64, p_addr2: u64, swap_policy: SwapPolicy) {
        let in_fast_1 = self.flatmem.paddr_in_fast(p_addr1);
        let in_fast_2 = self.flatmem.paddr_in_fast(p_addr2);
        assert!(
            in_fast_1 != in_fast_2,
            "start_migration requires exactly one of the two addresses to be fast-resident"
        );
        let p_page1 = extract_bits(p_addr1, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
        let p_page2 = extract_bits(p_addr2, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
        let set_id = extract_bits(p_addr1, ADDR_SET_LOW, ADDR_SET_BITS);

        match swap_policy {
            SwapPolicy::FastSwap => {
                self.gen_swap_event(p_addr1, p_addr2);
                self.fast_swap_count += 1;
                let m_addr1 = self.access_trans_cache(set_id, p_addr1);
                let m_addr2 = self.access_trans_cache(set_id, p_addr2);
                let m_page1 = extract_bits(m_addr1, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                let m_page2 = extract_bits(m_addr2, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                self.flatmem.table_set(p_page1, m_page2);
                self.flatmem.table_set(p_page2, m_page1);
            }
            SwapPolicy::SlowSwap => {
                let mut p_addr1 = p_addr1;
                let mut p_page1 = p_page1;
                // If the challenger's machine address is itself fast (i.e.
                // it was already swapped in once), swap that prior resident
                // back out first.
                if self.flatmem.addr_in_fast(p_addr2) {
                    p_addr1 = self.access_trans_cache(set_id, p_addr2);
                    p_page1 = extract_bits(p_addr1, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                }
                let m_addr1 = self.access_trans_cache(set_id, p_addr1);
                let m_page1 = extract_bits(m_addr1, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                if p_addr1 != m_addr1 {
                    self.slow_swap_count += 1;
                    self.gen_swap_event(p_addr1, m_addr1);
                    self.flatmem.table_set(p_page1, p_page1);
                    self.flatmem.table_set(m_page1, m_page1);
                }
                self.slow_swap_count += 1;
                self.gen_swap_event(m_addr1, p_addr2);
                self.flatmem.table_set(p_page2, m_page1);
                self.flatmem.table_set(m_page1, p_page2);
                // Every slow-swap migration is a 2-node circle: swapping
                // always touches table entries in pairs.
                assert_eq!(self.flatmem.table_len() % 2, 0, "slow-swap table must stay even-sized");
            }
            SwapPolicy::SmartSwap => {
                let mut iteration_count = 0;
                let mut swap_history: Vec<(u64, u64)> = Vec::new();
                loop {
                    if iteration_count > 10 {
                        warn!("smart-swap: set {set_id} exceeded 10 migration iterations, stopping");
                        break;
                    }
                    let rank_list = self
                        .metasets
                        .get(&set_id)
                        .expect("migration source set must already have a MetaCache")
                        .hotness_rank();
                    let planner = SmartSwapPlanner::new(rank_list, &self.flatmem, set_id);
                    let repl = planner.repl_util();
                    let restore = planner.best_restore_choice(&self.flatmem);
                    let repl_util = repl.map_or(f64::NEG_INFINITY, |(util, _, _)| util);
                    let restore_util = restore.map_or(f64::NEG_INFINITY, |(util, _, _)| util);
                    if repl_util.max(restore_util) <= 0.0 {
                        break;
                    }
                    let (swap_region1, swap_region2) = if repl_util > restore_util {
                        self.smart_swap_repl_count += 1;
                        let (_, src, dst) = repl.unwrap();
                        (src, dst)
                    } else {
                        self.smart_swap_restore_count += 1;
                        let (_, src, dst) = restore.unwrap();
                        (src, dst)
                    };
                    let swap_paddr1 = make_address(set_id, swap_region1, 0);
                    let swap_paddr2 = make_address(set_id, swap_region2, 0);
                    if swap_history.contains(&(swap_paddr1, swap_paddr2)) {
                        break;
                    }
                    let m_addr1 = self.access_trans_cache(set_id, swap_paddr1);
                    let m_addr2 = self.access_trans_cache(set_id, swap_paddr2);
                    let m_page1 = extract_bits(m_addr1, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                    let m_page2 = extract_bits(m_addr2, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                    let swap_page1 = extract_bits(swap_paddr1, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                    let swap_page2 = extract_bits(swap_paddr2, ADDR_PAGE_LOW, ADDR_PAGE_BITS);
                    swap_history.push((swap_paddr1, swap_paddr2));
                    self.gen_swap_event(swap_paddr1, swap_paddr2);
                    iteration_count += 1;
                    self.flatmem.table_set(swap_page1, m_page2);
                    self.flatmem.table_set(swap_page2, m_page1);
                }
            }
            SwapPolicy::NoSwap => {}
        }
        self.sync_cycle();
    }

    /// Captures the counters relevant to the run's configured swap policy
    /// into a snapshot safe to print after the trace is exhausted.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            swap_policy: self.config.swap_policy,
            fast_swap_count: matches!(self.config.swap_policy, SwapPolicy::FastSwap).then_some(self.fast_swap_count),
            slow_swap_count: matches!(self.config.swap_policy, SwapPolicy::SlowSwap).then_some(self.slow_swap_count),
            smart_swap_repl_count: matches!(self.config.swap_policy, SwapPolicy::SmartSwap)
                .then_some(self.smart_swap_repl_count),
            smart_swap_restore_count: matches!(self.config.swap_policy, SwapPolicy::SmartSwap)
                .then_some(self.smart_swap_restore_count),
            bypass_policy: self.config.bypass_policy,
            bypass_probability: matches!(self.config.bypass_policy, BypassPolicy::Probability)
                .then_some(self.config.bypass_probability),
            fast_busy_cycles: self.flatmem.fast.busy_cycles,
            slow_busy_cycles: self.flatmem.slow.busy_cycles,
            next_available_cycle: self.next_available_cycle,
            cached_fast_trans_count: self.flatmem.cached_fast_trans_count,
            uncached_fast_trans_count: self.flatmem.uncached_fast_trans_count,
            fast_access_count: self.flatmem.fast.access_count,
            slow_access_count: self.flatmem.slow.access_count,
        }
    }
}

/// End-of-run statistics, mirroring the original's `showstats` output.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub swap_policy: SwapPolicy,
    pub fast_swap_count: Option<u64>,
    pub slow_swap_count: Option<u64>,
    pub smart_swap_repl_count: Option<u64>,
    pub smart_swap_restore_count: Option<u64>,
    pub bypass_policy: BypassPolicy,
    pub bypass_probability: Option<f64>,
    pub fast_busy_cycles: u64,
    pub slow_busy_cycles: u64,
    pub next_available_cycle: u64,
    pub cached_fast_trans_count: u64,
    pub uncached_fast_trans_count: u64,
    pub fast_access_count: u64,
    pub slow_access_count: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "display all statistics")?;
        match self.swap_policy {
            SwapPolicy::SmartSwap => writeln!(
                f,
                "smartswap count repl:{} restore:{}",
                self.smart_swap_repl_count.unwrap_or(0),
                self.smart_swap_restore_count.unwrap_or(0)
            )?,
            SwapPolicy::FastSwap => writeln!(f, "fastswap count {}", self.fast_swap_count.unwrap_or(0))?,
            SwapPolicy::SlowSwap => writeln!(f, "slowswap count {}", self.slow_swap_count.unwrap_or(0))?,
            SwapPolicy::NoSwap => {}
        }
        if let Some(probability) = self.bypass_probability {
            writeln!(f, "bypass probability: {probability:.2}")?;
        }
        writeln!(
            f,
            "fast cycle:{} slow cycle:{} flat cycle:{}",
            self.fast_busy_cycles, self.slow_busy_cycles, self.next_available_cycle
        )?;
        let trans_total = self.cached_fast_trans_count + self.uncached_fast_trans_count;
        if trans_total == 0 {
            writeln!(
                f,
                "cached fast trans:{} uncached fast trans:{} rate:n/a",
                self.cached_fast_trans_count, self.uncached_fast_trans_count
            )?;
        } else {
            writeln!(
                f,
                "cached fast trans:{} uncached fast trans:{} rate:{:.2}",
                self.cached_fast_trans_count,
                self.uncached_fast_trans_count,
                self.cached_fast_trans_count as f64 / trans_total as f64
            )?;
        }
        let access_total = self.fast_access_count + self.slow_access_count;
        if access_total == 0 {
            write!(
                f,
                "fast access:{} slow access:{} hitrate:n/a",
                self.fast_access_count, self.slow_access_count
            )
        } else {
            write!(
                f,
                "fast access:{} slow access:{} hitrate:{:.2}",
                self.fast_access_count,
                self.slow_access_count,
                self.fast_access_count as f64 / access_total as f64
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(swap_policy: SwapPolicy) -> Config {
        Config {
            fast_cap: 0x3000,
            slow_cap: 0x13000,
            fast_block: 1,
            swap_policy,
            bypass_policy: BypassPolicy::Never,
            repl_policy: ReplPolicy::Lru,
            ..Config::default()
        }
    }

    #[test]
    fn no_swap_policy_never_migrates() {
        let mut controller = FlatController::new(test_config(SwapPolicy::NoSwap));
        let mut fast_event = MemEvent::new(0x0000, false, 0); // region 0, fast
        controller.access(&mut fast_event);
        let mut slow_event = MemEvent::new(0x1000, false, 0); // region 1, slow
        controller.access(&mut slow_event);
        assert_eq!(controller.flatmem.table_len(), 0);
    }

    #[test]
    fn fast_swap_exchanges_the_two_pages() {
        let mut controller = FlatController::new(test_config(SwapPolicy::FastSwap));
        let mut fast_event = MemEvent::new(0x0000, false, 0);
        controller.access(&mut fast_event);
        let mut slow_event = MemEvent::new(0x1000, false, 0);
        controller.access(&mut slow_event);
        assert_eq!(controller.fast_swap_count, 1);
        assert!(controller.flatmem.table_len() > 0);
        // The slow region (page 1) must now translate into the fast tier.
        assert!(controller.flatmem.paddr_in_fast(0x1000));
    }

    #[test]
    fn slow_swap_keeps_table_even_sized() {
        let mut controller = FlatController::new(test_config(SwapPolicy::SlowSwap));
        let mut fast_event = MemEvent::new(0x0000, false, 0);
        controller.access(&mut fast_event);
        let mut slow_event = MemEvent::new(0x1000, false, 0);
        controller.access(&mut slow_event);
        assert_eq!(controller.slow_swap_count, 1);
        assert_eq!(controller.flatmem.table_len() % 2, 0);
    }

    #[test]
    fn bypass_probability_zero_suppresses_migration() {
        let mut config = test_config(SwapPolicy::FastSwap);
        config.bypass_policy = BypassPolicy::Probability;
        config.bypass_probability = 0.0;
        let mut controller = FlatController::new(config);
        let mut fast_event = MemEvent::new(0x0000, false, 0);
        controller.access(&mut fast_event);
        for _ in 0..1000 {
            let mut slow_event = MemEvent::new(0x1000, false, 0);
            controller.access(&mut slow_event);
        }
        assert_eq!(controller.fast_swap_count, 0);
    }

    #[test]
    fn snapshot_reports_access_counts() {
        let mut controller = FlatController::new(test_config(SwapPolicy::NoSwap));
        let mut event = MemEvent::new(0x0000, false, 0);
        controller.access(&mut event);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.fast_access_count, 1);
        assert_eq!(snapshot.slow_access_count, 0);
        let rendered = snapshot.to_string();
        assert!(rendered.contains("fast access:1 slow access:0"));
    }
}
