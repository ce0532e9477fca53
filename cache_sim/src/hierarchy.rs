//! L1 → victim cache → L2 → memory.

use std::fmt;

use thiserror::Error;

use crate::{
    accumulator::CacheStats,
    cache::{Block, Cache},
    common::{AccessKind, Addr, Level},
    config::{ConfigError, SimConfig},
    geometry::{CacheGeometry, DecodedAddr},
    timing::TimingModel,
    victim::VictimCache,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccessError {
    #[error("invalid access type {code:?}, expected 'r' or 'w'")]
    InvalidAccessType { code: char },
}

/// Where an access was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOutcome {
    pub kind: AccessKind,
    pub addr: Addr,
    pub served_by: Level,
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.addr, self.served_by)
    }
}

/// One simulation run. Write-back, write-allocate at both levels; the victim
/// cache holds blocks evicted from L1 and swaps them back on a hit.
pub struct CacheHierarchy {
    l1: Cache,
    victim: VictimCache,
    l2: Cache,
    timing: TimingModel,
    /// recycled L1-sized buffer; empty while it lives in the victim cache
    spare_line: Box<[u8]>,
    /// recycled L2-sized buffer for fills from memory
    spare_fill: Box<[u8]>,
}

impl CacheHierarchy {
    pub fn setup(cfg: &SimConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        log::info!("L1: {}", cfg.l1);
        log::info!("victim cache: {} entries", cfg.victim_entries);
        log::info!("L2: {}", cfg.l2);
        let timing = TimingModel::resolve(&cfg.timing, &cfg.l1, cfg.victim_entries, &cfg.l2);
        Ok(Self {
            l1: Cache::new(cfg.l1),
            victim: VictimCache::new(cfg.victim_entries, cfg.l1.block_bytes()),
            l2: Cache::new(cfg.l2),
            timing,
            spare_line: vec![0; cfg.l1.block_bytes()].into_boxed_slice(),
            spare_fill: vec![0; cfg.l2.block_bytes()].into_boxed_slice(),
        })
    }
    /// setup with the default timing constants.
    pub fn new(
        l1: CacheGeometry,
        victim_entries: usize,
        l2: CacheGeometry,
    ) -> Result<Self, ConfigError> {
        Self::setup(&SimConfig {
            l1,
            victim_entries,
            l2,
            ..Default::default()
        })
    }
    pub fn l1(&self) -> &Cache {
        &self.l1
    }
    pub fn victim(&self) -> &VictimCache {
        &self.victim
    }
    pub fn l2(&self) -> &Cache {
        &self.l2
    }
    pub fn timing(&self) -> &TimingModel {
        &self.timing
    }
    /// [`CacheHierarchy::access`] keyed by the raw trace code. Unknown codes
    /// are rejected before anything is counted.
    pub fn access_code(
        &mut self,
        code: u8,
        addr: u64,
        stats: &mut CacheStats,
    ) -> Result<AccessOutcome, AccessError> {
        let kind = AccessKind::try_from(code).map_err(|_| AccessError::InvalidAccessType {
            code: char::from(code),
        })?;
        Ok(self.access(kind, addr, stats))
    }
    pub fn access(&mut self, kind: AccessKind, addr: u64, stats: &mut CacheStats) -> AccessOutcome {
        let write = kind.is_write();
        stats.accesses += 1;
        if write {
            stats.writes += 1;
        } else {
            stats.reads += 1;
        }
        let served_by = self.access_inner(write, addr, stats);
        let outcome = AccessOutcome {
            kind,
            addr: Addr::new(addr),
            served_by,
        };
        log::trace!("{outcome}");
        outcome
    }
    fn access_inner(&mut self, write: bool, addr: u64, stats: &mut CacheStats) -> Level {
        let DecodedAddr { tag, index, .. } = self.l1.decompose(addr);
        if let Some(block) = self.l1.lookup(tag, index) {
            block.dirty |= write;
            return Level::L1;
        }
        if write {
            stats.write_misses_l1 += 1;
        } else {
            stats.read_misses_l1 += 1;
        }

        if self.victim.is_enabled() && self.swap_with_victim(addr, write) {
            stats.victim_hits += 1;
            stats.accesses_vc += 1;
            return Level::Victim;
        }

        let (data, served_by) = self.fetch_from_l2(write, addr, stats);
        let evicted = self.l1.install(tag, index, data, write);
        if evicted.valid {
            self.evict_from_l1(evicted, index, stats);
        } else {
            self.spare_line = evicted.data;
        }
        served_by
    }
    /// promotes the victim entry for `addr` into L1, parking the block L1
    /// evicts for it in the same victim slot.
    fn swap_with_victim(&mut self, addr: u64, write: bool) -> bool {
        let masks = *self.l1.masks();
        let DecodedAddr { tag, index, .. } = masks.decompose(addr);
        let l1 = &mut self.l1;
        self.victim.swap(masks.block_address(addr), |data, dirty| {
            let evicted = l1.install(tag, index, data, dirty || write);
            evicted.valid.then(|| {
                let block = masks.block_address(masks.compose(evicted.tag, index));
                log::debug!(
                    "L1 block {} swapped into victim cache",
                    Addr::new(masks.block_base(block))
                );
                (block, evicted.data, evicted.dirty)
            })
        })
    }
    /// the L1-sized part of the L2 block holding `addr`, filling L2 from
    /// memory first on a miss.
    fn fetch_from_l2(
        &mut self,
        write: bool,
        addr: u64,
        stats: &mut CacheStats,
    ) -> (Box<[u8]>, Level) {
        stats.accesses_l2 += 1;
        let mut line = self.take_line();
        let DecodedAddr { tag, index, .. } = self.l2.decompose(addr);
        let served_by = match self.l2.lookup(tag, index) {
            Some(block) => {
                copy_overlap(&mut line, &block.data, addr);
                Level::L2
            }
            None => {
                if write {
                    stats.write_misses_l2 += 1;
                } else {
                    stats.read_misses_l2 += 1;
                }
                // memory contents are not modeled
                let mut memory = std::mem::take(&mut self.spare_fill);
                memory.fill(0);
                let evicted = self.l2.install(tag, index, memory, false);
                if evicted.valid && evicted.dirty {
                    stats.write_back_l2 += 1;
                    log::debug!(
                        "L2 block {} written back to memory",
                        Addr::new(self.l2.masks().compose(evicted.tag, index))
                    );
                }
                self.spare_fill = evicted.data;
                Level::Memory
            }
        };
        (line, served_by)
    }
    /// a zeroed L1-sized buffer, recycled from an evicted block when one is spare.
    fn take_line(&mut self) -> Box<[u8]> {
        let mut line = std::mem::take(&mut self.spare_line);
        if line.is_empty() {
            return vec![0; self.l1.geometry().block_bytes()].into_boxed_slice();
        }
        line.fill(0);
        line
    }
    fn evict_from_l1(&mut self, evicted: Block, index: usize, stats: &mut CacheStats) {
        let masks = *self.l1.masks();
        let addr = masks.compose(evicted.tag, index);
        if self.victim.is_enabled() {
            let displaced =
                self.victim
                    .absorb(masks.block_address(addr), evicted.data, evicted.dirty);
            if let Some(displaced) = displaced {
                let addr = masks.block_base(displaced.tag);
                log::debug!("victim cache displaced {}", Addr::new(addr));
                if displaced.dirty {
                    stats.write_back_l1 += 1;
                    self.write_back(addr);
                }
                self.spare_line = displaced.data;
            }
        } else {
            if evicted.dirty {
                stats.write_back_l1 += 1;
                self.write_back(addr);
            }
            self.spare_line = evicted.data;
        }
    }
    /// writes an L1 block back. L2 is not inclusive, so only resident L2
    /// blocks are updated; the rest goes straight to memory.
    fn write_back(&mut self, addr: u64) {
        let span = self.l1.geometry().block_bytes() as u64;
        let step = self.l2.geometry().block_bytes();
        for off in (0..span).step_by(step) {
            let a = addr.wrapping_add(off);
            let DecodedAddr { tag, index, .. } = self.l2.decompose(a);
            if self.l2.mark_dirty(tag, index) {
                log::debug!("L1 block {} written back to L2", Addr::new(a));
            } else {
                log::debug!("L1 block {} written back to memory", Addr::new(a));
            }
        }
    }
    /// finalizes `stats` and releases the hierarchy.
    pub fn complete(self, stats: &mut CacheStats) {
        stats.finalize(&self.timing);
        log::info!(
            "simulation complete: {} accesses, average access time {:.4} ns",
            stats.accesses,
            stats.avg_access_time_l1
        );
    }
}

/// copies the overlapping window of two aligned power-of-two blocks around `addr`.
fn copy_overlap(dst: &mut [u8], src: &[u8], addr: u64) {
    if dst.len() <= src.len() {
        let start = (addr as usize) & (src.len() - 1) & !(dst.len() - 1);
        dst.copy_from_slice(&src[start..start + dst.len()]);
    } else {
        let start = (addr as usize) & (dst.len() - 1) & !(src.len() - 1);
        dst[start..start + src.len()].copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AccessKind::*;

    fn setup(c1: u32, b1: u32, s1: u32, v: usize, c2: u32, b2: u32, s2: u32) -> CacheHierarchy {
        CacheHierarchy::setup(&SimConfig::new(c1, b1, s1, v, c2, b2, s2)).unwrap()
    }

    fn run(h: &mut CacheHierarchy, trace: &[(AccessKind, u64)]) -> (CacheStats, Vec<Level>) {
        let mut stats = CacheStats::default();
        let served = trace
            .iter()
            .map(|&(k, a)| h.access(k, a, &mut stats).served_by)
            .collect();
        (stats, served)
    }

    fn victim_tags(h: &CacheHierarchy) -> Vec<u64> {
        h.victim().entries().map(|e| e.tag).collect()
    }

    #[test]
    fn test_cold_misses_then_hit() {
        let mut h = setup(4, 2, 1, 0, 6, 2, 2);
        let (stats, served) = run(&mut h, &[(Read, 0x0), (Read, 0x4), (Read, 0x0)]);
        assert_eq!(vec![Level::Memory, Level::Memory, Level::L1], served);
        assert_eq!(2, stats.read_misses_l1);
        assert_eq!(3, stats.reads);
        assert_eq!(2, stats.accesses_l2);
        assert_eq!(2, stats.read_misses_l2);
        assert_eq!(0, stats.accesses_vc);
    }

    #[test]
    fn test_victim_hit_after_conflict_eviction() {
        let mut h = setup(4, 2, 1, 1, 6, 2, 2);
        // 0x0, 0x8 and 0x10 share L1 set 0 (2 ways); 0x10 pushes 0x0 out
        let (stats, served) = run(
            &mut h,
            &[(Read, 0x0), (Read, 0x8), (Read, 0x10), (Read, 0x0)],
        );
        assert_eq!(Level::Victim, served[3]);
        assert_eq!(1, stats.victim_hits);
        assert_eq!(3, stats.accesses_l2);
        assert_eq!(stats.victim_hits, stats.accesses_vc);
        // 0x8 was the L1 LRU block and took the victim slot
        assert_eq!(vec![0x8 >> 2], victim_tags(&h));
        let d = h.l1().decompose(0x0);
        assert!(h.l1().probe(d.tag, d.index).is_some());
    }

    #[test]
    fn test_lru_cycling_without_victim_cache() {
        let mut h = setup(4, 2, 1, 0, 6, 2, 2);
        let trace: Vec<_> = [0x0, 0x8, 0x10].repeat(4).into_iter().map(|a| (Read, a)).collect();
        let (stats, served) = run(&mut h, &trace);
        assert!(served.iter().all(|l| *l != Level::L1));
        assert_eq!(12, stats.read_misses_l1);
        // the last access was 0x10, so 0x8 and 0x10 remain and 0x0 is gone
        let resident = |h: &CacheHierarchy, a: u64| {
            let d = h.l1().decompose(a);
            h.l1().probe(d.tag, d.index).is_some()
        };
        assert!(!resident(&h, 0x0));
        assert!(resident(&h, 0x8));
        assert!(resident(&h, 0x10));
        // only the cold misses reach memory
        assert_eq!(3, stats.read_misses_l2);
    }

    #[test]
    fn test_write_hit_sets_dirty() {
        let mut h = setup(4, 2, 1, 0, 6, 2, 2);
        let (stats, served) = run(&mut h, &[(Read, 0x0), (Write, 0x1)]);
        assert_eq!(Level::L1, served[1]);
        assert_eq!(1, stats.writes);
        assert_eq!(0, stats.write_misses_l1);
        let d = h.l1().decompose(0x0);
        assert!(h.l1().probe(d.tag, d.index).unwrap().dirty);
    }

    #[test]
    fn test_dirty_eviction_without_victim_cache() {
        // L1: 2 sets direct mapped, L2: 4 sets direct mapped
        let mut h = setup(3, 2, 0, 0, 4, 2, 0);
        let (stats, _) = run(&mut h, &[(Write, 0x0), (Read, 0x8)]);
        assert_eq!(1, stats.write_misses_l1);
        assert_eq!(1, stats.write_misses_l2);
        assert_eq!(1, stats.write_back_l1);
        let d = h.l2().decompose(0x0);
        assert!(h.l2().probe(d.tag, d.index).unwrap().dirty);

        // 0x10 conflicts with the now dirty 0x0 in L2
        let mut stats = stats;
        h.access(Read, 0x10, &mut stats);
        assert_eq!(1, stats.write_back_l1);
        assert_eq!(1, stats.write_back_l2);
    }

    #[test]
    fn test_clean_eviction_is_silent() {
        let mut h = setup(3, 2, 0, 0, 4, 2, 0);
        let (stats, _) = run(&mut h, &[(Read, 0x0), (Read, 0x8), (Read, 0x10)]);
        assert_eq!(0, stats.write_back_l1);
        assert_eq!(0, stats.write_back_l2);
    }

    #[test]
    fn test_displaced_dirty_victim_is_written_back() {
        let mut h = setup(3, 2, 0, 1, 4, 2, 0);
        let (stats, _) = run(&mut h, &[(Write, 0x0), (Read, 0x8)]);
        // the dirty block sits in the victim cache, nothing written back yet
        assert_eq!(0, stats.write_back_l1);
        assert_eq!(vec![0], victim_tags(&h));
        let mut stats = stats;
        h.access(Read, 0x10, &mut stats);
        assert_eq!(1, stats.write_back_l1);
        assert_eq!(vec![0x8 >> 2], victim_tags(&h));
    }

    #[test]
    fn test_victim_hit_keeps_dirty_data() {
        let mut h = setup(3, 2, 0, 2, 4, 2, 0);
        let (stats, served) = run(&mut h, &[(Write, 0x0), (Read, 0x8), (Read, 0x0)]);
        assert_eq!(Level::Victim, served[2]);
        assert_eq!(2, stats.accesses_l2);
        let d = h.l1().decompose(0x0);
        assert!(h.l1().probe(d.tag, d.index).unwrap().dirty);
        assert!(!h.victim().lookup(0x8 >> 2).unwrap().dirty);
    }

    #[test]
    fn test_victim_hit_on_write_dirties_block() {
        let mut h = setup(3, 2, 0, 1, 4, 2, 0);
        let (stats, served) = run(&mut h, &[(Read, 0x0), (Read, 0x8), (Write, 0x0)]);
        assert_eq!(Level::Victim, served[2]);
        assert_eq!(1, stats.write_misses_l1);
        let d = h.l1().decompose(0x0);
        assert!(h.l1().probe(d.tag, d.index).unwrap().dirty);
    }

    #[test]
    fn test_l1_block_larger_than_l2_block() {
        let mut h = setup(5, 3, 0, 0, 6, 2, 1);
        let (stats, served) = run(&mut h, &[(Write, 0x0), (Read, 0x20), (Read, 0x40)]);
        assert_eq!(vec![Level::Memory; 3], served);
        assert_eq!(1, stats.write_back_l1);
    }

    #[test]
    fn test_invalid_access_code() {
        let mut h = setup(4, 2, 1, 0, 6, 2, 2);
        let mut stats = CacheStats::default();
        assert_eq!(
            Err(AccessError::InvalidAccessType { code: 'x' }),
            h.access_code(b'x', 0, &mut stats)
        );
        assert_eq!(CacheStats::default(), stats);
        let outcome = h.access_code(b'w', 0x4, &mut stats).unwrap();
        assert_eq!(Write, outcome.kind);
        assert_eq!(1, stats.writes);
    }

    #[test]
    fn test_setup_rejects_bad_config() {
        let err = CacheHierarchy::setup(&SimConfig::new(4, 3, 2, 0, 6, 2, 2)).err();
        assert!(matches!(err, Some(ConfigError::GeometryUnderflow { .. })));
        let err = CacheHierarchy::setup(&SimConfig::new(4, 2, 1, 5, 6, 2, 2)).err();
        assert_eq!(Some(ConfigError::VictimEntries { v: 5 }), err);
        // rejected before anything is allocated
        let err = CacheHierarchy::setup(&SimConfig::new(12, 5, 3, 3, 32, 0, 0)).err();
        assert_eq!(
            Some(ConfigError::CapacityTooLarge {
                level: Level::L2,
                c: 32
            }),
            err
        );
    }

    #[test]
    fn test_complete_only_derives_average() {
        let mut h = setup(4, 2, 1, 1, 6, 2, 2);
        let (mut stats, _) = run(&mut h, &[(Read, 0x0), (Write, 0x8), (Read, 0x0)]);
        let raw = stats;
        let timing = *h.timing();
        h.complete(&mut stats);
        assert_eq!(
            raw,
            CacheStats {
                avg_access_time_l1: raw.avg_access_time_l1,
                ..stats
            }
        );
        assert!(stats.avg_access_time_l1 > timing.l1_hit_time);
        let first = stats.avg_access_time_l1;
        stats.finalize(&timing);
        assert_eq!(first, stats.avg_access_time_l1);
    }

    /// xorshift, enough to scatter addresses over a few sets
    fn pseudo_trace(len: usize, seed: u64) -> Vec<(AccessKind, u64)> {
        let mut x = seed;
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                let kind = if x & 0b11 == 0 { Write } else { Read };
                (kind, (x >> 8) & 0x3ff)
            })
            .collect()
    }

    #[test]
    fn test_counter_identities() {
        for v in [0, 1, 4] {
            let mut h = setup(7, 2, 1, v, 9, 3, 2);
            let trace = pseudo_trace(5000, 0x9e37_79b9_7f4a_7c15 + v as u64);
            let (stats, served) = run(&mut h, &trace);
            let l1_hits = |k: AccessKind| {
                trace
                    .iter()
                    .zip(&served)
                    .filter(|((kind, _), l)| *kind == k && **l == Level::L1)
                    .count() as u64
            };
            assert_eq!(stats.accesses, stats.reads + stats.writes);
            assert!(stats.accesses >= stats.accesses_l2);
            assert_eq!(stats.reads, stats.read_misses_l1 + l1_hits(Read));
            assert_eq!(stats.writes, stats.write_misses_l1 + l1_hits(Write));
            assert_eq!(stats.accesses_l2, stats.misses_l1() - stats.victim_hits);
            assert!(stats.misses_l2() <= stats.accesses_l2);
            if v == 0 {
                assert_eq!(0, stats.accesses_vc);
                assert_eq!(0, stats.victim_hits);
            } else {
                assert_eq!(stats.victim_hits, stats.accesses_vc);
                assert!(stats.victim_hits > 0);
            }
        }
    }

    #[test]
    fn test_repeat_after_hit_is_hit() {
        let mut h = setup(7, 2, 1, 2, 9, 3, 2);
        let mut stats = CacheStats::default();
        for (kind, addr) in pseudo_trace(2000, 42) {
            if h.access(kind, addr, &mut stats).served_by == Level::L1 {
                assert_eq!(Level::L1, h.access(Read, addr, &mut stats).served_by);
            }
        }
    }

    #[test]
    fn test_miss_path_recycles_buffers() {
        for v in [0, 1] {
            let mut h = setup(4, 2, 1, v, 5, 2, 1);
            // six blocks through a 2-way L1 set and a 2-way L2 set
            let trace: Vec<_> = (0..6).map(|i| (Write, i * 0x8)).collect();
            let (stats, _) = run(&mut h, &trace);
            assert_eq!(6, stats.accesses_l2);
            assert_eq!(4, h.spare_line.len());
            assert_eq!(4, h.spare_fill.len());
        }
    }

    #[test]
    fn test_copy_overlap() {
        let src: Vec<u8> = (0..8).collect();
        let mut dst = [0u8; 4];
        copy_overlap(&mut dst, &src, 0x15);
        assert_eq!([4, 5, 6, 7], dst);
        let mut dst = [0u8; 16];
        copy_overlap(&mut dst, &src, 0x19);
        assert_eq!(&src[..], &dst[8..]);
    }
}
