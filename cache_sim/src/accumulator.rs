//! Statistics of one simulation run.

use serde::{Deserialize, Serialize};

use crate::timing::TimingModel;

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// Counters only ever grow. `avg_access_time_l1` is derived by [`CacheStats::finalize`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub accesses: u64,
    pub accesses_l2: u64,
    pub accesses_vc: u64,
    pub reads: u64,
    pub read_misses_l1: u64,
    pub read_misses_l2: u64,
    pub writes: u64,
    pub write_misses_l1: u64,
    pub write_misses_l2: u64,
    pub write_back_l1: u64,
    pub write_back_l2: u64,
    pub victim_hits: u64,
    pub avg_access_time_l1: f64,
}

pub(crate) fn ratio(n: u64, d: u64) -> f64 {
    if d == 0 {
        0.
    } else {
        n as f64 / d as f64
    }
}

impl CacheStats {
    pub fn misses_l1(&self) -> u64 {
        self.read_misses_l1 + self.write_misses_l1
    }
    pub fn misses_l2(&self) -> u64 {
        self.read_misses_l2 + self.write_misses_l2
    }
    pub fn read_hits_l1(&self) -> u64 {
        self.reads - self.read_misses_l1
    }
    pub fn write_hits_l1(&self) -> u64 {
        self.writes - self.write_misses_l1
    }
    pub fn miss_rate_l1(&self) -> f64 {
        ratio(self.misses_l1(), self.accesses)
    }
    /// fraction of L1 misses served by the victim cache
    pub fn victim_hit_rate(&self) -> f64 {
        ratio(self.victim_hits, self.misses_l1())
    }
    pub fn miss_rate_l2(&self) -> f64 {
        ratio(self.misses_l2(), self.accesses_l2)
    }
    /// derives `avg_access_time_l1` from the raw counters, which stay untouched.
    pub fn finalize(&mut self, timing: &TimingModel) {
        self.avg_access_time_l1 = timing.average_access_time(self);
    }
}

#[cfg(feature = "stat")]
impl AddStats for CacheStats {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(stat::L1Stat(*self)));
        buf.push(Box::new(stat::VictimStat(*self)));
        buf.push(Box::new(stat::L2Stat(*self)));
        buf.push(Box::new(stat::TimingStat(*self)));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use std::fmt;

    use super::CacheStats;
    use crate::stat::*;

    pub struct L1Stat(pub CacheStats);
    pub struct VictimStat(pub CacheStats);
    pub struct L2Stat(pub CacheStats);
    pub struct TimingStat(pub CacheStats);

    macro_rules! stat_view {
        ($ty:ident, $header:expr, $width:expr) => {
            impl Stat for $ty {
                fn view(&self, _: usize) -> Box<dyn StatView + '_> {
                    Box::new(self)
                }
            }

            impl StatView for &'_ $ty {
                fn header(&self) -> &'static str {
                    $header
                }
                fn width(&self) -> usize {
                    $width
                }
            }
        };
    }

    stat_view!(L1Stat, "L1 cache", 44);
    stat_view!(VictimStat, "victim cache", 44);
    stat_view!(L2Stat, "L2 cache", 44);
    stat_view!(TimingStat, "timing", 33);

    impl fmt::Display for &'_ L1Stat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = &self.0;
            let miss = s.misses_l1();
            let (rm, wm) = (s.read_misses_l1, s.write_misses_l1);
            writeln!(f, "      accesses: {:>10}", s.accesses)?;
            writeln!(f, "         reads: {:>10}", s.reads)?;
            writeln!(f, "   read misses: {rm:>10} ({:>8}%)", pct(rm, s.reads))?;
            writeln!(f, "        writes: {:>10}", s.writes)?;
            writeln!(f, "  write misses: {wm:>10} ({:>8}%)", pct(wm, s.writes))?;
            writeln!(f, "        misses: {miss:>10} ({:>8}%)", pct(miss, s.accesses))?;
            write!(f, "   write-backs: {:>10}", s.write_back_l1)
        }
    }

    impl fmt::Display for &'_ VictimStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = &self.0;
            let hits = s.victim_hits;
            writeln!(f, "      accesses: {:>10}", s.accesses_vc)?;
            let rate = pct(hits, s.misses_l1());
            write!(f, "          hits: {hits:>10} ({rate:>8}% of L1 misses)")
        }
    }

    impl fmt::Display for &'_ L2Stat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = &self.0;
            let miss = s.misses_l2();
            let (rm, wm) = (s.read_misses_l2, s.write_misses_l2);
            writeln!(f, "      accesses: {:>10}", s.accesses_l2)?;
            writeln!(f, "   read misses: {rm:>10}")?;
            writeln!(f, "  write misses: {wm:>10}")?;
            writeln!(f, "        misses: {miss:>10} ({:>8}%)", pct(miss, s.accesses_l2))?;
            write!(f, "   write-backs: {:>10}", s.write_back_l2)
        }
    }

    impl fmt::Display for &'_ TimingStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let amat = format!("{:.4} ns", self.0.avg_access_time_l1);
            write!(f, "  average access time: {amat:>12}")
        }
    }
}
