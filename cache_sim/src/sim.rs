use std::time;

use crate::{
    accumulator::CacheStats,
    common::AccessKind,
    config::{ConfigError, SimConfig},
    hierarchy::{AccessOutcome, CacheHierarchy},
    trace::{Access, TraceError},
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// A hierarchy together with the statistics it feeds.
pub struct Simulator {
    hierarchy: CacheHierarchy,
    stats: CacheStats,
}

impl Simulator {
    pub fn new(cfg: &SimConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            hierarchy: CacheHierarchy::setup(cfg)?,
            stats: CacheStats::default(),
        })
    }
    pub fn hierarchy(&self) -> &CacheHierarchy {
        &self.hierarchy
    }
    /// raw counters so far; `avg_access_time_l1` is only set by [`Simulator::finish`].
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
    /// counters so far with the average access time derived.
    pub fn snapshot(&self) -> CacheStats {
        let mut stats = self.stats;
        stats.finalize(self.hierarchy.timing());
        stats
    }
    pub fn access(&mut self, kind: AccessKind, addr: u64) -> AccessOutcome {
        self.hierarchy.access(kind, addr, &mut self.stats)
    }
    /// replays `trace` in order. stops at the first malformed line.
    pub fn run(
        &mut self,
        trace: impl IntoIterator<Item = Result<Access, TraceError>>,
    ) -> Result<usize, TraceError> {
        let begin = time::Instant::now();
        let mut count = 0usize;
        for access in trace {
            let Access { kind, addr } = access?;
            self.access(kind, addr.inner());
            count += 1;
        }
        log::info!(
            "replayed {count} accesses in {} ms",
            begin.elapsed().as_millis()
        );
        Ok(count)
    }
    pub fn finish(self) -> CacheStats {
        let Self {
            hierarchy,
            mut stats,
        } = self;
        hierarchy.complete(&mut stats);
        stats
    }
    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.snapshot().add_stats(&mut ss);
        ss
    }
}
