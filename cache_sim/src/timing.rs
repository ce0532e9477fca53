//! Latency constants behind the average access time.
//!
//! ```text
//! MR1  = L1 misses / accesses
//! VHR  = victim hits / L1 misses
//! MR2  = L2 misses / L2 accesses
//! AMAT = HT1 + MR1 * (HTV + (1 - VHR) * (HT2 + MR2 * MEM))
//! ```
//!
//! with `HT1 = l1_hit_time_base + l1_hit_time_per_way_bit * S1` and the same
//! shape for `HT2`. `HTV` is zero when the victim cache is disabled.

use serde::{Deserialize, Serialize};

use crate::{accumulator::CacheStats, config::ConfigError, geometry::CacheGeometry};

/// Timing constants in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub l1_hit_time_base: f64,
    pub l1_hit_time_per_way_bit: f64,
    pub victim_hit_time: f64,
    pub l2_hit_time_base: f64,
    pub l2_hit_time_per_way_bit: f64,
    pub memory_time: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            l1_hit_time_base: 2.,
            l1_hit_time_per_way_bit: 0.2,
            victim_hit_time: 1.,
            l2_hit_time_base: 4.,
            l2_hit_time_per_way_bit: 0.4,
            memory_time: 500.,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        macro_rules! check {
            ($field:ident > 0) => {
                if !(self.$field.is_finite() && self.$field > 0.) {
                    return Err(ConfigError::Timing {
                        name: stringify!($field),
                        value: self.$field,
                    });
                }
            };
            ($field:ident >= 0) => {
                if !(self.$field.is_finite() && self.$field >= 0.) {
                    return Err(ConfigError::Timing {
                        name: stringify!($field),
                        value: self.$field,
                    });
                }
            };
        }
        check!(l1_hit_time_base > 0);
        check!(l1_hit_time_per_way_bit >= 0);
        check!(victim_hit_time >= 0);
        check!(l2_hit_time_base > 0);
        check!(l2_hit_time_per_way_bit >= 0);
        check!(memory_time > 0);
        Ok(())
    }
}

/// Per-level latencies resolved against a concrete geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingModel {
    pub l1_hit_time: f64,
    pub victim_hit_time: f64,
    pub l2_hit_time: f64,
    pub memory_time: f64,
}

impl TimingModel {
    pub fn resolve(
        cfg: &TimingConfig,
        l1: &CacheGeometry,
        victim_entries: usize,
        l2: &CacheGeometry,
    ) -> Self {
        Self {
            l1_hit_time: cfg.l1_hit_time_base + cfg.l1_hit_time_per_way_bit * l1.s as f64,
            victim_hit_time: if victim_entries == 0 {
                0.
            } else {
                cfg.victim_hit_time
            },
            l2_hit_time: cfg.l2_hit_time_base + cfg.l2_hit_time_per_way_bit * l2.s as f64,
            memory_time: cfg.memory_time,
        }
    }
    pub fn average_access_time(&self, stats: &CacheStats) -> f64 {
        let l1_miss_rate = stats.miss_rate_l1();
        let victim_hit_rate = stats.victim_hit_rate();
        let l2_miss_rate = stats.miss_rate_l2();
        let l2_path = self.l2_hit_time + l2_miss_rate * self.memory_time;
        self.l1_hit_time + l1_miss_rate * (self.victim_hit_time + (1. - victim_hit_rate) * l2_path)
    }
}
