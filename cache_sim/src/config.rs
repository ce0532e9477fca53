use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    common::Level,
    geometry::{CacheGeometry, DEFAULT_V, MAX_BLOCK_BITS, MAX_CAPACITY_BITS},
    timing::TimingConfig,
};

pub const MAX_VICTIM_ENTRIES: usize = 4;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{level}: C ({c}) must be at least B + S ({b} + {s})")]
    GeometryUnderflow { level: Level, c: u32, b: u32, s: u32 },
    #[error("{level}: C ({c}) exceeds the supported maximum of {MAX_CAPACITY_BITS}")]
    CapacityTooLarge { level: Level, c: u32 },
    #[error("{level}: C - B ({c} - {b}) exceeds the supported maximum of {MAX_BLOCK_BITS}")]
    TooManyBlocks { level: Level, c: u32, b: u32 },
    #[error("victim cache size {v} out of range 0..={MAX_VICTIM_ENTRIES}")]
    VictimEntries { v: usize },
    #[error("timing constant `{name}` out of range: {value}")]
    Timing { name: &'static str, value: f64 },
}

/// Everything a simulation run is set up from. Missing fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub l1: CacheGeometry,
    pub victim_entries: usize,
    pub l2: CacheGeometry,
    pub timing: TimingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            l1: CacheGeometry::L1_DEFAULT,
            victim_entries: DEFAULT_V,
            l2: CacheGeometry::L2_DEFAULT,
            timing: TimingConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn new(c1: u32, b1: u32, s1: u32, v: usize, c2: u32, b2: u32, s2: u32) -> Self {
        Self {
            l1: CacheGeometry::new(c1, b1, s1),
            victim_entries: v,
            l2: CacheGeometry::new(c2, b2, s2),
            timing: TimingConfig::default(),
        }
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.l1.validate(Level::L1)?;
        self.l2.validate(Level::L2)?;
        if self.victim_entries > MAX_VICTIM_ENTRIES {
            return Err(ConfigError::VictimEntries {
                v: self.victim_entries,
            });
        }
        self.timing.validate()
    }
    pub fn deser(file: impl std::io::Read) -> Result<Self> {
        Ok(serde_json::from_reader(file)?)
    }
}
