//! Cache geometry and address decomposition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{bin, common::Level, config::ConfigError};

/// 4KB cache
pub const DEFAULT_C1: u32 = 12;
/// 32-byte blocks
pub const DEFAULT_B1: u32 = 5;
/// 8 blocks per set
pub const DEFAULT_S1: u32 = 3;
/// 32KB cache
pub const DEFAULT_C2: u32 = 15;
/// 32-byte blocks
pub const DEFAULT_B2: u32 = 5;
/// 16 blocks per set
pub const DEFAULT_S2: u32 = 4;
/// 3 blocks in the victim cache
pub const DEFAULT_V: usize = 3;

/// upper bound of `C`: 64MB of block data per level, allocated eagerly
pub const MAX_CAPACITY_BITS: u32 = 26;
/// upper bound of `C - B`: at most 2^20 blocks (and block buffers) per level
pub const MAX_BLOCK_BITS: u32 = 20;

/// `(C, B, S)`: log2 of capacity in bytes, block size in bytes and ways per set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGeometry {
    pub c: u32,
    pub b: u32,
    pub s: u32,
}

impl CacheGeometry {
    pub const L1_DEFAULT: Self = Self::new(DEFAULT_C1, DEFAULT_B1, DEFAULT_S1);
    pub const L2_DEFAULT: Self = Self::new(DEFAULT_C2, DEFAULT_B2, DEFAULT_S2);

    pub const fn new(c: u32, b: u32, s: u32) -> Self {
        Self { c, b, s }
    }
    pub fn validate(&self, level: Level) -> Result<(), ConfigError> {
        let Self { c, b, s } = *self;
        if c > MAX_CAPACITY_BITS {
            return Err(ConfigError::CapacityTooLarge { level, c });
        }
        if b.checked_add(s).map_or(true, |bs| c < bs) {
            return Err(ConfigError::GeometryUnderflow { level, c, b, s });
        }
        if c - b > MAX_BLOCK_BITS {
            return Err(ConfigError::TooManyBlocks { level, c, b });
        }
        Ok(())
    }
    /// width of the index field. only meaningful on a validated geometry.
    pub fn index_bits(&self) -> u32 {
        self.c - self.b - self.s
    }
    pub fn num_sets(&self) -> usize {
        1 << self.index_bits()
    }
    pub fn ways(&self) -> usize {
        1 << self.s
    }
    pub fn block_bytes(&self) -> usize {
        1 << self.b
    }
    pub fn capacity_bytes(&self) -> u64 {
        1 << self.c
    }
}

impl fmt::Display for CacheGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes, {}-byte blocks, {}-way, {} sets",
            self.capacity_bytes(),
            self.block_bytes(),
            self.ways(),
            self.num_sets()
        )
    }
}

/// An address split into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAddr {
    pub tag: u64,
    pub index: usize,
    pub offset: u64,
}

/// Masks derived once from a geometry and reused for every access of that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMasks {
    pub tag_mask: u64,
    pub index_mask: u64,
    pub offset_mask: u64,
    pub tag_bits: u32,
    pub index_bits: u32,
    pub offset_bits: u32,
}

impl CacheMasks {
    pub fn new(geometry: &CacheGeometry) -> Self {
        let offset_bits = geometry.b;
        let index_bits = geometry.index_bits();
        let tag_start = offset_bits + index_bits;
        let tag_bits = u64::BITS - tag_start;
        Self {
            tag_mask: bin::field_mask(tag_start, tag_bits),
            index_mask: bin::field_mask(offset_bits, index_bits),
            offset_mask: bin::low_mask(offset_bits),
            tag_bits,
            index_bits,
            offset_bits,
        }
    }
    #[inline]
    pub fn decompose(&self, addr: u64) -> DecodedAddr {
        DecodedAddr {
            tag: bin::extract(addr, self.tag_mask, self.offset_bits + self.index_bits),
            index: bin::extract(addr, self.index_mask, self.offset_bits) as usize,
            offset: addr & self.offset_mask,
        }
    }
    /// address with the offset field shifted out.
    #[inline]
    pub fn block_address(&self, addr: u64) -> u64 {
        addr >> self.offset_bits
    }
    /// inverse of [`CacheMasks::block_address`].
    #[inline]
    pub fn block_base(&self, block_address: u64) -> u64 {
        bin::shl(block_address, self.offset_bits)
    }
    /// block-aligned address of the block identified by `tag` and `index`.
    #[inline]
    pub fn compose(&self, tag: u64, index: usize) -> u64 {
        bin::shl(tag, self.offset_bits + self.index_bits) | ((index as u64) << self.offset_bits)
    }
}
