//! N-way set-associative cache with LRU replacement.

use crate::geometry::{CacheGeometry, CacheMasks, DecodedAddr};

/// LRU counters saturate here instead of wrapping.
pub const LRU_MAX_VALUE: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub valid: bool,
    pub dirty: bool,
    /// the lowest value in a set is the least recently used block
    pub lru: u8,
    pub tag: u64,
    pub data: Box<[u8]>,
}

impl Block {
    pub fn empty(bytes: usize) -> Self {
        Self {
            valid: false,
            dirty: false,
            lru: 0,
            tag: 0,
            data: vec![0; bytes].into_boxed_slice(),
        }
    }
}

pub struct Cache {
    geometry: CacheGeometry,
    masks: CacheMasks,
    ways: usize,
    /// `num_sets * ways` blocks, set-major
    blocks: Vec<Block>,
}

impl Cache {
    /// `geometry` must already be validated.
    pub fn new(geometry: CacheGeometry) -> Self {
        let ways = geometry.ways();
        let blocks = vec![Block::empty(geometry.block_bytes()); geometry.num_sets() * ways];
        Self {
            geometry,
            masks: CacheMasks::new(&geometry),
            ways,
            blocks,
        }
    }
    pub fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }
    pub fn masks(&self) -> &CacheMasks {
        &self.masks
    }
    #[inline]
    pub fn decompose(&self, addr: u64) -> DecodedAddr {
        self.masks.decompose(addr)
    }
    pub fn set(&self, index: usize) -> &[Block] {
        &self.blocks[index * self.ways..(index + 1) * self.ways]
    }
    fn set_mut(&mut self, index: usize) -> &mut [Block] {
        &mut self.blocks[index * self.ways..(index + 1) * self.ways]
    }
    pub fn valid_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.valid).count()
    }
    /// finds a resident block without changing recency.
    pub fn probe(&self, tag: u64, index: usize) -> Option<&Block> {
        self.set(index).iter().find(|b| b.valid && b.tag == tag)
    }
    /// finds a resident block and makes it the most recently used one of its set.
    pub fn lookup(&mut self, tag: u64, index: usize) -> Option<&mut Block> {
        let set = self.set_mut(index);
        let way = set.iter().position(|b| b.valid && b.tag == tag)?;
        touch(set, way, true);
        Some(&mut set[way])
    }
    /// block `install` would replace in set `index`.
    pub fn eviction_candidate(&self, index: usize) -> &Block {
        let set = self.set(index);
        &set[victim_way(set)]
    }
    /// places a block into set `index`, returning the previous occupant of the
    /// chosen way (which may be invalid).
    pub fn install(&mut self, tag: u64, index: usize, data: Box<[u8]>, dirty: bool) -> Block {
        debug_assert_eq!(data.len(), self.geometry.block_bytes());
        debug_assert!(self.probe(tag, index).is_none(), "tag already resident");
        let set = self.set_mut(index);
        let way = victim_way(set);
        let was_valid = set[way].valid;
        let incoming = Block {
            valid: true,
            dirty,
            lru: set[way].lru,
            tag,
            data,
        };
        let evicted = std::mem::replace(&mut set[way], incoming);
        touch(set, way, was_valid);
        evicted
    }
    /// dirties a resident block without touching recency. returns whether it was resident.
    pub fn mark_dirty(&mut self, tag: u64, index: usize) -> bool {
        match self
            .set_mut(index)
            .iter_mut()
            .find(|b| b.valid && b.tag == tag)
        {
            Some(b) => {
                b.dirty = true;
                true
            }
            None => false,
        }
    }
}

/// first invalid way, otherwise the valid way with the smallest LRU value
/// (the lowest slot wins ties).
fn victim_way(set: &[Block]) -> usize {
    set.iter().position(|b| !b.valid).unwrap_or_else(|| {
        set.iter()
            .enumerate()
            .min_by_key(|(_, b)| b.lru)
            .map_or(0, |(way, _)| way)
    })
}

/// makes `way` the most recently used block of `set`.
///
/// Blocks that were more recent than `way` move down by one, so the valid
/// blocks of a set always hold distinct ranks `0..n` while `n <= 256`.
fn touch(set: &mut [Block], way: usize, was_valid: bool) {
    let old = set[way].lru;
    let mut others = 0usize;
    for (i, b) in set.iter_mut().enumerate() {
        if i == way || !b.valid {
            continue;
        }
        if was_valid && b.lru > old {
            b.lru -= 1;
        }
        others += 1;
    }
    set[way].lru = others.min(LRU_MAX_VALUE as usize) as u8;
}
