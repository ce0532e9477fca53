//! Fully-associative FIFO victim cache between L1 and L2.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VictimEntry {
    /// block address relative to the L1 block size (`addr >> B1`)
    pub tag: u64,
    pub dirty: bool,
    /// free slot; the first writable slot is the next FIFO write position
    pub writable: bool,
    pub data: Box<[u8]>,
}

impl VictimEntry {
    fn free(bytes: usize) -> Self {
        Self {
            tag: 0,
            dirty: false,
            writable: true,
            data: vec![0; bytes].into_boxed_slice(),
        }
    }
}

/// Occupied slots always form a prefix of `slots`, oldest first.
pub struct VictimCache {
    slots: Vec<VictimEntry>,
    block_bytes: usize,
}

impl VictimCache {
    pub fn new(capacity: usize, block_bytes: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| VictimEntry::free(block_bytes)).collect(),
            block_bytes,
        }
    }
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    pub fn is_enabled(&self) -> bool {
        !self.slots.is_empty()
    }
    /// occupied entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &VictimEntry> {
        self.slots.iter().take_while(|e| !e.writable)
    }
    pub fn len(&self) -> usize {
        self.entries().count()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|e| !e.writable)
    }
    fn position(&self, tag: u64) -> Option<usize> {
        self.slots.iter().position(|e| !e.writable && e.tag == tag)
    }
    pub fn lookup(&self, tag: u64) -> Option<&VictimEntry> {
        self.position(tag).map(|slot| &self.slots[slot])
    }
    /// stores a block evicted from L1. when every slot is occupied the oldest
    /// entry is displaced and returned.
    pub fn absorb(&mut self, tag: u64, data: Box<[u8]>, dirty: bool) -> Option<VictimEntry> {
        debug_assert_eq!(data.len(), self.block_bytes);
        if !self.is_enabled() {
            return None;
        }
        let entry = VictimEntry {
            tag,
            dirty,
            writable: false,
            data,
        };
        match self.slots.iter().position(|e| e.writable) {
            Some(slot) => {
                self.slots[slot] = entry;
                None
            }
            None => {
                let displaced = self.slots.remove(0);
                self.slots.push(entry);
                Some(displaced)
            }
        }
    }
    /// Jouppi swap: hands the entry matching `tag` to `promote`, which installs
    /// it into L1 and returns the L1 block it evicted as `(tag, data, dirty)`,
    /// or `None` if the L1 way it used was empty. The evicted block takes the
    /// promoted entry's FIFO position.
    ///
    /// Returns `false` without calling `promote` when `tag` is not resident.
    pub fn swap<F>(&mut self, tag: u64, promote: F) -> bool
    where
        F: FnOnce(Box<[u8]>, bool) -> Option<(u64, Box<[u8]>, bool)>,
    {
        let Some(slot) = self.position(tag) else {
            return false;
        };
        let entry = &mut self.slots[slot];
        let data = std::mem::take(&mut entry.data);
        match promote(data, entry.dirty) {
            Some((tag, data, dirty)) => {
                debug_assert_eq!(data.len(), self.block_bytes);
                *entry = VictimEntry {
                    tag,
                    dirty,
                    writable: false,
                    data,
                };
            }
            None => {
                self.slots.remove(slot);
                self.slots.push(VictimEntry::free(self.block_bytes));
            }
        }
        true
    }
}
