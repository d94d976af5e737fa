/// Fixed-length bitset, one bit per line or voxel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    words: Vec<u64>,
    len: usize,
}

impl BitMask {
    /// A mask of `len` bits, all set to `value`.
    pub fn filled(len: usize, value: bool) -> Self {
        let fill = if value { u64::MAX } else { 0 };
        let mut mask = Self {
            words: vec![fill; len.div_ceil(64)],
            len,
        };
        mask.clear_tail();
        mask
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.words[index / 64] & (1 << (index % 64)) != 0)
    }

    /// Writes are ignored past the end.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= self.len {
            return;
        }
        let bit = 1 << (index % 64);
        if value {
            self.words[index / 64] |= bit;
        } else {
            self.words[index / 64] &= !bit;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|i| self.words[i / 64] & (1 << (i % 64)) != 0)
    }

    // keep bits past `len` at zero so `count_ones` stays exact
    fn clear_tail(&mut self) {
        let rem = self.len % 64;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

/// Visibility of every line (or voxel) of a data source.
///
/// `Uniform(true)` is the default "everything visible" state and costs no
/// allocation. A per-index mask is only created on the first individual write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityMask {
    Uniform(bool),
    PerIndex(BitMask),
}

impl Default for VisibilityMask {
    fn default() -> Self {
        Self::Uniform(true)
    }
}

impl VisibilityMask {
    pub fn is_visible(&self, index: usize) -> bool {
        match self {
            Self::Uniform(v) => *v,
            Self::PerIndex(bits) => bits.get(index).unwrap_or(false),
        }
    }
}

/// Called with the key path of a data source and its committed mask; the
/// renderer decides what to do with it.
pub type RenderTrigger = dyn Fn(&str, &VisibilityMask) + Send + Sync;

/// Batches visibility edits for one data source.
///
/// Edits are cheap and local. Nothing reaches the renderer until
/// [`commit`](Visibility::commit), so callers can flip thousands of voxels
/// and publish once.
#[derive(Debug, Clone, Default)]
pub struct Visibility {
    mask: VisibilityMask,
    len: usize,
}

impl Visibility {
    /// Visibility for `len` addressable indices, initially all visible.
    pub fn new(len: usize) -> Self {
        Self {
            mask: VisibilityMask::default(),
            len,
        }
    }

    pub fn mask(&self) -> &VisibilityMask {
        &self.mask
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.mask.is_visible(index)
    }

    /// True once an individual index has been written.
    pub fn is_per_index(&self) -> bool {
        matches!(self.mask, VisibilityMask::PerIndex(_))
    }

    /// Shows or hides one index. Not published until [`commit`](Visibility::commit).
    pub fn set_visible(&mut self, index: usize, visible: bool) {
        match self.mask {
            VisibilityMask::PerIndex(ref mut bits) => bits.set(index, visible),
            VisibilityMask::Uniform(v) => {
                let mut bits = BitMask::filled(self.len, v);
                bits.set(index, visible);
                self.mask = VisibilityMask::PerIndex(bits);
            }
        }
    }

    /// Shows exactly the listed indices and hides the rest.
    pub fn set_visible_only(&mut self, indices: &[usize]) {
        let mut bits = BitMask::filled(self.len, false);
        for &i in indices {
            bits.set(i, true);
        }
        self.mask = VisibilityMask::PerIndex(bits);
    }

    /// Publishes the current mask for the source at `key_path`.
    pub fn commit(&self, key_path: &str, render: &RenderTrigger) {
        render(key_path, &self.mask);
    }

    /// Drops any per-index state, returning to "all visible", and publishes.
    pub fn reset(&mut self, key_path: &str, render: &RenderTrigger) {
        self.mask = VisibilityMask::default();
        self.commit(key_path, render);
    }
}
