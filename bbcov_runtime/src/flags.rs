//! Dense per-function block flags.

/// Highest block index a sequence accepts. The C ABI passes `u32`, so
/// nothing an instrumentor emits is above it.
pub const MAX_BLOCK_INDEX: usize = u32::MAX as usize;

/// Growable sequence of "block was entered" flags, indexed by block index.
///
/// Growth only ever extends the sequence (new slots are `false`) and flags
/// only ever go from `false` to `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFlags(Vec<bool>);

impl BlockFlags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// All-false flags for `len` blocks, the shape of a fresh template.
    pub fn with_len(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flag at `index`; indices past the end read as `false`.
    pub fn get(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Extend to at least `len` slots.
    #[inline]
    pub fn grow_to(&mut self, len: usize) {
        if self.0.len() < len {
            self.0.resize(len, false);
        }
    }

    /// Mark block `index` as entered, growing if needed. Indices above
    /// [`MAX_BLOCK_INDEX`] are ignored.
    #[inline]
    pub fn mark(&mut self, index: usize) {
        self.or_at(index, true);
    }

    /// OR `value` into slot `index`, growing if needed. Returns `false`, and
    /// changes nothing, for indices above [`MAX_BLOCK_INDEX`].
    #[inline]
    pub fn or_at(&mut self, index: usize, value: bool) -> bool {
        if index > MAX_BLOCK_INDEX {
            return false;
        }
        self.grow_to(index + 1);
        if value {
            self.0[index] = true;
        }
        true
    }

    /// Slot-wise OR with `other`; the result is as long as the longer side.
    pub fn merge(&mut self, other: &BlockFlags) {
        self.grow_to(other.len());
        for (slot, &value) in self.0.iter_mut().zip(other.0.iter()) {
            *slot |= value;
        }
    }

    /// Function-level aggregate: true if any block was entered.
    pub fn is_covered(&self) -> bool {
        self.0.iter().any(|&flag| flag)
    }

    pub fn covered_count(&self) -> usize {
        self.0.iter().filter(|&&flag| flag).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for BlockFlags {
    fn from(flags: Vec<bool>) -> Self {
        Self(flags)
    }
}
