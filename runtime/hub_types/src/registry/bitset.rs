//! Used-id bitset with lowest-free allocation.

/// Set of used ids. Allocation always returns the lowest clear bit, so freed
/// ids are recycled before the id space grows.
#[derive(Clone, Debug, Default)]
pub(crate) struct IdBitSet {
    words: Vec<u64>,
    len: usize,
}

impl IdBitSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim the lowest unused id.
    pub(crate) fn allocate(&mut self) -> u32 {
        let word_index = self
            .words
            .iter()
            .position(|word| *word != u64::MAX)
            .unwrap_or(self.words.len());
        if word_index == self.words.len() {
            self.words.push(0);
        }
        let bit = self.words[word_index].trailing_ones() as usize;
        let id = word_index * 64 + bit;
        self.words[word_index] |= 1 << bit;
        self.len += 1;
        match u32::try_from(id) {
            Ok(id) => id,
            Err(_) => crate::fatal!("id space exhausted at {id}"),
        }
    }

    /// Mark `id` free. Returns `false` if it was not in use.
    pub(crate) fn remove(&mut self, id: u32) -> bool {
        let (word, mask) = Self::locate(id);
        match self.words.get_mut(word) {
            Some(bits) if *bits & mask != 0 => {
                *bits &= !mask;
                self.len -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn locate(id: u32) -> (usize, u64) {
        let id = id as usize;
        (id / 64, 1 << (id % 64))
    }
}
