//! Perfect-hash index from type id to itable offset.

use hub_ir::TypeId;

/// `offsets[id % divisor]` is the itable offset recorded for `id`.
///
/// The divisor is the smallest value at least the number of ids for which no
/// two ids share a remainder. Unmapped remainders hold offset 0, the itable
/// sentinel, so a lookup of an id that was never inserted reads a slot that
/// cannot carry its marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MTable {
    divisor: u32,
    offsets: Box<[u32]>,
}

impl MTable {
    /// Build from `(id, itable offset)` pairs. Ids must be distinct.
    pub fn build(entries: &[(TypeId, u32)]) -> Self {
        let ids: Vec<u32> = entries.iter().map(|(id, _)| id.raw()).collect();
        let divisor = perfect_divisor(&ids);
        let mut offsets = vec![0; divisor as usize].into_boxed_slice();
        for &(id, offset) in entries {
            offsets[(id.raw() % divisor) as usize] = offset;
        }
        Self { divisor, offsets }
    }

    #[inline]
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Itable offset for `id`; 0 when nothing was recorded at its remainder.
    #[inline]
    pub fn offset(&self, id: TypeId) -> u32 {
        self.offsets[(id.raw() % self.divisor) as usize]
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Smallest divisor `>= max(n, 1)` under which the `n` distinct values of
/// `ids` have distinct remainders.
///
/// Always terminates: any divisor above the largest id is collision-free.
pub fn perfect_divisor(ids: &[u32]) -> u32 {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    let start = u32::try_from(ids.len()).unwrap_or(u32::MAX).max(1);
    let mut seen: Vec<bool> = Vec::new();
    let mut divisor = start;
    loop {
        seen.clear();
        seen.resize(divisor as usize, false);
        let collides = ids.iter().any(|&id| {
            let bucket = &mut seen[(id % divisor) as usize];
            std::mem::replace(bucket, true)
        });
        if !collides {
            return divisor;
        }
        divisor += 1;
    }
}
