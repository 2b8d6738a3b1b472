use smallvec::SmallVec;

const WORD_BITS: u32 = u32::BITS;

/// Growable set of bits.
///
/// Used for light slave bits, span shadow bits and visibility region sets. Clearing never
/// releases storage, so a vector reused every frame stops allocating once it has grown.
#[derive(Debug, Default, Clone)]
pub struct BitVector {
    words: SmallVec<[u32; 2]>,
}

impl BitVector {
    /// Bits are stored densely, so indices must stay small.
    pub const MAX_BIT: u32 = 1 << 20;

    pub fn new() -> Self {
        Self::default()
    }

    /// Bit vector with each of `bits` set.
    pub fn from_bits(bits: impl IntoIterator<Item = u32>) -> Self {
        let mut vector = Self::new();
        for bit in bits {
            vector.set_bit(bit);
        }
        vector
    }

    fn split(bit: u32) -> (usize, u32) {
        ((bit / WORD_BITS) as usize, 1 << (bit % WORD_BITS))
    }

    pub fn set_bit(&mut self, bit: u32) {
        debug_assert!(bit < Self::MAX_BIT, "bit {} would grow the vector past {} bits", bit, Self::MAX_BIT);
        let (word, mask) = Self::split(bit);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= mask;
    }

    pub fn clear_bit(&mut self, bit: u32) {
        let (word, mask) = Self::split(bit);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !mask;
        }
    }

    pub fn is_bit_set(&self, bit: u32) -> bool {
        let (word, mask) = Self::split(bit);
        self.words.get(word).map_or(false, |w| w & mask != 0)
    }

    /// Clears every bit, keeping the storage.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Whether any bit is set in both vectors.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.words.iter().zip(other.words.iter()).any(|(a, b)| a & b != 0)
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Iterates the indices of all set bits, ascending.
    pub fn iter_set(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| word_idx as u32 * WORD_BITS + bit)
        })
    }
}

// Trailing zero words are storage, not content.
impl PartialEq for BitVector {
    fn eq(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0))
    }
}

impl Eq for BitVector {}

#[cfg(test)]
mod tests {
    use super::BitVector;

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "would grow the vector")]
    fn sparse_bits_are_rejected() {
        BitVector::new().set_bit(u32::MAX - 1);
    }

    #[test]
    fn set_clear_query() {
        let mut bits = BitVector::new();
        assert!(bits.is_empty());

        bits.set_bit(3);
        bits.set_bit(70);
        assert!(bits.is_bit_set(3));
        assert!(bits.is_bit_set(70));
        assert!(!bits.is_bit_set(4));
        assert!(!bits.is_bit_set(500));
        assert_eq!(bits.count_ones(), 2);
        assert_eq!(bits.iter_set().collect::<Vec<_>>(), vec![3, 70]);

        bits.clear_bit(3);
        assert!(!bits.is_bit_set(3));
        bits.clear();
        assert!(bits.is_empty());
    }

    #[test]
    fn cleared_vector_equals_fresh_one() {
        let mut bits = BitVector::from_bits([1, 65]);
        bits.clear();
        assert_eq!(bits, BitVector::new());
    }

    #[test]
    fn overlap() {
        let a = BitVector::from_bits([0, 40]);
        let b = BitVector::from_bits([40]);
        let c = BitVector::from_bits([1]);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&BitVector::new()));
    }
}
