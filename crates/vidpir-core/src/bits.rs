//! Owned bit-sequences

use rand::Rng;

use crate::{Error, Result};

/// An owned sequence of bits
///
/// Items, masks, responses and reconstructions all share this
/// representation. Bit `j` of an item is character `j` of its bit-text file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSequence(Vec<bool>);

impl BitSequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sequence with room for `bits` bits
    pub fn with_capacity(bits: usize) -> Self {
        Self(Vec::with_capacity(bits))
    }

    /// Parse bit-text; characters other than `'0'` and `'1'` are skipped
    pub fn from_text(text: &str) -> Self {
        text.bytes()
            .filter_map(|c| match c {
                b'0' => Some(false),
                b'1' => Some(true),
                _ => None,
            })
            .collect()
    }

    /// Render as bit-text
    pub fn to_text(&self) -> String {
        self.0.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }

    /// Draw `len` independent uniform bits from `rng`
    ///
    /// Bits are taken from 64-bit words, least significant first, so a seeded
    /// generator always yields the same sequence.
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let mut bits = Vec::with_capacity(len);
        while bits.len() < len {
            let word: u64 = rng.gen();
            let take = (len - bits.len()).min(64);
            bits.extend((0..take).map(|i| (word >> i) & 1 == 1));
        }
        Self(bits)
    }

    /// Bitwise XOR with a sequence of the same length
    pub fn xor(&self, other: &BitSequence) -> Result<BitSequence> {
        if self.len() != other.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(self.0.iter().zip(&other.0).map(|(a, b)| a ^ b).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<bool> {
        self.0
    }

    pub fn push(&mut self, bit: bool) {
        self.0.push(bit);
    }

    pub fn extend_from_slice(&mut self, bits: &[bool]) {
        self.0.extend_from_slice(bits);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, bool> {
        self.0.iter()
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }
}

impl From<Vec<bool>> for BitSequence {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl From<&[u8]> for BitSequence {
    /// Interpret each element as a bit (non-zero is 1)
    fn from(values: &[u8]) -> Self {
        values.iter().map(|&v| v != 0).collect()
    }
}

impl FromIterator<bool> for BitSequence {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl AsRef<[bool]> for BitSequence {
    fn as_ref(&self) -> &[bool] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a BitSequence {
    type Item = &'a bool;
    type IntoIter = std::slice::Iter<'a, bool>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn test_text_ignores_other_characters() {
        let bits = BitSequence::from_text("10 1\n0x1");
        assert_eq!(bits.to_text(), "10101");
    }

    #[test]
    fn test_random_is_seed_deterministic() {
        let a = BitSequence::random(1000, &mut ChaCha12Rng::seed_from_u64(7));
        let b = BitSequence::random(1000, &mut ChaCha12Rng::seed_from_u64(7));
        let c = BitSequence::random(1000, &mut ChaCha12Rng::seed_from_u64(8));

        assert_eq!(a.len(), 1000);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_random_is_roughly_balanced() {
        let bits = BitSequence::random(10_000, &mut ChaCha12Rng::seed_from_u64(1));
        let ones = bits.count_ones();
        assert!(ones > 4_500 && ones < 5_500, "ones = {}", ones);
    }

    #[test]
    fn test_xor() {
        let a = BitSequence::from_text("1100");
        let b = BitSequence::from_text("1010");
        assert_eq!(a.xor(&b).unwrap().to_text(), "0110");

        let short = BitSequence::from_text("1");
        assert!(matches!(
            a.xor(&short),
            Err(Error::LengthMismatch { expected: 4, actual: 1 })
        ));
    }
}
