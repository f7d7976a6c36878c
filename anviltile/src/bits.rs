//! Bit manipulation specific to the Anvil save format.

use bit_field::BitField;

/// Compact storage of small unsigned values inside 64-bit words.
///
/// Values never cross a word boundary: each word holds
/// `64 / bits_per_value` values and any remaining high bits are waste.
/// This mirrors the packing the game writes since 1.16, so a generic bit
/// reader is not a substitute.
#[derive(Debug)]
pub struct BitStorage {
    data: Vec<i64>,
    bits: usize,
}

impl BitStorage {
    pub fn new(bits: usize, data: Vec<i64>) -> Self {
        Self { data, bits }
    }

    /// Storage with no backing words. Every index reads as zero.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            bits: 0,
        }
    }

    pub fn bits_per_value(&self) -> usize {
        self.bits
    }

    pub fn get(&self, index: usize) -> usize {
        if self.bits == 0 || self.data.is_empty() {
            // A container with a single palette entry carries no data at
            // all; every cell is the zeroth entry.
            return 0;
        }

        let values_per_long = 64 / self.bits;
        let long_index = index / values_per_long;
        let offset = (index % values_per_long) * self.bits;

        let long = self.data[long_index] as u64;
        long.get_bits(offset..offset + self.bits) as usize
    }
}

/// The number of bits per value in a packed container, derived from the
/// cell count and the number of longs actually present.
///
/// The width can come out larger than `ceil(log2(palette_len))` when the
/// writer inflated it to fit word alignment; callers must take the width
/// from the data, not the palette.
pub fn packed_bits_per_value(cells: usize, longs: usize) -> usize {
    if longs == 0 || cells == 0 {
        return 0;
    }
    let values_per_long = (cells + longs - 1) / longs;
    64 / values_per_long
}

/// Bit width needed to represent values up to and including `max`.
pub fn bits_for_max(max: usize) -> usize {
    (usize::BITS - max.leading_zeros()) as usize
}

/// Inverse of `BitStorage::get`, for building test fixtures.
#[cfg(test)]
pub(crate) fn pack_bits(bits: usize, values: &[usize]) -> Vec<i64> {
    let values_per_long = 64 / bits;
    let mut data = vec![0u64; (values.len() + values_per_long - 1) / values_per_long];

    for (i, v) in values.iter().enumerate() {
        let long = &mut data[i / values_per_long];
        let offset = (i % values_per_long) * bits;
        long.set_bits(offset..offset + bits, *v as u64);
    }

    data.into_iter().map(|l| l as i64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_from_data_length() {
        // a full 4-bit block container: 4096 cells in 256 longs.
        assert_eq!(4, packed_bits_per_value(4096, 256));
        // 5 bits: 342 longs, 12 values in each with 4 waste bits.
        assert_eq!(5, packed_bits_per_value(4096, 342));
        assert_eq!(9, packed_bits_per_value(4096, 586));
        // heightmaps: 256 cells of 9 bits in 37 longs.
        assert_eq!(9, packed_bits_per_value(256, 37));
    }

    #[test]
    fn width_of_missing_data_is_zero() {
        assert_eq!(0, packed_bits_per_value(4096, 0));
        assert_eq!(0, packed_bits_per_value(0, 12));
        // block-resolution indexing over a single biome long.
        assert_eq!(0, packed_bits_per_value(4096, 1));
    }

    #[test]
    fn bits_for_world_height() {
        // one section: values up to 17 need 5 bits.
        assert_eq!(5, bits_for_max(1 * 16 + 1));
        // a full-height 24-section world: 385 needs 9 bits.
        assert_eq!(9, bits_for_max(24 * 16 + 1));
    }

    #[test]
    fn get_reads_back_packed_values() {
        let values: Vec<usize> = (0..256).map(|i| (i * 7) % 512).collect();
        let storage = BitStorage::new(9, pack_bits(9, &values));

        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, storage.get(i));
        }
    }

    #[test]
    fn values_do_not_cross_words() {
        // 9-bit values: 7 per long, 1 waste bit at the top of each word.
        // index 7 must start at bit 0 of the second word.
        let mut data = vec![0i64; 2];
        data[1] = 0b1_1111_1111;
        let storage = BitStorage::new(9, data);

        assert_eq!(0, storage.get(6));
        assert_eq!(511, storage.get(7));
    }

    #[test]
    fn get_is_bounded_by_width() {
        let values: Vec<usize> = (0..64).map(|i| i % 16).collect();
        let storage = BitStorage::new(4, pack_bits(4, &values));

        for i in 0..64 {
            assert!(storage.get(i) < 16);
        }
    }

    #[test]
    fn empty_storage_reads_zero() {
        let storage = BitStorage::empty();
        assert_eq!(0, storage.get(0));
        assert_eq!(0, storage.get(4095));
    }
}
