//! Cyclic sequence number arithmetic.
//!
//! Sequence numbers are fixed-width counters that wrap around. Two numbers
//! can only be ordered relative to each other when they lie within half the
//! sequence space, which is the only ordering the protocol relies on.

use super::constants::{SEQUENCE_BITS, SEQUENCE_MASK};

/// A 24-bit cyclic sequence number stored in the low bits of a `u32`.
pub type SequenceNumber = u32;

/// Signed distance from `b` to `a` in a `bits`-wide cyclic space.
///
/// The numeric difference modulo `2^bits` is interpreted as signed: values in
/// the upper half are negative. At exactly half the space the sign is broken
/// by numeric order so the result stays antisymmetric.
#[inline]
pub fn cyclic_difference_bits(a: u32, b: u32, bits: u32) -> i32 {
    debug_assert!(bits > 0 && bits < 32);
    let modulus = 1u32 << bits;
    let mask = modulus - 1;
    let half = modulus >> 1;

    let (a, b) = (a & mask, b & mask);
    let diff = a.wrapping_sub(b) & mask;

    if diff < half {
        diff as i32
    } else if diff > half {
        diff as i32 - modulus as i32
    } else if a > b {
        half as i32
    } else {
        -(half as i32)
    }
}

/// Signed distance from `b` to `a` for protocol sequence numbers.
#[inline]
pub fn cyclic_difference(a: SequenceNumber, b: SequenceNumber) -> i32 {
    cyclic_difference_bits(a, b, SEQUENCE_BITS)
}

/// The sequence number following `seq`.
#[inline]
pub fn next_sequence(seq: SequenceNumber) -> SequenceNumber {
    seq.wrapping_add(1) & SEQUENCE_MASK
}

/// Sequence number `offset` steps away from `seq` (negative steps backward).
#[inline]
pub fn offset_sequence(seq: SequenceNumber, offset: i32) -> SequenceNumber {
    seq.wrapping_add(offset as u32) & SEQUENCE_MASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::SEQUENCE_HALF_RANGE;

    #[test]
    fn test_difference_simple() {
        assert_eq!(cyclic_difference(5, 3), 2);
        assert_eq!(cyclic_difference(3, 5), -2);
        assert_eq!(cyclic_difference(7, 7), 0);
    }

    #[test]
    fn test_difference_across_wraparound() {
        assert_eq!(cyclic_difference(0, SEQUENCE_MASK), 1);
        assert_eq!(cyclic_difference(SEQUENCE_MASK, 0), -1);
        assert_eq!(cyclic_difference(1, SEQUENCE_MASK - 1), 3);
    }

    #[test]
    fn test_difference_is_antisymmetric() {
        let samples = [
            0,
            1,
            2,
            1000,
            SEQUENCE_HALF_RANGE - 1,
            SEQUENCE_HALF_RANGE,
            SEQUENCE_HALF_RANGE + 1,
            SEQUENCE_MASK - 1,
            SEQUENCE_MASK,
        ];

        for &a in &samples {
            for &b in &samples {
                assert_eq!(
                    cyclic_difference(a, b),
                    -cyclic_difference(b, a),
                    "a = {a}, b = {b}"
                );
            }
        }
    }

    #[test]
    fn test_difference_exhaustive_16_bit() {
        // Walk the whole 16-bit space plus a bit, like a live counter would.
        for i in 0..70_000u32 {
            let a = i & 0xffff;
            let b = (i + 1) & 0xffff;
            assert_eq!(cyclic_difference_bits(b, a, 16), 1);
            assert_eq!(cyclic_difference_bits(a, b, 16), -1);
        }
    }

    #[test]
    fn test_difference_half_range() {
        let a = SEQUENCE_HALF_RANGE;
        assert_eq!(cyclic_difference(a, 0), SEQUENCE_HALF_RANGE as i32);
        assert_eq!(cyclic_difference(0, a), -(SEQUENCE_HALF_RANGE as i32));
        assert_eq!(cyclic_difference(a + 1, 0), -(SEQUENCE_HALF_RANGE as i32) + 1);
    }

    #[test]
    fn test_difference_ignores_high_bits() {
        assert_eq!(cyclic_difference(0xff00_0005, 3), 2);
    }

    #[test]
    fn test_ordering_within_window_is_consistent() {
        let base = SEQUENCE_MASK - 10;
        let window: Vec<_> = (0..20).map(|i| offset_sequence(base, i)).collect();

        for (i, &a) in window.iter().enumerate() {
            for (j, &b) in window.iter().enumerate() {
                assert_eq!(cyclic_difference(a, b).signum(), (i as i32 - j as i32).signum());
            }
        }
    }

    #[test]
    fn test_next_and_offset() {
        assert_eq!(next_sequence(SEQUENCE_MASK), 0);
        assert_eq!(next_sequence(41), 42);
        assert_eq!(offset_sequence(1, -3), SEQUENCE_MASK - 1);
        assert_eq!(offset_sequence(SEQUENCE_MASK, 2), 1);
    }
}
