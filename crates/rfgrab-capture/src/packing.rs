//! Piksi raw sample byte layout and the dense one-bit repacking.
//!
//! Each byte from the front-end carries two 3-bit sign-magnitude samples
//! plus a status bit:
//!
//! ```text
//!   [7:5] : sample 0 (sign, magnitude high, magnitude low)
//!   [4:2] : sample 1 (sign, magnitude high, magnitude low)
//!   [1]   : reserved
//!   [0]   : FIFO error flag (overflow), active low
//! ```

/// Number of samples carried in each raw byte.
pub const SAMPLES_PER_BYTE: u64 = 2;

/// Raw bytes consumed per packed output byte in one-bit mode.
pub const PACK_RATIO: usize = 4;

/// Sign-magnitude to two's-complement mapping for a 3-bit sample field.
pub const SIGN_MAG_TABLE: [i8; 8] = [1, 3, 5, 7, -1, -3, -5, -7];

/// Output repacking selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackingMode {
    /// Raw bytes written unmodified.
    #[default]
    Passthrough,
    /// Sign bits only, four raw bytes per output byte.
    OneBit,
}

/// True when the byte's active-low FIFO error flag signals an overflow.
#[inline]
pub fn fifo_overflow(byte: u8) -> bool {
    byte & 0x01 == 0
}

/// Convert one raw byte into its two signed samples.
#[inline]
pub fn to_signed(byte: u8) -> (i8, i8) {
    (
        SIGN_MAG_TABLE[(byte >> 5 & 0x07) as usize],
        SIGN_MAG_TABLE[(byte >> 2 & 0x07) as usize],
    )
}

/// Repack raw sample bytes into the dense one-bit format: the two sign bits
/// of each raw byte (bit 7 for sample 0, bit 4 for sample 1), four raw
/// bytes per packed byte, first sample in the MSB.
///
/// `raw.len()` must be a multiple of [`PACK_RATIO`]; the writer carries any
/// remainder between calls.
pub fn pack_one_bit(raw: &[u8], out: &mut Vec<u8>) {
    debug_assert_eq!(raw.len() % PACK_RATIO, 0);
    for group in raw.chunks_exact(PACK_RATIO) {
        let mut pack = 0u8;
        for &b in group {
            pack <<= 2;
            pack |= (b & 0x80) >> 6;
            pack |= (b & 0x10) >> 4;
        }
        out.push(pack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_packs_to_zero() {
        let mut out = Vec::new();
        pack_one_bit(&[0x00; 4], &mut out);
        assert_eq!(out, vec![0x00]);
    }

    #[test]
    fn sample0_sign_set_packs_alternating() {
        // Sign of sample 0 set in every raw byte, sample 1 positive.
        let mut out = Vec::new();
        pack_one_bit(&[0x80; 4], &mut out);
        assert_eq!(out, vec![0xAA]);
    }

    #[test]
    fn both_signs_set_packs_ones() {
        let mut out = Vec::new();
        pack_one_bit(&[0x90; 4], &mut out);
        assert_eq!(out, vec![0xFF]);
    }

    #[test]
    fn first_sample_lands_in_msb() {
        // Only the first raw byte carries a set sample-0 sign bit.
        let mut out = Vec::new();
        pack_one_bit(&[0x80, 0x00, 0x00, 0x00], &mut out);
        assert_eq!(out, vec![0b1000_0000]);

        out.clear();
        pack_one_bit(&[0x00, 0x00, 0x00, 0x10], &mut out);
        assert_eq!(out, vec![0b0000_0001]);
    }

    #[test]
    fn multiple_groups_in_order() {
        let mut out = Vec::new();
        pack_one_bit(&[0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10], &mut out);
        assert_eq!(out, vec![0b1000_0000, 0b0000_0001]);
    }

    #[test]
    fn overflow_flag_is_active_low() {
        assert!(fifo_overflow(0x00));
        assert!(fifo_overflow(0xFE));
        assert!(!fifo_overflow(0x01));
        assert!(!fifo_overflow(0xFF));
    }

    #[test]
    fn sign_mag_conversion() {
        // 0b000 is +1, 0b111 is -7, per the front-end's encoding.
        assert_eq!(to_signed(0b0000_0001), (1, 1));
        assert_eq!(to_signed(0b1110_0001), (-7, 1));
        assert_eq!(to_signed(0b0111_1101), (7, -7));
    }
}
