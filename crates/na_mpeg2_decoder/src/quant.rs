//! Inverse quantization (ISO/IEC 13818-2 7.4, ISO/IEC 11172-2 2.4.4).
//!
//! `qscale` is always the quantizer scale proper (twice the 5-bit code for
//! the linear mapping), so the same arithmetic covers both standards.

use crate::tables::NON_LINEAR_QSCALE;

pub const COEFF_MIN: i32 = -2048;
pub const COEFF_MAX: i32 = 2047;

/// Map a `quantiser_scale_code` to the quantizer scale.
#[inline]
pub fn quantizer_scale(code: u32, q_scale_type: bool) -> i32 {
    let code = (code & 31) as usize;
    if q_scale_type {
        NON_LINEAR_QSCALE[code] as i32
    } else {
        (code as i32) << 1
    }
}

#[inline(always)]
pub fn saturate(v: i32) -> i32 {
    v.clamp(COEFF_MIN, COEFF_MAX)
}

/// Intra DC: the accumulated predictor scaled by the DC precision.
#[inline]
pub fn intra_dc(dc: i32, intra_dc_precision: u8) -> i32 {
    saturate(dc << (3 - intra_dc_precision))
}

/// MPEG-2 intra AC coefficient.
#[inline]
pub fn intra_ac(level: i32, qscale: i32, weight: u8) -> i32 {
    saturate(level * qscale * weight as i32 / 16)
}

/// MPEG-2 non-intra coefficient.
#[inline]
pub fn non_intra(level: i32, qscale: i32, weight: u8) -> i32 {
    saturate((2 * level + level.signum()) * qscale * weight as i32 / 32)
}

/// Force an even reconstruction towards zero (MPEG-1 only).
#[inline(always)]
fn oddify(v: i32) -> i32 {
    if v & 1 == 0 { v - v.signum() } else { v }
}

#[inline]
pub fn mpeg1_intra_ac(level: i32, qscale: i32, weight: u8) -> i32 {
    saturate(oddify(level * qscale * weight as i32 / 16))
}

#[inline]
pub fn mpeg1_non_intra(level: i32, qscale: i32, weight: u8) -> i32 {
    saturate(oddify((2 * level + level.signum()) * qscale * weight as i32 / 32))
}

/// MPEG-2 mismatch control: tracks the parity of the coefficient sum and
/// toggles the LSB of the last coefficient when the sum would be even.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mismatch {
    parity: i32,
}

impl Mismatch {
    pub fn new() -> Self {
        Mismatch { parity: 0 }
    }

    #[inline(always)]
    pub fn add(&mut self, v: i32) {
        self.parity ^= v;
    }

    /// `last` is the storage index of coefficient 63.
    pub fn apply(self, block: &mut [i16; 64], last: usize) {
        if self.parity & 1 == 0 {
            block[last] ^= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantizer_scale_mappings() {
        assert_eq!(quantizer_scale(1, false), 2);
        assert_eq!(quantizer_scale(31, false), 62);
        assert_eq!(quantizer_scale(9, true), 10);
        assert_eq!(quantizer_scale(31, true), 112);
    }

    #[test]
    fn truncation_is_toward_zero() {
        // 3 * 2 * 19 / 16 = 7.125
        assert_eq!(intra_ac(3, 2, 19), 7);
        assert_eq!(intra_ac(-3, 2, 19), -7);
        // (2 + 1) * 2 * 16 / 32 = 3
        assert_eq!(non_intra(1, 2, 16), 3);
        assert_eq!(non_intra(-1, 2, 16), -3);
        assert_eq!(intra_dc(128, 0), 1024);
        assert_eq!(intra_dc(1023, 3), 1023);
    }

    #[test]
    fn saturates_to_twelve_bits() {
        assert_eq!(intra_ac(2047, 112, 255), COEFF_MAX);
        assert_eq!(non_intra(-2048, 112, 255), COEFF_MIN);
    }

    #[test]
    fn mpeg1_reconstruction_is_odd() {
        // 2 * 4 * 16 / 16 = 8 -> 7
        assert_eq!(mpeg1_intra_ac(2, 4, 16), 7);
        assert_eq!(mpeg1_intra_ac(-2, 4, 16), -7);
        // (2 + 1) * 2 * 16 / 32 = 3 stays odd
        assert_eq!(mpeg1_non_intra(1, 2, 16), 3);
        assert_eq!(mpeg1_intra_ac(1, 2, 1), 0);
    }

    #[test]
    fn mismatch_makes_sum_odd() {
        let mut block = [0i16; 64];
        block[0] = 1024;
        block[5] = -6;
        let mut m = Mismatch::new();
        m.add(1024);
        m.add(-6);
        m.apply(&mut block, 63);
        let sum: i32 = block.iter().map(|&v| v as i32).sum();
        assert_eq!(sum & 1, 1);
        assert_eq!(block[63], 1);

        let mut odd = [0i16; 64];
        odd[0] = 3;
        let mut m = Mismatch::new();
        m.add(3);
        m.apply(&mut odd, 63);
        assert_eq!(odd[63], 0);
    }
}
