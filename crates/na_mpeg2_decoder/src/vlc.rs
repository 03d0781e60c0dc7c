//! MPEG-1/2 variable length code tables (ISO/IEC 13818-2 Annex B).
//!
//! Every table is a flat lookup indexed by the next `max_bits` bits of the
//! stream. Each entry holds the decoded symbol and the code length.

use crate::bitreader::BitReader;

// ─── Generic VLC engine ─────────────────────────────────────────────────────

/// Flat decode table built from prefix codes.
pub struct VlcTable {
    entries:  Vec<(i32, u8)>, // (symbol, code_len)
    max_bits: u8,
}

impl VlcTable {
    /// Build from `(code_bits, code_len, symbol)` triples.
    pub fn build(codes: &[(u32, u8, i32)], max_bits: u8) -> Self {
        let size = 1usize << max_bits;
        let mut entries = vec![(i32::MIN, 0u8); size];
        for &(bits, len, sym) in codes {
            debug_assert!(len <= max_bits);
            let prefix = (bits as usize) << (max_bits - len);
            let spread = 1usize << (max_bits - len);
            for e in &mut entries[prefix..prefix + spread] {
                debug_assert!(e.1 == 0, "overlapping code {bits:#x}/{len}");
                *e = (sym, len);
            }
        }
        VlcTable { entries, max_bits }
    }

    /// Decode one symbol. Advances the reader by the code length; `None` for
    /// a code that is not in the table or runs past the end of the buffer.
    #[inline]
    pub fn decode(&self, br: &mut BitReader<'_>) -> Option<i32> {
        let peek = br.peek_bits(self.max_bits as u32);
        let (sym, len) = self.entries[peek as usize];
        if len == 0 {
            return None;
        }
        br.skip_bits(len as u32)?;
        Some(sym)
    }

    pub fn max_bits(&self) -> u8 { self.max_bits }
}

// ─── Macroblock address increment (B-1) ─────────────────────────────────────

pub const MBA_ESCAPE: i32 = -1;
pub const MBA_STUFFING: i32 = -2;

pub fn mba_vlc() -> VlcTable {
    let mut t: Vec<(u32, u8, i32)> = vec![
        (0b1,        1,  1),
        (0b011,      3,  2),
        (0b010,      3,  3),
        (0b0011,     4,  4),
        (0b0010,     4,  5),
        (0b00011,    5,  6),
        (0b00010,    5,  7),
        (0b0000111,  7,  8),
        (0b0000110,  7,  9),
    ];
    // 10..=15: 0000 1011 down to 0000 0110
    for (i, code) in (0x06..=0x0Bu32).rev().enumerate() {
        t.push((code, 8, 10 + i as i32));
    }
    // 16..=21: 0000 0101 11 down to 0000 0100 10
    for (i, code) in (0x12..=0x17u32).rev().enumerate() {
        t.push((code, 10, 16 + i as i32));
    }
    // 22..=33: 0000 0100 011 down to 0000 0011 000
    for (i, code) in (0x18..=0x23u32).rev().enumerate() {
        t.push((code, 11, 22 + i as i32));
    }
    t.push((0b00000001000, 11, MBA_ESCAPE));
    t.push((0b00000001111, 11, MBA_STUFFING));
    VlcTable::build(&t, 11)
}

// ─── Macroblock type (B-2 .. B-4, D pictures) ───────────────────────────────

pub const MB_INTRA: i32 = 1 << 0;
pub const MB_PATTERN: i32 = 1 << 1;
pub const MB_MOTION_BACKWARD: i32 = 1 << 2;
pub const MB_MOTION_FORWARD: i32 = 1 << 3;
pub const MB_QUANT: i32 = 1 << 4;

pub fn mb_type_i_vlc() -> VlcTable {
    const T: &[(u32, u8, i32)] = &[
        (0b1,  1, MB_INTRA),
        (0b01, 2, MB_INTRA | MB_QUANT),
    ];
    VlcTable::build(T, 2)
}

pub fn mb_type_p_vlc() -> VlcTable {
    const T: &[(u32, u8, i32)] = &[
        (0b1,      1, MB_MOTION_FORWARD | MB_PATTERN),
        (0b01,     2, MB_PATTERN),
        (0b001,    3, MB_MOTION_FORWARD),
        (0b00011,  5, MB_INTRA),
        (0b00010,  5, MB_MOTION_FORWARD | MB_PATTERN | MB_QUANT),
        (0b00001,  5, MB_PATTERN | MB_QUANT),
        (0b000001, 6, MB_INTRA | MB_QUANT),
    ];
    VlcTable::build(T, 6)
}

pub fn mb_type_b_vlc() -> VlcTable {
    const FB: i32 = MB_MOTION_FORWARD | MB_MOTION_BACKWARD;
    const T: &[(u32, u8, i32)] = &[
        (0b10,     2, FB),
        (0b11,     2, FB | MB_PATTERN),
        (0b010,    3, MB_MOTION_BACKWARD),
        (0b011,    3, MB_MOTION_BACKWARD | MB_PATTERN),
        (0b0010,   4, MB_MOTION_FORWARD),
        (0b0011,   4, MB_MOTION_FORWARD | MB_PATTERN),
        (0b00011,  5, MB_INTRA),
        (0b00010,  5, FB | MB_PATTERN | MB_QUANT),
        (0b000011, 6, MB_MOTION_FORWARD | MB_PATTERN | MB_QUANT),
        (0b000010, 6, MB_MOTION_BACKWARD | MB_PATTERN | MB_QUANT),
        (0b000001, 6, MB_INTRA | MB_QUANT),
    ];
    VlcTable::build(T, 6)
}

/// D pictures carry a single intra type.
pub fn mb_type_d_vlc() -> VlcTable {
    VlcTable::build(&[(0b1, 1, MB_INTRA)], 1)
}

// ─── Coded block pattern (B-9) ──────────────────────────────────────────────

pub fn cbp_vlc() -> VlcTable {
    // (code, len) indexed by the 6-bit pattern value.
    const T: [(u32, u8); 64] = [
        (0x01, 9), (0x0b, 5), (0x09, 5), (0x0d, 6), (0x0d, 4), (0x17, 7), (0x13, 7), (0x1f, 8),
        (0x0c, 4), (0x16, 7), (0x12, 7), (0x1e, 8), (0x13, 5), (0x1b, 8), (0x17, 8), (0x13, 8),
        (0x0b, 4), (0x15, 7), (0x11, 7), (0x1d, 8), (0x11, 5), (0x19, 8), (0x15, 8), (0x11, 8),
        (0x0f, 6), (0x0f, 8), (0x0d, 8), (0x03, 9), (0x0f, 5), (0x0b, 8), (0x07, 8), (0x07, 9),
        (0x0a, 4), (0x14, 7), (0x10, 7), (0x1c, 8), (0x0e, 6), (0x0e, 8), (0x0c, 8), (0x02, 9),
        (0x10, 5), (0x18, 8), (0x14, 8), (0x10, 8), (0x0e, 5), (0x0a, 8), (0x06, 8), (0x06, 9),
        (0x12, 5), (0x1a, 8), (0x16, 8), (0x12, 8), (0x0d, 5), (0x09, 8), (0x05, 8), (0x05, 9),
        (0x0c, 5), (0x08, 8), (0x04, 8), (0x04, 9), (0x07, 3), (0x0a, 5), (0x08, 5), (0x0c, 6),
    ];
    let codes: Vec<(u32, u8, i32)> =
        T.iter().enumerate().map(|(v, &(c, l))| (c, l, v as i32)).collect();
    VlcTable::build(&codes, 9)
}

// ─── Motion vectors (B-10, B-11) ────────────────────────────────────────────

/// Magnitude of motion_code; a sign bit follows every non-zero magnitude.
pub fn motion_code_vlc() -> VlcTable {
    const T: &[(u32, u8, i32)] = &[
        (0b1,          1,  0),
        (0b01,         2,  1),
        (0b001,        3,  2),
        (0b0001,       4,  3),
        (0b000011,     6,  4),
        (0b0000101,    7,  5),
        (0b0000100,    7,  6),
        (0b0000011,    7,  7),
        (0b000001011,  9,  8),
        (0b000001010,  9,  9),
        (0b000001001,  9, 10),
        (0b0000010001, 10, 11),
        (0b0000010000, 10, 12),
        (0b0000001111, 10, 13),
        (0b0000001110, 10, 14),
        (0b0000001101, 10, 15),
        (0b0000001100, 10, 16),
    ];
    VlcTable::build(T, 10)
}

pub fn dmvector_vlc() -> VlcTable {
    const T: &[(u32, u8, i32)] = &[
        (0b0,  1,  0),
        (0b10, 2,  1),
        (0b11, 2, -1),
    ];
    VlcTable::build(T, 2)
}

// ─── DC size (B-12, B-13) ───────────────────────────────────────────────────

pub fn dc_luma_vlc() -> VlcTable {
    const T: &[(u32, u8, i32)] = &[
        (0b100,       3,  0),
        (0b00,        2,  1),
        (0b01,        2,  2),
        (0b101,       3,  3),
        (0b110,       3,  4),
        (0b1110,      4,  5),
        (0b11110,     5,  6),
        (0b111110,    6,  7),
        (0b1111110,   7,  8),
        (0b11111110,  8,  9),
        (0b111111110, 9, 10),
        (0b111111111, 9, 11),
    ];
    VlcTable::build(T, 9)
}

pub fn dc_chroma_vlc() -> VlcTable {
    const T: &[(u32, u8, i32)] = &[
        (0b00,          2,  0),
        (0b01,          2,  1),
        (0b10,          2,  2),
        (0b110,         3,  3),
        (0b1110,        4,  4),
        (0b11110,       5,  5),
        (0b111110,      6,  6),
        (0b1111110,     7,  7),
        (0b11111110,    8,  8),
        (0b111111110,   9,  9),
        (0b1111111110, 10, 10),
        (0b1111111111, 10, 11),
    ];
    VlcTable::build(T, 10)
}

// ─── DCT coefficients (B-14, B-15) ──────────────────────────────────────────
//
// Symbols pack run and level magnitude as `run << 8 | level`; the sign bit
// follows the code in the stream.

pub const DCT_ESCAPE: i32 = -1;
pub const DCT_EOB: i32 = -2;

#[inline(always)]
pub const fn pack_rl(run: u8, level: u8) -> i32 {
    ((run as i32) << 8) | level as i32
}

#[inline(always)]
pub fn unpack_rl(v: i32) -> (usize, i32) {
    (((v >> 8) & 0x3F) as usize, v & 0xFF)
}

/// Levels 16..=40 of run 0, shared by both tables.
const RUN0_TAIL: [(u32, u8); 25] = [
    (0x1f, 14), (0x1e, 14), (0x1d, 14), (0x1c, 14), (0x1b, 14), (0x1a, 14), (0x19, 14), (0x18, 14),
    (0x17, 14), (0x16, 14), (0x15, 14), (0x14, 14), (0x13, 14), (0x12, 14), (0x11, 14), (0x10, 14),
    (0x18, 15), (0x17, 15), (0x16, 15), (0x15, 15), (0x14, 15), (0x13, 15), (0x12, 15), (0x11, 15),
    (0x10, 15),
];

/// Runs 17..=31, level 1, shared by both tables.
const LONG_RUNS: [(u32, u8); 15] = [
    (0x1f, 12), (0x1a, 12), (0x19, 12), (0x17, 12), (0x16, 12),
    (0x1f, 13), (0x1e, 13), (0x1d, 13), (0x1c, 13), (0x1b, 13),
    (0x1f, 16), (0x1e, 16), (0x1d, 16), (0x1c, 16), (0x1b, 16),
];

const B14_RUN0_HEAD: [(u32, u8); 15] = [
    (0x03, 2), (0x04, 4), (0x05, 5), (0x06, 7), (0x26, 8), (0x21, 8), (0x0a, 10), (0x1d, 12),
    (0x18, 12), (0x13, 12), (0x10, 12), (0x1a, 13), (0x19, 13), (0x18, 13), (0x17, 13),
];

const B14_RUNS: [&[(u32, u8)]; 16] = [
    &[(0x03, 3), (0x06, 6), (0x25, 8), (0x0c, 10), (0x1b, 12), (0x16, 13), (0x15, 13),
      (0x1f, 15), (0x1e, 15), (0x1d, 15), (0x1c, 15), (0x1b, 15), (0x1a, 15), (0x19, 15),
      (0x13, 16), (0x12, 16), (0x11, 16), (0x10, 16)],
    &[(0x05, 4), (0x04, 7), (0x0b, 10), (0x14, 12), (0x14, 13)],
    &[(0x07, 5), (0x24, 8), (0x1c, 12), (0x13, 13)],
    &[(0x06, 5), (0x0f, 10), (0x12, 12)],
    &[(0x07, 6), (0x09, 10), (0x12, 13)],
    &[(0x05, 6), (0x1e, 12), (0x14, 16)],
    &[(0x04, 6), (0x15, 12)],
    &[(0x07, 7), (0x11, 12)],
    &[(0x05, 7), (0x11, 13)],
    &[(0x27, 8), (0x10, 13)],
    &[(0x23, 8), (0x1a, 16)],
    &[(0x22, 8), (0x19, 16)],
    &[(0x20, 8), (0x18, 16)],
    &[(0x0e, 10), (0x17, 16)],
    &[(0x0d, 10), (0x16, 16)],
    &[(0x08, 10), (0x15, 16)],
];

const B15_RUN0_HEAD: [(u32, u8); 15] = [
    (0x02, 2), (0x06, 3), (0x07, 4), (0x1c, 5), (0x1d, 5), (0x05, 6), (0x04, 6), (0x7b, 7),
    (0x7c, 7), (0x23, 8), (0x22, 8), (0xfa, 8), (0xfb, 8), (0xfe, 8), (0xff, 8),
];

const B15_RUNS: [&[(u32, u8)]; 16] = [
    &[(0x02, 3), (0x06, 5), (0x79, 7), (0x27, 8), (0x20, 8), (0x16, 13), (0x15, 13),
      (0x1f, 15), (0x1e, 15), (0x1d, 15), (0x1c, 15), (0x1b, 15), (0x1a, 15), (0x19, 15),
      (0x13, 16), (0x12, 16), (0x11, 16), (0x10, 16)],
    &[(0x05, 5), (0x07, 7), (0xfc, 8), (0x0c, 10), (0x14, 13)],
    &[(0x07, 5), (0x26, 8), (0x1c, 12), (0x13, 13)],
    &[(0x06, 6), (0xfd, 8), (0x12, 12)],
    &[(0x07, 6), (0x04, 9), (0x12, 13)],
    &[(0x06, 7), (0x1e, 12), (0x14, 16)],
    &[(0x04, 7), (0x15, 12)],
    &[(0x05, 7), (0x11, 12)],
    &[(0x78, 7), (0x11, 13)],
    &[(0x7a, 7), (0x10, 13)],
    &[(0x21, 8), (0x1a, 16)],
    &[(0x25, 8), (0x19, 16)],
    &[(0x24, 8), (0x18, 16)],
    &[(0x05, 9), (0x17, 16)],
    &[(0x07, 9), (0x16, 16)],
    &[(0x0d, 10), (0x15, 16)],
];

fn dct_codes(
    run0_head: &[(u32, u8); 15],
    runs: &[&[(u32, u8)]; 16],
    eob: (u32, u8),
) -> Vec<(u32, u8, i32)> {
    let mut t = Vec::with_capacity(120);
    for (i, &(c, l)) in run0_head.iter().chain(RUN0_TAIL.iter()).enumerate() {
        t.push((c, l, pack_rl(0, i as u8 + 1)));
    }
    for (r, codes) in runs.iter().enumerate() {
        for (i, &(c, l)) in codes.iter().enumerate() {
            t.push((c, l, pack_rl(r as u8 + 1, i as u8 + 1)));
        }
    }
    for (i, &(c, l)) in LONG_RUNS.iter().enumerate() {
        t.push((c, l, pack_rl(17 + i as u8, 1)));
    }
    t.push((0b000001, 6, DCT_ESCAPE));
    t.push((eob.0, eob.1, DCT_EOB));
    t
}

/// Table B-14. Used for all non-intra blocks, for intra blocks when
/// `intra_vlc_format` is 0 and for all MPEG-1 blocks.
pub fn dct_b14_vlc() -> VlcTable {
    VlcTable::build(&dct_codes(&B14_RUN0_HEAD, &B14_RUNS, (0b10, 2)), 16)
}

/// Table B-15, intra blocks with `intra_vlc_format` set.
pub fn dct_b15_vlc() -> VlcTable {
    VlcTable::build(&dct_codes(&B15_RUN0_HEAD, &B15_RUNS, (0b0110, 4)), 16)
}

/// All tables needed by the slice decoder.
pub struct VlcSet {
    pub mba:         VlcTable,
    pub mb_type_i:   VlcTable,
    pub mb_type_p:   VlcTable,
    pub mb_type_b:   VlcTable,
    pub mb_type_d:   VlcTable,
    pub cbp:         VlcTable,
    pub motion_code: VlcTable,
    pub dmvector:    VlcTable,
    pub dc_luma:     VlcTable,
    pub dc_chroma:   VlcTable,
    pub dct_b14:     VlcTable,
    pub dct_b15:     VlcTable,
}

impl VlcSet {
    pub fn new() -> Self {
        VlcSet {
            mba:         mba_vlc(),
            mb_type_i:   mb_type_i_vlc(),
            mb_type_p:   mb_type_p_vlc(),
            mb_type_b:   mb_type_b_vlc(),
            mb_type_d:   mb_type_d_vlc(),
            cbp:         cbp_vlc(),
            motion_code: motion_code_vlc(),
            dmvector:    dmvector_vlc(),
            dc_luma:     dc_luma_vlc(),
            dc_chroma:   dc_chroma_vlc(),
            dct_b14:     dct_b14_vlc(),
            dct_b15:     dct_b15_vlc(),
        }
    }
}

impl Default for VlcSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bits(t: &VlcTable, bytes: &[u8]) -> (Option<i32>, usize) {
        let mut br = BitReader::new(bytes);
        let v = t.decode(&mut br);
        (v, br.bits_read())
    }

    #[test]
    fn mba_codes() {
        let t = mba_vlc();
        assert_eq!(decode_bits(&t, &[0b1000_0000]), (Some(1), 1));
        assert_eq!(decode_bits(&t, &[0b0000_1011]), (Some(10), 8));
        assert_eq!(decode_bits(&t, &[0b0000_0101, 0b1100_0000]), (Some(16), 10));
        assert_eq!(decode_bits(&t, &[0b0000_0011, 0b0000_0000]), (Some(33), 11));
        assert_eq!(decode_bits(&t, &[0b0000_0001, 0b0000_0000]), (Some(MBA_ESCAPE), 11));
        assert_eq!(decode_bits(&t, &[0b0000_0001, 0b1110_0000]), (Some(MBA_STUFFING), 11));
        // zero padding at the end of a slice is not a code
        assert_eq!(decode_bits(&t, &[0, 0]).0, None);
    }

    #[test]
    fn tables_are_prefix_free() {
        // `build` asserts against overlapping codes in debug builds.
        let set = VlcSet::new();
        assert_eq!(set.dct_b14.max_bits(), 16);
        assert_eq!(set.cbp.max_bits(), 9);
    }

    #[test]
    fn dct_tables() {
        let b14 = dct_b14_vlc();
        let b15 = dct_b15_vlc();
        assert_eq!(decode_bits(&b14, &[0b1000_0000]), (Some(DCT_EOB), 2));
        assert_eq!(decode_bits(&b14, &[0b1100_0000]), (Some(pack_rl(0, 1)), 2));
        assert_eq!(decode_bits(&b14, &[0b0110_0000]), (Some(pack_rl(1, 1)), 3));
        assert_eq!(decode_bits(&b14, &[0b0000_0100]), (Some(DCT_ESCAPE), 6));
        // run 0 level 40: 0000 0000 0001 0000
        assert_eq!(decode_bits(&b14, &[0x00, 0x20]), (Some(pack_rl(0, 40)), 15));
        assert_eq!(decode_bits(&b14, &[0x00, 0x1B]), (Some(pack_rl(31, 1)), 16));
        assert_eq!(decode_bits(&b15, &[0b0110_0000]), (Some(DCT_EOB), 4));
        assert_eq!(decode_bits(&b15, &[0b1000_0000]), (Some(pack_rl(0, 1)), 2));
        assert_eq!(decode_bits(&b15, &[0b1111_1111]), (Some(pack_rl(0, 15)), 8));
        assert_eq!(unpack_rl(pack_rl(17, 1)), (17, 1));
    }

    #[test]
    fn cbp_and_motion() {
        let cbp = cbp_vlc();
        assert_eq!(decode_bits(&cbp, &[0b1110_0000]), (Some(60), 3));
        assert_eq!(decode_bits(&cbp, &[0b0000_0000, 0b1000_0000]), (Some(0), 9));
        let mc = motion_code_vlc();
        assert_eq!(decode_bits(&mc, &[0b1000_0000]), (Some(0), 1));
        assert_eq!(decode_bits(&mc, &[0b0000_0011, 0b0000_0000]), (Some(16), 10));
        let dmv = dmvector_vlc();
        assert_eq!(decode_bits(&dmv, &[0b1100_0000]), (Some(-1), 2));
    }
}
