//! 8x8 integer inverse DCT.
//!
//! Separable row/column butterflies with 8-bit precision constants
//! (`Wn = round(cos(n*pi/16) * sqrt(2) * (1 << 14))`), a right shift of 11
//! after the row pass and 20 after the column pass. Rows whose AC terms are
//! all zero collapse to `dc << 3`, which is part of the transform definition;
//! the whole-block DC shortcut below is derived from it and gives identical
//! output.

#[inline(always)]
fn clip_u8(x: i32) -> u8 {
    if x < 0 { 0 } else if x > 255 { 255 } else { x as u8 }
}

const W1: i64 = 22725;
const W2: i64 = 21407;
const W3: i64 = 19266;
const W4: i64 = 16383;
const W5: i64 = 12873;
const W6: i64 = 8867;
const W7: i64 = 4520;

const ROW_SHIFT: i64 = 11;
const COL_SHIFT: i64 = 20;
const DC_SHIFT: i32 = 3;

// (1 << (COL_SHIFT - 1)) / W4, folded into the DC term of the column pass.
const COL_RND: i64 = (1 << (COL_SHIFT - 1)) / W4;

#[inline(always)]
fn idct_row(row: &mut [i16]) {
    if row[1..8].iter().all(|&c| c == 0) {
        let t = ((row[0] as i32) << DC_SHIFT) as i16;
        row[..8].fill(t);
        return;
    }

    let r: [i64; 8] = std::array::from_fn(|i| row[i] as i64);

    let mut a0 = W4 * r[0] + (1 << (ROW_SHIFT - 1));
    let mut a1 = a0;
    let mut a2 = a0;
    let mut a3 = a0;

    a0 += W2 * r[2];
    a1 += W6 * r[2];
    a2 -= W6 * r[2];
    a3 -= W2 * r[2];

    let mut b0 = W1 * r[1] + W3 * r[3];
    let mut b1 = W3 * r[1] - W7 * r[3];
    let mut b2 = W5 * r[1] - W1 * r[3];
    let mut b3 = W7 * r[1] - W5 * r[3];

    if r[4] != 0 || r[5] != 0 || r[6] != 0 || r[7] != 0 {
        a0 += W4 * r[4] + W6 * r[6];
        a1 += -W4 * r[4] - W2 * r[6];
        a2 += -W4 * r[4] + W2 * r[6];
        a3 += W4 * r[4] - W6 * r[6];

        b0 += W5 * r[5] + W7 * r[7];
        b1 += -W1 * r[5] - W5 * r[7];
        b2 += W7 * r[5] + W3 * r[7];
        b3 += W3 * r[5] - W1 * r[7];
    }

    row[0] = ((a0 + b0) >> ROW_SHIFT) as i16;
    row[7] = ((a0 - b0) >> ROW_SHIFT) as i16;
    row[1] = ((a1 + b1) >> ROW_SHIFT) as i16;
    row[6] = ((a1 - b1) >> ROW_SHIFT) as i16;
    row[2] = ((a2 + b2) >> ROW_SHIFT) as i16;
    row[5] = ((a2 - b2) >> ROW_SHIFT) as i16;
    row[3] = ((a3 + b3) >> ROW_SHIFT) as i16;
    row[4] = ((a3 - b3) >> ROW_SHIFT) as i16;
}

/// Column pass for one column of a row-transformed block.
#[inline(always)]
fn idct_col(block: &[i16; 64], col: usize) -> [i32; 8] {
    let c: [i64; 8] = std::array::from_fn(|r| block[col + 8 * r] as i64);

    let mut a0 = W4 * (c[0] + COL_RND);
    let mut a1 = a0;
    let mut a2 = a0;
    let mut a3 = a0;

    a0 += W2 * c[2];
    a1 += W6 * c[2];
    a2 -= W6 * c[2];
    a3 -= W2 * c[2];

    let mut b0 = W1 * c[1] + W3 * c[3];
    let mut b1 = W3 * c[1] - W7 * c[3];
    let mut b2 = W5 * c[1] - W1 * c[3];
    let mut b3 = W7 * c[1] - W5 * c[3];

    if c[4] != 0 {
        a0 += W4 * c[4];
        a1 -= W4 * c[4];
        a2 -= W4 * c[4];
        a3 += W4 * c[4];
    }
    if c[5] != 0 {
        b0 += W5 * c[5];
        b1 -= W1 * c[5];
        b2 += W7 * c[5];
        b3 += W3 * c[5];
    }
    if c[6] != 0 {
        a0 += W6 * c[6];
        a1 -= W2 * c[6];
        a2 += W2 * c[6];
        a3 -= W6 * c[6];
    }
    if c[7] != 0 {
        b0 += W7 * c[7];
        b1 -= W5 * c[7];
        b2 += W3 * c[7];
        b3 -= W1 * c[7];
    }

    [
        ((a0 + b0) >> COL_SHIFT) as i32,
        ((a1 + b1) >> COL_SHIFT) as i32,
        ((a2 + b2) >> COL_SHIFT) as i32,
        ((a3 + b3) >> COL_SHIFT) as i32,
        ((a3 - b3) >> COL_SHIFT) as i32,
        ((a2 - b2) >> COL_SHIFT) as i32,
        ((a1 - b1) >> COL_SHIFT) as i32,
        ((a0 - b0) >> COL_SHIFT) as i32,
    ]
}

/// Full transform into signed residuals, without the block-level shortcut.
pub fn idct(block: &[i16; 64]) -> [i32; 64] {
    let mut tmp = *block;
    for row in tmp.chunks_exact_mut(8) {
        idct_row(row);
    }
    let mut out = [0i32; 64];
    for col in 0..8 {
        let v = idct_col(&tmp, col);
        for (r, &s) in v.iter().enumerate() {
            out[col + 8 * r] = s;
        }
    }
    out
}

/// Output sample of a block whose only non-zero coefficient is the DC term.
#[inline]
pub fn dc_only_value(dc: i16) -> i32 {
    let c0 = (((dc as i32) << DC_SHIFT) as i16) as i64;
    ((W4 * (c0 + COL_RND)) >> COL_SHIFT) as i32
}

#[inline]
fn is_dc_only(block: &[i16; 64]) -> bool {
    block[1..].iter().all(|&c| c == 0)
}

/// Transform `block` and store clamped samples (intra blocks).
pub fn idct_put(block: &[i16; 64], dest: &mut [u8], off: usize, stride: usize) {
    if is_dc_only(block) {
        let v = clip_u8(dc_only_value(block[0]));
        for y in 0..8 {
            let o = off + y * stride;
            dest[o..o + 8].fill(v);
        }
        return;
    }
    let res = idct(block);
    for y in 0..8 {
        let o = off + y * stride;
        for x in 0..8 {
            dest[o + x] = clip_u8(res[y * 8 + x]);
        }
    }
}

/// Transform `block` and add it to the prediction already in `dest`.
pub fn idct_add(block: &[i16; 64], dest: &mut [u8], off: usize, stride: usize) {
    if is_dc_only(block) {
        let v = dc_only_value(block[0]);
        for y in 0..8 {
            let o = off + y * stride;
            for d in &mut dest[o..o + 8] {
                *d = clip_u8(*d as i32 + v);
            }
        }
        return;
    }
    let res = idct(block);
    for y in 0..8 {
        let o = off + y * stride;
        for x in 0..8 {
            let d = &mut dest[o + x];
            *d = clip_u8(*d as i32 + res[y * 8 + x]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_dct(pixels: &[i32; 64]) -> [i16; 64] {
        let mut out = [0i16; 64];
        let pi = std::f64::consts::PI;
        for v in 0..8 {
            for u in 0..8 {
                let cu = if u == 0 { std::f64::consts::FRAC_1_SQRT_2 } else { 1.0 };
                let cv = if v == 0 { std::f64::consts::FRAC_1_SQRT_2 } else { 1.0 };
                let mut s = 0.0;
                for y in 0..8 {
                    for x in 0..8 {
                        s += pixels[y * 8 + x] as f64
                            * ((2 * x + 1) as f64 * u as f64 * pi / 16.0).cos()
                            * ((2 * y + 1) as f64 * v as f64 * pi / 16.0).cos();
                    }
                }
                out[v * 8 + u] = (0.25 * cu * cv * s).round() as i16;
            }
        }
        out
    }

    #[test]
    fn dc_fast_path_matches_full_transform() {
        for dc in -2048i16..=2047 {
            let mut block = [0i16; 64];
            block[0] = dc;
            let full = idct(&block);
            let fast = dc_only_value(dc);
            assert!(full.iter().all(|&v| v == fast), "dc {dc}");
        }
    }

    #[test]
    fn dc_value_examples() {
        assert_eq!(dc_only_value(1024), 128);
        assert_eq!(dc_only_value(0), 0);
        assert_eq!(dc_only_value(8), 1);
        assert_eq!(dc_only_value(-8), -1);
    }

    #[test]
    fn round_trips_forward_dct() {
        // deterministic pseudo-random residual blocks
        let mut seed = 0x1234_5678u32;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            ((seed >> 16) % 512) as i32 - 256
        };
        for _ in 0..64 {
            let pixels: [i32; 64] = std::array::from_fn(|_| next());
            let coeffs = forward_dct(&pixels);
            let rec = idct(&coeffs);
            for i in 0..64 {
                assert!((rec[i] - pixels[i]).abs() <= 1, "sample {i}: {} vs {}", rec[i], pixels[i]);
            }
        }
    }

    #[test]
    fn put_and_add_clamp() {
        let mut block = [0i16; 64];
        block[0] = 2047;
        let mut dest = vec![0u8; 16 * 8];
        idct_put(&block, &mut dest, 0, 16);
        assert!(dest.chunks(16).all(|r| r[..8].iter().all(|&p| p == 255) && r[8..].iter().all(|&p| p == 0)));

        block[0] = -80;
        let mut pred = vec![5u8; 64];
        idct_add(&block, &mut pred, 0, 8);
        assert!(pred.iter().all(|&p| p == 0));

        let mut block = [0i16; 64];
        block[1] = 100;
        let mut out = vec![128u8; 64];
        idct_add(&block, &mut out, 0, 8);
        // a horizontal cosine: left half brighter than right half
        assert!(out[0] > out[7]);
        assert_eq!(out[0], out[56]);
    }
}
