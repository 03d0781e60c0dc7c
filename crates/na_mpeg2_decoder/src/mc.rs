//! Half-pel motion compensation kernels.
//!
//! Each kernel reads a `w` x `h` block (plus one extra column and/or row for
//! the half-pel cases) and either stores the prediction or averages it into
//! what is already in the destination, as bidirectional and dual-prime
//! prediction require.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blend {
    Put,
    Avg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interp {
    Full,
    HalfX,
    HalfY,
    HalfXY,
}

impl Interp {
    pub fn from_half(half_x: bool, half_y: bool) -> Self {
        match (half_x, half_y) {
            (false, false) => Interp::Full,
            (true, false) => Interp::HalfX,
            (false, true) => Interp::HalfY,
            (true, true) => Interp::HalfXY,
        }
    }
}

#[inline(always)]
fn store(blend: Blend, d: &mut u8, v: u32) {
    *d = match blend {
        Blend::Put => v as u8,
        Blend::Avg => ((*d as u32 + v + 1) >> 1) as u8,
    };
}

/// Destination block location.
#[derive(Clone, Copy, Debug)]
pub struct BlockDst {
    pub off: usize,
    pub stride: usize,
}

/// Source block location (integer sample position of the top-left corner).
#[derive(Clone, Copy, Debug)]
pub struct BlockSrc {
    pub off: usize,
    pub stride: usize,
}

#[allow(clippy::too_many_arguments)]
pub fn mc_block(
    blend: Blend,
    interp: Interp,
    dst: &mut [u8],
    d: BlockDst,
    src: &[u8],
    s: BlockSrc,
    w: usize,
    h: usize,
) {
    for y in 0..h {
        let so = s.off + y * s.stride;
        let row = &mut dst[d.off + y * d.stride..d.off + y * d.stride + w];
        match interp {
            Interp::Full => {
                for (x, p) in row.iter_mut().enumerate() {
                    store(blend, p, src[so + x] as u32);
                }
            }
            Interp::HalfX => {
                for (x, p) in row.iter_mut().enumerate() {
                    let v = (src[so + x] as u32 + src[so + x + 1] as u32 + 1) >> 1;
                    store(blend, p, v);
                }
            }
            Interp::HalfY => {
                let so2 = so + s.stride;
                for (x, p) in row.iter_mut().enumerate() {
                    let v = (src[so + x] as u32 + src[so2 + x] as u32 + 1) >> 1;
                    store(blend, p, v);
                }
            }
            Interp::HalfXY => {
                let so2 = so + s.stride;
                for (x, p) in row.iter_mut().enumerate() {
                    let v = (src[so + x] as u32
                        + src[so + x + 1] as u32
                        + src[so2 + x] as u32
                        + src[so2 + x + 1] as u32
                        + 2)
                        >> 2;
                    store(blend, p, v);
                }
            }
        }
    }
}
