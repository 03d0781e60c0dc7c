//! Motion vector decoding and motion-compensated prediction of macroblocks.
//!
//! Prediction is dispatched on the macroblock's [`MotionType`] and the
//! picture structure; the chroma format decides how the luma vector maps onto
//! the chroma planes. Every sampled block is clamped to the reference view so
//! no read falls outside the plane.

use crate::bitreader::BitReader;
use crate::error::{slice_err, DecoderError, Result};
use crate::frame::{ChromaFormat, Field, References, ViewKind, YuvFrame};
use crate::header::{PictureParams, PictureStructure};
use crate::mc::{mc_block, Blend, BlockDst, BlockSrc, Interp};
use crate::vlc::{VlcSet, VlcTable};

/// How the prediction of a non-intra macroblock is formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionType {
    /// One frame vector (frame pictures, and all MPEG-1 prediction).
    Frame,
    /// Per-field vectors: two in frame pictures, one in field pictures.
    Field,
    /// Field pictures: separate vectors for the upper and lower 16x8 halves.
    SixteenByEight,
    /// One vector plus a small differential predicting both parities.
    DualPrime,
    /// No vectors transmitted: zero motion (P) or the previous macroblock's
    /// vectors (skipped B macroblocks).
    ZeroOrReuse,
}

impl MotionType {
    /// `frame_motion_type` / `field_motion_type`.
    pub fn from_code(code: u32, structure: PictureStructure) -> Result<Self> {
        match (code, structure.is_frame()) {
            (1, _) => Ok(MotionType::Field),
            (2, true) => Ok(MotionType::Frame),
            (2, false) => Ok(MotionType::SixteenByEight),
            (3, _) => Ok(MotionType::DualPrime),
            _ => Err(DecoderError::UnsupportedMode(format!("reserved motion type {code}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward = 0,
    Backward = 1,
}

/// Vectors of one prediction direction, in half-pel units. Vertical
/// components of field vectors are in field lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotionVectors {
    pub mv: [[i32; 2]; 2],
    pub field_select: [bool; 2],
    pub dmv: [i32; 2],
}

impl MotionVectors {
    pub fn single(x: i32, y: i32) -> Self {
        MotionVectors { mv: [[x, y], [0, 0]], ..Default::default() }
    }
}

/// Motion vector predictors `pmv[r][direction][axis]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotionPredictors {
    pub pmv: [[[i32; 2]; 2]; 2],
}

impl MotionPredictors {
    pub fn reset(&mut self) {
        self.pmv = [[[0; 2]; 2]; 2];
    }

    /// The first frame-unit vector of a direction, reused by skipped B
    /// macroblocks.
    pub fn first(&self, dir: Direction) -> [i32; 2] {
        self.pmv[0][dir as usize]
    }
}

/// Wrap a reconstructed vector into `[-16 << r_size, (16 << r_size) - 1]`.
#[inline]
pub fn bound_motion_vector(v: i32, r_size: u32) -> i32 {
    let limit = 16 << r_size;
    if v >= limit {
        v - 2 * limit
    } else if v < -limit {
        v + 2 * limit
    } else {
        v
    }
}

/// `motion_code` plus `motion_residual`, as a signed delta.
pub fn decode_motion_delta(br: &mut BitReader<'_>, vlc: &VlcTable, r_size: u32) -> Result<i32> {
    let Some(code) = vlc.decode(br) else {
        return slice_err("invalid motion_code");
    };
    if code == 0 {
        return Ok(0);
    }
    let negative = match br.read_bit() {
        Some(b) => b,
        None => return slice_err("truncated motion_code"),
    };
    let magnitude = if r_size == 0 {
        code
    } else {
        let Some(residual) = br.read_bits(r_size) else {
            return slice_err("truncated motion_residual");
        };
        ((code - 1) << r_size) + residual as i32 + 1
    };
    Ok(if negative { -magnitude } else { magnitude })
}

fn decode_component(br: &mut BitReader<'_>, vlc: &VlcTable, pred: i32, r_size: u32) -> Result<i32> {
    let delta = decode_motion_delta(br, vlc, r_size)?;
    Ok(bound_motion_vector(pred + delta, r_size))
}

fn decode_dmv(br: &mut BitReader<'_>, vlc: &VlcTable) -> Result<i32> {
    match vlc.decode(br) {
        Some(v) => Ok(v),
        None => slice_err("invalid dmvector"),
    }
}

fn read_select(br: &mut BitReader<'_>) -> Result<bool> {
    match br.read_bit() {
        Some(b) => Ok(b),
        None => slice_err("truncated motion_vertical_field_select"),
    }
}

/// Parse the vectors of one direction and update the predictors.
pub fn parse_vectors(
    br: &mut BitReader<'_>,
    vlc: &VlcSet,
    pic: &PictureParams,
    mpeg1: bool,
    kind: MotionType,
    dir: Direction,
    pred: &mut MotionPredictors,
) -> Result<MotionVectors> {
    let s = dir as usize;
    let rx = pic.r_size(s, 0);
    let ry = pic.r_size(s, 1);
    let vlc_mc = &vlc.motion_code;
    let pmv = &mut pred.pmv;
    let mut out = MotionVectors::default();
    let frame_picture = pic.structure.is_frame();

    match kind {
        MotionType::Frame if mpeg1 => {
            let x = decode_component(br, vlc_mc, pmv[0][s][0], rx)?;
            let y = decode_component(br, vlc_mc, pmv[0][s][1], ry)?;
            pmv[0][s] = [x, y];
            let shift = pic.full_pel[s] as u32;
            out.mv[0] = [x << shift, y << shift];
        }
        MotionType::Frame => {
            let x = decode_component(br, vlc_mc, pmv[0][s][0], rx)?;
            let y = decode_component(br, vlc_mc, pmv[0][s][1], ry)?;
            pmv[0][s] = [x, y];
            pmv[1][s] = [x, y];
            out.mv[0] = [x, y];
        }
        MotionType::Field if frame_picture => {
            for r in 0..2 {
                out.field_select[r] = read_select(br)?;
                let x = decode_component(br, vlc_mc, pmv[r][s][0], rx)?;
                let y = decode_component(br, vlc_mc, pmv[r][s][1] >> 1, ry)?;
                pmv[r][s] = [x, y << 1];
                out.mv[r] = [x, y];
            }
        }
        MotionType::Field => {
            out.field_select[0] = read_select(br)?;
            let x = decode_component(br, vlc_mc, pmv[0][s][0], rx)?;
            let y = decode_component(br, vlc_mc, pmv[0][s][1], ry)?;
            pmv[0][s] = [x, y];
            pmv[1][s] = [x, y];
            out.mv[0] = [x, y];
        }
        MotionType::SixteenByEight => {
            for r in 0..2 {
                out.field_select[r] = read_select(br)?;
                let x = decode_component(br, vlc_mc, pmv[r][s][0], rx)?;
                let y = decode_component(br, vlc_mc, pmv[r][s][1], ry)?;
                pmv[r][s] = [x, y];
                out.mv[r] = [x, y];
            }
        }
        MotionType::DualPrime => {
            let x = decode_component(br, vlc_mc, pmv[0][s][0], rx)?;
            let dx = decode_dmv(br, &vlc.dmvector)?;
            let pred_y = if frame_picture { pmv[0][s][1] >> 1 } else { pmv[0][s][1] };
            let y = decode_component(br, vlc_mc, pred_y, ry)?;
            let dy = decode_dmv(br, &vlc.dmvector)?;
            let stored_y = if frame_picture { y << 1 } else { y };
            pmv[0][s] = [x, stored_y];
            pmv[1][s] = [x, stored_y];
            out.mv[0] = [x, y];
            out.dmv = [dx, dy];
        }
        MotionType::ZeroOrReuse => {}
    }
    Ok(out)
}

/// Scale a same-parity field vector to the opposite parity:
/// `(v * m) // 2` with rounding away from zero.
#[inline]
fn dual_prime_scale(v: i32, m: i32) -> i32 {
    (v * m + (v > 0) as i32) >> 1
}

/// Vector predicting the opposite-parity field in dual-prime mode.
/// `m` is the field distance multiplier and `e` the vertical parity correction.
pub fn dual_prime_vector(mv: [i32; 2], dmv: [i32; 2], m: i32, e: i32) -> [i32; 2] {
    [
        dual_prime_scale(mv[0], m) + dmv[0],
        dual_prime_scale(mv[1], m) + dmv[1] + e,
    ]
}

/// Clamp a half-pel position to `[0, limit]`, returning the clamped position.
#[inline]
pub fn clamp_position(pos: i32, limit: i32) -> i32 {
    pos.max(0).min(limit)
}

#[inline]
fn chroma_vector(chroma: ChromaFormat, mv: [i32; 2]) -> [i32; 2] {
    // halving truncates toward zero
    match chroma {
        ChromaFormat::Chroma420 => [mv[0] / 2, mv[1] / 2],
        ChromaFormat::Chroma422 => [mv[0] / 2, mv[1]],
        ChromaFormat::Chroma444 => mv,
    }
}

/// Predict one plane block. `x`, `y`, `w`, `h` and `mv` are in the plane's
/// own sample grid. Returns the vector actually used after clamping.
#[allow(clippy::too_many_arguments)]
fn predict_plane(
    plane: usize,
    dst: &mut YuvFrame,
    dst_kind: ViewKind,
    src: &YuvFrame,
    src_kind: ViewKind,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    mv: [i32; 2],
    blend: Blend,
) -> Result<[i32; 2]> {
    let sv = src.view(plane, src_kind);
    if sv.width < w || sv.height < h {
        return slice_err(format!("{w}x{h} prediction does not fit a {}x{} reference", sv.width, sv.height));
    }
    let limit_x = 2 * (sv.width - w) as i32;
    let limit_y = 2 * (sv.height - h) as i32;
    let px = clamp_position(2 * x as i32 + mv[0], limit_x);
    let py = clamp_position(2 * y as i32 + mv[1], limit_y);

    let dv = dst.view(plane, dst_kind);
    let interp = Interp::from_half(px & 1 != 0, py & 1 != 0);
    let (src_data, _) = src.plane(plane);
    let (dst_data, _) = dst.plane_mut(plane);
    mc_block(
        blend,
        interp,
        dst_data,
        BlockDst { off: dv.index(x, y), stride: dv.stride },
        src_data,
        BlockSrc { off: sv.index((px >> 1) as usize, (py >> 1) as usize), stride: sv.stride },
        w,
        h,
    );
    Ok([px - 2 * x as i32, py - 2 * y as i32])
}

/// Predict a luma block at (`x`, `y`) of size `w` x `h` and the matching
/// chroma blocks. Chroma vectors derive from the clamped luma vector.
#[allow(clippy::too_many_arguments)]
pub fn predict_block(
    dst: &mut YuvFrame,
    dst_kind: ViewKind,
    src: &YuvFrame,
    src_kind: ViewKind,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    mv: [i32; 2],
    blend: Blend,
) -> Result<()> {
    let luma_mv = predict_plane(0, dst, dst_kind, src, src_kind, x, y, w, h, mv, blend)?;
    let chroma = dst.chroma_format;
    let (sx, sy) = chroma.shifts();
    let cmv = chroma_vector(chroma, luma_mv);
    for plane in 1..3 {
        predict_plane(plane, dst, dst_kind, src, src_kind, x >> sx, y >> sy, w >> sx, h >> sy, cmv, blend)?;
    }
    Ok(())
}

/// Position and picture context of the macroblock being predicted.
#[derive(Clone, Copy, Debug)]
pub struct MacroblockTarget {
    pub mb_x: usize,
    pub mb_y: usize,
    pub structure: PictureStructure,
    pub top_field_first: bool,
}

fn reference<'a>(refs: &References<'a>, dir: Direction) -> &'a YuvFrame {
    match dir {
        Direction::Forward => refs.past,
        Direction::Backward => refs.future,
    }
}

/// Reference frame holding the field of parity `field` for a field picture
/// currently decoding `current`. The second field of an I/P pair reads the
/// opposite parity from its own first field.
fn field_reference<'a>(refs: &References<'a>, dir: Direction, field: Field, current: Field) -> &'a YuvFrame {
    match (dir, refs.same_frame) {
        (Direction::Forward, Some(same)) if field != current => same,
        _ => reference(refs, dir),
    }
}

/// Form the prediction of one macroblock for one direction.
pub fn predict_macroblock(
    kind: MotionType,
    dst: &mut YuvFrame,
    refs: &References<'_>,
    dir: Direction,
    mvs: &MotionVectors,
    at: &MacroblockTarget,
    blend: Blend,
) -> Result<()> {
    let x = at.mb_x * 16;
    match (kind, at.structure.field()) {
        (MotionType::Frame | MotionType::ZeroOrReuse, None) => {
            let src = reference(refs, dir);
            predict_block(dst, ViewKind::Frame, src, ViewKind::Frame, x, at.mb_y * 16, 16, 16, mvs.mv[0], blend)
        }
        (MotionType::Field, None) => {
            let src = reference(refs, dir);
            for (r, dst_field) in [Field::Top, Field::Bottom].into_iter().enumerate() {
                let src_field = Field::from_select(mvs.field_select[r]);
                predict_block(
                    dst, ViewKind::Field(dst_field), src, ViewKind::Field(src_field),
                    x, at.mb_y * 8, 16, 8, mvs.mv[r], blend,
                )?;
            }
            Ok(())
        }
        (MotionType::DualPrime, None) => {
            let src = reference(refs, dir);
            let tff = at.top_field_first;
            let y = at.mb_y * 8;
            // top field: from the bottom reference field, then bottom from top
            let (m_top, m_bottom) = if tff { (1, 3) } else { (3, 1) };
            let opp_top = dual_prime_vector(mvs.mv[0], mvs.dmv, m_top, -1);
            let opp_bottom = dual_prime_vector(mvs.mv[0], mvs.dmv, m_bottom, 1);
            for (field, opp) in [(Field::Top, opp_top), (Field::Bottom, opp_bottom)] {
                let dk = ViewKind::Field(field);
                predict_block(dst, dk, src, ViewKind::Field(field), x, y, 16, 8, mvs.mv[0], Blend::Put)?;
                predict_block(dst, dk, src, ViewKind::Field(field.opposite()), x, y, 16, 8, opp, Blend::Avg)?;
            }
            Ok(())
        }
        (MotionType::SixteenByEight, None) => Err(DecoderError::UnsupportedMode(
            "16x8 motion compensation in a frame picture".into(),
        )),
        (MotionType::ZeroOrReuse, Some(cur)) => {
            let src = reference(refs, dir);
            let dk = ViewKind::Field(cur);
            predict_block(dst, dk, src, dk, x, at.mb_y * 16, 16, 16, mvs.mv[0], blend)
        }
        (MotionType::Field | MotionType::Frame, Some(cur)) => {
            let sel = Field::from_select(mvs.field_select[0]);
            let src = field_reference(refs, dir, sel, cur);
            predict_block(dst, ViewKind::Field(cur), src, ViewKind::Field(sel), x, at.mb_y * 16, 16, 16, mvs.mv[0], blend)
        }
        (MotionType::SixteenByEight, Some(cur)) => {
            for r in 0..2 {
                let sel = Field::from_select(mvs.field_select[r]);
                let src = field_reference(refs, dir, sel, cur);
                predict_block(
                    dst, ViewKind::Field(cur), src, ViewKind::Field(sel),
                    x, at.mb_y * 16 + 8 * r, 16, 8, mvs.mv[r], blend,
                )?;
            }
            Ok(())
        }
        (MotionType::DualPrime, Some(cur)) => {
            let dk = ViewKind::Field(cur);
            let y = at.mb_y * 16;
            let e = if cur == Field::Top { -1 } else { 1 };
            let opp = dual_prime_vector(mvs.mv[0], mvs.dmv, 1, e);
            let same_src = field_reference(refs, dir, cur, cur);
            predict_block(dst, dk, same_src, dk, x, y, 16, 16, mvs.mv[0], Blend::Put)?;
            let other = cur.opposite();
            let opp_src = field_reference(refs, dir, other, cur);
            predict_block(dst, dk, opp_src, ViewKind::Field(other), x, y, 16, 16, opp, Blend::Avg)
        }
    }
}
