//! Slice and macroblock decoding.
//!
//! A slice is decoded straight into the destination frame: intra blocks are
//! transformed and stored, inter macroblocks are predicted from the
//! references and the coded residual is added on top.

use crate::bitreader::BitReader;
use crate::block::BlockDecoder;
use crate::error::{slice_err, DecoderError, Result};
use crate::frame::{ChromaFormat, References, YuvFrame};
use crate::header::{PictureCodingType, PictureParams, PictureStructure, SequenceParams};
use crate::idct::{idct_add, idct_put};
use crate::mc::Blend;
use crate::motion::{
    parse_vectors, predict_macroblock, Direction, MacroblockTarget, MotionPredictors, MotionType,
    MotionVectors,
};
use crate::quant::quantizer_scale;
use crate::tables::ScanTables;
use crate::vlc::{
    VlcSet, VlcTable, MBA_ESCAPE, MBA_STUFFING, MB_INTRA, MB_MOTION_BACKWARD, MB_MOTION_FORWARD,
    MB_PATTERN, MB_QUANT,
};

/// Everything a slice needs besides its own bits.
pub struct SliceContext<'a> {
    pub seq: &'a SequenceParams,
    pub pic: &'a PictureParams,
    pub vlc: &'a VlcSet,
    pub scans: &'a ScanTables,
}

/// Macroblock rows a slice wrote to, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceRows {
    pub first: usize,
    pub last: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MacroblockModes {
    flags: i32,
    motion: MotionType,
    interlaced_dct: bool,
}

impl MacroblockModes {
    fn has(&self, flag: i32) -> bool {
        self.flags & flag != 0
    }
}

/// Mutable state carried from one macroblock to the next.
struct MacroblockState {
    dc_pred: [i32; 3],
    pmv: MotionPredictors,
    qscale: i32,
    mb_x: usize,
    mb_y: usize,
    prev: Option<MacroblockModes>,
    block: [i16; 64],
}

#[inline]
fn truncated<T>() -> Result<T> {
    slice_err("slice data ends inside a macroblock")
}

struct SliceDecoder<'a> {
    seq: &'a SequenceParams,
    pic: &'a PictureParams,
    vlc: &'a VlcSet,
    blocks: BlockDecoder<'a>,
    mpeg1: bool,
    mb_width: usize,
    mb_rows: usize,
}

impl<'a> SliceDecoder<'a> {
    fn new(ctx: &SliceContext<'a>) -> Self {
        let mpeg1 = ctx.seq.mpeg1;
        let rows_per_picture = if ctx.pic.structure.is_frame() { 16 } else { 32 };
        SliceDecoder {
            seq: ctx.seq,
            pic: ctx.pic,
            vlc: ctx.vlc,
            blocks: BlockDecoder::new(ctx.vlc, ctx.scans, &ctx.seq.matrices, ctx.pic, mpeg1),
            mpeg1,
            mb_width: ctx.seq.mb_width() as usize,
            mb_rows: (ctx.seq.coded_height / rows_per_picture) as usize,
        }
    }

    fn mb_type_table(&self) -> &'a VlcTable {
        match self.pic.coding_type {
            PictureCodingType::I => &self.vlc.mb_type_i,
            PictureCodingType::P => &self.vlc.mb_type_p,
            PictureCodingType::B => &self.vlc.mb_type_b,
            PictureCodingType::D => &self.vlc.mb_type_d,
        }
    }

    /// Macroblock address increment, escapes and stuffing folded in.
    /// `None` marks the end of the slice.
    fn address_increment(&self, br: &mut BitReader<'_>) -> Option<usize> {
        let mut inc = 0usize;
        loop {
            match self.vlc.mba.decode(br)? {
                MBA_STUFFING => continue,
                MBA_ESCAPE => inc += 33,
                v => return Some(inc + v as usize),
            }
        }
    }

    fn parse_modes(&self, br: &mut BitReader<'_>) -> Result<MacroblockModes> {
        let Some(flags) = self.mb_type_table().decode(br) else {
            return slice_err("invalid macroblock_type");
        };
        let pic = self.pic;
        let predicted = flags & (MB_MOTION_FORWARD | MB_MOTION_BACKWARD) != 0;
        let motion = if !predicted {
            MotionType::ZeroOrReuse
        } else if self.mpeg1 || (pic.structure.is_frame() && pic.frame_pred_frame_dct) {
            MotionType::Frame
        } else {
            let Some(code) = br.read_bits(2) else {
                return truncated();
            };
            MotionType::from_code(code, pic.structure)?
        };
        if motion == MotionType::DualPrime
            && (pic.coding_type != PictureCodingType::P || flags & MB_MOTION_BACKWARD != 0)
        {
            return Err(DecoderError::UnsupportedMode("dual prime outside a P picture".into()));
        }
        let interlaced_dct = if !self.mpeg1
            && pic.structure.is_frame()
            && !pic.frame_pred_frame_dct
            && flags & (MB_INTRA | MB_PATTERN) != 0
        {
            match br.read_bit() {
                Some(b) => b,
                None => return truncated(),
            }
        } else {
            false
        };
        Ok(MacroblockModes { flags, motion, interlaced_dct })
    }

    fn target(&self, st: &MacroblockState) -> MacroblockTarget {
        MacroblockTarget {
            mb_x: st.mb_x,
            mb_y: st.mb_y,
            structure: self.pic.structure,
            top_field_first: self.pic.top_field_first,
        }
    }

    /// Destination offset and stride of block `index` of the current
    /// macroblock.
    fn block_position(
        &self,
        dst: &YuvFrame,
        st: &MacroblockState,
        index: usize,
        interlaced_dct: bool,
    ) -> (usize, usize, usize) {
        let chroma = dst.chroma_format;
        let (plane, bx, by) = if index < 4 {
            (0, 8 * (index & 1), index >> 1)
        } else {
            let k = index - 4;
            let j = k >> 1;
            let (bx, by) = match chroma {
                ChromaFormat::Chroma420 => (0, 0),
                ChromaFormat::Chroma422 => (0, j),
                ChromaFormat::Chroma444 => (8 * (j >> 1), j & 1),
            };
            (1 + (k & 1), bx, by)
        };
        let (sx, sy) = if plane == 0 { (0, 0) } else { chroma.shifts() };
        let view = dst.view(plane, self.pic.structure.view());
        let x = (st.mb_x * 16 >> sx) + bx;
        let top = st.mb_y * 16 >> sy;
        // 4:2:0 chroma blocks are never field coded
        let field_dct = interlaced_dct && !(plane != 0 && chroma == ChromaFormat::Chroma420);
        if field_dct {
            (plane, view.index(x, top + by), view.stride * 2)
        } else {
            (plane, view.index(x, top + 8 * by), view.stride)
        }
    }

    fn intra_macroblock(
        &self,
        br: &mut BitReader<'_>,
        st: &mut MacroblockState,
        modes: &MacroblockModes,
        dst: &mut YuvFrame,
    ) -> Result<()> {
        let pic = self.pic;
        if pic.concealment_motion_vectors && !self.mpeg1 {
            let kind = if pic.structure.is_frame() { MotionType::Frame } else { MotionType::Field };
            parse_vectors(br, self.vlc, pic, false, kind, Direction::Forward, &mut st.pmv)?;
            if br.read_bit().is_none() {
                return truncated();
            }
        } else {
            st.pmv.reset();
        }

        let d_picture = pic.coding_type == PictureCodingType::D;
        for index in 0..dst.chroma_format.block_count() {
            let (plane, off, stride) = self.block_position(dst, st, index, modes.interlaced_dct);
            let chroma = plane != 0;
            let MacroblockState { dc_pred, block, qscale, .. } = st;
            if d_picture {
                self.blocks.dc_only_block(br, chroma, &mut dc_pred[plane], block)?;
            } else {
                self.blocks.intra_block(br, chroma, *qscale, &mut dc_pred[plane], block)?;
            }
            idct_put(block, dst.plane_mut(plane).0, off, stride);
        }
        if d_picture && br.read_bit().is_none() {
            return truncated();
        }
        Ok(())
    }

    fn coded_block_pattern(&self, br: &mut BitReader<'_>, chroma: ChromaFormat) -> Result<u32> {
        let Some(cbp) = self.vlc.cbp.decode(br) else {
            return slice_err("invalid coded_block_pattern");
        };
        let extra = match chroma {
            ChromaFormat::Chroma420 => 0,
            ChromaFormat::Chroma422 => 2,
            ChromaFormat::Chroma444 => 6,
        };
        let Some(ext) = br.read_bits(extra) else {
            return truncated();
        };
        Ok(((cbp as u32) << extra) | ext)
    }

    fn inter_macroblock(
        &self,
        br: &mut BitReader<'_>,
        st: &mut MacroblockState,
        modes: &MacroblockModes,
        dst: &mut YuvFrame,
        refs: &References<'_>,
    ) -> Result<()> {
        let at = self.target(st);
        if modes.motion == MotionType::ZeroOrReuse {
            // P macroblock without motion vectors
            st.pmv.reset();
            predict_macroblock(
                MotionType::ZeroOrReuse, dst, refs, Direction::Forward,
                &MotionVectors::default(), &at, Blend::Put,
            )?;
        } else {
            let forward = modes.has(MB_MOTION_FORWARD);
            for (dir, present) in [(Direction::Forward, forward), (Direction::Backward, modes.has(MB_MOTION_BACKWARD))] {
                if !present {
                    continue;
                }
                let mvs = parse_vectors(br, self.vlc, self.pic, self.mpeg1, modes.motion, dir, &mut st.pmv)?;
                let blend = if dir == Direction::Backward && forward { Blend::Avg } else { Blend::Put };
                predict_macroblock(modes.motion, dst, refs, dir, &mvs, &at, blend)?;
            }
        }

        if modes.has(MB_PATTERN) {
            let count = dst.chroma_format.block_count();
            let cbp = self.coded_block_pattern(br, dst.chroma_format)?;
            for index in 0..count {
                if cbp & (1 << (count - 1 - index)) == 0 {
                    continue;
                }
                let (plane, off, stride) = self.block_position(dst, st, index, modes.interlaced_dct);
                self.blocks.non_intra_block(br, plane != 0, st.qscale, &mut st.block)?;
                idct_add(&st.block, dst.plane_mut(plane).0, off, stride);
            }
        }
        Ok(())
    }

    /// A macroblock that is not coded at all.
    fn skipped_macroblock(
        &self,
        st: &mut MacroblockState,
        dst: &mut YuvFrame,
        refs: &References<'_>,
    ) -> Result<()> {
        let at = self.target(st);
        match self.pic.coding_type {
            PictureCodingType::P => {
                st.pmv.reset();
                predict_macroblock(
                    MotionType::ZeroOrReuse, dst, refs, Direction::Forward,
                    &MotionVectors::default(), &at, Blend::Put,
                )
            }
            PictureCodingType::B => {
                let Some(prev) = st.prev.filter(|m| !m.has(MB_INTRA)) else {
                    return slice_err("skipped macroblock after an intra macroblock in a B picture");
                };
                let forward = prev.has(MB_MOTION_FORWARD);
                for (dir, present) in [(Direction::Forward, forward), (Direction::Backward, prev.has(MB_MOTION_BACKWARD))] {
                    if !present {
                        continue;
                    }
                    let [x, y] = st.pmv.first(dir);
                    let shift = (self.mpeg1 && self.pic.full_pel[dir as usize]) as u32;
                    let mvs = MotionVectors::single(x << shift, y << shift);
                    let blend = if dir == Direction::Backward && forward { Blend::Avg } else { Blend::Put };
                    predict_macroblock(MotionType::ZeroOrReuse, dst, refs, dir, &mvs, &at, blend)?;
                }
                Ok(())
            }
            _ => slice_err("skipped macroblock in an intra picture"),
        }
    }

    /// Step to the next macroblock address.
    fn advance(&self, st: &mut MacroblockState) -> Result<()> {
        st.mb_x += 1;
        if st.mb_x < self.mb_width {
            return Ok(());
        }
        if !self.mpeg1 {
            return slice_err("macroblock address past the end of the row");
        }
        st.mb_x = 0;
        st.mb_y += 1;
        if st.mb_y >= self.mb_rows {
            return slice_err("macroblock address past the end of the picture");
        }
        Ok(())
    }

    fn decode(&self, code: u8, payload: &[u8], dst: &mut YuvFrame, refs: &References<'_>) -> Result<SliceRows> {
        let mut br = BitReader::new(payload);
        let mut row = code as usize - 1;
        if self.seq.vertical_size > 2800 {
            let Some(ext) = br.read_bits(3) else {
                return truncated();
            };
            row += (ext as usize) << 7;
        }
        if row >= self.mb_rows {
            return slice_err(format!("slice row {row} past the picture bottom"));
        }
        let Some(qcode) = br.read_bits(5) else {
            return truncated();
        };
        let qscale = quantizer_scale(qcode, self.pic.q_scale_type && !self.mpeg1);
        // intra_slice, reserved bits and extra_information_slice
        while br.read_bit() == Some(true) {
            if br.skip_bits(8).is_none() {
                return truncated();
            }
        }

        let Some(inc) = self.address_increment(&mut br) else {
            return slice_err("invalid first macroblock address increment");
        };
        let dc = self.blocks.dc_reset();
        let mut st = MacroblockState {
            dc_pred: [dc; 3],
            pmv: MotionPredictors::default(),
            qscale,
            mb_x: 0,
            mb_y: row,
            prev: None,
            block: [0; 64],
        };
        st.mb_x = inc - 1;
        if self.mpeg1 {
            while st.mb_x >= self.mb_width {
                st.mb_x -= self.mb_width;
                st.mb_y += 1;
            }
            if st.mb_y >= self.mb_rows {
                return slice_err("macroblock address past the end of the picture");
            }
        } else if st.mb_x >= self.mb_width {
            return slice_err("macroblock address past the end of the row");
        }

        loop {
            let modes = self.parse_modes(&mut br)?;
            if modes.has(MB_QUANT) {
                let Some(qcode) = br.read_bits(5) else {
                    return truncated();
                };
                st.qscale = quantizer_scale(qcode, self.pic.q_scale_type && !self.mpeg1);
            }
            if modes.has(MB_INTRA) {
                self.intra_macroblock(&mut br, &mut st, &modes, dst)?;
            } else {
                self.inter_macroblock(&mut br, &mut st, &modes, dst, refs)?;
                st.dc_pred = [dc; 3];
            }
            st.prev = Some(modes);

            let Some(inc) = self.address_increment(&mut br) else {
                break;
            };
            for _ in 1..inc {
                self.advance(&mut st)?;
                st.dc_pred = [dc; 3];
                self.skipped_macroblock(&mut st, dst, refs)?;
            }
            self.advance(&mut st)?;
        }
        log::trace!("slice rows {row}..={} decoded", st.mb_y);
        Ok(SliceRows { first: row, last: st.mb_y })
    }
}

/// Decode one slice (start code `code`, payload after the start code) into
/// `dst`.
pub fn decode_slice(
    ctx: &SliceContext<'_>,
    code: u8,
    payload: &[u8],
    dst: &mut YuvFrame,
    refs: &References<'_>,
) -> Result<SliceRows> {
    if ctx.pic.structure != PictureStructure::Frame && ctx.seq.coded_height < 32 {
        return slice_err("field picture in a sequence shorter than two macroblock rows");
    }
    SliceDecoder::new(ctx).decode(code, payload, dst, refs)
}
