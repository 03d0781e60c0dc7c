//! Hand-built elementary streams for the integration tests.

#![allow(dead_code)]

use std::ops::Range;

use na_mpeg2_decoder::DecodedFrame;

pub const PICTURE_START: u8 = 0x00;
pub const USER_DATA: u8 = 0xB2;
pub const SEQUENCE_HEADER: u8 = 0xB3;
pub const EXTENSION_START: u8 = 0xB5;
pub const SEQUENCE_END: u8 = 0xB7;
pub const GROUP_START: u8 = 0xB8;

pub struct BitWriter {
    out: Vec<u8>,
    acc: u64,
    n: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter { out: Vec::new(), acc: 0, n: 0 }
    }

    pub fn put(&mut self, v: u32, bits: u32) -> &mut Self {
        if bits == 0 {
            return self;
        }
        self.acc = (self.acc << bits) | (v as u64 & ((1u64 << bits) - 1));
        self.n += bits;
        while self.n >= 8 {
            self.out.push((self.acc >> (self.n - 8)) as u8);
            self.n -= 8;
        }
        self
    }

    pub fn flag(&mut self, b: bool) -> &mut Self {
        self.put(b as u32, 1)
    }

    /// Zero-pad to a byte boundary and return the bytes.
    pub fn finish(&mut self) -> Vec<u8> {
        if self.n > 0 {
            let pad = 8 - self.n;
            self.put(0, pad);
        }
        std::mem::take(&mut self.out)
    }
}

/// Sequence-level settings of a synthetic stream.
#[derive(Clone, Copy, Debug)]
pub struct SequenceSpec {
    pub width: u32,
    pub height: u32,
    pub mpeg1: bool,
    pub progressive: bool,
    /// 1 = 4:2:0, 2 = 4:2:2, 3 = 4:4:4.
    pub chroma: u32,
    pub low_delay: bool,
}

impl SequenceSpec {
    pub fn mpeg2(width: u32, height: u32) -> Self {
        SequenceSpec { width, height, mpeg1: false, progressive: true, chroma: 1, low_delay: false }
    }

    pub fn mpeg1(width: u32, height: u32) -> Self {
        SequenceSpec { mpeg1: true, ..Self::mpeg2(width, height) }
    }

    pub fn interlaced(width: u32, height: u32) -> Self {
        SequenceSpec { progressive: false, ..Self::mpeg2(width, height) }
    }

    /// Blocks per macroblock.
    pub fn blocks(&self) -> usize {
        match self.chroma {
            2 => 8,
            3 => 12,
            _ => 6,
        }
    }
}

/// Picture-level settings of a synthetic picture.
#[derive(Clone, Copy, Debug)]
pub struct PictureSpec {
    pub temporal_reference: u32,
    /// 1 = I, 2 = P, 3 = B, 4 = D.
    pub coding_type: u32,
    /// 1 = top field, 2 = bottom field, 3 = frame.
    pub structure: u32,
    pub top_field_first: bool,
    pub repeat_first_field: bool,
    pub progressive_frame: bool,
    /// When clear, frame pictures carry `frame_motion_type` and `dct_type`.
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
}

impl PictureSpec {
    pub fn frame(temporal_reference: u32, coding_type: u32) -> Self {
        PictureSpec {
            temporal_reference,
            coding_type,
            structure: 3,
            top_field_first: false,
            repeat_first_field: false,
            progressive_frame: true,
            frame_pred_frame_dct: true,
            concealment_motion_vectors: false,
            q_scale_type: false,
            intra_vlc_format: false,
            alternate_scan: false,
        }
    }

    /// Frame picture of an interlaced sequence, with per-macroblock motion
    /// types.
    pub fn interlaced_frame(temporal_reference: u32, coding_type: u32) -> Self {
        PictureSpec {
            progressive_frame: false,
            frame_pred_frame_dct: false,
            ..Self::frame(temporal_reference, coding_type)
        }
    }

    pub fn field(temporal_reference: u32, coding_type: u32, structure: u32) -> Self {
        PictureSpec {
            structure,
            progressive_frame: false,
            frame_pred_frame_dct: false,
            ..Self::frame(temporal_reference, coding_type)
        }
    }
}

/// Start-code delimited stream under construction.
pub struct StreamBuilder {
    seq: SequenceSpec,
    data: Vec<u8>,
    rows: u32,
    pic: PictureSpec,
    quantiser_scale_code: u32,
}

impl StreamBuilder {
    pub fn new(seq: SequenceSpec) -> Self {
        StreamBuilder { seq, data: Vec::new(), rows: 0, pic: PictureSpec::frame(0, 1), quantiser_scale_code: 1 }
    }

    pub fn chunk(&mut self, code: u8, payload: &[u8]) -> &mut Self {
        self.data.extend_from_slice(&[0, 0, 1, code]);
        self.data.extend_from_slice(payload);
        self
    }

    pub fn sequence_header(&mut self) -> &mut Self {
        let s = self.seq;
        let mut w = BitWriter::new();
        // aspect 1:1, 25 fps, VBR bit rate, marker, vbv size, no matrices
        w.put(s.width & 0xFFF, 12).put(s.height & 0xFFF, 12).put(1, 4).put(3, 4);
        w.put(0x3FFFF, 18).put(1, 1).put(112, 10).put(0, 1).put(0, 1).put(0, 1);
        let header = w.finish();
        self.chunk(SEQUENCE_HEADER, &header);
        if !s.mpeg1 {
            let mut w = BitWriter::new();
            w.put(1, 4).put(0x48, 8).flag(s.progressive).put(s.chroma, 2);
            w.put(s.width >> 12, 2).put(s.height >> 12, 2).put(0, 12).put(1, 1).put(0, 8);
            w.flag(s.low_delay).put(0, 2).put(0, 5);
            let ext = w.finish();
            self.chunk(EXTENSION_START, &ext);
        }
        self
    }

    pub fn gop(&mut self, closed: bool, broken_link: bool) -> &mut Self {
        let mut w = BitWriter::new();
        // 01:02:03.04, no drop frame
        w.put(0, 1).put(1, 5).put(2, 6).put(1, 1).put(3, 6).put(4, 6).flag(closed).flag(broken_link);
        let payload = w.finish();
        self.chunk(GROUP_START, &payload)
    }

    /// Picture header plus, for MPEG-2, a coding extension with every
    /// f_code 1 (vectors within +-16 half samples) and DC precision 3.
    pub fn picture(&mut self, pic: PictureSpec) -> &mut Self {
        let mut w = BitWriter::new();
        w.put(pic.temporal_reference, 10).put(pic.coding_type, 3).put(0xFFFF, 16);
        let f_code = if self.seq.mpeg1 { 1 } else { 7 };
        if pic.coding_type == 2 || pic.coding_type == 3 {
            w.put(0, 1).put(f_code, 3);
        }
        if pic.coding_type == 3 {
            w.put(0, 1).put(f_code, 3);
        }
        w.put(0, 1);
        let header = w.finish();
        self.chunk(PICTURE_START, &header);

        if !self.seq.mpeg1 {
            let mut w = BitWriter::new();
            w.put(8, 4);
            for _ in 0..4 {
                w.put(1, 4);
            }
            w.put(3, 2).put(pic.structure, 2).flag(pic.top_field_first);
            w.flag(pic.frame_pred_frame_dct).flag(pic.concealment_motion_vectors);
            w.flag(pic.q_scale_type).flag(pic.intra_vlc_format).flag(pic.alternate_scan);
            w.flag(pic.repeat_first_field).put(1, 1).flag(pic.progressive_frame).put(0, 1);
            let ext = w.finish();
            self.chunk(EXTENSION_START, &ext);
        }
        self.rows = if pic.structure == 3 { self.seq_coded_height() / 16 } else { self.seq_coded_height() / 32 };
        self.pic = pic;
        self
    }

    /// quantiser_scale_code written into the following slice headers.
    pub fn quantiser(&mut self, code: u32) -> &mut Self {
        self.quantiser_scale_code = code;
        self
    }

    /// Emit slices for the first `rows` macroblock rows only.
    pub fn limit_rows(&mut self, rows: u32) -> &mut Self {
        self.rows = self.rows.min(rows);
        self
    }

    fn seq_coded_height(&self) -> u32 {
        if self.seq.progressive || self.seq.mpeg1 {
            (self.seq.height + 15) & !15
        } else {
            (self.seq.height + 31) & !31
        }
    }

    fn mb_width(&self) -> u32 {
        (self.seq.width + 15) / 16
    }

    /// One slice per macroblock row. The slice header (quantiser, first
    /// address increment 1) is written here; `body` writes the macroblocks
    /// of row `row`.
    pub fn slices(&mut self, mut body: impl FnMut(&mut BitWriter, u32)) -> &mut Self {
        for row in 0..self.rows {
            let mut w = BitWriter::new();
            w.put(self.quantiser_scale_code, 5).put(0, 1).put(1, 1);
            body(&mut w, row);
            let payload = w.finish();
            self.chunk(row as u8 + 1, &payload);
        }
        self
    }

    /// Every macroblock intra with flat blocks of `luma`, `cb` and `cr`.
    pub fn intra_rows(&mut self, luma: u8, cb: u8, cr: u8) -> &mut Self {
        self.intra_macroblocks(|_, _| [luma, cb, cr], None)
    }

    /// Intra macroblocks whose `[y, cb, cr]` levels are given per
    /// macroblock `(column, row)`. `luma_ac` adds one `(run, level)` pair
    /// after the DC of every luma block.
    pub fn intra_macroblocks(
        &mut self,
        value: impl Fn(u32, u32) -> [u8; 3],
        luma_ac: Option<(u32, i32)>,
    ) -> &mut Self {
        let (mb_width, blocks) = (self.mb_width(), self.seq.blocks());
        let pic = self.pic;
        let mpeg2 = !self.seq.mpeg1;
        let d_picture = pic.coding_type == 4;
        let mb_type = match pic.coding_type {
            2 => P_INTRA,
            3 => B_INTRA,
            _ => I_INTRA,
        };
        let reset = self.dc_reset();
        let targets: Vec<Vec<[i32; 3]>> = (0..self.rows)
            .map(|row| {
                (0..mb_width)
                    .map(|mb| value(mb, row).map(|v| self.dc_target(v)))
                    .collect()
            })
            .collect();
        self.slices(|w, row| {
            let mut pred = [reset; 3];
            for mb in 0..mb_width {
                w.put(mb_type.0, mb_type.1);
                if mpeg2 && pic.structure == 3 && !pic.frame_pred_frame_dct {
                    // dct_type frame
                    w.put(0, 1);
                }
                if mpeg2 && pic.concealment_motion_vectors {
                    if pic.structure != 3 {
                        w.flag(pic.structure == 2);
                    }
                    motion_delta(w, 3);
                    motion_delta(w, -2);
                    // marker
                    w.put(1, 1);
                }
                let target = targets[row as usize][mb as usize];
                for block in 0..blocks {
                    let (comp, chroma) = match block {
                        0..=3 => (0, false),
                        b if b % 2 == 0 => (1, true),
                        _ => (2, true),
                    };
                    // the first block of each component moves the predictor
                    let diff = if block == 0 || block == 4 || block == 5 {
                        let d = target[comp] - pred[comp];
                        pred[comp] = target[comp];
                        d
                    } else {
                        0
                    };
                    dc_differential(w, diff, chroma);
                    if d_picture {
                        continue;
                    }
                    let b15 = mpeg2 && pic.intra_vlc_format;
                    if let (Some((run, level)), false) = (luma_ac, chroma) {
                        coefficient(w, run, level, b15);
                    }
                    end_of_block(w, b15);
                }
                if d_picture {
                    // end_of_macroblock
                    w.put(1, 1);
                }
                if mb + 1 < mb_width {
                    w.put(1, 1);
                }
            }
        })
    }

    /// Predictor value that reconstructs to a flat block of `v`.
    fn dc_target(&self, v: u8) -> i32 {
        if self.seq.mpeg1 { v as i32 } else { 8 * v as i32 + 1 }
    }

    fn dc_reset(&self) -> i32 {
        if self.seq.mpeg1 { 128 } else { 1024 }
    }

    /// One slice per row of P or B macroblocks predicted with zero motion
    /// from the forward reference; the macroblocks between the first and
    /// the last of a row are skipped.
    pub fn forward_copy_rows(&mut self) -> &mut Self {
        let mb_width = self.mb_width();
        let (coding_type, structure) = (self.pic.coding_type, self.pic.structure);
        self.slices(|w, _| {
            zero_forward_macroblock(w, coding_type, structure);
            if mb_width > 1 {
                address_increment(w, mb_width - 1);
                zero_forward_macroblock(w, coding_type, structure);
            }
        })
    }

    pub fn sequence_end(&mut self) -> &mut Self {
        self.chunk(SEQUENCE_END, &[])
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

fn zero_forward_macroblock(w: &mut BitWriter, coding_type: u32, structure: u32) {
    if coding_type == 2 {
        // P: MC, not coded
        w.put(0b001, 3);
    } else {
        // B: forward, not coded
        w.put(0b0010, 4);
    }
    if structure != 3 {
        // field_motion_type field, same parity reference
        w.put(1, 2).flag(structure == 2);
    }
    // zero horizontal and vertical deltas
    w.put(1, 1).put(1, 1);
}

/// Intra macroblock_type codes as `(bits, length)`.
const I_INTRA: (u32, u32) = (0b1, 1);
const P_INTRA: (u32, u32) = (0b00011, 5);
const B_INTRA: (u32, u32) = (0b00011, 5);

/// macroblock_address_increment for 1..=15.
pub fn address_increment(w: &mut BitWriter, inc: u32) {
    const CODES: [(u32, u32); 15] = [
        (0b1, 1), (0b011, 3), (0b010, 3), (0b0011, 4), (0b0010, 4), (0b00011, 5), (0b00010, 5),
        (0b0000111, 7), (0b0000110, 7), (0b00001011, 8), (0b00001010, 8), (0b00001001, 8),
        (0b00001000, 8), (0b00000111, 8), (0b00000110, 8),
    ];
    let (code, len) = CODES[(inc - 1) as usize];
    w.put(code, len);
}

/// dct_dc_size code followed by the differential bits.
pub fn dc_differential(w: &mut BitWriter, diff: i32, chroma: bool) {
    const LUMA: [(u32, u32); 12] = [
        (0b100, 3), (0b00, 2), (0b01, 2), (0b101, 3), (0b110, 3), (0b1110, 4), (0b11110, 5),
        (0b111110, 6), (0b1111110, 7), (0b11111110, 8), (0b111111110, 9), (0b111111111, 9),
    ];
    const CHROMA: [(u32, u32); 12] = [
        (0b00, 2), (0b01, 2), (0b10, 2), (0b110, 3), (0b1110, 4), (0b11110, 5), (0b111110, 6),
        (0b1111110, 7), (0b11111110, 8), (0b111111110, 9), (0b1111111110, 10), (0b1111111111, 10),
    ];
    let size = 32 - diff.unsigned_abs().leading_zeros();
    let (code, len) = if chroma { CHROMA[size as usize] } else { LUMA[size as usize] };
    w.put(code, len);
    if size > 0 {
        let bits = if diff > 0 { diff } else { diff + (1 << size) - 1 };
        w.put(bits as u32, size);
    }
}

/// A motion vector delta with f_code 1: motion_code and sign, no residual.
pub fn motion_delta(w: &mut BitWriter, delta: i32) {
    const CODES: [(u32, u32); 17] = [
        (0b1, 1), (0b01, 2), (0b001, 3), (0b0001, 4), (0b000011, 6), (0b0000101, 7),
        (0b0000100, 7), (0b0000011, 7), (0b000001011, 9), (0b000001010, 9), (0b000001001, 9),
        (0b0000010001, 10), (0b0000010000, 10), (0b0000001111, 10), (0b0000001110, 10),
        (0b0000001101, 10), (0b0000001100, 10),
    ];
    let (code, len) = CODES[delta.unsigned_abs() as usize];
    w.put(code, len);
    if delta != 0 {
        w.flag(delta < 0);
    }
}

/// coded_block_pattern for a macroblock of `blocks` blocks; bit
/// `blocks - 1 - i` marks block `i`.
pub fn coded_block_pattern(w: &mut BitWriter, pattern: u32, blocks: usize) {
    const CBP: [(u32, u32); 64] = [
        (0x01, 9), (0x0b, 5), (0x09, 5), (0x0d, 6), (0x0d, 4), (0x17, 7), (0x13, 7), (0x1f, 8),
        (0x0c, 4), (0x16, 7), (0x12, 7), (0x1e, 8), (0x13, 5), (0x1b, 8), (0x17, 8), (0x13, 8),
        (0x0b, 4), (0x15, 7), (0x11, 7), (0x1d, 8), (0x11, 5), (0x19, 8), (0x15, 8), (0x11, 8),
        (0x0f, 6), (0x0f, 8), (0x0d, 8), (0x03, 9), (0x0f, 5), (0x0b, 8), (0x07, 8), (0x07, 9),
        (0x0a, 4), (0x14, 7), (0x10, 7), (0x1c, 8), (0x0e, 6), (0x0e, 8), (0x0c, 8), (0x02, 9),
        (0x10, 5), (0x18, 8), (0x14, 8), (0x10, 8), (0x0e, 5), (0x0a, 8), (0x06, 8), (0x06, 9),
        (0x12, 5), (0x1a, 8), (0x16, 8), (0x12, 8), (0x0d, 5), (0x09, 8), (0x05, 8), (0x05, 9),
        (0x0c, 5), (0x08, 8), (0x04, 8), (0x04, 9), (0x07, 3), (0x0a, 5), (0x08, 5), (0x0c, 6),
    ];
    let extra = blocks as u32 - 6;
    let (code, len) = CBP[(pattern >> extra) as usize];
    w.put(code, len);
    w.put(pattern & ((1 << extra) - 1), extra);
}

/// One run/level pair. A few pairs use their table codes; everything else
/// goes through the escape.
pub fn coefficient(w: &mut BitWriter, run: u32, level: i32, intra_vlc_format: bool) {
    let code = match (run, level.unsigned_abs(), intra_vlc_format) {
        (0, 5, false) => Some((0x26, 8)),
        (1, 5, false) => Some((0x1b, 12)),
        (0, 5, true) => Some((0x1d, 5)),
        (1, 5, true) => Some((0x20, 8)),
        _ => None,
    };
    match code {
        Some((bits, len)) => {
            w.put(bits, len).flag(level < 0);
        }
        None => {
            w.put(0b000001, 6).put(run, 6).put(level as u32, 12);
        }
    }
}

pub fn end_of_block(w: &mut BitWriter, intra_vlc_format: bool) {
    if intra_vlc_format {
        w.put(0b0110, 4);
    } else {
        w.put(0b10, 2);
    }
}

/// A non-intra block holding only a DC level, sent as an escape.
pub fn residual_dc_block(w: &mut BitWriter, level: i32) {
    coefficient(w, 0, level, false);
    end_of_block(w, false);
}

/// MPEG-2 stream whose first picture loses its second slice, followed by a
/// clean picture: flat 66 in the first row, then flat 77.
pub fn stream_with_corrupt_slice() -> Vec<u8> {
    let mut s = StreamBuilder::new(SequenceSpec::mpeg2(32, 32));
    s.sequence_header().gop(true, false);
    s.picture(PictureSpec::frame(0, 1)).limit_rows(1).intra_rows(66, 128, 128);
    // qscale 1, increment 1, then a reserved I macroblock_type ('00')
    let mut bad = BitWriter::new();
    bad.put(1, 5).put(0, 1).put(1, 1).put(0, 8).put(0xFF, 8);
    s.chunk(2, &bad.finish());
    s.picture(PictureSpec::frame(1, 1)).intra_rows(77, 128, 128);
    s.build()
}

pub fn is_flat(plane: &[u8], value: u8) -> bool {
    plane.iter().all(|&v| v == value)
}

/// Luma value of the first sample of every displayed frame.
pub fn luma_tags(frames: &[DecodedFrame]) -> Vec<u8> {
    frames.iter().map(|f| f.frame.y[0]).collect()
}

/// Sample at (`x`, `y`) of a plane `stride` samples wide.
pub fn sample(plane: &[u8], stride: usize, x: usize, y: usize) -> u8 {
    plane[y * stride + x]
}

/// Every sample of the rectangle `xs` x `ys` equals `value`.
pub fn region_is(plane: &[u8], stride: usize, xs: Range<usize>, ys: Range<usize>, value: u8) -> bool {
    ys.into_iter().all(|y| plane[y * stride + xs.start..y * stride + xs.end].iter().all(|&v| v == value))
}
