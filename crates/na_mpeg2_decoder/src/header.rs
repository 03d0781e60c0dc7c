//! Sequence, GOP, picture and extension headers.
//!
//! Each parser takes the payload of one start-code chunk (the bytes after the
//! start code) and either updates the given parameter set or reports
//! `MalformedHeader`. Parameters established by earlier headers are left
//! untouched on failure.

use crate::bitreader::BitReader;
use crate::error::{header_err, Result};
use crate::frame::{ChromaFormat, Field, ViewKind};
use crate::tables::{default_intra_matrix, DEFAULT_NON_INTRA_WEIGHT, FRAME_PERIOD, ZIGZAG};

// Extension identifiers (upper nibble of the first extension byte).
pub const EXT_SEQUENCE: u32 = 1;
pub const EXT_SEQUENCE_DISPLAY: u32 = 2;
pub const EXT_QUANT_MATRIX: u32 = 3;
pub const EXT_COPYRIGHT: u32 = 4;
pub const EXT_SEQUENCE_SCALABLE: u32 = 5;
pub const EXT_PICTURE_DISPLAY: u32 = 7;
pub const EXT_PICTURE_CODING: u32 = 8;
pub const EXT_PICTURE_SPATIAL_SCALABLE: u32 = 9;
pub const EXT_PICTURE_TEMPORAL_SCALABLE: u32 = 10;

fn get(br: &mut BitReader<'_>, n: u32, what: &str) -> Result<u32> {
    match br.read_bits(n) {
        Some(v) => Ok(v),
        None => header_err(format!("truncated {what}")),
    }
}

fn get_flag(br: &mut BitReader<'_>, what: &str) -> Result<bool> {
    Ok(get(br, 1, what)? != 0)
}

fn marker(br: &mut BitReader<'_>, what: &str) -> Result<()> {
    if get(br, 1, what)? != 1 {
        return header_err(format!("missing marker bit in {what}"));
    }
    Ok(())
}

/// A 64-entry matrix transmitted in zig-zag order, stored in natural order.
fn read_matrix(br: &mut BitReader<'_>, what: &str) -> Result<[u8; 64]> {
    let mut m = [0u8; 64];
    for &pos in ZIGZAG.iter() {
        let w = get(br, 8, what)? as u8;
        if w == 0 {
            return header_err(format!("zero weight in {what}"));
        }
        m[pos as usize] = w;
    }
    Ok(m)
}

/// The matrices in effect, luma and chroma, natural order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantMatrices {
    pub intra:            [u8; 64],
    pub non_intra:        [u8; 64],
    pub chroma_intra:     [u8; 64],
    pub chroma_non_intra: [u8; 64],
}

impl Default for QuantMatrices {
    fn default() -> Self {
        let intra = default_intra_matrix();
        let non_intra = [DEFAULT_NON_INTRA_WEIGHT; 64];
        QuantMatrices { intra, non_intra, chroma_intra: intra, chroma_non_intra: non_intra }
    }
}

impl QuantMatrices {
    pub fn select(&self, intra: bool, chroma: bool) -> &[u8; 64] {
        match (intra, chroma) {
            (true, false) => &self.intra,
            (false, false) => &self.non_intra,
            (true, true) => &self.chroma_intra,
            (false, true) => &self.chroma_non_intra,
        }
    }

    /// Quant matrix extension. Loading a luma matrix also loads its chroma
    /// counterpart unless the chroma matrix follows explicitly.
    pub fn parse_extension(&mut self, br: &mut BitReader<'_>) -> Result<()> {
        if get_flag(br, "quant matrix extension")? {
            self.intra = read_matrix(br, "intra quantizer matrix")?;
            self.chroma_intra = self.intra;
        }
        if get_flag(br, "quant matrix extension")? {
            self.non_intra = read_matrix(br, "non-intra quantizer matrix")?;
            self.chroma_non_intra = self.non_intra;
        }
        if get_flag(br, "quant matrix extension")? {
            self.chroma_intra = read_matrix(br, "chroma intra quantizer matrix")?;
        }
        if get_flag(br, "quant matrix extension")? {
            self.chroma_non_intra = read_matrix(br, "chroma non-intra quantizer matrix")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceParams {
    /// Picture size as transmitted (including size extensions).
    pub horizontal_size: u32,
    pub vertical_size:   u32,
    /// Size of the decoded planes, in whole macroblocks.
    pub coded_width:  u32,
    pub coded_height: u32,
    pub display_width:  u32,
    pub display_height: u32,
    pub chroma_format: ChromaFormat,
    pub mpeg1: bool,
    pub progressive_sequence: bool,
    pub low_delay: bool,
    pub profile_level_id: u8,
    pub aspect_ratio_code: u8,
    /// Sample aspect ratio, `(0, 0)` when unknown.
    pub pixel_aspect: (u32, u32),
    pub frame_rate_code: u8,
    pub frame_rate_extension: (u8, u8),
    /// Frame duration in 27 MHz ticks, 0 when unknown.
    pub frame_period: u32,
    pub byte_rate: u32,
    pub vbv_buffer_size: u32,
    pub constrained_parameters: bool,
    pub video_format: u8,
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub matrices: QuantMatrices,
    bit_rate_value: u32,
    vbv_buffer_size_value: u32,
}

impl SequenceParams {
    /// Sequence header. The result describes an MPEG-1 sequence until a
    /// sequence extension is applied; call [`SequenceParams::finalize`] once
    /// all extensions have been seen.
    pub fn parse_header(payload: &[u8]) -> Result<Self> {
        let mut br = BitReader::new(payload);
        let what = "sequence header";
        let horizontal_size = get(&mut br, 12, what)?;
        let vertical_size = get(&mut br, 12, what)?;
        let aspect_ratio_code = get(&mut br, 4, what)? as u8;
        let frame_rate_code = get(&mut br, 4, what)? as u8;
        let bit_rate_value = get(&mut br, 18, what)?;
        marker(&mut br, what)?;
        let vbv_buffer_size_value = get(&mut br, 10, what)?;
        let constrained_parameters = get_flag(&mut br, what)?;

        if horizontal_size == 0 || vertical_size == 0 {
            return header_err(format!("invalid picture size {horizontal_size}x{vertical_size}"));
        }

        let mut matrices = QuantMatrices::default();
        if get_flag(&mut br, what)? {
            matrices.intra = read_matrix(&mut br, "intra quantizer matrix")?;
        }
        if get_flag(&mut br, what)? {
            matrices.non_intra = read_matrix(&mut br, "non-intra quantizer matrix")?;
        }
        matrices.chroma_intra = matrices.intra;
        matrices.chroma_non_intra = matrices.non_intra;

        Ok(SequenceParams {
            horizontal_size,
            vertical_size,
            coded_width: 0,
            coded_height: 0,
            display_width: horizontal_size,
            display_height: vertical_size,
            chroma_format: ChromaFormat::Chroma420,
            mpeg1: true,
            progressive_sequence: true,
            low_delay: false,
            profile_level_id: 0x80,
            aspect_ratio_code,
            pixel_aspect: (0, 0),
            frame_rate_code,
            frame_rate_extension: (0, 0),
            frame_period: 0,
            byte_rate: 0,
            vbv_buffer_size: 0,
            constrained_parameters,
            video_format: 0,
            colour_primaries: 1,
            transfer_characteristics: 1,
            matrix_coefficients: 1,
            matrices,
            bit_rate_value,
            vbv_buffer_size_value,
        })
    }

    /// Sequence extension body (after the 4-bit identifier).
    pub fn parse_extension(&mut self, br: &mut BitReader<'_>) -> Result<()> {
        let what = "sequence extension";
        self.profile_level_id = get(br, 8, what)? as u8;
        self.progressive_sequence = get_flag(br, what)?;
        let chroma_code = get(br, 2, what)?;
        let Some(chroma_format) = ChromaFormat::from_code(chroma_code) else {
            return header_err("reserved chroma_format 0");
        };
        let h_ext = get(br, 2, what)?;
        let v_ext = get(br, 2, what)?;
        let bit_rate_ext = get(br, 12, what)?;
        marker(br, what)?;
        let vbv_ext = get(br, 8, what)?;
        self.low_delay = get_flag(br, what)?;
        let n = get(br, 2, what)? as u8;
        let d = get(br, 5, what)? as u8;

        self.chroma_format = chroma_format;
        self.horizontal_size |= h_ext << 12;
        self.vertical_size |= v_ext << 12;
        self.display_width = self.horizontal_size;
        self.display_height = self.vertical_size;
        self.bit_rate_value |= bit_rate_ext << 18;
        self.vbv_buffer_size_value |= vbv_ext << 10;
        self.frame_rate_extension = (n, d);
        self.mpeg1 = false;
        Ok(())
    }

    /// Sequence display extension body.
    pub fn parse_display_extension(&mut self, br: &mut BitReader<'_>) -> Result<()> {
        let what = "sequence display extension";
        self.video_format = get(br, 3, what)? as u8;
        if get_flag(br, what)? {
            self.colour_primaries = get(br, 8, what)? as u8;
            self.transfer_characteristics = get(br, 8, what)? as u8;
            self.matrix_coefficients = get(br, 8, what)? as u8;
        }
        let w = get(br, 14, what)?;
        marker(br, what)?;
        let h = get(br, 14, what)?;
        if w == 0 || h == 0 {
            return header_err(format!("invalid display size {w}x{h}"));
        }
        self.display_width = w;
        self.display_height = h;
        Ok(())
    }

    /// Derive coded size, rates and aspect ratio. Rejects pictures whose
    /// coded dimensions exceed `max_dimension`.
    pub fn finalize(&mut self, max_dimension: u32) -> Result<()> {
        self.coded_width = (self.horizontal_size + 15) & !15;
        self.coded_height = if self.progressive_sequence {
            (self.vertical_size + 15) & !15
        } else {
            (self.vertical_size + 31) & !31
        };
        if self.coded_width > max_dimension || self.coded_height > max_dimension {
            return header_err(format!(
                "coded size {}x{} exceeds limit {max_dimension}",
                self.coded_width, self.coded_height
            ));
        }

        self.byte_rate = self.bit_rate_value * 50;
        if self.mpeg1 && self.bit_rate_value == 0x3ffff {
            // variable bit rate
            self.byte_rate = 0;
        }
        self.vbv_buffer_size = self.vbv_buffer_size_value * 2048;

        self.frame_period = FRAME_PERIOD.get(self.frame_rate_code as usize).copied().unwrap_or(0);
        let (n, d) = self.frame_rate_extension;
        self.frame_period = self.frame_period * (d as u32 + 1) / (n as u32 + 1);

        self.pixel_aspect = self.compute_pixel_aspect();
        Ok(())
    }

    fn compute_pixel_aspect(&self) -> (u32, u32) {
        let (w, h) = if !self.mpeg1 {
            let (dw, dh) = match self.aspect_ratio_code {
                1 => return (1, 1),
                2 => (4, 3),
                3 => (16, 9),
                4 => (221, 100),
                _ => return (0, 0),
            };
            (dw * self.display_height, dh * self.display_width)
        } else {
            match self.aspect_ratio_code {
                0 | 15 => return (0, 0),
                1 => return (1, 1),
                3 => return (64, 45),
                6 => return (32, 27),
                12 => return (8, 9),
                c => (2000, 88 * c as u32 + 1171),
            }
        };
        let g = gcd(w, h);
        if g == 0 { (0, 0) } else { (w / g, h / g) }
    }

    /// Whether `other` can reuse the buffers allocated for `self`.
    pub fn same_geometry(&self, other: &SequenceParams) -> bool {
        self.coded_width == other.coded_width
            && self.coded_height == other.coded_height
            && self.chroma_format == other.chroma_format
    }

    pub fn mb_width(&self) -> u32 {
        self.coded_width / 16
    }

    pub fn mb_height(&self) -> u32 {
        self.coded_height / 16
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeCode {
    pub drop_frame: bool,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub pictures: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GopInfo {
    pub time_code: TimeCode,
    pub closed_gop: bool,
    pub broken_link: bool,
}

impl GopInfo {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut br = BitReader::new(payload);
        let what = "group of pictures header";
        let drop_frame = get_flag(&mut br, what)?;
        let hours = get(&mut br, 5, what)? as u8;
        let minutes = get(&mut br, 6, what)? as u8;
        marker(&mut br, what)?;
        let seconds = get(&mut br, 6, what)? as u8;
        let pictures = get(&mut br, 6, what)? as u8;
        let closed_gop = get_flag(&mut br, what)?;
        let broken_link = get_flag(&mut br, what)?;
        Ok(GopInfo {
            time_code: TimeCode { drop_frame, hours, minutes, seconds, pictures },
            closed_gop,
            broken_link,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PictureCodingType {
    I,
    P,
    B,
    /// MPEG-1 DC-only intra picture.
    D,
}

impl PictureCodingType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(PictureCodingType::I),
            2 => Some(PictureCodingType::P),
            3 => Some(PictureCodingType::B),
            4 => Some(PictureCodingType::D),
            _ => None,
        }
    }

    pub fn is_b(self) -> bool {
        self == PictureCodingType::B
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PictureStructure {
    TopField,
    BottomField,
    Frame,
}

impl PictureStructure {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(PictureStructure::TopField),
            2 => Some(PictureStructure::BottomField),
            3 => Some(PictureStructure::Frame),
            _ => None,
        }
    }

    pub fn field(self) -> Option<Field> {
        match self {
            PictureStructure::TopField => Some(Field::Top),
            PictureStructure::BottomField => Some(Field::Bottom),
            PictureStructure::Frame => None,
        }
    }

    pub fn view(self) -> ViewKind {
        match self.field() {
            Some(f) => ViewKind::Field(f),
            None => ViewKind::Frame,
        }
    }

    pub fn is_frame(self) -> bool {
        self == PictureStructure::Frame
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PictureParams {
    pub temporal_reference: u16,
    pub coding_type: PictureCodingType,
    pub vbv_delay: u16,
    /// `f_code[direction][axis]`, direction 0 = forward.
    pub f_code: [[u8; 2]; 2],
    /// MPEG-1 full-pel vectors, per direction.
    pub full_pel: [bool; 2],
    pub intra_dc_precision: u8,
    pub structure: PictureStructure,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub chroma_420_type: bool,
    pub progressive_frame: bool,
    pub composite_display: bool,
    /// Frame centre offsets in 1/16 sample units.
    pub frame_centre_offsets: [(i16, i16); 3],
    /// Display duration hint in fields.
    pub nb_fields: u8,
    /// Second field of a field pair.
    pub second_field: bool,
}

impl PictureParams {
    /// Picture header. Coding-extension fields start at their MPEG-1 values.
    pub fn parse_header(payload: &[u8], mpeg1: bool) -> Result<Self> {
        let mut br = BitReader::new(payload);
        let what = "picture header";
        let temporal_reference = get(&mut br, 10, what)? as u16;
        let type_code = get(&mut br, 3, what)?;
        let Some(coding_type) = PictureCodingType::from_code(type_code) else {
            return header_err(format!("invalid picture coding type {type_code}"));
        };
        if coding_type == PictureCodingType::D && !mpeg1 {
            return header_err("D picture in an MPEG-2 sequence");
        }
        let vbv_delay = get(&mut br, 16, what)? as u16;

        let mut f_code = [[15u8; 2]; 2];
        let mut full_pel = [false; 2];
        if matches!(coding_type, PictureCodingType::P | PictureCodingType::B) {
            full_pel[0] = get_flag(&mut br, what)?;
            let f = get(&mut br, 3, what)? as u8;
            if mpeg1 && f == 0 {
                return header_err("forward_f_code 0");
            }
            f_code[0] = [f, f];
        }
        if coding_type == PictureCodingType::B {
            full_pel[1] = get_flag(&mut br, what)?;
            let f = get(&mut br, 3, what)? as u8;
            if mpeg1 && f == 0 {
                return header_err("backward_f_code 0");
            }
            f_code[1] = [f, f];
        }
        // extra_information_picture is skipped
        while br.read_bit() == Some(true) {
            if br.skip_bits(8).is_none() {
                break;
            }
        }

        Ok(PictureParams {
            temporal_reference,
            coding_type,
            vbv_delay,
            f_code,
            full_pel,
            intra_dc_precision: 0,
            structure: PictureStructure::Frame,
            top_field_first: true,
            frame_pred_frame_dct: true,
            concealment_motion_vectors: false,
            q_scale_type: false,
            intra_vlc_format: false,
            alternate_scan: false,
            repeat_first_field: false,
            chroma_420_type: false,
            progressive_frame: true,
            composite_display: false,
            frame_centre_offsets: [(0, 0); 3],
            nb_fields: 2,
            second_field: false,
        })
    }

    /// Picture coding extension body.
    pub fn parse_coding_extension(&mut self, br: &mut BitReader<'_>, progressive_sequence: bool) -> Result<()> {
        let what = "picture coding extension";
        let mut f_code = [[0u8; 2]; 2];
        for dir in f_code.iter_mut() {
            for axis in dir.iter_mut() {
                *axis = get(br, 4, what)? as u8;
                if *axis == 0 {
                    return header_err("f_code 0");
                }
            }
        }
        let intra_dc_precision = get(br, 2, what)? as u8;
        let structure_code = get(br, 2, what)?;
        let Some(structure) = PictureStructure::from_code(structure_code) else {
            return header_err("reserved picture_structure 0");
        };
        let top_field_first = get_flag(br, what)?;
        let frame_pred_frame_dct = get_flag(br, what)?;
        let concealment_motion_vectors = get_flag(br, what)?;
        let q_scale_type = get_flag(br, what)?;
        let intra_vlc_format = get_flag(br, what)?;
        let alternate_scan = get_flag(br, what)?;
        let repeat_first_field = get_flag(br, what)?;
        let chroma_420_type = get_flag(br, what)?;
        let progressive_frame = get_flag(br, what)?;
        let composite_display = get_flag(br, what)?;
        if composite_display {
            // v_axis, field_sequence, sub_carrier, burst_amplitude, sub_carrier_phase
            get(br, 20, what)?;
        }

        self.f_code = f_code;
        self.full_pel = [false, false];
        self.intra_dc_precision = intra_dc_precision;
        self.structure = structure;
        self.top_field_first = top_field_first;
        self.frame_pred_frame_dct = frame_pred_frame_dct;
        self.concealment_motion_vectors = concealment_motion_vectors;
        self.q_scale_type = q_scale_type;
        self.intra_vlc_format = intra_vlc_format;
        self.alternate_scan = alternate_scan;
        self.repeat_first_field = repeat_first_field;
        self.chroma_420_type = chroma_420_type;
        self.progressive_frame = progressive_frame;
        self.composite_display = composite_display;

        self.nb_fields = if !structure.is_frame() {
            1
        } else if !progressive_sequence {
            if repeat_first_field { 3 } else { 2 }
        } else if repeat_first_field {
            if top_field_first { 6 } else { 4 }
        } else {
            2
        };
        Ok(())
    }

    /// Picture display extension body. The number of offsets depends on the
    /// coding extension that precedes it.
    pub fn parse_display_extension(&mut self, br: &mut BitReader<'_>, progressive_sequence: bool) -> Result<()> {
        let what = "picture display extension";
        let count = if progressive_sequence {
            (self.nb_fields / 2).max(1) as usize
        } else {
            self.nb_fields.min(3) as usize
        };
        let mut last = (0i16, 0i16);
        for i in 0..3 {
            if i < count {
                let x = get(br, 16, what)? as u16 as i16;
                marker(br, what)?;
                let y = get(br, 16, what)? as u16 as i16;
                marker(br, what)?;
                last = (x, y);
            }
            self.frame_centre_offsets[i] = last;
        }
        Ok(())
    }

    /// `f_code - 1`, the number of residual bits of a motion vector.
    pub fn r_size(&self, direction: usize, axis: usize) -> u32 {
        self.f_code[direction][axis].saturating_sub(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack `(value, bits)` fields MSB first.
    fn pack(fields: &[(u32, u32)]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut acc = 0u64;
        let mut n = 0u32;
        for &(v, bits) in fields {
            acc = (acc << bits) | (v as u64 & ((1u64 << bits) - 1));
            n += bits;
            while n >= 8 {
                out.push((acc >> (n - 8)) as u8);
                n -= 8;
            }
        }
        if n > 0 {
            out.push((acc << (8 - n)) as u8);
        }
        out
    }

    fn seq_header(w: u32, h: u32, marker_bit: u32) -> Vec<u8> {
        pack(&[(w, 12), (h, 12), (2, 4), (3, 4), (5000, 18), (marker_bit, 1), (112, 10), (0, 1), (0, 1), (0, 1)])
    }

    #[test]
    fn sequence_header_mpeg1_defaults() {
        let mut s = SequenceParams::parse_header(&seq_header(352, 240, 1)).unwrap();
        assert!(s.mpeg1);
        s.finalize(4096).unwrap();
        assert_eq!((s.coded_width, s.coded_height), (352, 240));
        assert_eq!(s.frame_period, 1080000);
        assert_eq!(s.byte_rate, 250000);
        assert_eq!(s.matrices.intra, default_intra_matrix());
        assert_eq!(s.matrices.non_intra, [16u8; 64]);
    }

    #[test]
    fn marker_and_size_are_validated() {
        assert!(matches!(
            SequenceParams::parse_header(&seq_header(352, 240, 0)),
            Err(crate::DecoderError::MalformedHeader(_))
        ));
        assert!(SequenceParams::parse_header(&seq_header(0, 240, 1)).is_err());
        let mut s = SequenceParams::parse_header(&seq_header(4000, 240, 1)).unwrap();
        assert!(s.finalize(2048).is_err());
    }

    fn seq_ext(progressive: u32, chroma: u32) -> Vec<u8> {
        pack(&[
            (1, 4), (0x48, 8), (progressive, 1), (chroma, 2), (0, 2), (0, 2),
            (0, 12), (1, 1), (0, 8), (0, 1), (0, 2), (0, 5),
        ])
    }

    #[test]
    fn interlaced_sequences_round_height_to_32() {
        let mut s = SequenceParams::parse_header(&seq_header(720, 480, 1)).unwrap();
        let ext = seq_ext(0, 2);
        let mut br = BitReader::new(&ext);
        assert_eq!(br.read_bits(4), Some(EXT_SEQUENCE));
        s.parse_extension(&mut br).unwrap();
        s.finalize(4096).unwrap();
        assert!(!s.mpeg1);
        assert_eq!(s.chroma_format, ChromaFormat::Chroma422);
        assert_eq!((s.coded_width, s.coded_height), (720, 480));
        // 4:3 display on 720x480 -> 8:9 samples
        assert_eq!(s.pixel_aspect, (8, 9));

        let mut s = SequenceParams::parse_header(&seq_header(720, 486, 1)).unwrap();
        let mut br = BitReader::new(&ext);
        br.skip_bits(4);
        s.parse_extension(&mut br).unwrap();
        s.finalize(4096).unwrap();
        assert_eq!(s.coded_height, 512);
        assert_eq!(s.coded_height % 32, 0);
    }

    #[test]
    fn reserved_chroma_format_is_rejected() {
        let mut s = SequenceParams::parse_header(&seq_header(64, 64, 1)).unwrap();
        let ext = seq_ext(1, 0);
        let mut br = BitReader::new(&ext);
        br.skip_bits(4);
        assert!(s.parse_extension(&mut br).is_err());
        assert!(s.mpeg1);
    }

    #[test]
    fn picture_header_and_coding_extension() {
        let hdr = pack(&[(7, 10), (3, 3), (0xFFFF, 16), (0, 1), (7, 3), (0, 1), (7, 3), (0, 1)]);
        let mut p = PictureParams::parse_header(&hdr, false).unwrap();
        assert_eq!(p.coding_type, PictureCodingType::B);
        assert_eq!(p.temporal_reference, 7);

        let ext = pack(&[
            (8, 4), (2, 4), (3, 4), (4, 4), (5, 4), (1, 2), (2, 2),
            (1, 1), (0, 1), (0, 1), (1, 1), (1, 1), (1, 1), (0, 1), (0, 1), (0, 1), (0, 1),
        ]);
        let mut br = BitReader::new(&ext);
        assert_eq!(br.read_bits(4), Some(EXT_PICTURE_CODING));
        p.parse_coding_extension(&mut br, false).unwrap();
        assert_eq!(p.f_code, [[2, 3], [4, 5]]);
        assert_eq!(p.r_size(1, 1), 4);
        assert_eq!(p.intra_dc_precision, 1);
        assert_eq!(p.structure, PictureStructure::BottomField);
        assert!(p.q_scale_type && p.intra_vlc_format && p.alternate_scan);
        assert_eq!(p.nb_fields, 1);
    }

    #[test]
    fn invalid_picture_fields() {
        let hdr = pack(&[(0, 10), (0, 3), (0, 16)]);
        assert!(PictureParams::parse_header(&hdr, false).is_err());
        let d = pack(&[(0, 10), (4, 3), (0, 16)]);
        assert!(PictureParams::parse_header(&d, false).is_err());
        assert!(PictureParams::parse_header(&d, true).is_ok());

        let hdr = pack(&[(0, 10), (1, 3), (0, 16)]);
        let mut p = PictureParams::parse_header(&hdr, false).unwrap();
        let ext = pack(&[(1, 4), (1, 4), (1, 4), (1, 4), (0, 2), (0, 2), (0, 8)]);
        let mut br = BitReader::new(&ext);
        assert!(p.parse_coding_extension(&mut br, false).is_err());
        assert_eq!(p.structure, PictureStructure::Frame);
    }

    #[test]
    fn composite_display_fields_must_be_present() {
        let hdr = pack(&[(0, 10), (1, 3), (0, 16)]);
        let flags = [(1u32, 4u32), (1, 4), (1, 4), (1, 4), (3, 2), (3, 2)]
            .into_iter()
            .chain([(0, 1), (1, 1), (0, 1), (0, 1), (0, 1), (0, 1), (0, 1), (1, 1), (0, 1), (1, 1)]);

        let short: Vec<_> = flags.clone().chain([(0, 8)]).collect();
        let mut p = PictureParams::parse_header(&hdr, false).unwrap();
        let ext = pack(&short);
        let err = p.parse_coding_extension(&mut BitReader::new(&ext), false).unwrap_err();
        assert!(matches!(err, crate::DecoderError::MalformedHeader(_)));

        let full: Vec<_> = flags.chain([(0x5A5A5, 20)]).collect();
        let ext = pack(&full);
        p.parse_coding_extension(&mut BitReader::new(&ext), false).unwrap();
        assert!(p.composite_display);
        assert_eq!(p.nb_fields, 2);
    }

    #[test]
    fn gop_and_display_offsets() {
        let gop = pack(&[(0, 1), (1, 5), (2, 6), (1, 1), (3, 6), (4, 6), (1, 1), (0, 1)]);
        let g = GopInfo::parse(&gop).unwrap();
        assert_eq!(g.time_code.minutes, 2);
        assert_eq!(g.time_code.pictures, 4);
        assert!(g.closed_gop && !g.broken_link);

        let hdr = pack(&[(0, 10), (1, 3), (0, 16)]);
        let mut p = PictureParams::parse_header(&hdr, false).unwrap();
        p.nb_fields = 2;
        let ext = pack(&[(0xFFF0, 16), (1, 1), (32, 16), (1, 1), (16, 16), (1, 1), (0, 16), (1, 1)]);
        let mut br = BitReader::new(&ext);
        p.parse_display_extension(&mut br, false).unwrap();
        assert_eq!(p.frame_centre_offsets, [(-16, 32), (16, 0), (16, 0)]);
    }

    #[test]
    fn quant_matrix_extension_loads_chroma_with_luma() {
        let mut fields = vec![(1u32, 1u32)];
        fields.extend((0..64).map(|_| (20, 8)));
        fields.extend([(0, 1), (0, 1), (1, 1)]);
        fields.extend((0..64).map(|_| (30, 8)));
        let ext = pack(&fields);
        let mut m = QuantMatrices::default();
        let mut br = BitReader::new(&ext);
        m.parse_extension(&mut br).unwrap();
        assert_eq!(m.intra, [20; 64]);
        assert_eq!(m.chroma_intra, [20; 64]);
        assert_eq!(m.chroma_non_intra, [30; 64]);
        assert_eq!(m.select(false, false), &[16; 64]);
    }
}
