//! Public library API.

use crate::config::DecoderConfig;
use crate::decoder::DecoderContext;
use crate::error::Result;
use crate::frame::{ChromaFormat, YuvFrame};
use crate::header::{GopInfo, PictureCodingType, PictureParams, SequenceParams, TimeCode};
use crate::start_code::find_prefix;

/// Metadata of a displayed picture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PictureInfo {
    pub coding_type: PictureCodingType,
    pub temporal_reference: u16,
    /// Decoded plane size (whole macroblocks).
    pub width: u32,
    pub height: u32,
    /// Visible area.
    pub display_width: u32,
    pub display_height: u32,
    pub chroma_format: ChromaFormat,
    pub progressive_frame: bool,
    pub top_field_first: bool,
    pub repeat_first_field: bool,
    /// Display duration hint in fields.
    pub nb_fields: u8,
    /// Pan-scan offsets in 1/16 sample units.
    pub frame_centre_offsets: [(i16, i16); 3],
    /// Pixel aspect ratio, `(0, 0)` when unknown.
    pub pixel_aspect: (u32, u32),
    /// Frame period in 27 MHz ticks.
    pub frame_period: u32,
    /// Time code of the GOP the picture belongs to.
    pub time_code: Option<TimeCode>,
    /// User data that preceded the picture's slices.
    pub user_data: Vec<u8>,
    /// A slice of this picture failed to decode, or a field is missing.
    pub corrupt: bool,
}

impl PictureInfo {
    pub(crate) fn new(seq: &SequenceParams, pic: &PictureParams) -> Self {
        let mut info = PictureInfo {
            coding_type: pic.coding_type,
            temporal_reference: pic.temporal_reference,
            width: seq.coded_width,
            height: seq.coded_height,
            display_width: seq.display_width,
            display_height: seq.display_height,
            chroma_format: seq.chroma_format,
            progressive_frame: true,
            top_field_first: true,
            repeat_first_field: false,
            nb_fields: 2,
            frame_centre_offsets: [(0, 0); 3],
            pixel_aspect: seq.pixel_aspect,
            frame_period: seq.frame_period,
            time_code: None,
            user_data: Vec::new(),
            corrupt: false,
        };
        info.refresh(pic);
        info
    }

    /// Pick up the fields set by the picture coding extension.
    pub(crate) fn refresh(&mut self, pic: &PictureParams) {
        self.progressive_frame = pic.progressive_frame;
        self.top_field_first = pic.top_field_first;
        self.repeat_first_field = pic.repeat_first_field;
        self.nb_fields = pic.nb_fields;
        self.frame_centre_offsets = pic.frame_centre_offsets;
    }
}

/// Receiver of decoded pictures, in display order.
pub trait FrameSink {
    /// Rows `y..y + height` (luma lines, full `width`, starting at column
    /// `x`) of the picture about to be displayed are final. `planes` are the
    /// complete Y, Cb and Cr planes with their strides; chroma rows scale
    /// with the chroma format.
    fn draw_slice(&mut self, planes: [&[u8]; 3], strides: [usize; 3], width: u32, height: u32, x: u32, y: u32);

    /// The picture drawn since the previous flip is complete.
    fn flip_page(&mut self, info: &PictureInfo);
}

/// A decoded video frame with its metadata.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub info: PictureInfo,
    pub is_key_frame: bool,
    pub frame: YuvFrame,
}

/// Sink that copies every displayed picture into an owned [`DecodedFrame`].
#[derive(Default)]
pub struct FrameCollector {
    planes: [Vec<u8>; 3],
    frames: Vec<DecodedFrame>,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[DecodedFrame] {
        &self.frames
    }

    pub fn take_frames(&mut self) -> Vec<DecodedFrame> {
        std::mem::take(&mut self.frames)
    }
}

impl FrameSink for FrameCollector {
    fn draw_slice(&mut self, planes: [&[u8]; 3], strides: [usize; 3], _width: u32, height: u32, _x: u32, y: u32) {
        let luma_rows = if strides[0] == 0 { 0 } else { planes[0].len() / strides[0] };
        if luma_rows == 0 {
            return;
        }
        for i in 0..3 {
            let (src, stride) = (planes[i], strides[i]);
            if stride == 0 {
                continue;
            }
            let dst = &mut self.planes[i];
            if dst.len() != src.len() {
                *dst = vec![0; src.len()];
            }
            let rows = src.len() / stride;
            let r0 = y as usize * rows / luma_rows;
            let r1 = ((y + height) as usize * rows / luma_rows).min(rows);
            dst[r0 * stride..r1 * stride].copy_from_slice(&src[r0 * stride..r1 * stride]);
        }
    }

    fn flip_page(&mut self, info: &PictureInfo) {
        let mut frame = YuvFrame::new(info.width, info.height, info.chroma_format);
        let [y, cb, cr] = &self.planes;
        if y.len() == frame.y.len() && cb.len() == frame.cb.len() && cr.len() == frame.cr.len() {
            frame.y.copy_from_slice(y);
            frame.cb.copy_from_slice(cb);
            frame.cr.copy_from_slice(cr);
        } else {
            log::warn!("picture {} flipped without matching slices", info.temporal_reference);
        }
        self.frames.push(DecodedFrame {
            is_key_frame: info.coding_type == PictureCodingType::I,
            info: info.clone(),
            frame,
        });
    }
}

/// MPEG-1 / MPEG-2 elementary stream video decoder.
///
/// Input is pushed in arbitrary pieces; a start-code chunk is decoded once
/// the next start code has arrived (or on [`Mpeg2Decoder::flush`]).
pub struct Mpeg2Decoder {
    ctx: DecoderContext,
    pending: Vec<u8>,
}

impl Default for Mpeg2Decoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl Mpeg2Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { ctx: DecoderContext::new(config), pending: Vec::new() }
    }

    /// Parameters of the active sequence.
    pub fn sequence(&self) -> Option<&SequenceParams> {
        self.ctx.sequence()
    }

    /// The most recent GOP header.
    pub fn gop(&self) -> Option<&GopInfo> {
        self.ctx.gop()
    }

    /// Append `data` and decode every complete chunk.
    ///
    /// On error the failing chunk is dropped and the rest stays queued:
    /// calling `decode` again (with more data or an empty slice) resumes at
    /// the next start code.
    pub fn decode(&mut self, data: &[u8], sink: &mut dyn FrameSink) -> Result<()> {
        self.pending.extend_from_slice(data);
        self.drain(false, sink)
    }

    /// Decode whatever is buffered, complete the picture in progress and
    /// display the held reference picture. Chunks after a failing one are
    /// still decoded; the first error is returned.
    pub fn flush(&mut self, sink: &mut dyn FrameSink) -> Result<()> {
        let result = self.drain(true, sink);
        if result.is_err() {
            while let Err(e) = self.drain(true, sink) {
                log::warn!("{e}");
            }
        }
        self.ctx.end_of_stream(sink);
        result
    }

    /// Decode a complete elementary stream into owned frames.
    ///
    /// Errors are logged and decoding resumes at the next start code, so a
    /// damaged stream still yields every picture that could be decoded. The
    /// first error is returned only when no picture came out at all.
    pub fn decode_all(&mut self, data: &[u8]) -> Result<Vec<DecodedFrame>> {
        let mut collector = FrameCollector::new();
        let mut first_error = None;
        let mut result = self.decode(data, &mut collector);
        while let Err(e) = result {
            log::warn!("{e}");
            first_error.get_or_insert(e);
            result = self.decode(&[], &mut collector);
        }
        if let Err(e) = self.flush(&mut collector) {
            log::warn!("{e}");
            first_error.get_or_insert(e);
        }
        let frames = collector.take_frames();
        match first_error {
            Some(e) if frames.is_empty() => Err(e),
            _ => Ok(frames),
        }
    }

    fn drain(&mut self, at_end: bool, sink: &mut dyn FrameSink) -> Result<()> {
        let len = self.pending.len();
        let mut consumed = 0;
        let result = loop {
            let Some(start) = find_prefix(&self.pending, consumed) else {
                // keep a possible partial prefix
                consumed = if at_end { len } else { len.saturating_sub(2).max(consumed) };
                break Ok(());
            };
            if start + 3 >= len {
                consumed = if at_end { len } else { start };
                break Ok(());
            }
            let body = start + 4;
            let end = match find_prefix(&self.pending, body) {
                Some(e) => e,
                None if at_end => len,
                None => {
                    consumed = start;
                    break Ok(());
                }
            };
            let code = self.pending[start + 3];
            let r = self.ctx.process_chunk(code, &self.pending[body..end], sink);
            consumed = end;
            if let Err(e) = r {
                break Err(e);
            }
        };
        self.pending.drain(..consumed);
        result
    }
}
