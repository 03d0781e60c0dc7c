//! Per-stream decoder state: chunk dispatch, sequence and picture lifecycle,
//! reference management and display ordering.

use crate::api::{FrameSink, PictureInfo};
use crate::bitreader::BitReader;
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::frame::{Field, FrameBufferManager, YuvFrame};
use crate::header::{
    GopInfo, PictureParams, SequenceParams, EXT_COPYRIGHT, EXT_PICTURE_CODING,
    EXT_PICTURE_DISPLAY, EXT_PICTURE_SPATIAL_SCALABLE, EXT_PICTURE_TEMPORAL_SCALABLE,
    EXT_QUANT_MATRIX, EXT_SEQUENCE, EXT_SEQUENCE_DISPLAY, EXT_SEQUENCE_SCALABLE,
};
use crate::slice::{decode_slice, SliceContext};
use crate::start_code::{
    is_slice, EXTENSION_START, GROUP_START, PICTURE_START, SEQUENCE_END, SEQUENCE_ERROR,
    SEQUENCE_HEADER, USER_DATA,
};
use crate::tables::ScanTables;
use crate::vlc::VlcSet;

#[inline]
const fn ext_bit(id: u32) -> u32 {
    1 << id
}

/// Pass every line of `frame` to the sink.
fn draw_rows(sink: &mut dyn FrameSink, frame: &YuvFrame, y: u32, height: u32) {
    let (y_plane, y_stride) = frame.plane(0);
    let (cb, cb_stride) = frame.plane(1);
    let (cr, cr_stride) = frame.plane(2);
    sink.draw_slice([y_plane, cb, cr], [y_stride, cb_stride, cr_stride], frame.width, height, 0, y);
}

/// A frame under reconstruction: one frame picture, or the two fields of a
/// field pair.
struct FrameState {
    /// Parameters of the picture (or field) currently being decoded.
    params: PictureParams,
    info: PictureInfo,
    /// Buffers are set up for the current picture.
    started: bool,
    /// Parity of the first field, once the second field's header arrived.
    first_field: Option<Field>,
    /// Not decoded (no references, or a header failed).
    skip: bool,
    /// Slices are handed to the sink as they complete.
    direct: bool,
    /// Macroblock rows of a direct picture already handed to the sink.
    drawn_rows: Vec<bool>,
}

impl FrameState {
    /// The picture currently being decoded is a B picture.
    fn is_b(&self) -> bool {
        self.params.coding_type.is_b()
    }
}

pub struct DecoderContext {
    config: DecoderConfig,
    vlc: VlcSet,
    scans: ScanTables,
    sequence: Option<SequenceParams>,
    /// Sequence header waiting for its extensions.
    pending_sequence: Option<SequenceParams>,
    buffers: Option<FrameBufferManager>,
    gop: Option<GopInfo>,
    frame: Option<FrameState>,
    ext_mask: u32,
    /// Anchors decoded since the sequence start or the last broken link,
    /// saturating at 2. B pictures need two.
    anchors: u32,
    /// Anchor waiting for the next anchor before it is displayed.
    held: Option<PictureInfo>,
    user_data: Vec<u8>,
}

impl DecoderContext {
    pub fn new(config: DecoderConfig) -> Self {
        let scans = ScanTables::for_kernel(config.acceleration.kernel_set());
        DecoderContext {
            config,
            vlc: VlcSet::new(),
            scans,
            sequence: None,
            pending_sequence: None,
            buffers: None,
            gop: None,
            frame: None,
            ext_mask: 0,
            anchors: 0,
            held: None,
            user_data: Vec::new(),
        }
    }

    pub fn sequence(&self) -> Option<&SequenceParams> {
        self.sequence.as_ref()
    }

    pub fn gop(&self) -> Option<&GopInfo> {
        self.gop.as_ref()
    }

    /// Process one start-code chunk. `payload` excludes the start code.
    pub fn process_chunk(&mut self, code: u8, payload: &[u8], sink: &mut dyn FrameSink) -> Result<()> {
        if is_slice(code) {
            return self.slice(code, payload, sink);
        }
        match code {
            SEQUENCE_HEADER => self.sequence_header(payload, sink),
            EXTENSION_START => self.extension(payload),
            USER_DATA => {
                match &mut self.frame {
                    // user data between a picture header and its slices
                    Some(f) if !f.started => f.info.user_data.extend_from_slice(payload),
                    _ => self.user_data.extend_from_slice(payload),
                }
                Ok(())
            }
            GROUP_START => {
                self.commit_sequence(sink)?;
                self.finish_frame(sink);
                self.ext_mask = 0;
                let gop = GopInfo::parse(payload)?;
                log::debug!(
                    "GOP {:02}:{:02}:{:02}.{:02} closed={} broken_link={}",
                    gop.time_code.hours, gop.time_code.minutes, gop.time_code.seconds,
                    gop.time_code.pictures, gop.closed_gop, gop.broken_link
                );
                if gop.broken_link {
                    // the previous anchor is not the one this GOP was coded against
                    self.anchors = 0;
                }
                self.gop = Some(gop);
                Ok(())
            }
            PICTURE_START => {
                self.commit_sequence(sink)?;
                self.picture_header(payload, sink)
            }
            SEQUENCE_END => {
                self.commit_sequence(sink)?;
                self.end_of_stream(sink);
                log::debug!("sequence end");
                Ok(())
            }
            SEQUENCE_ERROR => {
                log::warn!("sequence_error code in stream");
                Ok(())
            }
            other => {
                log::trace!("ignoring start code {other:#04x}");
                Ok(())
            }
        }
    }

    /// Complete the frame in progress and display the held anchor.
    pub fn end_of_stream(&mut self, sink: &mut dyn FrameSink) {
        self.finish_frame(sink);
        self.release_held(sink);
    }

    fn sequence_header(&mut self, payload: &[u8], sink: &mut dyn FrameSink) -> Result<()> {
        self.finish_frame(sink);
        self.pending_sequence = None;
        self.ext_mask = 0;
        let seq = SequenceParams::parse_header(payload)?;
        self.pending_sequence = Some(seq);
        self.ext_mask = ext_bit(EXT_SEQUENCE);
        Ok(())
    }

    /// Apply a sequence header once its extensions have been seen.
    fn commit_sequence(&mut self, sink: &mut dyn FrameSink) -> Result<()> {
        let Some(mut seq) = self.pending_sequence.take() else {
            return Ok(());
        };
        seq.finalize(self.config.max_dimension)?;

        let reuse = match (&self.sequence, &self.buffers) {
            (Some(old), Some(_)) => old.same_geometry(&seq),
            _ => false,
        };
        if !reuse {
            self.release_held(sink);
            log::debug!(
                "new sequence {}x{} (coded {}x{}) {:?} mpeg1={} progressive={} low_delay={}",
                seq.horizontal_size, seq.vertical_size, seq.coded_width, seq.coded_height,
                seq.chroma_format, seq.mpeg1, seq.progressive_sequence, seq.low_delay
            );
            self.buffers = Some(FrameBufferManager::new(seq.coded_width, seq.coded_height, seq.chroma_format));
            self.anchors = 0;
        }
        self.sequence = Some(seq);
        Ok(())
    }

    fn extension(&mut self, payload: &[u8]) -> Result<()> {
        let mut br = BitReader::new(payload);
        let Some(id) = br.read_bits(4) else {
            return Ok(());
        };
        match id {
            EXT_SEQUENCE_SCALABLE | EXT_PICTURE_SPATIAL_SCALABLE | EXT_PICTURE_TEMPORAL_SCALABLE => {
                log::debug!("ignoring scalable extension {id}");
                return Ok(());
            }
            _ => {}
        }
        if self.ext_mask & ext_bit(id) == 0 {
            log::debug!("ignoring extension {id} out of place");
            return Ok(());
        }
        self.ext_mask &= !ext_bit(id);

        match id {
            EXT_SEQUENCE => {
                if let Some(seq) = &mut self.pending_sequence {
                    if let Err(e) = seq.parse_extension(&mut br) {
                        self.pending_sequence = None;
                        return Err(e);
                    }
                    self.ext_mask = ext_bit(EXT_SEQUENCE_DISPLAY);
                }
            }
            EXT_SEQUENCE_DISPLAY => {
                if let Some(seq) = &mut self.pending_sequence {
                    seq.parse_display_extension(&mut br)?;
                }
            }
            EXT_QUANT_MATRIX => {
                if let Some(seq) = &mut self.sequence {
                    seq.matrices.parse_extension(&mut br)?;
                }
            }
            EXT_COPYRIGHT => log::trace!("copyright extension"),
            EXT_PICTURE_DISPLAY => {
                let progressive = self.sequence.as_ref().is_some_and(|s| s.progressive_sequence);
                if let Some(f) = &mut self.frame {
                    f.params.parse_display_extension(&mut br, progressive)?;
                    f.info.frame_centre_offsets = f.params.frame_centre_offsets;
                }
            }
            EXT_PICTURE_CODING => {
                let progressive = self.sequence.as_ref().is_some_and(|s| s.progressive_sequence);
                if let Some(f) = &mut self.frame {
                    if let Err(e) = f.params.parse_coding_extension(&mut br, progressive) {
                        f.skip = true;
                        return Err(e);
                    }
                    if f.first_field.is_none() {
                        f.info.refresh(&f.params);
                    }
                }
                self.ext_mask = ext_bit(EXT_QUANT_MATRIX) | ext_bit(EXT_COPYRIGHT) | ext_bit(EXT_PICTURE_DISPLAY);
            }
            _ => log::debug!("ignoring extension {id}"),
        }
        Ok(())
    }

    fn picture_header(&mut self, payload: &[u8], sink: &mut dyn FrameSink) -> Result<()> {
        let Some(mpeg1) = self.sequence.as_ref().map(|s| s.mpeg1) else {
            log::debug!("picture before the first sequence header, skipped");
            return Ok(());
        };

        // a decoded first field waits for its companion
        let pairing = match &self.frame {
            Some(f) => f.started && !f.params.structure.is_frame() && f.first_field.is_none(),
            None => false,
        };
        if !pairing {
            self.finish_frame(sink);
        }

        let mut params = match PictureParams::parse_header(payload, mpeg1) {
            Ok(p) => p,
            Err(e) => {
                self.finish_frame(sink);
                return Err(e);
            }
        };
        self.ext_mask = if mpeg1 { 0 } else { ext_bit(EXT_PICTURE_CODING) };

        if pairing {
            if let Some(f) = &mut self.frame {
                f.first_field = f.params.structure.field();
                params.second_field = true;
                f.params = params;
                f.started = false;
            }
            return Ok(());
        }

        let Some(seq) = &self.sequence else {
            return Ok(());
        };
        let mut info = PictureInfo::new(seq, &params);
        info.time_code = self.gop.map(|g| g.time_code);
        info.user_data = std::mem::take(&mut self.user_data);
        self.frame = Some(FrameState { params, info, started: false, first_field: None, skip: false, direct: false, drawn_rows: Vec::new() });
        Ok(())
    }

    /// Set up buffers for the picture whose first slice just arrived.
    fn begin_picture(&mut self, sink: &mut dyn FrameSink) {
        let mismatched = match &self.frame {
            Some(f) => match (f.first_field, f.params.structure.field()) {
                (Some(first), Some(second)) => first == second,
                (Some(_), None) => true,
                _ => false,
            },
            None => return,
        };
        if mismatched {
            // the first field stays alone; this picture starts a new frame
            log::warn!("field pair with mismatched structure");
            if let Some(mut f) = self.frame.take() {
                let params = f.params.clone();
                f.started = false;
                self.frame = Some(f);
                self.finish_frame(sink);
                if let Some(seq) = &self.sequence {
                    let info = PictureInfo::new(seq, &params);
                    self.frame = Some(FrameState {
                        params, info, started: false, first_field: None, skip: false, direct: false,
                        drawn_rows: Vec::new(),
                    });
                }
            }
        }

        let (Some(seq), Some(buffers), Some(f)) = (&self.sequence, &mut self.buffers, &mut self.frame) else {
            return;
        };
        let is_b = f.is_b();
        if f.first_field.is_none() {
            if is_b && self.anchors < 2 && !self.gop.is_some_and(|g| g.closed_gop) {
                log::debug!("B picture without references, skipped");
                f.skip = true;
                return;
            }
            buffers.begin_frame(is_b);
        } else {
            buffers.begin_second_field(is_b);
        }
        f.direct = f.params.structure.is_frame() && (seq.low_delay || is_b);
        if f.direct {
            f.drawn_rows = vec![false; seq.mb_height() as usize];
        }
        f.started = true;
    }

    fn slice(&mut self, code: u8, payload: &[u8], sink: &mut dyn FrameSink) -> Result<()> {
        let (skip, started) = match &self.frame {
            Some(f) => (f.skip, f.started),
            None => return Ok(()),
        };
        if skip {
            return Ok(());
        }
        if !started {
            self.begin_picture(sink);
        }
        let (Some(seq), Some(buffers), Some(f)) = (&self.sequence, &mut self.buffers, &mut self.frame) else {
            return Ok(());
        };
        if f.skip || !f.started {
            return Ok(());
        }
        let ctx = SliceContext { seq, pic: &f.params, vlc: &self.vlc, scans: &self.scans };
        let (dst, refs) = buffers.split(f.is_b());
        match decode_slice(&ctx, code, payload, dst, &refs) {
            Ok(rows) => {
                if f.direct {
                    let y = rows.first as u32 * 16;
                    let end = ((rows.last as u32 + 1) * 16).min(dst.height);
                    draw_rows(sink, dst, y, end - y);
                    let last = rows.last.min(f.drawn_rows.len().saturating_sub(1));
                    for drawn in f.drawn_rows.iter_mut().take(last + 1).skip(rows.first) {
                        *drawn = true;
                    }
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("slice {code:#04x} of picture {}: {e}", f.params.temporal_reference);
                f.info.corrupt = true;
                // macroblocks decoded before the error reach the sink with the flip
                if let Some(drawn) = f.drawn_rows.get_mut(code as usize - 1) {
                    *drawn = false;
                }
                Err(e)
            }
        }
    }

    /// Complete the frame in progress: promote anchors, update display order.
    fn finish_frame(&mut self, sink: &mut dyn FrameSink) {
        let Some(mut f) = self.frame.take() else {
            return;
        };
        if f.skip {
            return;
        }
        let Some(buffers) = &mut self.buffers else {
            return;
        };
        match (f.first_field.is_some(), f.started) {
            (false, false) => return,
            (true, true) => f.info.nb_fields = 2,
            (false, true) if f.params.structure.is_frame() => {}
            _ => {
                log::warn!("picture {} is missing its second field", f.info.temporal_reference);
                f.info.corrupt = true;
            }
        }
        let is_b = f.info.coding_type.is_b();
        let low_delay = self.sequence.as_ref().is_some_and(|s| s.low_delay);
        buffers.complete_frame(is_b);
        if !is_b {
            self.anchors = (self.anchors + 1).min(2);
        }

        if is_b {
            emit(sink, buffers.destination(), &f.info, &f.drawn_rows);
        } else if low_delay {
            emit(sink, buffers.forward(), &f.info, &f.drawn_rows);
        } else {
            if let Some(held) = self.held.take() {
                emit(sink, buffers.backward(), &held, &[]);
            }
            self.held = Some(f.info);
        }
    }

    fn release_held(&mut self, sink: &mut dyn FrameSink) {
        if let (Some(held), Some(buffers)) = (self.held.take(), &self.buffers) {
            emit(sink, buffers.forward(), &held, &[]);
        }
    }
}

/// Draw what the sink has not seen yet and flip. `drawn_rows` is empty for
/// pictures drawn in one piece; otherwise the rows no slice delivered (lost
/// or failed slices) are drawn in contiguous bands.
fn emit(sink: &mut dyn FrameSink, frame: &YuvFrame, info: &PictureInfo, drawn_rows: &[bool]) {
    if drawn_rows.is_empty() {
        draw_rows(sink, frame, 0, frame.height);
    }
    let mut row = 0;
    while row < drawn_rows.len() {
        if drawn_rows[row] {
            row += 1;
            continue;
        }
        let start = row;
        while row < drawn_rows.len() && !drawn_rows[row] {
            row += 1;
        }
        let y = start as u32 * 16;
        let end = (row as u32 * 16).min(frame.height);
        if end > y {
            draw_rows(sink, frame, y, end - y);
        }
    }
    log::trace!("display picture {} ({:?})", info.temporal_reference, info.coding_type);
    sink.flip_page(info);
}
