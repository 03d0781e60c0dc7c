//! Minimal C ABI for elementary stream decoding.
//!
//! The host registers two callbacks. `draw` receives bands of the picture
//! about to be displayed: plane pointers point at the first row of the band
//! (luma row `y`, the matching chroma row for Cb/Cr). `flip` is called once
//! per displayed picture after its last band.

use std::ffi::c_void;

use crate::api::{FrameSink, Mpeg2Decoder, PictureInfo};
use crate::config::DecoderConfig;
use crate::frame::ChromaFormat;
use crate::header::PictureCodingType;

pub type Mpeg2DrawCallback = extern "C" fn(
    user: *mut c_void,
    planes: *const *const u8,
    strides: *const usize,
    width: u32,
    height: u32,
    x: u32,
    y: u32,
);

pub type Mpeg2FlipCallback = extern "C" fn(user: *mut c_void, info: *const Mpeg2PictureView);

#[repr(C)]
pub struct Mpeg2PictureView {
    /// 1 = I, 2 = P, 3 = B, 4 = D.
    pub coding_type: i32,
    pub temporal_reference: u32,
    pub width: u32,
    pub height: u32,
    pub display_width: u32,
    pub display_height: u32,
    /// 1 = 4:2:0, 2 = 4:2:2, 3 = 4:4:4.
    pub chroma_format: i32,
    pub nb_fields: u32,
    pub top_field_first: i32,
    pub progressive_frame: i32,
    pub aspect_num: u32,
    pub aspect_den: u32,
    pub frame_period: u32,
    pub corrupt: i32,
}

impl From<&PictureInfo> for Mpeg2PictureView {
    fn from(info: &PictureInfo) -> Self {
        Mpeg2PictureView {
            coding_type: match info.coding_type {
                PictureCodingType::I => 1,
                PictureCodingType::P => 2,
                PictureCodingType::B => 3,
                PictureCodingType::D => 4,
            },
            temporal_reference: info.temporal_reference as u32,
            width: info.width,
            height: info.height,
            display_width: info.display_width,
            display_height: info.display_height,
            chroma_format: match info.chroma_format {
                ChromaFormat::Chroma420 => 1,
                ChromaFormat::Chroma422 => 2,
                ChromaFormat::Chroma444 => 3,
            },
            nb_fields: info.nb_fields as u32,
            top_field_first: info.top_field_first as i32,
            progressive_frame: info.progressive_frame as i32,
            aspect_num: info.pixel_aspect.0,
            aspect_den: info.pixel_aspect.1,
            frame_period: info.frame_period,
            corrupt: info.corrupt as i32,
        }
    }
}

struct CallbackSink {
    draw: Option<Mpeg2DrawCallback>,
    flip: Option<Mpeg2FlipCallback>,
    user: *mut c_void,
}

impl FrameSink for CallbackSink {
    fn draw_slice(&mut self, planes: [&[u8]; 3], strides: [usize; 3], width: u32, height: u32, x: u32, y: u32) {
        let Some(draw) = self.draw else {
            return;
        };
        let luma_rows = if strides[0] == 0 { 0 } else { planes[0].len() / strides[0] };
        if luma_rows == 0 {
            return;
        }
        let mut ptrs = [std::ptr::null::<u8>(); 3];
        for i in 0..3 {
            let rows = if strides[i] == 0 { 0 } else { planes[i].len() / strides[i] };
            let row = y as usize * rows / luma_rows;
            ptrs[i] = planes[i][row * strides[i]..].as_ptr();
        }
        draw(self.user, ptrs.as_ptr(), strides.as_ptr(), width, height, x, y);
    }

    fn flip_page(&mut self, info: &PictureInfo) {
        if let Some(flip) = self.flip {
            let view = Mpeg2PictureView::from(info);
            flip(self.user, &view);
        }
    }
}

struct Opaque {
    dec: Mpeg2Decoder,
    sink: CallbackSink,
}

/// Create a decoder configured from the environment (`MPEG2_ACCEL`,
/// `MPEG2_MAX_DIMENSION`).
#[no_mangle]
pub extern "C" fn mpeg2_decoder_create() -> *mut c_void {
    let opaque = Box::new(Opaque {
        dec: Mpeg2Decoder::new(DecoderConfig::from_env()),
        sink: CallbackSink { draw: None, flip: None, user: std::ptr::null_mut() },
    });
    Box::into_raw(opaque) as *mut c_void
}

#[no_mangle]
pub extern "C" fn mpeg2_decoder_destroy(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    unsafe {
        let _ = Box::from_raw(handle as *mut Opaque);
    }
}

/// Register the output callbacks. `user` is passed back unchanged.
///
/// Returns 0 on success, -1 on invalid arguments.
#[no_mangle]
pub extern "C" fn mpeg2_decoder_set_callbacks(
    handle: *mut c_void,
    draw: Option<Mpeg2DrawCallback>,
    flip: Option<Mpeg2FlipCallback>,
    user: *mut c_void,
) -> i32 {
    if handle.is_null() {
        return -1;
    }
    let opaque = unsafe { &mut *(handle as *mut Opaque) };
    opaque.sink = CallbackSink { draw, flip, user };
    0
}

/// Push bytes of the elementary stream.
///
/// Returns:
///   0  = ok
///  -1  = invalid arguments
///  -2  = decode error (the failing chunk was dropped; decoding can continue)
#[no_mangle]
pub extern "C" fn mpeg2_decoder_decode(handle: *mut c_void, data: *const u8, len: usize) -> i32 {
    if handle.is_null() || (data.is_null() && len != 0) {
        return -1;
    }
    let opaque = unsafe { &mut *(handle as *mut Opaque) };
    let bytes = if len == 0 { &[][..] } else { unsafe { std::slice::from_raw_parts(data, len) } };
    match opaque.dec.decode(bytes, &mut opaque.sink) {
        Ok(()) => 0,
        Err(e) => {
            log::warn!("mpeg2_decoder_decode: {e}");
            -2
        }
    }
}

/// Decode the buffered tail and display the remaining pictures.
///
/// Returns 0 on success, -1 on invalid arguments, -2 on decode error.
#[no_mangle]
pub extern "C" fn mpeg2_decoder_flush(handle: *mut c_void) -> i32 {
    if handle.is_null() {
        return -1;
    }
    let opaque = unsafe { &mut *(handle as *mut Opaque) };
    match opaque.dec.flush(&mut opaque.sink) {
        Ok(()) => 0,
        Err(e) => {
            log::warn!("mpeg2_decoder_flush: {e}");
            -2
        }
    }
}
