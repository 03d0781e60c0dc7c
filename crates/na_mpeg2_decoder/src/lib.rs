//! MPEG-1 / MPEG-2 elementary stream video decoding library.
//!

pub mod bitreader;
pub mod block;
pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod header;
pub mod idct;
pub mod mc;
pub mod motion;
pub mod quant;
pub mod slice;
pub mod start_code;
pub mod tables;
pub mod vlc;

pub mod api;

pub use api::{DecodedFrame, FrameCollector, FrameSink, Mpeg2Decoder, PictureInfo};
pub use config::{Acceleration, DecoderConfig};
pub use error::{DecoderError, Result};
pub use frame::{ChromaFormat, YuvFrame};
pub use header::{GopInfo, PictureCodingType, SequenceParams, TimeCode};

pub mod ffi;
