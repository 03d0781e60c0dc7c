//! Command line front end: decodes an elementary stream file and optionally
//! dumps every displayed frame.
//!
//! Usage:
//!   mpeg2-decoder <input.m2v> [output_dir] [--yuv] [--png]
//!
//! With an output directory and no format flag, frames are written as raw
//! planar YUV.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use na_mpeg2_decoder::{DecodedFrame, DecoderConfig, DecoderError, FrameCollector, Mpeg2Decoder, Result, YuvFrame};

const READ_CHUNK: usize = 64 * 1024;
const USAGE: &str = "usage: mpeg2-decoder <input.m2v> [output_dir] [--yuv] [--png]";

struct Args {
    input: PathBuf,
    output: Option<PathBuf>,
    yuv: bool,
    png: bool,
}

impl Args {
    fn parse(mut it: impl Iterator<Item = String>) -> std::result::Result<Args, String> {
        let mut positional = Vec::new();
        let (mut yuv, mut png) = (false, false);
        for arg in it.by_ref() {
            match arg.as_str() {
                "--yuv" => yuv = true,
                "--png" => png = true,
                s if s.starts_with("--") => return Err(format!("unknown option {s}")),
                _ => positional.push(PathBuf::from(arg)),
            }
        }
        let mut positional = positional.into_iter();
        let input = positional.next().ok_or("missing input file")?;
        let output = positional.next();
        if let Some(extra) = positional.next() {
            return Err(format!("unexpected argument {}", extra.display()));
        }
        if output.is_some() && !yuv && !png {
            yuv = true;
        }
        Ok(Args { input, output, yuv, png })
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mpeg2-decoder: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Frame dump target and running counters.
struct Dump<'a> {
    args: &'a Args,
    count: u64,
    corrupt: u64,
}

impl Dump<'_> {
    fn frames(&mut self, frames: Vec<DecodedFrame>) -> Result<()> {
        for df in frames {
            self.count += 1;
            self.corrupt += df.info.corrupt as u64;
            let Some(dir) = self.args.output.as_deref() else {
                continue;
            };
            let stem = dir.join(format!("frame_{:06}", self.count));
            if self.args.yuv {
                save_planar(&stem.with_extension("yuv"), &df.frame)?;
            }
            if self.args.png {
                let crop = (df.info.display_width, df.info.display_height);
                save_png(&stem.with_extension("png"), &df.frame, crop)?;
            }
        }
        Ok(())
    }
}

fn run(args: &Args) -> Result<()> {
    let mut reader = BufReader::new(File::open(&args.input)?);
    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)?;
    }

    let mut dec = Mpeg2Decoder::new(DecoderConfig::from_env());
    let mut sink = FrameCollector::new();
    let mut dump = Dump { args, count: 0, corrupt: 0 };

    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let mut input = &buf[..n];
        // a failed chunk is dropped; keep going with what is queued
        while let Err(e) = dec.decode(input, &mut sink) {
            log::warn!("{e}");
            input = &[];
        }
        dump.frames(sink.take_frames())?;
    }
    if let Err(e) = dec.flush(&mut sink) {
        log::warn!("{e}");
    }
    dump.frames(sink.take_frames())?;

    match dec.sequence() {
        Some(seq) => log::info!(
            "{} frames ({} corrupt), {}x{} {:?}",
            dump.count, dump.corrupt, seq.horizontal_size, seq.vertical_size, seq.chroma_format
        ),
        None => log::warn!("no sequence header in {}", args.input.display()),
    }
    Ok(())
}

fn save_planar(path: &Path, frame: &YuvFrame) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(&frame.to_planar_u8())?;
    out.flush()?;
    Ok(())
}

/// BT.601 studio range to 8-bit RGB.
#[inline]
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let l = (y as i32 - 16) * 298;
    let u = cb as i32 - 128;
    let v = cr as i32 - 128;
    let clip = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [clip(l + 409 * v), clip(l - 100 * u - 208 * v), clip(l + 516 * u)]
}

fn save_png(path: &Path, frame: &YuvFrame, crop: (u32, u32)) -> Result<()> {
    let w = crop.0.min(frame.width) as usize;
    let h = crop.1.min(frame.height) as usize;
    let (luma, luma_stride) = frame.plane(0);
    let (cb, chroma_stride) = frame.plane(1);
    let (cr, _) = frame.plane(2);
    let (sx, sy) = frame.chroma_format.shifts();

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let crow = (row >> sy) * chroma_stride;
        for col in 0..w {
            let c = crow + (col >> sx);
            rgb.extend_from_slice(&ycbcr_to_rgb(luma[row * luma_stride + col], cb[c], cr[c]));
        }
    }

    let mut enc = png::Encoder::new(BufWriter::new(File::create(path)?), w as u32, h as u32);
    enc.set_color(png::ColorType::Rgb);
    enc.set_depth(png::BitDepth::Eight);
    let png_err = |e: png::EncodingError| DecoderError::Io(std::io::Error::other(format!("PNG error: {e}")));
    let mut writer = enc.write_header().map_err(png_err)?;
    writer.write_image_data(&rgb).map_err(png_err)?;
    Ok(())
}
