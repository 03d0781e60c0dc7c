//! Coefficient decoding of one 8x8 block: DC differentials, run/level VLCs,
//! escapes and inverse quantization into a zeroed coefficient block.

use crate::bitreader::BitReader;
use crate::error::{slice_err, Result};
use crate::header::{PictureParams, QuantMatrices};
use crate::quant::{self, Mismatch};
use crate::tables::ScanTables;
use crate::vlc::{unpack_rl, VlcSet, VlcTable, DCT_EOB, DCT_ESCAPE};

/// Decode a `dct_dc_size` code plus the differential that follows it.
pub fn decode_dc_differential(br: &mut BitReader<'_>, table: &VlcTable) -> Result<i32> {
    let Some(size) = table.decode(br) else {
        return slice_err("invalid dct_dc_size");
    };
    if size == 0 {
        return Ok(0);
    }
    let size = size as u32;
    let Some(v) = br.read_bits(size) else {
        return slice_err("truncated dct_dc_differential");
    };
    let v = v as i32;
    Ok(if v < 1 << (size - 1) { v - (1 << size) + 1 } else { v })
}

/// Weight tables in coefficient storage order.
#[derive(Clone, Debug)]
struct Weights {
    intra: [u8; 64],
    non_intra: [u8; 64],
    chroma_intra: [u8; 64],
    chroma_non_intra: [u8; 64],
}

impl Weights {
    fn select(&self, intra: bool, chroma: bool) -> &[u8; 64] {
        match (intra, chroma) {
            (true, false) => &self.intra,
            (false, false) => &self.non_intra,
            (true, true) => &self.chroma_intra,
            (false, true) => &self.chroma_non_intra,
        }
    }
}

/// Per-picture block decoding parameters.
pub struct BlockDecoder<'a> {
    vlc: &'a VlcSet,
    scan: [u8; 64],
    last: usize,
    mpeg1: bool,
    intra_vlc_format: bool,
    intra_dc_precision: u8,
    weights: Weights,
}

impl<'a> BlockDecoder<'a> {
    pub fn new(
        vlc: &'a VlcSet,
        scans: &ScanTables,
        matrices: &QuantMatrices,
        pic: &PictureParams,
        mpeg1: bool,
    ) -> Self {
        let weights = Weights {
            intra: scans.permute_weights(matrices.select(true, false)),
            non_intra: scans.permute_weights(matrices.select(false, false)),
            chroma_intra: scans.permute_weights(matrices.select(true, true)),
            chroma_non_intra: scans.permute_weights(matrices.select(false, true)),
        };
        BlockDecoder {
            vlc,
            scan: *scans.select(pic.alternate_scan && !mpeg1),
            last: scans.last_index(),
            mpeg1,
            intra_vlc_format: pic.intra_vlc_format && !mpeg1,
            intra_dc_precision: if mpeg1 { 0 } else { pic.intra_dc_precision },
            weights,
        }
    }

    /// Predictor value every DC predictor is reset to.
    pub fn dc_reset(&self) -> i32 {
        1 << (self.intra_dc_precision + 7)
    }

    fn dc_table(&self, chroma: bool) -> &VlcTable {
        if chroma { &self.vlc.dc_chroma } else { &self.vlc.dc_luma }
    }

    /// Next run/level pair, or `None` at end of block.
    fn run_level(&self, br: &mut BitReader<'_>, table: &VlcTable) -> Result<Option<(usize, i32)>> {
        let Some(sym) = table.decode(br) else {
            return slice_err("invalid DCT coefficient code");
        };
        match sym {
            DCT_EOB => Ok(None),
            DCT_ESCAPE => {
                let Some(run) = br.read_bits(6) else {
                    return slice_err("truncated escape");
                };
                let level = if self.mpeg1 { read_mpeg1_escape_level(br)? } else {
                    match br.read_signed(12) {
                        Some(l) => l,
                        None => return slice_err("truncated escape"),
                    }
                };
                Ok(Some((run as usize, level)))
            }
            _ => {
                let (run, level) = unpack_rl(sym);
                match br.read_bit() {
                    Some(true) => Ok(Some((run, -level))),
                    Some(false) => Ok(Some((run, level))),
                    None => slice_err("truncated coefficient sign"),
                }
            }
        }
    }

    /// Walk run/level pairs from scan position `start`, handing each
    /// (storage index, level) to `store`.
    fn coefficients(
        &self,
        br: &mut BitReader<'_>,
        table: &VlcTable,
        mut next: usize,
        mut first: Option<(usize, i32)>,
        mut store: impl FnMut(usize, i32),
    ) -> Result<()> {
        loop {
            let pair = match first.take() {
                Some(p) => Some(p),
                None => self.run_level(br, table)?,
            };
            let Some((run, level)) = pair else {
                return Ok(());
            };
            let pos = next + run;
            if pos > 63 {
                return slice_err("coefficient run past the end of the block");
            }
            store(self.scan[pos] as usize, level);
            next = pos + 1;
        }
    }

    /// Decode an intra block. `dc_pred` is the running predictor of the
    /// block's colour component.
    pub fn intra_block(
        &self,
        br: &mut BitReader<'_>,
        chroma: bool,
        qscale: i32,
        dc_pred: &mut i32,
        block: &mut [i16; 64],
    ) -> Result<()> {
        *block = [0; 64];
        *dc_pred += decode_dc_differential(br, self.dc_table(chroma))?;
        let dc = quant::intra_dc(*dc_pred, self.intra_dc_precision);
        block[0] = dc as i16;

        let weights = self.weights.select(true, chroma);
        let table = if self.intra_vlc_format { &self.vlc.dct_b15 } else { &self.vlc.dct_b14 };
        if self.mpeg1 {
            return self.coefficients(br, table, 1, None, |j, level| {
                block[j] = quant::mpeg1_intra_ac(level, qscale, weights[j]) as i16;
            });
        }
        let mut mismatch = Mismatch::new();
        mismatch.add(dc);
        self.coefficients(br, table, 1, None, |j, level| {
            let v = quant::intra_ac(level, qscale, weights[j]);
            mismatch.add(v);
            block[j] = v as i16;
        })?;
        mismatch.apply(block, self.last);
        Ok(())
    }

    /// Decode a non-intra (residual) block.
    pub fn non_intra_block(
        &self,
        br: &mut BitReader<'_>,
        chroma: bool,
        qscale: i32,
        block: &mut [i16; 64],
    ) -> Result<()> {
        *block = [0; 64];
        // the first coefficient uses '1s' for run 0, level 1
        let first = if br.peek_bits(1) == 1 {
            br.skip_bits(1);
            match br.read_bit() {
                Some(neg) => Some((0, if neg { -1 } else { 1 })),
                None => return slice_err("truncated coefficient sign"),
            }
        } else {
            None
        };
        let weights = self.weights.select(false, chroma);
        let table = &self.vlc.dct_b14;
        if self.mpeg1 {
            return self.coefficients(br, table, 0, first, |j, level| {
                block[j] = quant::mpeg1_non_intra(level, qscale, weights[j]) as i16;
            });
        }
        let mut mismatch = Mismatch::new();
        self.coefficients(br, table, 0, first, |j, level| {
            let v = quant::non_intra(level, qscale, weights[j]);
            mismatch.add(v);
            block[j] = v as i16;
        })?;
        mismatch.apply(block, self.last);
        Ok(())
    }

    /// D pictures: DC coefficient only.
    pub fn dc_only_block(
        &self,
        br: &mut BitReader<'_>,
        chroma: bool,
        dc_pred: &mut i32,
        block: &mut [i16; 64],
    ) -> Result<()> {
        *block = [0; 64];
        *dc_pred += decode_dc_differential(br, self.dc_table(chroma))?;
        block[0] = quant::intra_dc(*dc_pred, 0) as i16;
        Ok(())
    }
}

/// MPEG-1 escape level: 8 bits, extended to 16 when the first byte is
/// `0x00` or `0x80`.
fn read_mpeg1_escape_level(br: &mut BitReader<'_>) -> Result<i32> {
    let Some(first) = br.read_signed(8) else {
        return slice_err("truncated escape");
    };
    let extended = match first {
        0 => br.read_bits(8).map(|v| v as i32),
        -128 => br.read_bits(8).map(|v| v as i32 - 256),
        _ => return Ok(first),
    };
    match extended {
        Some(v) => Ok(v),
        None => slice_err("truncated escape"),
    }
}
