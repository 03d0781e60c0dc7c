//! Decoder configuration.
//!
//! Env vars:
//! - `MPEG2_ACCEL=auto|scalar|none` selects the kernel family (all families
//!   produce identical output).
//! - `MPEG2_MAX_DIMENSION=<n>` rejects sequences whose coded width or height
//!   exceeds `n` samples.

use std::env;

use crate::tables::KernelSet;

pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// Requested kernel family.
///
/// Only the portable scalar family is built, so both values currently
/// resolve to [`KernelSet::Scalar`]. The setting is kept so hosts can pin
/// the scalar kernels once a vectorized family exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Acceleration {
    /// Best kernels available on the host.
    #[default]
    Auto,
    /// Portable scalar kernels only.
    Scalar,
}

impl Acceleration {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" | "1" | "on" => Some(Acceleration::Auto),
            "scalar" | "none" | "0" | "off" => Some(Acceleration::Scalar),
            _ => None,
        }
    }

    /// Kernel family this request resolves to on the running host. Output
    /// never depends on it.
    pub fn kernel_set(self) -> KernelSet {
        match self {
            Acceleration::Auto | Acceleration::Scalar => KernelSet::Scalar,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    pub acceleration: Acceleration,
    pub max_dimension: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig { acceleration: Acceleration::Auto, max_dimension: DEFAULT_MAX_DIMENSION }
    }
}

impl DecoderConfig {
    pub fn from_env() -> Self {
        let acceleration = match env::var("MPEG2_ACCEL") {
            Ok(v) => Acceleration::parse(&v).unwrap_or_else(|| {
                log::warn!("MPEG2_ACCEL: unknown value {v:?}, using auto");
                Acceleration::Auto
            }),
            Err(_) => Acceleration::Auto,
        };
        let max_dimension = parse_u32_env("MPEG2_MAX_DIMENSION", DEFAULT_MAX_DIMENSION).max(16);
        DecoderConfig { acceleration, max_dimension }
    }
}

fn parse_u32_env(name: &str, default_v: u32) -> u32 {
    env::var(name).ok().and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(default_v)
}
