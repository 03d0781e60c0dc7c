//! Scan orders, quantizer defaults and the small lookup tables used by the
//! header parser.

/// Zig-zag scan: position `i` in the bitstream maps to natural index `ZIGZAG[i]`.
pub const ZIGZAG: [u8; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10, 17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34, 27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Alternate (interlaced) scan.
pub const ALTERNATE: [u8; 64] = [
     0,  8, 16, 24,  1,  9,  2, 10, 17, 25, 32, 40, 48, 56, 57, 49,
    41, 33, 26, 18,  3, 11,  4, 12, 19, 27, 34, 42, 50, 58, 35, 43,
    51, 59, 20, 28,  5, 13,  6, 14, 21, 29, 36, 44, 52, 60, 37, 45,
    53, 61, 22, 30,  7, 15, 23, 31, 38, 46, 54, 62, 39, 47, 55, 63,
];

/// Default intra matrix, in zig-zag order.
pub const DEFAULT_INTRA_MATRIX_ZIGZAG: [u8; 64] = [
     8, 16, 16, 19, 16, 19, 22, 22, 22, 22, 22, 22, 26, 24, 26, 27,
    27, 27, 26, 26, 26, 26, 27, 27, 27, 29, 29, 29, 34, 34, 34, 29,
    29, 29, 27, 27, 29, 29, 32, 32, 34, 34, 37, 38, 37, 35, 35, 34,
    35, 38, 38, 40, 40, 40, 48, 48, 46, 46, 56, 56, 58, 69, 69, 83,
];

pub const DEFAULT_NON_INTRA_WEIGHT: u8 = 16;

/// Non-linear quantizer scale (q_scale_type = 1), indexed by the 5-bit code.
pub const NON_LINEAR_QSCALE: [u8; 32] = [
     0,  1,  2,  3,  4,  5,  6,  7,  8, 10, 12, 14, 16, 18, 20, 22,
    24, 28, 32, 36, 40, 44, 48, 52, 56, 64, 72, 80, 88, 96, 104, 112,
];

/// Frame period in 27 MHz ticks, indexed by frame_rate_code.
pub const FRAME_PERIOD: [u32; 9] = [
    0, 1126125, 1125000, 1080000, 900900, 900000, 540000, 450450, 450000,
];

/// Default intra matrix in natural order.
pub fn default_intra_matrix() -> [u8; 64] {
    let mut m = [0u8; 64];
    for (i, &w) in DEFAULT_INTRA_MATRIX_ZIGZAG.iter().enumerate() {
        m[ZIGZAG[i] as usize] = w;
    }
    m
}

/// IDCT kernel families. Each family may expect its coefficients in a
/// different memory layout; the scan tables are rebuilt to write straight
/// into that layout. Only the scalar family exists so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelSet {
    /// Row-major portable integer kernels.
    Scalar,
}

impl KernelSet {
    /// Coefficient layout expected by the kernel's IDCT: natural index ->
    /// storage index.
    pub fn input_permutation(self) -> [u8; 64] {
        match self {
            KernelSet::Scalar => {
                let mut p = [0u8; 64];
                for (i, v) in p.iter_mut().enumerate() {
                    *v = i as u8;
                }
                p
            }
        }
    }
}

/// Both scan orders, composed with a kernel's input permutation.
#[derive(Clone, Debug)]
pub struct ScanTables {
    pub zigzag: [u8; 64],
    pub alternate: [u8; 64],
    /// Natural index -> storage index.
    pub permutation: [u8; 64],
}

impl ScanTables {
    pub fn for_kernel(kernel: KernelSet) -> Self {
        let perm = kernel.input_permutation();
        let compose = |scan: &[u8; 64]| {
            let mut out = [0u8; 64];
            for (o, &s) in out.iter_mut().zip(scan.iter()) {
                *o = perm[s as usize];
            }
            out
        };
        ScanTables { zigzag: compose(&ZIGZAG), alternate: compose(&ALTERNATE), permutation: perm }
    }

    /// Reorder a natural-order quantizer matrix into storage order, so the
    /// weight of a coefficient sits at the same index as the coefficient.
    pub fn permute_weights(&self, matrix: &[u8; 64]) -> [u8; 64] {
        let mut out = [0u8; 64];
        for (natural, &w) in matrix.iter().enumerate() {
            out[self.permutation[natural] as usize] = w;
        }
        out
    }

    /// Storage index of the last coefficient, where mismatch control acts.
    pub fn last_index(&self) -> usize {
        self.permutation[63] as usize
    }

    pub fn select(&self, alternate: bool) -> &[u8; 64] {
        if alternate { &self.alternate } else { &self.zigzag }
    }
}
