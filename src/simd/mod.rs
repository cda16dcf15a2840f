//! Backend kernels and the isa-dispatch table.
//!
//! Every backend implements the same small kernel set; the public codec paths
//! fetch the table once per call and go through plain function pointers, so
//! there is no virtual dispatch on the per-codeword path. The portable scalar
//! backend is the reference: each SIMD backend must produce bit-identical
//! output on every input, which the tests in this module check on whatever
//! hardware they run.

use std::sync::OnceLock;

use crate::matrix::Matrix;
use crate::model::ParityMatrix;

pub(crate) mod scalar;

#[cfg(target_arch = "aarch64")]
pub(crate) mod neon;

#[cfg(target_arch = "x86_64")]
pub(crate) mod avx2;

#[cfg(target_arch = "x86_64")]
pub(crate) mod avx512;

/// The kernel set every backend provides.
///
/// Block kernels operate on one block of a block-transposed buffer: `data` is
/// 8 rows of `stride` bytes, `parity` 2 rows of `stride` bytes, and only the
/// first `lanes` entries of each row are meaningful.
pub(crate) struct Backend {
    #[cfg_attr(not(test), allow(dead_code))]
    pub name: &'static str,
    /// 8 nibble symbols in, 2 parity symbols out.
    pub encode: fn(&ParityMatrix, &[u8; 8]) -> [u8; 2],
    /// 8 bytes in (two nibble streams), 2 packed parity bytes out.
    pub encode_dual: fn(&ParityMatrix, &[u8; 8]) -> [u8; 2],
    /// Inverse-matrix row products over a substituted received vector.
    pub matvec: fn(&Matrix, &[u8; 8]) -> [u8; 8],
    /// Blocked parity generation for one block.
    pub encode_block: fn(&ParityMatrix, &[u8], &mut [u8], usize, usize),
    /// Blocked dual-nibble parity generation for one block.
    pub encode_dual_block: fn(&ParityMatrix, &[u8], &mut [u8], usize, usize),
    /// Blocked inverse-matrix product for one block; writes the recovered
    /// data rows into `out` (same shape as `data`).
    pub decode_block: fn(&Matrix, &[u8], &mut [u8], usize, usize),
}

/// The backend chosen for this process: best instruction set the CPU
/// supports, probed once.
pub(crate) fn active() -> &'static Backend {
    static ACTIVE: OnceLock<&'static Backend> = OnceLock::new();
    ACTIVE.get_or_init(select)
}

fn select() -> &'static Backend {
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return &neon::BACKEND;
        }
    }
    #[cfg(target_arch = "x86_64")]
    {
        // The AVX-512 backend reuses the 128-bit single-codeword kernels, so
        // it additionally requires AVX2.
        if std::arch::is_x86_feature_detected!("avx512f")
            && std::arch::is_x86_feature_detected!("avx512bw")
            && std::arch::is_x86_feature_detected!("avx2")
        {
            return &avx512::BACKEND;
        }
        if std::arch::is_x86_feature_detected!("avx2") {
            return &avx2::BACKEND;
        }
    }
    &scalar::BACKEND
}
