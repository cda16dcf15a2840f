//! Layout transforms between vector-major and block-transposed symbol
//! buffers.
//!
//! Vector-major is codeword-major: codeword `v` occupies `stripe` contiguous
//! bytes. The block-transposed layout groups `block_size` consecutive
//! codewords; within a block, symbol position `s` of all of them occupies
//! `block_size` contiguous bytes, so one SIMD vector spans that many
//! codewords. The stripe width is 8 for data buffers and 2 for parity
//! buffers.

use crate::error::{Error, Result};

/// Number of blocks needed for `num_codewords` codewords at `block_size`.
pub fn num_blocks(num_codewords: usize, block_size: usize) -> usize {
    num_codewords.div_ceil(block_size)
}

/// Size in bytes of a blocked buffer: whole blocks, including the tail
/// block's unused lanes.
pub fn blocked_len(num_codewords: usize, block_size: usize, stripe: usize) -> usize {
    num_blocks(num_codewords, block_size) * block_size * stripe
}

fn check_args(
    src_len: usize,
    dst_len: usize,
    num_codewords: usize,
    block_size: usize,
    stripe: usize,
    vector_major_is_src: bool,
) -> Result<()> {
    if num_codewords == 0 || block_size == 0 || stripe == 0 {
        return Err(Error::bad_length(format!(
            "num_codewords ({num_codewords}), block_size ({block_size}) and stripe ({stripe}) must be non-zero"
        )));
    }
    let vector_len = num_codewords * stripe;
    let block_len = blocked_len(num_codewords, block_size, stripe);
    let (want_src, want_dst) = if vector_major_is_src {
        (vector_len, block_len)
    } else {
        (block_len, vector_len)
    };
    if src_len != want_src {
        return Err(Error::bad_length(format!(
            "source buffer is {src_len} bytes, expected {want_src}"
        )));
    }
    if dst_len != want_dst {
        return Err(Error::bad_length(format!(
            "destination buffer is {dst_len} bytes, expected {want_dst}"
        )));
    }
    Ok(())
}

/// Transform a vector-major buffer of `num_codewords * stripe` symbols into
/// block-transposed layout. Unused lanes of the tail block are zeroed.
///
/// # Errors
/// * [`Error::BadLength`] - zero counts or mismatched buffer sizes.
pub fn to_blocked(
    src: &[u8],
    dst: &mut [u8],
    num_codewords: usize,
    block_size: usize,
    stripe: usize,
) -> Result<()> {
    check_args(src.len(), dst.len(), num_codewords, block_size, stripe, true)?;

    for block in 0..num_blocks(num_codewords, block_size) {
        let first = block * block_size;
        let lanes = block_size.min(num_codewords - first);
        let base = first * stripe;
        for symbol in 0..stripe {
            let row = &mut dst[base + symbol * block_size..base + (symbol + 1) * block_size];
            for (lane, out) in row.iter_mut().enumerate() {
                *out = if lane < lanes {
                    src[(first + lane) * stripe + symbol]
                } else {
                    0
                };
            }
        }
    }
    Ok(())
}

/// Transform a block-transposed buffer back to vector-major layout.
///
/// # Errors
/// * [`Error::BadLength`] - zero counts or mismatched buffer sizes.
pub fn from_blocked(
    src: &[u8],
    dst: &mut [u8],
    num_codewords: usize,
    block_size: usize,
    stripe: usize,
) -> Result<()> {
    check_args(src.len(), dst.len(), num_codewords, block_size, stripe, false)?;

    for block in 0..num_blocks(num_codewords, block_size) {
        let first = block * block_size;
        let lanes = block_size.min(num_codewords - first);
        let base = first * stripe;
        for symbol in 0..stripe {
            let row = &src[base + symbol * block_size..base + symbol * block_size + lanes];
            for (lane, &sym) in row.iter().enumerate() {
                dst[(first + lane) * stripe + symbol] = sym;
            }
        }
    }
    Ok(())
}
