//! AVX2 kernels.
//!
//! x86 has no cross-lane byte gather worth using at this table size; the
//! 16-entry GF tables are instead kept in-register and indexed with
//! `pshufb`, which looks up 16 (SSE) or 2x16 (AVX2) nibbles per instruction.
//! Exponent sums never exceed 30, so the mod-15 reduction is one signed
//! compare against 14 and a masked subtract. Single-codeword kernels run in
//! one 128-bit vector; block kernels process 32 codeword lanes per
//! iteration.

use std::arch::x86_64::*;

use super::Backend;
use crate::gf::{GF_EXP, GF_LOG};
use crate::matrix::Matrix;
use crate::model::ParityMatrix;

pub(crate) static BACKEND: Backend = Backend {
    name: "avx2",
    encode,
    encode_dual,
    matvec,
    encode_block,
    encode_dual_block,
    decode_block,
};

// Callers reach these wrappers through the dispatch table, which only selects
// this backend after `is_x86_feature_detected!("avx2")`.

pub(super) fn encode(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe { encode_impl(parity_exp, data) }
}

pub(super) fn encode_dual(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe { encode_dual_impl(parity_exp, data) }
}

pub(super) fn matvec(inverse: &Matrix, rx: &[u8; 8]) -> [u8; 8] {
    unsafe { matvec_impl(inverse, rx) }
}

fn encode_block(parity_exp: &ParityMatrix, data: &[u8], parity: &mut [u8], lanes: usize, stride: usize) {
    unsafe { encode_block_impl(parity_exp, data, parity, lanes, stride) }
}

fn encode_dual_block(
    parity_exp: &ParityMatrix,
    data: &[u8],
    parity: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    unsafe { encode_dual_block_impl(parity_exp, data, parity, lanes, stride) }
}

fn decode_block(inverse: &Matrix, data: &[u8], out: &mut [u8], lanes: usize, stride: usize) {
    unsafe { decode_block_impl(inverse, data, out, lanes, stride) }
}

/// 128-bit GF multiply of byte lanes by per-lane coefficients in exponent
/// space. `zero_mask` flags lanes that must come out zero.
#[inline]
#[target_feature(enable = "avx2", enable = "ssse3")]
unsafe fn mul_exp_sse(
    sym_exp: __m128i,
    coeff_exp: __m128i,
    zero_mask: __m128i,
    log_table: __m128i,
) -> __m128i {
    unsafe {
        let sum = _mm_add_epi8(sym_exp, coeff_exp);
        let wrap = _mm_and_si128(_mm_cmpgt_epi8(sum, _mm_set1_epi8(14)), _mm_set1_epi8(15));
        let prod = _mm_shuffle_epi8(log_table, _mm_sub_epi8(sum, wrap));
        _mm_andnot_si128(zero_mask, prod)
    }
}

#[inline]
#[target_feature(enable = "avx2", enable = "ssse3")]
unsafe fn xor_low8(v: __m128i) -> u8 {
    unsafe {
        let mut lanes = [0u8; 16];
        _mm_storeu_si128(lanes.as_mut_ptr() as *mut __m128i, v);
        lanes[..8].iter().fold(0, |acc, &b| acc ^ b)
    }
}

#[target_feature(enable = "avx2", enable = "ssse3")]
unsafe fn encode_impl(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe {
        let exp_table = _mm_loadu_si128(GF_EXP.as_ptr() as *const __m128i);
        let log_table = _mm_loadu_si128(GF_LOG.as_ptr() as *const __m128i);

        let d = _mm_and_si128(
            _mm_loadl_epi64(data.as_ptr() as *const __m128i),
            _mm_set1_epi8(0x0F),
        );
        let zero_mask = _mm_cmpeq_epi8(d, _mm_setzero_si128());
        let d_exp = _mm_shuffle_epi8(exp_table, d);

        let mut parity = [0u8; 2];
        for (p, row) in parity.iter_mut().zip(parity_exp.iter()) {
            let coeff = _mm_loadl_epi64(row.as_ptr() as *const __m128i);
            *p = xor_low8(mul_exp_sse(d_exp, coeff, zero_mask, log_table));
        }
        parity
    }
}

#[target_feature(enable = "avx2", enable = "ssse3")]
unsafe fn encode_dual_impl(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe {
        let exp_table = _mm_loadu_si128(GF_EXP.as_ptr() as *const __m128i);
        let log_table = _mm_loadu_si128(GF_LOG.as_ptr() as *const __m128i);
        let nibble = _mm_set1_epi8(0x0F);
        let zero = _mm_setzero_si128();

        let bytes = _mm_loadl_epi64(data.as_ptr() as *const __m128i);
        let lower = _mm_and_si128(bytes, nibble);
        let upper = _mm_and_si128(_mm_srli_epi16::<4>(bytes), nibble);

        let lower_zero = _mm_cmpeq_epi8(lower, zero);
        let upper_zero = _mm_cmpeq_epi8(upper, zero);
        let lower_exp = _mm_shuffle_epi8(exp_table, lower);
        let upper_exp = _mm_shuffle_epi8(exp_table, upper);

        let mut parity = [0u8; 2];
        for (p, row) in parity.iter_mut().zip(parity_exp.iter()) {
            let coeff = _mm_loadl_epi64(row.as_ptr() as *const __m128i);
            let lo = xor_low8(mul_exp_sse(lower_exp, coeff, lower_zero, log_table));
            let hi = xor_low8(mul_exp_sse(upper_exp, coeff, upper_zero, log_table));
            *p = (hi << 4) | (lo & 0x0F);
        }
        parity
    }
}

#[target_feature(enable = "avx2", enable = "ssse3")]
unsafe fn matvec_impl(inverse: &Matrix, rx: &[u8; 8]) -> [u8; 8] {
    unsafe {
        let exp_table = _mm_loadu_si128(GF_EXP.as_ptr() as *const __m128i);
        let log_table = _mm_loadu_si128(GF_LOG.as_ptr() as *const __m128i);
        let zero = _mm_setzero_si128();

        let r = _mm_and_si128(
            _mm_loadl_epi64(rx.as_ptr() as *const __m128i),
            _mm_set1_epi8(0x0F),
        );
        let rx_zero = _mm_cmpeq_epi8(r, zero);
        let rx_exp = _mm_shuffle_epi8(exp_table, r);

        let mut out = [0u8; 8];
        for (o, row) in out.iter_mut().zip(inverse.iter()) {
            let coeff = _mm_loadl_epi64(row.as_ptr() as *const __m128i);
            let zero_mask = _mm_or_si128(_mm_cmpeq_epi8(coeff, zero), rx_zero);
            let coeff_exp = _mm_shuffle_epi8(exp_table, coeff);
            *o = xor_low8(mul_exp_sse(rx_exp, coeff_exp, zero_mask, log_table));
        }
        out
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load_lanes(src: &[u8], chunk: usize) -> __m256i {
    unsafe {
        if chunk == 32 {
            _mm256_loadu_si256(src.as_ptr() as *const __m256i)
        } else {
            let mut tmp = [0u8; 32];
            tmp[..chunk].copy_from_slice(&src[..chunk]);
            _mm256_loadu_si256(tmp.as_ptr() as *const __m256i)
        }
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn store_lanes(dst: &mut [u8], v: __m256i, chunk: usize) {
    unsafe {
        if chunk == 32 {
            _mm256_storeu_si256(dst.as_mut_ptr() as *mut __m256i, v);
        } else {
            let mut tmp = [0u8; 32];
            _mm256_storeu_si256(tmp.as_mut_ptr() as *mut __m256i, v);
            dst[..chunk].copy_from_slice(&tmp[..chunk]);
        }
    }
}

/// 32-lane GF multiply by a broadcast coefficient in exponent space.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn mul_exp_block(
    symbols: __m256i,
    coeff_exp: __m256i,
    exp_table: __m256i,
    log_table: __m256i,
) -> __m256i {
    unsafe {
        let zero_mask = _mm256_cmpeq_epi8(symbols, _mm256_setzero_si256());
        let sym_exp = _mm256_shuffle_epi8(exp_table, symbols);
        let sum = _mm256_add_epi8(sym_exp, coeff_exp);
        let wrap = _mm256_and_si256(
            _mm256_cmpgt_epi8(sum, _mm256_set1_epi8(14)),
            _mm256_set1_epi8(15),
        );
        let prod = _mm256_shuffle_epi8(log_table, _mm256_sub_epi8(sum, wrap));
        _mm256_andnot_si256(zero_mask, prod)
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn broadcast_table(table: &[u8; 16]) -> __m256i {
    unsafe { _mm256_broadcastsi128_si256(_mm_loadu_si128(table.as_ptr() as *const __m128i)) }
}

#[target_feature(enable = "avx2")]
unsafe fn encode_block_impl(
    parity_exp: &ParityMatrix,
    data: &[u8],
    parity: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    unsafe {
        let exp_table = broadcast_table(&GF_EXP);
        let log_table = broadcast_table(&GF_LOG);
        let nibble = _mm256_set1_epi8(0x0F);

        for (i, row) in parity_exp.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 32.min(lanes - v);
                let mut acc = _mm256_setzero_si256();
                for (j, &coeff_exp) in row.iter().enumerate() {
                    let d = _mm256_and_si256(load_lanes(&data[j * stride + v..], chunk), nibble);
                    let coeff = _mm256_set1_epi8(coeff_exp as i8);
                    acc = _mm256_xor_si256(acc, mul_exp_block(d, coeff, exp_table, log_table));
                }
                store_lanes(&mut parity[i * stride + v..], acc, chunk);
                v += chunk;
            }
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn encode_dual_block_impl(
    parity_exp: &ParityMatrix,
    data: &[u8],
    parity: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    unsafe {
        let exp_table = broadcast_table(&GF_EXP);
        let log_table = broadcast_table(&GF_LOG);
        let nibble = _mm256_set1_epi8(0x0F);

        for (i, row) in parity_exp.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 32.min(lanes - v);
                let mut lower_acc = _mm256_setzero_si256();
                let mut upper_acc = _mm256_setzero_si256();
                for (j, &coeff_exp) in row.iter().enumerate() {
                    let bytes = load_lanes(&data[j * stride + v..], chunk);
                    let coeff = _mm256_set1_epi8(coeff_exp as i8);
                    let lower = _mm256_and_si256(bytes, nibble);
                    let upper = _mm256_and_si256(_mm256_srli_epi16::<4>(bytes), nibble);
                    lower_acc = _mm256_xor_si256(
                        lower_acc,
                        mul_exp_block(lower, coeff, exp_table, log_table),
                    );
                    upper_acc = _mm256_xor_si256(
                        upper_acc,
                        mul_exp_block(upper, coeff, exp_table, log_table),
                    );
                }
                let packed = _mm256_or_si256(
                    _mm256_slli_epi16::<4>(_mm256_and_si256(upper_acc, nibble)),
                    _mm256_and_si256(lower_acc, nibble),
                );
                store_lanes(&mut parity[i * stride + v..], packed, chunk);
                v += chunk;
            }
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn decode_block_impl(
    inverse: &Matrix,
    data: &[u8],
    out: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    unsafe {
        let exp_table = broadcast_table(&GF_EXP);
        let log_table = broadcast_table(&GF_LOG);
        let nibble = _mm256_set1_epi8(0x0F);

        for (i, row) in inverse.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 32.min(lanes - v);
                let mut acc = _mm256_setzero_si256();
                for (j, &coeff) in row.iter().enumerate() {
                    if coeff == 0 {
                        continue;
                    }
                    let r = _mm256_and_si256(load_lanes(&data[j * stride + v..], chunk), nibble);
                    let coeff_exp = _mm256_set1_epi8(GF_EXP[coeff as usize] as i8);
                    acc = _mm256_xor_si256(acc, mul_exp_block(r, coeff_exp, exp_table, log_table));
                }
                store_lanes(&mut out[i * stride + v..], acc, chunk);
                v += chunk;
            }
        }
    }
}
