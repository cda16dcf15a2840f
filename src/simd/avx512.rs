//! AVX-512 kernels.
//!
//! Same structure as the AVX2 backend with the vectors widened to 64 lanes
//! and the compare/blend steps moved into mask registers. The GF tables stay
//! in-register, broadcast to every 128-bit lane and indexed with the byte
//! shuffle; a gather over a 16-byte table would cost more and read past the
//! table's end. Single-codeword work does not fill even one 128-bit vector,
//! so those kernels are shared with the AVX2 backend (this backend is only
//! selected on CPUs that also have AVX2).

use std::arch::x86_64::*;

use super::{avx2, Backend};
use crate::gf::{GF_EXP, GF_LOG};
use crate::matrix::Matrix;
use crate::model::ParityMatrix;

pub(crate) static BACKEND: Backend = Backend {
    name: "avx512",
    encode: avx2::encode,
    encode_dual: avx2::encode_dual,
    matvec: avx2::matvec,
    encode_block,
    encode_dual_block,
    decode_block,
};

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

#[inline]
#[target_feature(enable = "avx512f,avx512bw")]
unsafe fn broadcast_table(table: &[u8; 16]) -> __m512i {
    unsafe { _mm512_broadcast_i32x4(_mm_loadu_si128(table.as_ptr() as *const __m128i)) }
}

#[inline]
#[target_feature(enable = "avx512f,avx512bw")]
unsafe fn load_lanes(src: &[u8], chunk: usize) -> __m512i {
    unsafe {
        if chunk == 64 {
            _mm512_loadu_epi8(src.as_ptr() as *const i8)
        } else {
            let mut tmp = [0u8; 64];
            tmp[..chunk].copy_from_slice(&src[..chunk]);
            _mm512_loadu_epi8(tmp.as_ptr() as *const i8)
        }
    }
}

#[inline]
#[target_feature(enable = "avx512f,avx512bw")]
unsafe fn store_lanes(dst: &mut [u8], v: __m512i, chunk: usize) {
    unsafe {
        if chunk == 64 {
            _mm512_storeu_epi8(dst.as_mut_ptr() as *mut i8, v);
        } else {
            let mut tmp = [0u8; 64];
            _mm512_storeu_epi8(tmp.as_mut_ptr() as *mut i8, v);
            dst[..chunk].copy_from_slice(&tmp[..chunk]);
        }
    }
}

/// 64-lane GF multiply by a broadcast coefficient in exponent space.
#[inline]
#[target_feature(enable = "avx512f,avx512bw")]
unsafe fn mul_exp_block(
    symbols: __m512i,
    coeff_exp: __m512i,
    exp_table: __m512i,
    log_table: __m512i,
) -> __m512i {
    unsafe {
        let nonzero = _mm512_cmpneq_epi8_mask(symbols, _mm512_setzero_si512());
        let sym_exp = _mm512_shuffle_epi8(exp_table, symbols);
        let sum = _mm512_add_epi8(sym_exp, coeff_exp);
        let ge = _mm512_cmpge_epu8_mask(sum, _mm512_set1_epi8(15));
        let sum = _mm512_mask_sub_epi8(sum, ge, sum, _mm512_set1_epi8(15));
        let prod = _mm512_shuffle_epi8(log_table, sum);
        _mm512_maskz_mov_epi8(nonzero, prod)
    }
}

#[target_feature(enable = "avx512f,avx512bw")]
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
        let nibble = _mm512_set1_epi8(0x0F);

        for (i, row) in parity_exp.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 64.min(lanes - v);
                let mut acc = _mm512_setzero_si512();
                for (j, &coeff_exp) in row.iter().enumerate() {
                    let d = _mm512_and_si512(load_lanes(&data[j * stride + v..], chunk), nibble);
                    let coeff = _mm512_set1_epi8(coeff_exp as i8);
                    acc = _mm512_xor_si512(acc, mul_exp_block(d, coeff, exp_table, log_table));
                }
                store_lanes(&mut parity[i * stride + v..], acc, chunk);
                v += chunk;
            }
        }
    }
}

#[target_feature(enable = "avx512f,avx512bw")]
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
        let nibble = _mm512_set1_epi8(0x0F);

        for (i, row) in parity_exp.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 64.min(lanes - v);
                let mut lower_acc = _mm512_setzero_si512();
                let mut upper_acc = _mm512_setzero_si512();
                for (j, &coeff_exp) in row.iter().enumerate() {
                    let bytes = load_lanes(&data[j * stride + v..], chunk);
                    let coeff = _mm512_set1_epi8(coeff_exp as i8);
                    let lower = _mm512_and_si512(bytes, nibble);
                    let upper = _mm512_and_si512(_mm512_srli_epi16::<4>(bytes), nibble);
                    lower_acc = _mm512_xor_si512(
                        lower_acc,
                        mul_exp_block(lower, coeff, exp_table, log_table),
                    );
                    upper_acc = _mm512_xor_si512(
                        upper_acc,
                        mul_exp_block(upper, coeff, exp_table, log_table),
                    );
                }
                let packed = _mm512_or_si512(
                    _mm512_slli_epi16::<4>(_mm512_and_si512(upper_acc, nibble)),
                    _mm512_and_si512(lower_acc, nibble),
                );
                store_lanes(&mut parity[i * stride + v..], packed, chunk);
                v += chunk;
            }
        }
    }
}

#[target_feature(enable = "avx512f,avx512bw")]
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
        let nibble = _mm512_set1_epi8(0x0F);

        for (i, row) in inverse.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 64.min(lanes - v);
                let mut acc = _mm512_setzero_si512();
                for (j, &coeff) in row.iter().enumerate() {
                    if coeff == 0 {
                        continue;
                    }
                    let r = _mm512_and_si512(load_lanes(&data[j * stride + v..], chunk), nibble);
                    let coeff_exp = _mm512_set1_epi8(GF_EXP[coeff as usize] as i8);
                    acc = _mm512_xor_si512(acc, mul_exp_block(r, coeff_exp, exp_table, log_table));
                }
                store_lanes(&mut out[i * stride + v..], acc, chunk);
                v += chunk;
            }
        }
    }
}
