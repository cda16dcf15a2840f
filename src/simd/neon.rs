//! ARM NEON kernels.
//!
//! The 16-entry GF tables fit a `vtbl` register pair exactly, so a field
//! multiply is one table lookup into exponent space, a vector add with a
//! compare-and-subtract reduction mod 15, and one lookup back. Lanes whose
//! symbol is zero are cleared through a `vbic` mask; the tables carry a
//! sentinel at the zero preimage. Single-codeword kernels use 8-lane vectors
//! (one lane per symbol), block kernels 16-lane vectors (one lane per
//! codeword).

use std::arch::aarch64::*;

use super::Backend;
use crate::gf::{GF_EXP, GF_LOG};
use crate::matrix::Matrix;
use crate::model::ParityMatrix;

pub(crate) static BACKEND: Backend = Backend {
    name: "neon",
    encode,
    encode_dual,
    matvec,
    encode_block,
    encode_dual_block,
    decode_block,
};

// All aarch64 targets this crate builds for carry NEON; the dispatch table
// still probes before selecting this backend.

fn encode(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe { encode_impl(parity_exp, data) }
}

fn encode_dual(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe { encode_dual_impl(parity_exp, data) }
}

fn matvec(inverse: &Matrix, rx: &[u8; 8]) -> [u8; 8] {
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

#[inline]
#[target_feature(enable = "neon")]
unsafe fn load_table_pair(table: &[u8; 16]) -> uint8x8x2_t {
    unsafe { uint8x8x2_t(vld1_u8(table.as_ptr()), vld1_u8(table.as_ptr().add(8))) }
}

/// GF multiply of 8 lanes by per-lane coefficients already in exponent
/// space. `zero_mask` flags lanes whose symbol was zero.
#[inline]
#[target_feature(enable = "neon")]
unsafe fn mul_exp_lanes(
    sym_exp: uint8x8_t,
    coeff_exp: uint8x8_t,
    zero_mask: uint8x8_t,
    log_table: uint8x8x2_t,
) -> uint8x8_t {
    unsafe {
        let mod15 = vdup_n_u8(15);
        let sum = vadd_u8(sym_exp, coeff_exp);
        let wrap = vand_u8(mod15, vcge_u8(sum, mod15));
        let prod = vtbl2_u8(log_table, vsub_u8(sum, wrap));
        vbic_u8(prod, zero_mask)
    }
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn xor_across(v: uint8x8_t) -> u8 {
    unsafe {
        let mut lanes = [0u8; 8];
        vst1_u8(lanes.as_mut_ptr(), v);
        lanes.iter().fold(0, |acc, &b| acc ^ b)
    }
}

#[target_feature(enable = "neon")]
unsafe fn encode_impl(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe {
        let exp_table = load_table_pair(&GF_EXP);
        let log_table = load_table_pair(&GF_LOG);

        let d = vand_u8(vld1_u8(data.as_ptr()), vdup_n_u8(0x0F));
        let zero_mask = vceq_u8(d, vdup_n_u8(0));
        let d_exp = vtbl2_u8(exp_table, d);

        let mut parity = [0u8; 2];
        for (p, row) in parity.iter_mut().zip(parity_exp.iter()) {
            let coeff = vld1_u8(row.as_ptr());
            *p = xor_across(mul_exp_lanes(d_exp, coeff, zero_mask, log_table));
        }
        parity
    }
}

#[target_feature(enable = "neon")]
unsafe fn encode_dual_impl(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    unsafe {
        let exp_table = load_table_pair(&GF_EXP);
        let log_table = load_table_pair(&GF_LOG);
        let zero = vdup_n_u8(0);

        let bytes = vld1_u8(data.as_ptr());
        let lower = vand_u8(bytes, vdup_n_u8(0x0F));
        let upper = vshr_n_u8::<4>(bytes);

        let lower_zero = vceq_u8(lower, zero);
        let upper_zero = vceq_u8(upper, zero);
        let lower_exp = vtbl2_u8(exp_table, lower);
        let upper_exp = vtbl2_u8(exp_table, upper);

        let mut parity = [0u8; 2];
        for (p, row) in parity.iter_mut().zip(parity_exp.iter()) {
            let coeff = vld1_u8(row.as_ptr());
            let lo = xor_across(mul_exp_lanes(lower_exp, coeff, lower_zero, log_table));
            let hi = xor_across(mul_exp_lanes(upper_exp, coeff, upper_zero, log_table));
            *p = (hi << 4) | (lo & 0x0F);
        }
        parity
    }
}

#[target_feature(enable = "neon")]
unsafe fn matvec_impl(inverse: &Matrix, rx: &[u8; 8]) -> [u8; 8] {
    unsafe {
        let exp_table = load_table_pair(&GF_EXP);
        let log_table = load_table_pair(&GF_LOG);
        let zero = vdup_n_u8(0);

        let r = vand_u8(vld1_u8(rx.as_ptr()), vdup_n_u8(0x0F));
        let rx_zero = vceq_u8(r, zero);
        let rx_exp = vtbl2_u8(exp_table, r);

        let mut out = [0u8; 8];
        for (o, row) in out.iter_mut().zip(inverse.iter()) {
            let coeff = vld1_u8(row.as_ptr());
            let zero_mask = vorr_u8(vceq_u8(coeff, zero), rx_zero);
            let coeff_exp = vtbl2_u8(exp_table, coeff);
            *o = xor_across(mul_exp_lanes(rx_exp, coeff_exp, zero_mask, log_table));
        }
        out
    }
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn load_lanes(src: &[u8], chunk: usize) -> uint8x16_t {
    unsafe {
        if chunk == 16 {
            vld1q_u8(src.as_ptr())
        } else {
            let mut tmp = [0u8; 16];
            tmp[..chunk].copy_from_slice(&src[..chunk]);
            vld1q_u8(tmp.as_ptr())
        }
    }
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn store_lanes(dst: &mut [u8], v: uint8x16_t, chunk: usize) {
    unsafe {
        if chunk == 16 {
            vst1q_u8(dst.as_mut_ptr(), v);
        } else {
            let mut tmp = [0u8; 16];
            vst1q_u8(tmp.as_mut_ptr(), v);
            dst[..chunk].copy_from_slice(&tmp[..chunk]);
        }
    }
}

/// 16-lane GF multiply by a broadcast coefficient in exponent space.
#[inline]
#[target_feature(enable = "neon")]
unsafe fn mul_exp_block(
    symbols: uint8x16_t,
    coeff_exp: uint8x16_t,
    exp_table: uint8x16_t,
    log_table: uint8x16_t,
) -> uint8x16_t {
    unsafe {
        let zero_mask = vceqq_u8(symbols, vdupq_n_u8(0));
        let sym_exp = vqtbl1q_u8(exp_table, symbols);
        let mod15 = vdupq_n_u8(15);
        let sum = vaddq_u8(sym_exp, coeff_exp);
        let wrap = vandq_u8(mod15, vcgeq_u8(sum, mod15));
        let prod = vqtbl1q_u8(log_table, vsubq_u8(sum, wrap));
        vbicq_u8(prod, zero_mask)
    }
}

#[target_feature(enable = "neon")]
unsafe fn encode_block_impl(
    parity_exp: &ParityMatrix,
    data: &[u8],
    parity: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    unsafe {
        let exp_table = vld1q_u8(GF_EXP.as_ptr());
        let log_table = vld1q_u8(GF_LOG.as_ptr());
        let nibble = vdupq_n_u8(0x0F);

        for (i, row) in parity_exp.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 16.min(lanes - v);
                let mut acc = vdupq_n_u8(0);
                for (j, &coeff_exp) in row.iter().enumerate() {
                    let d = load_lanes(&data[j * stride + v..], chunk);
                    let d = vandq_u8(d, nibble);
                    let coeff = vdupq_n_u8(coeff_exp);
                    acc = veorq_u8(acc, mul_exp_block(d, coeff, exp_table, log_table));
                }
                store_lanes(&mut parity[i * stride + v..], acc, chunk);
                v += chunk;
            }
        }
    }
}

#[target_feature(enable = "neon")]
unsafe fn encode_dual_block_impl(
    parity_exp: &ParityMatrix,
    data: &[u8],
    parity: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    unsafe {
        let exp_table = vld1q_u8(GF_EXP.as_ptr());
        let log_table = vld1q_u8(GF_LOG.as_ptr());
        let nibble = vdupq_n_u8(0x0F);

        for (i, row) in parity_exp.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 16.min(lanes - v);
                let mut lower_acc = vdupq_n_u8(0);
                let mut upper_acc = vdupq_n_u8(0);
                for (j, &coeff_exp) in row.iter().enumerate() {
                    let bytes = load_lanes(&data[j * stride + v..], chunk);
                    let coeff = vdupq_n_u8(coeff_exp);
                    let lower = vandq_u8(bytes, nibble);
                    let upper = vshrq_n_u8::<4>(bytes);
                    lower_acc =
                        veorq_u8(lower_acc, mul_exp_block(lower, coeff, exp_table, log_table));
                    upper_acc =
                        veorq_u8(upper_acc, mul_exp_block(upper, coeff, exp_table, log_table));
                }
                let packed = vorrq_u8(
                    vshlq_n_u8::<4>(vandq_u8(upper_acc, nibble)),
                    vandq_u8(lower_acc, nibble),
                );
                store_lanes(&mut parity[i * stride + v..], packed, chunk);
                v += chunk;
            }
        }
    }
}

#[target_feature(enable = "neon")]
unsafe fn decode_block_impl(
    inverse: &Matrix,
    data: &[u8],
    out: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    unsafe {
        let exp_table = vld1q_u8(GF_EXP.as_ptr());
        let log_table = vld1q_u8(GF_LOG.as_ptr());
        let nibble = vdupq_n_u8(0x0F);

        for (i, row) in inverse.iter().enumerate() {
            let mut v = 0;
            while v < lanes {
                let chunk = 16.min(lanes - v);
                let mut acc = vdupq_n_u8(0);
                for (j, &coeff) in row.iter().enumerate() {
                    if coeff == 0 {
                        continue;
                    }
                    let r = load_lanes(&data[j * stride + v..], chunk);
                    let r = vandq_u8(r, nibble);
                    let coeff_exp = vdupq_n_u8(GF_EXP[coeff as usize]);
                    acc = veorq_u8(acc, mul_exp_block(r, coeff_exp, exp_table, log_table));
                }
                store_lanes(&mut out[i * stride + v..], acc, chunk);
                v += chunk;
            }
        }
    }
}
