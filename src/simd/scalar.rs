//! Portable scalar kernels.
//!
//! This is the reference implementation the SIMD backends are held
//! bit-identical to, and the fallback on CPUs without a supported instruction
//! set. Multiplies go through exponent space with an explicit zero
//! short-circuit; the tables are undefined at the zero preimage, so the
//! short-circuit is a correctness requirement, not only a sparse-data
//! optimisation.

use super::Backend;
use crate::gf::{GF_EXP, GF_LOG, GROUP_ORDER};
use crate::matrix::Matrix;
use crate::model::ParityMatrix;

pub(crate) static BACKEND: Backend = Backend {
    name: "scalar",
    encode,
    encode_dual,
    matvec,
    encode_block,
    encode_dual_block,
    decode_block,
};

#[inline]
fn mul_exp(symbol: u8, coeff_exp: u8) -> u8 {
    if symbol == 0 {
        return 0;
    }
    let e = (GF_EXP[symbol as usize] as usize + coeff_exp as usize) % GROUP_ORDER as usize;
    GF_LOG[e]
}

fn encode(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    let mut parity = [0u8; 2];
    for (p, row) in parity.iter_mut().zip(parity_exp.iter()) {
        for (&d, &coeff_exp) in data.iter().zip(row.iter()) {
            *p ^= mul_exp(d & 0x0F, coeff_exp);
        }
    }
    parity
}

fn encode_dual(parity_exp: &ParityMatrix, data: &[u8; 8]) -> [u8; 2] {
    let mut lower = [0u8; 8];
    let mut upper = [0u8; 8];
    for i in 0..8 {
        lower[i] = data[i] & 0x0F;
        upper[i] = data[i] >> 4;
    }
    let lower = encode(parity_exp, &lower);
    let upper = encode(parity_exp, &upper);
    [(upper[0] << 4) | lower[0], (upper[1] << 4) | lower[1]]
}

fn matvec(inverse: &Matrix, rx: &[u8; 8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (o, row) in out.iter_mut().zip(inverse.iter()) {
        for (&coeff, &r) in row.iter().zip(rx.iter()) {
            *o ^= crate::gf::mul(coeff, r & 0x0F);
        }
    }
    out
}

fn encode_block(parity_exp: &ParityMatrix, data: &[u8], parity: &mut [u8], lanes: usize, stride: usize) {
    for (i, row) in parity_exp.iter().enumerate() {
        let out = &mut parity[i * stride..i * stride + lanes];
        out.fill(0);
        for (j, &coeff_exp) in row.iter().enumerate() {
            let src = &data[j * stride..j * stride + lanes];
            for (o, &d) in out.iter_mut().zip(src.iter()) {
                *o ^= mul_exp(d & 0x0F, coeff_exp);
            }
        }
    }
}

fn encode_dual_block(
    parity_exp: &ParityMatrix,
    data: &[u8],
    parity: &mut [u8],
    lanes: usize,
    stride: usize,
) {
    for (i, row) in parity_exp.iter().enumerate() {
        let out = &mut parity[i * stride..i * stride + lanes];
        out.fill(0);
        for (j, &coeff_exp) in row.iter().enumerate() {
            let src = &data[j * stride..j * stride + lanes];
            for (o, &byte) in out.iter_mut().zip(src.iter()) {
                let lower = mul_exp(byte & 0x0F, coeff_exp);
                let upper = mul_exp(byte >> 4, coeff_exp);
                *o ^= (upper << 4) | lower;
            }
        }
    }
}

fn decode_block(inverse: &Matrix, data: &[u8], out: &mut [u8], lanes: usize, stride: usize) {
    for (i, row) in inverse.iter().enumerate() {
        let dst = &mut out[i * stride..i * stride + lanes];
        dst.fill(0);
        for (j, &coeff) in row.iter().enumerate() {
            if coeff == 0 {
                continue;
            }
            let coeff_exp = GF_EXP[coeff as usize];
            let src = &data[j * stride..j * stride + lanes];
            for (o, &r) in dst.iter_mut().zip(src.iter()) {
                *o ^= mul_exp(r & 0x0F, coeff_exp);
            }
        }
    }
}
