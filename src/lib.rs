//! Forward error correction for fixed-size packet groups.
//!
//! This crate implements the Reed-Solomon RS(10,8) erasure code over GF(16)
//! used to protect groups of 8 data packets with 2 parity packets: a receiver
//! holding any 8 of the 10 symbols of a codeword reconstructs the original
//! data. Symbols are 4-bit nibbles, so the field arithmetic lives in 16-entry
//! lookup tables that fit a single SIMD table-lookup register; NEON, AVX2 and
//! AVX-512 kernels are selected by a CPU probe at first use, with a portable
//! scalar path as reference and fallback.
//!
//! The building blocks, bottom up:
//!
//! * [`gf`] - scalar GF(16) arithmetic over the log/antilog tables.
//! * [`matrix`] - Gauss-Jordan inversion of the 8x8 decode matrices.
//! * [`CodeModel`] - the systematic generator and the encoder paths.
//! * [`PatternTable`] - pre-inverted matrices for every erasure pattern up to
//!   2 lost packets, and the table-lookup decoder built on them.
//! * [`layout`] - transforms between codeword-major buffers and the
//!   block-transposed layout the batched codec runs on.
//! * Batched paths on [`CodeModel`] and [`PatternTable`] that process whole
//!   packet windows, one SIMD lane per codeword, with scratch supplied by a
//!   reusable [`Workspace`].
//!
//! # Examples
//! ```rust
//! use packet_fec::{CodeModel, PatternTable};
//!
//! let model = CodeModel::new();
//! let table = PatternTable::new(&model);
//!
//! let data = [1, 2, 3, 4, 5, 6, 7, 8];
//! let parity = model.encode(&data);
//!
//! // Two packets lost in transit; positions are known from the transport.
//! let mut received = [0u8; 10];
//! received[..8].copy_from_slice(&data);
//! received[8..].copy_from_slice(&parity);
//! received[1] = 0;
//! received[5] = 0;
//!
//! let recovered = table.decode(&received, &[1, 5]).expect("recoverable");
//! assert_eq!(recovered, data);
//! ```

mod batch;
mod error;
pub mod gf;
pub mod layout;
pub mod matrix;
mod model;
mod pattern;
mod simd;

pub use batch::Workspace;
pub use error::{Error, Result};
pub use model::{
    CodeModel, ParityMatrix, CODEWORD_SYMBOLS, DATA_SYMBOLS, GENERATOR, PARITY_SYMBOLS,
};
pub use pattern::{PatternEntry, PatternTable};
