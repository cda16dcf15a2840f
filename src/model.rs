//! The RS(10,8) code model: generator matrix, derived parity matrices, and
//! the encoder paths that consume them.
//!
//! The code is systematic: a codeword is the 8 data symbols followed by 2
//! parity symbols, `p[i] = sum over j of P[i][j] * d[j]` in GF(16). The
//! parity matrix is also kept in exponent space so the encoders can turn each
//! field multiply into an add mod 15 plus one table lookup.

use crate::error::{Error, Result};
use crate::gf;
use crate::matrix;
use crate::simd;
use crate::{batch, Workspace};

/// Number of data symbols per codeword.
pub const DATA_SYMBOLS: usize = 8;
/// Number of parity symbols per codeword.
pub const PARITY_SYMBOLS: usize = 2;
/// Total codeword length.
pub const CODEWORD_SYMBOLS: usize = DATA_SYMBOLS + PARITY_SYMBOLS;

/// The systematic generator matrix `G = [I | P]`, one row per data symbol.
/// Columns 0..7 are the identity, columns 8..9 the parity submatrix.
pub const GENERATOR: [[u8; CODEWORD_SYMBOLS]; DATA_SYMBOLS] = [
    [1, 0, 0, 0, 0, 0, 0, 0, 15, 1],
    [0, 1, 0, 0, 0, 0, 0, 0, 11, 11],
    [0, 0, 1, 0, 0, 0, 0, 0, 3, 2],
    [0, 0, 0, 1, 0, 0, 0, 0, 3, 10],
    [0, 0, 0, 0, 1, 0, 0, 0, 5, 11],
    [0, 0, 0, 0, 0, 1, 0, 0, 2, 11],
    [0, 0, 0, 0, 0, 0, 1, 0, 15, 9],
    [0, 0, 0, 0, 0, 0, 0, 1, 7, 9],
];

/// Parity rows of the generator: `ParityMatrix[i][j]` is the coefficient the
/// `i`-th parity symbol applies to data symbol `j`.
pub type ParityMatrix = [[u8; DATA_SYMBOLS]; PARITY_SYMBOLS];

/// The code model built once at startup and borrowed immutably by every
/// encoder and by the pattern-table builder.
pub struct CodeModel {
    parity: ParityMatrix,
    parity_exp: ParityMatrix,
}

impl Default for CodeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeModel {
    /// Derive the parity matrix and its exponent-space form from
    /// [`GENERATOR`].
    pub fn new() -> Self {
        let mut parity = [[0u8; DATA_SYMBOLS]; PARITY_SYMBOLS];
        let mut parity_exp = [[0u8; DATA_SYMBOLS]; PARITY_SYMBOLS];
        for i in 0..PARITY_SYMBOLS {
            for j in 0..DATA_SYMBOLS {
                let coeff = GENERATOR[j][DATA_SYMBOLS + i];
                parity[i][j] = coeff;
                parity_exp[i][j] = gf::GF_EXP[coeff as usize];
            }
        }
        Self { parity, parity_exp }
    }

    /// Number of data symbols per codeword (`n`).
    pub fn data_symbols(&self) -> usize {
        DATA_SYMBOLS
    }

    /// Number of parity symbols per codeword (`p`).
    pub fn parity_symbols(&self) -> usize {
        PARITY_SYMBOLS
    }

    /// Total codeword length (`k`).
    pub fn codeword_symbols(&self) -> usize {
        CODEWORD_SYMBOLS
    }

    /// The parity submatrix of the generator.
    pub fn parity_matrix(&self) -> &ParityMatrix {
        &self.parity
    }

    /// The parity submatrix with every coefficient replaced by its discrete
    /// log, ready for exponent-space multiply-accumulate.
    pub fn parity_matrix_exp(&self) -> &ParityMatrix {
        &self.parity_exp
    }

    /// Encode 8 data symbols (low nibble of each byte) into 2 parity
    /// symbols. Systematic: the caller appends the parity to its data to form
    /// the codeword. Never fails.
    pub fn encode(&self, data: &[u8; DATA_SYMBOLS]) -> [u8; PARITY_SYMBOLS] {
        (simd::active().encode)(&self.parity_exp, data)
    }

    /// Encode 8 full bytes as two independent nibble codewords sharing this
    /// model. Returns 2 parity bytes packed `(upper << 4) | lower`.
    pub fn encode_bytes(&self, data: &[u8; DATA_SYMBOLS]) -> [u8; PARITY_SYMBOLS] {
        (simd::active().encode_dual)(&self.parity_exp, data)
    }

    /// Check that the parity symbols of `codeword` are consistent with its
    /// data symbols.
    pub fn verify(&self, codeword: &[u8; CODEWORD_SYMBOLS]) -> bool {
        let mut data = [0u8; DATA_SYMBOLS];
        data.copy_from_slice(&codeword[..DATA_SYMBOLS]);
        let parity = self.encode(&data);
        parity[0] == codeword[DATA_SYMBOLS] & 0x0F
            && parity[1] == codeword[DATA_SYMBOLS + 1] & 0x0F
    }

    /// Recover the data symbols of `received` by building and inverting the
    /// substituted generator matrix for this erasure set on the fly.
    ///
    /// Same contract as [`PatternTable::decode`](crate::PatternTable::decode);
    /// this path needs no pattern table and exists as the fallback and
    /// validation decoder. The table decoder is the production path.
    ///
    /// # Errors
    /// * [`Error::TooManyErasures`] - more than 2 data positions erased.
    /// * [`Error::OutOfRange`] - an erasure position is not a codeword
    ///   position.
    /// * [`Error::PatternMissing`] - the substituted generator could not be
    ///   inverted (cannot happen for this generator; kept defensively).
    pub fn decode_uncached(
        &self,
        received: &[u8; CODEWORD_SYMBOLS],
        erasures: &[usize],
    ) -> Result<[u8; DATA_SYMBOLS]> {
        let (positions, count) = normalize_erasures(erasures)?;

        let mut rx = [0u8; DATA_SYMBOLS];
        for (i, r) in rx.iter_mut().enumerate() {
            *r = received[i] & 0x0F;
        }
        if count == 0 {
            return Ok(rx);
        }

        // Substituted generator: identity rows, with the k-th erased row
        // replaced by the k-th parity row.
        let mut g_star = matrix::identity();
        for (k, &pos) in positions[..count].iter().enumerate() {
            g_star[pos] = self.parity[k];
            rx[pos] = received[DATA_SYMBOLS + k] & 0x0F;
        }

        let inverse = matrix::invert(&g_star).map_err(|_| Error::PatternMissing)?;

        let mut decoded = [0u8; DATA_SYMBOLS];
        for (i, row) in inverse.iter().enumerate() {
            let mut acc = 0;
            for (j, &coeff) in row.iter().enumerate() {
                acc = gf::add(acc, gf::mul(coeff, rx[j]));
            }
            decoded[i] = acc;
        }
        Ok(decoded)
    }

    /// Encode a batch of codewords held in block-transposed layout.
    ///
    /// `data_blocked` holds `num_codewords` codewords with stripe width 8,
    /// `parity_blocked` receives the parity lanes with stripe width 2; both
    /// are sized in whole blocks of `block_size` codewords.
    ///
    /// # Errors
    /// * [`Error::BadLength`] - zero `num_codewords`/`block_size` or buffer
    ///   sizes that do not match the blocked layout.
    pub fn encode_batch_blocked(
        &self,
        data_blocked: &[u8],
        parity_blocked: &mut [u8],
        num_codewords: usize,
        block_size: usize,
    ) -> Result<()> {
        batch::encode_batch_blocked(self, data_blocked, parity_blocked, num_codewords, block_size)
    }

    /// Dual-nibble variant of [`encode_batch_blocked`]: every byte carries
    /// two independent symbol streams.
    ///
    /// [`encode_batch_blocked`]: Self::encode_batch_blocked
    pub fn encode_bytes_batch_blocked(
        &self,
        data_blocked: &[u8],
        parity_blocked: &mut [u8],
        num_codewords: usize,
        block_size: usize,
    ) -> Result<()> {
        batch::encode_bytes_batch_blocked(
            self,
            data_blocked,
            parity_blocked,
            num_codewords,
            block_size,
        )
    }

    /// Scratch-buffer factory sized for [`PatternTable::decode_batch_blocked`]
    /// over `num_codewords` codewords.
    ///
    /// [`PatternTable::decode_batch_blocked`]: crate::PatternTable::decode_batch_blocked
    pub fn workspace(&self, num_codewords: usize, block_size: usize) -> Workspace {
        Workspace::with_capacity(num_codewords, block_size)
    }
}

/// Normalize an erasure list: sort, drop duplicates, reject positions outside
/// the codeword, and degrade parity-position erasures (8, 9) to a smaller
/// data-erasure set. Returns the sorted data positions and their count.
pub(crate) fn normalize_erasures(erasures: &[usize]) -> Result<([usize; PARITY_SYMBOLS], usize)> {
    if let Some(&bad) = erasures.iter().find(|&&e| e >= CODEWORD_SYMBOLS) {
        return Err(Error::out_of_range(format!(
            "erasure position {bad} is not a codeword position (0..{CODEWORD_SYMBOLS})"
        )));
    }

    let mut positions = [0usize; PARITY_SYMBOLS];
    let mut count = 0;
    for &e in erasures {
        if e >= DATA_SYMBOLS || positions[..count].contains(&e) {
            continue;
        }
        if count == PARITY_SYMBOLS {
            // A third distinct data erasure: count them all for the error.
            let distinct = distinct_data_erasures(erasures);
            return Err(Error::too_many_erasures(distinct, PARITY_SYMBOLS));
        }
        positions[count] = e;
        count += 1;
    }
    positions[..count].sort_unstable();
    Ok((positions, count))
}

fn distinct_data_erasures(erasures: &[usize]) -> usize {
    let mut seen = [false; DATA_SYMBOLS];
    for &e in erasures {
        if e < DATA_SYMBOLS {
            seen[e] = true;
        }
    }
    seen.iter().filter(|&&s| s).count()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parity_matrix_matches_generator_columns() {
        let model = CodeModel::new();
        assert_eq!(model.parity_matrix()[0], [15, 11, 3, 3, 5, 2, 15, 7]);
        assert_eq!(model.parity_matrix()[1], [1, 11, 2, 10, 11, 11, 9, 9]);
        for row in model.parity_matrix_exp() {
            assert!(row.iter().all(|&e| e < 15));
        }
    }

    #[test]
    fn generator_is_systematic() {
        for (i, row) in GENERATOR.iter().enumerate() {
            for (j, &v) in row[..DATA_SYMBOLS].iter().enumerate() {
                assert_eq!(v, u8::from(i == j));
            }
        }
    }

    #[test]
    fn encode_zero_data_yields_zero_parity() {
        let model = CodeModel::new();
        assert_eq!(model.encode(&[0; 8]), [0, 0]);
    }

    #[test]
    fn known_parity_vectors() {
        let model = CodeModel::new();
        assert_eq!(model.encode(&[1, 2, 3, 4, 5, 6, 7, 8]), [11, 12]);
        assert_eq!(model.encode(&[15; 8]), [3, 13]);
    }

    #[test]
    fn verify_accepts_encoded_and_rejects_corrupt() {
        let model = CodeModel::new();
        let data = [9, 0, 4, 15, 1, 1, 2, 7];
        let parity = model.encode(&data);
        let mut codeword = [0u8; CODEWORD_SYMBOLS];
        codeword[..8].copy_from_slice(&data);
        codeword[8..].copy_from_slice(&parity);
        assert!(model.verify(&codeword));

        codeword[3] ^= 0x01;
        assert!(!model.verify(&codeword));
    }

    #[test]
    fn decode_uncached_round_trips() {
        let model = CodeModel::new();
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let parity = model.encode(&data);
        let mut received = [0u8; CODEWORD_SYMBOLS];
        received[..8].copy_from_slice(&data);
        received[8..].copy_from_slice(&parity);

        assert_eq!(model.decode_uncached(&received, &[]).unwrap(), data);

        let mut lossy = received;
        lossy[1] = 0;
        lossy[5] = 0;
        assert_eq!(model.decode_uncached(&lossy, &[1, 5]).unwrap(), data);
    }

    #[test]
    fn normalize_erasures_contract() {
        assert_eq!(normalize_erasures(&[]).unwrap(), ([0, 0], 0));
        assert_eq!(normalize_erasures(&[5]).unwrap(), ([5, 0], 1));
        assert_eq!(normalize_erasures(&[6, 2]).unwrap(), ([2, 6], 2));
        // Duplicates collapse.
        assert_eq!(normalize_erasures(&[4, 4, 4]).unwrap(), ([4, 0], 1));
        // Parity positions degrade the set.
        assert_eq!(normalize_erasures(&[3, 9]).unwrap(), ([3, 0], 1));
        assert_eq!(normalize_erasures(&[8, 9]).unwrap(), ([0, 0], 0));

        assert!(matches!(
            normalize_erasures(&[0, 3, 6]),
            Err(Error::TooManyErasures(3, 2))
        ));
        assert!(matches!(
            normalize_erasures(&[10]),
            Err(Error::OutOfRange(_))
        ));
    }
}
