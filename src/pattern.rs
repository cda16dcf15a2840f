//! The erasure-pattern table: one pre-inverted 8x8 matrix per recognised
//! erasure set.
//!
//! For a given erasure set the decoder substitutes parity symbols into the
//! erased data positions and multiplies by the inverse of the generator with
//! the same substitution applied to its rows. The table computes each inverse
//! once, at startup, for the empty set, every single erasure and every pair
//! of erasures over the 8 data positions: 37 entries in all. A linear scan
//! over 37 entries is the lookup.

use crate::error::{Error, Result};
use crate::matrix;
use crate::model::{
    normalize_erasures, CodeModel, CODEWORD_SYMBOLS, DATA_SYMBOLS, PARITY_SYMBOLS,
};
use crate::simd;
use crate::{batch, Workspace};

/// One recognised erasure pattern and its pre-computed inverse.
pub struct PatternEntry {
    /// Erased data positions, sorted; only the first `count` are meaningful.
    positions: [usize; PARITY_SYMBOLS],
    /// Number of erased positions in this pattern.
    count: usize,
    /// Inverse of the generator with the erased rows substituted by parity
    /// rows.
    inverse: matrix::Matrix,
    /// False if the inversion failed at build time. The RS(10,8) generator
    /// guarantees invertibility for every pattern up to 2 erasures, so this
    /// flag is defensive.
    valid: bool,
}

impl PatternEntry {
    /// The sorted erased positions of this pattern.
    pub fn positions(&self) -> &[usize] {
        &self.positions[..self.count]
    }

    /// The pre-computed 8x8 inverse matrix.
    pub fn inverse(&self) -> &matrix::Matrix {
        &self.inverse
    }

    fn matches(&self, positions: &[usize; PARITY_SYMBOLS], count: usize) -> bool {
        // Both sides are sorted, so set equality is slice equality.
        self.valid && self.count == count && self.positions[..count] == positions[..count]
    }
}

/// The pattern table, built once from a [`CodeModel`] and thereafter shared
/// read-only by any number of decoding threads.
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    /// Pre-compute the inverse matrix for every recognised erasure pattern:
    /// the empty pattern, all 8 singletons and all 28 pairs.
    pub fn new(model: &CodeModel) -> Self {
        let mut entries = Vec::with_capacity(1 + DATA_SYMBOLS + DATA_SYMBOLS * (DATA_SYMBOLS - 1) / 2);

        // Entry 0: nothing erased, the inverse is the identity.
        entries.push(PatternEntry {
            positions: [0; PARITY_SYMBOLS],
            count: 0,
            inverse: matrix::identity(),
            valid: true,
        });

        for e1 in 0..DATA_SYMBOLS {
            entries.push(Self::build_entry(model, &[e1]));
        }
        for e1 in 0..DATA_SYMBOLS - 1 {
            for e2 in e1 + 1..DATA_SYMBOLS {
                entries.push(Self::build_entry(model, &[e1, e2]));
            }
        }

        Self { entries }
    }

    fn build_entry(model: &CodeModel, positions: &[usize]) -> PatternEntry {
        let mut g_star = matrix::identity();
        for (k, &pos) in positions.iter().enumerate() {
            g_star[pos] = model.parity_matrix()[k];
        }

        let mut entry = PatternEntry {
            positions: [0; PARITY_SYMBOLS],
            count: positions.len(),
            inverse: matrix::identity(),
            valid: false,
        };
        entry.positions[..positions.len()].copy_from_slice(positions);

        // Singular is recovered here: the entry just stays invalid.
        if let Ok(inverse) = matrix::invert(&g_star) {
            entry.inverse = inverse;
            entry.valid = true;
        }
        entry
    }

    /// Total number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose inversion succeeded at build time.
    pub fn valid_patterns(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }

    /// Find the entry for an erasure set. Order and duplicates in `erasures`
    /// do not matter; parity positions degrade the set.
    ///
    /// # Errors
    /// * [`Error::TooManyErasures`] - more than 2 data positions erased.
    /// * [`Error::OutOfRange`] - a position is not a codeword position.
    /// * [`Error::PatternMissing`] - no valid entry matches.
    pub fn lookup(&self, erasures: &[usize]) -> Result<&PatternEntry> {
        let (positions, count) = normalize_erasures(erasures)?;
        self.entries
            .iter()
            .find(|e| e.matches(&positions, count))
            .ok_or(Error::PatternMissing)
    }

    /// Recover the 8 data symbols from a received codeword with the given
    /// erasure set.
    ///
    /// `received` is the 10 nibble symbols `d0..d7, p0, p1`; erased positions
    /// may hold any value, they are never read. The input is not modified.
    ///
    /// # Errors
    /// * [`Error::TooManyErasures`] - more than 2 data positions erased.
    /// * [`Error::OutOfRange`] - an erasure position is not a codeword
    ///   position.
    /// * [`Error::PatternMissing`] - no valid table entry matches.
    pub fn decode(
        &self,
        received: &[u8; CODEWORD_SYMBOLS],
        erasures: &[usize],
    ) -> Result<[u8; DATA_SYMBOLS]> {
        let entry = self.lookup(erasures)?;
        Ok(Self::decode_with_entry(entry, received))
    }

    fn decode_with_entry(
        entry: &PatternEntry,
        received: &[u8; CODEWORD_SYMBOLS],
    ) -> [u8; DATA_SYMBOLS] {
        // Substitute the k-th parity symbol at the k-th erased position.
        let mut rx = [0u8; DATA_SYMBOLS];
        for (i, r) in rx.iter_mut().enumerate() {
            *r = received[i] & 0x0F;
        }
        for (k, &pos) in entry.positions().iter().enumerate() {
            rx[pos] = received[DATA_SYMBOLS + k] & 0x0F;
        }

        if entry.count == 0 {
            return rx;
        }
        (simd::active().matvec)(&entry.inverse, &rx)
    }

    /// Dual-nibble variant of [`decode`](Self::decode): `received` holds 10
    /// full bytes, upper and lower nibbles forming two independent codewords
    /// that share the erasure set. Returns the 8 recovered data bytes.
    pub fn decode_bytes(
        &self,
        received: &[u8; CODEWORD_SYMBOLS],
        erasures: &[usize],
    ) -> Result<[u8; DATA_SYMBOLS]> {
        let entry = self.lookup(erasures)?;

        let mut lower = [0u8; CODEWORD_SYMBOLS];
        let mut upper = [0u8; CODEWORD_SYMBOLS];
        for (i, &byte) in received.iter().enumerate() {
            lower[i] = byte & 0x0F;
            upper[i] = byte >> 4;
        }

        let lower = Self::decode_with_entry(entry, &lower);
        let upper = Self::decode_with_entry(entry, &upper);

        let mut out = [0u8; DATA_SYMBOLS];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (upper[i] << 4) | lower[i];
        }
        Ok(out)
    }

    /// Decode a batch of codewords in block-transposed layout, all sharing
    /// one erasure set. Recovers in place: the erased lanes of
    /// `data_blocked` are overwritten with the recovered symbols.
    ///
    /// The pattern lookup happens once for the whole batch. `workspace`
    /// provides the scratch plane; it is grown on first use and reused across
    /// calls.
    ///
    /// # Errors
    /// * [`Error::TooManyErasures`] / [`Error::OutOfRange`] /
    ///   [`Error::PatternMissing`] - as for [`decode`](Self::decode).
    /// * [`Error::BadLength`] - zero counts or buffer sizes that do not match
    ///   the blocked layout.
    pub fn decode_batch_blocked(
        &self,
        data_blocked: &mut [u8],
        parity_blocked: &[u8],
        erasures: &[usize],
        num_codewords: usize,
        block_size: usize,
        workspace: &mut Workspace,
    ) -> Result<()> {
        batch::decode_batch_blocked(
            self,
            data_blocked,
            parity_blocked,
            erasures,
            num_codewords,
            block_size,
            workspace,
        )
    }

    /// Dual-nibble variant of [`decode_batch_blocked`]: the blocked buffers
    /// hold full bytes carrying two independent symbol streams.
    ///
    /// [`decode_batch_blocked`]: Self::decode_batch_blocked
    pub fn decode_bytes_batch_blocked(
        &self,
        data_blocked: &mut [u8],
        parity_blocked: &[u8],
        erasures: &[usize],
        num_codewords: usize,
        block_size: usize,
        workspace: &mut Workspace,
    ) -> Result<()> {
        batch::decode_bytes_batch_blocked(
            self,
            data_blocked,
            parity_blocked,
            erasures,
            num_codewords,
            block_size,
            workspace,
        )
    }
}

/// Check `inverse * g_star == I` for an entry, used by the build-time tests.
#[cfg(test)]
fn entry_inverts_its_generator(model: &CodeModel, entry: &PatternEntry) -> bool {
    let mut g_star = matrix::identity();
    for (k, &pos) in entry.positions().iter().enumerate() {
        g_star[pos] = model.parity_matrix()[k];
    }
    matrix::multiply(&entry.inverse, &g_star) == matrix::identity()
}

#[cfg(test)]
mod test {
    use super::*;

    fn table() -> (CodeModel, PatternTable) {
        let model = CodeModel::new();
        let table = PatternTable::new(&model);
        (model, table)
    }

    #[test]
    fn table_holds_all_37_patterns() {
        let (model, table) = table();
        assert_eq!(table.len(), 37);
        assert_eq!(table.valid_patterns(), 37);
        for entry in &table.entries {
            assert!(entry_inverts_its_generator(&model, entry));
        }
    }

    #[test]
    fn lookup_is_set_wise() {
        let (_, table) = table();
        let a = table.lookup(&[2, 6]).unwrap();
        let b = table.lookup(&[6, 2]).unwrap();
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.inverse(), b.inverse());
        assert_eq!(table.lookup(&[]).unwrap().positions(), &[] as &[usize]);
    }

    #[test]
    fn lookup_rejects_bad_sets() {
        let (_, table) = table();
        assert!(matches!(
            table.lookup(&[1, 2, 3]),
            Err(Error::TooManyErasures(3, 2))
        ));
        assert!(matches!(table.lookup(&[11]), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn decode_round_trips_every_pattern() {
        let (model, table) = table();
        let data = [3, 0, 7, 15, 1, 9, 12, 5];
        let parity = model.encode(&data);
        let mut codeword = [0u8; CODEWORD_SYMBOLS];
        codeword[..8].copy_from_slice(&data);
        codeword[8..].copy_from_slice(&parity);

        for e1 in 0..DATA_SYMBOLS {
            for e2 in e1..DATA_SYMBOLS {
                let erasures: Vec<usize> = if e1 == e2 { vec![e1] } else { vec![e1, e2] };
                let mut lossy = codeword;
                for &e in &erasures {
                    lossy[e] = 0;
                }
                assert_eq!(
                    table.decode(&lossy, &erasures).unwrap(),
                    data,
                    "erasures {erasures:?}"
                );
            }
        }
    }

    #[test]
    fn decode_ignores_erased_lane_contents() {
        let (model, table) = table();
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let parity = model.encode(&data);
        let mut received = [0u8; CODEWORD_SYMBOLS];
        received[..8].copy_from_slice(&data);
        received[8..].copy_from_slice(&parity);

        let baseline = table.decode(&received, &[1, 5]).unwrap();
        for garbage in [0u8, 7, 15] {
            let mut corrupted = received;
            corrupted[1] = garbage;
            corrupted[5] = garbage;
            assert_eq!(table.decode(&corrupted, &[1, 5]).unwrap(), baseline);
        }
    }

    #[test]
    fn decode_agrees_with_uncached_decoder() {
        let (model, table) = table();
        let data = [14, 3, 3, 0, 8, 11, 2, 6];
        let parity = model.encode(&data);
        let mut received = [0u8; CODEWORD_SYMBOLS];
        received[..8].copy_from_slice(&data);
        received[8..].copy_from_slice(&parity);

        for erasures in [&[][..], &[4][..], &[0, 7][..]] {
            assert_eq!(
                table.decode(&received, erasures).unwrap(),
                model.decode_uncached(&received, erasures).unwrap()
            );
        }
    }
}
