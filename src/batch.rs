//! Batched codec over block-transposed buffers.
//!
//! One erasure set is shared by every codeword in a batch, so the pattern
//! lookup happens once and the per-block work is pure lane arithmetic: the
//! encoder runs the parity matrix over 8 symbol rows, the decoder substitutes
//! the parity rows into the erased data rows and runs the pre-inverted 8x8
//! matrix. The decoder cannot work in place row by row (every output row
//! reads all input rows), so it writes into a caller-supplied [`Workspace`]
//! plane and copies the recovered lanes back.

use crate::error::{Error, Result};
use crate::layout;
use crate::model::{CodeModel, DATA_SYMBOLS, PARITY_SYMBOLS};
use crate::pattern::{PatternEntry, PatternTable};
use crate::simd;

/// Reusable scratch for the batched decoders, so the fast path allocates
/// nothing once the workspace has warmed up. Create one per thread and pass
/// it to every call.
#[derive(Default)]
pub struct Workspace {
    decoded: Vec<u8>,
    lower_data: Vec<u8>,
    upper_data: Vec<u8>,
    lower_parity: Vec<u8>,
    upper_parity: Vec<u8>,
}

impl Workspace {
    /// An empty workspace; buffers grow on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// A workspace pre-sized for nibble-mode batch decodes of
    /// `num_codewords` codewords at `block_size`. The dual-nibble planes
    /// still grow on first dual-nibble use.
    pub fn with_capacity(num_codewords: usize, block_size: usize) -> Self {
        let mut ws = Self::default();
        if num_codewords > 0 && block_size > 0 {
            ensure(
                &mut ws.decoded,
                layout::blocked_len(num_codewords, block_size, DATA_SYMBOLS),
            );
        }
        ws
    }
}

fn ensure(buf: &mut Vec<u8>, len: usize) {
    if buf.len() < len {
        buf.resize(len, 0);
    }
}

struct BlockedShape {
    num_blocks: usize,
    block_size: usize,
    num_codewords: usize,
}

impl BlockedShape {
    fn check(
        data_len: usize,
        parity_len: usize,
        num_codewords: usize,
        block_size: usize,
    ) -> Result<Self> {
        if num_codewords == 0 || block_size == 0 {
            return Err(Error::bad_length(format!(
                "num_codewords ({num_codewords}) and block_size ({block_size}) must be non-zero"
            )));
        }
        let want_data = layout::blocked_len(num_codewords, block_size, DATA_SYMBOLS);
        let want_parity = layout::blocked_len(num_codewords, block_size, PARITY_SYMBOLS);
        if data_len != want_data {
            return Err(Error::bad_length(format!(
                "blocked data buffer is {data_len} bytes, expected {want_data}"
            )));
        }
        if parity_len != want_parity {
            return Err(Error::bad_length(format!(
                "blocked parity buffer is {parity_len} bytes, expected {want_parity}"
            )));
        }
        Ok(Self {
            num_blocks: layout::num_blocks(num_codewords, block_size),
            block_size,
            num_codewords,
        })
    }

    fn lanes(&self, block: usize) -> usize {
        self.block_size
            .min(self.num_codewords - block * self.block_size)
    }

    fn data_row(&self, block: usize) -> usize {
        block * self.block_size * DATA_SYMBOLS
    }

    fn parity_row(&self, block: usize) -> usize {
        block * self.block_size * PARITY_SYMBOLS
    }
}

pub(crate) fn encode_batch_blocked(
    model: &CodeModel,
    data_blocked: &[u8],
    parity_blocked: &mut [u8],
    num_codewords: usize,
    block_size: usize,
) -> Result<()> {
    let shape = BlockedShape::check(
        data_blocked.len(),
        parity_blocked.len(),
        num_codewords,
        block_size,
    )?;
    let kernel = simd::active().encode_block;
    run_encode(model, data_blocked, parity_blocked, &shape, kernel);
    Ok(())
}

pub(crate) fn encode_bytes_batch_blocked(
    model: &CodeModel,
    data_blocked: &[u8],
    parity_blocked: &mut [u8],
    num_codewords: usize,
    block_size: usize,
) -> Result<()> {
    let shape = BlockedShape::check(
        data_blocked.len(),
        parity_blocked.len(),
        num_codewords,
        block_size,
    )?;
    let kernel = simd::active().encode_dual_block;
    run_encode(model, data_blocked, parity_blocked, &shape, kernel);
    Ok(())
}

fn run_encode(
    model: &CodeModel,
    data_blocked: &[u8],
    parity_blocked: &mut [u8],
    shape: &BlockedShape,
    kernel: fn(&crate::model::ParityMatrix, &[u8], &mut [u8], usize, usize),
) {
    let stride = shape.block_size;
    for block in 0..shape.num_blocks {
        let data = &data_blocked[shape.data_row(block)..][..DATA_SYMBOLS * stride];
        let parity = &mut parity_blocked[shape.parity_row(block)..][..PARITY_SYMBOLS * stride];
        kernel(model.parity_matrix_exp(), data, parity, shape.lanes(block), stride);
    }
}

pub(crate) fn decode_batch_blocked(
    table: &PatternTable,
    data_blocked: &mut [u8],
    parity_blocked: &[u8],
    erasures: &[usize],
    num_codewords: usize,
    block_size: usize,
    workspace: &mut Workspace,
) -> Result<()> {
    let shape = BlockedShape::check(
        data_blocked.len(),
        parity_blocked.len(),
        num_codewords,
        block_size,
    )?;
    let entry = table.lookup(erasures)?;
    ensure(&mut workspace.decoded, data_blocked.len());
    decode_blocked_with_entry(
        entry,
        data_blocked,
        parity_blocked,
        &shape,
        &mut workspace.decoded,
    );
    Ok(())
}

fn decode_blocked_with_entry(
    entry: &PatternEntry,
    data_blocked: &mut [u8],
    parity_blocked: &[u8],
    shape: &BlockedShape,
    decoded: &mut [u8],
) {
    if entry.positions().is_empty() {
        // Nothing erased; the data rows already hold the data symbols.
        return;
    }

    let kernel = simd::active().decode_block;
    let stride = shape.block_size;
    for block in 0..shape.num_blocks {
        let lanes = shape.lanes(block);
        let data_base = shape.data_row(block);
        let parity_base = shape.parity_row(block);

        // Substitute the k-th parity row into the k-th erased data row.
        for (k, &pos) in entry.positions().iter().enumerate() {
            let src = &parity_blocked[parity_base + k * stride..][..lanes];
            data_blocked[data_base + pos * stride..][..lanes].copy_from_slice(src);
        }

        let data = &data_blocked[data_base..][..DATA_SYMBOLS * stride];
        let out = &mut decoded[data_base..][..DATA_SYMBOLS * stride];
        kernel(entry.inverse(), data, out, lanes, stride);

        for s in 0..DATA_SYMBOLS {
            let row = data_base + s * stride;
            data_blocked[row..][..lanes].copy_from_slice(&decoded[row..][..lanes]);
        }
    }
}

pub(crate) fn decode_bytes_batch_blocked(
    table: &PatternTable,
    data_blocked: &mut [u8],
    parity_blocked: &[u8],
    erasures: &[usize],
    num_codewords: usize,
    block_size: usize,
    workspace: &mut Workspace,
) -> Result<()> {
    let shape = BlockedShape::check(
        data_blocked.len(),
        parity_blocked.len(),
        num_codewords,
        block_size,
    )?;
    let entry = table.lookup(erasures)?;
    if entry.positions().is_empty() {
        return Ok(());
    }

    let Workspace {
        decoded,
        lower_data,
        upper_data,
        lower_parity,
        upper_parity,
    } = workspace;
    ensure(decoded, data_blocked.len());
    ensure(lower_data, data_blocked.len());
    ensure(upper_data, data_blocked.len());
    ensure(lower_parity, parity_blocked.len());
    ensure(upper_parity, parity_blocked.len());

    // Split the byte planes into two independent nibble codeword streams.
    for (i, &byte) in data_blocked.iter().enumerate() {
        lower_data[i] = byte & 0x0F;
        upper_data[i] = byte >> 4;
    }
    for (i, &byte) in parity_blocked.iter().enumerate() {
        lower_parity[i] = byte & 0x0F;
        upper_parity[i] = byte >> 4;
    }

    decode_blocked_with_entry(
        entry,
        &mut lower_data[..data_blocked.len()],
        &lower_parity[..parity_blocked.len()],
        &shape,
        decoded,
    );
    decode_blocked_with_entry(
        entry,
        &mut upper_data[..data_blocked.len()],
        &upper_parity[..parity_blocked.len()],
        &shape,
        decoded,
    );

    for (i, byte) in data_blocked.iter_mut().enumerate() {
        *byte = (upper_data[i] << 4) | lower_data[i];
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::{blocked_len, to_blocked};

    fn blocked_fixture(
        model: &CodeModel,
        codewords: &[[u8; DATA_SYMBOLS]],
        block_size: usize,
    ) -> (Vec<u8>, Vec<u8>) {
        let num = codewords.len();
        let flat: Vec<u8> = codewords.iter().flatten().copied().collect();
        let mut data_blocked = vec![0u8; blocked_len(num, block_size, DATA_SYMBOLS)];
        to_blocked(&flat, &mut data_blocked, num, block_size, DATA_SYMBOLS).unwrap();
        let mut parity_blocked = vec![0u8; blocked_len(num, block_size, PARITY_SYMBOLS)];
        model
            .encode_batch_blocked(&data_blocked, &mut parity_blocked, num, block_size)
            .unwrap();
        (data_blocked, parity_blocked)
    }

    #[test]
    fn batch_encode_matches_single_encode() {
        let model = CodeModel::new();
        let codewords: Vec<[u8; 8]> = (0..37)
            .map(|v| std::array::from_fn(|s| ((v * 3 + s * 5) % 16) as u8))
            .collect();
        let block_size = 16;
        let (_, parity_blocked) = blocked_fixture(&model, &codewords, block_size);

        for (v, data) in codewords.iter().enumerate() {
            let want = model.encode(data);
            let block = v / block_size;
            let lane = v % block_size;
            let base = block * block_size * PARITY_SYMBOLS;
            assert_eq!(parity_blocked[base + lane], want[0], "codeword {v}");
            assert_eq!(parity_blocked[base + block_size + lane], want[1], "codeword {v}");
        }
    }

    #[test]
    fn batch_decode_recovers_in_place() {
        let model = CodeModel::new();
        let table = PatternTable::new(&model);
        let codewords: Vec<[u8; 8]> = (0..50)
            .map(|v| std::array::from_fn(|s| ((v * 7 + s) % 16) as u8))
            .collect();
        let block_size = 16;
        let (mut data_blocked, parity_blocked) = blocked_fixture(&model, &codewords, block_size);
        let pristine = data_blocked.clone();

        // Zero the erased rows in every block, as the wire would deliver them.
        for block in 0..layout::num_blocks(50, block_size) {
            for &pos in &[2usize, 5] {
                let row = block * block_size * DATA_SYMBOLS + pos * block_size;
                data_blocked[row..row + block_size].fill(0);
            }
        }

        let mut ws = Workspace::new();
        table
            .decode_batch_blocked(&mut data_blocked, &parity_blocked, &[2, 5], 50, block_size, &mut ws)
            .unwrap();
        assert_eq!(data_blocked, pristine);
    }

    #[test]
    fn batch_decode_with_no_erasures_is_identity() {
        let model = CodeModel::new();
        let table = PatternTable::new(&model);
        let codewords: Vec<[u8; 8]> = (0..20)
            .map(|v| std::array::from_fn(|s| ((v + s) % 16) as u8))
            .collect();
        let (mut data_blocked, parity_blocked) = blocked_fixture(&model, &codewords, 16);
        let pristine = data_blocked.clone();

        let mut ws = Workspace::new();
        table
            .decode_batch_blocked(&mut data_blocked, &parity_blocked, &[], 20, 16, &mut ws)
            .unwrap();
        assert_eq!(data_blocked, pristine);
    }

    #[test]
    fn bad_shapes_are_rejected_before_any_write() {
        let model = CodeModel::new();
        let table = PatternTable::new(&model);
        let mut data = vec![1u8; 128];
        let parity = vec![2u8; 32];
        let snapshot = data.clone();
        let mut ws = Workspace::new();

        // Wrong parity length.
        let err = table.decode_batch_blocked(&mut data, &parity[..30], &[1], 16, 16, &mut ws);
        assert!(matches!(err, Err(Error::BadLength(_))));
        assert_eq!(data, snapshot);

        // Unknown pattern error leaves the buffer alone too.
        let err = table.decode_batch_blocked(&mut data, &parity, &[0, 1, 2], 16, 16, &mut ws);
        assert!(matches!(err, Err(Error::TooManyErasures(3, 2))));
        assert_eq!(data, snapshot);

        let err = model.encode_batch_blocked(&data, &mut vec![0u8; 31], 16, 16);
        assert!(matches!(err, Err(Error::BadLength(_))));
    }

    #[test]
    fn dual_nibble_batch_round_trips() {
        let model = CodeModel::new();
        let table = PatternTable::new(&model);
        let num = 40;
        let block_size = 16;

        let flat: Vec<u8> = (0..num * DATA_SYMBOLS).map(|i| (i * 29 % 256) as u8).collect();
        let mut data_blocked = vec![0u8; blocked_len(num, block_size, DATA_SYMBOLS)];
        to_blocked(&flat, &mut data_blocked, num, block_size, DATA_SYMBOLS).unwrap();

        let mut parity_blocked = vec![0u8; blocked_len(num, block_size, PARITY_SYMBOLS)];
        model
            .encode_bytes_batch_blocked(&data_blocked, &mut parity_blocked, num, block_size)
            .unwrap();
        let pristine = data_blocked.clone();

        for block in 0..layout::num_blocks(num, block_size) {
            let lanes = block_size.min(num - block * block_size);
            for &pos in &[0usize, 6] {
                let row = block * block_size * DATA_SYMBOLS + pos * block_size;
                data_blocked[row..row + lanes].fill(0xFF);
            }
        }

        let mut ws = Workspace::new();
        table
            .decode_bytes_batch_blocked(
                &mut data_blocked,
                &parity_blocked,
                &[0, 6],
                num,
                block_size,
                &mut ws,
            )
            .unwrap();
        assert_eq!(data_blocked, pristine);
    }
}
