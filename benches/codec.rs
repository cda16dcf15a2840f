use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use packet_fec::{layout, CodeModel, PatternTable, Workspace};

const NUM_CODEWORDS: usize = 1024;
const BLOCK_SIZE: usize = 256;

fn single_codeword(c: &mut Criterion) {
    let model = CodeModel::new();
    let table = PatternTable::new(&model);
    let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let parity = model.encode(&data);
    let mut received = [0u8; 10];
    received[..8].copy_from_slice(&data);
    received[8..].copy_from_slice(&parity);
    received[2] = 0;
    received[5] = 0;

    c.bench_function("encode_nibble", |b| {
        b.iter(|| model.encode(black_box(&data)))
    });
    c.bench_function("encode_dual_nibble", |b| {
        b.iter(|| model.encode_bytes(black_box(&data)))
    });
    c.bench_function("decode_nibble_two_erasures", |b| {
        b.iter(|| table.decode(black_box(&received), black_box(&[2, 5])).unwrap())
    });
}

fn batched(c: &mut Criterion) {
    let model = CodeModel::new();
    let table = PatternTable::new(&model);

    let flat: Vec<u8> = (0..NUM_CODEWORDS * 8).map(|i| (i % 16) as u8).collect();
    let mut data_blocked = vec![0u8; layout::blocked_len(NUM_CODEWORDS, BLOCK_SIZE, 8)];
    layout::to_blocked(&flat, &mut data_blocked, NUM_CODEWORDS, BLOCK_SIZE, 8).unwrap();
    let mut parity_blocked = vec![0u8; layout::blocked_len(NUM_CODEWORDS, BLOCK_SIZE, 2)];
    model
        .encode_batch_blocked(&data_blocked, &mut parity_blocked, NUM_CODEWORDS, BLOCK_SIZE)
        .unwrap();

    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Bytes((NUM_CODEWORDS * 8) as u64));

    group.bench_function("encode_blocked", |b| {
        let mut parity = parity_blocked.clone();
        b.iter(|| {
            model
                .encode_batch_blocked(
                    black_box(&data_blocked),
                    &mut parity,
                    NUM_CODEWORDS,
                    BLOCK_SIZE,
                )
                .unwrap()
        })
    });

    group.bench_function("decode_blocked_two_erasures", |b| {
        let mut ws = Workspace::with_capacity(NUM_CODEWORDS, BLOCK_SIZE);
        let mut scratch = data_blocked.clone();
        b.iter(|| {
            scratch.copy_from_slice(&data_blocked);
            table
                .decode_batch_blocked(
                    &mut scratch,
                    black_box(&parity_blocked),
                    &[2, 5],
                    NUM_CODEWORDS,
                    BLOCK_SIZE,
                    &mut ws,
                )
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, single_codeword, batched);
criterion_main!(benches);
