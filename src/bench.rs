use crate::{
    buffer::BatchBuffer,
    rng::{Engine, EngineKind, Generator},
    LINE_LEN,
};

#[test]
#[ignore]
fn bench() {
    // Benchmark engine + encoder throughput without any output.
    // Run with `cargo test bench --release -- --ignored --nocapture`
    use std::time::Instant;

    const LINES: usize = 2000;
    const ITERS: usize = 2_000;

    let kinds = [
        EngineKind::OsEntropy,
        EngineKind::StreamCipher,
        EngineKind::Permutation,
    ];
    let mut engines = kinds.map(|kind| Engine::seed(kind, LINES).unwrap());
    let mut batch = BatchBuffer::new(vec![0; LINES * LINE_LEN].into_boxed_slice(), LINES);
    let mut durs = [0; 3];

    for iter in 0..ITERS {
        // Rotate the starting engine to avoid biasing the results.
        for offset in 0..engines.len() {
            let index = (iter + offset) % engines.len();
            let start = Instant::now();
            while batch.has_room() {
                batch.append(&engines[index].generate().unwrap());
            }
            durs[index] += start.elapsed().as_nanos();
            batch.reset();
        }
    }

    let gigs = ((ITERS * LINES * LINE_LEN) as f64) / ((1 << 30) as f64);
    let secs = |dur: u128| dur as f64 / 1_000_000_000.0;

    println!("\nThroughputs:");
    for (kind, dur) in kinds.iter().zip(durs) {
        println!("{kind:>14}: {:.3} GB/s", gigs / secs(dur));
    }
}
