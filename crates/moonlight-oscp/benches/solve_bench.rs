//! Solve-loop benchmark over a synthetic corpus.

use criterion::{criterion_group, criterion_main, Criterion};
use moonlight_oscp::{initialise_analytics, Matrix, OscpSolver};
use std::fs;

fn synthetic_corpus(dir: &std::path::Path, files: usize, bytes_per_file: usize) {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    for i in 0..files {
        let data: Vec<u8> = (0..bytes_per_file)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                // Sparse-ish rows: keep roughly a quarter of the bits.
                (state & state >> 8 & 0xff) as u8
            })
            .collect();
        fs::write(dir.join(format!("exemplar_{i:04}")), data).unwrap();
    }
}

fn bench_solve(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    synthetic_corpus(dir.path(), 64, 32);

    let matrix = Matrix::from_corpus(dir.path(), "exemplar_", None, &[]).unwrap();

    c.bench_function("solve_oscp_64x256", |b| {
        b.iter(|| {
            let mut m = matrix.clone();
            let mut analytics = initialise_analytics(&m);
            let solver = OscpSolver::new();
            solver
                .solve_oscp(&mut m, &mut analytics, "bench", false, None)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
