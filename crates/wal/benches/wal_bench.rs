use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use record::Record;
use tempfile::tempdir;
use wal::{Wal, WalReader};

const N: usize = 5_000;
const VAL_SIZE: usize = 100;

fn wal_append_sync(c: &mut Criterion) {
    c.bench_function("wal_append_sync_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let w = Wal::new(dir.path(), true);
                (dir, w)
            },
            |(_dir, mut w)| {
                for i in 0..1_000 {
                    w.append(&Record::put(
                        format!("k{i}").into_bytes(),
                        vec![b'x'; VAL_SIZE],
                    ))
                    .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn wal_append_nosync(c: &mut Criterion) {
    c.bench_function("wal_append_nosync_5k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let w = Wal::new(dir.path(), false);
                (dir, w)
            },
            |(_dir, mut w)| {
                for i in 0..N {
                    w.append(&Record::put(
                        format!("k{i}").into_bytes(),
                        vec![b'x'; VAL_SIZE],
                    ))
                    .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn wal_append_tombstones(c: &mut Criterion) {
    c.bench_function("wal_append_tombstones_nosync_5k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let w = Wal::new(dir.path(), false);
                (dir, w)
            },
            |(_dir, mut w)| {
                for i in 0..N {
                    w.append(&Record::tombstone(format!("k{i}").into_bytes()))
                        .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn wal_replay(c: &mut Criterion) {
    c.bench_function("wal_replay_5k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut w = Wal::new(dir.path(), false);
                for i in 0..N {
                    w.append(&Record::put(
                        format!("k{i}").into_bytes(),
                        vec![b'x'; VAL_SIZE],
                    ))
                    .unwrap();
                }
                let path = w.path().unwrap().to_path_buf();
                (dir, path)
            },
            |(_dir, path)| {
                let mut reader = WalReader::open(&path).unwrap();
                let mut count = 0usize;
                while reader.read_record().unwrap().is_some() {
                    count += 1;
                }
                assert_eq!(count, N);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    wal_append_sync,
    wal_append_nosync,
    wal_append_tombstones,
    wal_replay,
);
criterion_main!(benches);
