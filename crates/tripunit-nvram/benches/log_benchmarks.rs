//! Benchmarks for log append and EID lookup.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tripunit_nvram::prelude::*;

const RECORD: usize = 214;

fn filled(capacity: u16, appends: u32) -> Result<(MemoryStore, IndexedLog), NvError> {
    let mut store = MemoryStore::new(64 + usize::from(capacity) * RECORD);
    let geometry = LogGeometry::new(64, RECORD as u16, capacity)?;
    let register = PersistentRegister::new(0, 16, LogCursor::EMPTY)?;
    let mut log = IndexedLog::open(geometry, register, &store)?;
    let mut rec = [0u8; RECORD];
    for eid in 1..=appends {
        RecordWriter::new(&mut rec).put_u32(eid)?;
        log.append(&mut store, &rec)?;
    }
    Ok((store, log))
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.bench_function("snapshot_record", |b| {
        let Ok((mut store, mut log)) = filled(200, 0) else {
            return;
        };
        let rec = [0xA5u8; RECORD];
        b.iter(|| log.append(black_box(&mut store), black_box(&rec)));
    });
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_eid");
    for capacity in [21u16, 200, 500] {
        let Ok((store, log)) = filled(capacity, u32::from(capacity) * 3 / 2) else {
            continue;
        };
        let target = u32::from(capacity);
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &target, |b, t| {
            b.iter(|| find_eid(&log, &store, black_box(*t)));
        });
    }
    group.finish();
}

fn bench_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("register");
    group.bench_function("load_with_mirror_fallback", |b| {
        let mut store = MemoryStore::new(32);
        let Ok(reg) = PersistentRegister::new(0, 16, 0u32) else {
            return;
        };
        if reg.store(&mut store, 99).is_err() || store.corrupt(0, 1).is_err() {
            return;
        }
        b.iter(|| reg.load(black_box(&store)));
    });
    group.finish();
}

criterion_group!(benches, bench_append, bench_lookup, bench_register);
criterion_main!(benches);
