//! Benchmarks for the tick path and the read side.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tripunit_events::prelude::*;
use tripunit_events::SummaryRecord;
use tripunit_test_helpers::prelude::*;

fn filled(events: u32) -> Result<TestEngine, EventError> {
    let mut engine = EngineFixture::new()
        .config(EngineConfig::default())
        .build()?;
    for _ in 0..events {
        engine.admit(EventCode::SETPOINTS_DOWNLOAD);
        engine.run_event_manager()?;
    }
    Ok(engine)
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    for code in [EventCode::POWER_UP_RTC_GOOD, EventCode::TRIP_SHORT_DELAY] {
        group.bench_with_input(BenchmarkId::from_parameter(code), &code, |b, code| {
            let Ok(mut engine) = filled(0) else {
                return;
            };
            b.iter(|| {
                engine.admit(black_box(*code));
                engine.run_event_manager()
            });
        });
    }
    group.finish();
}

fn bench_one_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("one_cycle");
    group.bench_function("three_active_tracks", |b| {
        let Ok(mut engine) = filled(0) else {
            return;
        };
        let signals = engine.signals();
        for parameter in [
            DisturbanceParameter::Overvoltage,
            DisturbanceParameter::CurrentUnbalance,
            DisturbanceParameter::Underfrequency,
        ] {
            signals.set_level(parameter, true);
            engine.metering_mut().set_disturbance(parameter, 50.0);
        }
        b.iter(|| engine.run_one_cycle());
    });
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_range");
    let Ok(engine) = filled(750) else {
        return;
    };
    for eid in [260u32, 500, 749] {
        let Some(start) = Eid::new(eid) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(eid), &start, |b, start| {
            b.iter(|| {
                engine.read_range::<SummaryRecord>(
                    LogKind::Summary,
                    RangeStart::Eid(black_box(*start)),
                    20,
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_one_cycle, bench_read);
criterion_main!(benches);
