//! End-to-end scenarios driving the engine through the shared fixtures.

use std::thread;

use tripunit_events::prelude::*;
use tripunit_events::{
    CoalescerState, MemoryMap, RecordPage, RegisterSlot, STAGING_CAPACITY, SummaryRecord,
    WaveformHeader,
};
use tripunit_test_helpers::prelude::*;
use tripunit_test_helpers::{assert_approx_eq, assert_monotonic};

/// Dispatch until the engine stops waiting on the bulk store.
fn settle(engine: &mut TestEngine, responder: &mut BulkResponder) -> Result<(), EventError> {
    for _ in 0..16 {
        if !engine.run_event_manager()?.is_waiting() {
            return Ok(());
        }
        responder.service(engine.bulk_requests_mut());
    }
    Ok(())
}

#[test]
fn test_interrupt_events_keep_publish_order() -> TestResult {
    init_tracing();
    let mut engine = EngineFixture::new().build()?;
    let producer = engine.interrupt_producer();

    let worker = thread::spawn(move || {
        (0..STAGING_CAPACITY as u32)
            .filter(|i| producer.stage(EventCode::UV_PICKUP, Timestamp::new(900, i * 1_000)))
            .count()
    });
    let staged = worker.join().map_err(|_| "producer thread panicked")?;
    assert_eq!(staged, STAGING_CAPACITY);

    engine.admit(EventCode::SETPOINTS_DOWNLOAD);
    engine.run_event_manager()?;

    let page: RecordPage<SummaryRecord> =
        engine.read_range(LogKind::Summary, RangeStart::Newest(0), 20)?;
    assert_eq!(page.records.len(), STAGING_CAPACITY + 1);
    let eids: Vec<u32> = page.records.iter().map(|record| record.eid).collect();
    assert_monotonic!(eids);
    let stamps: Vec<Timestamp> = page
        .records
        .iter()
        .take(STAGING_CAPACITY)
        .map(|record| record.timestamp)
        .collect();
    assert_monotonic!(stamps);
    assert_eq!(
        page.records.last().map(|record| record.code),
        Some(EventCode::SETPOINTS_DOWNLOAD)
    );
    assert_eq!(engine.counters().snapshot().staged, STAGING_CAPACITY as u64);
    Ok(())
}

#[test]
fn test_staging_overflow_is_counted() -> TestResult {
    let engine = EngineFixture::new().build()?;
    let producer = engine.interrupt_producer();
    for _ in 0..STAGING_CAPACITY {
        assert!(producer.stage(EventCode::GF_PICKUP, Timestamp::new(1, 0)));
    }
    assert!(!producer.stage(EventCode::GF_PICKUP, Timestamp::new(1, 0)));
    assert_eq!(engine.counters().snapshot().staging_overflow, 1);
    Ok(())
}

#[test]
fn test_trip_scenario_across_logs() -> TestResult {
    let mut engine = EngineFixture::new()
        .protection(FixedProtection {
            thermal_percent: 87.5,
            ..FixedProtection::default()
        })
        .build()?;
    let mut responder = BulkResponder::new();

    let pickup = must_some(engine.admit(EventCode::LDPU_ENTRY), "pickup admitted");
    let trip = must_some(engine.admit(EventCode::TRIP_LONG_DELAY), "trip admitted");
    settle(&mut engine, &mut responder)?;

    engine.request_waveform_capture(CaptureKind::Trip);
    assert!(engine.start_waveform_capture(CaptureKind::Trip));
    engine.record_waveform_samples(CaptureKind::Trip, 960);
    for _ in 0..3 {
        engine.run_waveform_arbiter()?;
        responder.service(engine.bulk_requests_mut());
    }
    engine.run_waveform_arbiter()?;

    assert_eq!(engine.log_info(LogKind::Summary)?.count, 2);
    let snapshot = must_some(engine.read_snapshot(LogKind::Trip, trip)?, "trip snapshot");
    assert_eq!(snapshot.header.eid, trip.get());
    assert_eq!(snapshot.header.code, EventCode::TRIP_LONG_DELAY);
    assert_eq!(engine.read_snapshot(LogKind::Trip, pickup)?, None);

    let eids = engine.read_waveform_eids(LogKind::TripWaveform, Some(trip))?;
    assert_eq!(eids.found_index, Some(0));
    let headers: RecordPage<WaveformHeader> =
        engine.read_range(LogKind::TripWaveform, RangeStart::Eid(trip), 1)?;
    assert_eq!(headers.records.first().map(|h| h.num_samples), Some(960));
    assert!(responder.completed().contains(&BulkOp::WriteTripWaveform));
    assert_eq!(engine.metering_mut().captured(), &[EventCode::TRIP_LONG_DELAY]);
    Ok(())
}

#[test]
fn test_records_carry_clock_time() -> TestResult {
    let boot = Timestamp::new(86_400, 250);
    let mut engine = EngineFixture::new()
        .clock(ManualClock::new(boot))
        .build()?;
    engine.admit(EventCode::POWER_UP_RTC_GOOD);
    engine.run_event_manager()?;

    let synced = Timestamp::new(1_700_000_000, 0);
    engine.clock_mut().set(synced);
    engine.admit(EventCode::SETPOINTS_DOWNLOAD);
    engine.run_event_manager()?;

    let headers = engine.read_snapshot_headers(LogKind::Summary, 0, 2)?;
    let stamps: Vec<Timestamp> = headers.iter().map(|header| header.timestamp).collect();
    assert_eq!(stamps, vec![synced, boot]);
    Ok(())
}

#[test]
fn test_disturbance_log_rolls_over() -> TestResult {
    let mut engine = EngineFixture::new().build()?;
    let signals = engine.signals();
    let capacity = u32::from(small_config().disturbance_capacity);

    for episode in 0..capacity + 2 {
        signals.set_level(DisturbanceParameter::Overfrequency, true);
        engine
            .metering_mut()
            .set_disturbance(DisturbanceParameter::Overfrequency, 61.0 + episode as f32);
        engine.run_one_cycle()?;
        signals.set_level(DisturbanceParameter::Overfrequency, false);
        engine.run_one_cycle()?;
        engine.run_event_manager()?;
        engine.run_one_cycle()?;
    }

    let info = engine.log_info(LogKind::Disturbance)?;
    assert_eq!(info.count, capacity);
    let page = engine.read_disturbances(RangeStart::Newest(0), 5)?;
    assert_eq!(page.records.len(), 5);
    let newest = must_some(page.records.last(), "newest disturbance");
    assert_approx_eq!(newest.extremum, 61.0 + (capacity + 1) as f32, 1e-4);
    assert_eq!(
        engine.counters().snapshot().disturbance_episodes,
        u64::from(capacity + 2)
    );
    Ok(())
}

#[test]
fn test_extended_capture_fills_rms_windows() -> TestResult {
    let mut engine = EngineFixture::new().build()?;
    let config = small_config();
    engine
        .signals()
        .request_extended_capture(ExtendedCause::Overvoltage);
    engine.run_one_cycle()?;
    engine.start_waveform_capture(CaptureKind::Extended);
    engine.run_event_manager()?;

    for _ in 0..config.one_cycle_samples + 3 {
        engine.clock_mut().advance_ms(16);
        engine.run_one_cycle()?;
    }
    for _ in 0..config.two_hundred_ms_samples {
        engine.clock_mut().advance_ms(200);
        engine.run_two_hundred_ms()?;
    }
    engine.run_one_cycle()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::Idle);

    assert_eq!(
        engine.metering_mut().samples_taken(RmsWindow::TwoHundredMs),
        u32::from(config.two_hundred_ms_samples)
    );
    let info = engine.extended_capture_info()?;
    assert!(info.eid.is_some());
    assert_eq!(info.one_cycle_samples, config.one_cycle_samples);
    assert_eq!(info.two_hundred_ms_samples, config.two_hundred_ms_samples);

    let samples = engine.read_rms_samples(RmsWindow::OneCycle, 0, 100)?;
    assert_eq!(samples.len(), usize::from(config.one_cycle_samples));
    let firsts: Vec<f32> = samples.iter().map(|sample| sample.values[0]).collect();
    assert_monotonic!(firsts);
    Ok(())
}

#[test]
fn test_energy_log_wraps_and_erases_ahead() -> TestResult {
    let mut engine = EngineFixture::new().build()?;
    let mut responder = BulkResponder::new();

    for _ in 0..28 {
        must_some(engine.admit(EventCode::DEMAND_EVENT), "demand admitted");
        settle(&mut engine, &mut responder)?;
    }

    assert_eq!(responder.erased(), &[3, 4, 5, 6, 7, 2, 3]);
    assert_eq!(responder.energy_writes().len(), 14);
    assert_eq!(engine.energy_log_info().count, small_config().energy_entry_cap());
    assert_eq!(engine.energy_cursor().next_half_page, 12);
    assert_eq!(engine.metering_mut().energy_entries(), 28);
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 0);
    Ok(())
}

#[test]
fn test_held_energy_write_blocks_dispatch() -> TestResult {
    let mut engine = EngineFixture::new().build()?;
    let mut responder = BulkResponder::new();
    responder.hold(BulkOp::WriteEnergyHalfPage);

    engine.admit(EventCode::DEMAND_EVENT);
    engine.admit(EventCode::DEMAND_EVENT);
    engine.admit(EventCode::TRIP_TEST);
    settle(&mut engine, &mut responder)?;
    assert!(engine.run_event_manager()?.is_waiting());
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 0);

    responder.release(BulkOp::WriteEnergyHalfPage);
    settle(&mut engine, &mut responder)?;
    assert_eq!(engine.run_event_manager()?, DispatchState::Idle);
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 1);
    assert_eq!(engine.energy_log_info().count, 2);
    Ok(())
}

#[test]
fn test_reopen_preserves_logs_and_eid() -> TestResult {
    let mut engine = EngineFixture::new().build()?;
    for code in [EventCode::POWER_UP_RTC_GOOD, EventCode::TRIP_INSTANTANEOUS] {
        engine.admit(code);
    }
    engine.run_event_manager()?;
    let store = engine.into_store();

    let mut reopened = EngineFixture::new().store(store).build()?;
    assert!(!reopened.faults().any());
    assert_eq!(reopened.log_info(LogKind::Trip)?.count, 1);
    assert_eq!(reopened.admit(EventCode::POWER_UP_RTC_BAD), Eid::new(3));
    Ok(())
}

#[test]
fn test_mirror_copy_recovers_corrupt_primary() -> TestResult {
    let config = small_config();
    let mut engine = EngineFixture::new().build()?;
    engine.admit(EventCode::SETPOINTS_DOWNLOAD);
    engine.run_event_manager()?;

    let map = MemoryMap::plan(&config)?;
    let master = map.register(RegisterSlot::MasterEid, 0u32)?;
    let mut store = engine.into_store();
    store.corrupt(master.primary(), 4)?;

    let mut reopened = EngineFixture::new().store(store).build()?;
    assert!(!reopened.faults().contains(RegisterSlot::MasterEid));
    assert_eq!(reopened.admit(EventCode::SETPOINTS_DOWNLOAD), Eid::new(2));
    Ok(())
}

#[test]
fn test_corrupt_cursor_defaults_log_and_raises_fault() -> TestResult {
    let config = small_config();
    let mut engine = EngineFixture::new().build()?;
    engine.admit(EventCode::ALARM_MECHANICAL);
    engine.run_event_manager()?;
    assert_eq!(engine.log_info(LogKind::Alarm)?.count, 1);

    let map = MemoryMap::plan(&config)?;
    let cursor = map.register(RegisterSlot::Cursor(LogKind::Alarm), 0u32)?;
    let mut store = engine.into_store();
    store.corrupt(cursor.primary(), 4)?;
    store.corrupt(cursor.mirror(), 4)?;

    let reopened = EngineFixture::new().store(store).build()?;
    let faults = reopened.faults();
    assert!(faults.contains(RegisterSlot::Cursor(LogKind::Alarm)));
    assert_eq!(faults.defaulted_logs().collect::<Vec<_>>(), vec![LogKind::Alarm]);
    assert_eq!(reopened.log_info(LogKind::Alarm)?.count, 0);
    assert_eq!(reopened.log_info(LogKind::Summary)?.count, 1);
    assert_eq!(reopened.counters().snapshot().integrity_faults, 1);
    Ok(())
}

#[test]
fn test_unknown_code_reaches_no_log() -> TestResult {
    let mut engine = EngineFixture::new().build()?;
    let eid = must_some(engine.admit(EventCode::new(240)), "unknown code admitted");
    engine.run_event_manager()?;

    assert_eq!(eid, Eid::FIRST);
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 0);
    assert_eq!(engine.counters().snapshot().unknown_codes, 1);
    assert_eq!(engine.sequencer().next_eid(), must_some(Eid::new(2), "eid 2"));
    Ok(())
}
