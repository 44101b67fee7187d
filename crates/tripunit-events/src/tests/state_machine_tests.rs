//! State machine tests driving the engine tick by tick.

use super::*;

fn cycles(engine: &mut Engine, n: usize) -> EventResult<()> {
    for _ in 0..n {
        engine.run_one_cycle()?;
    }
    Ok(())
}

fn track_state(engine: &Engine, parameter: DisturbanceParameter) -> Option<TrackState> {
    engine
        .disturbances()
        .track(parameter)
        .map(DisturbanceTrack::state)
}

// Disturbance tracks

#[test]
fn test_disturbance_episode_written() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.set_level(DisturbanceParameter::Overvoltage, true);
    for value in [130.0, 140.0, 120.0] {
        engine
            .metering_mut()
            .set(DisturbanceParameter::Overvoltage, value);
        engine.run_one_cycle()?;
    }
    assert_eq!(
        track_state(&engine, DisturbanceParameter::Overvoltage),
        Some(TrackState::InProgress)
    );

    signals.set_level(DisturbanceParameter::Overvoltage, false);
    engine.run_one_cycle()?;
    assert_eq!(
        track_state(&engine, DisturbanceParameter::Overvoltage),
        Some(TrackState::Wait)
    );
    assert_eq!(engine.sequencer().pending_len(), 1);

    engine.run_event_manager()?;
    let page = engine.read_disturbances(RangeStart::Newest(0), 1)?;
    let record = page.records.first().ok_or("no disturbance record")?;
    assert_eq!(record.value_code, 202);
    assert!((record.extremum - 140.0).abs() < 1e-4);
    assert!((record.average - 130.0).abs() < 1e-4);
    assert!((record.duration_ms - 45_000.0).abs() < 1e-2);
    assert!((record.percent_to_trip - 55.5).abs() < 1e-4);
    assert_eq!(record.entry_timestamp, Timestamp::new(500, 0));
    assert_eq!(engine.counters().snapshot().disturbance_episodes, 1);

    engine.run_one_cycle()?;
    assert_eq!(
        track_state(&engine, DisturbanceParameter::Overvoltage),
        Some(TrackState::Idle)
    );
    Ok(())
}

#[test]
fn test_disturbance_average_weights_minutes() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.set_level(DisturbanceParameter::CurrentUnbalance, true);
    engine
        .metering_mut()
        .set(DisturbanceParameter::CurrentUnbalance, 10.0);
    cycles(&mut engine, 5)?;
    engine
        .metering_mut()
        .set(DisturbanceParameter::CurrentUnbalance, 40.0);
    cycles(&mut engine, 2)?;

    let track = engine
        .disturbances()
        .track(DisturbanceParameter::CurrentUnbalance)
        .ok_or("track")?;
    assert_eq!(track.minutes(), 1);
    assert_eq!(track.sub_count(), 2);

    signals.set_level(DisturbanceParameter::CurrentUnbalance, false);
    engine.run_one_cycle()?;
    engine.run_event_manager()?;

    let page = engine.read_disturbances(RangeStart::Newest(0), 1)?;
    let record = page.records.first().ok_or("no disturbance record")?;
    assert!((record.average - 130.0 / 7.0).abs() < 1e-3);
    assert!((record.duration_ms - 90_000.0).abs() < 1e-2);
    Ok(())
}

#[test]
fn test_undervoltage_tracks_minimum() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.set_level(DisturbanceParameter::Undervoltage, true);
    for value in [90.0, 70.0, 85.0] {
        engine
            .metering_mut()
            .set(DisturbanceParameter::Undervoltage, value);
        engine.run_one_cycle()?;
    }
    let track = engine
        .disturbances()
        .track(DisturbanceParameter::Undervoltage)
        .ok_or("track")?;
    assert!((track.extremum() - 70.0).abs() < f32::EPSILON);
    Ok(())
}

#[test]
fn test_trip_cancels_active_disturbances() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.set_level(DisturbanceParameter::Undervoltage, true);
    cycles(&mut engine, 2)?;

    engine.admit(EventCode::TRIP_SHORT_DELAY);
    engine.run_event_manager()?;

    engine.run_one_cycle()?;
    assert_eq!(signals.levels() & DisturbanceParameter::Undervoltage.bit(), 0);
    assert_eq!(
        track_state(&engine, DisturbanceParameter::Undervoltage),
        Some(TrackState::Idle)
    );
    engine.run_one_cycle()?;
    engine.run_event_manager()?;
    assert_eq!(engine.log_info(LogKind::Disturbance)?.count, 0);
    Ok(())
}

fn overfrequency_episode(engine: &mut Engine, value: f32) -> EventResult<()> {
    let signals = engine.signals();
    signals.set_level(DisturbanceParameter::Overfrequency, true);
    engine
        .metering_mut()
        .set(DisturbanceParameter::Overfrequency, value);
    engine.run_one_cycle()?;
    signals.set_level(DisturbanceParameter::Overfrequency, false);
    engine.run_one_cycle()
}

#[test]
fn test_failed_disturbance_write_frees_track() -> TestResult {
    let mut engine = engine()?;
    overfrequency_episode(&mut engine, 61.0)?;
    engine.store_mut().fail_next_writes(1);
    let result = engine.run_event_manager();
    assert!(matches!(result, Err(EventError::Storage(_))), "{result:?}");
    assert_eq!(
        track_state(&engine, DisturbanceParameter::Overfrequency),
        Some(TrackState::Idle)
    );

    cycles(&mut engine, 50)?;
    overfrequency_episode(&mut engine, 62.5)?;
    engine.run_event_manager()?;
    assert_eq!(engine.sequencer().pending_len(), 0);

    let info = engine.log_info(LogKind::Disturbance)?;
    assert_eq!(info.count, 1);
    let page = engine.read_disturbances(RangeStart::Newest(0), 1)?;
    let record = page.records.first().ok_or("no disturbance record")?;
    assert!((record.extremum - 62.5).abs() < 1e-4);

    engine.run_one_cycle()?;
    assert_eq!(
        track_state(&engine, DisturbanceParameter::Overfrequency),
        Some(TrackState::Idle)
    );
    Ok(())
}

#[test]
fn test_short_delay_episode_links_origin() -> TestResult {
    let mut engine = engine()?;
    let origin = engine.admit(EventCode::SDPU_ENTRY).ok_or("not admitted")?;
    engine.run_event_manager()?;

    let signals = engine.signals();
    signals.set_short_delay(true);
    cycles(&mut engine, 3)?;
    signals.set_short_delay(false);
    engine.run_one_cycle()?;
    engine.run_event_manager()?;

    let record = engine
        .read_disturbance_by_origin(origin)?
        .ok_or("no record for origin")?;
    assert_eq!(record.origin_eid, origin.get());
    assert_eq!(
        record.value_code,
        u16::from(DisturbanceParameter::ShortDelayPickup.exit_code().raw())
    );
    Ok(())
}

// Extended-capture coalescer

#[test]
fn test_extended_capture_completes() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.request_extended_capture(ExtendedCause::Overvoltage);
    engine.run_one_cycle()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::Start);
    assert!(engine.capture_session(CaptureKind::Extended).is_requested());

    assert!(engine.start_waveform_capture(CaptureKind::Extended));
    engine.run_event_manager()?;
    assert_eq!(engine.coalescer().session_eid(), Some(Eid::FIRST));
    assert_eq!(engine.log_info(LogKind::Extended)?.count, 1);

    engine.run_one_cycle()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::InProgress);
    engine.run_two_hundred_ms()?;
    engine.run_two_hundred_ms()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::End);
    engine.run_one_cycle()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::Idle);

    let info = engine.extended_capture_info()?;
    assert_eq!(info.eid, Some(Eid::FIRST));
    assert_eq!(info.one_cycle_samples, 1);
    assert_eq!(info.two_hundred_ms_samples, 2);
    assert_eq!(info.one_cycle_start, Timestamp::new(500, 0));

    let samples = engine.read_rms_samples(RmsWindow::TwoHundredMs, 0, 5)?;
    let firsts: Vec<f32> = samples.iter().map(|sample| sample.values[0]).collect();
    assert_eq!(firsts, vec![2.0, 3.0]);
    Ok(())
}

#[test]
fn test_repeat_cause_is_summary_only() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.request_extended_capture(ExtendedCause::HighLoad1);
    engine.run_one_cycle()?;
    signals.request_extended_capture(ExtendedCause::HighLoad1);
    engine.run_one_cycle()?;
    engine.run_event_manager()?;

    let headers = engine.read_snapshot_headers(LogKind::Summary, 0, 2)?;
    let codes: Vec<u8> = headers.iter().map(|header| header.code.raw()).collect();
    assert_eq!(codes, vec![188, 183]);
    assert_eq!(engine.log_info(LogKind::Extended)?.count, 1);
    Ok(())
}

#[test]
fn test_trigger_after_completed_session_opens_new_one() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.request_extended_capture(ExtendedCause::HighLoad1);
    engine.run_one_cycle()?;
    assert!(engine.start_waveform_capture(CaptureKind::Extended));
    engine.run_event_manager()?;
    let first = engine.coalescer().session_eid().ok_or("first session has no eid")?;

    signals.request_extended_capture(ExtendedCause::HighLoad1);
    engine.run_one_cycle()?;
    engine.run_event_manager()?;
    assert_eq!(engine.coalescer().session_eid(), Some(first));
    engine.run_two_hundred_ms()?;
    engine.run_two_hundred_ms()?;
    engine.run_one_cycle()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::Idle);
    assert_eq!(engine.coalescer().acknowledged(), 0);

    engine.run_waveform_arbiter()?;
    acknowledge_all(&mut engine);
    engine.run_waveform_arbiter()?;
    assert!(!engine.capture_session(CaptureKind::Extended).is_in_progress());

    signals.request_extended_capture(ExtendedCause::HighLoad1);
    engine.run_one_cycle()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::Start);
    assert!(engine.capture_session(CaptureKind::Extended).is_requested());
    assert!(engine.start_waveform_capture(CaptureKind::Extended));
    engine.run_event_manager()?;

    let second = engine.coalescer().session_eid().ok_or("second session has no eid")?;
    assert!(second > first);
    assert_eq!(engine.log_info(LogKind::Extended)?.count, 2);
    let extended = engine.read_snapshot_headers(LogKind::Extended, 0, 2)?;
    let eids: Vec<u32> = extended.iter().map(|header| header.eid).collect();
    assert_eq!(eids, vec![second.get(), first.get()]);

    let summary = engine.read_snapshot_headers(LogKind::Summary, 0, 3)?;
    let codes: Vec<u8> = summary.iter().map(|header| header.code.raw()).collect();
    assert_eq!(codes, vec![183, 188, 183]);
    Ok(())
}

#[test]
fn test_extended_capture_abandoned_to_trip() -> TestResult {
    let mut engine = engine()?;
    engine.signals().request_extended_capture(ExtendedCause::GooseCapture);
    assert!(engine.start_waveform_capture(CaptureKind::Trip));
    engine.run_one_cycle()?;

    assert_eq!(engine.coalescer().state(), CoalescerState::Idle);
    assert_eq!(engine.coalescer().acknowledged(), 0);
    assert!(!engine.capture_session(CaptureKind::Extended).is_requested());
    assert_eq!(engine.counters().snapshot().abandoned_captures, 1);
    Ok(())
}

#[test]
fn test_extended_capture_times_out() -> TestResult {
    let mut engine = engine()?;
    engine.signals().request_extended_capture(ExtendedCause::Undervoltage);
    engine.run_one_cycle()?;
    engine.clock_mut().advance_ms(2_001);
    engine.run_one_cycle()?;

    assert_eq!(engine.coalescer().state(), CoalescerState::Idle);
    assert_eq!(engine.counters().snapshot().extended_timeouts, 1);
    assert_eq!(engine.extended_capture_info()?.eid, None);
    Ok(())
}

#[test]
fn test_dropped_request_opens_no_session() -> TestResult {
    let mut engine = engine()?;
    let signals = engine.signals();
    signals.request_extended_capture(ExtendedCause::Overvoltage);
    engine.run_one_cycle()?;
    engine.clock_mut().advance_ms(2_001);
    engine.run_one_cycle()?;
    engine.run_event_manager()?;
    assert_eq!(engine.coalescer().state(), CoalescerState::Idle);
    let origin = |engine: &Engine| {
        engine
            .disturbances()
            .track(DisturbanceParameter::Overvoltage)
            .and_then(DisturbanceTrack::origin_eid)
    };
    assert_eq!(origin(&engine), Some(Eid::FIRST));

    for _ in 0..PENDING_CAPACITY {
        engine.admit(EventCode::POWER_UP_RTC_GOOD).ok_or("not admitted")?;
    }
    signals.request_extended_capture(ExtendedCause::Overvoltage);
    engine.run_one_cycle()?;

    assert_eq!(engine.counters().snapshot().dropped, 1);
    assert_eq!(engine.coalescer().state(), CoalescerState::Idle);
    assert_eq!(engine.coalescer().acknowledged(), 0);
    assert!(!engine.capture_session(CaptureKind::Extended).is_requested());
    assert_eq!(origin(&engine), Some(Eid::FIRST));
    Ok(())
}

// Waveform arbiter

fn capture(engine: &mut Engine, kind: CaptureKind, samples: u16) {
    engine.request_waveform_capture(kind);
    engine.start_waveform_capture(kind);
    engine.record_waveform_samples(kind, samples);
}

#[test]
fn test_trip_waveform_header_written_on_ack() -> TestResult {
    let mut engine = engine()?;
    let eid = engine.admit(EventCode::TRIP_LONG_DELAY).ok_or("not admitted")?;
    engine.run_event_manager()?;
    capture(&mut engine, CaptureKind::Trip, 480);

    engine.run_waveform_arbiter()?;
    assert_eq!(
        engine.bulk_requests().state(BulkOp::WriteTripWaveform),
        Handshake::Requested
    );
    engine.run_waveform_arbiter()?;
    assert_eq!(engine.log_info(LogKind::TripWaveform)?.count, 0);

    acknowledge_all(&mut engine);
    engine.run_waveform_arbiter()?;
    assert_eq!(
        engine.bulk_requests().state(BulkOp::WriteTripWaveform),
        Handshake::Idle
    );
    assert!(!engine.capture_session(CaptureKind::Trip).is_in_progress());

    let eids = engine.read_waveform_eids(LogKind::TripWaveform, Some(eid))?;
    assert_eq!(eids.eids, vec![eid.get()]);
    assert_eq!(eids.found_index, Some(0));

    let page: RecordPage<WaveformHeader> =
        engine.read_range(LogKind::TripWaveform, RangeStart::Eid(eid), 1)?;
    assert_eq!(page.records.first().map(|h| h.num_samples), Some(480));
    Ok(())
}

#[test]
fn test_unacknowledged_waveform_times_out() -> TestResult {
    let mut engine = engine()?;
    capture(&mut engine, CaptureKind::Alarm, 100);
    engine.run_waveform_arbiter()?;
    engine.clock_mut().advance_ms(701);
    engine.run_waveform_arbiter()?;

    assert_eq!(engine.counters().snapshot().waveform_timeouts, 1);
    assert_eq!(engine.log_info(LogKind::AlarmWaveform)?.count, 0);
    assert!(!engine.capture_session(CaptureKind::Alarm).is_in_progress());
    assert_eq!(
        engine.bulk_requests().state(BulkOp::WriteAlarmWaveform),
        Handshake::Idle
    );
    Ok(())
}

#[test]
fn test_aborted_alarm_capture_still_writes_header() -> TestResult {
    let mut engine = engine()?;
    capture(&mut engine, CaptureKind::Alarm, 64);
    engine.run_waveform_arbiter()?;
    engine.abort_waveform_capture(CaptureKind::Alarm);
    engine.run_waveform_arbiter()?;

    assert_eq!(engine.log_info(LogKind::AlarmWaveform)?.count, 1);
    assert_eq!(engine.counters().snapshot().waveform_timeouts, 0);
    Ok(())
}

#[test]
fn test_waveform_log_hides_slot_being_written() -> TestResult {
    let mut engine = engine()?;
    for samples in [10, 20, 30] {
        capture(&mut engine, CaptureKind::Trip, samples);
        engine.run_waveform_arbiter()?;
        acknowledge_all(&mut engine);
        engine.run_waveform_arbiter()?;
    }
    let info = engine.log_info(LogKind::TripWaveform)?;
    assert_eq!(info.count, 2);

    let page: RecordPage<WaveformHeader> =
        engine.read_range(LogKind::TripWaveform, RangeStart::Newest(0), 5)?;
    let samples: Vec<u16> = page.records.iter().map(|h| h.num_samples).collect();
    assert_eq!(samples, vec![20, 30]);
    Ok(())
}

// Energy log

#[test]
fn test_energy_entries_pair_into_page_writes() -> TestResult {
    let mut engine = engine()?;
    engine.admit(EventCode::DEMAND_EVENT);
    assert_eq!(engine.run_event_manager()?, DispatchState::Idle);
    assert_eq!(engine.energy_cursor().next_half_page, 3);
    assert_eq!(engine.energy_cursor().entries, 1);

    engine.admit(EventCode::DEMAND_EVENT);
    let state = engine.run_event_manager()?;
    assert_eq!(state, DispatchState::EnergyLog(EnergyPhase::WaitWrite));
    let write = *engine.bulk_requests().energy_write().ok_or("no energy write")?;
    assert_eq!(write.half_page, 2);
    assert_eq!(write.data.get(..4), Some(&1u32.to_le_bytes()[..]));
    assert_eq!(write.data.get(128..132), Some(&2u32.to_le_bytes()[..]));

    assert!(engine.run_event_manager()?.is_waiting());
    acknowledge_all(&mut engine);
    let state = engine.run_event_manager()?;
    assert_eq!(state, DispatchState::EnergyLog(EnergyPhase::WaitErase));
    assert_eq!(engine.bulk_requests().erase_sector(), Some(2));

    acknowledge_all(&mut engine);
    assert_eq!(engine.run_event_manager()?, DispatchState::Idle);
    assert_eq!(engine.energy_cursor().next_half_page, 4);
    assert_eq!(engine.energy_log_info().count, 2);
    Ok(())
}

#[test]
fn test_energy_wait_blocks_later_events() -> TestResult {
    let mut engine = engine()?;
    engine.admit(EventCode::DEMAND_EVENT);
    engine.admit(EventCode::DEMAND_EVENT);
    engine.admit(EventCode::POWER_UP_RTC_GOOD);
    assert!(engine.run_event_manager()?.is_waiting());
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 0);

    engine
        .bulk_requests_mut()
        .withdraw(BulkOp::WriteEnergyHalfPage);
    assert_eq!(engine.run_event_manager()?, DispatchState::Idle);
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 1);
    assert_eq!(engine.energy_cursor().entries, 1);
    Ok(())
}
