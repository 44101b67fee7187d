//! Unit tests for admission, dispatch, clears and the read side.

use super::*;

fn admit_all(engine: &mut Engine, codes: &[EventCode]) -> Vec<Option<Eid>> {
    codes.iter().map(|code| engine.admit(*code)).collect()
}

fn summary_eids(page: &RecordPage<SummaryRecord>) -> Vec<u32> {
    page.records.iter().map(|record| record.eid).collect()
}

#[test]
fn test_open_on_blank_store_defaults_every_register() -> TestResult {
    let config = tiny_config();
    let engine = open_with(config, store_for(&config)?)?;

    let faults = engine.faults();
    assert!(faults.contains(RegisterSlot::MasterEid));
    assert!(faults.contains(RegisterSlot::EnergyCursor));
    assert_eq!(faults.defaulted_logs().count(), 8);
    assert_eq!(engine.counters().snapshot().integrity_faults, 10);
    assert_eq!(engine.sequencer().next_eid(), Eid::FIRST);
    assert_eq!(engine.energy_cursor().next_half_page, 2);
    Ok(())
}

#[test]
fn test_open_rejects_small_store() {
    let config = tiny_config();
    let result = open_with(config, MemoryStore::new(64));
    assert!(matches!(
        result,
        Err(EventError::StoreTooSmall { available: 64, .. })
    ));
}

#[test]
fn test_admit_assigns_sequential_eids() -> TestResult {
    let mut engine = engine()?;
    let eids = admit_all(
        &mut engine,
        &[
            EventCode::POWER_UP_RTC_GOOD,
            EventCode::SETPOINTS_DOWNLOAD,
            EventCode::UV_PICKUP,
        ],
    );
    assert_eq!(eids, vec![Eid::new(1), Eid::new(2), Eid::new(3)]);
    assert_eq!(engine.sequencer().pending_len(), 3);

    assert_eq!(engine.run_event_manager()?, DispatchState::Idle);
    let info = engine.log_info(LogKind::Summary)?;
    assert_eq!(info.count, 3);
    assert_eq!(info.earliest_eid, Eid::new(1));
    assert_eq!(info.latest_eid, Eid::new(3));
    assert_eq!(engine.counters().snapshot().dispatched, 3);
    Ok(())
}

#[test]
fn test_inadmissible_codes_rejected() -> TestResult {
    let mut engine = engine()?;
    assert_eq!(engine.admit(EventCode::NO_EVENT), None);
    assert_eq!(engine.admit(EventCode::new(250)), None);
    assert_eq!(engine.sequencer().pending_len(), 0);
    assert_eq!(engine.sequencer().next_eid(), Eid::FIRST);
    Ok(())
}

#[test]
fn test_full_queue_drops_and_counts() -> TestResult {
    let mut engine = engine()?;
    for _ in 0..PENDING_CAPACITY {
        assert!(engine.admit(EventCode::POWER_UP_RTC_GOOD).is_some());
    }
    assert!(engine.sequencer().is_full());
    assert_eq!(engine.admit(EventCode::TRIP_LONG_DELAY), None);
    assert_eq!(engine.counters().snapshot().dropped, 1);
    assert_eq!(engine.sequencer().next_eid().get(), 17);

    engine.run_event_manager()?;
    assert_eq!(engine.sequencer().pending_len(), 0);
    let trip = engine.admit(EventCode::TRIP_LONG_DELAY).ok_or("not admitted")?;
    assert_eq!(trip.get(), 17);
    engine.run_event_manager()?;

    let summary = engine.log_info(LogKind::Summary)?;
    assert_eq!(summary.latest_eid, Some(trip));
    let headers = engine.read_snapshot_headers(LogKind::Summary, 0, 8)?;
    let eids: Vec<u32> = headers.iter().map(|header| header.eid).collect();
    assert_eq!(eids, (10..=17).rev().collect::<Vec<u32>>());
    assert_eq!(engine.log_info(LogKind::Trip)?.count, 1);

    let counters = engine.counters().snapshot();
    assert_eq!(counters.dropped, 1);
    assert_eq!(counters.dispatched, 17);
    Ok(())
}

#[test]
fn test_unknown_code_is_counted_not_logged() -> TestResult {
    let mut engine = engine()?;
    engine.admit(EventCode::new(240));
    engine.run_event_manager()?;

    let counters = engine.counters().snapshot();
    assert_eq!(counters.unknown_codes, 1);
    assert_eq!(counters.dispatched, 1);
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 0);
    Ok(())
}

#[test]
fn test_staged_events_drained_before_dispatch() -> TestResult {
    let mut engine = engine()?;
    let producer = engine.interrupt_producer();
    assert!(producer.stage(EventCode::GF_PICKUP, Timestamp::new(499, 10)));
    assert!(producer.stage(EventCode::UV_PICKUP, Timestamp::new(499, 20)));
    assert_eq!(producer.staged(), 2);

    engine.run_event_manager()?;
    let headers = engine.read_snapshot_headers(LogKind::Summary, 0, 2)?;
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0].code, EventCode::UV_PICKUP);
    assert_eq!(headers[0].timestamp, Timestamp::new(499, 20));
    assert_eq!(headers[1].eid, 1);
    assert_eq!(engine.counters().snapshot().staged, 2);
    Ok(())
}

#[test]
fn test_trip_writes_snapshot() -> TestResult {
    let mut engine = engine()?;
    let eid = engine.admit(EventCode::TRIP_LONG_DELAY).ok_or("not admitted")?;
    engine.run_event_manager()?;

    let snapshot = engine
        .read_snapshot(LogKind::Trip, eid)?
        .ok_or("snapshot missing")?;
    assert_eq!(snapshot.header.code, EventCode::TRIP_LONG_DELAY);
    assert_eq!(snapshot.metering.values().next(), Some(98.0));
    assert_eq!(engine.capture_session(CaptureKind::Trip).eid(), Some(eid));
    assert_eq!(engine.log_info(LogKind::Alarm)?.count, 0);
    Ok(())
}

#[test]
fn test_master_eid_survives_reopen() -> TestResult {
    let mut engine = engine()?;
    admit_all(
        &mut engine,
        &[EventCode::POWER_UP_RTC_GOOD, EventCode::ALARM_MECHANICAL],
    );
    engine.run_event_manager()?;

    let store = engine.into_store();
    let reopened = open_with(tiny_config(), store)?;
    assert!(!reopened.faults().any());
    assert_eq!(reopened.sequencer().next_eid().get(), 3);
    assert_eq!(reopened.log_info(LogKind::Alarm)?.count, 1);
    Ok(())
}

#[test]
fn test_clear_all_restarts_at_one() -> TestResult {
    let mut engine = engine()?;
    admit_all(
        &mut engine,
        &[EventCode::TRIP_SHORT_DELAY, EventCode::ALARM_OVERVOLTAGE],
    );
    engine.run_event_manager()?;
    engine.admit(EventCode::POWER_UP_RTC_BAD);

    engine.clear_all()?;
    assert_eq!(engine.sequencer().next_eid(), Eid::FIRST);
    assert_eq!(engine.sequencer().pending_len(), 0);
    for kind in LogKind::ALL {
        assert_eq!(engine.log_info(kind)?.count, 0, "{kind}");
    }
    assert_eq!(
        engine.bulk_requests().state(BulkOp::EraseEnergySector),
        Handshake::Requested
    );
    assert_eq!(engine.bulk_requests().erase_sector(), Some(1));
    assert_eq!(engine.admit(EventCode::POWER_UP_RTC_GOOD), Some(Eid::FIRST));
    Ok(())
}

#[test]
fn test_clear_log_leaves_others() -> TestResult {
    let mut engine = engine()?;
    engine.admit(EventCode::TRIP_INSTANTANEOUS);
    engine.run_event_manager()?;

    engine.clear_log(LogKind::Trip)?;
    assert_eq!(engine.log_info(LogKind::Trip)?.count, 0);
    assert_eq!(engine.log_info(LogKind::Summary)?.count, 1);
    assert_eq!(engine.sequencer().next_eid().get(), 2);
    Ok(())
}

fn rolled_summary() -> EventResult<Engine> {
    let mut engine = engine()?;
    for _ in 0..11 {
        engine.admit(EventCode::POWER_UP_RTC_GOOD);
    }
    engine.run_event_manager()?;
    Ok(engine)
}

#[test]
fn test_log_info_after_rollover() -> TestResult {
    let engine = rolled_summary()?;
    let info = engine.log_info(LogKind::Summary)?;
    assert_eq!(info.count, 8);
    assert_eq!(info.earliest_eid, Eid::new(4));
    assert_eq!(info.latest_eid, Eid::new(11));
    Ok(())
}

#[test]
fn test_read_range_newest() -> TestResult {
    let engine = rolled_summary()?;
    let page: RecordPage<SummaryRecord> =
        engine.read_range(LogKind::Summary, RangeStart::Newest(0), 3)?;
    assert_eq!(summary_eids(&page), vec![9, 10, 11]);
    assert_eq!(page.previous_eid, 8);
    assert_eq!(page.next_eid, 11);
    Ok(())
}

#[test]
fn test_read_range_across_wrap() -> TestResult {
    let engine = rolled_summary()?;
    let page: RecordPage<SummaryRecord> =
        engine.read_range(LogKind::Summary, RangeStart::Newest(1), 4)?;
    assert_eq!(summary_eids(&page), vec![7, 8, 9, 10]);
    assert_eq!(page.previous_eid, 6);
    assert_eq!(page.next_eid, 11);
    Ok(())
}

#[test]
fn test_read_range_clamps_at_oldest() -> TestResult {
    let engine = rolled_summary()?;
    let start = RangeStart::Eid(Eid::new(5).ok_or("eid")?);
    let page: RecordPage<SummaryRecord> = engine.read_range(LogKind::Summary, start, 5)?;
    assert_eq!(summary_eids(&page), vec![4, 5]);
    assert_eq!(page.previous_eid, 4);
    assert_eq!(page.next_eid, 6);
    Ok(())
}

#[test]
fn test_read_range_missing_eid_is_empty() -> TestResult {
    let engine = rolled_summary()?;
    let start = RangeStart::Eid(Eid::new(2).ok_or("eid")?);
    let page: RecordPage<SummaryRecord> = engine.read_range(LogKind::Summary, start, 3)?;
    assert!(page.records.is_empty());
    assert_eq!(page.previous_eid, 0);
    Ok(())
}

#[test]
fn test_read_range_rejects_bad_requests() -> TestResult {
    let engine = rolled_summary()?;
    let too_many = engine.read_range::<SummaryRecord>(LogKind::Summary, RangeStart::Newest(0), 21);
    assert!(matches!(too_many, Err(EventError::InvalidRequest(_))));

    let wrong_type = engine.read_range::<SnapshotRecord>(LogKind::Summary, RangeStart::Newest(0), 1);
    assert!(matches!(
        wrong_type,
        Err(EventError::UnsupportedLog(LogKind::Summary))
    ));
    Ok(())
}

#[test]
fn test_snapshot_headers_newest_first_with_offset() -> TestResult {
    let engine = rolled_summary()?;
    let headers = engine.read_snapshot_headers(LogKind::Summary, 2, 12)?;
    let eids: Vec<u32> = headers.iter().map(|header| header.eid).collect();
    assert_eq!(eids, vec![9, 8, 7, 6, 5, 4]);

    let rejected = engine.read_snapshot_headers(LogKind::Disturbance, 0, 1);
    assert!(matches!(rejected, Err(EventError::UnsupportedLog(_))));
    Ok(())
}

#[test]
fn test_read_snapshot_only_for_snapshot_logs() -> TestResult {
    let engine = engine()?;
    let result = engine.read_snapshot(LogKind::Summary, Eid::FIRST);
    assert!(matches!(result, Err(EventError::UnsupportedLog(_))));
    assert_eq!(engine.read_snapshot(LogKind::Alarm, Eid::FIRST)?, None);
    Ok(())
}

#[test]
fn test_percent_to_trip_sources() {
    let protection = Protection::default();
    let thermal = crate::engine::percent_to_trip(
        &protection,
        DisturbanceParameter::LongDelayPickup,
        900.0,
    );
    assert!((thermal - 42.0).abs() < f32::EPSILON);

    let temperature =
        crate::engine::percent_to_trip(&protection, DisturbanceParameter::HighTemperature, 90.0);
    assert!((temperature - 75.0).abs() < 1e-4);

    let bucket =
        crate::engine::percent_to_trip(&protection, DisturbanceParameter::Overvoltage, 300.0);
    assert!((bucket - 55.5).abs() < 1e-4);

    let goose = crate::engine::percent_to_trip(&protection, DisturbanceParameter::GooseCapture, 1.0);
    assert!(goose.abs() < f32::EPSILON);
}

#[test]
fn test_storage_error_display() {
    let err = EventError::Storage(tripunit_nvram::NvError::address_out_of_range(70_000, 14, 65_536));
    assert!(!err.to_string().is_empty());
    assert!(EventError::invalid_request("x").is_recoverable());
    assert!(!EventError::invalid_configuration("x").is_recoverable());
}
