//! The event manager.
//!
//! Each pending event is classified by code range and written to its logs,
//! then removed from the queue. The loop runs until the queue is empty, except
//! that an energy-log event waiting on the bulk store returns control and
//! resumes on the next call.
//!
//! ```text
//!         ┌──► Summary ──────────┐
//!         ├──► Trip ─────────────┤
//!  Idle ──┼──► Alarm ────────────┼──► Finish ──► Idle
//!         ├──► ExtendedCapture ──┤
//!         ├──► Disturbance ──────┤
//!         ├──► EnergyLog ────────┤  (Request → WaitWrite → WaitErase)
//!         └──► (unknown code) ───┘
//! ```

use tripunit_nvram::{PersistentStore, RecordWriter};

use crate::codes::{EventCategory, EventCode};
use crate::disturbance::{DisturbanceParameter, TrackState};
use crate::eid::raw_eid;
use crate::engine::EventEngine;
use crate::error::EventResult;
use crate::handshake::{BulkOp, ENERGY_WRITE_LEN, EnergyWrite, Handshake};
use crate::layout::LogKind;
use crate::ports::{MeteringSnapshot, ProtectionStatus, RealTimeClock};
use crate::records::{DisturbanceRecord, EnergyEntry, Record, SnapshotRecord, SummaryRecord};
use crate::sequencer::PendingEvent;
use crate::waveform::CaptureKind;

/// Where an energy-log event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum EnergyPhase {
    /// Entry not yet handled.
    #[default]
    Request,
    /// Waiting for the page write.
    WaitWrite,
    /// Waiting for the sector erase.
    WaitErase,
}

/// Event manager state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DispatchState {
    /// Nothing being dispatched.
    #[default]
    Idle,
    /// Writing a summary record.
    Summary,
    /// Writing a trip.
    Trip,
    /// Writing an alarm.
    Alarm,
    /// Writing an extended-capture event.
    ExtendedCapture,
    /// Writing a disturbance episode.
    Disturbance,
    /// Writing an energy entry.
    EnergyLog(EnergyPhase),
    /// Removing the dispatched event.
    Finish,
}

impl DispatchState {
    /// State that handles `code`.
    #[must_use]
    pub fn for_code(code: EventCode) -> Self {
        match code.category() {
            EventCategory::Summary => Self::Summary,
            EventCategory::Trip => Self::Trip,
            EventCategory::Alarm => Self::Alarm,
            EventCategory::ExtendedCapture => Self::ExtendedCapture,
            EventCategory::Disturbance => Self::Disturbance,
            EventCategory::EnergyLog => Self::EnergyLog(EnergyPhase::Request),
            EventCategory::Unknown => Self::Finish,
        }
    }

    /// Whether the manager is parked on a bulk-store handshake.
    #[must_use]
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            Self::EnergyLog(EnergyPhase::WaitWrite | EnergyPhase::WaitErase)
        )
    }
}

fn disturbance_parameter(code: EventCode) -> Option<DisturbanceParameter> {
    code.disturbance_index().and_then(DisturbanceParameter::from_index)
}

impl<S, C, M, P> EventEngine<S, C, M, P>
where
    S: PersistentStore,
    C: RealTimeClock,
    M: MeteringSnapshot,
    P: ProtectionStatus,
{
    /// Dispatch pending events until the queue is empty or a bulk-store
    /// handshake is outstanding.
    ///
    /// Staged interrupt events are drained into the queue first. Returns the
    /// state the manager stopped in: [`DispatchState::Idle`] when the queue is
    /// empty, an energy wait state otherwise.
    ///
    /// # Errors
    ///
    /// Propagates store errors. The failing event is removed from the queue on
    /// the next call; a failed disturbance event also frees its track.
    pub fn run_event_manager(&mut self) -> EventResult<DispatchState> {
        let now = self.clock.now();
        self.sequencer.admit(EventCode::NO_EVENT, now);

        loop {
            let state = self.dispatch;
            match state {
                DispatchState::Idle => {
                    let Some(event) = self.sequencer.front() else {
                        return Ok(DispatchState::Idle);
                    };
                    let next = DispatchState::for_code(event.code);
                    if next == DispatchState::Finish {
                        self.counters.inc_unknown_codes();
                        tracing::warn!(
                            code = %event.code,
                            eid = event.eid.get(),
                            "unknown event code"
                        );
                    }
                    tracing::trace!(code = %event.code, ?next, "dispatching");
                    self.dispatch = next;
                }
                DispatchState::Finish => {
                    if self.sequencer.finish().is_some() {
                        self.counters.inc_dispatched();
                    }
                    self.dispatch = DispatchState::Idle;
                }
                DispatchState::EnergyLog(phase) => {
                    let Some(event) = self.sequencer.front().copied() else {
                        self.dispatch = DispatchState::Idle;
                        continue;
                    };
                    match self.step_energy(phase, &event) {
                        Ok(Some(waiting)) => {
                            self.dispatch = DispatchState::EnergyLog(waiting);
                            return Ok(self.dispatch);
                        }
                        Ok(None) => self.dispatch = DispatchState::Finish,
                        Err(err) => {
                            self.dispatch = DispatchState::Finish;
                            return Err(err);
                        }
                    }
                }
                DispatchState::Summary
                | DispatchState::Trip
                | DispatchState::Alarm
                | DispatchState::ExtendedCapture
                | DispatchState::Disturbance => {
                    let Some(event) = self.sequencer.front().copied() else {
                        self.dispatch = DispatchState::Idle;
                        continue;
                    };
                    self.dispatch = DispatchState::Finish;
                    if let Err(err) = self.dispatch_event(state, &event) {
                        if state == DispatchState::Disturbance {
                            self.release_disturbance(event.code);
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    fn dispatch_event(&mut self, state: DispatchState, event: &PendingEvent) -> EventResult<()> {
        self.write_summary(event)?;
        match state {
            DispatchState::Summary => {
                let linked = match event.code {
                    EventCode::SDPU_ENTRY => Some(DisturbanceParameter::ShortDelayPickup),
                    EventCode::LDPU_ENTRY => Some(DisturbanceParameter::LongDelayPickup),
                    _ => None,
                };
                if let Some(parameter) = linked {
                    self.set_origin(parameter, event);
                }
            }
            DispatchState::Trip => {
                self.write_snapshot(LogKind::Trip, event)?;
                if self.signals.any_level() {
                    self.signals.cancel_all();
                    tracing::debug!(eid = event.eid.get(), "trip cancels active disturbances");
                }
                self.sessions.get_mut(CaptureKind::Trip).set_eid(event.eid);
            }
            DispatchState::Alarm => {
                self.write_snapshot(LogKind::Alarm, event)?;
                if event.code == EventCode::ALARM_GROUND_FAULT {
                    self.set_origin(DisturbanceParameter::GroundFault, event);
                }
                self.sessions.get_mut(CaptureKind::Alarm).set_eid(event.eid);
            }
            DispatchState::ExtendedCapture => {
                if event.code.is_composite_extended() {
                    self.write_snapshot(LogKind::Extended, event)?;
                }
                self.coalescer.note_dispatched(event.code, event.eid);
                self.sessions.get_mut(CaptureKind::Extended).set_eid(event.eid);
            }
            DispatchState::Disturbance => self.write_disturbance(event)?,
            DispatchState::Idle | DispatchState::EnergyLog(_) | DispatchState::Finish => {}
        }
        Ok(())
    }

    fn write_summary(&mut self, event: &PendingEvent) -> EventResult<()> {
        let record = SummaryRecord::new(event.eid, event.timestamp, event.code);
        let slot = self.append_record(LogKind::Summary, &record)?;
        self.sequencer.commit(&mut self.store, event.eid)?;
        tracing::trace!(eid = event.eid.get(), slot, "summary written");
        Ok(())
    }

    fn write_snapshot(&mut self, kind: LogKind, event: &PendingEvent) -> EventResult<()> {
        let record = SnapshotRecord {
            header: SummaryRecord::new(event.eid, event.timestamp, event.code),
            metering: self.metering.capture(event.code),
        };
        let slot = self.append_record(kind, &record)?;
        tracing::trace!(%kind, eid = event.eid.get(), slot, "snapshot written");
        Ok(())
    }

    fn write_disturbance(&mut self, event: &PendingEvent) -> EventResult<()> {
        let Some(parameter) = disturbance_parameter(event.code) else {
            return Ok(());
        };
        let Some(track) = self.disturbances.track(parameter) else {
            return Ok(());
        };
        let (TrackState::Wait, Some(stats)) = (track.state(), track.stats().copied()) else {
            tracing::debug!(
                %parameter,
                state = %track.state(),
                "no held episode for disturbance event"
            );
            return Ok(());
        };
        let record = DisturbanceRecord {
            eid: event.eid.get(),
            timestamp: event.timestamp,
            entry_timestamp: stats.entry_timestamp,
            duration_ms: stats.duration_ms,
            value_code: u16::from(event.code.raw()),
            spare: 0,
            extremum: stats.extremum,
            average: stats.average,
            percent_to_trip: stats.percent_to_trip,
            origin_eid: raw_eid(track.origin_eid()),
        };
        self.append_record(LogKind::Disturbance, &record)?;
        if let Some(track) = self.disturbances.track_mut(parameter) {
            track.clear_pending_write();
        }
        self.counters.inc_disturbance_episodes();
        tracing::debug!(
            %parameter,
            eid = event.eid.get(),
            duration_ms = stats.duration_ms,
            "disturbance written"
        );
        Ok(())
    }

    /// Free a track whose held episode could not be written, so the next
    /// episode for the parameter is captured.
    fn release_disturbance(&mut self, code: EventCode) {
        let Some(parameter) = disturbance_parameter(code) else {
            return;
        };
        if let Some(track) = self.disturbances.track_mut(parameter)
            && track.is_pending_write()
        {
            track.release();
            tracing::warn!(%parameter, "disturbance record lost to a store error");
        }
    }

    fn set_origin(&mut self, parameter: DisturbanceParameter, event: &PendingEvent) {
        if let Some(track) = self.disturbances.track_mut(parameter) {
            track.set_origin(Some(event.eid));
        }
    }

    /// Advance an energy-log event. Returns the phase to wait in, or `None`
    /// once the event is done.
    fn step_energy(
        &mut self,
        phase: EnergyPhase,
        event: &PendingEvent,
    ) -> EventResult<Option<EnergyPhase>> {
        match phase {
            EnergyPhase::Request => {
                let entry = EnergyEntry {
                    eid: event.eid.get(),
                    timestamp: event.timestamp,
                    payload: self.metering.energy_entry(),
                };
                let mut bytes = [0u8; EnergyEntry::LEN as usize];
                entry.write_to(&mut bytes)?;

                if self.energy_geometry.is_first_half(self.energy) {
                    self.store.write(self.map.energy_holding(), &bytes)?;
                    let parked = self.energy_geometry.parked(self.energy);
                    self.energy_register.store(&mut self.store, parked)?;
                    self.energy = parked;
                    self.sequencer.commit(&mut self.store, event.eid)?;
                    tracing::trace!(eid = event.eid.get(), "energy entry parked");
                    return Ok(None);
                }

                let mut held = [0u8; EnergyEntry::LEN as usize];
                self.store.read(self.map.energy_holding(), &mut held)?;
                let mut data = [0u8; ENERGY_WRITE_LEN];
                RecordWriter::new(&mut data)
                    .put_bytes(&held)?
                    .put_bytes(&bytes)?;
                self.bulk.request_energy_write(EnergyWrite {
                    half_page: self.energy.next_half_page.saturating_sub(1),
                    data,
                });
                Ok(Some(EnergyPhase::WaitWrite))
            }
            EnergyPhase::WaitWrite => match self.bulk.state(BulkOp::WriteEnergyHalfPage) {
                Handshake::Acknowledged => {
                    self.bulk.reset(BulkOp::WriteEnergyHalfPage);
                    let (next, erase) = self.energy_geometry.written(self.energy);
                    self.energy_register.store(&mut self.store, next)?;
                    self.energy = next;
                    self.sequencer.commit(&mut self.store, event.eid)?;
                    let Some(sector) = erase else {
                        return Ok(None);
                    };
                    self.bulk.request_erase(sector);
                    tracing::debug!(
                        sector,
                        entries = next.entries,
                        "energy sector erase requested"
                    );
                    Ok(Some(EnergyPhase::WaitErase))
                }
                Handshake::Idle => {
                    self.bulk.reset(BulkOp::WriteEnergyHalfPage);
                    tracing::warn!(
                        eid = event.eid.get(),
                        "energy page write withdrawn, entry lost"
                    );
                    Ok(None)
                }
                Handshake::Requested | Handshake::InProgress => Ok(Some(EnergyPhase::WaitWrite)),
            },
            EnergyPhase::WaitErase => match self.bulk.state(BulkOp::EraseEnergySector) {
                Handshake::Acknowledged | Handshake::Idle => {
                    self.bulk.reset(BulkOp::EraseEnergySector);
                    Ok(None)
                }
                Handshake::Requested | Handshake::InProgress => Ok(Some(EnergyPhase::WaitErase)),
            },
        }
    }
}
