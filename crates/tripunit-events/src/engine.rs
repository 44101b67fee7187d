//! The engine context.
//!
//! [`EventEngine`] owns every log, queue and capture session together with the
//! collaborators it talks to. The host calls its tick methods from a
//! cooperative scheduler:
//!
//! | method | cadence |
//! |---|---|
//! | [`run_one_cycle`](EventEngine::run_one_cycle) | every power-frequency cycle |
//! | [`run_two_hundred_ms`](EventEngine::run_two_hundred_ms) | every 200 ms |
//! | [`run_event_manager`](EventEngine::run_event_manager) | every foreground pass |
//! | [`run_waveform_arbiter`](EventEngine::run_waveform_arbiter) | every foreground pass |
//!
//! None of them blocks; each does bounded work and keeps its position in
//! explicit state.

use std::sync::Arc;

use tripunit_nvram::{PersistentRegister, PersistentStore};

use crate::codes::EventCode;
use crate::coalescer::{CoalescerOutcome, ExtendedCaptureCoalescer, ExtendedCause};
use crate::config::EngineConfig;
use crate::dispatch::DispatchState;
use crate::disturbance::{DisturbanceAggregator, DisturbanceParameter, PercentSource};
use crate::eid::Eid;
use crate::energy::{EnergyCursor, EnergyGeometry};
use crate::error::{EventError, EventResult};
use crate::faults::IntegrityFaults;
use crate::handshake::BulkRequests;
use crate::layout::{LogKind, MemoryMap, RegisterSlot};
use crate::logs::LogSet;
use crate::ports::{MeteringSnapshot, ProtectionStatus, RealTimeClock, RmsWindow};
use crate::records::{EnergyEntry, Record};
use crate::sequencer::{EidSequencer, InterruptProducer};
use crate::signals::TriggerSignals;
use crate::stats::EventCounters;
use crate::time::Timestamp;
use crate::waveform::{
    ArbiterOutcome, CaptureKind, CaptureSession, CaptureSessions, WaveformArbiter,
};

/// Largest record any log holds.
const MAX_RECORD_LEN: usize = 256;

/// Event logging and capture engine over a persistent store.
#[derive(Debug)]
pub struct EventEngine<S, C, M, P> {
    pub(crate) config: EngineConfig,
    pub(crate) map: MemoryMap,
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) metering: M,
    pub(crate) protection: P,
    pub(crate) logs: LogSet,
    pub(crate) sequencer: EidSequencer,
    pub(crate) sessions: CaptureSessions,
    pub(crate) arbiter: WaveformArbiter,
    pub(crate) coalescer: ExtendedCaptureCoalescer,
    pub(crate) disturbances: DisturbanceAggregator,
    pub(crate) bulk: BulkRequests,
    pub(crate) signals: Arc<TriggerSignals>,
    pub(crate) counters: Arc<EventCounters>,
    pub(crate) faults: IntegrityFaults,
    pub(crate) dispatch: DispatchState,
    pub(crate) energy_register: PersistentRegister<EnergyCursor>,
    pub(crate) energy_geometry: EnergyGeometry,
    pub(crate) energy: EnergyCursor,
}

impl<S, C, M, P> EventEngine<S, C, M, P>
where
    S: PersistentStore,
    C: RealTimeClock,
    M: MeteringSnapshot,
    P: ProtectionStatus,
{
    /// Plan the memory map, load every register from `store` and start idle.
    ///
    /// Registers that fail both complement checks are defaulted and flagged in
    /// [`faults`](Self::faults); that is not an error.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid `config`,
    /// [`EventError::StoreTooSmall`] if the map does not fit, and propagates
    /// store read errors.
    pub fn open(
        config: EngineConfig,
        store: S,
        clock: C,
        metering: M,
        protection: P,
    ) -> EventResult<Self> {
        let map = MemoryMap::plan(&config)?;
        let required = map.required_len();
        let fits = usize::try_from(required).is_ok_and(|required| required <= store.len());
        if !fits {
            return Err(EventError::StoreTooSmall {
                required,
                available: store.len(),
            });
        }

        let counters = Arc::new(EventCounters::new());
        let mut faults = IntegrityFaults::NONE;

        let master = map.register(RegisterSlot::MasterEid, Eid::FIRST.get())?;
        let (sequencer, master_defaulted) =
            EidSequencer::open(master, &store, Arc::clone(&counters))?;
        if master_defaulted {
            faults.raise(RegisterSlot::MasterEid);
        }

        let logs = LogSet::open(&map, &store, &mut faults)?;

        let energy_geometry = EnergyGeometry::new(&config);
        let energy_register = map.register(RegisterSlot::EnergyCursor, energy_geometry.empty())?;
        let loaded = energy_register.load(&store)?;
        let energy = if loaded.is_valid() && energy_geometry.is_plausible(loaded.value) {
            loaded.value
        } else {
            faults.raise(RegisterSlot::EnergyCursor);
            tracing::warn!(
                next_half_page = loaded.value.next_half_page,
                entries = loaded.value.entries,
                "energy cursor unusable, energy log reset"
            );
            energy_geometry.empty()
        };

        for _ in 0..faults.bits().count_ones() {
            counters.inc_integrity_faults();
        }

        Ok(Self {
            coalescer: ExtendedCaptureCoalescer::new(*map.rms(), &config),
            config,
            map,
            store,
            clock,
            metering,
            protection,
            logs,
            sequencer,
            sessions: CaptureSessions::default(),
            arbiter: WaveformArbiter::default(),
            disturbances: DisturbanceAggregator::new(),
            bulk: BulkRequests::default(),
            signals: Arc::new(TriggerSignals::new()),
            counters,
            faults,
            dispatch: DispatchState::Idle,
            energy_register,
            energy_geometry,
            energy,
        })
    }

    /// Admit a foreground event stamped with the current time.
    ///
    /// Returns `None` if `code` is not admissible or the pending queue is full.
    pub fn admit(&mut self, code: EventCode) -> Option<Eid> {
        let now = self.clock.now();
        self.sequencer.admit(code, now)
    }

    /// Run the disturbance tracks, take extended-capture requests and collect
    /// one one-cycle RMS sample.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the RMS region.
    pub fn run_one_cycle(&mut self) -> EventResult<()> {
        let now = self.clock.now();
        self.run_disturbances(now);
        self.take_extended_requests(now);
        self.run_coalescer(RmsWindow::OneCycle, now)
    }

    /// Collect one two-hundred-millisecond RMS sample.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the RMS region.
    pub fn run_two_hundred_ms(&mut self) -> EventResult<()> {
        let now = self.clock.now();
        self.run_coalescer(RmsWindow::TwoHundredMs, now)
    }

    /// Poll the waveform arbiter and append a header for a finished capture.
    ///
    /// # Errors
    ///
    /// Propagates store errors from the header append.
    pub fn run_waveform_arbiter(&mut self) -> EventResult<()> {
        let now = self.clock.now();
        let timeout = self.config.waveform_timeout_ms;
        match self
            .arbiter
            .poll(&mut self.sessions, &mut self.bulk, now, timeout)
        {
            ArbiterOutcome::Finished(kind, header) => {
                let slot = self.append_record(kind.log_kind(), &header)?;
                tracing::debug!(
                    %kind,
                    slot,
                    eid = header.eid,
                    samples = header.num_samples,
                    "waveform header written"
                );
            }
            ArbiterOutcome::TimedOut(_) => self.counters.inc_waveform_timeouts(),
            ArbiterOutcome::Idle | ArbiterOutcome::Waiting => {}
        }
        Ok(())
    }

    /// Run the event manager, then the waveform arbiter.
    ///
    /// # Errors
    ///
    /// Returns the first store error; the arbiter is still polled after a
    /// dispatch error.
    pub fn service(&mut self) -> EventResult<()> {
        let dispatched = self.run_event_manager().map(|_| ());
        self.run_waveform_arbiter()?;
        dispatched
    }

    /// Ask for a waveform capture of `kind`.
    pub fn request_waveform_capture(&mut self, kind: CaptureKind) {
        self.sessions.get_mut(kind).request();
    }

    /// The sampler started capturing `kind`. Returns `false` if it already was.
    pub fn start_waveform_capture(&mut self, kind: CaptureKind) -> bool {
        let now = self.clock.now();
        self.sessions.get_mut(kind).start(now)
    }

    /// The sampler captured `samples` more samples of `kind`.
    pub fn record_waveform_samples(&mut self, kind: CaptureKind, samples: u16) {
        self.sessions.get_mut(kind).add_samples(samples);
    }

    /// The sampler stopped capturing `kind` before the write completed.
    pub fn abort_waveform_capture(&mut self, kind: CaptureKind) {
        self.sessions.get_mut(kind).stop();
    }

    /// Session state of `kind`.
    #[must_use]
    pub fn capture_session(&self, kind: CaptureKind) -> &CaptureSession {
        self.sessions.get(kind)
    }

    /// Zero every log and region and restart at EID 1.
    ///
    /// Also drops queued events, capture sessions and disturbance episodes, and
    /// requests an erase of the first energy sector.
    ///
    /// # Errors
    ///
    /// Propagates store errors; a failed clear may leave some logs cleared.
    pub fn clear_all(&mut self) -> EventResult<()> {
        for kind in LogKind::ALL {
            self.logs.get_mut(kind).clear(&mut self.store)?;
        }
        self.sequencer.reset(&mut self.store)?;

        let energy = self.energy_geometry.empty();
        self.energy_register.store(&mut self.store, energy)?;
        self.energy = energy;
        self.store
            .clean(self.map.energy_holding(), usize::from(EnergyEntry::LEN))?;
        let rms = self.map.rms();
        let rms_len = usize::try_from(rms.end().saturating_sub(rms.base())).unwrap_or(0);
        self.store.clean(rms.base(), rms_len)?;

        self.bulk = BulkRequests::default();
        self.bulk
            .request_erase(self.energy_geometry.sector_of(energy.next_half_page));
        self.sessions.reset();
        self.arbiter.reset();
        self.coalescer.reset();
        self.disturbances = DisturbanceAggregator::new();
        self.signals.reset();
        self.dispatch = DispatchState::Idle;
        tracing::info!("all event logs cleared");
        Ok(())
    }

    /// Zero one log and reset its cursor.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn clear_log(&mut self, kind: LogKind) -> EventResult<()> {
        self.logs.get_mut(kind).clear(&mut self.store)?;
        tracing::info!(%kind, "event log cleared");
        Ok(())
    }

    /// A producer handle for interrupt-context event detection.
    #[must_use]
    pub fn interrupt_producer(&self) -> InterruptProducer {
        self.sequencer.producer()
    }

    /// Trigger signals shared with interrupt context.
    #[must_use]
    pub fn signals(&self) -> Arc<TriggerSignals> {
        Arc::clone(&self.signals)
    }

    /// Engine counters.
    #[must_use]
    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    /// Registers defaulted at open.
    #[must_use]
    pub fn faults(&self) -> IntegrityFaults {
        self.faults
    }

    /// Acknowledge the integrity faults.
    pub fn clear_faults(&mut self) {
        self.faults = IntegrityFaults::NONE;
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Memory map in use.
    #[must_use]
    pub fn memory_map(&self) -> &MemoryMap {
        &self.map
    }

    /// EID admission state.
    #[must_use]
    pub fn sequencer(&self) -> &EidSequencer {
        &self.sequencer
    }

    /// Extended-capture session state.
    #[must_use]
    pub fn coalescer(&self) -> &ExtendedCaptureCoalescer {
        &self.coalescer
    }

    /// Disturbance tracks.
    #[must_use]
    pub fn disturbances(&self) -> &DisturbanceAggregator {
        &self.disturbances
    }

    /// Energy log position.
    #[must_use]
    pub fn energy_cursor(&self) -> EnergyCursor {
        self.energy
    }

    /// Handshake table for the bulk-store arbiter.
    #[must_use]
    pub fn bulk_requests(&self) -> &BulkRequests {
        &self.bulk
    }

    /// Handshake table for the bulk-store arbiter to service.
    pub fn bulk_requests_mut(&mut self) -> &mut BulkRequests {
        &mut self.bulk
    }

    /// The persistent store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The persistent store, for fault injection and maintenance.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The clock.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// The metering collaborator.
    pub fn metering_mut(&mut self) -> &mut M {
        &mut self.metering
    }

    /// The protection collaborator.
    pub fn protection_mut(&mut self) -> &mut P {
        &mut self.protection
    }

    /// Take the engine apart, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Encode `record` and append it to `kind`.
    pub(crate) fn append_record<R: Record>(
        &mut self,
        kind: LogKind,
        record: &R,
    ) -> EventResult<u16> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let bytes = buf
            .get_mut(..usize::from(R::LEN))
            .ok_or_else(|| EventError::invalid_request("record larger than any log slot"))?;
        record.write_to(bytes)?;
        Ok(self.logs.get_mut(kind).append(&mut self.store, bytes)?)
    }

    fn run_disturbances(&mut self, now: Timestamp) {
        let inputs = self.signals.merge();
        let threshold = self.config.minute_threshold;
        for parameter in DisturbanceParameter::ALL {
            let sample = self.metering.disturbance_value(parameter);
            let Some(track) = self.disturbances.track_mut(parameter) else {
                continue;
            };
            let bit = parameter.bit();
            track.apply_signal(inputs.levels & bit != 0, inputs.cancels & bit != 0);
            if !track.step(sample, now, threshold) {
                continue;
            }
            let extremum = track.stats().map_or(0.0, |stats| stats.extremum);
            let percent = percent_to_trip(&self.protection, parameter, extremum);
            if self.sequencer.admit(parameter.exit_code(), now).is_some() {
                track.accept(percent);
            } else {
                track.discard();
                tracing::warn!(%parameter, "disturbance exit not admitted, episode dropped");
            }
        }
    }

    fn take_extended_requests(&mut self, now: Timestamp) {
        let raised = self.signals.take_extended_requests();
        for cause in ExtendedCause::ALL {
            if raised & cause.bit() == 0 {
                continue;
            }
            let admission = self.coalescer.admission(cause);
            let Some(eid) = self.sequencer.admit(admission.code, now) else {
                tracing::warn!(%cause, "extended capture request not admitted, dropped");
                continue;
            };
            if let Some(track) = self.disturbances.track_mut(cause.linked_parameter()) {
                track.set_origin(Some(eid));
            }
            let extended = self.sessions.get_mut(CaptureKind::Extended);
            if admission.composite && !extended.is_in_progress() {
                extended.request();
            }
            self.coalescer.acknowledge(admission.cause, now);
        }
    }

    fn run_coalescer(&mut self, window: RmsWindow, now: Timestamp) -> EventResult<()> {
        let outcome = self.coalescer.step(
            window,
            &self.sessions,
            &mut self.store,
            &mut self.metering,
            now,
        )?;
        match outcome {
            CoalescerOutcome::Abandoned(cause) => {
                self.counters.inc_abandoned_captures();
                self.sessions.get_mut(CaptureKind::Extended).withdraw();
                tracing::warn!(%cause, "extended capture abandoned to a trip or alarm capture");
            }
            CoalescerOutcome::TimedOut(_) => {
                self.counters.inc_extended_timeouts();
                self.sessions.get_mut(CaptureKind::Extended).withdraw();
            }
            CoalescerOutcome::Completed(..) | CoalescerOutcome::Running => {}
        }
        Ok(())
    }
}

/// Percent-to-trip figure for an episode of `parameter` that peaked at `extremum`.
pub(crate) fn percent_to_trip<P: ProtectionStatus + ?Sized>(
    protection: &P,
    parameter: DisturbanceParameter,
    extremum: f32,
) -> f32 {
    match parameter.percent_source() {
        PercentSource::ThermalBucket => protection.thermal_bucket_percent(),
        PercentSource::TemperatureRatio => {
            let threshold = protection.temperature_trip_threshold();
            if threshold > 0.0 {
                extremum * 100.0 / threshold
            } else {
                0.0
            }
        }
        PercentSource::TripBucket => f32::from(protection.trip_bucket_tenths(parameter)) / 10.0,
        PercentSource::NotApplicable => 0.0,
    }
}
