//! Session manager - owns the device handle and drives the state machine.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{SessionEvent, SessionObserver, TracingObserver};
use crate::protocol::{
    ArmingKey, DEFAULT_DEVICE_PATH, FEATURE_REPORT_LEN, FrameVerdict, Measurement,
    ProtocolVariant, RawFrame, inspect,
};
use crate::shutdown::ShutdownToken;
use crate::sink::MeasurementSink;
use crate::state::{Action, SessionState, Trigger, transition};
use crate::transport::{DeviceAccess, TransportError};

/// Reads larger than one report are read whole and then discarded.
const READ_BUFFER_LEN: usize = 64;

/// Configuration for a monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// hidraw node (or udev symlink) of the sensor.
    pub device_path: PathBuf,
    /// Firmware flavour of the sensor.
    pub variant: ProtocolVariant,
    /// Key sent in the arming report.
    pub key: ArmingKey,
    /// How long a read may wait before the device is considered stalled.
    pub read_timeout_secs: u64,
    /// Interval between presence checks while the node is absent.
    pub presence_poll_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            variant: ProtocolVariant::Plain,
            key: ArmingKey::default(),
            read_timeout_secs: 15,
            presence_poll_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn presence_poll(&self) -> Duration {
        Duration::from_secs(self.presence_poll_secs)
    }
}

/// Which operation failed when the session faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Open,
    Arm,
    Read,
    Sink,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Open => write!(f, "open"),
            FaultKind::Arm => write!(f, "arm"),
            FaultKind::Read => write!(f, "read"),
            FaultKind::Sink => write!(f, "sink"),
        }
    }
}

/// Unrecoverable session error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} failed: {detail}")]
pub struct SessionError {
    pub kind: FaultKind,
    pub detail: String,
}

/// Result of one [`SessionManager::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// A measurement was decoded and published.
    Measurement(Measurement),
    /// Nothing to report (presence wait, arming, rejected frame, retry...).
    Idle,
    /// The device went away; the sink was told to retract.
    Lost,
    /// Already faulted or shutdown requested; no I/O performed.
    Halted,
}

/// Counters for the lifetime of a session manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub reads: u64,
    pub measurements: u64,
    pub rejected: u64,
    pub arms: u64,
    pub stalls: u64,
    pub losses: u64,
}

/// Session state, with the handle living only in the states that own one.
enum Phase<H> {
    Inaccessible,
    Accessible,
    Open(H),
    Streaming(H),
    Fault,
}

impl<H> Phase<H> {
    fn state(&self) -> SessionState {
        match self {
            Phase::Inaccessible => SessionState::Inaccessible,
            Phase::Accessible => SessionState::Accessible,
            Phase::Open(_) => SessionState::Open,
            Phase::Streaming(_) => SessionState::Streaming,
            Phase::Fault => SessionState::Fault,
        }
    }

    fn into_handle(self) -> Option<H> {
        match self {
            Phase::Open(h) | Phase::Streaming(h) => Some(h),
            _ => None,
        }
    }
}

/// What one step's I/O produced.
struct Outcome<H> {
    trigger: Trigger,
    handle: Option<H>,
    data: Option<Vec<u8>>,
    error: Option<TransportError>,
}

impl<H> Outcome<H> {
    fn new(trigger: Trigger, handle: Option<H>) -> Self {
        Self {
            trigger,
            handle,
            data: None,
            error: None,
        }
    }

    fn failed(error: TransportError, handle: Option<H>) -> Self {
        Self {
            trigger: Trigger::Failed(error.class()),
            handle,
            data: None,
            error: Some(error),
        }
    }
}

/// Owns the connection to one sensor and advances it one step at a time.
pub struct SessionManager<A: DeviceAccess, O: SessionObserver = TracingObserver> {
    access: A,
    config: SessionConfig,
    observer: Arc<O>,
    phase: Phase<A::Handle>,
    rearm_pending: bool,
    stats: SessionStats,
}

impl<A: DeviceAccess> SessionManager<A, TracingObserver> {
    /// Create a session manager that logs through tracing.
    pub fn new(access: A, config: SessionConfig) -> Self {
        Self::with_observer(access, config, Arc::new(TracingObserver))
    }
}

impl<A: DeviceAccess, O: SessionObserver> SessionManager<A, O> {
    /// Create a session manager with a custom observer.
    pub fn with_observer(access: A, config: SessionConfig, observer: Arc<O>) -> Self {
        Self {
            access,
            config,
            observer,
            phase: Phase::Inaccessible,
            rearm_pending: false,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.phase.state()
    }

    pub fn has_handle(&self) -> bool {
        matches!(self.phase, Phase::Open(_) | Phase::Streaming(_))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    fn emit(&self, event: SessionEvent) {
        self.observer.on_event(&event);
    }

    /// Advance the session by one transition.
    ///
    /// Returns `Err` exactly once, when the session enters `Fault`; every
    /// later call returns `Ok(Step::Halted)` without touching the device.
    pub fn step<S: MeasurementSink + ?Sized>(
        &mut self,
        sink: &mut S,
        shutdown: &ShutdownToken,
    ) -> Result<Step, SessionError> {
        if self.phase.state().is_terminal() || shutdown.is_cancelled() {
            return Ok(Step::Halted);
        }

        let from = self.phase.state();
        let phase = std::mem::replace(&mut self.phase, Phase::Fault);
        let outcome = self.perform(phase);
        self.apply(from, outcome, sink, shutdown)
    }

    /// Do the I/O for the current phase and classify the result.
    fn perform(&mut self, phase: Phase<A::Handle>) -> Outcome<A::Handle> {
        let path = self.config.device_path.clone();

        if !matches!(phase, Phase::Inaccessible) && !self.access.exists(&path) {
            return Outcome::new(Trigger::PathVanished, phase.into_handle());
        }

        match phase {
            Phase::Inaccessible => {
                if self.access.exists(&path) {
                    Outcome::new(Trigger::PathPresent, None)
                } else {
                    Outcome::new(Trigger::PathAbsent, None)
                }
            }
            Phase::Accessible => match self.access.open(&path) {
                Ok(handle) => Outcome::new(Trigger::Opened, Some(handle)),
                Err(e) => Outcome::failed(e, None),
            },
            Phase::Open(mut handle) => {
                let report = self.config.key.feature_report();
                match self.access.send_feature_report(&mut handle, &report) {
                    Ok(n) if n == FEATURE_REPORT_LEN => Outcome::new(Trigger::Armed, Some(handle)),
                    Ok(n) => Outcome::failed(
                        TransportError::ShortWrite {
                            written: n,
                            expected: FEATURE_REPORT_LEN,
                        },
                        Some(handle),
                    ),
                    Err(e) => Outcome::failed(e, Some(handle)),
                }
            }
            Phase::Streaming(mut handle) => {
                let timeout = self.config.read_timeout();
                match self.access.read(&mut handle, READ_BUFFER_LEN, timeout) {
                    Ok(data) => Outcome {
                        data: Some(data),
                        ..Outcome::new(Trigger::FrameRead, Some(handle))
                    },
                    Err(e) => Outcome::failed(e, Some(handle)),
                }
            }
            // Unreachable from `step`, which halts on Fault first.
            Phase::Fault => Outcome::new(Trigger::PathAbsent, None),
        }
    }

    /// Take the transition the table prescribes for `outcome`.
    fn apply<S: MeasurementSink + ?Sized>(
        &mut self,
        from: SessionState,
        outcome: Outcome<A::Handle>,
        sink: &mut S,
        shutdown: &ShutdownToken,
    ) -> Result<Step, SessionError> {
        let Outcome {
            trigger,
            handle,
            data,
            error,
        } = outcome;
        let t = transition(from, trigger);

        match t.action {
            Action::None | Action::StoreHandle => {
                if from == SessionState::Open && t.next == SessionState::Streaming {
                    self.stats.arms += 1;
                    let rearm = std::mem::take(&mut self.rearm_pending);
                    self.emit(SessionEvent::Armed { rearm });
                }
                self.enter(from, t.next, handle)?;
                Ok(Step::Idle)
            }
            Action::Wait => {
                self.enter(from, t.next, handle)?;
                shutdown.wait_timeout(self.config.presence_poll());
                Ok(Step::Idle)
            }
            Action::Retry => {
                if let Some(e) = &error {
                    self.emit(SessionEvent::TransientError {
                        message: e.to_string(),
                    });
                }
                self.enter(from, t.next, handle)?;
                Ok(Step::Idle)
            }
            Action::ReArm => {
                self.stats.stalls += 1;
                self.rearm_pending = true;
                let reason = match &error {
                    Some(e) => e.to_string(),
                    None => format!("{trigger:?} in {from}"),
                };
                self.emit(SessionEvent::Stalled { reason });
                self.enter(from, t.next, handle)?;
                Ok(Step::Idle)
            }
            Action::Decode => {
                self.enter(from, t.next, handle)?;
                self.decode(data.unwrap_or_default(), sink)
            }
            Action::CloseAndRetract => {
                self.enter(from, t.next, handle)?;
                self.stats.losses += 1;
                self.rearm_pending = false;
                let reason = match &error {
                    Some(e) => e.to_string(),
                    None => format!("{} disappeared", self.config.device_path.display()),
                };
                self.emit(SessionEvent::SessionLost { reason });
                if let Err(e) = sink.retract() {
                    self.emit(SessionEvent::CleanupFailed {
                        message: e.to_string(),
                    });
                }
                Ok(Step::Lost)
            }
            Action::ReportFault => {
                let kind = match from {
                    SessionState::Open => FaultKind::Arm,
                    SessionState::Streaming => FaultKind::Read,
                    _ => FaultKind::Open,
                };
                let detail = match error {
                    Some(e) => e.to_string(),
                    None => format!("{trigger:?} in {from}"),
                };
                Err(self.fault(from, kind, detail, handle))
            }
        }
    }

    /// Turn one read into a published measurement, if it is a valid report.
    fn decode<S: MeasurementSink + ?Sized>(
        &mut self,
        data: Vec<u8>,
        sink: &mut S,
    ) -> Result<Step, SessionError> {
        self.stats.reads += 1;

        let Some(frame) = RawFrame::from_slice(&data) else {
            self.stats.rejected += 1;
            self.emit(SessionEvent::NoiseRead { len: data.len() });
            return Ok(Step::Idle);
        };

        match inspect(&frame, &self.config.key, self.config.variant) {
            FrameVerdict::Accepted(m) => {
                if let Err(e) = sink.publish(&m) {
                    let phase = std::mem::replace(&mut self.phase, Phase::Fault);
                    return Err(self.fault(
                        SessionState::Streaming,
                        FaultKind::Sink,
                        e.to_string(),
                        phase.into_handle(),
                    ));
                }
                self.stats.measurements += 1;
                self.emit(SessionEvent::Measurement(m));
                Ok(Step::Measurement(m))
            }
            FrameVerdict::Rejected(reason) => {
                self.stats.rejected += 1;
                self.emit(SessionEvent::FrameRejected { frame, reason });
                Ok(Step::Idle)
            }
        }
    }

    /// Install the phase for `next`, keeping or releasing `handle` as the
    /// state requires.
    fn enter(
        &mut self,
        from: SessionState,
        next: SessionState,
        handle: Option<A::Handle>,
    ) -> Result<(), SessionError> {
        if next.holds_handle() && handle.is_none() {
            return Err(self.fault(
                from,
                FaultKind::Open,
                format!("entered {next} without a device handle"),
                None,
            ));
        }
        let phase = match (next, handle) {
            (SessionState::Open, Some(h)) => Phase::Open(h),
            (SessionState::Streaming, Some(h)) => Phase::Streaming(h),
            (state, handle) => {
                if let Some(h) = handle {
                    self.access.close(h);
                }
                match state {
                    SessionState::Inaccessible => Phase::Inaccessible,
                    SessionState::Accessible => Phase::Accessible,
                    _ => Phase::Fault,
                }
            }
        };
        self.phase = phase;
        if from != next {
            self.emit(SessionEvent::StateChanged { from, to: next });
        }
        Ok(())
    }

    /// Enter Fault: release the handle and report the error once.
    fn fault(
        &mut self,
        from: SessionState,
        kind: FaultKind,
        detail: String,
        handle: Option<A::Handle>,
    ) -> SessionError {
        if let Some(h) = handle {
            self.access.close(h);
        }
        self.phase = Phase::Fault;
        self.rearm_pending = false;
        if from != SessionState::Fault {
            self.emit(SessionEvent::StateChanged {
                from,
                to: SessionState::Fault,
            });
        }
        self.emit(SessionEvent::Fault {
            kind,
            detail: detail.clone(),
        });
        SessionError { kind, detail }
    }

    /// Drive the session until it faults or `shutdown` is cancelled.
    ///
    /// Always releases the device and retracts published values before
    /// returning.
    pub fn run<S: MeasurementSink + ?Sized>(
        &mut self,
        sink: &mut S,
        shutdown: &ShutdownToken,
    ) -> Result<(), SessionError> {
        let result = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }
            match self.step(sink, shutdown) {
                Ok(Step::Halted) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.shutdown_cleanup(sink);
        result
    }

    /// Close any open handle and retract published values. Idempotent.
    pub fn shutdown_cleanup<S: MeasurementSink + ?Sized>(&mut self, sink: &mut S) {
        let terminal = self.phase.state().is_terminal();
        let phase = std::mem::replace(&mut self.phase, Phase::Inaccessible);
        if let Some(h) = phase.into_handle() {
            self.access.close(h);
        }
        if terminal {
            self.phase = Phase::Fault;
        }
        self.rearm_pending = false;
        if let Err(e) = sink.retract() {
            self.emit(SessionEvent::CleanupFailed {
                message: e.to_string(),
            });
        }
    }
}

impl<A: DeviceAccess, O: SessionObserver> Drop for SessionManager<A, O> {
    fn drop(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Fault);
        if let Some(h) = phase.into_handle() {
            self.access.close(h);
        }
    }
}
