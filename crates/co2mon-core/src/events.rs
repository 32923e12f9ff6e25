//! Event system for UI decoupling.
//!
//! The session manager never logs by itself; it reports what happens to an
//! observer, and the caller decides what to do with it.

use crate::protocol::{Measurement, RawFrame, RejectReason};
use crate::session::FaultKind;
use crate::state::SessionState;

/// Events emitted by the session manager.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// State changed.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Arming feature report accepted.
    Armed { rearm: bool },
    /// Device stopped reporting (read timeout or I/O error); the session
    /// will re-arm.
    Stalled { reason: String },
    /// Read returned something other than one report.
    NoiseRead { len: usize },
    /// Report failed validation.
    FrameRejected {
        frame: RawFrame,
        reason: RejectReason,
    },
    /// Valid measurement decoded and published.
    Measurement(Measurement),
    /// Recoverable I/O hiccup; the step will be retried.
    TransientError { message: String },
    /// Device went away; published values were retracted.
    SessionLost { reason: String },
    /// Unrecoverable error; the session stops.
    Fault { kind: FaultKind, detail: String },
    /// Releasing a resource failed during teardown.
    CleanupFailed { message: String },
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait SessionObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &SessionEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn on_event(&self, _event: &SessionEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "State changed");
            }
            SessionEvent::Armed { rearm } => {
                if *rearm {
                    tracing::info!("Device re-armed");
                } else {
                    tracing::info!("Device armed, streaming");
                }
            }
            SessionEvent::Stalled { reason } => {
                tracing::warn!(reason = %reason, "Device stalled, re-arming");
            }
            SessionEvent::NoiseRead { len } => {
                tracing::trace!(len = len, "Discarded read of unexpected length");
            }
            SessionEvent::FrameRejected { frame, reason } => {
                tracing::trace!(frame = ?frame, reason = ?reason, "Frame rejected");
            }
            SessionEvent::Measurement(m) => {
                tracing::debug!(kind = m.kind(), value = %m, "Measurement");
            }
            SessionEvent::TransientError { message } => {
                tracing::debug!("Transient error, retrying: {}", message);
            }
            SessionEvent::SessionLost { reason } => {
                tracing::warn!(reason = %reason, "Device lost");
            }
            SessionEvent::Fault { kind, detail } => {
                tracing::error!(kind = %kind, "Session fault: {}", detail);
            }
            SessionEvent::CleanupFailed { message } => {
                tracing::warn!("Cleanup failed: {}", message);
            }
        }
    }
}

/// Observer that keeps every event, for tests and embedding.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
