//! Device session state machine.
//!
//! The transition function is pure: the session manager performs the I/O,
//! classifies the outcome into a [`Trigger`], and asks [`transition`] what
//! to do next.

use std::fmt;

use crate::transport::ErrorClass;

/// Lifecycle of the connection to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Device node does not exist.
    #[default]
    Inaccessible,
    /// Node exists but is not open.
    Accessible,
    /// Node open, arming report not (yet) accepted.
    Open,
    /// Armed; reports are being read.
    Streaming,
    /// Unrecoverable error. Terminal.
    Fault,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Inaccessible => write!(f, "INACCESSIBLE"),
            SessionState::Accessible => write!(f, "ACCESSIBLE"),
            SessionState::Open => write!(f, "OPEN"),
            SessionState::Streaming => write!(f, "STREAMING"),
            SessionState::Fault => write!(f, "FAULT"),
        }
    }
}

impl SessionState {
    /// States in which a device handle is held.
    pub fn holds_handle(&self) -> bool {
        matches!(self, SessionState::Open | SessionState::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Fault)
    }
}

/// Classified outcome of the I/O performed in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Presence check found the node.
    PathPresent,
    /// Presence check did not find the node.
    PathAbsent,
    /// Node disappeared while past `Inaccessible`.
    PathVanished,
    /// `open` succeeded.
    Opened,
    /// Arming report accepted in full.
    Armed,
    /// A read returned data (valid or not).
    FrameRead,
    /// The step's I/O failed.
    Failed(ErrorClass),
}

/// Side effect to perform when taking a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Sleep for the presence poll interval.
    Wait,
    /// Keep the freshly opened handle.
    StoreHandle,
    /// Try the same operation again next step.
    Retry,
    /// Keep the handle and resend the arming report.
    ReArm,
    /// Decode the frame and publish it.
    Decode,
    /// Close the handle and tell the sink its values are stale.
    CloseAndRetract,
    /// Close the handle and surface the error.
    ReportFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub action: Action,
}

impl Transition {
    const fn to(next: SessionState, action: Action) -> Self {
        Self { next, action }
    }
}

/// The session transition table.
///
/// Triggers that cannot occur in a state leave it unchanged.
pub fn transition(state: SessionState, trigger: Trigger) -> Transition {
    use Action as A;
    use ErrorClass as E;
    use SessionState as S;
    use Trigger as T;

    match (state, trigger) {
        (S::Fault, _) => Transition::to(S::Fault, A::None),

        (S::Open | S::Streaming, T::PathVanished) => {
            Transition::to(S::Inaccessible, A::CloseAndRetract)
        }
        (S::Inaccessible | S::Accessible, T::PathVanished) => {
            Transition::to(S::Inaccessible, A::None)
        }

        (S::Inaccessible, T::PathPresent) => Transition::to(S::Accessible, A::None),
        (S::Inaccessible, T::PathAbsent) => Transition::to(S::Inaccessible, A::Wait),

        (S::Accessible, T::Opened) => Transition::to(S::Open, A::StoreHandle),
        (S::Accessible, T::Failed(E::DeviceRemoved)) => Transition::to(S::Inaccessible, A::None),
        (S::Accessible, T::Failed(E::Transient)) => Transition::to(S::Accessible, A::Retry),
        (S::Accessible, T::Failed(E::ProtocolStall | E::Fatal)) => {
            Transition::to(S::Fault, A::ReportFault)
        }

        (S::Open, T::Armed) => Transition::to(S::Streaming, A::None),
        (S::Open, T::Failed(E::Transient)) => Transition::to(S::Open, A::Retry),
        (S::Open, T::Failed(E::DeviceRemoved)) => {
            Transition::to(S::Accessible, A::CloseAndRetract)
        }
        (S::Open, T::Failed(E::ProtocolStall | E::Fatal)) => {
            Transition::to(S::Fault, A::ReportFault)
        }

        (S::Streaming, T::FrameRead) => Transition::to(S::Streaming, A::Decode),
        (S::Streaming, T::Failed(E::ProtocolStall)) => Transition::to(S::Open, A::ReArm),
        (S::Streaming, T::Failed(E::Transient)) => Transition::to(S::Streaming, A::Retry),
        (S::Streaming, T::Failed(E::DeviceRemoved)) => {
            Transition::to(S::Accessible, A::CloseAndRetract)
        }
        (S::Streaming, T::Failed(E::Fatal)) => Transition::to(S::Fault, A::ReportFault),

        (state, _) => Transition::to(state, A::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [SessionState; 5] = [
        SessionState::Inaccessible,
        SessionState::Accessible,
        SessionState::Open,
        SessionState::Streaming,
        SessionState::Fault,
    ];

    fn all_triggers() -> Vec<Trigger> {
        let mut triggers = vec![
            Trigger::PathPresent,
            Trigger::PathAbsent,
            Trigger::PathVanished,
            Trigger::Opened,
            Trigger::Armed,
            Trigger::FrameRead,
        ];
        for class in [
            ErrorClass::Transient,
            ErrorClass::DeviceRemoved,
            ErrorClass::ProtocolStall,
            ErrorClass::Fatal,
        ] {
            triggers.push(Trigger::Failed(class));
        }
        triggers
    }

    #[test]
    fn test_fault_is_terminal() {
        for trigger in all_triggers() {
            assert_eq!(
                transition(SessionState::Fault, trigger),
                Transition::to(SessionState::Fault, Action::None)
            );
        }
    }

    #[test]
    fn test_handle_is_only_kept_in_handle_states() {
        // Any transition that ends outside Open/Streaming from a state that
        // holds a handle must close it.
        for state in ALL_STATES {
            for trigger in all_triggers() {
                let t = transition(state, trigger);
                if state.holds_handle() && !t.next.holds_handle() {
                    assert!(
                        matches!(t.action, Action::CloseAndRetract | Action::ReportFault),
                        "{state} --{trigger:?}--> {} leaks the handle",
                        t.next
                    );
                }
                if t.action == Action::StoreHandle {
                    assert_eq!(t.next, SessionState::Open);
                }
            }
        }
    }

    #[test]
    fn test_stall_rearms_without_closing() {
        let t = transition(
            SessionState::Streaming,
            Trigger::Failed(ErrorClass::ProtocolStall),
        );
        assert_eq!(t, Transition::to(SessionState::Open, Action::ReArm));
    }

    #[test]
    fn test_removal_paths() {
        assert_eq!(
            transition(
                SessionState::Streaming,
                Trigger::Failed(ErrorClass::DeviceRemoved)
            ),
            Transition::to(SessionState::Accessible, Action::CloseAndRetract)
        );
        assert_eq!(
            transition(SessionState::Open, Trigger::Failed(ErrorClass::DeviceRemoved)),
            Transition::to(SessionState::Accessible, Action::CloseAndRetract)
        );
        assert_eq!(
            transition(
                SessionState::Accessible,
                Trigger::Failed(ErrorClass::DeviceRemoved)
            ),
            Transition::to(SessionState::Inaccessible, Action::None)
        );
        assert_eq!(
            transition(SessionState::Streaming, Trigger::PathVanished),
            Transition::to(SessionState::Inaccessible, Action::CloseAndRetract)
        );
        assert_eq!(
            transition(SessionState::Accessible, Trigger::PathVanished),
            Transition::to(SessionState::Inaccessible, Action::None)
        );
    }

    #[test]
    fn test_transient_failures_retry_in_place() {
        for state in [
            SessionState::Accessible,
            SessionState::Open,
            SessionState::Streaming,
        ] {
            assert_eq!(
                transition(state, Trigger::Failed(ErrorClass::Transient)),
                Transition::to(state, Action::Retry)
            );
        }
    }

    #[test]
    fn test_fatal_failures() {
        for state in [
            SessionState::Accessible,
            SessionState::Open,
            SessionState::Streaming,
        ] {
            assert_eq!(
                transition(state, Trigger::Failed(ErrorClass::Fatal)),
                Transition::to(SessionState::Fault, Action::ReportFault)
            );
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(SessionState::Inaccessible.to_string(), "INACCESSIBLE");
        assert_eq!(SessionState::Streaming.to_string(), "STREAMING");
    }
}
