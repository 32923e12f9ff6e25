//! co2mon-core: session management and frame decoding for CO2 mini sensors.
//!
//! The sensor (Holtek VID 04D9, PID A052, sold under many names) shows up
//! as a raw HID device and emits 8-byte reports carrying CO2 ppm and
//! temperature, optionally obfuscated.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, frame types, decoder
//! - **Transport**: Device node access abstraction (hidraw, mock)
//! - **State**: Session state machine and transition table
//! - **Events**: Observer pattern for UI decoupling
//! - **Sink**: Where decoded measurements are published
//! - **Session**: Owns the device handle and drives the state machine
//!
//! # Example
//!
//! ```no_run
//! use co2mon_core::{FileSink, HidrawAccess, SessionConfig, SessionManager, ShutdownToken};
//!
//! let shutdown = ShutdownToken::new();
//! let access = HidrawAccess::new(shutdown.clone());
//! let mut session = SessionManager::new(access, SessionConfig::default());
//! let mut sink = FileSink::default();
//! session.run(&mut sink, &shutdown).expect("session faulted");
//! ```

pub mod config;
pub mod events;
pub mod protocol;
pub mod session;
pub mod shutdown;
pub mod sink;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use config::{MonitorConfig, OutputConfig, OutputMode};
pub use events::{NullObserver, RecordingObserver, SessionEvent, SessionObserver, TracingObserver};
pub use protocol::{ArmingKey, Measurement, ProtocolVariant, RawFrame, validate_and_decode};
pub use session::{FaultKind, SessionConfig, SessionError, SessionManager, SessionStats, Step};
pub use shutdown::ShutdownToken;
pub use sink::{FileSink, MeasurementSink, MemorySink, SinkError};
pub use state::SessionState;
#[cfg(target_os = "linux")]
pub use transport::HidrawAccess;
pub use transport::{DeviceAccess, ErrorClass, MockAccess, MockReply, TransportError};
