//! Device access abstraction.
//!
//! Defines the `DeviceAccess` trait for talking to the sensor node,
//! allowing different implementations (hidraw, mock, etc.).

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device node not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Interrupted")]
    Interrupted,

    #[error("Feature report truncated: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the session reacts to a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry the same step.
    Transient,
    /// Device unplugged or node vanished.
    DeviceRemoved,
    /// Device stopped talking; re-arm.
    ProtocolStall,
    /// Anything else.
    Fatal,
}

impl TransportError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TransportError::NotFound { .. } | TransportError::Disconnected => {
                ErrorClass::DeviceRemoved
            }
            TransportError::Timeout { .. } => ErrorClass::ProtocolStall,
            TransportError::Interrupted => ErrorClass::Transient,
            TransportError::ShortWrite { .. } => ErrorClass::Fatal,
            TransportError::Io(e) => classify_os_error(e),
        }
    }
}

fn classify_os_error(e: &std::io::Error) -> ErrorClass {
    match e.raw_os_error() {
        Some(libc::EINTR) | Some(libc::EAGAIN) => ErrorClass::Transient,
        Some(libc::ENODEV) | Some(libc::ENOENT) | Some(libc::ENXIO) => ErrorClass::DeviceRemoved,
        // hidraw answers reads on an unplugged node with EIO; the next
        // feature report then fails with ENODEV.
        Some(libc::EIO) => ErrorClass::ProtocolStall,
        _ => match e.kind() {
            std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock => {
                ErrorClass::Transient
            }
            std::io::ErrorKind::NotFound => ErrorClass::DeviceRemoved,
            _ => ErrorClass::Fatal,
        },
    }
}

/// Abstract device node access.
///
/// This trait enables:
/// - Production implementation using hidraw
/// - Mock implementation for unit testing
pub trait DeviceAccess {
    /// Open connection to the node. Dropped or passed to `close` to release.
    type Handle;

    /// Check whether the device node currently exists.
    fn exists(&self, path: &Path) -> bool;

    /// Open the node read/write.
    fn open(&mut self, path: &Path) -> Result<Self::Handle, TransportError>;

    /// Send a feature report, returning the number of bytes accepted.
    fn send_feature_report(
        &mut self,
        handle: &mut Self::Handle,
        report: &[u8],
    ) -> Result<usize, TransportError>;

    /// Read one input report, waiting at most `timeout`.
    fn read(
        &mut self,
        handle: &mut Self::Handle,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Release the handle.
    fn close(&mut self, handle: Self::Handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_os_error_classes() {
        let class = |code| TransportError::Io(io::Error::from_raw_os_error(code)).class();
        assert_eq!(class(libc::EINTR), ErrorClass::Transient);
        assert_eq!(class(libc::EAGAIN), ErrorClass::Transient);
        assert_eq!(class(libc::ENODEV), ErrorClass::DeviceRemoved);
        assert_eq!(class(libc::ENOENT), ErrorClass::DeviceRemoved);
        assert_eq!(class(libc::EIO), ErrorClass::ProtocolStall);
        assert_eq!(class(libc::EACCES), ErrorClass::Fatal);
        assert_eq!(class(libc::EPERM), ErrorClass::Fatal);
    }

    #[test]
    fn test_variant_classes() {
        assert_eq!(
            TransportError::Timeout { timeout_ms: 15000 }.class(),
            ErrorClass::ProtocolStall
        );
        assert_eq!(TransportError::Disconnected.class(), ErrorClass::DeviceRemoved);
        assert_eq!(TransportError::Interrupted.class(), ErrorClass::Transient);
        assert_eq!(
            TransportError::ShortWrite {
                written: 3,
                expected: 9
            }
            .class(),
            ErrorClass::Fatal
        );
    }
}
