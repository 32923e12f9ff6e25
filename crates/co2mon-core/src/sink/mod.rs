//! Measurement sinks.
//!
//! A sink publishes decoded values somewhere other processes can see them,
//! and retracts them when the device goes away.

pub mod file;
pub mod memory;

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::Measurement;

pub use file::FileSink;
pub use memory::{MemorySink, SinkRecord};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer of decoded measurements.
pub trait MeasurementSink {
    /// Make `measurement` the current value of its kind.
    fn publish(&mut self, measurement: &Measurement) -> Result<(), SinkError>;

    /// Withdraw every published value; they are stale.
    fn retract(&mut self) -> Result<(), SinkError>;
}

impl<S: MeasurementSink + ?Sized> MeasurementSink for &mut S {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        (**self).publish(measurement)
    }

    fn retract(&mut self) -> Result<(), SinkError> {
        (**self).retract()
    }
}

impl<S: MeasurementSink + ?Sized> MeasurementSink for Box<S> {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        (**self).publish(measurement)
    }

    fn retract(&mut self) -> Result<(), SinkError> {
        (**self).retract()
    }
}
