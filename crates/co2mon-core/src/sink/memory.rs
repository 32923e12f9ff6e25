//! In-memory sink.

use super::{MeasurementSink, SinkError};
use crate::protocol::Measurement;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkRecord {
    Published(Measurement),
    Retracted,
}

/// Sink that records everything it is told, and tracks current values.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<SinkRecord>,
    co2: Option<u16>,
    temperature: Option<f64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SinkRecord] {
        &self.records
    }

    /// Published measurements, oldest first.
    pub fn published(&self) -> Vec<Measurement> {
        self.records
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Published(m) => Some(*m),
                SinkRecord::Retracted => None,
            })
            .collect()
    }

    pub fn retract_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, SinkRecord::Retracted))
            .count()
    }

    /// Current CO2 value, if published and not retracted.
    pub fn co2(&self) -> Option<u16> {
        self.co2
    }

    /// Current temperature, if published and not retracted.
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }
}

impl MeasurementSink for MemorySink {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        match *measurement {
            Measurement::Co2 { ppm } => self.co2 = Some(ppm),
            Measurement::Temperature { celsius } => self.temperature = Some(celsius),
        }
        self.records.push(SinkRecord::Published(*measurement));
        Ok(())
    }

    fn retract(&mut self) -> Result<(), SinkError> {
        self.co2 = None;
        self.temperature = None;
        self.records.push(SinkRecord::Retracted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_values_follow_records() {
        let mut sink = MemorySink::new();
        sink.publish(&Measurement::Co2 { ppm: 612 }).unwrap();
        sink.publish(&Measurement::Temperature { celsius: 21.5 }).unwrap();
        assert_eq!(sink.co2(), Some(612));
        assert_eq!(sink.temperature(), Some(21.5));

        sink.retract().unwrap();
        assert_eq!(sink.co2(), None);
        assert_eq!(sink.temperature(), None);
        assert_eq!(sink.retract_count(), 1);
        assert_eq!(sink.published().len(), 2);
    }
}
