//! Sink that prints one timestamped line per measurement.

use std::io::{self, Write};

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use co2mon_core::{Measurement, MeasurementSink, SinkError};

pub struct StdoutSink<W: Write = io::Stdout> {
    out: W,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn format_line(at: &DateTime<FixedOffset>, measurement: &Measurement) -> String {
    let unit = match measurement {
        Measurement::Co2 { .. } => "ppm",
        Measurement::Temperature { .. } => "°C",
    };
    format!(
        "{} {} {} {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, false),
        measurement.kind(),
        measurement,
        unit
    )
}

impl<W: Write> MeasurementSink for StdoutSink<W> {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        let now: DateTime<FixedOffset> = Local::now().into();
        writeln!(self.out, "{}", format_line(&now, measurement))?;
        self.out.flush()?;
        Ok(())
    }

    /// Printed lines cannot be taken back; only a marker is written.
    fn retract(&mut self) -> Result<(), SinkError> {
        let now: DateTime<FixedOffset> = Local::now().into();
        writeln!(
            self.out,
            "{} device unavailable",
            now.to_rfc3339_opts(SecondsFormat::Secs, false)
        )?;
        self.out.flush()?;
        Ok(())
    }
}
