//! Sink that keeps the latest value of each kind in a well-known file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{MeasurementSink, SinkError};
use crate::protocol::Measurement;

pub const DEFAULT_CO2_PATH: &str = "/tmp/co2minimon_co2";
pub const DEFAULT_TEMPERATURE_PATH: &str = "/tmp/co2minimon_temp";

/// Files are readable and writable by the owner only.
const FILE_MODE: u32 = 0o600;

/// Writes CO2 ppm and temperature (°C, two decimals) to two files, each
/// truncated and rewritten on every update. Retracting removes both files.
#[derive(Debug, Clone)]
pub struct FileSink {
    co2_path: PathBuf,
    temperature_path: PathBuf,
}

impl FileSink {
    pub fn new(co2_path: impl Into<PathBuf>, temperature_path: impl Into<PathBuf>) -> Self {
        Self {
            co2_path: co2_path.into(),
            temperature_path: temperature_path.into(),
        }
    }

    pub fn co2_path(&self) -> &Path {
        &self.co2_path
    }

    pub fn temperature_path(&self) -> &Path {
        &self.temperature_path
    }

    fn write_value(path: &Path, value: &str) -> Result<(), SinkError> {
        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(path)?;
            file.write_all(value.as_bytes())
        };
        write().map_err(|source| SinkError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), value = %value, "Value written");
        Ok(())
    }

    fn remove(path: &Path) -> Result<(), SinkError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SinkError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl Default for FileSink {
    fn default() -> Self {
        Self::new(DEFAULT_CO2_PATH, DEFAULT_TEMPERATURE_PATH)
    }
}

impl MeasurementSink for FileSink {
    fn publish(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        let path = match measurement {
            Measurement::Co2 { .. } => &self.co2_path,
            Measurement::Temperature { .. } => &self.temperature_path,
        };
        Self::write_value(path, &measurement.to_string())
    }

    fn retract(&mut self) -> Result<(), SinkError> {
        // Attempt both even if the first fails.
        let co2 = Self::remove(&self.co2_path);
        let temperature = Self::remove(&self.temperature_path);
        co2.and(temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn sink_in(dir: &tempfile::TempDir) -> FileSink {
        FileSink::new(dir.path().join("co2"), dir.path().join("temp"))
    }

    #[test]
    fn test_publish_writes_formatted_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(&dir);

        sink.publish(&Measurement::Co2 { ppm: 400 }).unwrap();
        sink.publish(&Measurement::Temperature { celsius: 24.4125 })
            .unwrap();

        assert_eq!(fs::read_to_string(sink.co2_path()).unwrap(), "400");
        assert_eq!(fs::read_to_string(sink.temperature_path()).unwrap(), "24.41");

        let mode = fs::metadata(sink.co2_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_publish_truncates_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(&dir);

        sink.publish(&Measurement::Co2 { ppm: 12345 }).unwrap();
        sink.publish(&Measurement::Co2 { ppm: 7 }).unwrap();
        assert_eq!(fs::read_to_string(sink.co2_path()).unwrap(), "7");
    }

    #[test]
    fn test_retract_removes_files_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink_in(&dir);

        sink.publish(&Measurement::Co2 { ppm: 400 }).unwrap();
        sink.retract().unwrap();
        assert!(!sink.co2_path().exists());
        assert!(!sink.temperature_path().exists());

        // Nothing left to remove.
        sink.retract().unwrap();
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("nope/co2"), dir.path().join("nope/temp"));
        let err = sink.publish(&Measurement::Co2 { ppm: 400 }).unwrap_err();
        assert!(matches!(err, SinkError::Write { .. }));
    }
}
