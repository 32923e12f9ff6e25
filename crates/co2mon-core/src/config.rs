//! Monitor configuration file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;
use crate::sink::file::{DEFAULT_CO2_PATH, DEFAULT_TEMPERATURE_PATH};

/// Where measurements go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One file per measurement kind.
    #[default]
    Files,
    /// One line per measurement on stdout.
    Stdout,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Files => write!(f, "files"),
            OutputMode::Stdout => write!(f, "stdout"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "files" | "file" => Ok(OutputMode::Files),
            "stdout" => Ok(OutputMode::Stdout),
            other => Err(format!(
                "unknown output mode '{other}' (expected 'files' or 'stdout')"
            )),
        }
    }
}

/// Output section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    /// File holding the latest CO2 ppm value.
    pub co2_path: PathBuf,
    /// File holding the latest temperature in °C.
    pub temperature_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Files,
            co2_path: PathBuf::from(DEFAULT_CO2_PATH),
            temperature_path: PathBuf::from(DEFAULT_TEMPERATURE_PATH),
        }
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub session: SessionConfig,
    pub output: OutputConfig,
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MonitorConfig = toml::from_str(&content)?;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Reject intervals that would turn the presence wait or the stall
    /// detection into a busy loop.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.session.read_timeout_secs > 0,
            "read_timeout_secs must be at least 1"
        );
        ensure!(
            self.session.presence_poll_secs > 0,
            "presence_poll_secs must be at least 1"
        );
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ArmingKey, ProtocolVariant};

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.session.device_path, PathBuf::from("/dev/co2mini0"));
        assert_eq!(config.session.read_timeout_secs, 15);
        assert_eq!(config.session.presence_poll_secs, 30);
        assert_eq!(config.output.co2_path, PathBuf::from("/tmp/co2minimon_co2"));
        assert_eq!(config.output.mode, OutputMode::Files);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [session]
            variant = "obfuscated"
            key = "0102030405060708"
            "#,
        )
        .unwrap();
        assert_eq!(config.session.variant, ProtocolVariant::Obfuscated);
        assert_eq!(
            config.session.key,
            ArmingKey::new([1, 2, 3, 4, 5, 6, 7, 8])
        );
        assert_eq!(config.session.read_timeout_secs, 15);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_bad_key_rejected() {
        let result: Result<MonitorConfig, _> = toml::from_str(
            r#"
            [session]
            key = "xyz"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("co2mon.toml");

        let mut config = MonitorConfig::default();
        config.session.device_path = PathBuf::from("/dev/hidraw3");
        config.session.variant = ProtocolVariant::Obfuscated;
        config.output.mode = OutputMode::Stdout;
        config.save_to_file(&path).unwrap();

        assert_eq!(MonitorConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (field, other) in [
            ("read_timeout_secs", "presence_poll_secs"),
            ("presence_poll_secs", "read_timeout_secs"),
        ] {
            let path = dir.path().join(format!("{field}.toml"));
            std::fs::write(&path, format!("[session]\n{field} = 0\n{other} = 5\n")).unwrap();
            let err = MonitorConfig::load_from_file(&path).unwrap_err();
            assert!(format!("{err:#}").contains(field), "{err:#}");
        }
    }

    #[test]
    fn test_huge_intervals_accepted() {
        let mut config = MonitorConfig::default();
        config.session.read_timeout_secs = u64::MAX;
        config.session.presence_poll_secs = u64::MAX;
        config.validate().unwrap();
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let config: MonitorConfig =
            toml::from_str(include_str!("../../../co2mon.example.toml")).unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_output_mode_from_str() {
        assert_eq!("stdout".parse(), Ok(OutputMode::Stdout));
        assert_eq!("FILES".parse(), Ok(OutputMode::Files));
        assert!("syslog".parse::<OutputMode>().is_err());
    }
}
