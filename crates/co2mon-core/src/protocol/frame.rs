//! Raw report, arming key and protocol variant types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{FEATURE_REPORT_ID, FEATURE_REPORT_LEN, FRAME_LEN, KEY_LEN};

/// One 8-byte input report exactly as read from the device.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawFrame([u8; FRAME_LEN]);

impl RawFrame {
    pub const fn new(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Accept a read only if it is exactly one report long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; FRAME_LEN]>::try_from(bytes).ok().map(Self)
    }

    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame(")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02X}")?;
        }
        write!(f, ")")
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Arming key must be {expected} hex digits, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("Invalid hex digit {0:?} in arming key")]
    BadDigit(char),
}

/// Key sent in the arming feature report.
///
/// The plain firmware only needs the report to be sent; the encrypting
/// firmware also XORs its reports against these bytes.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArmingKey([u8; KEY_LEN]);

impl ArmingKey {
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// hidraw feature report: report number followed by the key.
    pub fn feature_report(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut report = [0u8; FEATURE_REPORT_LEN];
        report[0] = FEATURE_REPORT_ID;
        report[1..].copy_from_slice(&self.0);
        report
    }
}

impl fmt::Debug for ArmingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArmingKey({self})")
    }
}

impl fmt::Display for ArmingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<hex::FromHexError> for KeyParseError {
    fn from(e: hex::FromHexError) -> Self {
        match e {
            hex::FromHexError::InvalidHexCharacter { c, .. } => KeyParseError::BadDigit(c),
            hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
                KeyParseError::BadLength {
                    expected: KEY_LEN * 2,
                    actual: 0,
                }
            }
        }
    }
}

impl FromStr for ArmingKey {
    type Err = KeyParseError;

    /// Parses 16 hex digits. `:`, `-` and whitespace separators are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
            .collect();
        if digits.len() != KEY_LEN * 2 {
            return Err(KeyParseError::BadLength {
                expected: KEY_LEN * 2,
                actual: digits.chars().count(),
            });
        }

        let mut key = [0u8; KEY_LEN];
        hex::decode_to_slice(&digits, &mut key)?;
        Ok(Self(key))
    }
}

impl TryFrom<String> for ArmingKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArmingKey> for String {
    fn from(key: ArmingKey) -> Self {
        key.to_string()
    }
}

/// Which firmware flavour the attached sensor runs.
///
/// There is no reliable way to tell them apart from the wire, so this is
/// always configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVariant {
    /// Reports carry the measurement fields in the clear.
    #[default]
    Plain,
    /// Reports are permuted, keyed and rotated.
    Obfuscated,
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::Plain => write!(f, "plain"),
            ProtocolVariant::Obfuscated => write!(f, "obfuscated"),
        }
    }
}

impl FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(ProtocolVariant::Plain),
            "obfuscated" | "encrypted" => Ok(ProtocolVariant::Obfuscated),
            other => Err(format!(
                "unknown protocol variant '{other}' (expected 'plain' or 'obfuscated')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_requires_exact_length() {
        assert!(RawFrame::from_slice(&[0u8; 8]).is_some());
        assert!(RawFrame::from_slice(&[0u8; 7]).is_none());
        assert!(RawFrame::from_slice(&[0u8; 9]).is_none());
        assert!(RawFrame::from_slice(&[]).is_none());
    }

    #[test]
    fn test_key_parse_and_display() {
        let key: ArmingKey = "c4:c6:c0:92:40:23:dc:96".parse().unwrap();
        assert_eq!(key.bytes(), &[0xC4, 0xC6, 0xC0, 0x92, 0x40, 0x23, 0xDC, 0x96]);
        assert_eq!(key.to_string(), "c4c6c0924023dc96");
    }

    #[test]
    fn test_key_parse_errors() {
        assert_eq!(
            "0011".parse::<ArmingKey>(),
            Err(KeyParseError::BadLength {
                expected: 16,
                actual: 4
            })
        );
        assert_eq!(
            "00112233445566zz".parse::<ArmingKey>(),
            Err(KeyParseError::BadDigit('z'))
        );
        assert_eq!(
            "0011223344556677-".repeat(2).parse::<ArmingKey>(),
            Err(KeyParseError::BadLength {
                expected: 16,
                actual: 32
            })
        );
        assert!(matches!(
            "00112233445566é".parse::<ArmingKey>(),
            Err(KeyParseError::BadDigit(_))
        ));
    }

    #[test]
    fn test_feature_report_layout() {
        let key = ArmingKey::new([1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(key.feature_report(), [0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ArmingKey::default().feature_report(), [0u8; 9]);
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("plain".parse(), Ok(ProtocolVariant::Plain));
        assert_eq!("Obfuscated".parse(), Ok(ProtocolVariant::Obfuscated));
        assert_eq!("encrypted".parse(), Ok(ProtocolVariant::Obfuscated));
        assert!("xor".parse::<ProtocolVariant>().is_err());
    }
}
