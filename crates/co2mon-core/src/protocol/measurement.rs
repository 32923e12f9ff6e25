//! Decoded sensor values.

use std::fmt;

use super::constants::{ITEM_CO2, ITEM_TEMPERATURE, KELVIN_OFFSET, TEMPERATURE_SCALE};

/// One value reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// CO2 concentration in ppm.
    Co2 { ppm: u16 },
    /// Ambient temperature in degrees Celsius.
    Temperature { celsius: f64 },
}

impl Measurement {
    /// Build a measurement from an accepted item code and its 16-bit value.
    pub(crate) fn from_item(item: u8, value: u16) -> Option<Self> {
        match item {
            ITEM_CO2 => Some(Measurement::Co2 { ppm: value }),
            ITEM_TEMPERATURE => Some(Measurement::Temperature {
                celsius: f64::from(value) / TEMPERATURE_SCALE - KELVIN_OFFSET,
            }),
            _ => None,
        }
    }

    /// Item code and raw value this measurement is carried as on the wire.
    ///
    /// Temperatures are rounded to the nearest 1/16 K and clamped to the
    /// representable range.
    pub fn to_item(&self) -> (u8, u16) {
        match *self {
            Measurement::Co2 { ppm } => (ITEM_CO2, ppm),
            Measurement::Temperature { celsius } => {
                let raw = ((celsius + KELVIN_OFFSET) * TEMPERATURE_SCALE).round();
                (ITEM_TEMPERATURE, raw.clamp(0.0, f64::from(u16::MAX)) as u16)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Measurement::Co2 { .. } => "co2",
            Measurement::Temperature { .. } => "temperature",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Co2 { ppm } => write!(f, "{ppm}"),
            Measurement::Temperature { celsius } => write!(f, "{celsius:.2}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        // 0x1299 = 4761 -> 297.5625 K
        let m = Measurement::from_item(ITEM_TEMPERATURE, 0x1299).unwrap();
        match m {
            Measurement::Temperature { celsius } => assert!((celsius - 24.4125).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(m.to_string(), "24.41");
    }

    #[test]
    fn test_to_item_inverts_from_item() {
        for raw in [0u16, 1, 0x1299, 0x4444, u16::MAX] {
            let m = Measurement::from_item(ITEM_TEMPERATURE, raw).unwrap();
            assert_eq!(m.to_item(), (ITEM_TEMPERATURE, raw));
        }
        assert_eq!(Measurement::Co2 { ppm: 400 }.to_item(), (ITEM_CO2, 400));
    }

    #[test]
    fn test_unknown_item() {
        assert!(Measurement::from_item(0x6E, 1234).is_none());
    }
}
