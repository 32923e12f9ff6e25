//! Protocol constants for the CO2 mini sensor family.
//!
//! Values come from Henryk Plötz' reverse engineering of the device:
//! <https://hackaday.io/project/5301-reverse-engineering-a-low-cost-usb-co-monitor>

// ============================================================================
// Device Identification
// ============================================================================

/// Holtek Semiconductor Vendor ID
pub const HOLTEK_VENDOR_ID: u16 = 0x04D9;
/// CO2 mini / ZyAura ZG01 Product ID
pub const CO2_MINI_PRODUCT_ID: u16 = 0xA052;

/// Symlink created by the shipped udev rule.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/co2mini0";

// ============================================================================
// Report Layout
// ============================================================================

/// Every input report is exactly 8 bytes.
pub const FRAME_LEN: usize = 8;
/// Length of the arming key carried in the feature report.
pub const KEY_LEN: usize = 8;
/// hidraw report number prefixed to the feature report.
pub const FEATURE_REPORT_ID: u8 = 0x00;
/// Report number plus key.
pub const FEATURE_REPORT_LEN: usize = KEY_LEN + 1;

/// Byte 4 of a valid (decoded) report.
pub const FRAME_TERMINATOR: u8 = 0x0D;

// ============================================================================
// Item Codes (byte 0)
// ============================================================================

/// Ambient temperature, Kelvin * 16.
pub const ITEM_TEMPERATURE: u8 = 0x42;
/// Relative CO2 concentration in ppm.
pub const ITEM_CO2: u8 = 0x50;

// ============================================================================
// Obfuscation
// ============================================================================

/// Fixed word mixed into every report by the encrypting firmware ("Htemp99e").
pub const OBFUSCATION_WORD: [u8; 8] = [0x48, 0x74, 0x65, 0x6D, 0x70, 0x39, 0x39, 0x65];

/// Byte pairs exchanged by the obfuscation permutation.
pub const PERMUTATION_PAIRS: [(usize, usize); 4] = [(0, 2), (1, 4), (3, 7), (5, 6)];

/// Kelvin offset applied after the fixed-point division.
pub const KELVIN_OFFSET: f64 = 273.15;
/// Fixed-point scale of the temperature item.
pub const TEMPERATURE_SCALE: f64 = 16.0;
