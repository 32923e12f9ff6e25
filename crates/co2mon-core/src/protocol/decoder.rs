//! Frame validation and decoding.
//!
//! Everything here is a pure function of its inputs. Rejected frames are
//! routine (the device emits items we do not track, and partial reads happen),
//! so rejection is a value, never an error.

use byteorder::{BigEndian, ByteOrder};

use super::constants::{
    FRAME_LEN, FRAME_TERMINATOR, ITEM_CO2, ITEM_TEMPERATURE, OBFUSCATION_WORD, PERMUTATION_PAIRS,
};
use super::frame::{ArmingKey, ProtocolVariant, RawFrame};
use super::measurement::Measurement;

/// Why a frame produced no measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Byte 4 is not `0x0D`.
    BadTerminator(u8),
    /// Byte 0 is neither temperature nor CO2.
    UnknownItem(u8),
    /// Bytes 0..3 do not sum to byte 3.
    BadChecksum { expected: u8, actual: u8 },
}

/// Outcome of inspecting one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameVerdict {
    Accepted(Measurement),
    Rejected(RejectReason),
}

/// Validate a raw report and extract its measurement, if any.
pub fn validate_and_decode(
    raw: &RawFrame,
    key: &ArmingKey,
    variant: ProtocolVariant,
) -> Option<Measurement> {
    match inspect(raw, key, variant) {
        FrameVerdict::Accepted(m) => Some(m),
        FrameVerdict::Rejected(_) => None,
    }
}

/// Like [`validate_and_decode`], but reports the rejection reason.
pub fn inspect(raw: &RawFrame, key: &ArmingKey, variant: ProtocolVariant) -> FrameVerdict {
    let decoded = match variant {
        ProtocolVariant::Plain => *raw,
        ProtocolVariant::Obfuscated => deobfuscate(raw, key),
    };
    let b = decoded.bytes();
    let (item, msb, lsb, checksum, terminator) = (b[0], b[1], b[2], b[3], b[4]);

    if terminator != FRAME_TERMINATOR {
        return FrameVerdict::Rejected(RejectReason::BadTerminator(terminator));
    }
    if item != ITEM_TEMPERATURE && item != ITEM_CO2 {
        return FrameVerdict::Rejected(RejectReason::UnknownItem(item));
    }
    let expected = checksum_of(item, msb, lsb);
    if expected != checksum {
        return FrameVerdict::Rejected(RejectReason::BadChecksum {
            expected,
            actual: checksum,
        });
    }

    let value = BigEndian::read_u16(&b[1..3]);
    match Measurement::from_item(item, value) {
        Some(m) => FrameVerdict::Accepted(m),
        None => FrameVerdict::Rejected(RejectReason::UnknownItem(item)),
    }
}

/// Sum of item and value bytes, modulo 256.
pub fn checksum_of(item: u8, msb: u8, lsb: u8) -> u8 {
    item.wrapping_add(msb).wrapping_add(lsb)
}

/// Undo the encrypting firmware's transform.
///
/// permute, XOR with the key, rotate the 64-bit big-endian stream right by
/// three bits, subtract the nibble-swapped constant word.
pub fn deobfuscate(raw: &RawFrame, key: &ArmingKey) -> RawFrame {
    let permuted = permute(raw.bytes());

    let mut keyed = [0u8; FRAME_LEN];
    for (i, b) in keyed.iter_mut().enumerate() {
        *b = permuted[i] ^ key.bytes()[i];
    }

    let mut rotated = [0u8; FRAME_LEN];
    for (i, b) in rotated.iter_mut().enumerate() {
        *b = (keyed[i] >> 3) | (keyed[(i + FRAME_LEN - 1) % FRAME_LEN] << 5);
    }

    let mut out = [0u8; FRAME_LEN];
    for (i, b) in out.iter_mut().enumerate() {
        *b = rotated[i].wrapping_sub(OBFUSCATION_WORD[i].rotate_left(4));
    }
    RawFrame::new(out)
}

/// Inverse of [`deobfuscate`]: what the encrypting firmware would send.
pub fn obfuscate(decoded: &RawFrame, key: &ArmingKey) -> RawFrame {
    let d = decoded.bytes();

    let mut rotated = [0u8; FRAME_LEN];
    for (i, b) in rotated.iter_mut().enumerate() {
        *b = d[i].wrapping_add(OBFUSCATION_WORD[i].rotate_left(4));
    }

    let mut keyed = [0u8; FRAME_LEN];
    for (i, b) in keyed.iter_mut().enumerate() {
        *b = (rotated[i] << 3) | (rotated[(i + 1) % FRAME_LEN] >> 5);
    }

    for (i, b) in keyed.iter_mut().enumerate() {
        *b ^= key.bytes()[i];
    }
    RawFrame::new(permute(&keyed))
}

/// Build the report a plain-firmware device sends for `m`.
pub fn encode_plain(m: &Measurement) -> RawFrame {
    let (item, value) = m.to_item();
    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = item;
    BigEndian::write_u16(&mut bytes[1..3], value);
    bytes[3] = checksum_of(item, bytes[1], bytes[2]);
    bytes[4] = FRAME_TERMINATOR;
    RawFrame::new(bytes)
}

/// Build the report the given firmware variant sends for `m`.
pub fn encode(m: &Measurement, key: &ArmingKey, variant: ProtocolVariant) -> RawFrame {
    let plain = encode_plain(m);
    match variant {
        ProtocolVariant::Plain => plain,
        ProtocolVariant::Obfuscated => obfuscate(&plain, key),
    }
}

// Pair swaps, so the permutation is its own inverse.
fn permute(bytes: &[u8; FRAME_LEN]) -> [u8; FRAME_LEN] {
    let mut out = *bytes;
    for (a, b) in PERMUTATION_PAIRS {
        out.swap(a, b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CO2_400: [u8; 8] = [0x50, 0x01, 0x90, 0xE1, 0x0D, 0x00, 0x00, 0x00];

    #[test]
    fn test_plain_co2() {
        let m = validate_and_decode(
            &RawFrame::new(CO2_400),
            &ArmingKey::default(),
            ProtocolVariant::Plain,
        );
        assert_eq!(m, Some(Measurement::Co2 { ppm: 400 }));
    }

    #[test]
    fn test_plain_temperature() {
        let frame = RawFrame::new([0x42, 0x12, 0x99, 0xED, 0x0D, 0x00, 0x00, 0x00]);
        match validate_and_decode(&frame, &ArmingKey::default(), ProtocolVariant::Plain) {
            Some(Measurement::Temperature { celsius }) => {
                assert!((celsius - 24.4125).abs() < 1e-9)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rejections() {
        let key = ArmingKey::default();

        let mut bad_term = CO2_400;
        bad_term[4] = 0x0A;
        assert_eq!(
            inspect(&RawFrame::new(bad_term), &key, ProtocolVariant::Plain),
            FrameVerdict::Rejected(RejectReason::BadTerminator(0x0A))
        );

        let unknown = [0x6E, 0x30, 0x2D, 0xCB, 0x0D, 0, 0, 0];
        assert_eq!(
            inspect(&RawFrame::new(unknown), &key, ProtocolVariant::Plain),
            FrameVerdict::Rejected(RejectReason::UnknownItem(0x6E))
        );

        let mut bad_sum = CO2_400;
        bad_sum[3] ^= 0x01;
        assert_eq!(
            inspect(&RawFrame::new(bad_sum), &key, ProtocolVariant::Plain),
            FrameVerdict::Rejected(RejectReason::BadChecksum {
                expected: 0xE1,
                actual: 0xE0
            })
        );
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum_of(0x50, 0xFF, 0xFF), 0x4E);
    }

    #[test]
    fn test_permutation_is_involution() {
        let bytes = [0, 1, 2, 3, 4, 5, 6, 7];
        assert_eq!(permute(&bytes), [2, 4, 0, 7, 1, 6, 5, 3]);
        assert_eq!(permute(&permute(&bytes)), bytes);
    }

    #[test]
    fn test_obfuscated_roundtrip_with_key() {
        let key: ArmingKey = "c4c6c0924023dc96".parse().unwrap();
        let m = Measurement::Co2 { ppm: 1234 };
        let wire = encode(&m, &key, ProtocolVariant::Obfuscated);
        assert_ne!(wire, encode_plain(&m));
        assert_eq!(
            validate_and_decode(&wire, &key, ProtocolVariant::Obfuscated),
            Some(m)
        );
    }

    #[test]
    fn test_obfuscated_frame_rejected_as_plain() {
        let key = ArmingKey::default();
        let wire = encode(&Measurement::Co2 { ppm: 400 }, &key, ProtocolVariant::Obfuscated);
        assert_eq!(validate_and_decode(&wire, &key, ProtocolVariant::Plain), None);
    }

    #[test]
    fn test_deobfuscate_stages_on_zero_input() {
        // With a zero frame and zero key only the constant word contributes.
        let out = deobfuscate(&RawFrame::new([0u8; 8]), &ArmingKey::default());
        let expected: Vec<u8> = OBFUSCATION_WORD
            .iter()
            .map(|c| 0u8.wrapping_sub(c.rotate_left(4)))
            .collect();
        assert_eq!(out.bytes().as_slice(), expected.as_slice());
    }
}
