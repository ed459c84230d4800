//! Bootloader unlock handshake.
//!
//! Before the device accepts the bootloader entry command it expects a
//! response derived from its timer register. The firmware validates the
//! response with a fixed arithmetic transform, reproduced here:
//!
//! ```text
//! response = 0x219F5 * ((c0 % 11) * 0x200
//!                     + (c1 % 11) * 0x80
//!                     + (c2 % 11) * 0x20
//!                     + (c3 % 11) * 0x8
//!                     + 0x1651)            (mod 2^32, sent little-endian)
//! ```

use byteorder::{ByteOrder, LittleEndian};

const MAGIC_MUL: u32 = 0x219F5;
const MAGIC_ADD: u32 = 0x1651;
const MODULUS: u8 = 11;

/// Per-byte weights, in challenge byte order.
const WEIGHTS: [u32; 4] = [0x200, 0x80, 0x20, 0x8];

/// Four raw bytes read from the timer register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge(pub [u8; 4]);

impl Challenge {
    /// Derive the unlock response for this challenge.
    pub fn respond(&self) -> UnlockResponse {
        let sum = self
            .0
            .iter()
            .zip(WEIGHTS)
            .fold(MAGIC_ADD, |acc, (&byte, weight)| {
                acc.wrapping_add(u32::from(byte % MODULUS).wrapping_mul(weight))
            });
        UnlockResponse(MAGIC_MUL.wrapping_mul(sum))
    }
}

/// Unlock value sent with the bootloader entry command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockResponse(pub u32);

impl UnlockResponse {
    /// Wrap four wire bytes (little-endian).
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(LittleEndian::read_u32(&bytes))
    }

    /// Wire representation (little-endian).
    pub fn to_bytes(self) -> [u8; 4] {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, self.0);
        buf
    }
}

/// Compute the unlock response bytes for a raw challenge.
pub fn authenticate(challenge: [u8; 4]) -> [u8; 4] {
    Challenge(challenge).respond().to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straight evaluation of the documented formula on u64.
    fn reference(c: [u8; 4]) -> u32 {
        let b: Vec<u64> = c.iter().map(|&x| u64::from(x % 11)).collect();
        let r = 0x219F5 * (b[0] * 0x200 + b[1] * 0x80 + b[2] * 0x20 + b[3] * 0x8 + 0x1651);
        (r & 0xFFFF_FFFF) as u32
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(authenticate([0x12, 0x34, 0x56, 0x78]), [0xB5, 0xCE, 0xBD, 0x57]);
        assert_eq!(authenticate([0, 0, 0, 0]), [0x85, 0x44, 0xE5, 0x2E]);
        assert_eq!(authenticate([0xFF; 4]), [0x15, 0x2A, 0x0F, 0x3A]);
        assert_eq!(
            Challenge([10, 10, 10, 10]).respond(),
            UnlockResponse(0x66B6_C055)
        );
    }

    #[test]
    fn test_matches_formula_for_all_byte_values() {
        for a in 0..=u8::MAX {
            for b in [0u8, 11, 37, 200, 255] {
                let c = [a, b, a.wrapping_mul(3), b ^ a];
                assert_eq!(Challenge(c).respond().0, reference(c), "challenge {c:02x?}");
            }
        }
    }

    #[test]
    fn test_is_pure() {
        let c = [0xA1, 0x07, 0x3C, 0xFE];
        assert_eq!(authenticate(c), authenticate(c));
    }

    #[test]
    fn test_only_residues_matter() {
        assert_eq!(authenticate([1, 2, 3, 4]), authenticate([12, 13, 14, 15]));
    }

    #[test]
    fn test_response_bytes_round_trip() {
        let resp = UnlockResponse(0x5A3C_1E0F);
        assert_eq!(resp.to_bytes(), [0x0F, 0x1E, 0x3C, 0x5A]);
        assert_eq!(UnlockResponse::from_bytes(resp.to_bytes()), resp);
    }
}
