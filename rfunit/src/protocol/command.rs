//! Command framing and response decoding.
//!
//! ## Frame Format
//!
//! ```text
//! +--------+------------------+
//! | Opcode |     Payload      |
//! +--------+------------------+
//! | 1 byte |  command-defined |
//! +--------+------------------+
//! ```
//!
//! Responses carry a two-byte status prefix followed by the command's data.
//! Integer fields are little-endian.

use std::ops::Range;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Error, Result};
use crate::protocol::STATUS_PREFIX_LEN;
use crate::protocol::auth::UnlockResponse;

/// Response length of text-bearing commands (versions, error string).
pub const TEXT_RESPONSE_LEN: usize = 128;

/// Requested length of a flash read response (status prefix + 6 data bytes).
pub const FLASH_READ_RESPONSE_LEN: usize = 8;

/// Requested length of a timer value response (status prefix + 4 bytes).
pub const TIMER_RESPONSE_LEN: usize = 6;

/// Length of a raw register read response.
pub const REGISTER_RESPONSE_LEN: usize = 4;

/// RF unit opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Read the interrupt state.
    InterruptRead = 0xC0,
    /// Write a register.
    RegisterWrite = 0x48,
    /// Read a register.
    RegisterRead = 0xC1,
    /// Read the firmware version string.
    FirmwareVersion = 0xC2,
    /// Read six bytes of flash.
    FlashRead = 0xC3,
    /// Read the application (VPE) version string.
    ApplicationVersion = 0xC4,
    /// Read the last error string.
    ErrorString = 0xC5,
    /// Read the timer register (bootloader challenge).
    TimerValue = 0xC9,
    /// Enter the bootloader (LDROM) with an unlock response.
    EnterBootloader = 0x4B,
    /// Leave the bootloader and boot the application (APROM).
    ExitBootloader = 0x1B,
    /// Start playing a tone.
    PlaySound = 0x81,
    /// Repair the boot configuration.
    BootRepair = 0x8B,
    /// Stop the current activity.
    Stop = 0x02,
    /// Erase a flash range.
    FlashErase = 0x95,
    /// Write data at the current write address.
    FlashWrite = 0x9A,
    /// Set the flash write address.
    FlashSetWriteAddress = 0x9B,
    /// Reset the device.
    Reset = 0x4A,
}

impl Opcode {
    /// Look up an opcode from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0xC0 => Self::InterruptRead,
            0x48 => Self::RegisterWrite,
            0xC1 => Self::RegisterRead,
            0xC2 => Self::FirmwareVersion,
            0xC3 => Self::FlashRead,
            0xC4 => Self::ApplicationVersion,
            0xC5 => Self::ErrorString,
            0xC9 => Self::TimerValue,
            0x4B => Self::EnterBootloader,
            0x1B => Self::ExitBootloader,
            0x81 => Self::PlaySound,
            0x8B => Self::BootRepair,
            0x02 => Self::Stop,
            0x95 => Self::FlashErase,
            0x9A => Self::FlashWrite,
            0x9B => Self::FlashSetWriteAddress,
            0x4A => Self::Reset,
            _ => return None,
        })
    }
}

/// Command builder.
///
/// A command is an opcode, its payload, and the number of bytes to read back
/// (zero for write-only commands).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    payload: Vec<u8>,
    response_len: usize,
}

impl Command {
    /// Create a write-only command with an empty payload.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
            response_len: 0,
        }
    }

    #[must_use]
    fn with_payload(mut self, payload: &[u8]) -> Self {
        self.payload.extend_from_slice(payload);
        self
    }

    #[must_use]
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    fn with_u32(mut self, value: u32) -> Self {
        self.payload
            .write_u32::<LittleEndian>(value)
            .unwrap();
        self
    }

    #[must_use]
    fn expecting(mut self, response_len: usize) -> Self {
        self.response_len = response_len;
        self
    }

    /// Interrupt read (no data returned on the wire).
    pub fn interrupt_read() -> Self {
        Self::new(Opcode::InterruptRead)
    }

    /// Raw register read.
    pub fn register_read(register: u8) -> Self {
        Self::new(Opcode::RegisterRead)
            .with_payload(&[register])
            .expecting(REGISTER_RESPONSE_LEN)
    }

    /// Raw register write.
    pub fn register_write(register: u8, data: &[u8]) -> Self {
        Self::new(Opcode::RegisterWrite)
            .with_payload(&[register])
            .with_payload(data)
    }

    /// Firmware version string.
    pub fn firmware_version() -> Self {
        Self::new(Opcode::FirmwareVersion).expecting(TEXT_RESPONSE_LEN)
    }

    /// Application (VPE) version string.
    pub fn application_version() -> Self {
        Self::new(Opcode::ApplicationVersion).expecting(TEXT_RESPONSE_LEN)
    }

    /// Last error string.
    pub fn error_string() -> Self {
        Self::new(Opcode::ErrorString).expecting(TEXT_RESPONSE_LEN)
    }

    /// Read six bytes of flash at `addr`.
    pub fn flash_read(addr: u32) -> Self {
        Self::new(Opcode::FlashRead)
            .with_u32(addr)
            .expecting(FLASH_READ_RESPONSE_LEN)
    }

    /// Timer register value, used as the bootloader challenge.
    pub fn timer_value() -> Self {
        Self::new(Opcode::TimerValue).expecting(TIMER_RESPONSE_LEN)
    }

    /// Bootloader entry carrying the unlock response.
    pub fn enter_bootloader(response: UnlockResponse) -> Self {
        Self::new(Opcode::EnterBootloader).with_payload(&response.to_bytes())
    }

    /// Leave the bootloader and boot the application firmware.
    pub fn exit_bootloader() -> Self {
        Self::new(Opcode::ExitBootloader)
    }

    /// Play tone number `sound`.
    pub fn play_sound(sound: u8) -> Self {
        Self::new(Opcode::PlaySound).with_payload(&[sound])
    }

    /// Boot repair.
    pub fn boot_repair() -> Self {
        Self::new(Opcode::BootRepair).with_payload(&[0x01, 0x01, 0x01])
    }

    /// Stop.
    pub fn stop() -> Self {
        Self::new(Opcode::Stop)
    }

    /// Erase `len` bytes of flash starting at `addr`.
    pub fn flash_erase(addr: u32, len: u32) -> Self {
        Self::new(Opcode::FlashErase).with_u32(addr).with_u32(len)
    }

    /// Set the absolute address of the next data write.
    pub fn flash_set_write_address(addr: u32) -> Self {
        Self::new(Opcode::FlashSetWriteAddress).with_u32(addr)
    }

    /// Write raw chunk bytes at the current write address.
    pub fn flash_write(data: &[u8]) -> Self {
        Self::new(Opcode::FlashWrite).with_payload(data)
    }

    /// Reset the device.
    pub fn reset() -> Self {
        Self::new(Opcode::Reset).with_payload(&[0x55, 0x01])
    }

    /// Build the bytes sent on the wire.
    pub fn build(&self) -> Vec<u8> {
        encode(self.opcode as u8, &self.payload)
    }

    /// Get the opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Get the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of bytes to read back (zero for write-only commands).
    pub fn response_len(&self) -> usize {
        self.response_len
    }
}

/// Concatenate opcode and payload into a frame.
pub fn encode(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(opcode);
    buf.extend_from_slice(payload);
    buf
}

/// Slice the documented data window out of a raw response.
///
/// Some transports return more bytes than requested, so the window is taken
/// by offset rather than assuming the response has exactly the requested
/// length. A response too short to cover the window is an error.
pub fn decode(raw: &[u8], window: Range<usize>, opcode: Opcode) -> Result<&[u8]> {
    raw.get(window.clone())
        .ok_or_else(|| Error::ShortResponse {
            opcode: opcode as u8,
            expected: window.end,
            actual: raw.len(),
        })
}

/// Decode a text-bearing response.
///
/// Skips the status prefix and stops at the first null byte (or the end of
/// the response when there is none).
pub fn decode_text(raw: &[u8]) -> String {
    let body = raw.get(STATUS_PREFIX_LEN..).unwrap_or_default();
    let end = body
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(body.len());
    String::from_utf8_lossy(&body[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_has_no_framing() {
        assert_eq!(encode(0x02, &[]), vec![0x02]);
        assert_eq!(encode(0x81, &[0x01]), vec![0x81, 0x01]);
    }

    #[test]
    fn test_flash_read_frame() {
        let cmd = Command::flash_read(0x0002_4000);
        assert_eq!(cmd.build(), vec![0xC3, 0x00, 0x40, 0x02, 0x00]);
        assert_eq!(cmd.response_len(), 8);
    }

    #[test]
    fn test_erase_frame() {
        let cmd = Command::flash_erase(0, 0x24400);
        assert_eq!(
            cmd.build(),
            vec![0x95, 0x00, 0x00, 0x00, 0x00, 0x00, 0x44, 0x02, 0x00]
        );
        assert_eq!(cmd.response_len(), 0);
    }

    #[test]
    fn test_fixed_frames() {
        assert_eq!(Command::reset().build(), vec![0x4A, 0x55, 0x01]);
        assert_eq!(Command::boot_repair().build(), vec![0x8B, 1, 1, 1]);
        assert_eq!(Command::stop().build(), vec![0x02]);
        assert_eq!(Command::exit_bootloader().build(), vec![0x1B]);
        assert_eq!(
            Command::register_write(0x04, &[0xFF, 0xFF]).build(),
            vec![0x48, 0x04, 0xFF, 0xFF]
        );
        assert_eq!(Command::register_read(0x0C).build(), vec![0xC1, 0x0C]);
        assert_eq!(
            Command::flash_set_write_address(0x80).build(),
            vec![0x9B, 0x80, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_enter_bootloader_carries_response() {
        let resp = UnlockResponse::from_bytes([0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(
            Command::enter_bootloader(resp).build(),
            vec![0x4B, 0xDE, 0xAD, 0xBE, 0xEF]
        );
    }

    #[test]
    fn test_opcode_round_trip_table() {
        for byte in 0..=u8::MAX {
            if let Some(op) = Opcode::from_byte(byte) {
                assert_eq!(op as u8, byte);
            }
        }
        assert_eq!(Opcode::from_byte(0x00), None);
    }

    #[test]
    fn test_decode_tolerates_extra_byte() {
        // Nine bytes back for an eight byte request.
        let raw = [0x80, 0x00, 1, 2, 3, 4, 5, 6, 0xEE];
        let data = decode(&raw, 2..8, Opcode::FlashRead).unwrap();
        assert_eq!(data, &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_decode_short_response() {
        let raw = [0x80, 0x00, 1];
        let err = decode(&raw, 2..8, Opcode::FlashRead).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortResponse {
                opcode: 0xC3,
                expected: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_decode_text() {
        let mut raw = vec![0x80, 0x00];
        raw.extend_from_slice(b"1.0.42\0garbage");
        assert_eq!(decode_text(&raw), "1.0.42");

        // No terminator: whole remainder.
        assert_eq!(decode_text(&[0x80, 0x00, b'o', b'k']), "ok");
        assert_eq!(decode_text(&[0x80]), "");
    }
}
