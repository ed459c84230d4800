//! RF unit wire protocol.
//!
//! The protocol is a bare opcode + payload exchange on the bus: no length
//! prefix, no checksum. Every response starts with a two-byte status prefix,
//! and each command has a fixed response length known up front.
//!
//! - [`command`]: opcode table, command builders and response decoding
//! - [`status`]: status word flags and mode queries
//! - [`auth`]: challenge-response transform that unlocks the bootloader

pub mod auth;
pub mod command;
pub mod status;

pub use auth::{Challenge, UnlockResponse, authenticate};
pub use command::{Command, Opcode, decode, decode_text, encode};
pub use status::{DeviceMode, StatusWord};

/// Fixed 7-bit bus address of the RF unit.
pub const DEVICE_ADDRESS: u8 = 0x5A;

/// Size of the application flash (145 KiB), starting at offset 0.
pub const FLASH_SIZE: u32 = 0x24400;

/// Bytes returned per flash read command.
pub const READ_CHUNK_SIZE: u32 = 6;

/// Bytes carried per flash write command.
pub const WRITE_CHUNK_SIZE: u32 = 0x80;

/// Length of the status prefix on every response.
pub const STATUS_PREFIX_LEN: usize = 2;
