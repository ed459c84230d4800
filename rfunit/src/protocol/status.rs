//! Status word decoding.
//!
//! The device answers a plain two-byte read with its status word
//! (little-endian). Only the low byte carries flags.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

/// Device is idle and ready for a command.
pub const READY: u8 = 0x80;
/// Last command failed. Always set while in LDROM, where it means nothing.
pub const ERROR: u8 = 0x04;
/// Device is running the bootloader (LDROM). Two bits, both must be set.
pub const LDROM: u8 = 0x0C;
/// Command in progress.
pub const BUSY: u8 = 0x10;
/// Transient value seen while switching into LDROM.
pub const BOOT_LDROM_IN_PROGRESS: u8 = 0x88;

/// Execution mode of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMode {
    /// Application firmware (APROM).
    Application,
    /// Bootloader (LDROM), accepts flash writes.
    Bootloader,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => write!(f, "APROM"),
            Self::Bootloader => write!(f, "LDROM"),
        }
    }
}

/// 16-bit status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusWord(pub u16);

impl StatusWord {
    /// Decode from the first two bytes of a status read.
    ///
    /// Returns `None` when fewer than two bytes are available.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        raw.get(..2).map(|b| Self(LittleEndian::read_u16(b)))
    }

    /// Low byte, the only part that carries flags.
    pub fn flags(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    fn has(self, mask: u8) -> bool {
        self.flags() & mask == mask
    }

    /// Device is ready.
    pub fn is_ready(self) -> bool {
        self.has(READY)
    }

    /// Command in progress.
    pub fn is_busy(self) -> bool {
        self.has(BUSY)
    }

    /// Device runs the bootloader.
    pub fn is_bootloader(self) -> bool {
        self.has(LDROM)
    }

    /// ERROR flag outside LDROM, i.e. a real fault.
    pub fn is_fault(self) -> bool {
        self.has(ERROR) && !self.is_bootloader()
    }

    /// Transient LDROM switch marker.
    pub fn is_boot_in_progress(self) -> bool {
        self.flags() == BOOT_LDROM_IN_PROGRESS
    }

    /// All bits of `target` are set.
    pub fn satisfies(self, target: u8) -> bool {
        self.has(target)
    }

    /// Mode derived from the LDROM bits.
    pub fn mode(self) -> DeviceMode {
        if self.is_bootloader() {
            DeviceMode::Bootloader
        } else {
            DeviceMode::Application
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.is_ready() {
            names.push("READY");
        }
        if self.is_busy() {
            names.push("BUSY");
        }
        if self.is_bootloader() {
            names.push("LDROM");
        } else if self.has(ERROR) {
            names.push("ERROR");
        }
        write!(f, "{:#04x} [{}]", self.flags(), names.join("|"))
    }
}
