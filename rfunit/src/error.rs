//! Error types for rfunit.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for rfunit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a status wait did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// ERROR flag outside bootloader mode, or a status value the wait does
    /// not recognize.
    Fault {
        /// Low status byte that ended the wait.
        status: u8,
        /// Error string read back from the device, when it could be fetched.
        message: Option<String>,
    },
    /// Retry budget exhausted.
    Timeout {
        /// Counted polls performed before giving up.
        retries: u32,
    },
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault {
                status,
                message: Some(msg),
            } => write!(f, "device fault (status {status:#04x}): {msg}"),
            Self::Fault {
                status,
                message: None,
            } => write!(f, "device fault (status {status:#04x})"),
            Self::Timeout { retries } => write!(f, "timed out after {retries} polls"),
        }
    }
}

impl std::error::Error for WaitError {}

/// Error type for rfunit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bus I/O error reported by the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport returned fewer bytes than the response window needs.
    #[error("Short response to command {opcode:#04x}: expected {expected} bytes, got {actual}")]
    ShortResponse {
        /// Opcode of the command that was answered.
        opcode: u8,
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes actually returned.
        actual: usize,
    },

    /// Bus scan did not find the device address.
    #[error("RF unit not detected at address {address:#04x}")]
    DeviceNotDetected {
        /// Address that was looked for.
        address: u8,
    },

    /// Status poll ended on a fault.
    #[error("Protocol fault (status {status:#04x}){}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    ProtocolFault {
        /// Low status byte that caused the fault.
        status: u8,
        /// Decoded error string, when retrievable.
        message: Option<String>,
    },

    /// Status poll exhausted its retry budget.
    #[error("Timeout after {retries} status polls")]
    Timeout {
        /// Counted polls performed.
        retries: u32,
    },

    /// Supplied image length does not match the required length.
    #[error("Size mismatch: expected {expected:#08x} bytes, got {actual:#08x}")]
    SizeMismatch {
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Region extends past the end of flash.
    #[error("Invalid flash region {start:#08x}+{length:#x} (flash size {flash_size:#08x})")]
    InvalidRegion {
        /// Region start offset.
        start: u32,
        /// Region length.
        length: u32,
        /// Total flash size.
        flash_size: u32,
    },

    /// Flash writes require bootloader mode.
    #[error("Device is not in bootloader mode")]
    NotInBootloader,

    /// Bootloader entry did not reach LDROM.
    #[error("Failed to enter bootloader: {0}")]
    EnterBootloader(WaitError),

    /// Returning to application firmware did not report READY.
    #[error("Failed to boot back into application firmware: {0}")]
    LeaveBootloader(WaitError),

    /// Boot repair did not report READY.
    #[error("Boot repair failed: {0}")]
    BootRepair(WaitError),

    /// Flash erase did not complete.
    #[error("Flash erase failed: {0}")]
    Erase(WaitError),

    /// A write chunk did not complete.
    #[error("Flash write failed at {address:#08x}: {source}")]
    Write {
        /// Absolute flash offset of the failing chunk.
        address: u32,
        /// Gate that failed.
        source: WaitError,
    },

    /// Invalid input value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<WaitError> for Error {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Fault { status, message } => Self::ProtocolFault { status, message },
            WaitError::Timeout { retries } => Self::Timeout { retries },
        }
    }
}

impl Error {
    /// Result code for this failure class.
    ///
    /// Codes are stable so callers can map a failure to a remediation
    /// without inspecting the error value itself.
    pub fn code(&self) -> u8 {
        match self {
            Self::DeviceNotDetected { .. } => 1,
            Self::SizeMismatch { .. } => 2,
            Self::EnterBootloader(_) | Self::NotInBootloader => 4,
            Self::Erase(_) => 5,
            Self::Write { .. } => 6,
            Self::LeaveBootloader(_) => 7,
            Self::Io(_) | Self::ShortResponse { .. } => 8,
            Self::ProtocolFault { .. } | Self::Timeout { .. } => 9,
            Self::BootRepair(_) => 10,
            Self::InvalidRegion { .. } | Self::InvalidInput(_) => 11,
        }
    }

    /// Whether this error came from the bus rather than the device state.
    ///
    /// The status poller retries these silently.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ShortResponse { .. })
    }

    /// Error string carried by a device fault, if any.
    pub fn device_message(&self) -> Option<&str> {
        match self {
            Self::ProtocolFault { message, .. }
            | Self::EnterBootloader(WaitError::Fault { message, .. })
            | Self::LeaveBootloader(WaitError::Fault { message, .. })
            | Self::BootRepair(WaitError::Fault { message, .. })
            | Self::Erase(WaitError::Fault { message, .. })
            | Self::Write {
                source: WaitError::Fault { message, .. },
                ..
            } => message.as_deref(),
            _ => None,
        }
    }
}
