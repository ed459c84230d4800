//! Bus transport abstraction.
//!
//! The protocol engine never talks to a concrete bus. It depends on the
//! [`Transport`] trait, which exposes exactly the four primitives the RF unit
//! protocol needs:
//!
//! ```text
//! +------------------+
//! |  RfUnit (device) |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |  Transport trait |  scan / read / write / transmit
//! +--------+---------+
//!          |
//!     +----+-----+
//!     v          v
//! +-------+  +-------+
//! | i2c-dev| | dummy |
//! +-------+  +-------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use rfunit::transport::{I2cConfig, TransportKind, open_transport};
//!
//! fn example() -> rfunit::Result<()> {
//!     let config = I2cConfig::new("/dev/i2c-1");
//!     let mut bus = open_transport(TransportKind::Linux, &config)?;
//!     let found = bus.scan()?;
//!     println!("Devices on bus: {found:02x?}");
//!     Ok(())
//! }
//! ```

pub mod dummy;
#[cfg(all(feature = "native", target_os = "linux"))]
pub mod linux;
#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use crate::error::Result;
use crate::protocol::DEVICE_ADDRESS;

pub use dummy::DummyTransport;
#[cfg(all(feature = "native", target_os = "linux"))]
pub use linux::LinuxI2c;

/// Byte-level access to the device on a two-wire bus.
///
/// Every call is blocking. Implementations do not retry or buffer: any bus
/// fault is returned as an [`Error::Io`] and left to the caller.
pub trait Transport: Send {
    /// List the 7-bit addresses that acknowledge on the bus.
    fn scan(&mut self) -> Result<Vec<u8>>;

    /// Read `len` bytes from the device.
    fn read(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Write `data` to the device.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Write `data`, then read `len` bytes back.
    ///
    /// Some backends return more bytes than requested; callers must slice.
    fn transmit(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        self.write(data)?;
        self.read(len)
    }

    /// Human-readable name of the underlying bus.
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn scan(&mut self) -> Result<Vec<u8>> {
        (**self).scan()
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        (**self).read(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn transmit(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        (**self).transmit(data, len)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Bus configuration.
#[derive(Debug, Clone)]
pub struct I2cConfig {
    /// Bus device path (e.g., "/dev/i2c-1").
    pub device: String,
    /// 7-bit device address.
    pub address: u8,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            device: "/dev/i2c-1".to_string(),
            address: DEVICE_ADDRESS,
        }
    }
}

impl I2cConfig {
    /// Create a configuration for the given bus device.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the device address.
    #[must_use]
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }
}

/// Available transport backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// Linux i2c-dev character device.
    #[default]
    Linux,
    /// Logs writes and answers reads with zeros.
    Dummy,
}

impl TransportKind {
    /// Get the transport kind from a string name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "linux" | "i2c-dev" | "i2cdev" => Some(Self::Linux),
            "dummy" => Some(Self::Dummy),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Dummy => write!(f, "dummy"),
        }
    }
}

/// Open a transport of the given kind.
pub fn open_transport(kind: TransportKind, config: &I2cConfig) -> Result<Box<dyn Transport>> {
    match kind {
        #[cfg(all(feature = "native", target_os = "linux"))]
        TransportKind::Linux => Ok(Box::new(LinuxI2c::open(config)?)),
        #[cfg(not(all(feature = "native", target_os = "linux")))]
        TransportKind::Linux => Err(crate::Error::InvalidInput(format!(
            "i2c-dev transport for {} is not available on this platform",
            config.device
        ))),
        TransportKind::Dummy => Ok(Box::new(DummyTransport::new(config.address))),
    }
}
