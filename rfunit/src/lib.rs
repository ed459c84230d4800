//! # rfunit
//!
//! Protocol engine for the RF unit microcontroller (Nuvoton, I2C address
//! 0x5A) found in Xbox One consoles.
//!
//! This crate provides everything needed to identify the unit, read its
//! firmware metadata, dump its flash and reflash it:
//!
//! - Command codec and status word decoding
//! - Status polling with bounded retry budgets
//! - The bootloader unlock handshake
//! - Chunked flash erase, write and read
//!
//! The engine never talks to a bus directly. It is generic over the
//! [`Transport`] trait and over a [`Delay`] provider, so it runs the same
//! against Linux i2c-dev, a dry-run transport, or a simulated device.
//!
//! ## Features
//!
//! - `native` (default): Linux i2c-dev transport via `nix`
//!
//! ## Example
//!
//! ```rust,no_run
//! use rfunit::{I2cConfig, RfUnit, TransportKind, open_transport};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = open_transport(TransportKind::Linux, &I2cConfig::default())?;
//!     let mut unit = RfUnit::new(bus);
//!     unit.detect()?;
//!
//!     let image = std::fs::read("flash.bin")?;
//!     unit.flash_image(&image, |done, total| {
//!         println!("Writing: {done}/{total}");
//!     })?;
//!
//!     unit.finish()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delay;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
#[cfg(all(feature = "native", target_os = "linux"))]
pub use transport::LinuxI2c;
pub use {
    delay::{Delay, HeartbeatDelay, StdDelay, wait_with_heartbeat},
    device::{
        DeviceInfo, FlashDump, FlashRegion, PollOutcome, Poller, RfUnit, RfUnitConfig, Sound,
        WaitPolicy,
    },
    error::{Error, Result, WaitError},
    protocol::{
        Challenge, Command, DEVICE_ADDRESS, DeviceMode, FLASH_SIZE, Opcode, StatusWord,
        UnlockResponse, authenticate,
    },
    transport::{DummyTransport, I2cConfig, Transport, TransportKind, open_transport},
};
