//! Linux i2c-dev transport.
//!
//! Talks to the RF unit through `/dev/i2c-N`. The device address is bound to
//! the file descriptor with the `I2C_SLAVE` ioctl, after which plain
//! `read(2)`/`write(2)` calls become bus transactions.
//!
//! # System Requirements
//!
//! - Kernel with `CONFIG_I2C_CHARDEV` (the `i2c-dev` module loaded)
//! - Read/write access to the bus device (usually the `i2c` group)

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::{I2cConfig, Transport};

/// First and last addresses probed by [`LinuxI2c::scan`], skipping the
/// reserved ranges at both ends.
const SCAN_FIRST: u8 = 0x08;
const SCAN_LAST: u8 = 0x77;

/// i2c-dev ioctl constants
mod ioctl {
    use nix::ioctl_write_int_bad;

    /// Bind a 7-bit slave address to the file descriptor.
    const I2C_SLAVE: u16 = 0x0703;

    ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);
}

/// Linux i2c-dev bus handle bound to one device address.
pub struct LinuxI2c {
    file: File,
    name: String,
    address: u8,
}

impl LinuxI2c {
    /// Open the bus device and bind the configured address.
    pub fn open(config: &I2cConfig) -> Result<Self> {
        debug!(
            "i2c-dev: opening {} (address {:#04x})",
            config.device, config.address
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)?;

        let mut bus = Self {
            file,
            name: config.device.clone(),
            address: config.address,
        };
        bus.bind(config.address)?;
        Ok(bus)
    }

    /// Address the handle is currently bound to.
    pub fn address(&self) -> u8 {
        self.address
    }

    #[allow(unsafe_code)]
    fn bind(&mut self, address: u8) -> Result<()> {
        let fd = self.file.as_raw_fd();
        // SAFETY: fd is a valid open i2c-dev descriptor owned by `self.file`,
        // and I2C_SLAVE takes the address by value.
        unsafe { ioctl::i2c_set_slave(fd, address.into()) }.map_err(io::Error::from)?;
        Ok(())
    }

    fn probe(&mut self, address: u8) -> bool {
        if self.bind(address).is_err() {
            return false;
        }
        let mut byte = [0u8; 1];
        matches!(self.file.read(&mut byte), Ok(1))
    }
}

impl Transport for LinuxI2c {
    fn scan(&mut self) -> Result<Vec<u8>> {
        let found: Vec<u8> = (SCAN_FIRST..=SCAN_LAST)
            .filter(|&addr| self.probe(addr))
            .collect();
        self.bind(self.address)?;
        debug!("i2c-dev: scan found {found:02x?}");
        Ok(found)
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        if len == 0 {
            return Ok(buf);
        }
        let n = self.file.read(&mut buf)?;
        if n != len {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short i2c read: {n}/{len} bytes"),
            )));
        }
        trace!("i2c-dev: read {buf:02x?}");
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!("i2c-dev: write {data:02x?}");
        let n = self.file.write(data)?;
        if n != data.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short i2c write: {n}/{} bytes", data.len()),
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let config = I2cConfig::new("/dev/i2c-does-not-exist");
        assert!(matches!(LinuxI2c::open(&config), Err(Error::Io(_))));
    }

    #[test]
    fn test_scan_range_skips_reserved_addresses() {
        assert_eq!(SCAN_FIRST, 0x08);
        assert_eq!(SCAN_LAST, 0x77);
        assert!((SCAN_FIRST..=SCAN_LAST).contains(&crate::protocol::DEVICE_ADDRESS));
    }
}
