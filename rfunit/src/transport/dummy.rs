//! Dummy transport for dry runs.

use log::debug;

use crate::error::Result;
use crate::transport::Transport;

/// Transport that pretends the device is present.
///
/// Writes are logged and dropped; every read answers with zero bytes.
#[derive(Debug, Clone)]
pub struct DummyTransport {
    address: u8,
}

impl DummyTransport {
    /// Create a dummy transport reporting `address` on scan.
    pub fn new(address: u8) -> Self {
        Self { address }
    }
}

impl Transport for DummyTransport {
    fn scan(&mut self) -> Result<Vec<u8>> {
        Ok(vec![self.address])
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        debug!("dummy: read {len} bytes");
        Ok(vec![0; len])
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        debug!("dummy: write {data:02x?}");
        Ok(())
    }

    fn transmit(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        debug!("dummy: transmit {data:02x?}, read {len} bytes");
        Ok(vec![0; len])
    }

    fn name(&self) -> &str {
        "dummy"
    }
}
