//! Flash erase, write and read sequencing.
//!
//! Every state-changing step is gated by [`Poller::wait_busy`]. Reads are
//! exposed as a lazy [`FlashDump`] iterator so callers can stream a dump to
//! disk without buffering the whole image.

use log::{debug, info, trace};

use crate::delay::Delay;
use crate::device::poller::{Poller, WaitPolicy};
use crate::error::{Error, Result, WaitError};
use crate::protocol::command::{Command, decode};
use crate::protocol::{FLASH_SIZE, READ_CHUNK_SIZE, STATUS_PREFIX_LEN, WRITE_CHUNK_SIZE};
use crate::transport::Transport;

/// Data window of a flash read response.
const READ_WINDOW: std::ops::Range<usize> =
    STATUS_PREFIX_LEN..STATUS_PREFIX_LEN + READ_CHUNK_SIZE as usize;

/// A contiguous byte range of flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegion {
    /// Absolute start offset.
    pub start: u32,
    /// Length in bytes.
    pub length: u32,
}

impl FlashRegion {
    /// Create a region. Use [`FlashRegion::validate`] before touching the bus.
    pub const fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// The entire flash.
    pub const fn whole() -> Self {
        Self::new(0, FLASH_SIZE)
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.length)
    }

    /// Whether the region covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Check that the region lies within flash.
    pub fn validate(&self) -> Result<()> {
        match self.start.checked_add(self.length) {
            Some(end) if end <= FLASH_SIZE => Ok(()),
            _ => Err(Error::InvalidRegion {
                start: self.start,
                length: self.length,
                flash_size: FLASH_SIZE,
            }),
        }
    }

    /// Split into `(address, length)` chunks of at most `size` bytes.
    pub fn chunks(&self, size: u32) -> Chunks {
        Chunks {
            next: self.start,
            end: self.end(),
            size: size.max(1),
        }
    }
}

impl Default for FlashRegion {
    fn default() -> Self {
        Self::whole()
    }
}

/// Iterator over the chunk boundaries of a [`FlashRegion`].
///
/// The final chunk is trimmed to the bytes left in the region.
#[derive(Debug, Clone)]
pub struct Chunks {
    next: u32,
    end: u32,
    size: u32,
}

impl Iterator for Chunks {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let addr = self.next;
        let len = self.size.min(self.end - addr);
        self.next = addr + len;
        Some((addr, len))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end.saturating_sub(self.next).div_ceil(self.size) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Chunks {}

/// Read the six data bytes at `address`.
///
/// The response window is sliced by offset, so a transport returning a
/// trailing extra byte is tolerated.
pub fn read_chunk<T: Transport + ?Sized>(transport: &mut T, address: u32) -> Result<Vec<u8>> {
    let cmd = Command::flash_read(address);
    let raw = transport.transmit(&cmd.build(), cmd.response_len())?;
    trace!("flash read {address:#08x}: {raw:02x?}");
    decode(&raw, READ_WINDOW, cmd.opcode()).map(<[u8]>::to_vec)
}

/// Lazy forward-only dump of a flash region.
///
/// Yields one chunk per read command, in ascending address order. The last
/// chunk is trimmed to the region end. After the first error the iterator
/// is fused and yields nothing more, so a short total length marks a
/// partial dump.
pub struct FlashDump<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    chunks: Chunks,
    failed: bool,
}

impl<'a, T: Transport + ?Sized> FlashDump<'a, T> {
    /// Dump `region` through `transport`.
    pub fn new(transport: &'a mut T, region: FlashRegion) -> Result<Self> {
        region.validate()?;
        Ok(Self {
            transport,
            chunks: region.chunks(READ_CHUNK_SIZE),
            failed: false,
        })
    }
}

impl<T: Transport + ?Sized> Iterator for FlashDump<'_, T> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (addr, len) = self.chunks.next()?;
        match read_chunk(self.transport, addr) {
            Ok(mut data) => {
                data.truncate(len as usize);
                Some(Ok(data))
            },
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, self.chunks.size_hint().1)
        }
    }
}

/// Everything a gated flash step needs.
pub(crate) struct Gate<'a, T: ?Sized, D: ?Sized> {
    pub transport: &'a mut T,
    pub delay: &'a mut D,
    pub poller: &'a mut Poller,
    pub policy: WaitPolicy,
}

impl<T, D> Gate<'_, T, D>
where
    T: Transport + ?Sized,
    D: Delay + ?Sized,
{
    /// Send a write-only command and wait for the device to settle.
    fn send(&mut self, cmd: &Command) -> Result<std::result::Result<u32, WaitError>> {
        self.transport.write(&cmd.build())?;
        Ok(self
            .poller
            .wait_busy(self.transport, self.delay, &self.policy)
            .into_result())
    }

    /// Erase `region`.
    pub fn erase(&mut self, region: FlashRegion) -> Result<()> {
        region.validate()?;
        info!(
            "Erasing {:#x} bytes at {:#08x}",
            region.length, region.start
        );
        self.send(&Command::flash_erase(region.start, region.length))?
            .map_err(Error::Erase)?;
        debug!("Erase complete");
        Ok(())
    }

    /// Write `data` over `region` in 0x80-byte chunks.
    ///
    /// Stops at the first chunk whose gate fails and reports that chunk's
    /// absolute address. `progress` receives `(bytes_done, bytes_total)`.
    pub fn write(
        &mut self,
        region: FlashRegion,
        data: &[u8],
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        check_write(region, data)?;
        info!("Writing {:#x} bytes at {:#08x}", data.len(), region.start);

        let mut done = 0;
        for (address, len) in region.chunks(WRITE_CHUNK_SIZE) {
            let chunk = &data[done..done + len as usize];
            trace!("write chunk {address:#08x} ({len} bytes)");

            self.send(&Command::flash_set_write_address(address))?
                .map_err(|source| Error::Write { address, source })?;
            self.send(&Command::flash_write(chunk))?
                .map_err(|source| Error::Write { address, source })?;

            done += chunk.len();
            progress(done, data.len());
        }
        debug!("Write complete");
        Ok(())
    }
}

/// Validate a write request without touching the bus.
pub(crate) fn check_write(region: FlashRegion, data: &[u8]) -> Result<()> {
    region.validate()?;
    if data.len() != region.length as usize {
        return Err(Error::SizeMismatch {
            expected: region.length as usize,
            actual: data.len(),
        });
    }
    Ok(())
}
