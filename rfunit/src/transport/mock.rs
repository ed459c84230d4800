//! In-memory RF unit used by unit tests.

use std::collections::VecDeque;
use std::io;

use crate::error::{Error, Result};
use crate::protocol::{DEVICE_ADDRESS, FLASH_SIZE, Opcode};
use crate::transport::Transport;

/// One scripted answer to a status read.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StatusReply {
    Word(u16),
    BusError,
}

/// Simulated device behind a [`Transport`].
///
/// Status reads pop from a script and fall back to `idle_status` once the
/// script is exhausted. Flash commands operate on an in-memory image.
pub(crate) struct MockTransport {
    pub addresses: Vec<u8>,
    pub script: VecDeque<StatusReply>,
    pub idle_status: u16,
    pub flash: Vec<u8>,
    pub write_address: u32,
    pub writes: Vec<Vec<u8>>,
    pub status_reads: usize,
    pub calls: usize,
    pub fw_version: &'static [u8],
    pub app_version: &'static [u8],
    pub error_string: &'static [u8],
    pub timer: [u8; 4],
    /// Append one junk byte to flash reads, like some USB bridges do.
    pub extra_byte: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            addresses: vec![DEVICE_ADDRESS],
            script: VecDeque::new(),
            idle_status: 0x80,
            flash: vec![0xFF; FLASH_SIZE as usize],
            write_address: 0,
            writes: Vec::new(),
            status_reads: 0,
            calls: 0,
            fw_version: b"FW 1.2.3",
            app_version: b"VPE 4.5",
            error_string: b"flash locked",
            timer: [0x12, 0x34, 0x56, 0x78],
            extra_byte: false,
        }
    }

    pub fn with_statuses(words: &[u16]) -> Self {
        let mut mock = Self::new();
        mock.script = words.iter().copied().map(StatusReply::Word).collect();
        mock
    }

    pub fn with_pattern() -> Self {
        let mut mock = Self::new();
        mock.flash = pattern(FLASH_SIZE as usize);
        mock
    }

    fn text(body: &[u8]) -> Vec<u8> {
        let mut resp = vec![0x80, 0x00];
        resp.extend_from_slice(body);
        resp.resize(128, 0);
        resp
    }

    fn flash_window(&self, addr: u32) -> Vec<u8> {
        let start = addr as usize;
        let mut resp = vec![0x80, 0x00];
        resp.extend((start..start + 6).map(|i| self.flash.get(i).copied().unwrap_or(0xFF)));
        if self.extra_byte {
            resp.push(0xEE);
        }
        resp
    }
}

/// Deterministic byte pattern for dump checks.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl Transport for MockTransport {
    fn scan(&mut self) -> Result<Vec<u8>> {
        self.calls += 1;
        Ok(self.addresses.clone())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        self.calls += 1;
        self.status_reads += 1;
        let reply = self
            .script
            .pop_front()
            .unwrap_or(StatusReply::Word(self.idle_status));
        match reply {
            StatusReply::Word(word) => {
                let mut resp = word.to_le_bytes().to_vec();
                resp.resize(len, 0);
                Ok(resp)
            },
            StatusReply::BusError => Err(Error::Io(io::Error::other("arbitration lost"))),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.calls += 1;
        self.writes.push(data.to_vec());
        match data.first().copied() {
            Some(op) if op == Opcode::FlashErase as u8 => {
                let start = le_u32(&data[1..5]) as usize;
                let len = le_u32(&data[5..9]) as usize;
                self.flash[start..start + len].fill(0xFF);
            },
            Some(op) if op == Opcode::FlashSetWriteAddress as u8 => {
                self.write_address = le_u32(&data[1..5]);
            },
            Some(op) if op == Opcode::FlashWrite as u8 => {
                let start = self.write_address as usize;
                self.flash[start..start + data.len() - 1].copy_from_slice(&data[1..]);
            },
            _ => {},
        }
        Ok(())
    }

    fn transmit(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        self.calls += 1;
        self.writes.push(data.to_vec());
        let resp = match Opcode::from_byte(data[0]) {
            Some(Opcode::FlashRead) => self.flash_window(le_u32(&data[1..5])),
            Some(Opcode::FirmwareVersion) => Self::text(self.fw_version),
            Some(Opcode::ApplicationVersion) => Self::text(self.app_version),
            Some(Opcode::ErrorString) => Self::text(self.error_string),
            Some(Opcode::TimerValue) => {
                let mut resp = vec![0x80, 0x00];
                resp.extend_from_slice(&self.timer);
                resp
            },
            Some(Opcode::RegisterRead) => vec![data[1], 0xAA, 0xBB, 0xCC],
            _ => vec![0; len],
        };
        Ok(resp)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
