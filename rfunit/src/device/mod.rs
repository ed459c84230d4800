//! RF unit controller.
//!
//! [`RfUnit`] composes the codec, status poller, unlock handshake and flash
//! sequencing into the operations a host invokes. It owns its transport
//! exclusively and keeps no cached device mode: every mode decision
//! re-reads the status word.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rfunit::device::{RfUnit, Sound};
//! use rfunit::transport::{I2cConfig, TransportKind, open_transport};
//!
//! fn main() -> rfunit::Result<()> {
//!     let bus = open_transport(TransportKind::Linux, &I2cConfig::default())?;
//!     let mut unit = RfUnit::new(bus);
//!
//!     unit.detect()?;
//!     unit.initialize()?;
//!     unit.stop()?;
//!
//!     let mut dump = Vec::new();
//!     unit.dump_to(&mut dump, |done, total| println!("{done}/{total}"))?;
//!
//!     unit.play_sound(Sound::Bing)?;
//!     Ok(())
//! }
//! ```

pub mod flash;
pub mod poller;
pub mod sound;

use std::io::Write;
use std::time::Duration;

use log::{debug, info, warn};

use crate::delay::{Delay, StdDelay, wait_with_heartbeat};
use crate::error::{Error, Result};
use crate::protocol::command::{Command, decode};
use crate::protocol::status::{LDROM, READY};
use crate::protocol::{
    Challenge, DEVICE_ADDRESS, DeviceMode, FLASH_SIZE, STATUS_PREFIX_LEN, StatusWord,
};
use crate::transport::Transport;

pub use flash::{Chunks, FlashDump, FlashRegion};
pub use poller::{PollOutcome, Poller, WaitPolicy};
pub use sound::Sound;

use flash::{Gate, check_write};

/// Register set to 0x01 by [`RfUnit::initialize`].
pub const INIT_CONTROL_REGISTER: u8 = 0x0C;
/// Register set to 0xFFFF by [`RfUnit::initialize`].
pub const INIT_MASK_REGISTER: u8 = 0x04;

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfUnitConfig {
    /// 7-bit bus address the device must answer on.
    pub address: u8,
    /// Gate used after flash commands.
    pub busy: WaitPolicy,
    /// Gate used after mode switches.
    pub status: WaitPolicy,
    /// Fixed wait after the bootloader entry command.
    pub boot_wait: Duration,
    /// Heartbeat interval during `boot_wait`. Zero disables heartbeats.
    pub heartbeat: Duration,
    /// Settle time after the bootloader exit command.
    pub exit_settle: Duration,
}

impl Default for RfUnitConfig {
    fn default() -> Self {
        Self {
            address: DEVICE_ADDRESS,
            busy: WaitPolicy::busy(),
            status: WaitPolicy::status(),
            boot_wait: Duration::from_secs(10),
            heartbeat: Duration::from_secs(1),
            exit_settle: Duration::from_secs(4),
        }
    }
}

impl RfUnitConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device address looked for by [`RfUnit::detect`].
    #[must_use]
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Set the policy for BUSY gates.
    #[must_use]
    pub fn with_busy_policy(mut self, policy: WaitPolicy) -> Self {
        self.busy = policy;
        self
    }

    /// Set the policy for target-status gates.
    #[must_use]
    pub fn with_status_policy(mut self, policy: WaitPolicy) -> Self {
        self.status = policy;
        self
    }

    /// Set the fixed wait after bootloader entry.
    #[must_use]
    pub fn with_boot_wait(mut self, wait: Duration) -> Self {
        self.boot_wait = wait;
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Set the settle time after bootloader exit.
    #[must_use]
    pub fn with_exit_settle(mut self, settle: Duration) -> Self {
        self.exit_settle = settle;
        self
    }
}

/// Snapshot of the device state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Bus address.
    pub address: u8,
    /// Transport name.
    pub transport: String,
    /// Status word at the time of the snapshot.
    pub status: StatusWord,
    /// Execution mode derived from `status`.
    pub mode: DeviceMode,
    /// Firmware version (application mode only).
    pub firmware_version: Option<String>,
    /// Application (VPE) version (application mode only).
    pub application_version: Option<String>,
}

/// RF unit controller.
///
/// Generic over the bus (`T`) and the clock (`D`). Not meant to be shared
/// between threads; one controller per physical device.
pub struct RfUnit<T: Transport, D: Delay = StdDelay> {
    transport: T,
    delay: D,
    poller: Poller,
    config: RfUnitConfig,
}

impl<T: Transport> RfUnit<T> {
    /// Create a controller with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, RfUnitConfig::default())
    }

    /// Create a controller with a custom configuration.
    pub fn with_config(transport: T, config: RfUnitConfig) -> Self {
        Self::with_delay(transport, StdDelay, config)
    }
}

impl<T: Transport, D: Delay> RfUnit<T, D> {
    /// Create a controller with a custom delay provider.
    pub fn with_delay(transport: T, delay: D, config: RfUnitConfig) -> Self {
        Self {
            transport,
            delay,
            poller: Poller::new(),
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RfUnitConfig {
        &self.config
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the controller and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn gate(&mut self) -> Gate<'_, T, D> {
        Gate {
            transport: &mut self.transport,
            delay: &mut self.delay,
            poller: &mut self.poller,
            policy: self.config.busy,
        }
    }

    fn send(&mut self, cmd: &Command) -> Result<()> {
        debug!("send {:?} {:02x?}", cmd.opcode(), cmd.payload());
        self.transport.write(&cmd.build())
    }

    fn query(&mut self, cmd: &Command) -> Result<Vec<u8>> {
        debug!("query {:?} {:02x?}", cmd.opcode(), cmd.payload());
        self.transport.transmit(&cmd.build(), cmd.response_len())
    }

    /// Scan the bus and check that the device answers.
    pub fn detect(&mut self) -> Result<()> {
        let found = self.transport.scan()?;
        debug!("Discovered devices: {found:02x?}");
        if found.contains(&self.config.address) {
            info!(
                "RF unit found at {:#04x} on {}",
                self.config.address,
                self.transport.name()
            );
            Ok(())
        } else {
            Err(Error::DeviceNotDetected {
                address: self.config.address,
            })
        }
    }

    /// Write the fixed init registers.
    pub fn initialize(&mut self) -> Result<()> {
        self.write_register(INIT_CONTROL_REGISTER, &[0x01])?;
        self.write_register(INIT_MASK_REGISTER, &[0xFF, 0xFF])
    }

    /// Send the stop command.
    pub fn stop(&mut self) -> Result<()> {
        self.send(&Command::stop())
    }

    /// Read the status word once.
    pub fn read_status(&mut self) -> Result<StatusWord> {
        poller::read_status(&mut self.transport)
    }

    /// Query the current execution mode.
    pub fn mode(&mut self) -> Result<DeviceMode> {
        Ok(self.read_status()?.mode())
    }

    /// Whether the device is currently running the bootloader.
    pub fn is_bootloader(&mut self) -> Result<bool> {
        Ok(self.read_status()?.is_bootloader())
    }

    /// Firmware version string.
    pub fn read_fw_version(&mut self) -> Result<String> {
        let raw = self.query(&Command::firmware_version())?;
        Ok(crate::protocol::decode_text(&raw))
    }

    /// Application (VPE) version string.
    pub fn read_app_version(&mut self) -> Result<String> {
        let raw = self.query(&Command::application_version())?;
        Ok(crate::protocol::decode_text(&raw))
    }

    /// Last error string reported by the device.
    pub fn read_error_string(&mut self) -> Result<String> {
        poller::read_error_string(&mut self.transport)
    }

    /// Read a raw register. The four returned bytes are not interpreted.
    pub fn read_register(&mut self, register: u8) -> Result<[u8; 4]> {
        let cmd = Command::register_read(register);
        let raw = self.query(&cmd)?;
        let window = decode(&raw, 0..cmd.response_len(), cmd.opcode())?;
        let mut out = [0u8; 4];
        out.copy_from_slice(window);
        Ok(out)
    }

    /// Write raw bytes to a register.
    pub fn write_register(&mut self, register: u8, data: &[u8]) -> Result<()> {
        self.send(&Command::register_write(register, data))
    }

    /// Issue an interrupt read. The device returns no data.
    pub fn read_interrupt(&mut self) -> Result<Vec<u8>> {
        self.query(&Command::interrupt_read())
    }

    /// Read the timer register used as the bootloader challenge.
    pub fn timer_value(&mut self) -> Result<Challenge> {
        let cmd = Command::timer_value();
        let raw = self.query(&cmd)?;
        let window = decode(&raw, STATUS_PREFIX_LEN..cmd.response_len(), cmd.opcode())?;
        let mut challenge = [0u8; 4];
        challenge.copy_from_slice(window);
        Ok(Challenge(challenge))
    }

    /// Run one BUSY gate.
    pub fn wait_busy(&mut self) -> PollOutcome {
        self.poller
            .wait_busy(&mut self.transport, &mut self.delay, &self.config.busy)
    }

    /// Run one target-status gate.
    pub fn wait_for_status(&mut self, target: u8) -> PollOutcome {
        self.poller.wait_for_status(
            &mut self.transport,
            &mut self.delay,
            target,
            &self.config.status,
        )
    }

    /// Switch into the bootloader (LDROM).
    ///
    /// Sends the unlock response, waits the fixed boot delay with periodic
    /// heartbeats, re-initializes and confirms LDROM.
    pub fn enter_bootloader(&mut self) -> Result<()> {
        let challenge = self.timer_value()?;
        let response = challenge.respond();
        debug!("challenge {:02x?} -> response {:#010x}", challenge.0, response.0);
        self.send(&Command::enter_bootloader(response))?;

        info!(
            "Waiting {}s for the bootloader...",
            self.config.boot_wait.as_secs()
        );
        wait_with_heartbeat(
            &mut self.delay,
            self.config.boot_wait,
            self.config.heartbeat,
        );

        self.initialize()?;
        self.stop()?;
        self.wait_for_status(LDROM)
            .into_result()
            .map_err(Error::EnterBootloader)?;
        info!("Device is in LDROM");
        Ok(())
    }

    /// Return to the application firmware (APROM).
    pub fn leave_bootloader(&mut self) -> Result<()> {
        info!("Rebooting into APROM...");
        self.send(&Command::exit_bootloader())?;
        self.delay.delay(self.config.exit_settle);
        self.wait_for_status(READY)
            .into_result()
            .map_err(Error::LeaveBootloader)?;
        info!("Device is in APROM");
        Ok(())
    }

    /// Run the boot repair command and wait for READY.
    pub fn boot_repair(&mut self) -> Result<()> {
        self.send(&Command::boot_repair())?;
        self.wait_for_status(READY)
            .into_result()
            .map_err(Error::BootRepair)?;
        Ok(())
    }

    /// Reset the device.
    pub fn reset(&mut self) -> Result<()> {
        self.send(&Command::reset())
    }

    /// Play a built-in tone.
    pub fn play_sound(&mut self, sound: Sound) -> Result<()> {
        self.send(&Command::play_sound(sound.number()))
    }

    /// Erase a flash region.
    pub fn erase(&mut self, region: FlashRegion) -> Result<()> {
        self.gate().erase(region)
    }

    /// Write `data` over `region` without checking the device mode.
    pub fn write<F>(&mut self, region: FlashRegion, data: &[u8], mut progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        self.gate().write(region, data, &mut progress)
    }

    /// Write `data` over `region`, requiring bootloader mode.
    pub fn flash<F>(&mut self, region: FlashRegion, data: &[u8], progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        check_write(region, data)?;
        if !self.is_bootloader()? {
            return Err(Error::NotInBootloader);
        }
        self.write(region, data, progress)
    }

    /// Lazily read a flash region.
    pub fn dump(&mut self, region: FlashRegion) -> Result<FlashDump<'_, T>> {
        FlashDump::new(&mut self.transport, region)
    }

    /// Reflash the whole device.
    ///
    /// The image size is checked before any bus traffic. Enters the
    /// bootloader if needed, erases all of flash, then writes the image.
    pub fn flash_image<F>(&mut self, image: &[u8], progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let region = FlashRegion::whole();
        check_write(region, image)?;

        if self.is_bootloader()? {
            info!("Already in LDROM");
        } else {
            info!("Entering LDROM");
            self.enter_bootloader()?;
        }

        self.erase(region)?;
        self.write(region, image, progress)?;
        info!("Flashing complete");
        Ok(())
    }

    /// Stream the whole flash into `writer`.
    ///
    /// Returns the number of bytes written. A failed chunk read ends the
    /// dump with that error.
    pub fn dump_to<W, F>(&mut self, writer: &mut W, mut progress: F) -> Result<usize>
    where
        W: Write + ?Sized,
        F: FnMut(usize, usize),
    {
        let total = FLASH_SIZE as usize;
        let mut written = 0;
        info!("Dumping {total:#x} bytes");
        for chunk in self.dump(FlashRegion::whole())? {
            let chunk = chunk.inspect_err(|e| warn!("Dump stopped at {written:#08x}: {e}"))?;
            writer.write_all(&chunk)?;
            written += chunk.len();
            progress(written, total);
        }
        writer.flush()?;
        info!("Dumping complete");
        Ok(written)
    }

    /// Leave the bootloader if needed, then chime.
    pub fn finish(&mut self) -> Result<()> {
        if self.is_bootloader()? {
            self.leave_bootloader()?;
        }
        self.play_sound(Sound::Bing)
    }

    /// Read status and, in application mode, both version strings.
    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        let status = self.read_status()?;
        let mode = status.mode();
        let (firmware_version, application_version) = match mode {
            DeviceMode::Application => (
                Some(self.read_fw_version()?),
                Some(self.read_app_version()?),
            ),
            DeviceMode::Bootloader => (None, None),
        };
        Ok(DeviceInfo {
            address: self.config.address,
            transport: self.transport.name().to_string(),
            status,
            mode,
            firmware_version,
            application_version,
        })
    }
}
