//! Status polling.
//!
//! Every state-changing command is gated on a status poll. Two flavours
//! exist, each a bounded loop:
//!
//! - [`Poller::wait_busy`]: done as soon as the device is neither BUSY nor
//!   faulted.
//! - [`Poller::wait_for_status`]: done when every bit of a target mask is
//!   set; any status it does not recognize ends the wait as a fault.
//!
//! ERROR is only a fault outside LDROM: the bootloader keeps the bit set
//! permanently. Bus errors and the transient LDROM-switch marker keep the
//! loop going without consuming its retry budget, but are capped separately
//! so every wait terminates.

use std::time::Duration;

use log::{debug, trace, warn};

use crate::delay::Delay;
use crate::error::{Result, WaitError};
use crate::protocol::command::{Command, decode_text};
use crate::protocol::status::StatusWord;
use crate::transport::Transport;

/// Bytes requested by a status read.
const STATUS_READ_LEN: usize = 2;

/// Retry budget and pacing of one status wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Polls that may observe BUSY before the wait times out.
    pub max_retries: u32,
    /// Sleep after each counted poll.
    pub delay: Duration,
    /// Polls that may end in a bus error or the LDROM-switch marker.
    pub max_uncounted: u32,
    /// Sleep after each uncounted poll.
    pub uncounted_delay: Duration,
}

impl WaitPolicy {
    /// Policy for [`Poller::wait_busy`]: 50 polls, 100 ms apart.
    pub const fn busy() -> Self {
        Self {
            max_retries: 50,
            delay: Duration::from_millis(100),
            max_uncounted: 500,
            uncounted_delay: Duration::from_millis(10),
        }
    }

    /// Policy for [`Poller::wait_for_status`]: 50 polls, 500 ms apart.
    pub const fn status() -> Self {
        Self {
            max_retries: 50,
            delay: Duration::from_millis(500),
            max_uncounted: 500,
            uncounted_delay: Duration::from_millis(10),
        }
    }

    /// Set the counted retry budget.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between counted polls.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Terminal state of a status wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Condition met after `retries` counted polls.
    Satisfied {
        /// Counted polls that observed BUSY first.
        retries: u32,
    },
    /// Fault observed; no further polling.
    Faulted {
        /// Low status byte.
        status: u8,
        /// Error string read back from the device.
        message: Option<String>,
    },
    /// Budget exhausted.
    TimedOut {
        /// Counted polls performed.
        retries: u32,
    },
}

impl PollOutcome {
    /// Whether the wait condition was met.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Convert to a result, keeping fault vs timeout apart.
    pub fn into_result(self) -> std::result::Result<u32, WaitError> {
        match self {
            Self::Satisfied { retries } => Ok(retries),
            Self::Faulted { status, message } => Err(WaitError::Fault { status, message }),
            Self::TimedOut { retries } => Err(WaitError::Timeout { retries }),
        }
    }
}

/// Issue a status read and decode the word.
pub fn read_status<T: Transport + ?Sized>(transport: &mut T) -> Result<StatusWord> {
    let raw = transport.read(STATUS_READ_LEN)?;
    StatusWord::from_bytes(&raw).ok_or_else(|| crate::Error::ShortResponse {
        opcode: 0,
        expected: STATUS_READ_LEN,
        actual: raw.len(),
    })
}

/// Read the device's last error string.
pub fn read_error_string<T: Transport + ?Sized>(transport: &mut T) -> Result<String> {
    let cmd = Command::error_string();
    let raw = transport.transmit(&cmd.build(), cmd.response_len())?;
    Ok(decode_text(&raw))
}

/// What one poll asks the loop to do next.
enum Step {
    Done,
    Fault(StatusWord),
    Count,
    Idle,
}

/// Status poll state machine.
///
/// Holds the last observed status so changes are logged once rather than on
/// every poll. That value never influences the outcome.
#[derive(Debug, Default)]
pub struct Poller {
    last_status: Option<u8>,
}

impl Poller {
    /// Create a poller with no observed status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Low byte of the most recent successful status read.
    pub fn last_status(&self) -> Option<u8> {
        self.last_status
    }

    /// Wait until the device is neither BUSY nor faulted.
    pub fn wait_busy<T, D>(
        &mut self,
        transport: &mut T,
        delay: &mut D,
        policy: &WaitPolicy,
    ) -> PollOutcome
    where
        T: Transport + ?Sized,
        D: Delay + ?Sized,
    {
        self.run("wait_busy", transport, delay, policy, |status| {
            if status.is_busy() {
                Step::Count
            } else if status.is_fault() {
                Step::Fault(status)
            } else if status.is_boot_in_progress() {
                Step::Idle
            } else {
                Step::Done
            }
        })
    }

    /// Wait until every bit of `target` is set in the status byte.
    pub fn wait_for_status<T, D>(
        &mut self,
        transport: &mut T,
        delay: &mut D,
        target: u8,
        policy: &WaitPolicy,
    ) -> PollOutcome
    where
        T: Transport + ?Sized,
        D: Delay + ?Sized,
    {
        self.run("wait_for_status", transport, delay, policy, |status| {
            if status.satisfies(target) {
                Step::Done
            } else if status.is_fault() {
                Step::Fault(status)
            } else if status.is_busy() {
                Step::Count
            } else if status.is_boot_in_progress() {
                Step::Idle
            } else {
                warn!("wait_for_status: unknown status {:#04x}", status.flags());
                Step::Fault(status)
            }
        })
    }

    fn run<T, D>(
        &mut self,
        label: &str,
        transport: &mut T,
        delay: &mut D,
        policy: &WaitPolicy,
        mut classify: impl FnMut(StatusWord) -> Step,
    ) -> PollOutcome
    where
        T: Transport + ?Sized,
        D: Delay + ?Sized,
    {
        let mut retries = 0;
        let mut uncounted = 0;

        while retries < policy.max_retries {
            let step = match read_status(transport) {
                Ok(status) => {
                    self.observe(status);
                    classify(status)
                },
                Err(e) => {
                    trace!("{label}: status read failed (retrying): {e}");
                    Step::Idle
                },
            };

            match step {
                Step::Done => return PollOutcome::Satisfied { retries },
                Step::Fault(status) => return Self::fault(label, transport, status),
                Step::Count => {
                    retries += 1;
                    delay.delay(policy.delay);
                },
                Step::Idle => {
                    uncounted += 1;
                    if uncounted > policy.max_uncounted {
                        break;
                    }
                    delay.delay(policy.uncounted_delay);
                },
            }
        }

        warn!("{label}: timeout after {retries} polls");
        PollOutcome::TimedOut { retries }
    }

    fn observe(&mut self, status: StatusWord) {
        let flags = status.flags();
        if self.last_status != Some(flags) {
            debug!("status: {status}");
            self.last_status = Some(flags);
        }
    }

    fn fault<T: Transport + ?Sized>(label: &str, transport: &mut T, status: StatusWord) -> PollOutcome {
        let message = match read_error_string(transport) {
            Ok(msg) => Some(msg),
            Err(e) => {
                debug!("{label}: could not read error string: {e}");
                None
            },
        };
        warn!(
            "{label}: got error status {}: {}",
            status,
            message.as_deref().unwrap_or("<unavailable>")
        );
        PollOutcome::Faulted {
            status: status.flags(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::mock::MockDelay;
    use crate::protocol::status::{BOOT_LDROM_IN_PROGRESS, BUSY, ERROR, LDROM, READY};
    use crate::transport::mock::{MockTransport, StatusReply};

    fn word(flags: u8) -> u16 {
        u16::from(flags)
    }

    #[test]
    fn test_wait_busy_three_busy_then_ready() {
        let mut bus = MockTransport::with_statuses(&[0x10, 0x10, 0x10, 0x80]);
        let mut delay = MockDelay::default();
        let outcome = Poller::new().wait_busy(&mut bus, &mut delay, &WaitPolicy::busy());

        assert_eq!(outcome, PollOutcome::Satisfied { retries: 3 });
        assert_eq!(delay.elapsed, Duration::from_millis(300));
        assert_eq!(bus.status_reads, 4);
    }

    #[test]
    fn test_wait_busy_times_out_when_always_busy() {
        let mut bus = MockTransport::new();
        bus.idle_status = word(BUSY);
        let mut delay = MockDelay::default();
        let outcome = Poller::new().wait_busy(&mut bus, &mut delay, &WaitPolicy::busy());

        assert_eq!(outcome, PollOutcome::TimedOut { retries: 50 });
        assert_eq!(bus.status_reads, 50);
        assert_eq!(delay.elapsed, Duration::from_secs(5));
    }

    #[test]
    fn test_wait_for_status_times_out_when_always_busy() {
        let mut bus = MockTransport::new();
        bus.idle_status = word(BUSY);
        let mut delay = MockDelay::default();
        let outcome =
            Poller::new().wait_for_status(&mut bus, &mut delay, READY, &WaitPolicy::status());

        assert_eq!(outcome, PollOutcome::TimedOut { retries: 50 });
        assert_eq!(delay.elapsed, Duration::from_secs(25));
    }

    #[test]
    fn test_wait_busy_fault_reads_error_string() {
        let mut bus = MockTransport::with_statuses(&[word(BUSY), word(READY | ERROR)]);
        let mut delay = MockDelay::default();
        let outcome = Poller::new().wait_busy(&mut bus, &mut delay, &WaitPolicy::busy());

        assert_eq!(
            outcome,
            PollOutcome::Faulted {
                status: READY | ERROR,
                message: Some("flash locked".into()),
            }
        );
        assert_eq!(bus.writes.last().unwrap(), &vec![0xC5]);
    }

    #[test]
    fn test_error_in_ldrom_never_faults() {
        let mut bus = MockTransport::new();
        bus.idle_status = word(LDROM | ERROR);
        let mut delay = MockDelay::default();
        let mut poller = Poller::new();

        let outcome = poller.wait_for_status(&mut bus, &mut delay, LDROM, &WaitPolicy::status());
        assert_eq!(outcome, PollOutcome::Satisfied { retries: 0 });
        assert_eq!(bus.status_reads, 1);

        let outcome = poller.wait_busy(&mut bus, &mut delay, &WaitPolicy::busy());
        assert!(outcome.is_satisfied());
        assert_eq!(delay.elapsed, Duration::ZERO);
    }

    #[test]
    fn test_wait_for_status_unknown_status_faults_immediately() {
        let mut bus = MockTransport::with_statuses(&[0x00]);
        let mut delay = MockDelay::default();
        let outcome =
            Poller::new().wait_for_status(&mut bus, &mut delay, READY, &WaitPolicy::status());

        assert!(matches!(outcome, PollOutcome::Faulted { status: 0x00, .. }));
        assert_eq!(bus.status_reads, 1);
    }

    #[test]
    fn test_boot_in_progress_does_not_count() {
        let mut script = vec![word(BOOT_LDROM_IN_PROGRESS); 120];
        script.push(word(LDROM));
        let mut bus = MockTransport::with_statuses(&script);
        let mut delay = MockDelay::default();
        let outcome =
            Poller::new().wait_for_status(&mut bus, &mut delay, LDROM, &WaitPolicy::status());

        // 120 polls would blow a 50 poll budget if they were counted.
        assert_eq!(outcome, PollOutcome::Satisfied { retries: 0 });
    }

    #[test]
    fn test_bus_errors_are_swallowed() {
        let mut bus = MockTransport::new();
        bus.script = [
            StatusReply::BusError,
            StatusReply::BusError,
            StatusReply::Word(word(BUSY)),
            StatusReply::BusError,
            StatusReply::Word(word(READY)),
        ]
        .into();
        let mut delay = MockDelay::default();
        let outcome = Poller::new().wait_busy(&mut bus, &mut delay, &WaitPolicy::busy());

        assert_eq!(outcome, PollOutcome::Satisfied { retries: 1 });
    }

    #[test]
    fn test_endless_uncounted_polls_still_terminate() {
        let mut bus = MockTransport::new();
        bus.idle_status = word(BOOT_LDROM_IN_PROGRESS);
        let mut delay = MockDelay::default();
        let policy = WaitPolicy::status();
        let outcome = Poller::new().wait_for_status(&mut bus, &mut delay, LDROM, &policy);

        assert_eq!(outcome, PollOutcome::TimedOut { retries: 0 });
        assert_eq!(bus.status_reads, policy.max_uncounted as usize + 1);
    }

    #[test]
    fn test_target_checked_before_busy() {
        let mut bus = MockTransport::with_statuses(&[word(READY | BUSY)]);
        let mut delay = MockDelay::default();
        let outcome =
            Poller::new().wait_for_status(&mut bus, &mut delay, READY, &WaitPolicy::status());
        assert!(outcome.is_satisfied());

        let mut bus = MockTransport::with_statuses(&[word(READY | BUSY), word(READY)]);
        let outcome = Poller::new().wait_busy(&mut bus, &mut delay, &WaitPolicy::busy());
        assert_eq!(outcome, PollOutcome::Satisfied { retries: 1 });
    }

    #[test]
    fn test_last_status_tracks_changes() {
        let mut bus = MockTransport::with_statuses(&[word(BUSY), word(READY)]);
        let mut delay = MockDelay::default();
        let mut poller = Poller::new();
        assert_eq!(poller.last_status(), None);
        poller.wait_busy(&mut bus, &mut delay, &WaitPolicy::busy());
        assert_eq!(poller.last_status(), Some(READY));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(PollOutcome::Satisfied { retries: 2 }.into_result(), Ok(2));
        assert_eq!(
            PollOutcome::TimedOut { retries: 50 }.into_result(),
            Err(WaitError::Timeout { retries: 50 })
        );
    }
}
