//! Real-time waits.
//!
//! The engine sleeps in exactly two places: between status polls, and while
//! the device switches into the bootloader. Both go through [`Delay`] so the
//! host can keep itself alive during long waits (the heartbeat hook) and so
//! tests can run the poll loops against a simulated clock.

use std::thread;
use std::time::Duration;

/// Blocking delay provider.
pub trait Delay {
    /// Block for `duration`.
    fn delay(&mut self, duration: Duration);

    /// Called once per heartbeat interval during long fixed waits.
    ///
    /// `elapsed` and `total` describe progress through the wait. The default
    /// does nothing.
    fn heartbeat(&mut self, elapsed: Duration, total: Duration) {
        let _ = (elapsed, total);
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }

    fn heartbeat(&mut self, elapsed: Duration, total: Duration) {
        (**self).heartbeat(elapsed, total);
    }
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Wrap a closure as the heartbeat of a [`StdDelay`].
pub struct HeartbeatDelay<F: FnMut(Duration, Duration)> {
    on_heartbeat: F,
}

impl<F: FnMut(Duration, Duration)> HeartbeatDelay<F> {
    /// Create a delay that calls `on_heartbeat(elapsed, total)` on each beat.
    pub fn new(on_heartbeat: F) -> Self {
        Self { on_heartbeat }
    }
}

impl<F: FnMut(Duration, Duration)> Delay for HeartbeatDelay<F> {
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    fn heartbeat(&mut self, elapsed: Duration, total: Duration) {
        (self.on_heartbeat)(elapsed, total);
    }
}

/// Sleep `total` in slices of `interval`, beating after each slice.
///
/// A zero interval sleeps the whole duration silently.
pub fn wait_with_heartbeat<D: Delay + ?Sized>(delay: &mut D, total: Duration, interval: Duration) {
    if interval.is_zero() {
        delay.delay(total);
        return;
    }
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        let step = interval.min(total - elapsed);
        delay.delay(step);
        elapsed += step;
        delay.heartbeat(elapsed, total);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// Simulated clock: records requested sleeps instead of blocking.
    #[derive(Debug, Default)]
    pub(crate) struct MockDelay {
        pub elapsed: Duration,
        pub sleeps: usize,
        pub heartbeats: Vec<Duration>,
    }

    impl Delay for MockDelay {
        fn delay(&mut self, duration: Duration) {
            self.elapsed += duration;
            self.sleeps += 1;
        }

        fn heartbeat(&mut self, elapsed: Duration, _total: Duration) {
            self.heartbeats.push(elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockDelay;
    use super::*;

    #[test]
    fn test_heartbeat_slices() {
        let mut delay = MockDelay::default();
        wait_with_heartbeat(&mut delay, Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(delay.elapsed, Duration::from_secs(10));
        assert_eq!(delay.heartbeats.len(), 10);
        assert_eq!(delay.heartbeats[0], Duration::from_secs(1));
        assert_eq!(delay.heartbeats[9], Duration::from_secs(10));
    }

    #[test]
    fn test_heartbeat_partial_last_slice() {
        let mut delay = MockDelay::default();
        wait_with_heartbeat(
            &mut delay,
            Duration::from_millis(2500),
            Duration::from_secs(1),
        );
        assert_eq!(delay.elapsed, Duration::from_millis(2500));
        assert_eq!(delay.heartbeats.len(), 3);
    }

    #[test]
    fn test_zero_interval_is_silent() {
        let mut delay = MockDelay::default();
        wait_with_heartbeat(&mut delay, Duration::from_secs(4), Duration::ZERO);
        assert_eq!(delay.elapsed, Duration::from_secs(4));
        assert_eq!(delay.sleeps, 1);
        assert!(delay.heartbeats.is_empty());
    }

    #[test]
    fn test_heartbeat_delay_calls_closure() {
        let mut beats = 0;
        let mut delay = HeartbeatDelay::new(|_, _| beats += 1);
        wait_with_heartbeat(&mut delay, Duration::from_millis(3), Duration::from_millis(1));
        drop(delay);
        assert_eq!(beats, 3);
    }
}
