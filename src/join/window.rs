use core::time::Duration;

use super::timer::Timer;

/// Operator-triggered period with join advertisement forced on
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualWindow {
    timer: Timer,
}

impl ManualWindow {
    /// Create a closed window
    pub const fn new() -> Self {
        Self { timer: Timer::new() }
    }

    /// Open the window or restart its countdown
    pub fn open(&mut self, now: Duration, length: Duration) {
        self.timer.arm(now, length);
    }

    /// Close the window early
    pub fn close(&mut self) {
        self.timer.cancel();
    }

    /// Whether the window is open at `now`
    pub fn is_open(&self, now: Duration) -> bool {
        self.timer.is_running(now)
    }

    /// Returns true once when an open window reaches its deadline
    pub fn take_expired(&mut self, now: Duration) -> bool {
        if self.timer.fired(now) {
            self.timer.cancel();
            true
        } else {
            false
        }
    }

    /// Closing deadline of an open window
    pub fn deadline(&self) -> Option<Duration> {
        self.timer.deadline()
    }
}
