use core::time::Duration;

/// One-shot deadline timer on the caller's monotonic clock
///
/// Re-arming replaces the previous deadline, so at most one expiry is ever
/// outstanding per timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Duration>,
}

impl Timer {
    /// Create a stopped timer
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Start or restart the timer to expire `period` after `now`
    pub fn arm(&mut self, now: Duration, period: Duration) {
        self.deadline = Some(now.checked_add(period).unwrap_or(Duration::MAX));
    }

    /// Stop the timer
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is set, expired or not
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Armed and not yet expired
    pub fn is_running(&self, now: Duration) -> bool {
        matches!(self.deadline, Some(deadline) if now < deadline)
    }

    /// Armed and expired
    pub fn fired(&self, now: Duration) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Current deadline
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_and_expire() {
        let mut timer = Timer::new();
        assert!(!timer.is_armed());
        assert!(!timer.fired(Duration::from_secs(100)));

        timer.arm(Duration::from_secs(10), Duration::from_secs(5));
        assert!(timer.is_running(Duration::from_secs(14)));
        assert!(!timer.fired(Duration::from_secs(14)));
        assert!(timer.fired(Duration::from_secs(15)));
        assert!(!timer.is_running(Duration::from_secs(15)));

        timer.cancel();
        assert!(!timer.fired(Duration::from_secs(15)));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let mut timer = Timer::new();
        timer.arm(Duration::ZERO, Duration::from_secs(5));
        timer.arm(Duration::from_secs(4), Duration::from_secs(5));
        assert_eq!(timer.deadline(), Some(Duration::from_secs(9)));

        timer.arm(Duration::MAX, Duration::from_secs(1));
        assert_eq!(timer.deadline(), Some(Duration::MAX));
    }
}
