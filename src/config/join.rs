use core::time::Duration;

/// Join response retransmission period
pub const DEFAULT_RETRY_TX_INTERVAL: Duration = Duration::from_secs(3);
/// Response transmission state timeout
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
/// Join successful reception state timeout
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
/// Manual join window open time
pub const DEFAULT_MANUAL_WINDOW: Duration = Duration::from_secs(180);

/// Timing parameters of the join state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinConfig {
    /// Period between join response transmission attempts
    pub retry_tx_interval: Duration,
    /// How long the coordinator keeps trying to deliver a join response
    pub response_timeout: Duration,
    /// How long the coordinator waits for the join successful frame
    pub confirm_timeout: Duration,
    /// How long a manually opened join window stays open
    pub manual_window: Duration,
}

impl JoinConfig {
    /// Create a configuration with custom timings
    pub const fn new(
        retry_tx_interval: Duration,
        response_timeout: Duration,
        confirm_timeout: Duration,
        manual_window: Duration,
    ) -> Self {
        Self {
            retry_tx_interval,
            response_timeout,
            confirm_timeout,
            manual_window,
        }
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_TX_INTERVAL,
            DEFAULT_RESPONSE_TIMEOUT,
            DEFAULT_CONFIRM_TIMEOUT,
            DEFAULT_MANUAL_WINDOW,
        )
    }
}
