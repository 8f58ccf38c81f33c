//! Coordinator configuration
//!
//! This module contains the tunables of the join service:
//! - Registry capacity
//! - Join state timeouts and retransmission period
//! - Manual admission window length

/// Join timing configuration
pub mod join;

pub use join::JoinConfig;

/// Default maximum number of devices the coordinator admits
pub const MAX_DEVICES: usize = 30;
