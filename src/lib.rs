//! Coordinator join service for a time-slotted sensor network
//!
//! This crate implements the coordinator ("hub") side of the device join
//! protocol. Battery-powered sensors ask to join with their serial number; the
//! coordinator assigns each a short address, keeps a bounded registry of
//! admitted devices in non-volatile storage, and allocates their data slots.
//!
//! # Features
//! - Single-flight join state machine with bounded response and confirmation waits
//! - Pending request queue de-duplicated by origin address
//! - Fixed-capacity device registry with idempotent rejoin
//! - Operator-triggered manual join window
//! - Hardware abstraction for the MAC and storage collaborators
//! - No unsafe code, no heap, no blocking
//!
//! # Example
//! ```ignore
//! use core::time::Duration;
//! use sensor_join::{
//!     config::JoinConfig,
//!     join::{JoinEvent, JoinManager, JoinRequest},
//!     mac::ShortAddr,
//!     registry::DeviceRegistry,
//! };
//!
//! // MAC and storage implementations omitted
//! let registry = DeviceRegistry::<_, 30>::new(flash);
//! let mut manager = JoinManager::new(mac, registry, JoinConfig::default());
//!
//! manager.restore();
//! manager.start();
//! manager.open_manual_window(Duration::ZERO);
//!
//! // Feed received frames and MAC callbacks
//! manager.handle(
//!     JoinEvent::JoinRequest {
//!         source: ShortAddr::new(0xfffe),
//!         request: JoinRequest::new(555),
//!     },
//!     now,
//! );
//!
//! // Fire timers
//! if manager.next_deadline().map_or(false, |deadline| deadline <= now) {
//!     manager.poll(now);
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

/// Coordinator configuration
pub mod config;

/// Join state machine
pub mod join;

/// MAC layer abstraction
pub mod mac;

/// Registry of admitted devices
pub mod registry;

/// Persistent storage abstraction
pub mod storage;

pub use config::{JoinConfig, MAX_DEVICES};
pub use join::{JoinEvent, JoinManager, JoinState, RequestOutcome};
pub use registry::{DeviceRegistry, RegistryError};
