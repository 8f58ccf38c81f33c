//! Time-slotted MAC abstraction
//!
//! The coordinator does not schedule slots or frame packets itself. It drives
//! the MAC through [`JoinMac`] and learns transmission outcomes as
//! [`TxStatus`] events.

/// Short addresses
pub mod addr;
/// MAC collaborator trait
pub mod traits;

pub use addr::ShortAddr;
pub use traits::{JoinMac, SlotKind, TxStatus};
