//! Persistent storage abstraction
//!
//! The coordinator keeps its device registry in non-volatile memory so that
//! admitted devices survive a power cycle. Flash layout, validity flag and
//! checksum handling belong to the implementor of [`Storage`].

use crate::registry::RegistrySnapshot;

/// Non-volatile store for the device registry of capacity `N`
pub trait Storage<const N: usize> {
    /// Error type for storage operations
    type Error;

    /// Persist the full registry
    fn write_registry(&mut self, snapshot: &RegistrySnapshot<N>) -> Result<(), Self::Error>;

    /// Read back the registry
    ///
    /// Returns `Ok(None)` when no valid registry has been stored yet.
    fn read_registry(&mut self) -> Result<Option<RegistrySnapshot<N>>, Self::Error>;
}
