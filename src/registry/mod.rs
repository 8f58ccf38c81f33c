//! Registry of admitted devices
//!
//! A fixed-size table of devices that completed the join handshake. A
//! device's short address is derived from its slot (`index + 1`), so the null
//! address never names an occupied slot. Every successful mutation is
//! written through to [`Storage`].

/// Persisted form of the registry
pub mod snapshot;

use core::fmt;

pub use snapshot::{RegistrySnapshot, SnapshotError};

use crate::config::MAX_DEVICES;
use crate::mac::ShortAddr;
use crate::storage::Storage;

/// Device serial number, 0 means unassigned
pub type Serial = u32;

/// Registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Device {
    /// Assigned short address
    pub address: ShortAddr,
    /// Device serial number
    pub serial: Serial,
}

impl Device {
    /// Empty registry slot
    pub const EMPTY: Device = Device {
        address: ShortAddr::NULL,
        serial: 0,
    };

    /// Whether this slot is free
    pub const fn is_empty(&self) -> bool {
        self.address.is_null()
    }
}

/// How an address was resolved for a joining serial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressOutcome {
    /// The serial is already registered; its address is reused
    Existing,
    /// A free slot was found
    Free,
}

/// Registry error
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError<E> {
    /// Table full and the serial is not registered
    NoFreeAddress,
    /// Null address or address beyond the table
    InvalidAddress,
    /// Serial number 0
    InvalidSerial,
    /// Target slot already holds another device
    SlotOccupied,
    /// Serial already registered under another address
    DuplicateSerial,
    /// No device with that address
    NotFound,
    /// Registry holds no devices
    Empty,
    /// Stored registry failed validation
    CorruptSnapshot,
    /// Storage backend error
    Storage(E),
}

impl<E: fmt::Debug> fmt::Display for RegistryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NoFreeAddress => f.write_str("no free device address"),
            RegistryError::InvalidAddress => f.write_str("invalid device address"),
            RegistryError::InvalidSerial => f.write_str("invalid serial number"),
            RegistryError::SlotOccupied => f.write_str("registry slot occupied"),
            RegistryError::DuplicateSerial => f.write_str("serial registered under another address"),
            RegistryError::NotFound => f.write_str("device not found"),
            RegistryError::Empty => f.write_str("registry is empty"),
            RegistryError::CorruptSnapshot => f.write_str("stored registry is corrupt"),
            RegistryError::Storage(e) => write!(f, "storage error: {:?}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for RegistryError<E> {}

/// Registry with the default capacity
pub type DefaultRegistry<S> = DeviceRegistry<S, MAX_DEVICES>;

/// Fixed-capacity table of admitted devices
pub struct DeviceRegistry<S: Storage<N>, const N: usize> {
    /// Registry slots
    devices: [Device; N],
    /// Number of occupied slots
    count: usize,
    /// Non-volatile backing store
    storage: S,
    /// Set while the last write to storage failed
    dirty: bool,
}

impl<S: Storage<N>, const N: usize> DeviceRegistry<S, N> {
    const CAPACITY_OK: () = assert!(N > 0 && N <= 255, "registry capacity must be 1..=255");

    /// Create an empty registry backed by `storage`
    pub fn new(storage: S) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;

        Self {
            devices: [Device::EMPTY; N],
            count: 0,
            storage,
            dirty: false,
        }
    }

    /// Resolve the address for a joining serial
    ///
    /// A registered serial gets its existing slot back; otherwise the first
    /// free slot is used.
    pub fn find_free_address_or_existing(
        &self,
        serial: Serial,
    ) -> Result<(ShortAddr, AddressOutcome), RegistryError<S::Error>> {
        if serial == 0 {
            return Err(RegistryError::InvalidSerial);
        }

        let mut first_free = None;
        for (index, device) in self.devices.iter().enumerate() {
            if !device.is_empty() && device.serial == serial {
                info!(
                    "Device (serial {}) is already registered with addr {}",
                    serial,
                    device.address
                );
                return Ok((ShortAddr::from_index(index), AddressOutcome::Existing));
            }
            if first_free.is_none() && device.is_empty() {
                first_free = Some(index);
            }
        }

        first_free
            .map(|index| (ShortAddr::from_index(index), AddressOutcome::Free))
            .ok_or(RegistryError::NoFreeAddress)
    }

    /// Register a device and persist the table
    ///
    /// Re-adding an address already in the table updates its serial without
    /// changing the count. If persisting fails the in-memory change is kept
    /// and the registry is marked dirty, see [`flush`](Self::flush).
    pub fn add(&mut self, address: ShortAddr, serial: Serial) -> Result<(), RegistryError<S::Error>> {
        if serial == 0 {
            return Err(RegistryError::InvalidSerial);
        }

        let (slot, existing) = match self.position_by_address(address) {
            Some(slot) => (slot, true),
            None => {
                let slot = address
                    .index()
                    .filter(|&index| index < N)
                    .ok_or(RegistryError::InvalidAddress)?;
                if !self.devices[slot].is_empty() {
                    warn!("Slot of addr {} is occupied by another device", address);
                    return Err(RegistryError::SlotOccupied);
                }
                (slot, false)
            }
        };

        if matches!(self.position_by_serial(serial), Some(other) if other != slot) {
            warn!("Serial {} is registered under another address", serial);
            return Err(RegistryError::DuplicateSerial);
        }

        self.devices[slot] = Device { address, serial };
        if !existing {
            self.count += 1;
        }

        self.log_table();
        self.persist()
    }

    /// Remove the device with `address` and persist the table
    pub fn remove(&mut self, address: ShortAddr) -> Result<(), RegistryError<S::Error>> {
        if self.count == 0 {
            return Err(RegistryError::Empty);
        }

        let slot = self
            .position_by_address(address)
            .ok_or(RegistryError::NotFound)?;
        self.devices[slot] = Device::EMPTY;
        self.count -= 1;

        info!("Removed device with addr {}; {} left", address, self.count);
        self.persist()
    }

    /// Look up a device by short address
    pub fn find_by_address(&self, address: ShortAddr) -> Option<&Device> {
        self.position_by_address(address).map(|slot| &self.devices[slot])
    }

    /// Look up a device by serial number
    pub fn find_by_serial(&self, serial: Serial) -> Option<&Device> {
        self.position_by_serial(serial).map(|slot| &self.devices[slot])
    }

    /// Raw slot access, empty slots included
    pub fn find_by_index(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    /// Number of registered devices
    pub fn count(&self) -> usize {
        self.count
    }

    /// Table capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether no further new device fits
    pub fn is_full(&self) -> bool {
        self.count >= N
    }

    /// Iterate over registered devices
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|device| !device.is_empty())
    }

    /// Copy of the current table
    pub fn snapshot(&self) -> RegistrySnapshot<N> {
        RegistrySnapshot {
            devices: self.devices,
            count: self.count,
        }
    }

    /// Replace the table with the stored registry
    ///
    /// Returns `Ok(false)` if nothing was stored. On any error the table is
    /// left untouched.
    pub fn load_from_storage(&mut self) -> Result<bool, RegistryError<S::Error>> {
        let snapshot = match self.storage.read_registry().map_err(RegistryError::Storage)? {
            Some(snapshot) => snapshot,
            None => {
                info!("No stored device registry");
                return Ok(false);
            }
        };

        if !snapshot.is_consistent() {
            warn!(
                "Stored device registry rejected; count {}, {} occupied slots, table inconsistent",
                snapshot.count,
                snapshot.occupied()
            );
            return Err(RegistryError::CorruptSnapshot);
        }

        self.devices = snapshot.devices;
        self.count = snapshot.count;
        self.dirty = false;

        info!("Loaded device registry; {} devices", self.count);
        Ok(true)
    }

    /// Whether the last write to storage failed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Retry persisting the table after a failed write
    pub fn flush(&mut self) -> Result<(), RegistryError<S::Error>> {
        if !self.dirty {
            return Ok(());
        }
        debug!("Retrying device registry write");
        self.persist()
    }

    /// Storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable storage backend
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn position_by_address(&self, address: ShortAddr) -> Option<usize> {
        if address.is_null() || self.count == 0 {
            return None;
        }
        self.devices.iter().position(|device| device.address == address)
    }

    fn position_by_serial(&self, serial: Serial) -> Option<usize> {
        if serial == 0 {
            return None;
        }
        self.devices
            .iter()
            .position(|device| !device.is_empty() && device.serial == serial)
    }

    fn persist(&mut self) -> Result<(), RegistryError<S::Error>> {
        let snapshot = self.snapshot();
        match self.storage.write_registry(&snapshot) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                error!("Failed to store device registry; kept in memory only");
                Err(RegistryError::Storage(e))
            }
        }
    }

    fn log_table(&self) {
        debug!("-- Device registry ({}/{}) --", self.count, N);
        for device in self.iter() {
            debug!("Serial: {}; addr: {}", device.serial, device.address);
        }
    }
}
