//! Persisted form of the device registry

use core::fmt;

use super::{Device, Serial};
use crate::mac::ShortAddr;

/// Encoded size of one registry entry (serial + short address)
pub const ENTRY_SIZE: usize = 6;

/// Snapshot codec error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SnapshotError {
    /// Output buffer too small
    BufferTooSmall,
    /// Input shorter than one full image
    Truncated,
    /// Occupancy count out of range
    InvalidCount,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::BufferTooSmall => f.write_str("buffer too small for registry image"),
            SnapshotError::Truncated => f.write_str("registry image truncated"),
            SnapshotError::InvalidCount => f.write_str("registry image count out of range"),
        }
    }
}

/// Full registry table plus occupancy counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot<const N: usize> {
    /// Registry slots, empty slots carry [`Device::EMPTY`]
    pub devices: [Device; N],
    /// Number of registered devices
    pub count: usize,
}

impl<const N: usize> RegistrySnapshot<N> {
    /// Size of the byte image produced by [`encode`](Self::encode)
    pub const ENCODED_LEN: usize = N * ENTRY_SIZE + 1;

    /// Create an empty snapshot
    pub const fn new() -> Self {
        Self {
            devices: [Device::EMPTY; N],
            count: 0,
        }
    }

    /// Number of slots holding a device
    pub fn occupied(&self) -> usize {
        self.devices.iter().filter(|d| !d.is_empty()).count()
    }

    /// Whether the table upholds the registry invariants
    ///
    /// The counter must match the occupied slots, every device must sit in
    /// the slot its address maps to, and serials must be non-zero and unique.
    pub fn is_consistent(&self) -> bool {
        if self.count > N || self.count != self.occupied() {
            return false;
        }

        self.devices.iter().enumerate().all(|(index, device)| {
            device.is_empty()
                || (device.address == ShortAddr::from_index(index)
                    && device.serial != 0
                    && !self.devices[index + 1..]
                        .iter()
                        .any(|other| !other.is_empty() && other.serial == device.serial))
        })
    }

    /// Write the byte image into `buf`, returning the number of bytes used
    ///
    /// Layout: per slot serial (u32 LE) and address (u16 LE), then a one-byte
    /// device count.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, SnapshotError> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(SnapshotError::BufferTooSmall);
        }
        let count = u8::try_from(self.count).map_err(|_| SnapshotError::InvalidCount)?;

        for (chunk, device) in buf.chunks_exact_mut(ENTRY_SIZE).zip(self.devices.iter()) {
            chunk[..4].copy_from_slice(&device.serial.to_le_bytes());
            chunk[4..].copy_from_slice(&device.address.to_le_bytes());
        }
        buf[N * ENTRY_SIZE] = count;

        Ok(Self::ENCODED_LEN)
    }

    /// Parse a byte image written by [`encode`](Self::encode)
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < Self::ENCODED_LEN {
            return Err(SnapshotError::Truncated);
        }

        let mut snapshot = Self::new();
        for (device, chunk) in snapshot
            .devices
            .iter_mut()
            .zip(bytes[..N * ENTRY_SIZE].chunks_exact(ENTRY_SIZE))
        {
            let serial = Serial::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let address = ShortAddr::from_le_bytes([chunk[4], chunk[5]]);
            *device = Device { address, serial };
        }

        snapshot.count = bytes[N * ENTRY_SIZE] as usize;
        if snapshot.count > N {
            return Err(SnapshotError::InvalidCount);
        }

        Ok(snapshot)
    }
}

impl<const N: usize> Default for RegistrySnapshot<N> {
    fn default() -> Self {
        Self::new()
    }
}
