use core::fmt;

/// Short network address of a device
///
/// The all-zero address marks an empty registry slot and an unset origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ShortAddr(pub u16);

impl ShortAddr {
    /// Empty/unset address
    pub const NULL: ShortAddr = ShortAddr(0);

    /// Create a new address
    pub const fn new(addr: u16) -> Self {
        Self(addr)
    }

    /// Address assigned to registry slot `index` (slot index + 1)
    pub const fn from_index(index: usize) -> Self {
        Self(index as u16 + 1)
    }

    /// Registry slot this address maps to, `None` for the null address
    pub const fn index(&self) -> Option<usize> {
        match self.0 {
            0 => None,
            addr => Some(addr as usize - 1),
        }
    }

    /// Check for the null address
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Raw address value
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Little-endian byte representation
    pub const fn to_le_bytes(&self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Parse from little-endian bytes
    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}

impl From<u16> for ShortAddr {
    fn from(addr: u16) -> Self {
        Self(addr)
    }
}

impl fmt::Display for ShortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ShortAddr {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=u16:04x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_mapping() {
        assert_eq!(ShortAddr::from_index(0), ShortAddr(1));
        assert_eq!(ShortAddr(1).index(), Some(0));
        assert_eq!(ShortAddr(30).index(), Some(29));
        assert_eq!(ShortAddr::NULL.index(), None);
        assert!(ShortAddr::default().is_null());
    }
}
