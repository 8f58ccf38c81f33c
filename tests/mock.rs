#![allow(dead_code)]

use sensor_join::{
    mac::{JoinMac, ShortAddr, SlotKind},
    registry::RegistrySnapshot,
    storage::Storage,
};

/// Mock collaborator error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// MAC refused the frame
    Rejected,
    /// Storage read or write failed
    Storage,
}

/// Every call made on the mock MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacCall {
    Advertise(bool),
    AddJoinRequestSlots,
    AddTransient(ShortAddr),
    RemoveTransient(ShortAddr),
    AddPermanent(ShortAddr, SlotKind),
    RemovePermanent(ShortAddr),
    SendResponse(ShortAddr, ShortAddr),
}

/// How the mock MAC answers `send_join_response`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    Accept,
    Busy,
    Reject,
}

/// Recording MAC for testing
pub struct MockMac {
    calls: Vec<MacCall>,
    send_modes: Vec<SendMode>,
}

impl MockMac {
    /// Create a MAC that accepts every join response
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            send_modes: Vec::new(),
        }
    }

    /// Answers for the next sends, in order; once used up sends are accepted
    pub fn script_sends(&mut self, modes: &[SendMode]) {
        self.send_modes = modes.iter().rev().copied().collect();
    }

    /// Reject every send from now on
    pub fn reject_all(&mut self) {
        self.send_modes = vec![SendMode::Reject; 1024];
    }

    pub fn calls(&self) -> &[MacCall] {
        &self.calls
    }

    pub fn count(&self, call: MacCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    pub fn sends(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, MacCall::SendResponse(..)))
            .count()
    }

    pub fn last_advertise(&self) -> Option<bool> {
        self.calls.iter().rev().find_map(|c| match c {
            MacCall::Advertise(enabled) => Some(*enabled),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl JoinMac for MockMac {
    type Error = MockError;

    fn advertise_join(&mut self, enabled: bool) {
        self.calls.push(MacCall::Advertise(enabled));
    }

    fn add_join_request_slots(&mut self) {
        self.calls.push(MacCall::AddJoinRequestSlots);
    }

    fn add_transient_slot(&mut self, origin: ShortAddr) {
        self.calls.push(MacCall::AddTransient(origin));
    }

    fn remove_transient_slot(&mut self, origin: ShortAddr) {
        self.calls.push(MacCall::RemoveTransient(origin));
    }

    fn add_permanent_slots(&mut self, address: ShortAddr, kind: SlotKind) {
        self.calls.push(MacCall::AddPermanent(address, kind));
    }

    fn remove_permanent_slots(&mut self, address: ShortAddr) {
        self.calls.push(MacCall::RemovePermanent(address));
    }

    fn send_join_response(
        &mut self,
        origin: ShortAddr,
        assigned: ShortAddr,
    ) -> nb::Result<(), Self::Error> {
        self.calls.push(MacCall::SendResponse(origin, assigned));
        match self.send_modes.pop().unwrap_or(SendMode::Accept) {
            SendMode::Accept => Ok(()),
            SendMode::Busy => Err(nb::Error::WouldBlock),
            SendMode::Reject => Err(nb::Error::Other(MockError::Rejected)),
        }
    }
}

/// In-memory storage keeping the registry as a byte image
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    image: Option<Vec<u8>>,
    pub writes: usize,
    pub fail_writes: bool,
    pub fail_reads: bool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Overwrite the stored image
    pub fn set_image(&mut self, bytes: &[u8]) {
        self.image = Some(bytes.to_vec());
    }

    /// Decode the stored image
    pub fn stored<const N: usize>(&self) -> Option<RegistrySnapshot<N>> {
        self.image
            .as_ref()
            .map(|bytes| RegistrySnapshot::decode(bytes).unwrap())
    }
}

impl<const N: usize> Storage<N> for MockStorage {
    type Error = MockError;

    fn write_registry(&mut self, snapshot: &RegistrySnapshot<N>) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MockError::Storage);
        }
        let mut buf = vec![0u8; RegistrySnapshot::<N>::ENCODED_LEN];
        snapshot.encode(&mut buf).map_err(|_| MockError::Storage)?;
        self.image = Some(buf);
        self.writes += 1;
        Ok(())
    }

    fn read_registry(&mut self) -> Result<Option<RegistrySnapshot<N>>, Self::Error> {
        if self.fail_reads {
            return Err(MockError::Storage);
        }
        match &self.image {
            None => Ok(None),
            Some(bytes) => RegistrySnapshot::decode(bytes)
                .map(Some)
                .map_err(|_| MockError::Storage),
        }
    }
}
