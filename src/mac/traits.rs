use super::addr::ShortAddr;

/// Outcome of a frame handed to the MAC, reported asynchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    /// Frame delivered
    Ok,
    /// MAC was busy; not counted as a failure
    Busy,
    /// Frame definitely not delivered (no ACK, collision, error)
    Failed,
}

impl TxStatus {
    /// Whether the status reports a definite delivery failure
    pub fn is_failure(&self) -> bool {
        matches!(self, TxStatus::Failed)
    }
}

/// Which recurring data slots to allocate for an admitted device
///
/// Admitted devices always get both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotKind {
    /// Uplink and downlink slots
    All,
}

/// Operations the join service needs from the time-slotted MAC
pub trait JoinMac {
    /// Error type for rejected transmissions
    type Error;

    /// Enable or disable the join flag in the coordinator's beacons
    fn advertise_join(&mut self, enabled: bool);

    /// Schedule the shared slots un-admitted devices send join requests in
    fn add_join_request_slots(&mut self);

    /// Schedule the temporary slots used while handshaking with `origin`
    fn add_transient_slot(&mut self, origin: ShortAddr);

    /// Remove the temporary handshake slots of `origin`
    fn remove_transient_slot(&mut self, origin: ShortAddr);

    /// Schedule recurring data slots for an admitted device
    fn add_permanent_slots(&mut self, address: ShortAddr, kind: SlotKind);

    /// Remove the recurring data slots of a device
    fn remove_permanent_slots(&mut self, address: ShortAddr);

    /// Queue a join response assigning `assigned` to the device at `origin`
    ///
    /// `WouldBlock` means the MAC cannot take the frame right now. Acceptance
    /// only means the frame was queued; delivery is reported as [`TxStatus`].
    fn send_join_response(
        &mut self,
        origin: ShortAddr,
        assigned: ShortAddr,
    ) -> nb::Result<(), Self::Error>;
}
