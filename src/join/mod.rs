//! Coordinator side of the join handshake
//!
//! Devices that want to join send a join request in the shared join slots.
//! The coordinator serves one device at a time:
//! - Intake: pull the newest valid request from the queue and resolve an
//!   address for its serial
//! - RespondTx: open transient slots towards the device and retransmit the
//!   join response until the MAC reports delivery
//! - ConfirmRx: wait for the device's join successful frame from its new
//!   address, then register it and allocate its permanent slots
//!
//! Both handshake states are bounded by a timeout. On expiry the transient
//! slots are released and the next queued request is served.
//!
//! The manager never blocks or reads a clock. The caller feeds received
//! frames and MAC callbacks as [`JoinEvent`]s and calls [`JoinManager::poll`]
//! when [`JoinManager::next_deadline`] is reached.

/// Pending join request queue
pub mod queue;

/// Deadline timer
pub mod timer;

/// Manual admission window
pub mod window;

use core::time::Duration;

pub use queue::{EnqueueOutcome, JoinRequest, PendingQueue, PendingRequest};
pub use timer::Timer;
pub use window::ManualWindow;

use crate::{
    config::{JoinConfig, MAX_DEVICES},
    mac::{JoinMac, ShortAddr, SlotKind, TxStatus},
    registry::{DeviceRegistry, RegistryError},
    storage::Storage,
};

/// Join state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinState {
    /// Waiting for or pulling the next join request
    Intake,
    /// Delivering the join response
    RespondTx,
    /// Waiting for the join successful frame
    ConfirmRx,
}

/// Input to the join state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinEvent {
    /// Join request frame received
    JoinRequest {
        /// Address the frame was sent from
        source: ShortAddr,
        /// Decoded payload
        request: JoinRequest,
    },
    /// Join successful frame received
    JoinSuccessful {
        /// Address the frame was sent from
        source: ShortAddr,
    },
    /// Transmission outcome of a join response
    TxStatus(TxStatus),
}

/// What happened to a received join request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestOutcome {
    /// Added to the queue
    Queued,
    /// Replaced a queued request from the same origin
    Superseded,
    /// Queue full, request dropped
    QueueFull,
    /// Serial number 0, request dropped
    InvalidSerial,
    /// Registry full and serial unknown, request dropped
    RegistryFull,
}

/// The handshake in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActiveJoin {
    /// Address the device sent its request from
    pub origin: ShortAddr,
    /// Address assigned to the device
    pub assigned: ShortAddr,
    /// The request being served
    pub request: JoinRequest,
}

/// Join manager with the default capacity
pub type DefaultJoinManager<M, S> = JoinManager<M, S, MAX_DEVICES>;

/// Join state machine of the coordinator
pub struct JoinManager<M: JoinMac, S: Storage<N>, const N: usize> {
    /// MAC handle
    mac: M,
    /// Admitted devices
    registry: DeviceRegistry<S, N>,
    /// Requests waiting to be served
    queue: PendingQueue<N>,
    /// Timing parameters
    config: JoinConfig,
    /// Current state
    state: JoinState,
    /// Handshake in progress
    active: Option<ActiveJoin>,
    /// RespondTx state timeout
    response_timer: Timer,
    /// Next join response (re)transmission
    retry_timer: Timer,
    /// ConfirmRx state timeout
    confirm_timer: Timer,
    /// Manual admission window
    window: ManualWindow,
    /// A join response is queued in the MAC awaiting its outcome
    response_in_flight: bool,
    /// A fragment of the current response was not delivered
    response_failed: bool,
    /// Join flag currently set in the beacons
    advertising: bool,
}

impl<M: JoinMac, S: Storage<N>, const N: usize> JoinManager<M, S, N> {
    /// Create a new join manager
    pub fn new(mac: M, registry: DeviceRegistry<S, N>, config: JoinConfig) -> Self {
        Self {
            mac,
            registry,
            queue: PendingQueue::new(),
            config,
            state: JoinState::Intake,
            active: None,
            response_timer: Timer::new(),
            retry_timer: Timer::new(),
            confirm_timer: Timer::new(),
            window: ManualWindow::new(),
            response_in_flight: false,
            response_failed: false,
            advertising: false,
        }
    }

    /// Start the join service
    ///
    /// Schedules the join request slots and starts with the manual window
    /// closed.
    pub fn start(&mut self) {
        self.queue.clear();
        self.mac.add_join_request_slots();
        self.close_window();
    }

    /// Restore admitted devices after a reboot
    ///
    /// Loads the stored registry and schedules data slots for every device in
    /// it. A missing or unreadable registry means a cold start. Returns the
    /// number of restored devices.
    pub fn restore(&mut self) -> usize {
        match self.registry.load_from_storage() {
            Ok(true) => {}
            Ok(false) => return 0,
            Err(_) => {
                warn!("Stored device registry not usable; starting without devices");
                return 0;
            }
        }

        let mut restored = 0;
        for device in self.registry.iter() {
            self.mac.add_permanent_slots(device.address, SlotKind::All);
            restored += 1;
        }

        info!("Restored {} registered devices", restored);
        restored
    }

    /// Dispatch an event
    pub fn handle(&mut self, event: JoinEvent, now: Duration) {
        match event {
            JoinEvent::JoinRequest { source, request } => {
                self.on_join_request(source, request, now);
            }
            JoinEvent::JoinSuccessful { source } => {
                self.on_join_successful(source, now);
            }
            JoinEvent::TxStatus(status) => self.on_tx_status(status, now),
        }
    }

    /// Fire all timers due at `now`
    pub fn poll(&mut self, now: Duration) {
        if self.confirm_timer.fired(now) {
            self.confirm_timer.cancel();
            info!("Join successful not received in time");
            self.abort_join(now);
        }

        if self.retry_timer.fired(now) {
            self.retry_response(now);
        }

        if self.window.take_expired(now) {
            self.close_window();
        }
    }

    /// Earliest time [`poll`](Self::poll) has work to do
    pub fn next_deadline(&self) -> Option<Duration> {
        [
            self.retry_timer.deadline(),
            self.confirm_timer.deadline(),
            self.window.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Handle a received join request
    pub fn on_join_request(
        &mut self,
        source: ShortAddr,
        request: JoinRequest,
        now: Duration,
    ) -> RequestOutcome {
        info!("Received join request from {}, serial {}", source, request.serial);

        if request.serial == 0 {
            info!("Reject join request; device has no valid serial number");
            return RequestOutcome::InvalidSerial;
        }

        let known = self.registry.find_by_serial(request.serial).is_some();
        if self.registry.is_full() && !known {
            info!(
                "Cannot join new device; registered devices reached limit ({})",
                self.registry.count()
            );
            return RequestOutcome::RegistryFull;
        }

        let outcome = match self.queue.enqueue(source, request) {
            EnqueueOutcome::Queued => {
                info!("Queued join request from {} ({} pending)", source, self.queue.len());
                RequestOutcome::Queued
            }
            EnqueueOutcome::Superseded => {
                info!("Join request from {} already queued; old request overwritten", source);
                RequestOutcome::Superseded
            }
            EnqueueOutcome::Full => {
                warn!("Join request queue is full; dropped request from {}", source);
                RequestOutcome::QueueFull
            }
        };

        if self.active.is_none() {
            self.enter_intake(now);
        }

        outcome
    }

    /// Handle the MAC's report on a join response transmission
    ///
    /// Only [`TxStatus::Failed`] counts as a failed attempt; a busy report
    /// lets the handshake proceed. Reports with no response in flight belong
    /// to an aborted handshake and are dropped.
    pub fn on_tx_status(&mut self, status: TxStatus, now: Duration) {
        if self.state != JoinState::RespondTx {
            debug!("Ignoring tx status {:?} outside response state", status);
            return;
        }
        if !self.response_in_flight {
            debug!("Ignoring tx status {:?}; no join response in flight", status);
            return;
        }

        if status.is_failure() {
            info!("Join response fragment not delivered");
            self.response_failed = true;
        }
        self.response_in_flight = false;

        let in_time = self.response_timer.is_running(now);
        if !self.response_failed && in_time {
            if let Some(active) = self.active {
                info!(
                    "Join response delivered; serial {}, origin {}, new addr {}",
                    active.request.serial,
                    active.origin,
                    active.assigned
                );
            }
            self.response_timer.cancel();
            self.retry_timer.cancel();
            self.enter_confirm_rx(now);
        } else if !in_time {
            info!("Join response state timed out");
            self.abort_join(now);
        }
    }

    /// Handle a received join successful frame
    ///
    /// Returns true if it completed the handshake in progress.
    pub fn on_join_successful(&mut self, source: ShortAddr, now: Duration) -> bool {
        let active = match self.active {
            Some(active) if self.state == JoinState::ConfirmRx && active.assigned == source => {
                active
            }
            _ => {
                debug!("Ignoring join successful from {}", source);
                return false;
            }
        };

        info!(
            "Received join successful from {}; serial {}, old addr {}",
            source,
            active.request.serial,
            active.origin
        );

        self.confirm_timer.cancel();
        self.mac.remove_transient_slot(active.origin);

        match self.registry.add(active.assigned, active.request.serial) {
            Ok(()) => self.admit(active.assigned),
            Err(RegistryError::Storage(_)) => {
                warn!("Device {} admitted but registry not stored", active.assigned);
                self.admit(active.assigned);
            }
            Err(_) => {
                info!("Cannot add device with addr {}; join rejected", active.assigned);
            }
        }

        self.active = None;

        if self.window.is_open(now) {
            info!("Restart manual join window");
            self.open_manual_window(now);
        }

        self.enter_intake(now);
        true
    }

    /// Open the manual join window, or restart it if already open
    ///
    /// Returns false if the registry is full.
    pub fn open_manual_window(&mut self, now: Duration) -> bool {
        if self.registry.is_full() {
            info!("Joined device limit reached; join window stays closed");
            return false;
        }

        self.enable_advertising();
        self.window.open(now, self.config.manual_window);

        info!(
            "Manual join window open; closes in {}s",
            self.config.manual_window.as_secs()
        );
        true
    }

    /// Remove an admitted device and its data slots
    pub fn remove_device(&mut self, address: ShortAddr) -> Result<(), RegistryError<S::Error>> {
        match self.registry.remove(address) {
            Ok(()) => {
                self.mac.remove_permanent_slots(address);
                Ok(())
            }
            Err(RegistryError::Storage(e)) => {
                self.mac.remove_permanent_slots(address);
                Err(RegistryError::Storage(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Remove every admitted device, returning how many were removed
    pub fn remove_all_devices(&mut self) -> usize {
        info!("Removing all registered devices");

        let addresses: heapless::Vec<ShortAddr, N> =
            self.registry.iter().map(|device| device.address).collect();

        let mut removed = 0;
        for address in addresses {
            match self.remove_device(address) {
                Ok(()) | Err(RegistryError::Storage(_)) => removed += 1,
                Err(_) => warn!("Failed to remove device {}", address),
            }
        }
        removed
    }

    /// Current state
    pub fn state(&self) -> JoinState {
        self.state
    }

    /// Handshake in progress
    pub fn active(&self) -> Option<&ActiveJoin> {
        self.active.as_ref()
    }

    /// Device registry
    pub fn registry(&self) -> &DeviceRegistry<S, N> {
        &self.registry
    }

    /// Mutable device registry
    pub fn registry_mut(&mut self) -> &mut DeviceRegistry<S, N> {
        &mut self.registry
    }

    /// Pending request queue
    pub fn queue(&self) -> &PendingQueue<N> {
        &self.queue
    }

    /// MAC handle
    pub fn mac(&self) -> &M {
        &self.mac
    }

    /// Mutable MAC handle
    pub fn mac_mut(&mut self) -> &mut M {
        &mut self.mac
    }

    /// Timing parameters
    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Whether the join flag is set in the beacons
    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    /// Whether the manual window is open at `now`
    pub fn is_window_open(&self, now: Duration) -> bool {
        self.window.is_open(now)
    }

    fn enter_intake(&mut self, now: Duration) {
        self.state = JoinState::Intake;

        if self.registry.is_dirty() && self.registry.flush().is_err() {
            warn!("Device registry still not stored");
        }

        if self.queue.is_empty() {
            debug!("No pending join request");
            return;
        }

        let pending = match self.queue.dequeue_next() {
            Some(pending) => pending,
            None => {
                error!("No valid join request pulled from queue");
                return;
            }
        };

        match self.registry.find_free_address_or_existing(pending.request.serial) {
            Ok((assigned, _)) => {
                info!(
                    "Join request pulled from queue ({} pending); src {}, serial {}",
                    self.queue.len(),
                    pending.origin,
                    pending.request.serial
                );
                self.active = Some(ActiveJoin {
                    origin: pending.origin,
                    assigned,
                    request: pending.request,
                });
                self.enter_respond_tx(now);
            }
            Err(_) => {
                info!(
                    "Cannot join new device; registered devices reached limit ({}); dropping {} requests",
                    self.registry.count(),
                    self.queue.len()
                );
                self.queue.clear();
                self.active = None;
            }
        }
    }

    fn enter_respond_tx(&mut self, now: Duration) {
        let active = match self.active {
            Some(active) => active,
            None => return,
        };

        self.state = JoinState::RespondTx;
        self.response_timer.arm(now, self.config.response_timeout);
        self.mac.add_transient_slot(active.origin);
        self.retry_timer.arm(now, self.config.retry_tx_interval);

        debug!(
            "Join response to {} scheduled in {}s",
            active.origin,
            self.config.retry_tx_interval.as_secs()
        );
    }

    fn retry_response(&mut self, now: Duration) {
        let active = match self.active {
            Some(active) if self.state == JoinState::RespondTx => active,
            _ => {
                self.retry_timer.cancel();
                return;
            }
        };

        if !self.response_timer.is_running(now) {
            if !self.response_in_flight {
                info!("Join response state timed out");
                self.abort_join(now);
                return;
            }
            // Give the MAC one more retry period to report the outcome
            let grace_over = self
                .response_timer
                .deadline()
                .and_then(|deadline| deadline.checked_add(self.config.retry_tx_interval))
                .map_or(true, |limit| now >= limit);
            if grace_over {
                warn!("No tx status for join response; join state timed out");
                self.abort_join(now);
                return;
            }
        }

        if self.response_in_flight {
            info!("Cannot send new join response; one is still active in the MAC");
        } else {
            self.response_in_flight = true;
            self.response_failed = false;

            match self.mac.send_join_response(active.origin, active.assigned) {
                Ok(()) => debug!("Join response to {} handed to MAC", active.origin),
                Err(nb::Error::WouldBlock) => {
                    self.response_in_flight = false;
                    debug!("MAC busy; join response deferred");
                }
                Err(nb::Error::Other(_)) => {
                    self.response_in_flight = false;
                    error!("Failed to send join response; retrying until state timeout");
                }
            }
        }

        self.retry_timer.arm(now, self.config.retry_tx_interval);
    }

    fn enter_confirm_rx(&mut self, now: Duration) {
        self.state = JoinState::ConfirmRx;
        self.confirm_timer.arm(now, self.config.confirm_timeout);

        if let Some(active) = self.active {
            info!("Waiting for join successful from {}", active.assigned);
        }
    }

    /// Cancel the handshake in progress and serve the next request
    fn abort_join(&mut self, now: Duration) {
        if let Some(active) = self.active.take() {
            info!("Join of serial {} cancelled", active.request.serial);
            self.mac.remove_transient_slot(active.origin);
        }

        self.response_timer.cancel();
        self.retry_timer.cancel();
        self.confirm_timer.cancel();
        self.response_in_flight = false;
        self.response_failed = false;

        self.enter_intake(now);
    }

    fn admit(&mut self, address: ShortAddr) {
        if self.registry.is_full() {
            info!("Max device count registered; join disabled");
            self.disable_advertising();
        }
        self.mac.add_permanent_slots(address, SlotKind::All);
    }

    fn enable_advertising(&mut self) {
        if !self.advertising {
            self.mac.advertise_join(true);
            self.advertising = true;
        }
    }

    fn disable_advertising(&mut self) {
        self.mac.advertise_join(false);
        self.advertising = false;
    }

    fn close_window(&mut self) {
        self.window.close();
        self.disable_advertising();
        info!("Manual join window closed");
    }
}
