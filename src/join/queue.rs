//! Pending join requests
//!
//! Requests wait here while another device is mid-handshake. The queue holds
//! at most one request per origin address; a retransmission from the same
//! origin replaces the queued one.

use heapless::Vec;

use crate::mac::ShortAddr;
use crate::registry::Serial;

/// Decoded join request payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinRequest {
    /// Serial number of the requesting device
    pub serial: Serial,
}

impl JoinRequest {
    /// Create a join request
    pub const fn new(serial: Serial) -> Self {
        Self { serial }
    }
}

/// Queued join request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingRequest {
    /// Address the device sent the request from
    pub origin: ShortAddr,
    /// Request payload
    pub request: JoinRequest,
}

impl PendingRequest {
    fn is_valid(&self) -> bool {
        !self.origin.is_null() && self.request.serial != 0
    }
}

/// Result of [`PendingQueue::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnqueueOutcome {
    /// Appended as a new entry
    Queued,
    /// Replaced the queued request from the same origin
    Superseded,
    /// Queue full, request dropped
    Full,
}

/// Bounded queue of join requests, newest served first
#[derive(Debug, Default)]
pub struct PendingQueue<const N: usize> {
    entries: Vec<PendingRequest, N>,
}

impl<const N: usize> PendingQueue<N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Queue a request, replacing any request from the same origin
    pub fn enqueue(&mut self, origin: ShortAddr, request: JoinRequest) -> EnqueueOutcome {
        let entry = PendingRequest { origin, request };

        if let Some(queued) = self.entries.iter_mut().find(|e| e.origin == origin) {
            *queued = entry;
            return EnqueueOutcome::Superseded;
        }

        match self.entries.push(entry) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(_) => EnqueueOutcome::Full,
        }
    }

    /// Pop the most recently queued valid request
    ///
    /// Entries with a null origin or serial 0 are discarded on the way.
    pub fn dequeue_next(&mut self) -> Option<PendingRequest> {
        while let Some(entry) = self.entries.pop() {
            if entry.is_valid() {
                return Some(entry);
            }
        }
        None
    }

    /// Drop all queued requests
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of queued requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether no new origin can be queued
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Maximum number of queued requests
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether a request from `origin` is waiting
    pub fn contains(&self, origin: ShortAddr) -> bool {
        self.entries.iter().any(|e| e.origin == origin)
    }

    /// Iterate in queue order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supersede_same_origin() {
        let mut queue = PendingQueue::<4>::new();
        assert_eq!(queue.enqueue(ShortAddr(0x10), JoinRequest::new(1)), EnqueueOutcome::Queued);
        assert_eq!(queue.enqueue(ShortAddr(0x11), JoinRequest::new(2)), EnqueueOutcome::Queued);
        assert_eq!(
            queue.enqueue(ShortAddr(0x10), JoinRequest::new(3)),
            EnqueueOutcome::Superseded
        );
        assert_eq!(queue.len(), 2);

        // The superseded entry keeps its position behind 0x11
        assert_eq!(queue.dequeue_next().unwrap().request.serial, 2);
        let next = queue.dequeue_next().unwrap();
        assert_eq!(next.origin, ShortAddr(0x10));
        assert_eq!(next.request.serial, 3);
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn test_newest_first() {
        let mut queue = PendingQueue::<4>::new();
        for (i, origin) in [0x21u16, 0x22, 0x23].iter().enumerate() {
            queue.enqueue(ShortAddr(*origin), JoinRequest::new(i as u32 + 1));
        }
        assert_eq!(queue.dequeue_next().unwrap().origin, ShortAddr(0x23));
        assert_eq!(queue.dequeue_next().unwrap().origin, ShortAddr(0x22));
        assert_eq!(queue.dequeue_next().unwrap().origin, ShortAddr(0x21));
    }

    #[test]
    fn test_full_queue_drops() {
        let mut queue = PendingQueue::<2>::new();
        queue.enqueue(ShortAddr(1), JoinRequest::new(1));
        queue.enqueue(ShortAddr(2), JoinRequest::new(2));
        assert!(queue.is_full());
        assert_eq!(queue.enqueue(ShortAddr(3), JoinRequest::new(3)), EnqueueOutcome::Full);
        assert!(!queue.contains(ShortAddr(3)));
        // A known origin can still be refreshed
        assert_eq!(
            queue.enqueue(ShortAddr(2), JoinRequest::new(4)),
            EnqueueOutcome::Superseded
        );
    }

    #[test]
    fn test_invalid_entries_skipped() {
        let mut queue = PendingQueue::<4>::new();
        queue.enqueue(ShortAddr(5), JoinRequest::new(50));
        queue.enqueue(ShortAddr(6), JoinRequest::new(0));
        queue.enqueue(ShortAddr::NULL, JoinRequest::new(70));

        assert_eq!(queue.dequeue_next().unwrap().origin, ShortAddr(5));
        assert!(queue.is_empty());

        queue.enqueue(ShortAddr(7), JoinRequest::new(0));
        assert!(queue.dequeue_next().is_none());
        assert!(queue.is_empty());
    }
}
