//! Fixed-capacity ring that arbitrates delivery of asynchronous request
//! completions (`MlmeConfirm`/`McpsConfirm`) back to the caller.
//!
//! Implemented as a single capacity-5 array with `head`/`len` (`tail =
//! (head + len) mod CAPACITY`), rather than twin start/end pointers: fewer
//! invariants to keep in sync, and wraparound falls out of the modulus.

use crate::status::StatusCode;

/// Ring capacity.
pub const CAPACITY: usize = 5;

/// The kind of request an entry in the confirm queue tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `MLME-Join`.
    MlmeJoin,
    /// `MLME-LinkCheck`.
    MlmeLinkCheck,
    /// `MLME-TXCW` (continuous-wave test mode).
    MlmeTxCw,
    /// `MLME-DeviceTime`.
    MlmeDeviceTime,
    /// `MLME-PingSlotInfo`.
    MlmePingSlotInfo,
    /// `MLME-BeaconTiming`.
    MlmeBeaconTiming,
    /// `MLME-BeaconAcquisition`.
    MlmeBeaconAcquisition,
    /// `MCPS-Unconfirmed`.
    McpsUnconfirmed,
    /// `MCPS-Confirmed`.
    McpsConfirmed,
    /// `MCPS-Proprietary`.
    McpsProprietary,
    /// `MCPS-Multicast` (RX only).
    McpsMulticast,
}

/// Errors raised by the confirm queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The ring is at capacity.
    Full,
    /// No entry of the requested kind is tracked.
    NotFound,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    kind: RequestKind,
    status: StatusCode,
    ready_to_handle: bool,
    restrict_common_ready: bool,
}

/// The confirm queue (C4).
#[derive(Debug)]
pub struct ConfirmQueue {
    entries: [Option<Entry>; CAPACITY],
    head: usize,
    len: usize,
    common_status: Option<StatusCode>,
}

impl ConfirmQueue {
    /// Create an empty confirm queue.
    pub fn new() -> Self {
        Self {
            entries: [None; CAPACITY],
            head: 0,
            len: 0,
            common_status: None,
        }
    }

    /// Number of entries currently tracked.
    pub fn count(&self) -> usize {
        self.len
    }

    /// Whether the ring is at capacity.
    pub fn is_full(&self) -> bool {
        self.len == CAPACITY
    }

    fn position_of(&self, kind: RequestKind) -> Option<usize> {
        (0..self.len)
            .map(|i| (self.head + i) % CAPACITY)
            .find(|&idx| self.entries[idx].map(|e| e.kind) == Some(kind))
    }

    /// Track a new request. `restrict_common_ready` suppresses this entry
    /// from being marked ready by a subsequent `set_status_common` call (it
    /// still becomes ready via a direct `set_status`).
    pub fn add(&mut self, kind: RequestKind, restrict_common_ready: bool) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full);
        }
        let tail = (self.head + self.len) % CAPACITY;
        self.entries[tail] = Some(Entry {
            kind,
            status: StatusCode::Busy,
            ready_to_handle: false,
            restrict_common_ready,
        });
        self.len += 1;
        Ok(())
    }

    /// Set the status of the tracked entry of the given kind and mark it
    /// ready to hand back to the caller.
    pub fn set_status(&mut self, kind: RequestKind, status: StatusCode) -> Result<(), QueueError> {
        let idx = self.position_of(kind).ok_or(QueueError::NotFound)?;
        if let Some(entry) = &mut self.entries[idx] {
            entry.status = status;
            entry.ready_to_handle = true;
        }
        Ok(())
    }

    /// Set `status` on every tracked entry, marking ready only the entries
    /// whose `restrict_common_ready` is false.
    pub fn set_status_common(&mut self, status: StatusCode) {
        self.common_status = Some(status);
        for i in 0..self.len {
            let idx = (self.head + i) % CAPACITY;
            if let Some(entry) = &mut self.entries[idx] {
                entry.status = status;
                if !entry.restrict_common_ready {
                    entry.ready_to_handle = true;
                }
            }
        }
    }

    /// Whether an entry of the given kind is currently tracked.
    pub fn is_cmd_active(&self, kind: RequestKind) -> bool {
        self.position_of(kind).is_some()
    }

    /// Status of the tracked entry of the given kind, if any.
    pub fn get_status(&self, kind: RequestKind) -> Option<StatusCode> {
        self.position_of(kind)
            .and_then(|idx| self.entries[idx].map(|e| e.status))
    }

    /// Status last applied by `set_status_common`, if any.
    pub fn get_common_status(&self) -> Option<StatusCode> {
        self.common_status
    }

    /// Drain one pass over the ring: every entry that is ready to handle is
    /// delivered to `callback` and dropped; entries not yet ready are
    /// re-appended to the tail, preserving relative order so a not-yet-ready
    /// confirmation can be overtaken by a later request that completed first.
    pub fn handle_all<F: FnMut(RequestKind, StatusCode)>(&mut self, mut callback: F) {
        let original_len = self.len;
        for _ in 0..original_len {
            let idx = self.head;
            let entry = self.entries[idx].take().expect("ring invariant violated");
            self.head = (self.head + 1) % CAPACITY;
            self.len -= 1;

            if entry.ready_to_handle {
                callback(entry.kind, entry.status);
            } else {
                let tail = (self.head + self.len) % CAPACITY;
                self.entries[tail] = Some(entry);
                self.len += 1;
            }
        }
    }
}

impl Default for ConfirmQueue {
    fn default() -> Self {
        Self::new()
    }
}
