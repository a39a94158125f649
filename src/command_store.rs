//! Bounded, insertion-ordered store of pending MAC commands awaiting piggy-back
//! onto the next uplink.
//!
//! Backed by an explicit arena of `Option<Entry>` plus an insertion-order
//! index list, rather than scanning fixed slots for an all-zero-byte "free"
//! sentinel: a legitimate zero-payload command (e.g. `DutyCycleAns`) would
//! otherwise be indistinguishable from an empty slot.

use heapless::Vec;

use crate::commands::MacCommand;

/// Maximum number of pending commands the store can hold at once.
pub const CAPACITY: usize = 15;

/// Maximum payload size of a single stored command.
pub const MAX_PAYLOAD: usize = 2;

/// Errors raised by the command store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The store is at capacity.
    NoMemory,
    /// No entry with the requested CID exists.
    NotFound,
}

#[derive(Debug, Clone)]
struct Entry {
    cid: u8,
    payload: Vec<u8, MAX_PAYLOAD>,
    sticky: bool,
}

/// The pending-MAC-command store (C3).
#[derive(Debug)]
pub struct CommandStore {
    slots: [Option<Entry>; CAPACITY],
    order: Vec<usize, CAPACITY>,
    serialized_size: usize,
    dirty: bool,
}

impl CommandStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            order: Vec::new(),
            serialized_size: 0,
            dirty: false,
        }
    }

    /// Number of commands currently stored.
    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// Total bytes a `serialize` of the current contents would need, i.e.
    /// `Σ (1 + payload-size)` over all entries.
    pub fn serialized_size(&self) -> usize {
        self.serialized_size
    }

    /// Whether an entry with this CID is already stored.
    pub fn contains(&self, cid: u8) -> bool {
        self.find(cid).is_some()
    }

    /// First stored entry with the given CID.
    fn find(&self, cid: u8) -> Option<usize> {
        self.order
            .iter()
            .copied()
            .find(|&idx| self.slots[idx].as_ref().map(|e| e.cid) == Some(cid))
    }

    fn first_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    /// Add a command to the store. Fails with `NoMemory` at capacity.
    ///
    /// Callers are responsible for the uniqueness invariant (one live entry
    /// per request kind); the store itself does not reject duplicates.
    pub fn add(&mut self, command: &MacCommand) -> Result<(), StoreError> {
        let slot = self.first_free_slot().ok_or(StoreError::NoMemory)?;
        let payload = command.to_bytes();
        let mut bounded: Vec<u8, MAX_PAYLOAD> = Vec::new();
        bounded
            .extend_from_slice(&payload[..payload.len().min(MAX_PAYLOAD)])
            .ok();
        self.order.push(slot).map_err(|_| StoreError::NoMemory)?;
        self.serialized_size += 1 + bounded.len();
        self.slots[slot] = Some(Entry {
            cid: command.cid(),
            payload: bounded,
            sticky: command.is_sticky_answer(),
        });
        self.mark_dirty();
        Ok(())
    }

    fn remove_at(&mut self, order_pos: usize) {
        let slot = self.order.remove(order_pos);
        if let Some(entry) = self.slots[slot].take() {
            self.serialized_size -= 1 + entry.payload.len();
        }
        self.mark_dirty();
    }

    /// Remove the first entry with the given CID.
    pub fn remove(&mut self, cid: u8) -> Result<(), StoreError> {
        let pos = self
            .order
            .iter()
            .position(|&idx| self.slots[idx].as_ref().map(|e| e.cid) == Some(cid))
            .ok_or(StoreError::NotFound)?;
        self.remove_at(pos);
        Ok(())
    }

    /// Remove every entry that is not a sticky answer.
    pub fn remove_non_sticky(&mut self) {
        let mut pos = 0;
        while pos < self.order.len() {
            let slot = self.order[pos];
            let sticky = self.slots[slot].as_ref().map(|e| e.sticky).unwrap_or(false);
            if sticky {
                pos += 1;
            } else {
                self.remove_at(pos);
            }
        }
    }

    /// Remove every sticky-answer entry (once a downlink has ACKed them).
    pub fn remove_sticky_answers(&mut self) {
        let mut pos = 0;
        while pos < self.order.len() {
            let slot = self.order[pos];
            let sticky = self.slots[slot].as_ref().map(|e| e.sticky).unwrap_or(false);
            if sticky {
                self.remove_at(pos);
            } else {
                pos += 1;
            }
        }
    }

    /// Serialize stored commands in insertion order into `out`, dropping
    /// (not retaining) any command that does not fit within `max_bytes`: the
    /// wire format cannot split a command, and the network re-requests it if
    /// still needed. Returns the number of bytes written and whether any
    /// command was dropped.
    pub fn serialize(&mut self, max_bytes: usize) -> (usize, bool) {
        let mut written = 0;
        let mut truncated = false;
        let mut pos = 0;

        while pos < self.order.len() {
            let slot = self.order[pos];
            let entry_len = self.slots[slot]
                .as_ref()
                .map(|e| 1 + e.payload.len())
                .unwrap_or(0);
            if written + entry_len <= max_bytes {
                written += entry_len;
                pos += 1;
            } else {
                truncated = true;
                self.remove_at(pos);
            }
        }

        (written, truncated)
    }

    /// Write the serialized command bytes (CID followed by payload, in
    /// insertion order) into `out`. Does not mutate the store; call
    /// [`CommandStore::serialize`] first to drop oversized entries.
    pub fn write_into(&self, out: &mut Vec<u8, 15>) {
        for &slot in self.order.iter() {
            if let Some(entry) = &self.slots[slot] {
                let _ = out.push(entry.cid);
                let _ = out.extend_from_slice(&entry.payload);
            }
        }
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Consume the NVM-dirty flag set by the last mutating operation. The
    /// engine debounces this into a single store per idle transition.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.dirty, false)
    }
}

impl Default for CommandStore {
    fn default() -> Self {
        Self::new()
    }
}
