//! Cooperative timing facility: a monotonic `Clock` plus a non-blocking
//! `Timer` modeled on `embedded-hal`'s timer traits and the `nb` crate's
//! polling convention.
//!
//! An IRQ or timer expiry only ever sets a flag; the event loop
//! ([`crate::lorawan::mac::MacLayer::process`]) is the only place that flag
//! is observed and acted on, via [`Timer::poll`] returning
//! `Err(nb::Error::WouldBlock)` until the deadline.

use core::convert::Infallible;

/// A free-running monotonic millisecond clock.
pub trait Clock {
    /// Current time in milliseconds since an arbitrary epoch. Must never go
    /// backwards.
    fn now_ms(&self) -> u64;
}

/// A single-shot, non-blocking deadline timer.
pub trait Timer {
    /// Arm the timer to fire `duration_ms` from now.
    fn start(&mut self, duration_ms: u32);

    /// Poll the timer. Returns `Err(nb::Error::WouldBlock)` until the
    /// deadline has passed, then `Ok(())` exactly once.
    fn poll(&mut self) -> nb::Result<(), Infallible>;

    /// Cancel a pending deadline; a subsequent `poll` returns `WouldBlock`
    /// until `start` is called again.
    fn cancel(&mut self);
}

/// A software timer built on any [`Clock`], useful for hosts/tests that have
/// no hardware timer peripheral.
pub struct SoftwareTimer<'a, C: Clock> {
    clock: &'a C,
    deadline_ms: Option<u64>,
}

impl<'a, C: Clock> SoftwareTimer<'a, C> {
    /// Build a software timer reading from `clock`.
    pub fn new(clock: &'a C) -> Self {
        Self {
            clock,
            deadline_ms: None,
        }
    }
}

impl<'a, C: Clock> Timer for SoftwareTimer<'a, C> {
    fn start(&mut self, duration_ms: u32) {
        self.deadline_ms = Some(self.clock.now_ms() + duration_ms as u64);
    }

    fn poll(&mut self) -> nb::Result<(), Infallible> {
        match self.deadline_ms {
            Some(deadline) if self.clock.now_ms() >= deadline => {
                self.deadline_ms = None;
                Ok(())
            }
            Some(_) => Err(nb::Error::WouldBlock),
            None => Err(nb::Error::WouldBlock),
        }
    }

    fn cancel(&mut self) {
        self.deadline_ms = None;
    }
}
