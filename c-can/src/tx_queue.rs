//! The transmit ring and the credit that meters it.
//!
//! The sixteen transmit slots are used as a ring driven by two monotonically
//! increasing cursors. `next` points at the slot the next submission goes
//! into, `echo` at the oldest submission not yet confirmed by the hardware;
//! their difference is the in-flight count. Slots transmit in submission
//! order because the hardware serves the lowest pending slot number first
//! and the ring never wraps past `echo`.
//!
//! Senders do not take the device lock to find out whether the ring has
//! room. They first take one unit of [`TxCredit`], an atomic counting
//! semaphore with one unit per transmit slot, and only then call
//! [`Can::transmit`] under the lock.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use crate::bus::Can;
use crate::interface::Window;
use crate::message::Frame;
use crate::object::{slot_bit, TX_FIRST, TX_OBJECTS};
use crate::reg::Register;
use c_can_core::{Dependencies, RegisterBus};

/// The credit was destroyed; the controller is stopped or bus off.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CreditClosed;

/// Counting semaphore metering transmit submissions.
///
/// Armed with [`TX_OBJECTS`] units when the controller starts and destroyed
/// when it stops or goes bus off, which fails pending and future acquires
/// with [`CreditClosed`].
pub struct TxCredit {
    available: AtomicU16,
    open: AtomicBool,
}

impl TxCredit {
    /// A destroyed credit; armed by [`Can::start`](crate::bus::Can::start).
    pub const fn new() -> Self {
        Self {
            available: AtomicU16::new(0),
            open: AtomicBool::new(false),
        }
    }

    /// Take one unit. Returns `WouldBlock` while all units are handed out,
    /// so callers may spin with `nb::block!` or retry from their own wait
    /// primitive.
    pub fn acquire(&self) -> nb::Result<(), CreditClosed> {
        if !self.open.load(Ordering::Acquire) {
            return Err(nb::Error::Other(CreditClosed));
        }
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |credit| {
                credit.checked_sub(1)
            })
            .map(|_| ())
            .map_err(|_| nb::Error::WouldBlock)
    }

    /// Units currently available.
    pub fn available(&self) -> u16 {
        self.available.load(Ordering::Acquire)
    }

    pub fn arm(&self) {
        self.available.store(TX_OBJECTS, Ordering::Release);
        self.open.store(true, Ordering::Release);
    }

    pub fn destroy(&self) {
        self.open.store(false, Ordering::Release);
        self.available.store(0, Ordering::Release);
    }

    /// Return one unit, saturating at `limit`. Releases against a destroyed
    /// credit are dropped.
    pub(crate) fn release(&self, limit: u16) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        let _ = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |credit| {
                (credit < limit).then(|| credit + 1)
            });
    }
}

impl Default for TxCredit {
    fn default() -> Self {
        Self::new()
    }
}

/// Submission and confirmation cursors of the transmit ring.
#[derive(Debug, Copy, Clone)]
pub(crate) struct TxCursors {
    pub(crate) next: u32,
    pub(crate) echo: u32,
}

impl TxCursors {
    pub(crate) fn new() -> Self {
        Self { next: 0, echo: 0 }
    }

    pub(crate) fn in_flight(&self) -> u32 {
        self.next.wrapping_sub(self.echo)
    }

    /// Transmit slot a cursor value maps to.
    pub(crate) fn slot(cursor: u32) -> u8 {
        (cursor % u32::from(TX_OBJECTS)) as u8 + TX_FIRST
    }
}

impl<B: RegisterBus, D: Dependencies> Can<'_, B, D> {
    /// Load `frame` into the next free transmit slot and request its
    /// transmission.
    ///
    /// The caller must hold one unit of the [`TxCredit`] per call, which
    /// guarantees a free slot; a full ring is still answered with
    /// `WouldBlock` rather than corrupting an in-flight slot.
    pub fn transmit(&mut self, frame: &Frame) -> nb::Result<(), Infallible> {
        if self.tx.in_flight() >= u32::from(TX_OBJECTS) {
            return Err(nb::Error::WouldBlock);
        }
        let slot = TxCursors::slot(self.tx.next);
        self.write_transmit_object(Window::Two, slot, frame);
        self.tx.next = self.tx.next.wrapping_add(1);
        Ok(())
    }

    /// Walk the ring from `echo` and retire every slot the hardware has
    /// finished with, releasing one credit unit per retired slot. The walk
    /// stops at the first slot still transmitting, releasing a single unit
    /// for it so a sender blocked on a full ring makes progress. If nothing
    /// was retired, a unit is still released unless the ring sits exactly on
    /// a wrap boundary with confirmations outstanding.
    pub(crate) fn reconcile_tx(&mut self) {
        let mut released = 0;
        while self.tx.in_flight() > 0 {
            let slot = TxCursors::slot(self.tx.echo);
            let pending = self.read_split_reg(Register::TxRequest1, Register::TxRequest2);
            if pending & slot_bit(slot) != 0 {
                self.release_credit();
                released += 1;
                break;
            }
            self.invalidate_object(Window::One, slot);
            self.tx.echo = self.tx.echo.wrapping_add(1);
            self.release_credit();
            released += 1;
        }
        let ring = u32::from(TX_OBJECTS);
        if released == 0 && (self.tx.next % ring != 0 || self.tx.echo % ring == 0) {
            self.release_credit();
        }
    }

    /// Credit releases are clamped so that available units plus in-flight
    /// submissions never exceed the ring capacity.
    fn release_credit(&self) {
        let limit = TX_OBJECTS - self.tx.in_flight() as u16;
        self.credit.release(limit);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cursors_map_to_the_upper_slot_half() {
        assert_eq!(TxCursors::slot(0), 17);
        assert_eq!(TxCursors::slot(15), 32);
        assert_eq!(TxCursors::slot(16), 17);
        assert_eq!(TxCursors::slot(u32::MAX), 32);
    }

    #[test]
    fn in_flight_survives_cursor_wraparound() {
        let cursors = TxCursors {
            next: 2,
            echo: u32::MAX - 1,
        };
        assert_eq!(cursors.in_flight(), 4);
    }

    #[test]
    fn credit_hands_out_exactly_its_capacity() {
        let credit = TxCredit::new();
        credit.arm();
        for _ in 0..TX_OBJECTS {
            assert_eq!(credit.acquire(), Ok(()));
        }
        assert_eq!(credit.acquire(), Err(nb::Error::WouldBlock));
        assert_eq!(credit.available(), 0);
    }

    #[test]
    fn release_saturates_at_the_limit() {
        let credit = TxCredit::new();
        credit.arm();
        credit.release(TX_OBJECTS);
        assert_eq!(credit.available(), TX_OBJECTS);

        assert_eq!(credit.acquire(), Ok(()));
        assert_eq!(credit.acquire(), Ok(()));
        credit.release(15);
        credit.release(15);
        credit.release(15);
        assert_eq!(credit.available(), 15);
    }

    #[test]
    fn destroyed_credit_fails_acquire_and_drops_releases() {
        let credit = TxCredit::new();
        credit.arm();
        credit.destroy();
        assert_eq!(credit.acquire(), Err(nb::Error::Other(CreditClosed)));
        credit.release(TX_OBJECTS);
        assert_eq!(credit.available(), 0);
    }

    #[test]
    fn new_credit_starts_destroyed() {
        let credit = TxCredit::new();
        assert_eq!(credit.acquire(), Err(nb::Error::Other(CreditClosed)));
    }
}
