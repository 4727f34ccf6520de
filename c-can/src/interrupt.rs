//! Interrupt dispatch.
//!
//! The interrupt register holds the number of the lowest slot with a pending
//! interrupt, or a sentinel value for a status interrupt. Exactly one source
//! is serviced per invocation; servicing it drops the register to the next
//! pending source, which raises the line again.

use crate::bus::{BusState, Can};
use crate::message::{BusError, ErrorEvent};
use crate::object::{RX_FIRST, RX_LAST, TX_FIRST};
use crate::object::LAST_SLOT;
use crate::reg::{Lec, Register, Status, STATUS_INTERRUPT};
use crate::sink::{FrameSink, SinkGuard};
use c_can_core::{Dependencies, RegisterBus};

/// Outcome of [`Can::interrupt`], for platforms with a shared interrupt
/// line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqStatus {
    /// The controller raised the interrupt and it was serviced.
    Handled,
    /// The controller shows no pending interrupt.
    NotMine,
}

impl<B: RegisterBus, D: Dependencies> Can<'_, B, D> {
    /// Service one pending interrupt source.
    ///
    /// To be called from the platform's interrupt handler with the device
    /// lock held. Module interrupts are masked while the source is serviced
    /// and unmasked on return, except after going bus off; everything the
    /// service produces is pushed into `sink`.
    pub fn interrupt<S: FrameSink>(&mut self, sink: &mut S) -> IrqStatus {
        let source = self.read_reg(Register::Interrupt);
        if source == 0 {
            return IrqStatus::NotMine;
        }
        self.enable_interrupts(false);
        let mut sink = SinkGuard::new(sink);

        let mut outcome = IrqStatus::NotMine;
        if source == STATUS_INTERRUPT {
            self.handle_status_interrupt(&mut sink);
            outcome = IrqStatus::Handled;
        } else if (u16::from(RX_FIRST)..=u16::from(RX_LAST)).contains(&source) {
            self.rx_poll(&mut sink);
            outcome = IrqStatus::Handled;
        } else if (u16::from(TX_FIRST)..=u16::from(LAST_SLOT)).contains(&source) {
            self.reconcile_tx();
            sink.loopback();
            outcome = IrqStatus::Handled;
        }

        drop(sink);
        if self.state != BusState::BusOff {
            self.enable_interrupts(true);
        }
        outcome
    }

    fn handle_status_interrupt<S: FrameSink>(&mut self, sink: &mut SinkGuard<'_, S>) {
        let status = Status::from_bits(self.read_reg(Register::Status));

        // TXOK/RXOK are sticky until written back clear.
        let mut writeback = status;
        writeback.set_tx_ok(false);
        writeback.set_rx_ok(false);
        if status.tx_ok() || status.rx_ok() {
            self.write_reg(Register::Status, writeback.bits());
        }

        let last = self.last_status;
        let counters = self.error_counters();
        if status.warning() && !last.warning() {
            log::warn!("error warning level reached");
            self.state = BusState::ErrorWarning;
            sink.deliver_error(ErrorEvent::StateChange {
                state: self.state,
                counters,
            });
        }
        if status.passive() && !last.passive() {
            log::warn!("entering error passive state");
            self.state = BusState::ErrorPassive;
            sink.deliver_error(ErrorEvent::StateChange {
                state: self.state,
                counters,
            });
        }
        if status.bus_off() && !last.bus_off() {
            log::error!("bus off");
            self.state = BusState::BusOff;
            // Wake blocked senders; the ring is dead until a restart.
            self.credit.destroy();
            sink.deliver_error(ErrorEvent::StateChange {
                state: self.state,
                counters,
            });
        }
        if !status.bus_off() && last.bus_off() {
            self.state = BusState::ErrorActive;
        }
        if !status.passive() && last.passive() && !status.bus_off() {
            self.state = BusState::ErrorActive;
        }
        self.last_status = status;

        let error = match Lec::from_bits(status.lec()) {
            Lec::NoError | Lec::Unused => None,
            Lec::Stuff => Some(BusError::Stuff),
            Lec::Form => Some(BusError::Form),
            Lec::Ack => Some(BusError::Acknowledge),
            Lec::Bit1 => Some(BusError::Bit1),
            Lec::Bit0 => Some(BusError::Bit0),
            Lec::Crc => Some(BusError::Crc),
        };
        if let Some(error) = error {
            sink.deliver_error(ErrorEvent::Bus(error));
            // Reset the field to its sentinel so the next bus error is
            // observable.
            self.write_reg(Register::Status, Lec::Unused as u16);
        }
    }
}
