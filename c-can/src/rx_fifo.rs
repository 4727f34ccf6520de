//! The receive FIFO engine.
//!
//! Slots 1..=16 form a hardware FIFO: a matching frame lands in the lowest
//! free slot, so frames must be drained in ascending slot order to preserve
//! their arrival order. Reactivating a drained slot makes it eligible again,
//! and doing that too early lets a new frame overtake older ones still
//! sitting in higher slots. The engine therefore splits the FIFO at
//! [`RX_SPLIT`](crate::object::RX_SPLIT): slots below the split keep their
//! new-data flag after draining and are only rearmed in one sweep once the
//! split slot itself is processed, while slots above it are rearmed
//! immediately.

use crate::bus::Can;
use crate::interface::Window;
use crate::message::ErrorEvent;
use crate::object::{slot_bit, RX_FIRST, RX_LAST, RX_SPLIT};
use crate::reg::{command, MessageControl, Register};
use crate::sink::{FrameSink, SinkGuard};
use c_can_core::{Dependencies, RegisterBus};

impl<B: RegisterBus, D: Dependencies> Can<'_, B, D> {
    /// Drain every receive slot flagged in the interrupt-pending bitmap, in
    /// ascending slot order. The bitmap is sampled once; frames arriving
    /// during the drain raise a fresh interrupt.
    pub(crate) fn rx_poll<S: FrameSink>(&mut self, sink: &mut SinkGuard<'_, S>) -> usize {
        let mut received = 0;
        let pending = self.read_split_reg(Register::IntPending1, Register::IntPending2);
        for slot in RX_FIRST..=RX_LAST {
            if pending & slot_bit(slot) == 0 {
                continue;
            }
            let window = Window::One;
            self.window_get(window, slot, command::ALL & !command::TXRQST);
            let control =
                MessageControl::from_bits(self.read_reg(Register::IfMessageControl(window)));

            if control.message_lost() {
                log::error!("receive overrun on slot {}", slot);
                self.release_lost_object(window, slot, control);
                sink.deliver_error(ErrorEvent::ReceiveOverrun { slot });
                received += 1;
                continue;
            }
            // The end-of-block slot only fills when the FIFO is exhausted;
            // it is left pending for the next poll.
            if control.end_of_block() {
                break;
            }
            if !control.new_data() {
                continue;
            }

            let frame = self.read_object(window, control);
            match slot {
                _ if slot < RX_SPLIT => self.reactivate(window, slot, control, false),
                _ if slot > RX_SPLIT => self.reactivate(window, slot, control, true),
                _ => {
                    for low in RX_FIRST..=RX_SPLIT {
                        self.reactivate(window, low, control, true);
                    }
                }
            }
            sink.deliver(frame);
            received += 1;
        }
        received
    }

    /// Rearm a drained slot. Below the split the new-data flag stays set so
    /// the hardware cannot refill the slot out of order.
    fn reactivate(&self, window: Window, slot: u8, control: MessageControl, clear_new_data: bool) {
        let mut control = control;
        control.set_message_lost(false);
        control.set_interrupt_pending(false);
        if clear_new_data {
            control.set_new_data(false);
        }
        self.write_reg(Register::IfMessageControl(window), control.bits());
        self.window_put(window, slot, command::CONTROL);
    }

    /// A frame was overwritten before it could be read. The slot stays
    /// blocked until its message-lost flag is cleared, so rearm it fully.
    fn release_lost_object(&self, window: Window, slot: u8, control: MessageControl) {
        let mut control = control;
        control.set_message_lost(false);
        control.set_interrupt_pending(false);
        control.set_new_data(false);
        self.write_reg(Register::IfMessageControl(window), control.bits());
        self.window_put(window, slot, command::CONTROL);
    }
}
