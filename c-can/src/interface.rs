//! The interface window protocol.
//!
//! The message RAM is not memory mapped. Each of its 32 slots is moved in or
//! out through one of two identical register windows: software selects the
//! fields to transfer in the command mask register, writes the slot number to
//! the command request register, and the hardware copies the selected fields
//! between the window's shadow registers and the RAM. While the copy runs the
//! command request register reads back with its busy flag set.
//!
//! A transfer takes at most a few module clocks, so the busy flag is polled
//! with a small budget. A controller that stays busy past the budget is
//! broken in a way software cannot fix; the condition is logged and the
//! transfer treated as done, mirroring what the hardware would deliver
//! anyway.

use crate::bus::Can;
use crate::reg::{command, Register, IF_COMMAND_BUSY};
use c_can_core::{Dependencies, RegisterBus};

/// One of the two interface register windows.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Window {
    /// First window, used by the interrupt paths.
    One,
    /// Second window, used by transmit submission.
    Two,
}

impl Window {
    pub fn index(self) -> usize {
        match self {
            Window::One => 0,
            Window::Two => 1,
        }
    }
}

/// Busy polls before a transfer is declared stuck.
const BUSY_POLL_BUDGET: u32 = 6;

struct Stuck;

impl<B: RegisterBus, D: Dependencies> Can<'_, B, D> {
    /// Pull the selected fields of `slot` into the window's shadow
    /// registers.
    pub(crate) fn window_get(&self, window: Window, slot: u8, fields: u16) {
        self.write_reg(Register::IfCommandMask(window), fields);
        self.write_reg(Register::IfCommandRequest(window), u16::from(slot));
        if self.wait_window_ready(window).is_err() {
            log::error!("timed out reading message object {}", slot);
        }
    }

    /// Push the selected shadow registers of the window into `slot`.
    pub(crate) fn window_put(&self, window: Window, slot: u8, fields: u16) {
        self.write_reg(Register::IfCommandMask(window), command::WR | fields);
        self.write_reg(Register::IfCommandRequest(window), u16::from(slot));
        if self.wait_window_ready(window).is_err() {
            log::error!("timed out writing message object {}", slot);
        }
    }

    fn wait_window_ready(&self, window: Window) -> Result<(), Stuck> {
        for _ in 0..BUSY_POLL_BUDGET {
            if self.read_reg(Register::IfCommandRequest(window)) & IF_COMMAND_BUSY == 0 {
                return Ok(());
            }
            self.dependencies.delay_us(1);
        }
        Err(Stuck)
    }
}
