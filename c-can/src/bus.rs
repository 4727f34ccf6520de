//! Controller bring-up, shutdown and bus fault state.

use crate::config::{BitTimingError, CanConfig, OperatingMode};
use crate::interface::Window;
use crate::message::ErrorCounters;
use crate::reg::{control, control_ex, test as test_mode, Lec, Register, RegisterLayout, Status};
use crate::reg::{C_CAN_LAYOUT, D_CAN_LAYOUT};
use crate::tx_queue::{TxCredit, TxCursors};
use c_can_core::{Dependencies, IrqError, RegisterBus};

/// Silicon incarnation of the register block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// The original C_CAN block.
    CCan,
    /// The D_CAN block, with power-down support and a wider register map.
    DCan,
}

impl Variant {
    fn layout(self) -> &'static RegisterLayout {
        match self {
            Variant::CCan => &C_CAN_LAYOUT,
            Variant::DCan => &D_CAN_LAYOUT,
        }
    }
}

/// Fault confinement state of the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    /// Not started, or stopped; not taking part in bus traffic.
    Stopped,
    /// Normal operation, errors are signalled actively.
    ErrorActive,
    /// Operating, but an error counter has passed the warning level (96).
    ErrorWarning,
    /// An error counter has passed 127; errors are only signalled passively.
    ErrorPassive,
    /// The transmit error counter overflowed; the controller has left the
    /// bus until restarted.
    BusOff,
    /// Local power down (D_CAN).
    Sleeping,
}

impl BusState {
    /// The controller takes part in bus traffic, or did until it went bus
    /// off.
    pub fn is_operating(self) -> bool {
        matches!(
            self,
            BusState::ErrorActive
                | BusState::ErrorWarning
                | BusState::ErrorPassive
                | BusState::BusOff
        )
    }
}

/// Errors reported by the controller operations.
#[derive(Debug)]
pub enum Error {
    /// The configured bit timing cannot be realized.
    BitTiming(BitTimingError),
    /// The platform could not attach the interrupt line.
    Irq(IrqError),
    /// The operation does not exist on this [`Variant`].
    NotSupported,
    /// The hardware did not acknowledge a power state change in time.
    Timeout,
}

impl From<BitTimingError> for Error {
    fn from(value: BitTimingError) -> Self {
        Self::BitTiming(value)
    }
}

impl From<IrqError> for Error {
    fn from(value: IrqError) -> Self {
        Self::Irq(value)
    }
}

/// Budget for a power state change acknowledge, polled every 100 µs.
const POWER_WAIT_POLLS: u32 = 10_000;

/// A C_CAN/D_CAN controller.
///
/// All methods take `&mut self`; the platform serializes access between
/// thread and interrupt context with whatever lock it has. The only piece
/// shared outside that lock is the [`TxCredit`], which meters transmit
/// submissions with atomics and is therefore borrowed rather than owned.
pub struct Can<'a, B, D> {
    pub(crate) bus: B,
    pub(crate) dependencies: D,
    pub(crate) layout: &'static RegisterLayout,
    variant: Variant,
    config: CanConfig,
    pub(crate) state: BusState,
    pub(crate) last_status: Status,
    pub(crate) tx: TxCursors,
    pub(crate) credit: &'a TxCredit,
}

impl<'a, B: RegisterBus, D: Dependencies> Can<'a, B, D> {
    /// Wrap a register bus into a stopped controller.
    pub fn new(
        variant: Variant,
        bus: B,
        dependencies: D,
        config: CanConfig,
        credit: &'a TxCredit,
    ) -> Self {
        Self {
            bus,
            dependencies,
            layout: variant.layout(),
            variant,
            config,
            state: BusState::Stopped,
            last_status: Status::from_bits(0),
            tx: TxCursors::new(),
            credit,
        }
    }

    pub(crate) fn read_reg(&self, register: Register) -> u16 {
        self.bus.read(self.layout.offset(register))
    }

    pub(crate) fn write_reg(&self, register: Register, value: u16) {
        self.bus.write(self.layout.offset(register), value);
    }

    /// Read one of the split slot bitmaps as a single 32-bit value, slot 1
    /// in bit 0 and slot 32 in bit 31.
    pub(crate) fn read_split_reg(&self, low: Register, high: Register) -> u32 {
        u32::from(self.read_reg(low)) | u32::from(self.read_reg(high)) << 16
    }

    /// Current fault confinement state.
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Sample the hardware error counters.
    pub fn error_counters(&self) -> ErrorCounters {
        ErrorCounters::from_bits(self.read_reg(Register::ErrorCount))
    }

    /// Take the controller onto the bus.
    ///
    /// From [`BusState::Stopped`] this attaches the interrupt line and powers
    /// the block before configuring it; a restart from [`BusState::BusOff`]
    /// reconfigures only. In any operating state this does nothing.
    pub fn start(&mut self) -> Result<(), Error> {
        match self.state {
            BusState::Stopped => {
                self.dependencies.request_irq()?;
                self.dependencies.power_get();
                self.dependencies.enable_message_ram(true);
                self.restart()
            }
            BusState::BusOff => self.restart(),
            _ => Ok(()),
        }
    }

    fn restart(&mut self) -> Result<(), Error> {
        self.chip_config()?;
        self.tx = TxCursors::new();
        self.last_status = Status::from_bits(0);
        self.state = BusState::ErrorActive;
        self.credit.arm();
        self.enable_interrupts(true);
        Ok(())
    }

    /// Take the controller off the bus and release its resources.
    ///
    /// Pending transmissions are dropped and waiters blocked on the
    /// [`TxCredit`] are woken with an error.
    pub fn stop(&mut self) {
        if !self.state.is_operating() {
            return;
        }
        self.enable_interrupts(false);
        // Park the controller in initialization mode; it leaves the bus.
        self.write_reg(Register::Control, control::INIT);
        self.credit.destroy();
        self.state = BusState::Stopped;
        self.dependencies.release_irq();
        self.dependencies.enable_message_ram(false);
        self.dependencies.power_put();
        log::debug!("controller stopped");
    }

    /// Set or clear the module interrupt enables.
    pub(crate) fn enable_interrupts(&self, enable: bool) {
        let mut ctrl = self.read_reg(Register::Control);
        if enable {
            ctrl |= control::ALL_INTERRUPTS;
        } else {
            ctrl &= !control::ALL_INTERRUPTS;
        }
        self.write_reg(Register::Control, ctrl);
    }

    fn chip_config(&mut self) -> Result<(), Error> {
        let mut ctrl = control::ENABLE_AR;
        let test_bits = match self.config.operating_mode {
            OperatingMode::Normal => 0,
            OperatingMode::Loopback => test_mode::LBACK,
            OperatingMode::Silent => test_mode::SILENT,
            OperatingMode::LoopbackSilent => test_mode::LBACK | test_mode::SILENT,
        };
        if test_bits != 0 {
            ctrl |= control::TEST;
        }
        self.write_reg(Register::Control, ctrl);
        if test_bits != 0 {
            self.write_reg(Register::Test, test_bits);
        }
        self.apply_bit_timing()?;
        self.configure_message_objects();
        // Clear TXOK/RXOK and reset the last error code to its sentinel.
        self.write_reg(Register::Status, Lec::Unused as u16);
        Ok(())
    }

    /// Write the bit timing registers. They are only writable while both
    /// configuration change enable and initialization mode are set.
    fn apply_bit_timing(&mut self) -> Result<(), BitTimingError> {
        let clock = self.dependencies.can_clock();
        let (btr, brpe) = self.config.bit_timing.registers(clock)?;
        let saved = self.read_reg(Register::Control);
        self.write_reg(Register::Control, saved | control::CCE | control::INIT);
        self.write_reg(Register::BitTiming, btr);
        self.write_reg(Register::BrpExt, brpe);
        self.write_reg(Register::Control, saved);
        log::info!("bit timing: BTR {:#06x}, BRPE {:#06x}", btr, brpe);
        Ok(())
    }

    fn configure_message_objects(&mut self) {
        for slot in crate::object::FIRST_SLOT..=crate::object::LAST_SLOT {
            self.invalidate_object(Window::One, slot);
        }
        // Every receive slot accepts everything; the last one terminates the
        // FIFO block.
        for slot in crate::object::RX_FIRST..=crate::object::RX_LAST {
            let mut control = crate::reg::MessageControl::from_bits(0);
            control.set_rx_interrupt(true);
            control.set_use_mask(true);
            control.set_end_of_block(slot == crate::object::RX_LAST);
            self.setup_receive_object(Window::One, slot, 0, 0, control);
        }
    }

    /// Request a local power down and wait for the hardware to acknowledge
    /// it. Only the D_CAN incarnation supports this.
    pub fn power_down(&mut self) -> Result<(), Error> {
        if self.variant != Variant::DCan {
            return Err(Error::NotSupported);
        }
        let ctrl_ex = self.read_reg(Register::ControlEx);
        self.write_reg(Register::ControlEx, ctrl_ex | control_ex::PDR);
        self.wait_power_acknowledge(true)?;
        self.enable_interrupts(false);
        self.credit.destroy();
        self.state = BusState::Sleeping;
        self.dependencies.enable_message_ram(false);
        self.dependencies.power_put();
        Ok(())
    }

    /// Wake the controller from a local power down and put it back on the
    /// bus.
    pub fn power_up(&mut self) -> Result<(), Error> {
        if self.variant != Variant::DCan {
            return Err(Error::NotSupported);
        }
        if self.state != BusState::Sleeping {
            return Ok(());
        }
        self.dependencies.power_get();
        self.dependencies.enable_message_ram(true);
        let ctrl_ex = self.read_reg(Register::ControlEx);
        self.write_reg(Register::ControlEx, ctrl_ex & !control_ex::PDR);
        let ctrl = self.read_reg(Register::Control);
        self.write_reg(Register::Control, ctrl & !control::INIT);
        self.wait_power_acknowledge(false)?;
        self.restart()
    }

    fn wait_power_acknowledge(&self, set: bool) -> Result<(), Error> {
        for _ in 0..POWER_WAIT_POLLS {
            let status = Status::from_bits(self.read_reg(Register::Status));
            if status.pda() == set {
                return Ok(());
            }
            self.dependencies.delay_us(100);
        }
        log::error!("power state change not acknowledged");
        Err(Error::Timeout)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn operating_states() {
        assert!(!BusState::Stopped.is_operating());
        assert!(!BusState::Sleeping.is_operating());
        assert!(BusState::ErrorActive.is_operating());
        assert!(BusState::ErrorWarning.is_operating());
        assert!(BusState::ErrorPassive.is_operating());
        assert!(BusState::BusOff.is_operating());
    }
}
