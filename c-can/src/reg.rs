//! Register map and bit-level views of the controller's register file.
//!
//! The C_CAN and D_CAN incarnations of the block expose the same registers at
//! different offsets; [`RegisterLayout`] captures one such mapping and the two
//! known tables are provided as [`C_CAN_LAYOUT`] and [`D_CAN_LAYOUT`]. All
//! registers are 16 bits wide. The 32-slot message RAM is not addressable
//! here; it is reached through the two interface windows (see
//! [`crate::interface`]).

use bitfield::bitfield;

use crate::interface::Window;

/// Logical register index, resolved to an offset by a [`RegisterLayout`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Register {
    /// Module control (CAN control register).
    Control,
    /// Control extension register (D_CAN only; carries the power-down request
    /// bit).
    ControlEx,
    /// Status register (bus state, TXOK/RXOK, last error code).
    Status,
    /// Error counter register.
    ErrorCount,
    /// Bit timing register.
    BitTiming,
    /// Interrupt status register.
    Interrupt,
    /// Test register (loopback/silent control).
    Test,
    /// Baud rate prescaler extension register.
    BrpExt,
    /// Interface command request register of `Window`.
    IfCommandRequest(Window),
    /// Interface command mask register of `Window`.
    IfCommandMask(Window),
    /// Interface mask register, low half.
    IfMask1(Window),
    /// Interface mask register, high half.
    IfMask2(Window),
    /// Interface arbitration register, low half.
    IfArb1(Window),
    /// Interface arbitration register, high half.
    IfArb2(Window),
    /// Interface message control register.
    IfMessageControl(Window),
    /// Interface data register holding bytes `2 * word` and `2 * word + 1`.
    /// `word` is in `0..4`.
    IfData(Window, u8),
    /// Transmission request bitmap for slots 1..=16.
    TxRequest1,
    /// Transmission request bitmap for slots 17..=32.
    TxRequest2,
    /// New-data bitmap for slots 1..=16.
    NewData1,
    /// New-data bitmap for slots 17..=32.
    NewData2,
    /// Interrupt-pending bitmap for slots 1..=16.
    IntPending1,
    /// Interrupt-pending bitmap for slots 17..=32.
    IntPending2,
    /// Message-valid bitmap for slots 1..=16.
    MessageValid1,
    /// Message-valid bitmap for slots 17..=32.
    MessageValid2,
}

/// Byte offsets of the registers for one silicon incarnation.
pub struct RegisterLayout {
    control: u16,
    control_ex: u16,
    status: u16,
    error_count: u16,
    bit_timing: u16,
    interrupt: u16,
    test: u16,
    brp_ext: u16,
    /// Base offset of each interface window's register group. The group is
    /// contiguous: command request, command mask, mask 1/2, arbitration 1/2,
    /// message control, data 1..=4, one 16-bit word apart.
    windows: [u16; 2],
    tx_request: u16,
    new_data: u16,
    int_pending: u16,
    message_valid: u16,
}

/// Register offsets of the original C_CAN incarnation.
pub const C_CAN_LAYOUT: RegisterLayout = RegisterLayout {
    control: 0x00,
    // C_CAN has no control extension register; only reachable on D_CAN.
    control_ex: 0x00,
    status: 0x02,
    error_count: 0x04,
    bit_timing: 0x06,
    interrupt: 0x08,
    test: 0x0A,
    brp_ext: 0x0C,
    windows: [0x10, 0x40],
    tx_request: 0x80,
    new_data: 0x90,
    int_pending: 0xA0,
    message_valid: 0xB0,
};

/// Register offsets of the D_CAN incarnation.
pub const D_CAN_LAYOUT: RegisterLayout = RegisterLayout {
    control: 0x00,
    control_ex: 0x02,
    status: 0x04,
    error_count: 0x08,
    bit_timing: 0x0C,
    brp_ext: 0x0E,
    interrupt: 0x10,
    test: 0x14,
    windows: [0x100, 0x120],
    tx_request: 0x88,
    new_data: 0x9C,
    int_pending: 0xB0,
    message_valid: 0xC4,
};

impl RegisterLayout {
    /// Resolve a logical register to its byte offset.
    pub fn offset(&self, register: Register) -> u16 {
        use Register::*;
        match register {
            Control => self.control,
            ControlEx => self.control_ex,
            Status => self.status,
            ErrorCount => self.error_count,
            BitTiming => self.bit_timing,
            Interrupt => self.interrupt,
            Test => self.test,
            BrpExt => self.brp_ext,
            IfCommandRequest(w) => self.window_field(w, 0),
            IfCommandMask(w) => self.window_field(w, 1),
            IfMask1(w) => self.window_field(w, 2),
            IfMask2(w) => self.window_field(w, 3),
            IfArb1(w) => self.window_field(w, 4),
            IfArb2(w) => self.window_field(w, 5),
            IfMessageControl(w) => self.window_field(w, 6),
            IfData(w, word) => self.window_field(w, 7 + word as u16),
            TxRequest1 => self.tx_request,
            TxRequest2 => self.tx_request + 2,
            NewData1 => self.new_data,
            NewData2 => self.new_data + 2,
            IntPending1 => self.int_pending,
            IntPending2 => self.int_pending + 2,
            MessageValid1 => self.message_valid,
            MessageValid2 => self.message_valid + 2,
        }
    }

    fn window_field(&self, window: Window, field: u16) -> u16 {
        self.windows[window.index()] + 2 * field
    }
}

/// Interrupt status value signalling a status interrupt rather than a slot
/// interrupt.
pub const STATUS_INTERRUPT: u16 = 0x8000;

/// Control register bits.
pub mod control {
    /// Test mode enable.
    pub const TEST: u16 = 1 << 7;
    /// Configuration change enable (unlocks the bit timing registers).
    pub const CCE: u16 = 1 << 6;
    /// Disable automatic retransmission.
    pub const DISABLE_AR: u16 = 1 << 5;
    /// Enable automatic retransmission (reset value of the AR bit).
    pub const ENABLE_AR: u16 = 0 << 5;
    /// Error interrupt enable.
    pub const EIE: u16 = 1 << 3;
    /// Status change interrupt enable.
    pub const SIE: u16 = 1 << 2;
    /// Module interrupt enable.
    pub const IE: u16 = 1 << 1;
    /// Initialization mode.
    pub const INIT: u16 = 1 << 0;
    /// All three interrupt enable bits.
    pub const ALL_INTERRUPTS: u16 = EIE | SIE | IE;
}

/// Control extension register bits (D_CAN only).
pub mod control_ex {
    /// Power-down request.
    pub const PDR: u16 = 1 << 8;
}

/// Test register bits.
pub mod test {
    /// Loopback mode.
    pub const LBACK: u16 = 1 << 4;
    /// Silent (bus monitoring) mode.
    pub const SILENT: u16 = 1 << 3;
}

/// Interface command mask bits, selecting the fields moved by a window
/// transfer.
pub mod command {
    /// Transfer direction: window to message RAM.
    pub const WR: u16 = 1 << 7;
    /// Mask field.
    pub const MASK: u16 = 1 << 6;
    /// Arbitration field.
    pub const ARB: u16 = 1 << 5;
    /// Message control field.
    pub const CONTROL: u16 = 1 << 4;
    /// Clear the slot's interrupt-pending flag on transfer.
    pub const CLR_INT_PND: u16 = 1 << 3;
    /// Transmission request handling.
    pub const TXRQST: u16 = 1 << 2;
    /// Data bytes 0..=3.
    pub const DATA_A: u16 = 1 << 1;
    /// Data bytes 4..=7.
    pub const DATA_B: u16 = 1 << 0;
    /// Every field except interrupt-pending clearing.
    pub const ALL: u16 = MASK | ARB | CONTROL | TXRQST | DATA_A | DATA_B;
}

/// Busy flag of the interface command request register.
pub const IF_COMMAND_BUSY: u16 = 1 << 15;

/// Arbitration register bits (high half).
pub mod arb {
    /// Message valid.
    pub const MSGVAL: u16 = 1 << 15;
    /// Extended (29-bit) identifier.
    pub const XTD: u16 = 1 << 14;
    /// Direction: transmit.
    pub const DIR_TX: u16 = 1 << 13;
}

/// Fixed-one reserved bit of the high mask register.
pub const MASK2_RESERVED: u16 = 1 << 13;

bitfield! {
    /// Status register view.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct Status(u16);
    impl Debug;
    /// Power-down acknowledge (D_CAN).
    pub pda, _: 10;
    /// Bus-off state.
    pub bus_off, _: 7;
    /// Error warning limit reached.
    pub warning, _: 6;
    /// Error passive state.
    pub passive, _: 5;
    /// A message was received without error since the flag was last cleared.
    pub rx_ok, set_rx_ok: 4;
    /// A message was transmitted without error since the flag was last
    /// cleared.
    pub tx_ok, set_tx_ok: 3;
    /// Last error code.
    pub u8, lec, set_lec: 2, 0;
}

impl Status {
    /// Raw register value.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// View of a raw register value.
    pub fn from_bits(bits: u16) -> Self {
        Status(bits)
    }
}

bitfield! {
    /// Message control field view.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct MessageControl(u16);
    impl Debug;
    /// The slot holds unread received data.
    pub new_data, set_new_data: 15;
    /// A frame arrived while new-data was still set; the older frame was
    /// overwritten.
    pub message_lost, set_message_lost: 14;
    /// An interrupt is pending for this slot.
    pub interrupt_pending, set_interrupt_pending: 13;
    /// Use the mask registers for acceptance filtering.
    pub use_mask, set_use_mask: 12;
    /// Raise an interrupt on successful transmission.
    pub tx_interrupt, set_tx_interrupt: 11;
    /// Raise an interrupt on reception.
    pub rx_interrupt, set_rx_interrupt: 10;
    /// Answer remote frames automatically.
    pub remote_enable, set_remote_enable: 9;
    /// Transmission requested and not yet completed.
    pub tx_request, set_tx_request: 8;
    /// End of the receive FIFO block.
    pub end_of_block, set_end_of_block: 7;
    /// Data length code.
    pub u8, dlc, set_dlc: 3, 0;
}

impl MessageControl {
    /// Raw field value.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// View of a raw field value.
    pub fn from_bits(bits: u16) -> Self {
        MessageControl(bits)
    }
}

/// Last-error-code values of the status register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lec {
    /// No error since the last reset of the field.
    NoError = 0,
    /// More than five equal bits in a row.
    Stuff = 1,
    /// Fixed-format part of a frame had the wrong format.
    Form = 2,
    /// Transmitted message was not acknowledged.
    Ack = 3,
    /// A recessive bit was sent but a dominant level was monitored.
    Bit1 = 4,
    /// A dominant bit was sent but a recessive level was monitored.
    Bit0 = 5,
    /// CRC check failed.
    Crc = 6,
    /// Sentinel written by the CPU; no bus event since the last write.
    Unused = 7,
}

impl Lec {
    /// Decode the three-bit last-error-code field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => Lec::NoError,
            1 => Lec::Stuff,
            2 => Lec::Form,
            3 => Lec::Ack,
            4 => Lec::Bit1,
            5 => Lec::Bit0,
            6 => Lec::Crc,
            _ => Lec::Unused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::Window;

    #[test]
    fn c_can_offsets_match_the_data_sheet() {
        let l = &C_CAN_LAYOUT;
        assert_eq!(l.offset(Register::Control), 0x00);
        assert_eq!(l.offset(Register::Status), 0x02);
        assert_eq!(l.offset(Register::ErrorCount), 0x04);
        assert_eq!(l.offset(Register::BitTiming), 0x06);
        assert_eq!(l.offset(Register::Interrupt), 0x08);
        assert_eq!(l.offset(Register::Test), 0x0A);
        assert_eq!(l.offset(Register::BrpExt), 0x0C);
        assert_eq!(l.offset(Register::IfCommandRequest(Window::One)), 0x10);
        assert_eq!(l.offset(Register::IfCommandMask(Window::One)), 0x12);
        assert_eq!(l.offset(Register::IfMask1(Window::One)), 0x14);
        assert_eq!(l.offset(Register::IfMask2(Window::One)), 0x16);
        assert_eq!(l.offset(Register::IfArb1(Window::One)), 0x18);
        assert_eq!(l.offset(Register::IfArb2(Window::One)), 0x1A);
        assert_eq!(l.offset(Register::IfMessageControl(Window::One)), 0x1C);
        assert_eq!(l.offset(Register::IfData(Window::One, 0)), 0x1E);
        assert_eq!(l.offset(Register::IfData(Window::One, 3)), 0x24);
        assert_eq!(l.offset(Register::IfCommandRequest(Window::Two)), 0x40);
        assert_eq!(l.offset(Register::IfData(Window::Two, 3)), 0x54);
        assert_eq!(l.offset(Register::TxRequest1), 0x80);
        assert_eq!(l.offset(Register::TxRequest2), 0x82);
        assert_eq!(l.offset(Register::NewData1), 0x90);
        assert_eq!(l.offset(Register::NewData2), 0x92);
        assert_eq!(l.offset(Register::IntPending1), 0xA0);
        assert_eq!(l.offset(Register::IntPending2), 0xA2);
        assert_eq!(l.offset(Register::MessageValid1), 0xB0);
        assert_eq!(l.offset(Register::MessageValid2), 0xB2);
    }

    #[test]
    fn d_can_offsets_match_the_data_sheet() {
        let l = &D_CAN_LAYOUT;
        assert_eq!(l.offset(Register::Control), 0x00);
        assert_eq!(l.offset(Register::ControlEx), 0x02);
        assert_eq!(l.offset(Register::Status), 0x04);
        assert_eq!(l.offset(Register::ErrorCount), 0x08);
        assert_eq!(l.offset(Register::BitTiming), 0x0C);
        assert_eq!(l.offset(Register::BrpExt), 0x0E);
        assert_eq!(l.offset(Register::Interrupt), 0x10);
        assert_eq!(l.offset(Register::Test), 0x14);
        assert_eq!(l.offset(Register::IfCommandRequest(Window::One)), 0x100);
        assert_eq!(l.offset(Register::IfData(Window::One, 3)), 0x114);
        assert_eq!(l.offset(Register::IfCommandRequest(Window::Two)), 0x120);
        assert_eq!(l.offset(Register::IfMessageControl(Window::Two)), 0x12C);
        assert_eq!(l.offset(Register::TxRequest1), 0x88);
        assert_eq!(l.offset(Register::TxRequest2), 0x8A);
        assert_eq!(l.offset(Register::NewData1), 0x9C);
        assert_eq!(l.offset(Register::NewData2), 0x9E);
        assert_eq!(l.offset(Register::IntPending1), 0xB0);
        assert_eq!(l.offset(Register::IntPending2), 0xB2);
        assert_eq!(l.offset(Register::MessageValid1), 0xC4);
        assert_eq!(l.offset(Register::MessageValid2), 0xC6);
    }

    #[test]
    fn status_field_positions() {
        let status = Status::from_bits(1 << 7 | 1 << 6 | 1 << 5 | 0x5);
        assert!(status.bus_off());
        assert!(status.warning());
        assert!(status.passive());
        assert_eq!(status.lec(), 0x5);
        assert!(!status.pda());

        let mut status = Status::from_bits(1 << 4 | 1 << 3);
        assert!(status.rx_ok() && status.tx_ok());
        status.set_tx_ok(false);
        assert_eq!(status.bits(), 1 << 4);
    }

    #[test]
    fn message_control_field_positions() {
        let ctrl = MessageControl::from_bits(0xF008);
        assert!(ctrl.new_data());
        assert!(ctrl.message_lost());
        assert!(ctrl.interrupt_pending());
        assert!(ctrl.use_mask());
        assert_eq!(ctrl.dlc(), 8);
        assert!(!ctrl.end_of_block());

        let mut ctrl = MessageControl::from_bits(0);
        ctrl.set_tx_interrupt(true);
        ctrl.set_tx_request(true);
        ctrl.set_end_of_block(true);
        ctrl.set_dlc(4);
        assert_eq!(ctrl.bits(), 1 << 11 | 1 << 8 | 1 << 7 | 4);
    }

    #[test]
    fn lec_decode_covers_all_codes() {
        assert_eq!(Lec::from_bits(0), Lec::NoError);
        assert_eq!(Lec::from_bits(1), Lec::Stuff);
        assert_eq!(Lec::from_bits(2), Lec::Form);
        assert_eq!(Lec::from_bits(3), Lec::Ack);
        assert_eq!(Lec::from_bits(4), Lec::Bit1);
        assert_eq!(Lec::from_bits(5), Lec::Bit0);
        assert_eq!(Lec::from_bits(6), Lec::Crc);
        assert_eq!(Lec::from_bits(7), Lec::Unused);
    }
}
