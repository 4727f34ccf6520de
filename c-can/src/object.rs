//! Message object pool layout and slot encode/decode.
//!
//! The 32 slots of the message RAM are statically partitioned: slots 1..=16
//! form the receive FIFO and slots 17..=32 back the transmit ring. A slot's
//! on-RAM representation is two arbitration words, a message control word and
//! four data words of two bytes each.

use crate::bus::Can;
use crate::interface::Window;
use crate::message::Frame;
use crate::reg::{arb, command, MessageControl, Register, MASK2_RESERVED};
use c_can_core::{Dependencies, RegisterBus};
use embedded_can::{ExtendedId, Frame as _, Id, StandardId};

/// First slot of the message RAM.
pub const FIRST_SLOT: u8 = 1;
/// Last slot of the message RAM.
pub const LAST_SLOT: u8 = 32;
/// First receive slot.
pub const RX_FIRST: u8 = 1;
/// Last receive slot, configured as end of the FIFO block.
pub const RX_LAST: u8 = 16;
/// Split slot of the receive FIFO. Slots below it form the low group and
/// keep their new-data flag until the split is processed.
pub const RX_SPLIT: u8 = 9;
/// First transmit slot.
pub const TX_FIRST: u8 = 17;
/// Number of transmit slots, and capacity of the transmit credit.
pub const TX_OBJECTS: u16 = 16;

/// Bit of `slot` in the 32-bit slot bitmaps.
pub(crate) fn slot_bit(slot: u8) -> u32 {
    1 << (slot - 1)
}

/// Build the 32-bit arbitration field of a frame about to be transmitted.
///
/// Standard identifiers occupy bits 18..=28, extended ones the full 29 bits.
/// The direction flag is set for data frames; leaving it clear makes the
/// slot transmit a remote request.
pub(crate) fn encode_arbitration(frame: &Frame) -> u32 {
    let (id_bits, extended) = match frame.id() {
        Id::Extended(id) => (id.as_raw(), true),
        Id::Standard(id) => (u32::from(id.as_raw()) << 18, false),
    };
    let mut arbitration = id_bits | u32::from(arb::MSGVAL) << 16;
    if extended {
        arbitration |= u32::from(arb::XTD) << 16;
    }
    if !frame.is_remote_frame() {
        arbitration |= u32::from(arb::DIR_TX) << 16;
    }
    arbitration
}

/// Decode the arbitration field of a received slot into an identifier and
/// the remote flag. The hardware stores a received remote request with the
/// direction flag set.
pub(crate) fn decode_arbitration(arbitration: u32) -> (Id, bool) {
    let flags = (arbitration >> 16) as u16;
    let id = if flags & arb::XTD != 0 {
        ExtendedId::new(arbitration & ExtendedId::MAX.as_raw())
            .unwrap_or(ExtendedId::ZERO)
            .into()
    } else {
        StandardId::new((arbitration >> 18) as u16 & StandardId::MAX.as_raw())
            .unwrap_or(StandardId::ZERO)
            .into()
    };
    (id, flags & arb::DIR_TX != 0)
}

impl<B: RegisterBus, D: Dependencies> Can<'_, B, D> {
    /// Clear a slot's valid flag and its control word; the hardware no
    /// longer matches or transmits it.
    pub(crate) fn invalidate_object(&self, window: Window, slot: u8) {
        self.write_reg(Register::IfArb1(window), 0);
        self.write_reg(Register::IfArb2(window), 0);
        self.write_reg(Register::IfMessageControl(window), 0);
        self.window_put(window, slot, command::ARB | command::CONTROL);
    }

    /// Configure a slot for reception with an acceptance `mask` and `id`
    /// pair (both in arbitration layout) and the given control word.
    pub(crate) fn setup_receive_object(
        &self,
        window: Window,
        slot: u8,
        mask: u32,
        id: u32,
        control: MessageControl,
    ) {
        self.write_reg(Register::IfMask1(window), mask as u16);
        self.write_reg(
            Register::IfMask2(window),
            (mask >> 16) as u16 | MASK2_RESERVED,
        );
        self.write_reg(Register::IfArb1(window), id as u16);
        self.write_reg(
            Register::IfArb2(window),
            (id >> 16) as u16 | arb::MSGVAL,
        );
        self.write_reg(Register::IfMessageControl(window), control.bits());
        self.window_put(window, slot, command::ALL & !command::TXRQST);
    }

    /// Load a frame into a transmit slot and request its transmission.
    pub(crate) fn write_transmit_object(&self, window: Window, slot: u8, frame: &Frame) {
        let arbitration = encode_arbitration(frame);
        self.write_reg(Register::IfArb1(window), arbitration as u16);
        self.write_reg(Register::IfArb2(window), (arbitration >> 16) as u16);
        let data = frame.data();
        for word in 0..data.len().div_ceil(2) {
            let low = data[2 * word];
            let high = data.get(2 * word + 1).copied().unwrap_or(0);
            self.write_reg(
                Register::IfData(window, word as u8),
                u16::from(low) | u16::from(high) << 8,
            );
        }
        let mut control = MessageControl::from_bits(0);
        control.set_tx_interrupt(true);
        control.set_tx_request(true);
        control.set_end_of_block(true);
        control.set_dlc(frame.dlc() as u8);
        self.write_reg(Register::IfMessageControl(window), control.bits());
        self.window_put(window, slot, command::ALL);
    }

    /// Decode the frame held in the window's shadow registers. The slot must
    /// have been pulled in with a `window_get` beforehand; `control` is its
    /// message control word.
    pub(crate) fn read_object(&self, window: Window, control: MessageControl) -> Frame {
        let arbitration = u32::from(self.read_reg(Register::IfArb1(window)))
            | u32::from(self.read_reg(Register::IfArb2(window))) << 16;
        let (id, remote) = decode_arbitration(arbitration);
        let dlc = control.dlc().min(8);
        let mut data = [0; 8];
        if !remote {
            for word in 0..usize::from(dlc).div_ceil(2) {
                let value = self.read_reg(Register::IfData(window, word as u8));
                data[2 * word] = value as u8;
                data[2 * word + 1] = (value >> 8) as u8;
            }
        }
        Frame::from_parts(id, remote, dlc, data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_data_frame_arbitration() {
        let id = StandardId::new(0x123).unwrap();
        let frame = Frame::new(id, &[0xDE, 0xAD]).unwrap();
        let arbitration = encode_arbitration(&frame);
        assert_eq!(
            arbitration,
            0x123 << 18 | u32::from(arb::MSGVAL | arb::DIR_TX) << 16
        );
    }

    #[test]
    fn extended_remote_frame_arbitration() {
        let id = ExtendedId::new(0x1ABCDE12).unwrap();
        let frame = Frame::new_remote(id, 0).unwrap();
        let arbitration = encode_arbitration(&frame);
        // Remote requests leave the direction flag clear.
        assert_eq!(
            arbitration,
            0x1ABCDE12 | u32::from(arb::MSGVAL | arb::XTD) << 16
        );
    }

    #[test]
    fn received_standard_frame_decodes() {
        // A received standard data frame stores its identifier in bits
        // 18..=28 with the direction flag clear.
        let arbitration = 0x456 << 18 | u32::from(arb::MSGVAL) << 16;
        let (id, remote) = decode_arbitration(arbitration);
        assert_eq!(id, StandardId::new(0x456).unwrap().into());
        assert!(!remote);
    }

    #[test]
    fn received_remote_request_decodes() {
        let arbitration =
            0x1ABCDE12 | u32::from(arb::MSGVAL | arb::XTD | arb::DIR_TX) << 16;
        let (id, remote) = decode_arbitration(arbitration);
        assert_eq!(id, ExtendedId::new(0x1ABCDE12).unwrap().into());
        assert!(remote);
    }

    #[test]
    fn slot_bits_are_zero_based() {
        assert_eq!(slot_bit(1), 1);
        assert_eq!(slot_bit(16), 1 << 15);
        assert_eq!(slot_bit(17), 1 << 16);
        assert_eq!(slot_bit(32), 1 << 31);
    }
}
