//! Frames exchanged with the controller and error events reported by it.

use crate::bus::BusState;
use embedded_can::Id;

/// A classic CAN frame, at most 8 data bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Frame {
    id: Id,
    remote: bool,
    dlc: u8,
    data: [u8; 8],
}

impl Frame {
    /// Assemble a frame decoded from a message object. `dlc` must already be
    /// clamped to 8.
    pub(crate) fn from_parts(id: Id, remote: bool, dlc: u8, data: [u8; 8]) -> Self {
        Self {
            id,
            remote,
            dlc,
            data,
        }
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut bytes = [0; 8];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            remote: false,
            dlc: data.len() as u8,
            data: bytes,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            remote: true,
            dlc: dlc as u8,
            data: [0; 8],
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        usize::from(self.dlc)
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..usize::from(self.dlc)]
        }
    }
}

/// Snapshot of the transmit and receive error counters.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    /// Transmit error counter.
    pub transmit: u8,
    /// Receive error counter.
    pub receive: u8,
    /// The receive counter has crossed the error passive level (128).
    pub receive_passive: bool,
}

impl ErrorCounters {
    /// Decode the error counter register.
    pub fn from_bits(bits: u16) -> Self {
        Self {
            transmit: (bits & 0xFF) as u8,
            receive: (bits >> 8 & 0x7F) as u8,
            receive_passive: bits & 1 << 15 != 0,
        }
    }
}

/// Protocol error reported through the last-error-code field.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// More than five consecutive equal bits.
    Stuff,
    /// A fixed-format field had an illegal value.
    Form,
    /// Our transmission was not acknowledged.
    Acknowledge,
    /// A recessive bit was sent but dominant was sampled.
    Bit1,
    /// A dominant bit was sent but recessive was sampled.
    Bit0,
    /// CRC mismatch on a received frame.
    Crc,
}

/// Out-of-band event delivered to the [`FrameSink`](crate::sink::FrameSink)
/// alongside regular frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorEvent {
    /// A receive slot was overwritten before it was read out.
    ReceiveOverrun {
        /// Slot whose contents were lost.
        slot: u8,
    },
    /// The fault confinement state of the controller changed.
    StateChange {
        /// State entered.
        state: BusState,
        /// Counters sampled when the change was observed.
        counters: ErrorCounters,
    },
    /// A protocol error was flagged on the bus.
    Bus(BusError),
}
