//! Commonly used items.

pub use crate::bus::{BusState, Can, Variant};
pub use crate::config::{BitTiming, CanConfig, OperatingMode};
pub use crate::interrupt::IrqStatus;
pub use crate::message::{ErrorEvent, Frame};
pub use crate::sink::FrameSink;
pub use crate::tx_queue::TxCredit;
pub use embedded_can::Frame as _;
