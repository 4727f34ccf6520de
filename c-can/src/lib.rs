//! Hardware abstraction layer for the Bosch C_CAN/D_CAN controller.
//!
//! The controller owns a RAM of 32 message objects reachable only through
//! two interface register windows. This crate partitions the pool into a
//! 16-slot receive FIFO and a 16-slot transmit ring and drives both from a
//! single interrupt entry point:
//!
//! - [`bus::Can`] wraps the register block, brings the controller on and off
//!   the bus and tracks its fault state
//! - [`tx_queue::TxCredit`] lets senders wait for transmit room without
//!   holding the device lock
//! - [`sink::FrameSink`] is implemented by the platform to receive frames
//!   and error events produced in interrupt context
//!
//! The integration points a target platform must provide (register access,
//! module clock, interrupt line) live in the separate [`c_can_core`] crate,
//! re-exported here as [`core`](mod@core).
//!
//! # Example
//!
//! ```ignore
//! use c_can::bus::{Can, Variant};
//! use c_can::config::CanConfig;
//! use c_can::tx_queue::TxCredit;
//! use fugit::RateExtU32;
//!
//! static CREDIT: TxCredit = TxCredit::new();
//!
//! let config = CanConfig::new(500.kHz().into());
//! let mut can = Can::new(Variant::DCan, bus, dependencies, config, &CREDIT);
//! can.start()?;
//!
//! // sender context
//! nb::block!(CREDIT.acquire())?;
//! lock(|| can.transmit(&frame))?;
//!
//! // interrupt context
//! lock(|| can.interrupt(&mut sink));
//! ```
#![no_std]
#![warn(missing_docs)]

pub use c_can_core as core;
pub use embedded_can;

pub mod bus;
pub mod config;
pub mod interface;
pub mod interrupt;
pub mod message;
pub mod object;
pub mod prelude;
pub mod reg;
pub mod rx_fifo;
pub mod sink;
pub mod tx_queue;
