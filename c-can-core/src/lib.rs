#![no_std]
#![warn(missing_docs)]

//! `c-can-core` provides a set of essential abstractions that serve as a thin
//! integration layer between the platform independent [`c-can`] crate and
//! platform specific board-attach code (in documentation also referred to as
//! _target HALs_).
//!
//! The Bosch C_CAN/D_CAN block has no CPU-visible message RAM; every register
//! is a 16-bit word reached through an index into one of two known offset
//! tables. [`RegisterBus`] captures exactly that capability and nothing else,
//! which keeps the driver independent of how a given SoC maps the block into
//! the address space. Two memory-mapped implementations are provided, covering
//! the two register spacings found in the wild: registers packed on 16-bit
//! boundaries ([`Mmio16`]) and registers padded out to 32-bit boundaries
//! ([`Mmio32`]). The board-attach code picks one of them once, when probing.
//!
//! [`Dependencies`] collects everything else the driver needs from the
//! platform: the CAN functional clock, a microsecond delay for the bounded
//! busy-waits, the IRQ line hookup and the optional message-RAM / runtime
//! power hooks.
//!
//! Traits from this crate are not supposed to be implemented by the
//! application developer; implementations should be provided by target HALs.
//! Integrators are responsible for the soundness of trait implementations and
//! for conforming to their respective safety prerequisites.
//!
//! [`c-can`]: ../c_can/index.html

pub use fugit;

/// Indexed 16-bit access to the controller's register file.
///
/// `offset` is a byte offset taken from one of the driver's register layout
/// tables; implementations translate it to a bus address. All accesses must be
/// volatile since every register belongs to live hardware.
///
/// # Safety
/// Implementations must guarantee that, for the lifetime of the value, reads
/// and writes reach a correctly clocked, pinned and mapped C_CAN/D_CAN
/// register block, and that no other code accesses that block concurrently.
pub unsafe trait RegisterBus {
    /// Read the 16-bit register at `offset`.
    fn read(&self, offset: u16) -> u16;
    /// Write the 16-bit register at `offset`.
    fn write(&self, offset: u16, value: u16);
}

/// Memory-mapped register file with registers on 16-bit boundaries.
pub struct Mmio16 {
    base: *mut u16,
}

/// Memory-mapped register file with registers padded to 32-bit boundaries.
///
/// Some integrations place each 16-bit register in the low half of a 32-bit
/// word; the layout offsets are simply doubled.
pub struct Mmio32 {
    base: *mut u16,
}

impl Mmio16 {
    /// Wrap the register block starting at `base`.
    ///
    /// # Safety
    /// `base` must point to the start of a mapped C_CAN/D_CAN register block
    /// with 16-bit register spacing, valid for the lifetime of the value, and
    /// not aliased by any other accessor.
    pub const unsafe fn new(base: *mut u16) -> Self {
        Self { base }
    }
}

impl Mmio32 {
    /// Wrap the register block starting at `base`.
    ///
    /// # Safety
    /// `base` must point to the start of a mapped C_CAN/D_CAN register block
    /// with 32-bit register spacing, valid for the lifetime of the value, and
    /// not aliased by any other accessor.
    pub const unsafe fn new(base: *mut u16) -> Self {
        Self { base }
    }
}

unsafe impl RegisterBus for Mmio16 {
    fn read(&self, offset: u16) -> u16 {
        // Safety: `new` guarantees the block is mapped and exclusive; offsets
        // come from the driver's layout tables and stay within the block.
        unsafe { self.base.byte_add(offset as usize).read_volatile() }
    }

    fn write(&self, offset: u16, value: u16) {
        // Safety: as in `read`.
        unsafe { self.base.byte_add(offset as usize).write_volatile(value) }
    }
}

unsafe impl RegisterBus for Mmio32 {
    fn read(&self, offset: u16) -> u16 {
        // Safety: as in `Mmio16`, with the doubled spacing guaranteed by `new`.
        unsafe { self.base.byte_add(2 * offset as usize).read_volatile() }
    }

    fn write(&self, offset: u16, value: u16) {
        // Safety: as in `read`.
        unsafe { self.base.byte_add(2 * offset as usize).write_volatile(value) }
    }
}

// The pointer is only used for volatile MMIO, never dereferenced as a Rust
// reference, so the usual Send/Sync pointer conservatism does not apply.
unsafe impl Send for Mmio16 {}
unsafe impl Send for Mmio32 {}

/// The platform could not attach the controller's interrupt line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IrqError;

/// Platform services the driver depends on.
///
/// Structs implementing [`Dependencies`] should
/// - enclose all object representable dependencies of the controller and
///   release them upon destruction,
/// - be constructible only when it is safe and sound to interact with the
///   peripheral (respective clocks and pins have been already configured),
/// - be a singleton per controller instance.
///
/// # Safety
/// While a [`Dependencies`] instance exists
/// - the CAN functional clock must not change,
/// - CAN related pin modes must not change,
/// - the register block must not be accessible to other parts of the target
///   HAL or to the application.
pub unsafe trait Dependencies {
    /// Frequency of the CAN functional clock feeding the bit-timing logic.
    fn can_clock(&self) -> fugit::HertzU32;

    /// Busy-wait for `us` microseconds.
    ///
    /// Used only for short, bounded waits (single microseconds in the
    /// interface-window busy poll, longer only in the power handshakes), so a
    /// coarse implementation is acceptable.
    fn delay_us(&self, us: u32);

    /// Attach the controller's interrupt line to the platform's handler.
    ///
    /// Called during mode-start from the stopped state. The handler is
    /// expected to invoke the driver's interrupt dispatcher.
    fn request_irq(&mut self) -> Result<(), IrqError>;

    /// Detach the interrupt line requested by [`Self::request_irq`].
    fn release_irq(&mut self);

    /// Gate the clock to the controller's internal message RAM.
    ///
    /// Integrations without a separate RAM init control can rely on the
    /// default no-op.
    fn enable_message_ram(&self, _enable: bool) {}

    /// Runtime power-management get hook, paired with [`Self::power_put`].
    fn power_get(&self) {}

    /// Runtime power-management put hook.
    fn power_put(&self) {}
}
