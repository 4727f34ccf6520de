//! Controller configuration

use core::ops::RangeInclusive;
use fugit::HertzU32;

/// Configuration applied when the controller is started
#[derive(Copy, Clone)]
pub struct CanConfig {
    /// Connection of the controller to the bus
    pub operating_mode: OperatingMode,
    /// Bit timing parameters
    pub bit_timing: BitTiming,
}

impl CanConfig {
    /// Configuration running the bus at `bitrate` in normal mode, all other
    /// settings at their defaults.
    pub fn new(bitrate: HertzU32) -> Self {
        Self {
            operating_mode: OperatingMode::default(),
            bit_timing: BitTiming::new(bitrate),
        }
    }
}

/// How the controller takes part in bus traffic
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// Regular transmission and reception.
    #[default]
    Normal,
    /// Frames are routed back internally; the bus sees nothing.
    Loopback,
    /// Bus monitoring; the controller receives but never drives the bus.
    Silent,
    /// Both of the above, for self-test without bus access.
    LoopbackSilent,
}

/// Bit-timing parameters
///
/// The bit time is determined by
/// - the time quantum `t_q`, which is a fraction of the module clock
/// - the number of time quanta in a bit time, determined by `phase_seg_1` and
///   `phase_seg_2`
///
/// This struct expects *real* values; the minus-one encoding of the hardware
/// registers is handled when the bit timing register is written.
///
/// Default values are:
/// - sjw: 1
/// - phase_seg_1: 13
/// - phase_seg_2: 2
///
/// Default time quanta in a bit time is 16 (phase_seg_1 + phase_seg_2 +
/// synchronization segment (1)), sampling at 87.5%.
#[derive(Copy, Clone)]
pub struct BitTiming {
    /// Synchronization jump width
    pub sjw: u8,
    /// Propagation time and phase time before sample point
    pub phase_seg_1: u8,
    /// Time after sample point
    pub phase_seg_2: u8,
    /// The bitrate of the bus. This needs to be chosen so that the module
    /// clock is divisible into time quanta such that the bit time determined
    /// by `phase_seg_1` and `phase_seg_2` is a whole number of time quanta.
    pub bitrate: HertzU32,
}

/// Misconfigurations of [`BitTiming`].
#[derive(Debug)]
pub enum BitTimingError {
    /// SJW is outside the wrapped `RangeInclusive`
    SynchronizationJumpWidthOutOfRange(RangeInclusive<u32>),
    /// Phase segment 1 is outside the wrapped `RangeInclusive`
    PhaseSeg1OutOfRange(RangeInclusive<u32>),
    /// Phase segment 2 is outside the wrapped `RangeInclusive`
    PhaseSeg2OutOfRange(RangeInclusive<u32>),
    /// Prescaler is outside the wrapped `RangeInclusive`
    PrescalerOutOfRange(RangeInclusive<u32>),
    /// No valid prescaler could be found
    ///
    /// The following requirement must be met:
    /// - `can_clock` must be divisible by `bitrate * bit_time_quanta`
    NoValidPrescaler {
        /// Provided module clock
        can_clock: HertzU32,
        /// Bitrate requested in [`BitTiming`]
        bitrate: HertzU32,
        /// Time quanta per bit selected by [`BitTiming`]
        bit_time_quanta: u32,
    },
}

/// Valid values of a BitTiming struct
struct BitTimingRanges {
    sjw: RangeInclusive<u32>,
    phase_seg_1: RangeInclusive<u32>,
    phase_seg_2: RangeInclusive<u32>,
    /// With the 4-bit prescaler extension register the 6-bit prescaler
    /// reaches 1024.
    prescaler: RangeInclusive<u32>,
}

const BIT_TIMING_RANGES: BitTimingRanges = BitTimingRanges {
    sjw: 1..=4,
    phase_seg_1: 2..=16,
    phase_seg_2: 1..=8,
    prescaler: 1..=1024,
};

impl BitTiming {
    /// Create an instance
    ///
    /// The bitrate value must be provided, all other settings come
    /// pre-populated with default values.
    pub fn new(bitrate: HertzU32) -> Self {
        Self {
            sjw: 1,
            phase_seg_1: 13,
            phase_seg_2: 2,
            bitrate,
        }
    }

    /// Returns the number of time quanta that make up one bit time, `t_bit /
    /// t_q`
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.phase_seg_1) + u32::from(self.phase_seg_2)
    }

    fn check(&self) -> Result<(), BitTimingError> {
        let valid = &BIT_TIMING_RANGES;
        if !valid.sjw.contains(&self.sjw.into()) {
            Err(BitTimingError::SynchronizationJumpWidthOutOfRange(
                valid.sjw.clone(),
            ))
        } else if !valid.phase_seg_1.contains(&self.phase_seg_1.into()) {
            Err(BitTimingError::PhaseSeg1OutOfRange(
                valid.phase_seg_1.clone(),
            ))
        } else if !valid.phase_seg_2.contains(&self.phase_seg_2.into()) {
            Err(BitTimingError::PhaseSeg2OutOfRange(
                valid.phase_seg_2.clone(),
            ))
        } else {
            Ok(())
        }
    }

    pub(crate) fn prescaler(&self, f_can: HertzU32) -> Result<u16, BitTimingError> {
        self.check()?;
        let valid = &BIT_TIMING_RANGES;
        let f_out = self.bitrate;
        let bit_time_quanta = self.time_quanta_per_bit();
        let f_q = f_out * bit_time_quanta;
        if let Some(0) = f_can.to_Hz().checked_rem(f_q.to_Hz()) {
            let prescaler = f_can / f_q;
            if !valid.prescaler.contains(&prescaler) {
                Err(BitTimingError::PrescalerOutOfRange(valid.prescaler.clone()))
            } else {
                Ok(prescaler as u16)
            }
        } else {
            Err(BitTimingError::NoValidPrescaler {
                can_clock: f_can,
                bitrate: f_out,
                bit_time_quanta,
            })
        }
    }

    /// Encode the timing into the bit timing register and the prescaler
    /// extension register. The hardware expects every field minus one; the
    /// low six prescaler bits go into the timing register and the upper four
    /// into the extension register.
    pub(crate) fn registers(&self, f_can: HertzU32) -> Result<(u16, u16), BitTimingError> {
        let prescaler = self.prescaler(f_can)? - 1;
        let btr = (prescaler & 0x3F)
            | (u16::from(self.sjw - 1) & 0x3) << 6
            | (u16::from(self.phase_seg_1 - 1) & 0xF) << 8
            | (u16::from(self.phase_seg_2 - 1) & 0x7) << 12;
        let brpe = (prescaler >> 6) & 0xF;
        Ok((btr, brpe))
    }
}
