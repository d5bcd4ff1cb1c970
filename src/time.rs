//! Time units
//!
//! Frequencies and durations are [`fugit`] types. The [`U32Ext`] trait adds `.bps()` to the
//! `u32` primitive type for serial baud rates; `.MHz()` and `.millis()` come from fugit's
//! [`RateExtU32`] and [`ExtU32`].
//!
//! ```rust
//! use gd32f30x_adc_oversample::prelude::*;
//! use gd32f30x_adc_oversample::time::{Bps, Hertz};
//!
//! let apb2: Hertz = 120.MHz();
//! let baud = 115_200.bps();
//!
//! assert_eq!(apb2.raw(), 120_000_000);
//! assert_eq!(baud, Bps(115_200));
//! ```

pub use fugit::{
    ExtU32, HertzU32 as Hertz, MicrosDurationU32, MillisDurationU32, RateExtU32,
};

/// Bits per second
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Bps(pub u32);

/// Extension trait that adds convenience methods to the `u32` type
pub trait U32Ext {
    /// Wrap in `Bps`
    fn bps(self) -> Bps;
}

impl U32Ext for u32 {
    fn bps(self) -> Bps {
        Bps(self)
    }
}
