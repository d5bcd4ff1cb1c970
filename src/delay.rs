//! Delays
//!
//! Blocking delays on the SysTick timer, clocked from the core clock. Used for the ADC settle
//! time and the cadence of the sampling loop.

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
use embedded_hal::delay::DelayNs;

use crate::rcu::Clocks;
use crate::time::{Hertz, MicrosDurationU32};

/// The SysTick Reload Value register supports values between 1 and 0x00FFFFFF.
const MAX_RVR: u32 = 0x00FF_FFFF;

/// Splits a wait of `ticks` core clock cycles into SysTick reload values
fn reloads(mut ticks: u64) -> impl Iterator<Item = u32> {
    core::iter::from_fn(move || {
        if ticks == 0 {
            return None;
        }
        let current = ticks.min(u64::from(MAX_RVR));
        ticks -= current;
        Some(current as u32)
    })
}

/// Core clock cycles spanning `amount` units of `1 / per_second` seconds, rounded up
fn ticks(clk: Hertz, amount: u32, per_second: u64) -> u64 {
    (u64::from(amount) * u64::from(clk.raw())).div_ceil(per_second)
}

/// SysTick as a delay provider
pub struct SysDelay {
    syst: SYST,
    clk: Hertz,
}

impl SysDelay {
    /// Configures SysTick to count core clock cycles
    pub fn new(mut syst: SYST, clocks: &Clocks) -> Self {
        syst.set_clock_source(SystClkSource::Core);
        Self {
            syst,
            clk: clocks.sysclk(),
        }
    }

    pub fn delay(&mut self, us: MicrosDurationU32) {
        self.delay_ticks(ticks(self.clk, us.ticks(), 1_000_000));
    }

    fn delay_ticks(&mut self, total: u64) {
        for rvr in reloads(total) {
            self.syst.set_reload(rvr);
            self.syst.clear_current();
            self.syst.enable_counter();

            while !self.syst.has_wrapped() {}

            self.syst.disable_counter();
        }
    }

    /// Releases the SysTick resource
    pub fn release(self) -> SYST {
        self.syst
    }
}

impl DelayNs for SysDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_ticks(ticks(self.clk, ns, 1_000_000_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_ticks(ticks(self.clk, us, 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay_ticks(ticks(self.clk, ms, 1_000));
    }
}

impl fugit_timer::Delay<1_000_000> for SysDelay {
    type Error = core::convert::Infallible;

    fn delay(&mut self, duration: MicrosDurationU32) -> Result<(), Self::Error> {
        self.delay(duration);
        Ok(())
    }
}
