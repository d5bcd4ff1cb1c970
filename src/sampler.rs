//! Sampling loop
//!
//! Triggers one conversion at a time, waits for it, prints the result and sleeps:
//!
//! ```text
//! Idle -> Triggered -> WaitEoc -> Read -> Report -> Delay -> Triggered -> ...
//! ```
//!
//! The loop never ends and has no error states. Waiting for the end of conversion has no
//! timeout, a stalled converter stalls the loop.

use core::fmt;

use embedded_hal::delay::DelayNs;

use crate::adc::{self, Adc};
use crate::time::{ExtU32, MillisDurationU32};

/// Loop state
///
/// The latest sample travels inside the state, nothing outlives one pass.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    /// A software trigger is about to be issued
    Triggered,
    /// Waiting for the end of conversion
    WaitEoc,
    Read,
    /// Printing the sample
    Report(u16),
    Delay,
}

/// One line of console output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Report(pub u16);

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "16 times sample, 4 bits shift: 0x{:x}\r\n", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Pause after each report
    pub interval: MillisDurationU32,
}

impl Config {
    pub fn interval(mut self, interval: MillisDurationU32) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: 500.millis(),
        }
    }
}

pub struct Sampler<ADC, D, W> {
    adc: Adc<ADC>,
    delay: D,
    out: W,
    config: Config,
    state: State,
}

impl<ADC, D, W> Sampler<ADC, D, W>
where
    ADC: adc::Instance,
    D: DelayNs,
    W: fmt::Write,
{
    /// Takes ownership of a calibrated ADC, a delay and the console
    pub fn new(adc: Adc<ADC>, delay: D, out: W, config: Config) -> Self {
        Self {
            adc,
            delay,
            out,
            config,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Runs the action of the current state and moves to the next one
    pub fn step(&mut self) -> State {
        self.state = match self.state {
            State::Idle => State::Triggered,
            State::Triggered => {
                self.adc.start();
                State::WaitEoc
            }
            State::WaitEoc => {
                self.adc.clear_eoc();
                self.adc.wait_eoc();
                State::Read
            }
            State::Read => State::Report(self.adc.data()),
            State::Report(sample) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("sample {=u16:#x}", sample);

                // Nobody to tell if the console fails
                let _ = write!(self.out, "{}", Report(sample));
                State::Delay
            }
            State::Delay => {
                self.delay.delay_ms(self.config.interval.ticks());
                State::Triggered
            }
        };
        self.state
    }

    /// Steps through one full pass, up to and including the delay, and returns its sample
    pub fn cycle(&mut self) -> u16 {
        let mut reported = None;
        loop {
            let current = self.state;
            self.step();
            match current {
                State::Report(sample) => reported = Some(sample),
                State::Delay => {
                    if let Some(sample) = reported {
                        return sample;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn run(mut self) -> ! {
        loop {
            self.step();
        }
    }

    pub fn release(self) -> (Adc<ADC>, D, W) {
        (self.adc, self.delay, self.out)
    }
}
