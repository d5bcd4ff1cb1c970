//! USART frame format
//!
//! Frames carry 8 data bits. With parity enabled the word length (`USART_CTL0.WL`) goes up to
//! 9 bits and the hardware puts the parity bit in the ninth position, so the payload stays 8 bits.

use crate::time::{Bps, U32Ext};

/// Parity selection (`USART_CTL0.PCEN` and `USART_CTL0.PM`)
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// `PCEN` cleared
    None,
    Even,
    Odd,
}

/// Stop bit length (`USART_CTL1.STB`)
///
/// Half a stop bit and one and a half stop bits are meant for smartcard mode.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopBits {
    One,
    Half,
    Two,
    OneAndHalf,
}

impl StopBits {
    /// `STB` field value
    pub const fn bits(self) -> u8 {
        match self {
            StopBits::One => 0b00,
            StopBits::Half => 0b01,
            StopBits::Two => 0b10,
            StopBits::OneAndHalf => 0b11,
        }
    }
}

/// Baud rate and frame format
///
/// The default is the evaluation board console: 115200 baud, no parity, 1 stop bit.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub baudrate: Bps,
    pub parity: Parity,
    pub stopbits: StopBits,
}

impl Config {
    pub fn baudrate(mut self, baudrate: Bps) -> Self {
        self.baudrate = baudrate;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn stopbits(mut self, stopbits: StopBits) -> Self {
        self.stopbits = stopbits;
        self
    }

    /// `USART_BAUD` value for a USART clocked at `pclk` Hz
    ///
    /// The register holds `pclk / baud` in 12.4 fixed point, which is the plain quotient
    /// rounded to nearest.
    pub fn brr(&self, pclk: u32) -> u32 {
        let baud = self.baudrate.0;
        (pclk + baud / 2) / baud
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baudrate: 115_200.bps(),
            parity: Parity::None,
            stopbits: StopBits::One,
        }
    }
}

impl<T: Into<Bps>> From<T> for Config {
    fn from(baudrate: T) -> Self {
        Self::default().baudrate(baudrate.into())
    }
}
