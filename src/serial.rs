//! # Serial Communication (USART)
//!
//! Polled, blocking byte I/O on a USART, used as the console of the firmware.
//!
//! [`Serial`] owns the peripheral and implements the `embedded-hal-nb`, `embedded-io` and
//! `core::fmt::Write` traits. [`Stdio`] puts a C-library style descriptor interface on top:
//! writes are accepted for stdout and stderr only, reads hand back a single byte.
//!
//! ## Example usage:
//!  ```rust,ignore
//! // USART0 on PA9/PA10, clocked from APB2
//! let serial = Serial::new(dp.USART1, Config::default(), clocks.pclk2());
//! let mut stdio = Stdio::new(serial);
//!
//! stdio.write(serial::STDOUT, b"Hello World\r\n").ok();
//! let mut c = [0];
//! stdio.read(serial::STDIN, &mut c).ok();
//!  ```

use core::fmt;

use crate::time::Hertz;

pub mod config;
mod hal_1;

pub use config::{Config, Parity, StopBits};

/// Standard input descriptor
pub const STDIN: i32 = 0;
/// Standard output descriptor
pub const STDOUT: i32 = 1;
/// Standard error descriptor
pub const STDERR: i32 = 2;

/// Serial error
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The descriptor does not name a stream routed to the USART
    BadFileDescriptor,
}

/// Register-level operations of a USART
pub trait Instance {
    /// Writes the baud rate register, 12.4 fixed point
    fn set_baud_divider(&mut self, brr: u16);
    /// Sets parity and stop bits of an 8 data bit frame
    fn set_frame(&mut self, parity: Parity, stopbits: StopBits);
    /// Enables the USART with transmitter and receiver
    fn enable(&mut self);
    /// Transmit data buffer empty
    fn is_tx_empty(&self) -> bool;
    /// Read data buffer not empty
    fn is_rx_not_empty(&self) -> bool;
    fn write_data(&mut self, byte: u8);
    fn read_data(&mut self) -> u8;
}

/// Serial abstraction
pub struct Serial<USART> {
    usart: USART,
}

impl<USART: Instance> Serial<USART> {
    /// Configures a USART clocked at `pclk` and enables it
    ///
    /// # Panics
    ///
    /// If the baud rate cannot be reached from `pclk`.
    pub fn new(mut usart: USART, config: impl Into<Config>, pclk: Hertz) -> Self {
        let config = config.into();
        let brr = config.brr(pclk.raw());
        assert!((16..=0xffff).contains(&brr), "impossible baud rate");

        usart.set_baud_divider(brr as u16);
        usart.set_frame(config.parity, config.stopbits);
        usart.enable();

        #[cfg(feature = "defmt")]
        defmt::debug!("USART up at {} baud, BRR {}", config.baudrate.0, brr);

        Serial { usart }
    }

    /// Starts transmission of `byte` if the transmit buffer is free
    pub fn write_u8(&mut self, byte: u8) -> nb::Result<(), Error> {
        if self.usart.is_tx_empty() {
            self.usart.write_data(byte);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    pub fn flush(&mut self) -> nb::Result<(), Error> {
        if self.usart.is_tx_empty() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Takes a received byte out of the data register, if one arrived
    pub fn read(&mut self) -> nb::Result<u8, Error> {
        if self.usart.is_rx_not_empty() {
            Ok(self.usart.read_data())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Transmits `byte` and spins until the transmit buffer is empty again
    pub fn bwrite_byte(&mut self, byte: u8) {
        self.usart.write_data(byte);
        while !self.usart.is_tx_empty() {}
    }

    pub fn bwrite_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.bwrite_byte(byte);
        }
    }

    /// Spins until a byte is received
    pub fn bread_byte(&mut self) -> u8 {
        while !self.usart.is_rx_not_empty() {}
        self.usart.read_data()
    }

    /// Releases the USART peripheral
    pub fn release(self) -> USART {
        self.usart
    }
}

impl<USART: Instance> fmt::Write for Serial<USART> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.bwrite_all(s.as_bytes());
        Ok(())
    }
}

/// Descriptor based console on top of a [`Serial`]
pub struct Stdio<USART> {
    serial: Serial<USART>,
}

impl<USART: Instance> Stdio<USART> {
    pub fn new(serial: Serial<USART>) -> Self {
        Self { serial }
    }

    /// Transmits `data` byte by byte, waiting for the transmit buffer after each one
    ///
    /// Only [`STDOUT`] and [`STDERR`] are accepted. Returns the number of bytes written.
    pub fn write(&mut self, fd: i32, data: &[u8]) -> Result<usize, Error> {
        if fd != STDOUT && fd != STDERR {
            #[cfg(feature = "defmt")]
            defmt::trace!("write to descriptor {} rejected", fd);

            return Err(Error::BadFileDescriptor);
        }

        self.serial.bwrite_all(data);
        Ok(data.len())
    }

    /// Blocks until one byte is received and stores it in `data[0]`
    ///
    /// Always returns 1 for a non-empty buffer, the caller reads again for more. The
    /// descriptor is not checked, every stream is backed by the same USART.
    pub fn read(&mut self, _fd: i32, data: &mut [u8]) -> Result<usize, Error> {
        match data.first_mut() {
            Some(slot) => {
                *slot = self.serial.bread_byte();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    pub fn serial(&mut self) -> &mut Serial<USART> {
        &mut self.serial
    }

    pub fn into_inner(self) -> Serial<USART> {
        self.serial
    }
}

impl<USART: Instance> fmt::Write for Stdio<USART> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(STDOUT, s.as_bytes())
            .map(|_| ())
            .map_err(|_| fmt::Error)
    }
}

impl From<StopBits> for crate::pac::usart1::cr2::STOP {
    fn from(stopbits: StopBits) -> Self {
        use crate::pac::usart1::cr2::STOP;
        match stopbits {
            StopBits::One => STOP::Stop1,
            StopBits::Half => STOP::Stop0p5,
            StopBits::Two => STOP::Stop2,
            StopBits::OneAndHalf => STOP::Stop1p5,
        }
    }
}

macro_rules! hal {
    ($($USARTX:ident,)+) => {
        $(
            impl Instance for crate::pac::$USARTX {
                fn set_baud_divider(&mut self, brr: u16) {
                    self.brr().write(|w| {
                        w.div_mantissa()
                            .set(brr >> 4)
                            .div_fraction()
                            .set((brr & 0xf) as u8)
                    });
                }

                fn set_frame(&mut self, parity: Parity, stopbits: StopBits) {
                    // The parity bit takes the place of a 9th data bit
                    let (parity_control, odd) = match parity {
                        Parity::None => (false, false),
                        Parity::Even => (true, false),
                        Parity::Odd => (true, true),
                    };
                    self.cr1().modify(|_, w| {
                        w.m()
                            .bit(parity_control)
                            .pce()
                            .bit(parity_control)
                            .ps()
                            .bit(odd)
                    });
                    self.cr2().modify(|_, w| w.stop().variant(stopbits.into()));
                }

                fn enable(&mut self) {
                    self.cr1()
                        .modify(|_, w| w.ue().set_bit().te().set_bit().re().set_bit());
                }

                fn is_tx_empty(&self) -> bool {
                    self.sr().read().txe().bit_is_set()
                }

                fn is_rx_not_empty(&self) -> bool {
                    self.sr().read().rxne().bit_is_set()
                }

                fn write_data(&mut self, byte: u8) {
                    self.dr().write(|w| w.dr().set(byte.into()));
                }

                fn read_data(&mut self) -> u8 {
                    self.dr().read().dr().bits() as u8
                }
            }
        )+
    }
}

hal! {
    USART1,
    USART2,
    USART3,
}
