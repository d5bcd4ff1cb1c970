//! # General Purpose Input / Output
//!
//! Each pin of a GD32F30x port is configured by a 4-bit `CNF:MODE` nibble, pins 0-7 in
//! `GPIOx_CTL0` and pins 8-15 in `GPIOx_CTL1` (`CRL`/`CRH` in the PAC). Pull-up and pull-down
//! inputs additionally select the pull direction through the output latch.
//!
//! ```rust,ignore
//! // PA1 as analog input for the ADC
//! gpio::configure(&mut dp.GPIOA, Pin::new(Port::A, 1), Mode::Analog);
//! ```

/// GPIO port
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    A,
    B,
    C,
}

/// A pin on one of the ports
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pin {
    pub port: Port,
    pub index: u8,
}

impl Pin {
    pub const fn new(port: Port, index: u8) -> Self {
        Self { port, index }
    }
}

/// Output slew rate
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    Mhz10 = 0b01,
    Mhz2 = 0b10,
    Mhz50 = 0b11,
}

/// Electrical configuration of a pin
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Analog input, digital input buffer disconnected
    Analog,
    Floating,
    PullUp,
    PullDown,
    PushPull(Speed),
    OpenDrain(Speed),
    AlternatePushPull(Speed),
    AlternateOpenDrain(Speed),
}

impl Mode {
    /// `CNF:MODE` nibble for the control register
    pub const fn bits(self) -> u32 {
        let (cnf, mode) = match self {
            Mode::Analog => (0b00, 0b00),
            Mode::Floating => (0b01, 0b00),
            Mode::PullUp | Mode::PullDown => (0b10, 0b00),
            Mode::PushPull(speed) => (0b00, speed as u32),
            Mode::OpenDrain(speed) => (0b01, speed as u32),
            Mode::AlternatePushPull(speed) => (0b10, speed as u32),
            Mode::AlternateOpenDrain(speed) => (0b11, speed as u32),
        };
        (cnf << 2) | mode
    }
}

/// Register-level operations of a GPIO port
pub trait Instance {
    fn port(&self) -> Port;
    /// Writes the `CNF:MODE` nibble of pin `index`
    fn set_ctl(&mut self, index: u8, bits: u32);
    /// Sets (`high`) or resets the output latch of pin `index`
    fn set_output_latch(&mut self, index: u8, high: bool);
}

/// Puts `pin` into `mode`
///
/// Writing the same mode twice leaves the port unchanged.
///
/// # Panics
///
/// If `pin` does not belong to `gpio` or its index is out of range.
pub fn configure<GPIO: Instance>(gpio: &mut GPIO, pin: Pin, mode: Mode) {
    assert_eq!(pin.port, gpio.port(), "pin belongs to another port");
    assert!(pin.index < 16, "pin index out of range");

    match mode {
        Mode::PullUp => gpio.set_output_latch(pin.index, true),
        Mode::PullDown => gpio.set_output_latch(pin.index, false),
        _ => {}
    }
    gpio.set_ctl(pin.index, mode.bits());
}

macro_rules! gpio {
    ($($GPIOX:ident: $port:expr,)+) => {
        $(
            impl Instance for crate::pac::$GPIOX {
                fn port(&self) -> Port {
                    $port
                }

                fn set_ctl(&mut self, index: u8, bits: u32) {
                    let mode = (bits & 0b11) as u8;
                    let cnf = ((bits >> 2) & 0b11) as u8;
                    if index < 8 {
                        self.crl()
                            .modify(|_, w| w.mode(index).set(mode).cnf(index).set(cnf));
                    } else {
                        let n = index - 8;
                        self.crh().modify(|_, w| w.mode(n).set(mode).cnf(n).set(cnf));
                    }
                }

                fn set_output_latch(&mut self, index: u8, high: bool) {
                    // atomic write to a stateless register
                    if high {
                        self.bsrr().write(|w| w.bs(index).set_bit());
                    } else {
                        self.bsrr().write(|w| w.br(index).set_bit());
                    }
                }
            }
        )+
    };
}

gpio! {
    GPIOA: Port::A,
    GPIOB: Port::B,
    GPIOC: Port::C,
}
