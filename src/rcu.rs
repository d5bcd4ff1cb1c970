//! # Reset and clock unit
//!
//! The GD32F30x calls its clock controller RCU; in the PAC it is the `RCC` peripheral.
//!
//! Out of reset the core runs from the internal 8 MHz oscillator (IRC8M). [`freeze`] brings up
//! the clock tree described by a [`Config`], by default 120 MHz from the PLL fed by the 8 MHz
//! crystal, and returns the resulting [`Clocks`]. Everything timed from a clock (baud rates,
//! delays, the ADC clock) takes its frequencies from that value.
//!
//! The module also opens peripheral clock gates on APB2 and picks the ADC clock prescaler.
//! Gates must be open before a peripheral's registers are touched, writes to a gated
//! peripheral are ignored by the hardware.
//!
//! ```rust,ignore
//! let clocks = rcu::freeze(&mut dp.RCC, &mut dp.FLASH, &rcu::Config::default());
//! ```

use crate::gpio::Port;
use crate::time::{Hertz, RateExtU32};

/// Internal RC oscillator, the system clock out of reset
pub const IRC8M: u32 = 8_000_000;

/// Peripherals behind an APB2 clock gate
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Peripheral {
    GpioA,
    GpioB,
    GpioC,
    Adc0,
    Usart0,
}

impl From<Port> for Peripheral {
    fn from(port: Port) -> Self {
        match port {
            Port::A => Peripheral::GpioA,
            Port::B => Peripheral::GpioB,
            Port::C => Peripheral::GpioC,
        }
    }
}

/// ADC clock prescaler, dividing the APB2 clock
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdcPrescaler {
    Div2,
    Div4,
    Div6,
    Div8,
    Div12,
    Div16,
}

impl AdcPrescaler {
    pub const fn divisor(self) -> u32 {
        match self {
            AdcPrescaler::Div2 => 2,
            AdcPrescaler::Div4 => 4,
            AdcPrescaler::Div6 => 6,
            AdcPrescaler::Div8 => 8,
            AdcPrescaler::Div12 => 12,
            AdcPrescaler::Div16 => 16,
        }
    }

    /// 3-bit `ADCPSC` value. Bits 1:0 go to `RCU_CFG0[15:14]`, bit 2 to `RCU_CFG0[28]`.
    pub const fn bits(self) -> u8 {
        match self {
            AdcPrescaler::Div2 => 0b000,
            AdcPrescaler::Div4 => 0b001,
            AdcPrescaler::Div6 => 0b010,
            AdcPrescaler::Div8 => 0b011,
            AdcPrescaler::Div12 => 0b101,
            AdcPrescaler::Div16 => 0b111,
        }
    }
}

/// AHB prescaler, dividing the system clock
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AhbPrescaler {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbPrescaler {
    pub const fn divisor(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 1,
            AhbPrescaler::Div2 => 2,
            AhbPrescaler::Div4 => 4,
            AhbPrescaler::Div8 => 8,
            AhbPrescaler::Div16 => 16,
            AhbPrescaler::Div64 => 64,
            AhbPrescaler::Div128 => 128,
            AhbPrescaler::Div256 => 256,
            AhbPrescaler::Div512 => 512,
        }
    }

    /// `AHBPSC` value
    pub const fn bits(self) -> u8 {
        match self {
            AhbPrescaler::Div1 => 0b0000,
            AhbPrescaler::Div2 => 0b1000,
            AhbPrescaler::Div4 => 0b1001,
            AhbPrescaler::Div8 => 0b1010,
            AhbPrescaler::Div16 => 0b1011,
            AhbPrescaler::Div64 => 0b1100,
            AhbPrescaler::Div128 => 0b1101,
            AhbPrescaler::Div256 => 0b1110,
            AhbPrescaler::Div512 => 0b1111,
        }
    }
}

/// APB1 or APB2 prescaler, dividing the AHB clock
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApbPrescaler {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbPrescaler {
    pub const fn divisor(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 1,
            ApbPrescaler::Div2 => 2,
            ApbPrescaler::Div4 => 4,
            ApbPrescaler::Div8 => 8,
            ApbPrescaler::Div16 => 16,
        }
    }

    /// `APB1PSC` / `APB2PSC` value
    pub const fn bits(self) -> u8 {
        match self {
            ApbPrescaler::Div1 => 0b000,
            ApbPrescaler::Div2 => 0b100,
            ApbPrescaler::Div4 => 0b101,
            ApbPrescaler::Div8 => 0b110,
            ApbPrescaler::Div16 => 0b111,
        }
    }
}

/// PLL input
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PllSource {
    /// IRC8M divided by 2
    Irc8mDiv2,
    Hxtal,
}

/// System clock source (`SCS` / `SCSS`)
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SystemClock {
    #[default]
    Irc8m,
    Hxtal,
    Pll,
}

/// `PLLMF` encoding of a PLL multiplier from 2 to 32
///
/// Returns bits 3:0, which the PAC knows as `PLLMUL`, and bit 4 of the field, which the GD32
/// keeps in `RCU_CFG0[27]`. Multipliers 15 and 16 both have a code below 16, 17 starts the
/// upper half.
pub const fn pll_mul_bits(mul: u8) -> (u8, bool) {
    let code = if mul <= 16 { mul - 2 } else { mul - 1 };
    (code & 0b1111, code & 0b1_0000 != 0)
}

/// Flash wait states needed at `sysclk`
pub const fn flash_wait_states(sysclk: Hertz) -> u8 {
    let sysclk = sysclk.raw();
    if sysclk <= 24_000_000 {
        0
    } else if sysclk <= 48_000_000 {
        1
    } else {
        2
    }
}

/// Clock tree configuration
///
/// The default is the evaluation board setup: the 8 MHz crystal multiplied by 15 gives
/// 120 MHz for the core, the AHB and APB2, APB1 runs at half speed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Crystal frequency, `None` to leave the crystal off
    pub hxtal: Option<Hertz>,
    /// PLL multiplier, `None` to run the core straight from the oscillator
    pub pll_mul: Option<u8>,
    pub ahb: AhbPrescaler,
    pub apb1: ApbPrescaler,
    pub apb2: ApbPrescaler,
}

impl Config {
    /// Highest system clock of the GD32F30x
    pub const MAX_SYSCLK: u32 = 120_000_000;
    /// Highest APB1 clock of the GD32F30x
    pub const MAX_PCLK1: u32 = 60_000_000;

    /// The reset state: IRC8M feeds every bus undivided
    pub const fn irc8m() -> Self {
        Self {
            hxtal: None,
            pll_mul: None,
            ahb: AhbPrescaler::Div1,
            apb1: ApbPrescaler::Div1,
            apb2: ApbPrescaler::Div1,
        }
    }

    pub fn hxtal(mut self, freq: Hertz) -> Self {
        self.hxtal = Some(freq);
        self
    }

    pub fn pll_mul(mut self, mul: u8) -> Self {
        self.pll_mul = Some(mul);
        self
    }

    pub fn ahb(mut self, prescaler: AhbPrescaler) -> Self {
        self.ahb = prescaler;
        self
    }

    pub fn apb1(mut self, prescaler: ApbPrescaler) -> Self {
        self.apb1 = prescaler;
        self
    }

    pub fn apb2(mut self, prescaler: ApbPrescaler) -> Self {
        self.apb2 = prescaler;
        self
    }

    pub fn pll_source(&self) -> PllSource {
        if self.hxtal.is_some() {
            PllSource::Hxtal
        } else {
            PllSource::Irc8mDiv2
        }
    }

    pub fn system_clock(&self) -> SystemClock {
        match (self.pll_mul, self.hxtal) {
            (Some(_), _) => SystemClock::Pll,
            (None, Some(_)) => SystemClock::Hxtal,
            (None, None) => SystemClock::Irc8m,
        }
    }

    /// Bus frequencies this configuration produces
    ///
    /// # Panics
    ///
    /// If the PLL multiplier is outside 2 to 32, or the system clock or APB1 exceed what the
    /// chip is specified for.
    pub fn clocks(&self) -> Clocks {
        let sysclk = match (self.pll_mul, self.hxtal) {
            (Some(mul), hxtal) => {
                assert!((2..=32).contains(&mul), "PLL multiplier must be 2 to 32");
                let input = match hxtal {
                    Some(hxtal) => hxtal.raw(),
                    None => IRC8M / 2,
                };
                input * u32::from(mul)
            }
            (None, Some(hxtal)) => hxtal.raw(),
            (None, None) => IRC8M,
        };
        assert!(sysclk <= Self::MAX_SYSCLK, "system clock above 120 MHz");

        let hclk = sysclk / self.ahb.divisor();
        let pclk1 = hclk / self.apb1.divisor();
        let pclk2 = hclk / self.apb2.divisor();
        assert!(pclk1 <= Self::MAX_PCLK1, "APB1 clock above 60 MHz");

        Clocks::new(sysclk.Hz(), hclk.Hz(), pclk1.Hz(), pclk2.Hz())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::irc8m()
            .hxtal(8.MHz())
            .pll_mul(15)
            .apb1(ApbPrescaler::Div2)
    }
}

/// Frozen clock frequencies
///
/// The existence of this value indicates that the clock configuration can no longer be changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clocks {
    sysclk: Hertz,
    hclk: Hertz,
    pclk1: Hertz,
    pclk2: Hertz,
}

impl Clocks {
    /// Highest ADC clock the GD32F30x converter is specified for
    pub const MAX_ADCCLK: u32 = 40_000_000;

    pub const fn new(sysclk: Hertz, hclk: Hertz, pclk1: Hertz, pclk2: Hertz) -> Self {
        Self {
            sysclk,
            hclk,
            pclk1,
            pclk2,
        }
    }

    /// Returns the system (core) frequency
    pub const fn sysclk(&self) -> Hertz {
        self.sysclk
    }

    /// Returns the frequency of the AHB
    pub const fn hclk(&self) -> Hertz {
        self.hclk
    }

    /// Returns the frequency of the APB1
    pub const fn pclk1(&self) -> Hertz {
        self.pclk1
    }

    /// Returns the frequency of the APB2
    pub const fn pclk2(&self) -> Hertz {
        self.pclk2
    }

    /// Returns the ADC clock obtained with `prescaler`
    pub fn adcclk(&self, prescaler: AdcPrescaler) -> Hertz {
        Hertz::from_raw(self.pclk2.raw() / prescaler.divisor())
    }
}

/// Register-level operations of the clock unit
pub trait Instance {
    /// Opens the clock gate of `peripheral`
    fn enable(&mut self, peripheral: Peripheral);
    fn is_enabled(&self, peripheral: Peripheral) -> bool;
    fn set_adc_prescaler(&mut self, prescaler: AdcPrescaler);

    /// Starts the crystal oscillator
    fn enable_hxtal(&mut self);
    fn is_hxtal_stable(&self) -> bool;
    /// Selects the PLL input and multiplier, the PLL must be off
    fn configure_pll(&mut self, source: PllSource, mul: u8);
    fn enable_pll(&mut self);
    fn is_pll_locked(&self) -> bool;
    fn set_bus_prescalers(&mut self, ahb: AhbPrescaler, apb1: ApbPrescaler, apb2: ApbPrescaler);
    fn select_system_clock(&mut self, source: SystemClock);
    /// Clock source the core currently runs from
    fn system_clock(&self) -> SystemClock;
}

/// Flash wait state control
pub trait Flash {
    fn set_wait_states(&mut self, wait_states: u8);
}

/// Applies `config` to the clock tree and returns the resulting frequencies
///
/// Meant to run once, right after reset, while the core still runs from IRC8M.
///
/// # Panics
///
/// If `config` asks for frequencies the chip does not support, see [`Config::clocks`].
pub fn freeze<RCU: Instance, FLASH: Flash>(
    rcu: &mut RCU,
    flash: &mut FLASH,
    config: &Config,
) -> Clocks {
    let clocks = config.clocks();

    // adjust flash wait states before the core speeds up
    flash.set_wait_states(flash_wait_states(clocks.sysclk()));

    if config.hxtal.is_some() {
        // enable HXTAL and wait for it to be ready
        rcu.enable_hxtal();
        while !rcu.is_hxtal_stable() {}
    }

    if let Some(mul) = config.pll_mul {
        // enable PLL and wait for it to lock
        rcu.configure_pll(config.pll_source(), mul);
        rcu.enable_pll();
        while !rcu.is_pll_locked() {}
    }

    rcu.set_bus_prescalers(config.ahb, config.apb1, config.apb2);

    let source = config.system_clock();
    rcu.select_system_clock(source);
    while rcu.system_clock() != source {}

    #[cfg(feature = "defmt")]
    defmt::debug!(
        "clocks frozen: SYSCLK {} Hz, APB1 {} Hz, APB2 {} Hz",
        clocks.sysclk().raw(),
        clocks.pclk1().raw(),
        clocks.pclk2().raw()
    );

    clocks
}

/// Opens the gates of `peripherals` in order
pub fn enable_all<RCU: Instance>(rcu: &mut RCU, peripherals: &[Peripheral]) {
    for &peripheral in peripherals {
        if !rcu.is_enabled(peripheral) {
            rcu.enable(peripheral);
        }
    }
}

/// Sets the ADC clock prescaler and returns the resulting ADC clock
///
/// # Panics
///
/// If the ADC clock would exceed [`Clocks::MAX_ADCCLK`].
pub fn configure_adc_clock<RCU: Instance>(
    rcu: &mut RCU,
    clocks: &Clocks,
    prescaler: AdcPrescaler,
) -> Hertz {
    let adcclk = clocks.adcclk(prescaler);
    assert!(
        adcclk.raw() <= Clocks::MAX_ADCCLK,
        "ADC clock above 40 MHz, pick a larger prescaler"
    );

    rcu.set_adc_prescaler(prescaler);

    #[cfg(feature = "defmt")]
    defmt::debug!("ADC clock set to {} Hz", adcclk.raw());

    adcclk
}

/// Opens the GPIOA and ADC0 gates, then sets the ADC clock
///
/// Must run before the analog pin or the ADC registers are touched.
pub fn configure<RCU: Instance>(rcu: &mut RCU, clocks: &Clocks, prescaler: AdcPrescaler) -> Hertz {
    enable_all(rcu, &[Peripheral::GpioA, Peripheral::Adc0]);
    configure_adc_clock(rcu, clocks, prescaler)
}

// RCU_CFG0 bits the STM32F103 leaves reserved
const CFG0_PLLMF_4: u32 = 1 << 27;
const CFG0_ADCPSC_2: u32 = 1 << 28;

fn with_bit(value: u32, mask: u32, set: bool) -> u32 {
    if set {
        value | mask
    } else {
        value & !mask
    }
}

impl Instance for crate::pac::RCC {
    #[inline(always)]
    fn enable(&mut self, peripheral: Peripheral) {
        self.apb2enr().modify(|_, w| match peripheral {
            Peripheral::GpioA => w.iopaen().set_bit(),
            Peripheral::GpioB => w.iopben().set_bit(),
            Peripheral::GpioC => w.iopcen().set_bit(),
            Peripheral::Adc0 => w.adc1en().set_bit(),
            Peripheral::Usart0 => w.usart1en().set_bit(),
        });
        // Stall the pipeline so the gate is open before the next peripheral access
        cortex_m::asm::dsb();
    }

    #[inline(always)]
    fn is_enabled(&self, peripheral: Peripheral) -> bool {
        let r = self.apb2enr().read();
        match peripheral {
            Peripheral::GpioA => r.iopaen().bit_is_set(),
            Peripheral::GpioB => r.iopben().bit_is_set(),
            Peripheral::GpioC => r.iopcen().bit_is_set(),
            Peripheral::Adc0 => r.adc1en().bit_is_set(),
            Peripheral::Usart0 => r.usart1en().bit_is_set(),
        }
    }

    fn set_adc_prescaler(&mut self, prescaler: AdcPrescaler) {
        let bits = prescaler.bits();
        self.cfgr().modify(|r, w| {
            unsafe { w.bits(with_bit(r.bits(), CFG0_ADCPSC_2, bits & 0b100 != 0)) };
            w.adcpre().set(bits & 0b11)
        });
    }

    fn enable_hxtal(&mut self) {
        self.cr().modify(|_, w| w.hseon().set_bit());
    }

    fn is_hxtal_stable(&self) -> bool {
        self.cr().read().hserdy().bit_is_set()
    }

    fn configure_pll(&mut self, source: PllSource, mul: u8) {
        let (low, high) = pll_mul_bits(mul);
        self.cfgr().modify(|r, w| unsafe {
            w.bits(with_bit(r.bits(), CFG0_PLLMF_4, high));
            w.pllmul().bits(low);
            // HXTAL reaches the PLL undivided
            w.pllxtpre()
                .clear_bit()
                .pllsrc()
                .bit(source == PllSource::Hxtal)
        });
    }

    fn enable_pll(&mut self) {
        self.cr().modify(|_, w| w.pllon().set_bit());
    }

    fn is_pll_locked(&self) -> bool {
        self.cr().read().pllrdy().bit_is_set()
    }

    fn set_bus_prescalers(&mut self, ahb: AhbPrescaler, apb1: ApbPrescaler, apb2: ApbPrescaler) {
        self.cfgr().modify(|_, w| {
            w.hpre()
                .set(ahb.bits())
                .ppre1()
                .set(apb1.bits())
                .ppre2()
                .set(apb2.bits())
        });
    }

    fn select_system_clock(&mut self, source: SystemClock) {
        use crate::pac::rcc::cfgr::SW;
        let sw = match source {
            SystemClock::Irc8m => SW::Hsi,
            SystemClock::Hxtal => SW::Hse,
            SystemClock::Pll => SW::Pll,
        };
        self.cfgr().modify(|_, w| w.sw().variant(sw));
    }

    fn system_clock(&self) -> SystemClock {
        match self.cfgr().read().sws().bits() {
            0b01 => SystemClock::Hxtal,
            0b10 => SystemClock::Pll,
            _ => SystemClock::Irc8m,
        }
    }
}

impl Flash for crate::pac::FLASH {
    fn set_wait_states(&mut self, wait_states: u8) {
        self.acr().modify(|_, w| unsafe { w.latency().bits(wait_states) });
    }
}
