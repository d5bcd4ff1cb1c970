//! # API for the Analog to Digital converter
//!
//! Drives ADC0 on a single regular channel with hardware oversampling. Configuration follows
//! a fixed order: mode and sequence registers first, oversampling next, then power-up, a settle
//! delay and finally calibration. The converter must be powered before calibration starts and
//! must have settled, otherwise the calibration result is meaningless.
//!
//! ```rust,ignore
//! let mut adc = Adc::new(dp.ADC1, Config::default().channel(1), &mut delay);
//! adc.start();
//! adc.clear_eoc();
//! adc.wait_eoc();
//! let sample = adc.data();
//! ```

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use vcell::VolatileCell;

use crate::gpio::{Pin, Port};
use crate::time::{ExtU32, MillisDurationU32};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
/// ADC sampling time
///
/// Options for the sampling time, each is T + 0.5 ADC clock cycles.
pub enum SampleTime {
    /// 1.5 cycles sampling time
    T_1,
    /// 7.5 cycles sampling time
    T_7,
    /// 13.5 cycles sampling time
    T_13,
    /// 28.5 cycles sampling time
    T_28,
    /// 41.5 cycles sampling time
    T_41,
    /// 55.5 cycles sampling time
    T_55,
    /// 71.5 cycles sampling time
    T_71,
    /// 239.5 cycles sampling time
    T_239,
}

impl From<SampleTime> for u8 {
    fn from(val: SampleTime) -> Self {
        use SampleTime::*;
        match val {
            T_1 => 0,
            T_7 => 1,
            T_13 => 2,
            T_28 => 3,
            T_41 => 4,
            T_55 => 5,
            T_71 => 6,
            T_239 => 7,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// ADC data register alignment
pub enum Align {
    /// Right alignment of output data
    #[default]
    Right,
    /// Left alignment of output data
    Left,
}

impl From<Align> for bool {
    fn from(val: Align) -> Self {
        match val {
            Align::Right => false,
            Align::Left => true,
        }
    }
}

/// External trigger of the regular group
///
/// `None` selects the software start bit as the only trigger.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    Timer0Ch0 = 0,
    Timer0Ch1 = 1,
    Timer0Ch2 = 2,
    Timer1Ch1 = 3,
    Timer2Trgo = 4,
    Timer3Ch3 = 5,
    /// EXTI line 11, or TIMER7 TRGO when remapped
    Exti11 = 6,
    None = 7,
}

/// Dual-ADC synchronisation mode
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Each ADC works independently
    Free = 0,
    InsertedParallel = 5,
    RegularParallel = 6,
    RegularFollowupFast = 7,
    RegularFollowupSlow = 8,
    InsertedTriggerRotation = 9,
}

/// Number of conversions accumulated per oversampled result
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OversampleRatio {
    Mul2 = 0,
    Mul4 = 1,
    Mul8 = 2,
    Mul16 = 3,
    Mul32 = 4,
    Mul64 = 5,
    Mul128 = 6,
    Mul256 = 7,
}

impl OversampleRatio {
    pub const fn factor(self) -> u32 {
        2 << (self as u32)
    }
}

/// Right shift applied to the accumulated sum
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OversampleShift {
    None = 0,
    B1 = 1,
    B2 = 2,
    B3 = 3,
    B4 = 4,
    B5 = 5,
    B6 = 6,
    B7 = 7,
    B8 = 8,
}

impl OversampleShift {
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// What one trigger starts while oversampling
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OversampleTrigger {
    /// All conversions of the oversampled result run after a single trigger
    #[default]
    AllConvert,
    /// Each conversion needs its own trigger
    OneConvert,
}

/// Hardware oversampling settings
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Oversampling {
    pub ratio: OversampleRatio,
    pub shift: OversampleShift,
    pub trigger: OversampleTrigger,
}

impl Oversampling {
    pub const fn new(ratio: OversampleRatio, shift: OversampleShift) -> Self {
        Self {
            ratio,
            shift,
            trigger: OversampleTrigger::AllConvert,
        }
    }

    pub fn trigger(mut self, trigger: OversampleTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Largest result for a full-scale input, clamped to the 16-bit data register
    pub fn max_sample(&self) -> u16 {
        let sum = u32::from(MAX_RAW) * self.ratio.factor();
        let shifted = sum >> self.shift.bits();
        shifted.min(u32::from(u16::MAX)) as u16
    }
}

/// Largest raw 12-bit conversion result
const MAX_RAW: u16 = (1 << 12) - 1;

bitflags::bitflags! {
    /// `ADC_STAT` flags
    pub struct Status: u32 {
        /// Analog watchdog event
        const WDE = 1 << 0;
        /// End of conversion of the regular group
        const EOC = 1 << 1;
        /// End of conversion of the inserted group
        const EOIC = 1 << 2;
        /// Inserted group started
        const STIC = 1 << 3;
        /// Regular group started
        const STRC = 1 << 4;
    }
}

/// ADC configuration
///
/// The defaults sample channel 1 continuously for 55.5 cycles, started by software, and
/// average 256 conversions into one right-aligned result (sum shifted right by 8 bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub continuous: bool,
    pub scan: bool,
    pub trigger: TriggerSource,
    pub align: Align,
    pub sync_mode: SyncMode,
    pub channel: u8,
    pub sample_time: SampleTime,
    pub oversampling: Option<Oversampling>,
    /// Wait between power-up and calibration
    pub settle: MillisDurationU32,
}

impl Config {
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn trigger(mut self, trigger: TriggerSource) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// # Panics
    ///
    /// If `channel` is not one of the 18 ADC0 channels.
    pub fn channel(mut self, channel: u8) -> Self {
        assert!(channel < 18, "ADC0 has channels 0 to 17");
        self.channel = channel;
        self
    }

    pub fn sample_time(mut self, sample_time: SampleTime) -> Self {
        self.sample_time = sample_time;
        self
    }

    pub fn oversampling(mut self, oversampling: Option<Oversampling>) -> Self {
        self.oversampling = oversampling;
        self
    }

    pub fn settle(mut self, settle: MillisDurationU32) -> Self {
        self.settle = settle;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            continuous: true,
            scan: false,
            trigger: TriggerSource::None,
            align: Align::Right,
            sync_mode: SyncMode::Free,
            channel: 1,
            sample_time: SampleTime::T_55,
            oversampling: Some(Oversampling::new(
                OversampleRatio::Mul256,
                OversampleShift::B8,
            )),
            settle: 1.millis(),
        }
    }
}

/// ADC0 channel wired to `pin`, if any
pub const fn channel(pin: Pin) -> Option<u8> {
    match (pin.port, pin.index) {
        (Port::A, i @ 0..=7) => Some(i),
        (Port::B, i @ 0..=1) => Some(8 + i),
        (Port::C, i @ 0..=5) => Some(10 + i),
        _ => None,
    }
}

/// Register-level operations of an ADC
pub trait Instance {
    fn set_continuous(&mut self, enable: bool);
    fn set_scan(&mut self, enable: bool);
    fn set_regular_trigger_source(&mut self, source: TriggerSource);
    fn set_align(&mut self, align: Align);
    fn set_sync_mode(&mut self, mode: SyncMode);
    /// Number of conversions in the regular sequence, 1 to 16
    fn set_regular_length(&mut self, len: u8);
    /// Puts `channel` at position `rank` of the regular sequence
    fn set_regular_channel(&mut self, rank: u8, channel: u8, sample_time: SampleTime);
    fn set_regular_external_trigger(&mut self, enable: bool);
    fn configure_oversampling(&mut self, oversampling: Oversampling);
    fn set_oversampling_enabled(&mut self, enable: bool);
    fn power_up(&mut self);
    fn power_down(&mut self);
    fn reset_calibration(&mut self);
    fn is_resetting_calibration(&self) -> bool;
    fn start_calibration(&mut self);
    fn is_calibrating(&self) -> bool;
    /// Starts a conversion of the regular group
    fn software_trigger(&mut self);
    fn status(&self) -> Status;
    fn clear_status(&mut self, flags: Status);
    /// Regular data register
    fn data(&self) -> u16;
}

/// ADC driver
pub struct Adc<ADC> {
    rb: ADC,
    config: Config,
}

impl<ADC: Instance> Adc<ADC> {
    /// Configures the converter, powers it up and calibrates it
    ///
    /// The clock gate of the ADC and the analog mode of the channel pin must already be set.
    ///
    /// # Panics
    ///
    /// If `config.channel` is not one of the 18 ADC0 channels.
    pub fn new<D: DelayNs>(rb: ADC, config: Config, delay: &mut D) -> Self {
        assert!(config.channel < 18, "ADC0 has channels 0 to 17");
        let mut s = Self { rb, config };
        s.setup();
        s.rb.power_up();
        delay.delay_ms(s.config.settle.ticks());
        s.calibrate();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "ADC0 ready on channel {}, oversampling {}",
            s.config.channel,
            s.config.oversampling
        );

        s
    }

    fn setup(&mut self) {
        let cfg = self.config;
        self.rb.set_continuous(cfg.continuous);
        self.rb.set_scan(cfg.scan);
        self.rb.set_regular_trigger_source(cfg.trigger);
        self.rb.set_align(cfg.align);
        self.rb.set_sync_mode(cfg.sync_mode);
        self.rb.set_regular_length(1);
        self.rb.set_regular_channel(0, cfg.channel, cfg.sample_time);
        // The software start bit only takes effect while the external trigger is enabled
        self.rb.set_regular_external_trigger(true);

        if let Some(oversampling) = cfg.oversampling {
            self.rb.configure_oversampling(oversampling);
            self.rb.set_oversampling_enabled(true);
        } else {
            self.rb.set_oversampling_enabled(false);
        }
    }

    fn calibrate(&mut self) {
        // reset calibration
        self.rb.reset_calibration();
        while self.rb.is_resetting_calibration() {}

        // calibrate
        self.rb.start_calibration();
        while self.rb.is_calibrating() {}
    }

    /// Starts a conversion of the regular group
    pub fn start(&mut self) {
        self.rb.software_trigger();
    }

    pub fn clear_eoc(&mut self) {
        self.rb.clear_status(Status::EOC);
    }

    pub fn is_eoc(&self) -> bool {
        self.rb.status().contains(Status::EOC)
    }

    /// Non-blocking check for the end of conversion
    pub fn poll_eoc(&self) -> nb::Result<(), Infallible> {
        if self.is_eoc() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Spins until the end-of-conversion flag is set
    ///
    /// There is no timeout, a converter that never finishes stalls the caller.
    pub fn wait_eoc(&self) {
        match nb::block!(self.poll_eoc()) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Reads the regular data register
    pub fn data(&self) -> u16 {
        self.rb.data()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the largest possible sample value for the current settings
    pub fn max_sample(&self) -> u16 {
        match (self.config.align, self.config.oversampling) {
            (Align::Left, _) => u16::MAX,
            (Align::Right, Some(oversampling)) => oversampling.max_sample(),
            (Align::Right, None) => MAX_RAW,
        }
    }

    /// Powers down the ADC and releases the peripheral
    pub fn release(mut self) -> ADC {
        self.rb.power_down();
        self.rb
    }
}

// ADC_OVSAMPCTL, GD32 only
const OVSAMPCTL_OFFSET: usize = 0x80;
const OVSAMPCTL_OVSEN: u32 = 1 << 0;
const OVSAMPCTL_OVSR_SHIFT: u32 = 2;
const OVSAMPCTL_OVSS_SHIFT: u32 = 5;
const OVSAMPCTL_TOVS: u32 = 1 << 9;
const OVSAMPCTL_MASK: u32 =
    (0b111 << OVSAMPCTL_OVSR_SHIFT) | (0b1111 << OVSAMPCTL_OVSS_SHIFT) | OVSAMPCTL_TOVS;

fn modify_field(value: u32, mask: u32, bits: u32) -> u32 {
    (value & !mask) | (bits & mask)
}

/// `OVSR`, `OVSS` and `TOVS` fields for `oversampling`
fn ovsampctl_bits(oversampling: Oversampling) -> u32 {
    let trigger = match oversampling.trigger {
        OversampleTrigger::AllConvert => 0,
        OversampleTrigger::OneConvert => OVSAMPCTL_TOVS,
    };
    ((oversampling.ratio as u32) << OVSAMPCTL_OVSR_SHIFT)
        | (oversampling.shift.bits() << OVSAMPCTL_OVSS_SHIFT)
        | trigger
}

/// `ADC_OVSAMPCTL`, past the end of the register block the PAC knows about
fn ovsampctl(_adc: &crate::pac::ADC1) -> &VolatileCell<u32> {
    // NOTE(unsafe) the borrow of ADC1 guarantees exclusive access to its register block
    unsafe {
        &*((crate::pac::ADC1::ptr() as usize + OVSAMPCTL_OFFSET) as *const VolatileCell<u32>)
    }
}

impl From<SyncMode> for crate::pac::adc1::cr1::DUALMOD {
    fn from(mode: SyncMode) -> Self {
        use crate::pac::adc1::cr1::DUALMOD;
        match mode {
            SyncMode::Free => DUALMOD::Independent,
            SyncMode::InsertedParallel => DUALMOD::Injected,
            SyncMode::RegularParallel => DUALMOD::Regular,
            SyncMode::RegularFollowupFast => DUALMOD::FastInterleaved,
            SyncMode::RegularFollowupSlow => DUALMOD::SlowInterleaved,
            SyncMode::InsertedTriggerRotation => DUALMOD::AlternateTrigger,
        }
    }
}

impl Instance for crate::pac::ADC1 {
    fn set_continuous(&mut self, enable: bool) {
        self.cr2().modify(|_, w| w.cont().bit(enable));
    }

    fn set_scan(&mut self, enable: bool) {
        self.cr1().modify(|_, w| w.scan().bit(enable));
    }

    fn set_regular_trigger_source(&mut self, source: TriggerSource) {
        self.cr2().modify(|_, w| w.extsel().set(source as u8));
    }

    fn set_align(&mut self, align: Align) {
        self.cr2().modify(|_, w| w.align().bit(align.into()));
    }

    fn set_sync_mode(&mut self, mode: SyncMode) {
        self.cr1().modify(|_, w| w.dualmod().variant(mode.into()));
    }

    fn set_regular_length(&mut self, len: u8) {
        debug_assert!((1..=16).contains(&len));
        self.sqr1().modify(|_, w| w.l().set(len - 1));
    }

    fn set_regular_channel(&mut self, rank: u8, channel: u8, sample_time: SampleTime) {
        let sample_time = u8::from(sample_time);
        match channel {
            0..=9 => self.smpr2().modify(|_, w| w.smp(channel).set(sample_time)),
            10..=17 => self.smpr1().modify(|_, w| w.smp(channel - 10).set(sample_time)),
            _ => unreachable!(),
        };

        match rank {
            0..=5 => self.sqr3().modify(|_, w| unsafe { w.sq(rank).bits(channel) }),
            6..=11 => self.sqr2().modify(|_, w| unsafe { w.sq(rank - 6).bits(channel) }),
            12..=15 => self.sqr1().modify(|_, w| unsafe { w.sq(rank - 12).bits(channel) }),
            _ => unreachable!(),
        };
    }

    fn set_regular_external_trigger(&mut self, enable: bool) {
        self.cr2().modify(|_, w| w.exttrig().bit(enable));
    }

    fn configure_oversampling(&mut self, oversampling: Oversampling) {
        let reg = ovsampctl(self);
        reg.set(modify_field(
            reg.get(),
            OVSAMPCTL_MASK,
            ovsampctl_bits(oversampling),
        ));
    }

    fn set_oversampling_enabled(&mut self, enable: bool) {
        let bits = if enable { OVSAMPCTL_OVSEN } else { 0 };
        let reg = ovsampctl(self);
        reg.set(modify_field(reg.get(), OVSAMPCTL_OVSEN, bits));
    }

    fn power_up(&mut self) {
        self.cr2().modify(|_, w| w.adon().set_bit());
    }

    fn power_down(&mut self) {
        self.cr2().modify(|_, w| w.adon().clear_bit());
    }

    fn reset_calibration(&mut self) {
        self.cr2().modify(|_, w| w.rstcal().set_bit());
    }

    fn is_resetting_calibration(&self) -> bool {
        self.cr2().read().rstcal().bit_is_set()
    }

    fn start_calibration(&mut self) {
        self.cr2().modify(|_, w| w.cal().set_bit());
    }

    fn is_calibrating(&self) -> bool {
        self.cr2().read().cal().bit_is_set()
    }

    fn software_trigger(&mut self) {
        self.cr2().modify(|_, w| w.swstart().set_bit());
    }

    fn status(&self) -> Status {
        Status::from_bits_truncate(self.sr().read().bits())
    }

    fn clear_status(&mut self, flags: Status) {
        // Flags are cleared by writing 0, the write leaves the others set
        self.sr().write(|w| {
            if flags.contains(Status::WDE) {
                w.awd().clear_bit();
            }
            if flags.contains(Status::EOC) {
                w.eoc().clear_bit();
            }
            if flags.contains(Status::EOIC) {
                w.jeoc().clear_bit();
            }
            if flags.contains(Status::STIC) {
                w.jstrt().clear_bit();
            }
            if flags.contains(Status::STRC) {
                w.strt().clear_bit();
            }
            w
        });
    }

    fn data(&self) -> u16 {
        self.dr().read().data().bits()
    }
}
