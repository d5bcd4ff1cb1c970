//! Simulated peripherals for host tests
//!
//! All mocks of one test share a [`Hardware`] so the log shows the order in which the
//! peripherals were touched, with the simulated time at which it happened.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::adc::{self, Align, Oversampling, SampleTime, Status, SyncMode, TriggerSource};
use crate::gpio::{self, Port};
use crate::rcu::{
    self, AdcPrescaler, AhbPrescaler, ApbPrescaler, Peripheral, PllSource, SystemClock,
};
use crate::serial::{self, Parity, StopBits};

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    FlashWaitStates(u8),
    HxtalOn,
    HxtalPoll(bool),
    Pll(PllSource, u8),
    PllOn,
    PllPoll(bool),
    BusPrescalers(AhbPrescaler, ApbPrescaler, ApbPrescaler),
    SystemClock(SystemClock),
    ClockEnable(Peripheral),
    AdcPrescaler(AdcPrescaler),
    PinCtl { index: u8, bits: u32 },
    PinLatch { index: u8, high: bool },
    Continuous(bool),
    Scan(bool),
    TriggerSource(TriggerSource),
    Align(Align),
    SyncMode(SyncMode),
    RegularLength(u8),
    RegularChannel {
        rank: u8,
        channel: u8,
        sample_time: SampleTime,
    },
    ExternalTrigger(bool),
    Oversampling(Oversampling),
    OversamplingEnabled(bool),
    PowerUp,
    PowerDown,
    ResetCalibration,
    StartCalibration,
    CalibrationPoll(bool),
    SoftwareTrigger,
    ClearStatus(Status),
    EocPoll(bool),
    ReadData(u16),
    UsartBrr(u16),
    UsartFrame(Parity, StopBits),
    UsartEnable,
    Transmit(u8),
    TbePoll(bool),
    RbnePoll(bool),
    Receive(u8),
    Delay(u64),
    Print(String),
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub at_ns: u64,
    pub op: Op,
}

#[derive(Default)]
pub struct Hardware {
    pub log: Vec<Entry>,
    pub now_ns: u64,

    /// Polls that still see the crystal unstable after it is started
    pub hxtal_polls: u32,
    pub hxtal_on: bool,
    pub hxtal_stable: bool,
    /// Polls that still see the PLL unlocked after it is started
    pub pll_polls: u32,
    pub pll_source: Option<PllSource>,
    pub pll_on: bool,
    pub pll_locked: bool,
    pub sysclk_source: SystemClock,
    pub enabled: Vec<Peripheral>,
    /// GPIOA control registers
    pub ctl: [u32; 2],

    pub powered: bool,
    /// Busy polls reported by each calibration phase
    pub calibration_polls: u32,
    pub calibration_pending: u32,
    pub resetting_calibration: bool,
    pub calibrating: bool,
    /// Results handed out by successive conversions
    pub samples: VecDeque<u16>,
    /// Polls that still see EOC clear after a trigger
    pub conversion_polls: u32,
    pub conversion: Option<u32>,
    pub eoc: bool,
    pub data: u16,

    /// Polls that still see TBE clear after a byte is written
    pub tbe_polls: u32,
    pub tx_busy: u32,
    pub tx: Vec<u8>,
    /// Polls that still see RBNE clear before a received byte shows up
    pub rx_polls: u32,
    pub idle_rx_polls: u32,
    pub rx: VecDeque<u8>,
}

pub type Shared = Rc<RefCell<Hardware>>;

pub fn hardware() -> Shared {
    Rc::new(RefCell::new(Hardware {
        ctl: [0x4444_4444; 2],
        ..Hardware::default()
    }))
}

impl Hardware {
    pub fn record(&mut self, op: Op) {
        self.log.push(Entry {
            at_ns: self.now_ns,
            op,
        });
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.iter().map(|e| e.op.clone()).collect()
    }

    /// Time of the first logged operation matching `f`
    pub fn time_of(&self, f: impl Fn(&Op) -> bool) -> Option<u64> {
        self.log.iter().find(|e| f(&e.op)).map(|e| e.at_ns)
    }

    pub fn require(&self, peripheral: Peripheral) {
        assert!(
            self.enabled.contains(&peripheral),
            "{peripheral:?} accessed with its clock gate closed"
        );
    }
}

pub struct MockRcu(pub Shared);

impl rcu::Instance for MockRcu {
    fn enable(&mut self, peripheral: Peripheral) {
        let mut hw = self.0.borrow_mut();
        hw.enabled.push(peripheral);
        hw.record(Op::ClockEnable(peripheral));
    }

    fn is_enabled(&self, peripheral: Peripheral) -> bool {
        self.0.borrow().enabled.contains(&peripheral)
    }

    fn set_adc_prescaler(&mut self, prescaler: AdcPrescaler) {
        self.0.borrow_mut().record(Op::AdcPrescaler(prescaler));
    }

    fn enable_hxtal(&mut self) {
        let mut hw = self.0.borrow_mut();
        hw.hxtal_on = true;
        hw.record(Op::HxtalOn);
    }

    fn is_hxtal_stable(&self) -> bool {
        let mut hw = self.0.borrow_mut();
        assert!(hw.hxtal_on, "waiting on a crystal that was never started");
        if hw.hxtal_polls > 0 {
            hw.hxtal_polls -= 1;
        } else {
            hw.hxtal_stable = true;
        }
        let stable = hw.hxtal_stable;
        hw.record(Op::HxtalPoll(stable));
        stable
    }

    fn configure_pll(&mut self, source: PllSource, mul: u8) {
        let mut hw = self.0.borrow_mut();
        assert!(!hw.pll_on, "PLL reconfigured while running");
        hw.pll_source = Some(source);
        hw.record(Op::Pll(source, mul));
    }

    fn enable_pll(&mut self) {
        let mut hw = self.0.borrow_mut();
        if hw.pll_source == Some(PllSource::Hxtal) {
            assert!(hw.hxtal_stable, "PLL started on an unstable crystal");
        }
        hw.pll_on = true;
        hw.record(Op::PllOn);
    }

    fn is_pll_locked(&self) -> bool {
        let mut hw = self.0.borrow_mut();
        assert!(hw.pll_on, "waiting on a PLL that was never started");
        if hw.pll_polls > 0 {
            hw.pll_polls -= 1;
        } else {
            hw.pll_locked = true;
        }
        let locked = hw.pll_locked;
        hw.record(Op::PllPoll(locked));
        locked
    }

    fn set_bus_prescalers(&mut self, ahb: AhbPrescaler, apb1: ApbPrescaler, apb2: ApbPrescaler) {
        self.0
            .borrow_mut()
            .record(Op::BusPrescalers(ahb, apb1, apb2));
    }

    fn select_system_clock(&mut self, source: SystemClock) {
        let mut hw = self.0.borrow_mut();
        match source {
            SystemClock::Pll => assert!(hw.pll_locked, "PLL selected before it locked"),
            SystemClock::Hxtal => assert!(hw.hxtal_stable, "crystal selected before it settled"),
            SystemClock::Irc8m => {}
        }
        hw.sysclk_source = source;
        hw.record(Op::SystemClock(source));
    }

    fn system_clock(&self) -> SystemClock {
        self.0.borrow().sysclk_source
    }
}

/// Flash controller
pub struct MockFlash(pub Shared);

impl rcu::Flash for MockFlash {
    fn set_wait_states(&mut self, wait_states: u8) {
        let mut hw = self.0.borrow_mut();
        assert_eq!(
            hw.sysclk_source,
            SystemClock::Irc8m,
            "wait states changed after the clock switch"
        );
        hw.record(Op::FlashWaitStates(wait_states));
    }
}

/// Port A
pub struct MockGpio(pub Shared);

impl gpio::Instance for MockGpio {
    fn port(&self) -> Port {
        Port::A
    }

    fn set_ctl(&mut self, index: u8, bits: u32) {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::GpioA);
        let reg = usize::from(index / 8);
        let offset = u32::from(index % 8) * 4;
        hw.ctl[reg] = (hw.ctl[reg] & !(0b1111 << offset)) | (bits << offset);
        hw.record(Op::PinCtl { index, bits });
    }

    fn set_output_latch(&mut self, index: u8, high: bool) {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::GpioA);
        hw.record(Op::PinLatch { index, high });
    }
}

/// ADC0
pub struct MockAdc(pub Shared);

impl MockAdc {
    fn apply(&self, op: Op) {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::Adc0);
        hw.record(op);
    }
}

impl adc::Instance for MockAdc {
    fn set_continuous(&mut self, enable: bool) {
        self.apply(Op::Continuous(enable));
    }

    fn set_scan(&mut self, enable: bool) {
        self.apply(Op::Scan(enable));
    }

    fn set_regular_trigger_source(&mut self, source: TriggerSource) {
        self.apply(Op::TriggerSource(source));
    }

    fn set_align(&mut self, align: Align) {
        self.apply(Op::Align(align));
    }

    fn set_sync_mode(&mut self, mode: SyncMode) {
        self.apply(Op::SyncMode(mode));
    }

    fn set_regular_length(&mut self, len: u8) {
        self.apply(Op::RegularLength(len));
    }

    fn set_regular_channel(&mut self, rank: u8, channel: u8, sample_time: SampleTime) {
        self.apply(Op::RegularChannel {
            rank,
            channel,
            sample_time,
        });
    }

    fn set_regular_external_trigger(&mut self, enable: bool) {
        self.apply(Op::ExternalTrigger(enable));
    }

    fn configure_oversampling(&mut self, oversampling: Oversampling) {
        self.apply(Op::Oversampling(oversampling));
    }

    fn set_oversampling_enabled(&mut self, enable: bool) {
        self.apply(Op::OversamplingEnabled(enable));
    }

    fn power_up(&mut self) {
        self.apply(Op::PowerUp);
        self.0.borrow_mut().powered = true;
    }

    fn power_down(&mut self) {
        self.apply(Op::PowerDown);
        self.0.borrow_mut().powered = false;
    }

    fn reset_calibration(&mut self) {
        self.apply(Op::ResetCalibration);
        let mut hw = self.0.borrow_mut();
        assert!(hw.powered, "calibration reset on a powered-down ADC");
        hw.resetting_calibration = true;
        hw.calibration_pending = hw.calibration_polls;
    }

    fn is_resetting_calibration(&self) -> bool {
        let mut hw = self.0.borrow_mut();
        if hw.calibration_pending > 0 {
            hw.calibration_pending -= 1;
        } else {
            hw.resetting_calibration = false;
        }
        let busy = hw.resetting_calibration;
        hw.record(Op::CalibrationPoll(busy));
        busy
    }

    fn start_calibration(&mut self) {
        self.apply(Op::StartCalibration);
        let mut hw = self.0.borrow_mut();
        assert!(hw.powered, "calibration on a powered-down ADC");
        assert!(!hw.resetting_calibration, "calibration during calibration reset");
        hw.calibrating = true;
        hw.calibration_pending = hw.calibration_polls;
    }

    fn is_calibrating(&self) -> bool {
        let mut hw = self.0.borrow_mut();
        if hw.calibration_pending > 0 {
            hw.calibration_pending -= 1;
        } else {
            hw.calibrating = false;
        }
        let busy = hw.calibrating;
        hw.record(Op::CalibrationPoll(busy));
        busy
    }

    fn software_trigger(&mut self) {
        self.apply(Op::SoftwareTrigger);
        let mut hw = self.0.borrow_mut();
        assert!(hw.powered, "trigger on a powered-down ADC");
        hw.conversion = Some(hw.conversion_polls);
    }

    fn status(&self) -> Status {
        let mut hw = self.0.borrow_mut();
        match hw.conversion {
            Some(0) => {
                hw.conversion = None;
                hw.eoc = true;
                if let Some(sample) = hw.samples.pop_front() {
                    hw.data = sample;
                }
            }
            Some(n) => hw.conversion = Some(n - 1),
            None => {}
        }
        let eoc = hw.eoc;
        hw.record(Op::EocPoll(eoc));
        if eoc {
            Status::EOC
        } else {
            Status::empty()
        }
    }

    fn clear_status(&mut self, flags: Status) {
        self.apply(Op::ClearStatus(flags));
        if flags.contains(Status::EOC) {
            self.0.borrow_mut().eoc = false;
        }
    }

    fn data(&self) -> u16 {
        let mut hw = self.0.borrow_mut();
        let data = hw.data;
        hw.record(Op::ReadData(data));
        data
    }
}

/// USART0
pub struct MockUsart(pub Shared);

impl serial::Instance for MockUsart {
    fn set_baud_divider(&mut self, brr: u16) {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::Usart0);
        hw.record(Op::UsartBrr(brr));
    }

    fn set_frame(&mut self, parity: Parity, stopbits: StopBits) {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::Usart0);
        hw.record(Op::UsartFrame(parity, stopbits));
    }

    fn enable(&mut self) {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::Usart0);
        hw.record(Op::UsartEnable);
    }

    fn is_tx_empty(&self) -> bool {
        let mut hw = self.0.borrow_mut();
        let empty = hw.tx_busy == 0;
        if !empty {
            hw.tx_busy -= 1;
        }
        hw.record(Op::TbePoll(empty));
        empty
    }

    fn is_rx_not_empty(&self) -> bool {
        let mut hw = self.0.borrow_mut();
        let ready = if hw.rx_polls > 0 {
            hw.rx_polls -= 1;
            false
        } else {
            !hw.rx.is_empty()
        };
        if !ready {
            hw.idle_rx_polls += 1;
            assert!(hw.idle_rx_polls < 10_000, "receive would wait forever");
        }
        hw.record(Op::RbnePoll(ready));
        ready
    }

    fn write_data(&mut self, byte: u8) {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::Usart0);
        assert_eq!(hw.tx_busy, 0, "transmit register overwritten");
        hw.tx.push(byte);
        hw.tx_busy = hw.tbe_polls;
        hw.record(Op::Transmit(byte));
    }

    fn read_data(&mut self) -> u8 {
        let mut hw = self.0.borrow_mut();
        hw.require(Peripheral::Usart0);
        let byte = hw.rx.pop_front().unwrap_or(0);
        hw.record(Op::Receive(byte));
        byte
    }
}

/// Advances the simulated clock instead of waiting
pub struct MockDelay(pub Shared);

impl MockDelay {
    fn wait(&mut self, ns: u64) {
        let mut hw = self.0.borrow_mut();
        hw.record(Op::Delay(ns));
        hw.now_ns += ns;
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.wait(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.wait(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.wait(u64::from(ms) * 1_000_000);
    }
}

/// Collects formatted output, consecutive writes share one `Print` entry
pub struct MockOut(pub Shared);

impl fmt::Write for MockOut {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut hw = self.0.borrow_mut();
        if let Some(Entry {
            op: Op::Print(text),
            ..
        }) = hw.log.last_mut()
        {
            text.push_str(s);
            return Ok(());
        }
        hw.record(Op::Print(s.into()));
        Ok(())
    }
}

impl MockOut {
    /// Everything written so far
    pub fn text(hw: &Hardware) -> String {
        hw.log
            .iter()
            .filter_map(|e| match &e.op {
                Op::Print(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}
