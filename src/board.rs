//! GD32F303C evaluation board wiring
//!
//! The potentiometer sits on PA1 (ADC0 channel 1) and the console is COM1, USART0 on PA9/PA10.
//! The functions here run in the order they are listed, each one assumes the previous ones
//! have set up the clocks it needs.

use embedded_hal::delay::DelayNs;

use crate::adc::{self, Adc};
use crate::gpio::{self, Mode, Pin, Port, Speed};
use crate::rcu::{self, AdcPrescaler, Clocks, Peripheral};
use crate::serial::{self, Serial, Stdio};
use crate::time::Hertz;

/// Analog input
pub const ADC_PIN: Pin = Pin::new(Port::A, 1);
pub const ADC_CHANNEL: u8 = match adc::channel(ADC_PIN) {
    Some(channel) => channel,
    None => panic!("ADC_PIN is not an ADC0 input"),
};
/// APB2 / 4, 30 MHz once [`clock_config`] has run
pub const ADC_PRESCALER: AdcPrescaler = AdcPrescaler::Div4;

/// COM1 transmit
pub const COM_TX: Pin = Pin::new(Port::A, 9);
/// COM1 receive
pub const COM_RX: Pin = Pin::new(Port::A, 10);

/// Runs the core, AHB and APB2 at 120 MHz and APB1 at 60 MHz, from the 8 MHz crystal
pub fn clock_config<RCU: rcu::Instance, FLASH: rcu::Flash>(
    rcu: &mut RCU,
    flash: &mut FLASH,
) -> Clocks {
    rcu::freeze(rcu, flash, &rcu::Config::default())
}

/// Opens the GPIOA and ADC0 clock gates and sets the ADC clock
pub fn rcu_config<RCU: rcu::Instance>(rcu: &mut RCU, clocks: &Clocks) -> Hertz {
    rcu::configure(rcu, clocks, ADC_PRESCALER)
}

/// Puts the analog input pin into analog mode
pub fn gpio_config<GPIO: gpio::Instance>(gpioa: &mut GPIO) {
    gpio::configure(gpioa, ADC_PIN, Mode::Analog);
}

/// Configures, powers up and calibrates ADC0 for the analog input pin
pub fn adc_config<ADC: adc::Instance, D: DelayNs>(adc: ADC, delay: &mut D) -> Adc<ADC> {
    Adc::new(adc, adc::Config::default().channel(ADC_CHANNEL), delay)
}

/// Brings up COM1 at 115200 8N1
pub fn com_init<RCU, GPIO, USART>(
    rcu: &mut RCU,
    gpioa: &mut GPIO,
    usart: USART,
    clocks: &Clocks,
) -> Stdio<USART>
where
    RCU: rcu::Instance,
    GPIO: gpio::Instance,
    USART: serial::Instance,
{
    rcu::enable_all(rcu, &[Peripheral::GpioA, Peripheral::Usart0]);

    gpio::configure(gpioa, COM_TX, Mode::AlternatePushPull(Speed::Mhz50));
    gpio::configure(gpioa, COM_RX, Mode::Floating);

    // USART0 hangs off APB2
    let serial = Serial::new(usart, serial::Config::default(), clocks.pclk2());
    Stdio::new(serial)
}
