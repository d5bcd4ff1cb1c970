//! Samples PA1 with 256x hardware oversampling and prints the result on COM1 every 500 ms
//!
//! Connect a terminal to USART0 (PA9/PA10) at 115200 8N1.

#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use panic_halt as _;

use cortex_m_rt::entry;

use gd32f30x_adc_oversample::{
    board,
    delay::SysDelay,
    pac,
    sampler::{self, Sampler},
    serial,
};

#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();
    let mut dp = pac::Peripherals::take().unwrap();

    let clocks = board::clock_config(&mut dp.RCC, &mut dp.FLASH);

    board::rcu_config(&mut dp.RCC, &clocks);
    let mut delay = SysDelay::new(cp.SYST, &clocks);
    board::gpio_config(&mut dp.GPIOA);
    let adc = board::adc_config(dp.ADC1, &mut delay);
    let mut console = board::com_init(&mut dp.RCC, &mut dp.GPIOA, dp.USART1, &clocks);

    console.write(serial::STDOUT, b"Hello World\r\n").ok();

    Sampler::new(adc, delay, console, sampler::Config::default()).run()
}
