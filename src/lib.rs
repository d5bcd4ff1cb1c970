//! # ADC oversampling firmware for the GD32F30x family
//!
//! Samples one analog input of a GD32F30x with the converter's hardware oversampling and prints
//! each result on the serial console every 500 ms.
//!
//! The GD32F30x register map is compatible with the STM32F103, so the [`stm32f1`] PAC is used
//! for register access. Names follow the GD32 manuals (RCU, ADC0, USART0); in the PAC these are
//! `RCC`, `ADC1` and `USART1`. Registers only the GD32 has, such as the ADC oversampling control,
//! are reached through [`vcell`].
//!
//! Every driver talks to its peripheral through a small `Instance` trait implemented for the PAC
//! type, which lets the whole firmware run against simulated peripherals on the host.
//!
//! # Usage
//!
//! Select the chip with a Cargo feature (`gd32f303` by default, `gd32f305`, `gd32f307`) and
//! enable `rt` for the firmware binary. The `defmt` feature turns on debug logging.
//!
//! ```rust,ignore
//! let clocks = board::clock_config(&mut dp.RCC, &mut dp.FLASH);
//! let mut delay = SysDelay::new(cp.SYST, &clocks);
//!
//! board::rcu_config(&mut dp.RCC, &clocks);
//! board::gpio_config(&mut dp.GPIOA);
//! let adc = board::adc_config(dp.ADC1, &mut delay);
//! let console = board::com_init(&mut dp.RCC, &mut dp.GPIOA, dp.USART1, &clocks);
//!
//! Sampler::new(adc, delay, console, sampler::Config::default()).run()
//! ```
//!
//! See `demos/adc_oversample.rs` for the complete program.

#![cfg_attr(not(test), no_std)]

#[cfg(not(any(feature = "gd32f303", feature = "gd32f305", feature = "gd32f307")))]
compile_error!(
    "Target not found. A `--features <target-name>` is required: gd32f303, gd32f305 or gd32f307"
);

#[cfg(feature = "gd32f303")]
pub use stm32f1::stm32f103 as pac;

#[cfg(any(feature = "gd32f305", feature = "gd32f307"))]
pub use stm32f1::stm32f107 as pac;

/// Chip the crate was built for
pub const CHIP: &str = env!("GD32_CHIP");

/// ADC0
pub type ADC0 = pac::ADC1;
/// USART0
pub type USART0 = pac::USART1;
/// Reset and clock unit
pub type RCU = pac::RCC;

pub mod adc;
pub mod board;
pub mod delay;
pub mod gpio;
pub mod prelude;
pub mod rcu;
pub mod sampler;
pub mod serial;
pub mod time;

#[cfg(test)]
mod mock;
