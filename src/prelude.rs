pub use crate::time::U32Ext as _gd32_time_U32Ext;
pub use embedded_hal::delay::DelayNs as _embedded_hal_delay_DelayNs;
pub use fugit::ExtU32 as _fugit_ExtU32;
pub use fugit::RateExtU32 as _fugit_RateExtU32;
