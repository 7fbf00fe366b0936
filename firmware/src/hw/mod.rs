#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Hardware bindings for the controller board.
//!
//! Pin plan (STM32G0B1KE):
//! - PA0  power button, active low, wake source
//! - PA1  charger input detect, active low, wake source
//! - PA4  SBC power rail MOSFET
//! - PA8  radio module connection state line
//! - PA2/PA3  USART2 to the radio module
//! - PB6/PB7  I2C1 to the INA3221 power monitor
//! - PA11/PA12  USB to the SBC

pub mod button;
#[cfg(target_os = "none")]
pub mod ina3221;
#[cfg(target_os = "none")]
pub mod rail;
#[cfg(target_os = "none")]
pub mod sleep;

use core::ops::Add;
use core::time::Duration;

use controller_core::clock::MonotonicInstant;

/// Embassy-backed monotonic instant satisfying the core clock trait.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(embassy_time::Instant);

impl FirmwareInstant {
    /// Captures the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(embassy_time::Instant::now())
    }

    /// Microseconds since boot.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0.as_micros()
    }

    /// Milliseconds since boot.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0.as_millis()
    }
}

impl From<embassy_time::Instant> for FirmwareInstant {
    fn from(instant: embassy_time::Instant) -> Self {
        Self(instant)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0 + embassy_time::Duration::from_micros(micros))
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.as_micros().saturating_sub(earlier.0.as_micros()))
    }
}
