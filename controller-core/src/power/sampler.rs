//! Periodic telemetry sampler over an abstract current-sense bus.
//!
//! The hardware exposes two sense channels (charger input and battery) on a
//! shared low-speed bus; each read yields a bus voltage and a shunt voltage
//! from which current is derived. The sampler converts raw channel pairs
//! into calibrated [`PowerSnapshot`] values. A failed bus transaction only
//! zeroes the affected channel so one bad read never poisons a whole tick.

use super::gauge::BatteryGauge;
use super::{BatteryReading, ChargerReading, MIN_CHARGE_VOLTAGE, PowerSnapshot};
use core::fmt;

/// Shunt resistor value shared by both sense channels, in ohms.
pub const SHUNT_RESISTANCE_OHMS: f32 = 0.1;

/// Manufacturer register value expected from the sense device.
pub const EXPECTED_MANUFACTURER_ID: u16 = 0x5449;

/// Logical sense channels wired on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SenseChannel {
    /// Charger input rail.
    Charger,
    /// Battery pack rail.
    Battery,
}

/// One raw channel measurement.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelReading {
    /// Rail voltage in volts.
    pub bus_v: f32,
    /// Voltage across the shunt resistor in volts.
    pub shunt_v: f32,
}

impl ChannelReading {
    #[must_use]
    pub const fn new(bus_v: f32, shunt_v: f32) -> Self {
        Self { bus_v, shunt_v }
    }
}

/// Bus transaction failures surfaced by a [`SenseBus`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SenseError {
    /// The device did not acknowledge the transaction.
    Nak,
    /// The device returned fewer bytes than the register requires.
    ShortRead,
}

impl fmt::Display for SenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenseError::Nak => f.write_str("no acknowledgement from sense device"),
            SenseError::ShortRead => f.write_str("short read from sense device"),
        }
    }
}

/// Abstraction over the analog sense device on the shared bus.
pub trait SenseBus {
    /// Reads one channel's bus/shunt voltage pair.
    fn read_channel(&mut self, channel: SenseChannel) -> Result<ChannelReading, SenseError>;

    /// Reads the device's manufacturer identification register.
    fn manufacturer_id(&mut self) -> Result<u16, SenseError>;
}

/// Outcome of the initialization-time device check.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceCheck {
    /// Manufacturer register matched [`EXPECTED_MANUFACTURER_ID`].
    Verified,
    /// Device answered with an unexpected identifier; sampling continues
    /// but the caller should log the value.
    Mismatch(u16),
}

/// Converts raw channel readings into published snapshots.
pub struct PowerSampler<B> {
    bus: B,
    gauge: BatteryGauge,
}

impl<B> PowerSampler<B>
where
    B: SenseBus,
{
    /// Creates a sampler over the given bus and gauge.
    pub const fn new(bus: B, gauge: BatteryGauge) -> Self {
        Self { bus, gauge }
    }

    /// Verifies the sense device is present and expected.
    ///
    /// A mismatched identifier is a soft result; an unreachable device is a
    /// hard error the caller must treat as an initialization failure.
    pub fn verify_device(&mut self) -> Result<DeviceCheck, SenseError> {
        let id = self.bus.manufacturer_id()?;
        if id == EXPECTED_MANUFACTURER_ID {
            Ok(DeviceCheck::Verified)
        } else {
            Ok(DeviceCheck::Mismatch(id))
        }
    }

    /// Samples both channels and derives a complete snapshot.
    pub fn sample(&mut self, timestamp_ms: u64) -> PowerSnapshot {
        let battery_raw = self.bus.read_channel(SenseChannel::Battery).ok();
        let charger_raw = self.bus.read_channel(SenseChannel::Charger).ok();

        let mut battery = match battery_raw {
            Some(raw) => {
                let current = raw.shunt_v / SHUNT_RESISTANCE_OHMS;
                BatteryReading {
                    voltage_v: raw.bus_v,
                    current_a: current,
                    power_w: raw.bus_v * current,
                    percentage: self.gauge.percentage(raw.bus_v, current),
                    seconds_to_empty: 0,
                }
            }
            None => BatteryReading::zeroed(),
        };

        let mut charger = match charger_raw {
            Some(raw) => {
                let current = raw.shunt_v / SHUNT_RESISTANCE_OHMS;
                ChargerReading {
                    voltage_v: raw.bus_v,
                    current_a: current,
                    power_w: raw.bus_v * current,
                    connected: raw.bus_v >= MIN_CHARGE_VOLTAGE,
                    seconds_to_full: 0,
                }
            }
            None => ChargerReading::zeroed(),
        };

        battery.seconds_to_empty = self
            .gauge
            .seconds_to_empty(battery.percentage, battery.current_a);
        charger.seconds_to_full = self.gauge.seconds_to_full(
            battery.percentage,
            charger.voltage_v,
            charger.current_a,
            battery.current_a,
        );

        PowerSnapshot::new(battery, charger, timestamp_ms)
    }

    /// Returns a mutable handle to the underlying bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
