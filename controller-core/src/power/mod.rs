//! Battery and charger telemetry data model.
//!
//! The sampler publishes one [`PowerSnapshot`] per tick; every other
//! subsystem reads the latest snapshot and never mutates it. Snapshots are
//! plain `Copy` values so a zeroed default can stand in whenever the shared
//! slot cannot be read, which keeps reader loops from ever stalling on the
//! telemetry engine.

pub mod chemistry;
pub mod gauge;
pub mod sampler;

pub use chemistry::{ChemistryProfile, LI_ION, LIPO};
pub use gauge::BatteryGauge;
pub use sampler::{ChannelReading, DeviceCheck, PowerSampler, SenseBus, SenseChannel, SenseError};

/// Total pack capacity the gauge projects against, in mAh.
pub const BATTERY_CAPACITY_MAH: f32 = 4500.0;

/// Minimum charger bus voltage treated as "charger present". The detect is
/// derived from the measured voltage, not a digital input.
pub const MIN_CHARGE_VOLTAGE: f32 = 4.0;

/// Battery percentage at or below which power-saving mode engages while the
/// charger is absent.
pub const SAVING_MODE_PERCENTAGE: f32 = 15.0;

/// Minimum battery percentage required to admit an SBC power-on request.
pub const MIN_STARTUP_PERCENTAGE: f32 = 5.0;

/// Calibrated battery-channel reading for a single sampling tick.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct BatteryReading {
    /// Battery terminal voltage in volts.
    pub voltage_v: f32,
    /// Battery current in amperes; positive means net inflow to the pack.
    pub current_a: f32,
    /// Instantaneous battery power in watts.
    pub power_w: f32,
    /// Estimated state of charge, 0-100.
    pub percentage: f32,
    /// Projected seconds until empty; zero means "not applicable".
    pub seconds_to_empty: u32,
}

impl BatteryReading {
    /// Neutral reading used when the sense channel cannot be read.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            voltage_v: 0.0,
            current_a: 0.0,
            power_w: 0.0,
            percentage: 0.0,
            seconds_to_empty: 0,
        }
    }
}

/// Calibrated charger-channel reading for a single sampling tick.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct ChargerReading {
    /// Charger input voltage in volts.
    pub voltage_v: f32,
    /// Charger input current in amperes.
    pub current_a: f32,
    /// Charger input power in watts.
    pub power_w: f32,
    /// Whether the measured voltage clears [`MIN_CHARGE_VOLTAGE`].
    pub connected: bool,
    /// Projected seconds until full; zero means "not applicable".
    pub seconds_to_full: u32,
}

impl ChargerReading {
    /// Neutral reading used when the sense channel cannot be read.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            voltage_v: 0.0,
            current_a: 0.0,
            power_w: 0.0,
            connected: false,
            seconds_to_full: 0,
        }
    }
}

/// The single shared telemetry value: both channel readings plus derived
/// mode flags, stamped with the sampling time.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct PowerSnapshot {
    pub battery: BatteryReading,
    pub charger: ChargerReading,
    pub timestamp_ms: u64,
    /// True iff the charger is absent and the battery percentage is at or
    /// below [`SAVING_MODE_PERCENTAGE`].
    pub power_saving: bool,
}

impl PowerSnapshot {
    /// Assembles a snapshot, deriving the power-saving flag from its inputs.
    #[must_use]
    pub fn new(battery: BatteryReading, charger: ChargerReading, timestamp_ms: u64) -> Self {
        let power_saving = !charger.connected && battery.percentage <= SAVING_MODE_PERCENTAGE;
        Self {
            battery,
            charger,
            timestamp_ms,
            power_saving,
        }
    }

    /// Snapshot with every measurement zeroed; safe default for readers that
    /// cannot obtain the shared slot.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            battery: BatteryReading::zeroed(),
            charger: ChargerReading::zeroed(),
            timestamp_ms: 0,
            power_saving: false,
        }
    }
}
