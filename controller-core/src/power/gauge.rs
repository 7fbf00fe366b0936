//! State-of-charge and time-remaining projections.
//!
//! The gauge wraps a [`ChemistryProfile`] with the two corrections the raw
//! curve cannot provide: voltage-sag compensation under heavy discharge, and
//! linear time-to-empty/time-to-full projections from the effective current.
//! A zero result from either projection means "not applicable" rather than
//! "imminent".

use super::chemistry::ChemistryProfile;
use super::{BATTERY_CAPACITY_MAH, MIN_CHARGE_VOLTAGE};

/// Discharge current (A) below which sag compensation engages.
pub const HEAVY_DISCHARGE_AMPS: f32 = -0.5;

/// Current magnitude (A) below which rate projections are meaningless.
const NEGLIGIBLE_AMPS: f32 = 0.01;

/// Percentage at or below which a discharge projection is suppressed.
const EMPTY_FLOOR: f32 = 1.0;

/// Percentage at or above which a charge projection is suppressed.
const FULL_CEILING: f32 = 99.5;

const SECONDS_PER_HOUR: f32 = 3_600.0;

/// Battery gauge bound to one chemistry profile.
#[derive(Copy, Clone, Debug)]
pub struct BatteryGauge {
    profile: &'static ChemistryProfile,
}

impl BatteryGauge {
    /// Creates a gauge for the given chemistry.
    #[must_use]
    pub const fn new(profile: &'static ChemistryProfile) -> Self {
        Self { profile }
    }

    /// Returns the chemistry profile backing this gauge.
    #[must_use]
    pub const fn profile(&self) -> &'static ChemistryProfile {
        self.profile
    }

    /// Estimates state of charge from terminal voltage and pack current.
    ///
    /// Under heavy discharge the terminal voltage sags below the open-circuit
    /// value; the estimate is corrected by re-reading the curve at the
    /// voltage adjusted for the resistive drop and applying the delta.
    #[must_use]
    pub fn percentage(&self, voltage: f32, current: f32) -> f32 {
        let base = self.profile.percentage_at(voltage);

        let mut compensation = 0.0;
        if current < HEAVY_DISCHARGE_AMPS {
            let sag = -current * self.profile.internal_resistance;
            let compensated = self.profile.percentage_at(voltage + sag);
            compensation = compensated - base;
        }

        (base + compensation).clamp(0.0, 100.0)
    }

    /// Projects seconds until the pack is empty at the present discharge
    /// rate. Zero when the pack is not discharging or already at the floor.
    #[must_use]
    pub fn seconds_to_empty(&self, percentage: f32, battery_current: f32) -> u32 {
        if percentage <= EMPTY_FLOOR || battery_current >= -NEGLIGIBLE_AMPS {
            return 0;
        }

        let rate = percent_per_hour(-battery_current);
        seconds_at_rate(percentage, rate)
    }

    /// Projects seconds until the pack is full at the present charge rate.
    ///
    /// When the load draws more than the charger supplies, the effective
    /// rate uses the net current (charger plus negative battery current);
    /// a non-positive net yields "not applicable".
    #[must_use]
    pub fn seconds_to_full(
        &self,
        percentage: f32,
        charger_voltage: f32,
        charger_current: f32,
        battery_current: f32,
    ) -> u32 {
        if charger_voltage < MIN_CHARGE_VOLTAGE || percentage >= FULL_CEILING {
            return 0;
        }

        let effective = if battery_current < 0.0 {
            charger_current + battery_current
        } else {
            charger_current
        };
        if effective <= NEGLIGIBLE_AMPS {
            return 0;
        }

        let rate = percent_per_hour(effective);
        seconds_at_rate(100.0 - percentage, rate)
    }
}

/// Converts a positive current into a percent-per-hour rate for the pack.
fn percent_per_hour(amps: f32) -> f32 {
    amps * 1_000.0 / BATTERY_CAPACITY_MAH * 100.0
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_at_rate(percent_remaining: f32, rate: f32) -> u32 {
    if rate <= 0.0 {
        return 0;
    }
    let seconds = percent_remaining / rate * SECONDS_PER_HOUR;
    if seconds <= 0.0 {
        0
    } else if seconds >= u32::MAX as f32 {
        u32::MAX
    } else {
        seconds as u32
    }
}
