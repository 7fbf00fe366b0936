//! Device status derivation.
//!
//! The tracker turns connection, charging, and power-mode observations into
//! edge-triggered status events and maintains the currently displayed
//! status, including transient statuses that decay back to the steady state
//! after a fixed hold. Rendering (LED patterns, brightness) happens outside
//! this crate; only the state derivation lives here.

use core::time::Duration;

use heapless::Vec;

use crate::clock::MonotonicInstant;

/// How long a transient status is displayed before decaying.
pub const STATUS_HOLD: Duration = Duration::from_millis(3_000);

/// Statuses surfaced to the external indicator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceStatus {
    Idle,
    RadioConnected,
    RadioDisconnected,
    HidConnected,
    HidDisconnected,
    PowerOn,
    PowerOff,
    /// A power-on request was denied at admission.
    PowerBlocked,
    Charging,
    LowPower,
    CommandError,
    Shutdown,
}

impl DeviceStatus {
    /// Compact numeric code for cross-task publication.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            DeviceStatus::Idle => 0,
            DeviceStatus::RadioConnected => 1,
            DeviceStatus::RadioDisconnected => 2,
            DeviceStatus::HidConnected => 3,
            DeviceStatus::HidDisconnected => 4,
            DeviceStatus::PowerOn => 5,
            DeviceStatus::PowerOff => 6,
            DeviceStatus::PowerBlocked => 7,
            DeviceStatus::Charging => 8,
            DeviceStatus::LowPower => 9,
            DeviceStatus::CommandError => 10,
            DeviceStatus::Shutdown => 11,
        }
    }

    /// Decodes a published status code, defaulting unknown values to `Idle`.
    #[must_use]
    pub const fn from_raw(code: u8) -> Self {
        match code {
            1 => DeviceStatus::RadioConnected,
            2 => DeviceStatus::RadioDisconnected,
            3 => DeviceStatus::HidConnected,
            4 => DeviceStatus::HidDisconnected,
            5 => DeviceStatus::PowerOn,
            6 => DeviceStatus::PowerOff,
            7 => DeviceStatus::PowerBlocked,
            8 => DeviceStatus::Charging,
            9 => DeviceStatus::LowPower,
            10 => DeviceStatus::CommandError,
            11 => DeviceStatus::Shutdown,
            _ => DeviceStatus::Idle,
        }
    }

    /// Transient statuses decay back to the steady state after
    /// [`STATUS_HOLD`]; the rest stick until superseded.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            DeviceStatus::RadioConnected
                | DeviceStatus::RadioDisconnected
                | DeviceStatus::HidConnected
                | DeviceStatus::HidDisconnected
                | DeviceStatus::PowerOn
                | DeviceStatus::PowerOff
                | DeviceStatus::PowerBlocked
                | DeviceStatus::CommandError
        )
    }
}

/// A status change plus its optional display hold.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusEvent {
    pub status: DeviceStatus,
    pub hold: Option<Duration>,
}

impl StatusEvent {
    /// Event with the standard transient hold.
    #[must_use]
    pub const fn transient(status: DeviceStatus) -> Self {
        Self {
            status,
            hold: Some(STATUS_HOLD),
        }
    }

    /// Event that sticks until superseded.
    #[must_use]
    pub const fn sticky(status: DeviceStatus) -> Self {
        Self { status, hold: None }
    }
}

/// Observed inputs the steady state is derived from.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectionSnapshot {
    pub radio_connected: bool,
    pub hid_connected: bool,
    pub charging: bool,
    pub low_power: bool,
}

/// Maximum events produced by one observation.
const MAX_EVENTS: usize = 4;

/// Derives status transitions from connection-state edges.
pub struct StatusTracker<I> {
    previous: Option<ConnectionSnapshot>,
    steady: DeviceStatus,
    transient: Option<(DeviceStatus, I)>,
}

impl<I> StatusTracker<I>
where
    I: MonotonicInstant,
{
    /// Creates a tracker with no prior observations.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: None,
            steady: DeviceStatus::Idle,
            transient: None,
        }
    }

    /// Feeds one observation and returns the edge events it produced.
    pub fn observe(&mut self, snapshot: ConnectionSnapshot, now: I) -> Vec<StatusEvent, MAX_EVENTS> {
        let mut events: Vec<StatusEvent, MAX_EVENTS> = Vec::new();
        let previous = self.previous.unwrap_or_default();

        if self.previous.is_some() {
            if snapshot.radio_connected != previous.radio_connected {
                let status = if snapshot.radio_connected {
                    DeviceStatus::RadioConnected
                } else {
                    DeviceStatus::RadioDisconnected
                };
                let _ = events.push(StatusEvent::transient(status));
            }
            if snapshot.hid_connected != previous.hid_connected {
                let status = if snapshot.hid_connected {
                    DeviceStatus::HidConnected
                } else {
                    DeviceStatus::HidDisconnected
                };
                let _ = events.push(StatusEvent::transient(status));
            }
        }

        self.steady = if snapshot.charging {
            DeviceStatus::Charging
        } else if snapshot.low_power {
            DeviceStatus::LowPower
        } else {
            DeviceStatus::Idle
        };
        self.previous = Some(snapshot);

        for event in &events {
            self.apply(*event, now);
        }
        events
    }

    /// Applies an externally produced event (command errors, power
    /// transitions) to the display state.
    pub fn apply(&mut self, event: StatusEvent, now: I) {
        if event.status.is_transient() {
            let hold = event.hold.unwrap_or(STATUS_HOLD);
            self.transient = Some((event.status, now + hold));
        } else {
            self.steady = event.status;
            self.transient = None;
        }
    }

    /// Returns the status to display, expiring any stale transient.
    pub fn current(&mut self, now: I) -> DeviceStatus {
        if let Some((status, expires)) = self.transient {
            if now < expires {
                return status;
            }
            self.transient = None;
        }
        self.steady
    }
}

impl<I> Default for StatusTracker<I>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
