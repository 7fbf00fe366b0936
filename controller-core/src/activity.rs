//! Activity tracking and deep-sleep watchdog.
//!
//! Every inbound command, button edge, and explicit wake notification
//! refreshes the last-activity timestamp. A periodic check evaluates the
//! blocking conditions and, once the device has been idle past the watchdog
//! timeout with nothing blocking, latches a sleep request. The latch is
//! consumed at the caller's next safe point rather than acted on inside the
//! check itself.
//!
//! Blocked time counts as activity: a device that spends an hour powered
//! must not fall asleep the instant the SBC shuts down.

use core::time::Duration;

use crate::clock::MonotonicInstant;

/// Idle time after which a sleep request latches.
pub const SLEEP_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the watchdog evaluation runs; far below the timeout.
pub const ACTIVITY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Conditions that forbid entering deep sleep.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Blockers {
    /// The SBC rail is energized (or a transition is in flight).
    pub sbc_powered: bool,
    /// A host session is live on either transport.
    pub session_active: bool,
    /// The charger is present; its detect line is also a wake source.
    pub charger_connected: bool,
}

impl Blockers {
    /// No blocking condition holds.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            sbc_powered: false,
            session_active: false,
            charger_connected: false,
        }
    }

    /// Returns `true` when any condition blocks sleep.
    #[must_use]
    pub const fn any(self) -> bool {
        self.sbc_powered || self.session_active || self.charger_connected
    }
}

/// Result of one watchdog evaluation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SleepVerdict {
    /// The watchdog is administratively disabled.
    Disabled,
    /// A blocking condition held; the idle timer was reset.
    Blocked,
    /// Unblocked but not yet idle long enough.
    Idle { remaining: Duration },
    /// The timeout elapsed; a sleep request is now latched.
    SleepRequested,
}

/// Snapshot reported by the `DEEP_SLEEP_INFO` command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeepSleepInfo {
    pub enabled: bool,
    /// Milliseconds since the last recorded activity.
    pub idle_ms: u64,
}

/// Tracks activity and latches sleep requests.
pub struct ActivityMonitor<I> {
    last_activity: I,
    enabled: bool,
    sleep_latched: bool,
    timeout: Duration,
}

impl<I> ActivityMonitor<I>
where
    I: MonotonicInstant,
{
    /// Creates an enabled monitor with the default watchdog timeout.
    pub fn new(now: I) -> Self {
        Self::with_timeout(now, SLEEP_WATCHDOG_TIMEOUT)
    }

    /// Creates an enabled monitor with an explicit timeout.
    pub fn with_timeout(now: I, timeout: Duration) -> Self {
        Self {
            last_activity: now,
            enabled: true,
            sleep_latched: false,
            timeout,
        }
    }

    /// Records activity, resetting the idle timer.
    pub fn notify_activity(&mut self, now: I) {
        self.last_activity = now;
    }

    /// Enables the watchdog. The timer restarts from `now` so enabling an
    /// idle device does not trip the watchdog immediately.
    pub fn enable(&mut self, now: I) {
        self.enabled = true;
        self.last_activity = now;
    }

    /// Disables the watchdog and discards any latched request.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.sleep_latched = false;
    }

    /// Returns `true` while the watchdog is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs one watchdog evaluation.
    pub fn evaluate(&mut self, blockers: Blockers, now: I) -> SleepVerdict {
        if !self.enabled {
            return SleepVerdict::Disabled;
        }
        if blockers.any() {
            self.last_activity = now;
            return SleepVerdict::Blocked;
        }

        let idle = now.saturating_duration_since(self.last_activity);
        if idle >= self.timeout {
            self.sleep_latched = true;
            SleepVerdict::SleepRequested
        } else {
            SleepVerdict::Idle {
                remaining: self.timeout - idle,
            }
        }
    }

    /// Consumes a latched sleep request, if any.
    pub fn take_sleep_request(&mut self) -> bool {
        core::mem::take(&mut self.sleep_latched)
    }

    /// Builds the `DEEP_SLEEP_INFO` report.
    pub fn info(&self, now: I) -> DeepSleepInfo {
        let idle = now.saturating_duration_since(self.last_activity);
        DeepSleepInfo {
            enabled: self.enabled,
            idle_ms: u64::try_from(idle.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
