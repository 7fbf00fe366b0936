//! SBC power sequencing state machine.
//!
//! The sequencer owns the physical power rail and the wired host link and
//! tracks an explicit four-state machine instead of inferring state from
//! the rail level alone. Power transitions are two-phase: the rail change
//! plus a bounded wait for the host to acknowledge by enumerating (or
//! dropping) the wired link. The rail alone cannot tell us whether the host
//! shut down cleanly, hence the handshake.
//!
//! There is no mid-handshake cancellation: once a transition starts it runs
//! to acknowledgement or deadline. Callers observe progress through
//! [`PowerSequencer::poll`], which the firmware drives from its task loop
//! with a cooperative delay between attempts.

use core::fmt;
use core::time::Duration;

use crate::clock::MonotonicInstant;
use crate::power::MIN_STARTUP_PERCENTAGE;

/// Bounded wait for the host to acknowledge a power transition.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Explicit sequencing states.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencerState {
    /// Rail de-energized, no transition in flight.
    Off,
    /// Rail energized, waiting for the host to enumerate the wired link.
    RequestingOn,
    /// Rail energized and host acknowledged.
    On,
    /// Graceful shutdown requested, waiting for the host to drop the link.
    RequestingOff,
}

impl SequencerState {
    /// Returns `true` while a handshake is in flight.
    #[must_use]
    pub const fn is_transitioning(self) -> bool {
        matches!(
            self,
            SequencerState::RequestingOn | SequencerState::RequestingOff
        )
    }

    /// Returns `true` when the SBC is considered powered.
    #[must_use]
    pub const fn is_powered(self) -> bool {
        !matches!(self, SequencerState::Off)
    }

    /// Compact numeric code for cross-task publication.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            SequencerState::Off => 0,
            SequencerState::RequestingOn => 1,
            SequencerState::On => 2,
            SequencerState::RequestingOff => 3,
        }
    }

    /// Decodes a published state code, defaulting unknown values to `Off`.
    #[must_use]
    pub const fn from_raw(code: u8) -> Self {
        match code {
            1 => SequencerState::RequestingOn,
            2 => SequencerState::On,
            3 => SequencerState::RequestingOff,
            _ => SequencerState::Off,
        }
    }
}

/// Reasons a power-on request is denied at admission.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AdmissionError {
    /// Battery below [`MIN_STARTUP_PERCENTAGE`].
    BatteryLow { percentage: f32 },
    /// The SBC is already powered.
    AlreadyOn,
    /// A transition is already in flight.
    Busy,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::BatteryLow { percentage } => {
                write!(f, "battery at {percentage:.1}% is below startup minimum")
            }
            AdmissionError::AlreadyOn => f.write_str("SBC already powered"),
            AdmissionError::Busy => f.write_str("power transition in flight"),
        }
    }
}

/// Result of an off request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OffRequest {
    /// Graceful shutdown handshake started.
    Started,
    /// The SBC was already off; nothing to do.
    AlreadyOff,
    /// A transition is in flight; the request was not accepted.
    Busy,
}

/// Terminal outcome of a handshake, reported once by [`PowerSequencer::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceOutcome {
    /// Host enumerated the wired link within the window.
    PoweredOn,
    /// Host never acknowledged; the rail was reversed.
    PowerOnTimedOut,
    /// The rail is de-energized; `host_acked` records whether the host
    /// dropped the link before the deadline.
    PoweredOff { host_acked: bool },
}

/// Abstraction over the physical SBC power control line.
pub trait PowerRail {
    /// Drives the control line.
    fn set_energized(&mut self, on: bool);

    /// Reads back the control line level.
    fn is_energized(&self) -> bool;
}

/// Abstraction over the wired host link used for handshaking.
pub trait HostLink {
    /// Returns `true` while the host has the wired interface enumerated.
    fn is_attached(&self) -> bool;

    /// Asks the host to shut down via the system-power key. Returns `false`
    /// when the request could not be queued.
    fn request_shutdown(&mut self) -> bool;
}

/// The power sequencer: owns its collaborators, injected at construction.
pub struct PowerSequencer<R, L, I> {
    rail: R,
    link: L,
    state: SequencerState,
    deadline: Option<I>,
}

impl<R, L, I> PowerSequencer<R, L, I>
where
    R: PowerRail,
    L: HostLink,
    I: MonotonicInstant,
{
    /// Creates a sequencer in the `Off` state with the rail de-energized.
    pub fn new(mut rail: R, link: L) -> Self {
        rail.set_energized(false);
        Self {
            rail,
            link,
            state: SequencerState::Off,
            deadline: None,
        }
    }

    /// Current machine state.
    #[must_use]
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    /// Requests SBC power-on. Admission requires a sufficient battery and an
    /// idle machine; on success the rail is energized and the host handshake
    /// window opens.
    pub fn request_on(&mut self, percentage: f32, now: I) -> Result<(), AdmissionError> {
        match self.state {
            SequencerState::Off => {}
            SequencerState::On => return Err(AdmissionError::AlreadyOn),
            _ => return Err(AdmissionError::Busy),
        }
        if percentage < MIN_STARTUP_PERCENTAGE {
            return Err(AdmissionError::BatteryLow { percentage });
        }

        self.rail.set_energized(true);
        self.state = SequencerState::RequestingOn;
        self.deadline = Some(now + HANDSHAKE_TIMEOUT);
        Ok(())
    }

    /// Requests SBC power-off. Already-off is a bounded fast path that never
    /// opens a handshake window.
    pub fn request_off(&mut self, now: I) -> OffRequest {
        match self.state {
            SequencerState::Off => OffRequest::AlreadyOff,
            SequencerState::On => {
                // Graceful first: let the host see the power key before the
                // rail drops.
                let _ = self.link.request_shutdown();
                self.state = SequencerState::RequestingOff;
                self.deadline = Some(now + HANDSHAKE_TIMEOUT);
                OffRequest::Started
            }
            _ => OffRequest::Busy,
        }
    }

    /// Drops the rail immediately, abandoning any handshake.
    pub fn force_off(&mut self) {
        self.rail.set_energized(false);
        self.state = SequencerState::Off;
        self.deadline = None;
    }

    /// Advances an in-flight handshake. Returns a terminal outcome exactly
    /// once per transition.
    pub fn poll(&mut self, now: I) -> Option<SequenceOutcome> {
        match self.state {
            SequencerState::RequestingOn => {
                if self.link.is_attached() {
                    self.state = SequencerState::On;
                    self.deadline = None;
                    return Some(SequenceOutcome::PoweredOn);
                }
                if self.deadline_passed(now) {
                    self.force_off();
                    return Some(SequenceOutcome::PowerOnTimedOut);
                }
                None
            }
            SequencerState::RequestingOff => {
                if !self.link.is_attached() {
                    self.force_off();
                    return Some(SequenceOutcome::PoweredOff { host_acked: true });
                }
                if self.deadline_passed(now) {
                    // Forced de-energize is the final, non-negotiable step.
                    self.force_off();
                    return Some(SequenceOutcome::PoweredOff { host_acked: false });
                }
                None
            }
            _ => None,
        }
    }

    /// Periodic consistency check: forces the rail off when telemetry says
    /// the SBC must not be powered but the line is observed high. Returns
    /// `true` when a correction was applied.
    pub fn reconcile(&mut self, allowed: bool) -> bool {
        if !allowed && self.rail.is_energized() && self.state != SequencerState::RequestingOff {
            self.force_off();
            return true;
        }
        false
    }

    /// Immutable handle to the rail, mainly for status reads.
    pub fn rail(&self) -> &R {
        &self.rail
    }

    /// Immutable handle to the host link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable handle to the host link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn deadline_passed(&self, now: I) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ops::Add;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    struct MillisInstant(u64);

    impl Add<Duration> for MillisInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self {
            Self(self.0 + u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX))
        }
    }

    impl MonotonicInstant for MillisInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[derive(Default)]
    struct MockRail {
        energized: bool,
        transitions: usize,
    }

    impl PowerRail for MockRail {
        fn set_energized(&mut self, on: bool) {
            if self.energized != on {
                self.transitions += 1;
            }
            self.energized = on;
        }

        fn is_energized(&self) -> bool {
            self.energized
        }
    }

    #[derive(Default)]
    struct MockLink {
        attached: bool,
        shutdown_requests: usize,
    }

    impl HostLink for MockLink {
        fn is_attached(&self) -> bool {
            self.attached
        }

        fn request_shutdown(&mut self) -> bool {
            self.shutdown_requests += 1;
            true
        }
    }

    type TestSequencer = PowerSequencer<MockRail, MockLink, MillisInstant>;

    fn sequencer() -> TestSequencer {
        PowerSequencer::new(MockRail::default(), MockLink::default())
    }

    fn at(millis: u64) -> MillisInstant {
        MillisInstant(millis)
    }

    #[test]
    fn admission_denies_low_battery_and_leaves_rail_low() {
        let mut seq = sequencer();
        let error = seq.request_on(3.0, at(0)).unwrap_err();
        assert_eq!(error, AdmissionError::BatteryLow { percentage: 3.0 });
        assert_eq!(seq.state(), SequencerState::Off);
        assert!(!seq.rail().is_energized());
    }

    #[test]
    fn power_on_completes_when_host_enumerates() {
        let mut seq = sequencer();
        seq.request_on(80.0, at(0)).unwrap();
        assert_eq!(seq.state(), SequencerState::RequestingOn);
        assert!(seq.rail().is_energized());

        assert_eq!(seq.poll(at(500)), None);

        // Host enumerates the wired interface: that is the acknowledgement.
        seq.link.attached = true;
        assert_eq!(seq.poll(at(2_000)), Some(SequenceOutcome::PoweredOn));
        assert_eq!(seq.state(), SequencerState::On);

        // Terminal outcomes report exactly once.
        assert_eq!(seq.poll(at(2_100)), None);
    }

    #[test]
    fn power_on_timeout_reverses_rail() {
        let mut seq = sequencer();
        seq.request_on(50.0, at(0)).unwrap();

        let deadline = u64::try_from(HANDSHAKE_TIMEOUT.as_millis()).unwrap();
        assert_eq!(seq.poll(at(deadline - 1)), None);
        assert_eq!(
            seq.poll(at(deadline)),
            Some(SequenceOutcome::PowerOnTimedOut)
        );
        assert_eq!(seq.state(), SequencerState::Off);
        assert!(!seq.rail().is_energized());
    }

    #[test]
    fn graceful_off_sends_power_key_then_waits_for_deack() {
        let mut seq = sequencer();
        seq.request_on(50.0, at(0)).unwrap();
        seq.link.attached = true;
        seq.poll(at(100)).unwrap();

        assert_eq!(seq.request_off(at(200)), OffRequest::Started);
        assert_eq!(seq.link().shutdown_requests, 1);
        assert_eq!(seq.state(), SequencerState::RequestingOff);
        // Rail stays up until the host acknowledges or the window closes.
        assert!(seq.rail().is_energized());

        seq.link.attached = false;
        assert_eq!(
            seq.poll(at(400)),
            Some(SequenceOutcome::PoweredOff { host_acked: true })
        );
        assert!(!seq.rail().is_energized());
        assert_eq!(seq.state(), SequencerState::Off);
    }

    #[test]
    fn off_timeout_still_forces_rail_down() {
        let mut seq = sequencer();
        seq.request_on(50.0, at(0)).unwrap();
        seq.link.attached = true;
        seq.poll(at(100)).unwrap();
        seq.request_off(at(200));

        let deadline = 200 + u64::try_from(HANDSHAKE_TIMEOUT.as_millis()).unwrap();
        assert_eq!(seq.poll(at(deadline - 1)), None);
        assert_eq!(
            seq.poll(at(deadline)),
            Some(SequenceOutcome::PoweredOff { host_acked: false })
        );
        assert!(!seq.rail().is_energized());
    }

    #[test]
    fn off_when_already_off_is_a_fast_path() {
        let mut seq = sequencer();
        assert_eq!(seq.request_off(at(0)), OffRequest::AlreadyOff);
        assert_eq!(seq.state(), SequencerState::Off);
        assert_eq!(seq.link().shutdown_requests, 0);
        // No handshake window was opened.
        assert_eq!(seq.poll(at(60_000)), None);
    }

    #[test]
    fn requests_during_transition_are_rejected() {
        let mut seq = sequencer();
        seq.request_on(50.0, at(0)).unwrap();
        assert_eq!(seq.request_on(50.0, at(1)).unwrap_err(), AdmissionError::Busy);
        assert_eq!(seq.request_off(at(1)), OffRequest::Busy);
    }

    #[test]
    fn reconcile_forces_disallowed_rail_off() {
        let mut seq = sequencer();
        seq.request_on(50.0, at(0)).unwrap();
        seq.link.attached = true;
        seq.poll(at(100)).unwrap();
        assert!(seq.rail().is_energized());

        assert!(!seq.reconcile(true));
        assert!(seq.reconcile(false));
        assert_eq!(seq.state(), SequencerState::Off);
        assert!(!seq.rail().is_energized());
    }

    #[test]
    fn state_codes_round_trip() {
        for state in [
            SequencerState::Off,
            SequencerState::RequestingOn,
            SequencerState::On,
            SequencerState::RequestingOff,
        ] {
            assert_eq!(SequencerState::from_raw(state.to_raw()), state);
        }
        assert_eq!(SequencerState::from_raw(0xFF), SequencerState::Off);
    }
}
