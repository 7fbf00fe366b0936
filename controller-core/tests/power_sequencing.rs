//! End-to-end power sequencing scenarios: text command in, admission
//! decision out, handshake driven against a mocked rail and host link.

use core::ops::Add;
use core::time::Duration;

use controller_core::activity::DeepSleepInfo;
use controller_core::clock::MonotonicInstant;
use controller_core::link::{CommandEngine, HidInjector, PowerControl, SystemInfo, SystemOps};
use controller_core::power::{BatteryReading, ChargerReading, PowerSnapshot};
use controller_core::sequencer::{
    AdmissionError, HANDSHAKE_TIMEOUT, HostLink, OffRequest, PowerRail, PowerSequencer,
    SequenceOutcome, SequencerState,
};
use controller_core::status::{DeviceStatus, StatusEvent};

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
}

impl PowerRail for MockRail {
    fn set_energized(&mut self, on: bool) {
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

/// Adapter gluing the dispatcher's fire-and-forget power trait to a real
/// sequencer, the way the firmware's power task does.
struct SequencedPower {
    sequencer: PowerSequencer<MockRail, MockLink, MillisInstant>,
    snapshot: PowerSnapshot,
    now: MillisInstant,
}

impl SequencedPower {
    fn with_percentage(percentage: f32) -> Self {
        let mut battery = BatteryReading::zeroed();
        battery.voltage_v = 3.7;
        battery.percentage = percentage;
        Self {
            sequencer: PowerSequencer::new(MockRail::default(), MockLink::default()),
            snapshot: PowerSnapshot::new(battery, ChargerReading::zeroed(), 0),
            now: MillisInstant(0),
        }
    }
}

impl PowerControl for SequencedPower {
    fn snapshot(&self) -> PowerSnapshot {
        self.snapshot
    }

    fn request_on(&mut self) -> Result<(), AdmissionError> {
        self.sequencer
            .request_on(self.snapshot.battery.percentage, self.now)
    }

    fn request_off(&mut self) -> bool {
        !matches!(self.sequencer.request_off(self.now), OffRequest::Busy)
    }
}

struct NullHid;

impl HidInjector for NullHid {
    fn key_press(&mut self, _: u8) -> bool {
        true
    }
    fn key_hold(&mut self, _: u8) -> bool {
        true
    }
    fn key_release(&mut self, _: u8) -> bool {
        true
    }
    fn type_text(&mut self, _: &str) -> bool {
        true
    }
    fn mouse_move(&mut self, _: i16, _: i16) -> bool {
        true
    }
    fn mouse_press(&mut self, _: u8) -> bool {
        true
    }
    fn mouse_hold(&mut self, _: u8) -> bool {
        true
    }
    fn mouse_release(&mut self, _: u8) -> bool {
        true
    }
    fn mouse_scroll(&mut self, _: i16, _: i16) -> bool {
        true
    }
    fn gamepad_press(&mut self, _: u8) -> bool {
        true
    }
    fn gamepad_hold(&mut self, _: u8) -> bool {
        true
    }
    fn gamepad_release(&mut self, _: u8) -> bool {
        true
    }
    fn gamepad_left_axis(&mut self, _: i16, _: i16) -> bool {
        true
    }
    fn gamepad_right_axis(&mut self, _: i16, _: i16) -> bool {
        true
    }
    fn system_power_key(&mut self) -> bool {
        true
    }
}

struct NullSystem;

impl SystemOps for NullSystem {
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            wifi_mac: [0; 6],
            bt_mac: [0; 6],
            firmware_version: 0x0100,
            uptime_seconds: 0,
        }
    }

    fn deep_sleep_enable(&mut self) {}

    fn deep_sleep_disable(&mut self) {}

    fn deep_sleep_info(&self) -> DeepSleepInfo {
        DeepSleepInfo {
            enabled: true,
            idle_ms: 0,
        }
    }
}

type Harness = CommandEngine<SequencedPower, NullHid, NullSystem>;

fn harness(percentage: f32) -> Harness {
    CommandEngine::new(SequencedPower::with_percentage(percentage), NullHid, NullSystem)
}

#[test]
fn power_on_below_minimum_is_denied_and_rail_stays_low() {
    let mut engine = harness(3.0);

    let dispatch = engine.handle_line("POWER_ON").unwrap();
    assert_eq!(dispatch.reply.as_str(), "0");
    assert_eq!(
        dispatch.status,
        Some(StatusEvent::transient(DeviceStatus::PowerBlocked))
    );

    let power = engine.power_mut();
    assert_eq!(power.sequencer.state(), SequencerState::Off);
    assert!(!power.sequencer.rail().is_energized());
}

#[test]
fn power_on_energizes_rail_and_completes_on_enumeration() {
    let mut engine = harness(82.0);

    let dispatch = engine.handle_line("POWER_ON").unwrap();
    assert_eq!(dispatch.reply.as_str(), "1");

    let power = engine.power_mut();
    assert_eq!(power.sequencer.state(), SequencerState::RequestingOn);
    assert!(power.sequencer.rail().is_energized());

    // Host enumerates the wired interface three seconds later.
    power.sequencer.link_mut().attached = true;
    assert_eq!(
        power.sequencer.poll(MillisInstant(3_000)),
        Some(SequenceOutcome::PoweredOn)
    );
    assert_eq!(power.sequencer.state(), SequencerState::On);
}

#[test]
fn power_on_handshake_timeout_reports_failure_as_off() {
    let mut engine = harness(82.0);
    engine.handle_line("POWER_ON").unwrap();

    let power = engine.power_mut();
    let deadline = MillisInstant(u64::try_from(HANDSHAKE_TIMEOUT.as_millis()).unwrap());
    assert_eq!(power.sequencer.poll(deadline), Some(SequenceOutcome::PowerOnTimedOut));
    assert_eq!(power.sequencer.state(), SequencerState::Off);
    assert!(!power.sequencer.rail().is_energized());
}

#[test]
fn power_off_when_already_off_replies_success_without_handshake() {
    let mut engine = harness(82.0);

    let dispatch = engine.handle_line("POWER_OFF").unwrap();
    assert_eq!(dispatch.reply.as_str(), "1");

    let power = engine.power_mut();
    assert_eq!(power.sequencer.state(), SequencerState::Off);
    assert_eq!(power.sequencer.link().shutdown_requests, 0);
    // Even well past the handshake window nothing ever resolves, because
    // no window was opened.
    assert_eq!(power.sequencer.poll(MillisInstant(120_000)), None);
}

#[test]
fn graceful_shutdown_drops_rail_after_host_deacks() {
    let mut engine = harness(82.0);
    engine.handle_line("POWER_ON").unwrap();
    {
        let power = engine.power_mut();
        power.sequencer.link_mut().attached = true;
        power.sequencer.poll(MillisInstant(1_000)).unwrap();
        power.now = MillisInstant(2_000);
    }

    let dispatch = engine.handle_line("SHUTDOWN").unwrap();
    assert_eq!(dispatch.reply.as_str(), "1");
    assert_eq!(
        dispatch.status,
        Some(StatusEvent::sticky(DeviceStatus::Shutdown))
    );

    let power = engine.power_mut();
    assert_eq!(power.sequencer.state(), SequencerState::RequestingOff);
    assert_eq!(power.sequencer.link().shutdown_requests, 1);

    power.sequencer.link_mut().attached = false;
    assert_eq!(
        power.sequencer.poll(MillisInstant(4_000)),
        Some(SequenceOutcome::PoweredOff { host_acked: true })
    );
    assert!(!power.sequencer.rail().is_energized());
}
