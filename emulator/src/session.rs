//! Emulated deck session: the core engines wired to a simulated battery,
//! rail, and host link so the text protocol can be exercised on a
//! workstation.

use std::ops::Add;
use std::time::Duration;

use controller_core::activity::{ActivityMonitor, Blockers, DeepSleepInfo, SleepVerdict};
use controller_core::clock::MonotonicInstant;
use controller_core::link::chunker::Chunks;
use controller_core::link::{
    CommandEngine, EngineAction, HidInjector, PowerControl, SystemInfo, SystemOps,
};
use controller_core::power::{
    BatteryGauge, BatteryReading, ChargerReading, LIPO, MIN_CHARGE_VOLTAGE, PowerSnapshot,
};
use controller_core::sequencer::{
    AdmissionError, HostLink, PowerRail, PowerSequencer, SequenceOutcome,
};
use controller_core::vendor::FIRMWARE_VERSION;

/// Simulated milliseconds-since-boot instant.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(pub u64);

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX))
    }
}

impl MonotonicInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// How long the simulated host takes to enumerate after the rail rises.
const HOST_BOOT_MS: u64 = 2_000;

/// How long the simulated host takes to shut down after the power key.
const HOST_SHUTDOWN_MS: u64 = 1_500;

/// Simulated MTU negotiated on the radio link.
pub const SIM_LINK_MTU: usize = 185;

#[derive(Default)]
struct SimRail {
    energized: bool,
}

impl PowerRail for SimRail {
    fn set_energized(&mut self, on: bool) {
        self.energized = on;
    }

    fn is_energized(&self) -> bool {
        self.energized
    }
}

#[derive(Default)]
struct SimLink {
    attached: bool,
    boot_pending_since: Option<u64>,
    shutdown_pending_since: Option<u64>,
}

impl HostLink for SimLink {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn request_shutdown(&mut self) -> bool {
        true
    }
}

/// Very small battery model: a LiPo cell under a load that depends on the
/// SBC rail, with an optional bench charger.
struct SimBattery {
    voltage: f32,
    charger_connected: bool,
}

impl SimBattery {
    fn new() -> Self {
        Self {
            voltage: 3.82,
            charger_connected: false,
        }
    }

    fn load_amps(&self, sbc_on: bool) -> f32 {
        if sbc_on { 0.9 } else { 0.05 }
    }

    fn battery_current(&self, sbc_on: bool) -> f32 {
        let load = self.load_amps(sbc_on);
        if self.charger_connected {
            0.8 - load
        } else {
            -load
        }
    }

    fn charger_reading(&self) -> ChargerReading {
        if self.charger_connected {
            ChargerReading {
                voltage_v: 5.05,
                current_a: 1.0,
                power_w: 5.05,
                connected: true,
                seconds_to_full: 0,
            }
        } else {
            ChargerReading::zeroed()
        }
    }

    fn advance(&mut self, elapsed_ms: u64, sbc_on: bool) {
        // Roughly one full curve traversal per simulated hour at 1 A.
        #[allow(clippy::cast_precision_loss)]
        let hours = elapsed_ms as f32 / 3_600_000.0;
        self.voltage += self.battery_current(sbc_on) * hours * 1.2;
        self.voltage = self.voltage.clamp(2.9, 4.2);
    }
}

/// Power collaborator backed by the simulation.
struct SimPower {
    sequencer: PowerSequencer<SimRail, SimLink, SimInstant>,
    battery: SimBattery,
    gauge: BatteryGauge,
    now: SimInstant,
}

impl SimPower {
    fn new() -> Self {
        Self {
            sequencer: PowerSequencer::new(SimRail::default(), SimLink::default()),
            battery: SimBattery::new(),
            gauge: BatteryGauge::new(&LIPO),
            now: SimInstant(0),
        }
    }

    fn build_snapshot(&self) -> PowerSnapshot {
        let sbc_on = self.sequencer.rail().is_energized();
        let current = self.battery.battery_current(sbc_on);
        let voltage = self.battery.voltage;
        let percentage = self.gauge.percentage(voltage, current);
        let charger = self.battery.charger_reading();

        let battery = BatteryReading {
            voltage_v: voltage,
            current_a: current,
            power_w: voltage * current,
            percentage,
            seconds_to_empty: self.gauge.seconds_to_empty(percentage, current),
        };
        let mut charger = charger;
        charger.connected = charger.voltage_v >= MIN_CHARGE_VOLTAGE;
        charger.seconds_to_full = self.gauge.seconds_to_full(
            percentage,
            charger.voltage_v,
            charger.current_a,
            current,
        );

        PowerSnapshot::new(battery, charger, self.now.0)
    }
}

impl PowerControl for SimPower {
    fn snapshot(&self) -> PowerSnapshot {
        self.build_snapshot()
    }

    fn request_on(&mut self) -> Result<(), AdmissionError> {
        let percentage = self.build_snapshot().battery.percentage;
        let now = self.now;
        self.sequencer.request_on(percentage, now)?;
        self.sequencer.link_mut().boot_pending_since = Some(now.0);
        Ok(())
    }

    fn request_off(&mut self) -> bool {
        let accepted = !matches!(
            self.sequencer.request_off(self.now),
            controller_core::sequencer::OffRequest::Busy
        );
        if accepted {
            self.sequencer.link_mut().shutdown_pending_since = Some(self.now.0);
        }
        accepted
    }
}

/// HID collaborator that narrates injections instead of sending them.
#[derive(Default)]
struct SimHid {
    log: Vec<String>,
}

impl SimHid {
    fn note(&mut self, line: String) -> bool {
        self.log.push(line);
        true
    }
}

impl HidInjector for SimHid {
    fn key_press(&mut self, key: u8) -> bool {
        self.note(format!("hid: key press {key}"))
    }
    fn key_hold(&mut self, key: u8) -> bool {
        self.note(format!("hid: key hold {key}"))
    }
    fn key_release(&mut self, key: u8) -> bool {
        self.note(format!("hid: key release {key}"))
    }
    fn type_text(&mut self, text: &str) -> bool {
        self.note(format!("hid: type {text:?}"))
    }
    fn mouse_move(&mut self, dx: i16, dy: i16) -> bool {
        self.note(format!("hid: mouse move ({dx}, {dy})"))
    }
    fn mouse_press(&mut self, buttons: u8) -> bool {
        self.note(format!("hid: mouse press {buttons:#04x}"))
    }
    fn mouse_hold(&mut self, buttons: u8) -> bool {
        self.note(format!("hid: mouse hold {buttons:#04x}"))
    }
    fn mouse_release(&mut self, buttons: u8) -> bool {
        self.note(format!("hid: mouse release {buttons:#04x}"))
    }
    fn mouse_scroll(&mut self, dx: i16, dy: i16) -> bool {
        self.note(format!("hid: mouse scroll ({dx}, {dy})"))
    }
    fn gamepad_press(&mut self, button: u8) -> bool {
        self.note(format!("hid: gamepad press {button}"))
    }
    fn gamepad_hold(&mut self, button: u8) -> bool {
        self.note(format!("hid: gamepad hold {button}"))
    }
    fn gamepad_release(&mut self, button: u8) -> bool {
        self.note(format!("hid: gamepad release {button}"))
    }
    fn gamepad_left_axis(&mut self, x: i16, y: i16) -> bool {
        self.note(format!("hid: left stick ({x}, {y})"))
    }
    fn gamepad_right_axis(&mut self, x: i16, y: i16) -> bool {
        self.note(format!("hid: right stick ({x}, {y})"))
    }
    fn system_power_key(&mut self) -> bool {
        self.note("hid: system power key".to_string())
    }
}

/// System collaborator over a simulated clock.
struct SimSystem {
    monitor: ActivityMonitor<SimInstant>,
    now: SimInstant,
}

impl SystemOps for SimSystem {
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            wifi_mac: [0x84, 0xF7, 0x03, 0x10, 0x20, 0x30],
            bt_mac: [0x84, 0xF7, 0x03, 0x10, 0x20, 0x31],
            firmware_version: FIRMWARE_VERSION,
            uptime_seconds: u32::try_from(self.now.0 / 1_000).unwrap_or(u32::MAX),
        }
    }

    fn deep_sleep_enable(&mut self) {
        self.monitor.enable(self.now);
    }

    fn deep_sleep_disable(&mut self) {
        self.monitor.disable();
    }

    fn deep_sleep_info(&self) -> DeepSleepInfo {
        self.monitor.info(self.now)
    }
}

/// One emulated controller plus its protocol session.
pub struct DeckSession {
    engine: CommandEngine<SimPower, SimHid, SimSystem>,
    now_ms: u64,
    slept: bool,
}

impl DeckSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: CommandEngine::new(
                SimPower::new(),
                SimHid::default(),
                SimSystem {
                    monitor: ActivityMonitor::new(SimInstant(0)),
                    now: SimInstant(0),
                },
            ),
            now_ms: 0,
            slept: false,
        }
    }

    /// Current simulated time in milliseconds.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Returns `true` once the idle watchdog has put the deck to sleep.
    #[must_use]
    pub const fn is_asleep(&self) -> bool {
        self.slept
    }

    /// Toggles the simulated bench charger.
    pub fn set_charger(&mut self, connected: bool) {
        self.engine.power_mut().battery.charger_connected = connected;
    }

    /// Feeds one protocol line; returns the transcript (reply chunks, HID
    /// narration, status changes).
    pub fn handle_line(&mut self, line: &str) -> Vec<String> {
        let mut transcript = Vec::new();
        if self.slept {
            transcript.push("deck is asleep; tick with the charger or reset".to_string());
            return transcript;
        }

        let now = SimInstant(self.now_ms);
        self.engine.power_mut().now = now;

        let Some(dispatch) = self.engine.handle_line(line) else {
            return transcript;
        };

        // Inbound traffic counts as activity.
        // (The dispatcher itself is transport-agnostic.)
        self.with_monitor(|monitor, now| monitor.notify_activity(now));

        let chunks: Vec<&[u8]> = Chunks::new(dispatch.reply.as_bytes(), SIM_LINK_MTU).collect();
        let total = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let text = String::from_utf8_lossy(chunk).into_owned();
            if total > 1 {
                transcript.push(format!("<< [chunk {}/{total}] {text}", index + 1));
            } else {
                transcript.push(format!("<< {text}"));
            }
        }

        if let Some(event) = dispatch.status {
            transcript.push(format!("status: {:?}", event.status));
        }
        if dispatch.action == Some(EngineAction::Restart) {
            transcript.push("controller restart requested".to_string());
        }

        let hid_lines: Vec<String> = self.engine.hid_mut().log.drain(..).collect();
        transcript.extend(hid_lines);

        transcript
    }

    /// Advances simulated time, running the battery model, the sequencer
    /// handshake, and the sleep watchdog.
    pub fn tick(&mut self, elapsed_ms: u64) -> Vec<String> {
        let mut transcript = Vec::new();
        if self.slept {
            return transcript;
        }

        self.now_ms += elapsed_ms;
        let now = SimInstant(self.now_ms);

        {
            let power = self.engine.power_mut();
            power.now = now;
            let sbc_on = power.sequencer.rail().is_energized();
            power.battery.advance(elapsed_ms, sbc_on);

            // Host behavior: enumerate a while after the rail rises, drop
            // off a while after the power key.
            let link = power.sequencer.link_mut();
            if let Some(since) = link.boot_pending_since {
                if self.now_ms.saturating_sub(since) >= HOST_BOOT_MS {
                    link.attached = true;
                    link.boot_pending_since = None;
                }
            }
            if let Some(since) = link.shutdown_pending_since {
                if self.now_ms.saturating_sub(since) >= HOST_SHUTDOWN_MS {
                    link.attached = false;
                    link.shutdown_pending_since = None;
                }
            }

            if let Some(outcome) = power.sequencer.poll(now) {
                transcript.push(match outcome {
                    SequenceOutcome::PoweredOn => "power: host acknowledged, SBC on".to_string(),
                    SequenceOutcome::PowerOnTimedOut => {
                        "power: handshake timed out, SBC off".to_string()
                    }
                    SequenceOutcome::PoweredOff { host_acked: true } => {
                        "power: host shut down, rail off".to_string()
                    }
                    SequenceOutcome::PoweredOff { host_acked: false } => {
                        "power: shutdown timed out, rail forced off".to_string()
                    }
                });
            }
        }

        let snapshot = self.engine.power_mut().build_snapshot();
        let blockers = Blockers {
            sbc_powered: self
                .engine
                .power_mut()
                .sequencer
                .state()
                .is_powered(),
            session_active: false,
            charger_connected: snapshot.charger.connected,
        };
        let verdict = self.with_monitor(|monitor, now| monitor.evaluate(blockers, now));
        if verdict == SleepVerdict::SleepRequested
            && self.with_monitor(|monitor, _| monitor.take_sleep_request())
        {
            self.slept = true;
            transcript.push("sleep: idle watchdog expired, deck suspended".to_string());
        }

        transcript
    }

    fn with_monitor<R>(&mut self, f: impl FnOnce(&mut ActivityMonitor<SimInstant>, SimInstant) -> R) -> R {
        let now = SimInstant(self.now_ms);
        let system = self.engine.system_mut();
        system.now = now;
        f(&mut system.monitor, now)
    }
}

impl Default for DeckSession {
    fn default() -> Self {
        Self::new()
    }
}
