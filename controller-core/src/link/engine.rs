//! Text command dispatcher.
//!
//! The engine glues parsed frames to the rest of the system through three
//! injected collaborator traits: power control, HID injection, and system
//! operations. Every dispatched frame yields exactly one reply; protocol
//! errors additionally raise a transient error status. The engine never
//! touches a transport, so firmware and emulator share it unchanged.

use core::fmt::Write as _;

use heapless::String;
use winnow::ascii::{dec_int, dec_uint};
use winnow::error::ContextError;
use winnow::prelude::*;

use super::command::{
    self, CommandId, HELP_REPLY, REPLY_FAIL, REPLY_OK, SYNTAX_REPLY, UNKNOWN_REPLY,
};
use super::parser::{self, CommandFrame};
use crate::activity::DeepSleepInfo;
use crate::power::PowerSnapshot;
use crate::sequencer::AdmissionError;
use crate::status::{DeviceStatus, StatusEvent};

/// Upper bound on a single reply; sized for the HELP listing.
pub const MAX_REPLY_LEN: usize = 1_536;

/// Reply buffer type shared with the transports.
pub type Reply = String<MAX_REPLY_LEN>;

/// Identity data served by `SYSTEM_INFO`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SystemInfo {
    pub wifi_mac: [u8; 6],
    pub bt_mac: [u8; 6],
    pub firmware_version: u16,
    pub uptime_seconds: u32,
}

/// Power-path collaborator. Requests are fire-and-forget: the reply only
/// reports admission, the handshake outcome is observed via status queries.
pub trait PowerControl {
    /// Latest published telemetry snapshot.
    fn snapshot(&self) -> PowerSnapshot;

    /// Requests SBC power-on; `Err` reports the admission failure.
    fn request_on(&mut self) -> Result<(), AdmissionError>;

    /// Requests SBC power-off; `true` when accepted (including already-off).
    fn request_off(&mut self) -> bool;
}

/// HID injection collaborator. Every method reports whether the event was
/// accepted for delivery.
pub trait HidInjector {
    fn key_press(&mut self, key: u8) -> bool;
    fn key_hold(&mut self, key: u8) -> bool;
    fn key_release(&mut self, key: u8) -> bool;
    fn type_text(&mut self, text: &str) -> bool;
    fn mouse_move(&mut self, dx: i16, dy: i16) -> bool;
    fn mouse_press(&mut self, buttons: u8) -> bool;
    fn mouse_hold(&mut self, buttons: u8) -> bool;
    fn mouse_release(&mut self, buttons: u8) -> bool;
    fn mouse_scroll(&mut self, dx: i16, dy: i16) -> bool;
    fn gamepad_press(&mut self, button: u8) -> bool;
    fn gamepad_hold(&mut self, button: u8) -> bool;
    fn gamepad_release(&mut self, button: u8) -> bool;
    fn gamepad_left_axis(&mut self, x: i16, y: i16) -> bool;
    fn gamepad_right_axis(&mut self, x: i16, y: i16) -> bool;
    fn system_power_key(&mut self) -> bool;
}

/// System-surface collaborator: identity and the sleep watchdog.
pub trait SystemOps {
    fn system_info(&self) -> SystemInfo;
    fn deep_sleep_enable(&mut self);
    fn deep_sleep_disable(&mut self);
    fn deep_sleep_info(&self) -> DeepSleepInfo;
}

/// Deferred action the transport performs after the reply is sent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineAction {
    /// Restart the whole controller.
    Restart,
}

/// Result of dispatching one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatch {
    pub reply: Reply,
    pub status: Option<StatusEvent>,
    pub action: Option<EngineAction>,
}

impl Dispatch {
    fn reply_only(text: &str) -> Self {
        Self {
            reply: reply_from(text),
            status: None,
            action: None,
        }
    }

    fn with_status(text: &str, status: StatusEvent) -> Self {
        Self {
            reply: reply_from(text),
            status: Some(status),
            action: None,
        }
    }
}

fn reply_from(text: &str) -> Reply {
    let mut reply = Reply::new();
    // Replies are authored under MAX_REPLY_LEN; truncate rather than drop
    // if that ever stops holding.
    let _ = reply.push_str(text);
    reply
}

/// The text protocol dispatcher.
pub struct CommandEngine<P, H, S> {
    power: P,
    hid: H,
    system: S,
}

impl<P, H, S> CommandEngine<P, H, S>
where
    P: PowerControl,
    H: HidInjector,
    S: SystemOps,
{
    /// Creates an engine around its collaborators.
    pub const fn new(power: P, hid: H, system: S) -> Self {
        Self { power, hid, system }
    }

    /// Returns a mutable handle to the power collaborator.
    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    /// Returns a mutable handle to the HID collaborator.
    pub fn hid_mut(&mut self) -> &mut H {
        &mut self.hid
    }

    /// Returns a mutable handle to the system collaborator.
    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    /// Handles one raw inbound frame. Non-UTF-8 input is a syntax error.
    pub fn handle_bytes(&mut self, bytes: &[u8]) -> Option<Dispatch> {
        match core::str::from_utf8(bytes) {
            Ok(line) => self.handle_line(line),
            Err(_) => Some(Self::syntax_error()),
        }
    }

    /// Handles one inbound line. Returns `None` for empty lines, which are
    /// not frames and get no reply.
    pub fn handle_line(&mut self, line: &str) -> Option<Dispatch> {
        let frame = match parser::parse(line) {
            Ok(None) => return None,
            Ok(Some(frame)) => frame,
            Err(_) => return Some(Self::syntax_error()),
        };

        let Some(spec) = command::lookup(frame.keyword) else {
            return Some(Dispatch::with_status(
                UNKNOWN_REPLY,
                StatusEvent::transient(DeviceStatus::CommandError),
            ));
        };

        if frame.args.len() < spec.required_args {
            return Some(Dispatch::reply_only(REPLY_FAIL));
        }

        Some(self.dispatch(spec.id, &frame))
    }

    fn syntax_error() -> Dispatch {
        Dispatch::with_status(
            SYNTAX_REPLY,
            StatusEvent::transient(DeviceStatus::CommandError),
        )
    }

    fn dispatch(&mut self, id: CommandId, frame: &CommandFrame<'_>) -> Dispatch {
        match id {
            CommandId::PowerInfo => Dispatch {
                reply: power_info_reply(&self.power.snapshot()),
                status: None,
                action: None,
            },
            CommandId::PowerOn => match self.power.request_on() {
                Ok(()) => Dispatch::with_status(
                    REPLY_OK,
                    StatusEvent::transient(DeviceStatus::PowerOn),
                ),
                Err(AdmissionError::AlreadyOn) => Dispatch::reply_only(REPLY_FAIL),
                Err(_) => Dispatch::with_status(
                    REPLY_FAIL,
                    StatusEvent::transient(DeviceStatus::PowerBlocked),
                ),
            },
            CommandId::PowerOff => {
                if self.power.request_off() {
                    Dispatch::with_status(
                        REPLY_OK,
                        StatusEvent::transient(DeviceStatus::PowerOff),
                    )
                } else {
                    Dispatch::reply_only(REPLY_FAIL)
                }
            }
            CommandId::Shutdown => {
                if self.power.request_off() {
                    Dispatch::with_status(REPLY_OK, StatusEvent::sticky(DeviceStatus::Shutdown))
                } else {
                    Dispatch::reply_only(REPLY_FAIL)
                }
            }
            CommandId::HidKeyboardPress => self.key_command(frame, HidInjector::key_press),
            CommandId::HidKeyboardHold => self.key_command(frame, HidInjector::key_hold),
            CommandId::HidKeyboardRelease => self.key_command(frame, HidInjector::key_release),
            CommandId::HidKeyboardType => {
                let accepted = frame
                    .arg(0)
                    .is_some_and(|text| self.hid.type_text(text));
                ok_fail(accepted)
            }
            CommandId::HidMouseMove => self.pair_command(frame, HidInjector::mouse_move),
            CommandId::HidMousePress => self.button_command(frame, HidInjector::mouse_press),
            CommandId::HidMouseHold => self.button_command(frame, HidInjector::mouse_hold),
            CommandId::HidMouseRelease => self.button_command(frame, HidInjector::mouse_release),
            CommandId::HidMouseScroll => self.pair_command(frame, HidInjector::mouse_scroll),
            CommandId::HidGamepadPress => self.button_command(frame, HidInjector::gamepad_press),
            CommandId::HidGamepadHold => self.button_command(frame, HidInjector::gamepad_hold),
            CommandId::HidGamepadRelease => {
                self.button_command(frame, HidInjector::gamepad_release)
            }
            CommandId::HidGamepadLeftAxis => {
                self.pair_command(frame, HidInjector::gamepad_left_axis)
            }
            CommandId::HidGamepadRightAxis => {
                self.pair_command(frame, HidInjector::gamepad_right_axis)
            }
            CommandId::HidSystemPower => {
                let accepted = self.hid.system_power_key();
                ok_fail(accepted)
            }
            CommandId::SystemInfo => Dispatch {
                reply: system_info_reply(&self.system.system_info()),
                status: None,
                action: None,
            },
            CommandId::SystemRestart => Dispatch {
                reply: reply_from(REPLY_OK),
                status: Some(StatusEvent::sticky(DeviceStatus::Shutdown)),
                action: Some(EngineAction::Restart),
            },
            CommandId::DeepSleepInfo => Dispatch {
                reply: deep_sleep_reply(&self.system.deep_sleep_info()),
                status: None,
                action: None,
            },
            CommandId::DeepSleepEnable => {
                self.system.deep_sleep_enable();
                Dispatch::reply_only(REPLY_OK)
            }
            CommandId::DeepSleepDisable => {
                self.system.deep_sleep_disable();
                Dispatch::reply_only(REPLY_OK)
            }
            CommandId::Help => Dispatch::reply_only(HELP_REPLY),
        }
    }

    fn key_command(
        &mut self,
        frame: &CommandFrame<'_>,
        inject: impl FnOnce(&mut H, u8) -> bool,
    ) -> Dispatch {
        let accepted = frame
            .arg(0)
            .and_then(parse_u8)
            .is_some_and(|key| inject(&mut self.hid, key));
        ok_fail(accepted)
    }

    fn button_command(
        &mut self,
        frame: &CommandFrame<'_>,
        inject: impl FnOnce(&mut H, u8) -> bool,
    ) -> Dispatch {
        self.key_command(frame, inject)
    }

    fn pair_command(
        &mut self,
        frame: &CommandFrame<'_>,
        inject: impl FnOnce(&mut H, i16, i16) -> bool,
    ) -> Dispatch {
        let x = frame.arg(0).and_then(parse_i16);
        let y = frame.arg(1).and_then(parse_i16);
        let accepted = match (x, y) {
            (Some(x), Some(y)) => inject(&mut self.hid, x, y),
            _ => false,
        };
        ok_fail(accepted)
    }
}

fn ok_fail(accepted: bool) -> Dispatch {
    Dispatch::reply_only(if accepted { REPLY_OK } else { REPLY_FAIL })
}

fn parse_u8(field: &str) -> Option<u8> {
    dec_uint::<_, u8, ContextError>.parse(field).ok()
}

fn parse_i16(field: &str) -> Option<i16> {
    dec_int::<_, i16, ContextError>.parse(field).ok()
}

#[allow(clippy::cast_precision_loss)]
fn power_info_reply(snapshot: &PowerSnapshot) -> Reply {
    let mut reply = Reply::new();
    let _ = write!(
        reply,
        "POWER_INFO:{:.3}|{:.3}|{:.3}|{:.3}|{:.3}|{:.3}|{:.1}",
        snapshot.battery.voltage_v,
        snapshot.battery.current_a,
        snapshot.battery.seconds_to_empty as f32,
        snapshot.charger.voltage_v,
        snapshot.charger.current_a,
        snapshot.charger.seconds_to_full as f32,
        snapshot.battery.percentage,
    );
    reply
}

fn system_info_reply(info: &SystemInfo) -> Reply {
    let mut reply = Reply::new();
    let _ = reply.push_str("SYSTEM_INFO:");
    write_mac(&mut reply, &info.wifi_mac);
    let _ = reply.push('|');
    write_mac(&mut reply, &info.bt_mac);
    let _ = write!(
        reply,
        "|0x{:04X}|{}",
        info.firmware_version, info.uptime_seconds
    );
    reply
}

fn write_mac(reply: &mut Reply, mac: &[u8; 6]) {
    for (index, byte) in mac.iter().enumerate() {
        if index > 0 {
            let _ = reply.push(':');
        }
        let _ = write!(reply, "{byte:02X}");
    }
}

fn deep_sleep_reply(info: &DeepSleepInfo) -> Reply {
    let mut reply = Reply::new();
    let state = if info.enabled { "ENABLED" } else { "DISABLED" };
    let _ = write!(reply, "DEEP_SLEEP_INFO:{state},{}", info.idle_ms);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::{BatteryReading, ChargerReading};

    struct MockPower {
        snapshot: PowerSnapshot,
        on_result: Result<(), AdmissionError>,
        on_requests: usize,
        off_requests: usize,
    }

    impl MockPower {
        fn healthy() -> Self {
            let battery = BatteryReading {
                voltage_v: 3.7,
                current_a: -0.2,
                power_w: -0.74,
                percentage: 40.0,
                seconds_to_empty: 32_400,
            };
            let charger = ChargerReading {
                voltage_v: 5.0,
                current_a: 0.5,
                power_w: 2.5,
                connected: true,
                seconds_to_full: 7_200,
            };
            Self {
                snapshot: PowerSnapshot::new(battery, charger, 1_000),
                on_result: Ok(()),
                on_requests: 0,
                off_requests: 0,
            }
        }

        fn low_battery() -> Self {
            let mut mock = Self::healthy();
            mock.snapshot.battery.percentage = 3.0;
            mock.on_result = Err(AdmissionError::BatteryLow { percentage: 3.0 });
            mock
        }
    }

    impl PowerControl for MockPower {
        fn snapshot(&self) -> PowerSnapshot {
            self.snapshot
        }

        fn request_on(&mut self) -> Result<(), AdmissionError> {
            self.on_requests += 1;
            self.on_result
        }

        fn request_off(&mut self) -> bool {
            self.off_requests += 1;
            true
        }
    }

    #[derive(Default)]
    struct MockHid {
        last: Option<(&'static str, i32, i32)>,
        typed: heapless::String<64>,
        accept: bool,
    }

    impl MockHid {
        fn accepting() -> Self {
            Self {
                accept: true,
                ..Self::default()
            }
        }

        fn record(&mut self, op: &'static str, a: i32, b: i32) -> bool {
            self.last = Some((op, a, b));
            self.accept
        }
    }

    impl HidInjector for MockHid {
        fn key_press(&mut self, key: u8) -> bool {
            self.record("key_press", i32::from(key), 0)
        }
        fn key_hold(&mut self, key: u8) -> bool {
            self.record("key_hold", i32::from(key), 0)
        }
        fn key_release(&mut self, key: u8) -> bool {
            self.record("key_release", i32::from(key), 0)
        }
        fn type_text(&mut self, text: &str) -> bool {
            self.typed.clear();
            let _ = self.typed.push_str(text);
            self.accept
        }
        fn mouse_move(&mut self, dx: i16, dy: i16) -> bool {
            self.record("mouse_move", i32::from(dx), i32::from(dy))
        }
        fn mouse_press(&mut self, buttons: u8) -> bool {
            self.record("mouse_press", i32::from(buttons), 0)
        }
        fn mouse_hold(&mut self, buttons: u8) -> bool {
            self.record("mouse_hold", i32::from(buttons), 0)
        }
        fn mouse_release(&mut self, buttons: u8) -> bool {
            self.record("mouse_release", i32::from(buttons), 0)
        }
        fn mouse_scroll(&mut self, dx: i16, dy: i16) -> bool {
            self.record("mouse_scroll", i32::from(dx), i32::from(dy))
        }
        fn gamepad_press(&mut self, button: u8) -> bool {
            self.record("gamepad_press", i32::from(button), 0)
        }
        fn gamepad_hold(&mut self, button: u8) -> bool {
            self.record("gamepad_hold", i32::from(button), 0)
        }
        fn gamepad_release(&mut self, button: u8) -> bool {
            self.record("gamepad_release", i32::from(button), 0)
        }
        fn gamepad_left_axis(&mut self, x: i16, y: i16) -> bool {
            self.record("gamepad_left_axis", i32::from(x), i32::from(y))
        }
        fn gamepad_right_axis(&mut self, x: i16, y: i16) -> bool {
            self.record("gamepad_right_axis", i32::from(x), i32::from(y))
        }
        fn system_power_key(&mut self) -> bool {
            self.record("system_power_key", 0, 0)
        }
    }

    #[derive(Default)]
    struct MockSystem {
        sleep_enabled: bool,
    }

    impl SystemOps for MockSystem {
        fn system_info(&self) -> SystemInfo {
            SystemInfo {
                wifi_mac: [0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x22],
                bt_mac: [0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x23],
                firmware_version: 0x0100,
                uptime_seconds: 360,
            }
        }

        fn deep_sleep_enable(&mut self) {
            self.sleep_enabled = true;
        }

        fn deep_sleep_disable(&mut self) {
            self.sleep_enabled = false;
        }

        fn deep_sleep_info(&self) -> DeepSleepInfo {
            DeepSleepInfo {
                enabled: self.sleep_enabled,
                idle_ms: 4_500,
            }
        }
    }

    type TestEngine = CommandEngine<MockPower, MockHid, MockSystem>;

    fn engine() -> TestEngine {
        CommandEngine::new(MockPower::healthy(), MockHid::accepting(), MockSystem {
            sleep_enabled: true,
        })
    }

    fn dispatch(engine: &mut TestEngine, line: &str) -> Dispatch {
        engine.handle_line(line).expect("expected a reply")
    }

    #[test]
    fn power_info_renders_pipe_separated_fields() {
        let reply = dispatch(&mut engine(), "POWER_INFO").reply;
        assert_eq!(
            reply.as_str(),
            "POWER_INFO:3.700|-0.200|32400.000|5.000|0.500|7200.000|40.0"
        );
    }

    #[test]
    fn power_on_reports_admission_result() {
        let mut engine = engine();
        let dispatch = dispatch(&mut engine, "POWER_ON");
        assert_eq!(dispatch.reply.as_str(), REPLY_OK);
        assert_eq!(
            dispatch.status,
            Some(StatusEvent::transient(DeviceStatus::PowerOn))
        );
        assert_eq!(engine.power.on_requests, 1);
    }

    #[test]
    fn denied_power_on_replies_zero_with_blocked_status() {
        let mut engine = CommandEngine::new(
            MockPower::low_battery(),
            MockHid::accepting(),
            MockSystem::default(),
        );
        let dispatch = dispatch(&mut engine, "POWER_ON");
        assert_eq!(dispatch.reply.as_str(), REPLY_FAIL);
        assert_eq!(
            dispatch.status,
            Some(StatusEvent::transient(DeviceStatus::PowerBlocked))
        );
    }

    #[test]
    fn power_off_is_accepted_when_already_off() {
        let mut engine = engine();
        let dispatch = dispatch(&mut engine, "POWER_OFF");
        assert_eq!(dispatch.reply.as_str(), REPLY_OK);
        assert_eq!(engine.power.off_requests, 1);
    }

    #[test]
    fn mouse_move_parses_signed_fields() {
        let mut engine = engine();
        let dispatch = dispatch(&mut engine, "HID_MOUSE_MOVE:10:-5");
        assert_eq!(dispatch.reply.as_str(), REPLY_OK);
        assert_eq!(engine.hid.last, Some(("mouse_move", 10, -5)));
    }

    #[test]
    fn missing_fields_reply_failure_without_dispatching() {
        let mut engine = engine();
        let dispatch = dispatch(&mut engine, "HID_MOUSE_MOVE:10");
        assert_eq!(dispatch.reply.as_str(), REPLY_FAIL);
        assert_eq!(engine.hid.last, None);
    }

    #[test]
    fn non_numeric_fields_reply_failure() {
        let mut engine = engine();
        let dispatch = dispatch(&mut engine, "HID_KEYBOARD_PRESS:enter");
        assert_eq!(dispatch.reply.as_str(), REPLY_FAIL);
        assert_eq!(engine.hid.last, None);
    }

    #[test]
    fn keyboard_type_passes_text_through() {
        let mut engine = engine();
        let dispatch = dispatch(&mut engine, "HID_KEYBOARD_TYPE:hello world");
        assert_eq!(dispatch.reply.as_str(), REPLY_OK);
        assert_eq!(engine.hid.typed.as_str(), "hello world");
    }

    #[test]
    fn rejected_hid_event_replies_failure() {
        let mut engine = CommandEngine::new(
            MockPower::healthy(),
            MockHid::default(),
            MockSystem::default(),
        );
        let dispatch = dispatch(&mut engine, "HID_SYSTEM_POWER");
        assert_eq!(dispatch.reply.as_str(), REPLY_FAIL);
    }

    #[test]
    fn unknown_keyword_replies_unknown_with_error_status() {
        let dispatch = dispatch(&mut engine(), "FLASH_FIRMWARE");
        assert_eq!(dispatch.reply.as_str(), UNKNOWN_REPLY);
        assert_eq!(
            dispatch.status,
            Some(StatusEvent::transient(DeviceStatus::CommandError))
        );
    }

    #[test]
    fn overlong_split_replies_syntax_error() {
        let dispatch = dispatch(&mut engine(), "CMD:1:2:3:4:5:6:7:8");
        assert_eq!(dispatch.reply.as_str(), SYNTAX_REPLY);
        assert_eq!(
            dispatch.status,
            Some(StatusEvent::transient(DeviceStatus::CommandError))
        );
    }

    #[test]
    fn empty_lines_get_no_reply() {
        assert!(engine().handle_line("\r\n").is_none());
    }

    #[test]
    fn invalid_utf8_is_a_syntax_error() {
        let dispatch = engine().handle_bytes(&[0xFF, 0xFE, b'\n']).unwrap();
        assert_eq!(dispatch.reply.as_str(), SYNTAX_REPLY);
    }

    #[test]
    fn help_fits_the_reply_buffer() {
        let dispatch = dispatch(&mut engine(), "HELP");
        assert_eq!(dispatch.reply.as_str(), HELP_REPLY);
        assert!(HELP_REPLY.len() <= MAX_REPLY_LEN);
    }

    #[test]
    fn system_info_renders_macs_and_version() {
        let reply = dispatch(&mut engine(), "SYSTEM_INFO").reply;
        assert_eq!(
            reply.as_str(),
            "SYSTEM_INFO:AA:BB:CC:00:11:22|AA:BB:CC:00:11:23|0x0100|360"
        );
    }

    #[test]
    fn deep_sleep_commands_drive_the_watchdog() {
        let mut engine = engine();
        assert_eq!(
            dispatch(&mut engine, "DEEP_SLEEP_INFO").reply.as_str(),
            "DEEP_SLEEP_INFO:ENABLED,4500"
        );

        assert_eq!(
            dispatch(&mut engine, "DEEP_SLEEP_DISABLE").reply.as_str(),
            REPLY_OK
        );
        assert!(!engine.system.sleep_enabled);
        assert_eq!(
            dispatch(&mut engine, "DEEP_SLEEP_INFO").reply.as_str(),
            "DEEP_SLEEP_INFO:DISABLED,4500"
        );

        assert_eq!(
            dispatch(&mut engine, "DEEP_SLEEP_ENABLE").reply.as_str(),
            REPLY_OK
        );
        assert!(engine.system.sleep_enabled);
    }

    #[test]
    fn restart_defers_the_reset_until_after_the_reply() {
        let dispatch = dispatch(&mut engine(), "SYSTEM_RESTART");
        assert_eq!(dispatch.reply.as_str(), REPLY_OK);
        assert_eq!(dispatch.action, Some(EngineAction::Restart));
    }
}
