//! Reply-shape and chunking scenarios for the text protocol.

use controller_core::activity::DeepSleepInfo;
use controller_core::link::chunker::{self, Chunks};
use controller_core::link::{CommandEngine, HidInjector, PowerControl, SystemInfo, SystemOps};
use controller_core::power::{BatteryReading, ChargerReading, PowerSnapshot};
use controller_core::sequencer::AdmissionError;

struct FixedPower {
    snapshot: PowerSnapshot,
}

impl PowerControl for FixedPower {
    fn snapshot(&self) -> PowerSnapshot {
        self.snapshot
    }

    fn request_on(&mut self) -> Result<(), AdmissionError> {
        Ok(())
    }

    fn request_off(&mut self) -> bool {
        true
    }
}

struct CountingHid {
    accepted: usize,
}

impl CountingHid {
    fn accept(&mut self) -> bool {
        self.accepted += 1;
        true
    }
}

impl HidInjector for CountingHid {
    fn key_press(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn key_hold(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn key_release(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn type_text(&mut self, _: &str) -> bool {
        self.accept()
    }
    fn mouse_move(&mut self, _: i16, _: i16) -> bool {
        self.accept()
    }
    fn mouse_press(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn mouse_hold(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn mouse_release(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn mouse_scroll(&mut self, _: i16, _: i16) -> bool {
        self.accept()
    }
    fn gamepad_press(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn gamepad_hold(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn gamepad_release(&mut self, _: u8) -> bool {
        self.accept()
    }
    fn gamepad_left_axis(&mut self, _: i16, _: i16) -> bool {
        self.accept()
    }
    fn gamepad_right_axis(&mut self, _: i16, _: i16) -> bool {
        self.accept()
    }
    fn system_power_key(&mut self) -> bool {
        self.accept()
    }
}

struct FixedSystem;

impl SystemOps for FixedSystem {
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            wifi_mac: [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01],
            bt_mac: [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x02],
            firmware_version: 0x0100,
            uptime_seconds: 86_400,
        }
    }

    fn deep_sleep_enable(&mut self) {}

    fn deep_sleep_disable(&mut self) {}

    fn deep_sleep_info(&self) -> DeepSleepInfo {
        DeepSleepInfo {
            enabled: false,
            idle_ms: 12_000,
        }
    }
}

fn engine() -> CommandEngine<FixedPower, CountingHid, FixedSystem> {
    let battery = BatteryReading {
        voltage_v: 4.05,
        current_a: 0.8,
        power_w: 3.24,
        percentage: 88.5,
        seconds_to_empty: 0,
    };
    let charger = ChargerReading {
        voltage_v: 5.1,
        current_a: 1.2,
        power_w: 6.12,
        connected: true,
        seconds_to_full: 1_800,
    };
    CommandEngine::new(
        FixedPower {
            snapshot: PowerSnapshot::new(battery, charger, 99),
        },
        CountingHid { accepted: 0 },
        FixedSystem,
    )
}

#[test]
fn every_command_yields_exactly_one_reply() {
    let mut engine = engine();
    for line in [
        "POWER_INFO",
        "POWER_ON",
        "POWER_OFF",
        "SHUTDOWN",
        "HID_KEYBOARD_PRESS:65",
        "HID_KEYBOARD_TYPE:hi",
        "HID_MOUSE_MOVE:1:2",
        "HID_GAMEPAD_LEFT_AXIS:-100:100",
        "HID_SYSTEM_POWER",
        "SYSTEM_INFO",
        "DEEP_SLEEP_INFO",
        "DEEP_SLEEP_ENABLE",
        "DEEP_SLEEP_DISABLE",
        "HELP",
        "NOT_A_COMMAND",
    ] {
        let dispatch = engine.handle_line(line);
        assert!(dispatch.is_some(), "{line} produced no reply");
        assert!(
            !dispatch.unwrap().reply.is_empty(),
            "{line} produced an empty reply"
        );
    }
}

#[test]
fn help_reply_chunks_reassemble_byte_for_byte() {
    let mut engine = engine();
    let reply = engine.handle_line("HELP").unwrap().reply;
    assert!(reply.len() > chunker::MAX_CHUNK_BYTES);

    for mtu in [23, 64, 185, 512] {
        let limit = chunker::chunk_limit(mtu);
        let mut reassembled: Vec<u8> = Vec::new();
        for chunk in Chunks::new(reply.as_bytes(), mtu) {
            assert!(chunk.len() <= limit, "chunk over cap at mtu {mtu}");
            assert!(!chunk.is_empty());
            reassembled.extend_from_slice(chunk);
        }
        assert_eq!(reassembled.as_slice(), reply.as_bytes(), "mtu {mtu}");
    }
}

#[test]
fn short_replies_are_single_chunks() {
    let mut engine = engine();
    let reply = engine.handle_line("POWER_ON").unwrap().reply;
    let chunks: Vec<&[u8]> = Chunks::new(reply.as_bytes(), 185).collect();
    assert_eq!(chunks, [b"1".as_slice()]);
}

#[test]
fn power_info_reflects_the_published_snapshot() {
    let mut engine = engine();
    let reply = engine.handle_line("POWER_INFO").unwrap().reply;
    assert_eq!(
        reply.as_str(),
        "POWER_INFO:4.050|0.800|0.000|5.100|1.200|1800.000|88.5"
    );
}

#[test]
fn system_and_sleep_replies_follow_their_documented_shapes() {
    let mut engine = engine();
    assert_eq!(
        engine.handle_line("SYSTEM_INFO").unwrap().reply.as_str(),
        "SYSTEM_INFO:DE:AD:BE:EF:00:01|DE:AD:BE:EF:00:02|0x0100|86400"
    );
    assert_eq!(
        engine.handle_line("DEEP_SLEEP_INFO").unwrap().reply.as_str(),
        "DEEP_SLEEP_INFO:DISABLED,12000"
    );
}
