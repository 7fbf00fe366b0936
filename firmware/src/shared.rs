#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Cross-task shared state.
//!
//! Atomics carry the small flags every task reads; the published
//! [`PowerSnapshot`] and the vendor engine sit behind critical-section
//! mutexes whose lock never waits on another task. Readers of the snapshot
//! can always make progress: before the first sample is published they see
//! the zeroed snapshot, which fails safe everywhere it is consulted.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::Mutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use controller_core::activity::ActivityMonitor;
use controller_core::power::PowerSnapshot;
use controller_core::sequencer::SequencerState;
use controller_core::status::{DeviceStatus, StatusEvent};
use controller_core::vendor::VendorEngine;

use crate::hid::{HID_QUEUE_DEPTH, HidEvent};
use crate::hw::FirmwareInstant;

/// Station identity advertised over `SYSTEM_INFO`; the radio module owns
/// the actual air interface, these mirror its provisioning.
pub const DEVICE_WIFI_MAC: [u8; 6] = [0x84, 0xF7, 0x03, 0x10, 0x20, 0x30];
pub const DEVICE_BT_MAC: [u8; 6] = [0x84, 0xF7, 0x03, 0x10, 0x20, 0x31];

#[cfg(target_os = "none")]
type SharedRawMutex = CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
type SharedRawMutex = NoopRawMutex;

/// Power transition requests routed to the power task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerCommand {
    /// Request SBC power-on (admission re-checked by the power task).
    On,
    /// Request a graceful SBC power-off.
    Off,
    /// Drop the rail immediately, skipping the handshake.
    ForceOff,
}

/// Depth of the power command queue.
pub const POWER_QUEUE_DEPTH: usize = 4;

/// Depth of the status event queue feeding the aggregator.
pub const STATUS_QUEUE_DEPTH: usize = 8;

pub static POWER_COMMANDS: Channel<SharedRawMutex, PowerCommand, POWER_QUEUE_DEPTH> =
    Channel::new();
pub static HID_EVENTS: Channel<SharedRawMutex, HidEvent, HID_QUEUE_DEPTH> = Channel::new();
pub static STATUS_EVENTS: Channel<SharedRawMutex, StatusEvent, STATUS_QUEUE_DEPTH> =
    Channel::new();

static SNAPSHOT: Mutex<SharedRawMutex, Cell<PowerSnapshot>> =
    Mutex::new(Cell::new(PowerSnapshot::zeroed()));
static VENDOR: Mutex<SharedRawMutex, RefCell<VendorEngine>> =
    Mutex::new(RefCell::new(VendorEngine::new()));
static ACTIVITY: Mutex<SharedRawMutex, RefCell<Option<ActivityMonitor<FirmwareInstant>>>> =
    Mutex::new(RefCell::new(None));

static SEQUENCER_STATE: AtomicU8 = AtomicU8::new(0);
static USB_CONFIGURED: AtomicBool = AtomicBool::new(false);
static RADIO_CONNECTED: AtomicBool = AtomicBool::new(false);
static DEVICE_STATUS: AtomicU8 = AtomicU8::new(0);

/// Publishes the latest telemetry snapshot.
pub fn publish_snapshot(snapshot: PowerSnapshot) {
    SNAPSHOT.lock(|cell| cell.set(snapshot));
}

/// Reads the latest telemetry snapshot.
pub fn read_snapshot() -> PowerSnapshot {
    SNAPSHOT.lock(Cell::get)
}

/// Publishes the sequencer state for cross-task admission checks.
pub fn set_sequencer_state(state: SequencerState) {
    SEQUENCER_STATE.store(state.to_raw(), Ordering::Relaxed);
}

/// Reads the published sequencer state.
pub fn sequencer_state() -> SequencerState {
    SequencerState::from_raw(SEQUENCER_STATE.load(Ordering::Relaxed))
}

/// Records whether the host has the wired interface configured.
pub fn set_usb_configured(configured: bool) {
    USB_CONFIGURED.store(configured, Ordering::Relaxed);
}

/// Returns `true` while the host has the wired interface configured.
pub fn usb_configured() -> bool {
    USB_CONFIGURED.load(Ordering::Relaxed)
}

/// Records the radio module's connection line level.
pub fn set_radio_connected(connected: bool) {
    RADIO_CONNECTED.store(connected, Ordering::Relaxed);
}

/// Returns `true` while a radio client is connected.
pub fn radio_connected() -> bool {
    RADIO_CONNECTED.load(Ordering::Relaxed)
}

/// Publishes the aggregated device status for the indicator renderer.
pub fn publish_status(status: DeviceStatus) {
    DEVICE_STATUS.store(status.to_raw(), Ordering::Relaxed);
}

/// Reads the aggregated device status; consumed by the indicator renderer.
#[allow(dead_code)]
pub fn device_status() -> DeviceStatus {
    DeviceStatus::from_raw(DEVICE_STATUS.load(Ordering::Relaxed))
}

/// Installs the activity monitor at boot.
pub fn activity_init(now: FirmwareInstant) {
    ACTIVITY.lock(|cell| {
        cell.replace(Some(ActivityMonitor::new(now)));
    });
}

/// Runs a closure against the activity monitor. Returns `None` only before
/// [`activity_init`] has run.
pub fn with_activity<R>(f: impl FnOnce(&mut ActivityMonitor<FirmwareInstant>) -> R) -> Option<R> {
    ACTIVITY.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

/// Marks activity from any transport or input source.
pub fn note_activity(now: FirmwareInstant) {
    let _ = with_activity(|monitor| monitor.notify_activity(now));
}

/// Feeds one inbound vendor report to the protocol engine. Invalid frames
/// are dropped here; the drop reason is surfaced for logging only.
pub fn vendor_handle(bytes: &[u8], uptime_s: u32) -> Result<(), controller_core::vendor::FrameError> {
    let snapshot = read_snapshot();
    VENDOR.lock(|engine| {
        engine
            .borrow_mut()
            .handle_report(bytes, &snapshot, uptime_s)
            .map(|_| ())
    })
}

/// Serves a host feature-report read from the staged-response slot.
pub fn vendor_fetch() -> [u8; controller_core::vendor::FRAME_LEN] {
    VENDOR.lock(|engine| engine.borrow_mut().fetch_response())
}
