//! Text protocol transport over the radio module UART.
//!
//! Bytes assemble into bounded lines; each completed line runs through the
//! shared command engine and its reply is written back in MTU-bounded
//! chunks with a short pacing delay between them. The adapters here are
//! the only place the dispatcher's collaborator traits touch firmware
//! state.

use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::Timer;
use embedded_io_async::{Read, Write};
use heapless::Vec;

use controller_core::activity::DeepSleepInfo;
use controller_core::link::chunker::{Chunks, INTER_CHUNK_PACING};
use controller_core::link::command::SYNTAX_REPLY;
use controller_core::link::{
    CommandEngine, Dispatch, EngineAction, HidInjector, MAX_LINE_LEN, PowerControl, SystemInfo,
    SystemOps,
};
use controller_core::power::{MIN_STARTUP_PERCENTAGE, PowerSnapshot};
use controller_core::sequencer::{AdmissionError, SequencerState};
use controller_core::status::{DeviceStatus, StatusEvent};
use controller_core::vendor::FIRMWARE_VERSION;

use crate::hid::{HidEvent, MAX_TYPE_TEXT};
use crate::hw::{self, FirmwareInstant};
use crate::shared::{self, PowerCommand};

const RADIO_BAUD: u32 = 115_200;

/// Payload limit negotiated by the radio module for one air frame.
const LINK_MTU: usize = 185;

const UART_BUFFER_SIZE: usize = 256;

static mut UART_TX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART2>;
});

/// Power collaborator: admission is checked against the published state so
/// the reply is immediate, then the transition is queued to the power task
/// (which re-checks on dequeue).
struct RadioPower;

impl PowerControl for RadioPower {
    fn snapshot(&self) -> PowerSnapshot {
        shared::read_snapshot()
    }

    fn request_on(&mut self) -> Result<(), AdmissionError> {
        let state = shared::sequencer_state();
        if state == SequencerState::On {
            return Err(AdmissionError::AlreadyOn);
        }
        if state.is_transitioning() {
            return Err(AdmissionError::Busy);
        }

        let percentage = shared::read_snapshot().battery.percentage;
        if percentage < MIN_STARTUP_PERCENTAGE {
            return Err(AdmissionError::BatteryLow { percentage });
        }

        shared::POWER_COMMANDS
            .try_send(PowerCommand::On)
            .map_err(|_| AdmissionError::Busy)
    }

    fn request_off(&mut self) -> bool {
        shared::POWER_COMMANDS.try_send(PowerCommand::Off).is_ok()
    }
}

/// HID collaborator: every injection is an enqueue onto the USB task.
struct RadioHid;

impl RadioHid {
    fn send(event: HidEvent) -> bool {
        shared::HID_EVENTS.try_send(event).is_ok()
    }
}

impl HidInjector for RadioHid {
    fn key_press(&mut self, key: u8) -> bool {
        Self::send(HidEvent::KeyPress(key))
    }

    fn key_hold(&mut self, key: u8) -> bool {
        Self::send(HidEvent::KeyHold(key))
    }

    fn key_release(&mut self, key: u8) -> bool {
        Self::send(HidEvent::KeyRelease(key))
    }

    fn type_text(&mut self, text: &str) -> bool {
        let mut owned: heapless::String<MAX_TYPE_TEXT> = heapless::String::new();
        // Longer text is truncated at the event boundary, never split.
        for ch in text.chars() {
            if owned.push(ch).is_err() {
                break;
            }
        }
        Self::send(HidEvent::Type(owned))
    }

    fn mouse_move(&mut self, dx: i16, dy: i16) -> bool {
        Self::send(HidEvent::MouseMove(dx, dy))
    }

    fn mouse_press(&mut self, buttons: u8) -> bool {
        Self::send(HidEvent::MousePress(buttons))
    }

    fn mouse_hold(&mut self, buttons: u8) -> bool {
        Self::send(HidEvent::MouseHold(buttons))
    }

    fn mouse_release(&mut self, buttons: u8) -> bool {
        Self::send(HidEvent::MouseRelease(buttons))
    }

    fn mouse_scroll(&mut self, dx: i16, dy: i16) -> bool {
        Self::send(HidEvent::MouseScroll(dx, dy))
    }

    fn gamepad_press(&mut self, button: u8) -> bool {
        Self::send(HidEvent::GamepadPress(button))
    }

    fn gamepad_hold(&mut self, button: u8) -> bool {
        Self::send(HidEvent::GamepadHold(button))
    }

    fn gamepad_release(&mut self, button: u8) -> bool {
        Self::send(HidEvent::GamepadRelease(button))
    }

    fn gamepad_left_axis(&mut self, x: i16, y: i16) -> bool {
        Self::send(HidEvent::GamepadLeftAxis(x, y))
    }

    fn gamepad_right_axis(&mut self, x: i16, y: i16) -> bool {
        Self::send(HidEvent::GamepadRightAxis(x, y))
    }

    fn system_power_key(&mut self) -> bool {
        Self::send(HidEvent::SystemPower)
    }
}

/// System collaborator: identity constants plus the shared sleep watchdog.
struct RadioSystem;

impl SystemOps for RadioSystem {
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            wifi_mac: shared::DEVICE_WIFI_MAC,
            bt_mac: shared::DEVICE_BT_MAC,
            firmware_version: FIRMWARE_VERSION,
            uptime_seconds: uptime_seconds(),
        }
    }

    fn deep_sleep_enable(&mut self) {
        let _ = shared::with_activity(|monitor| monitor.enable(FirmwareInstant::now()));
    }

    fn deep_sleep_disable(&mut self) {
        let _ = shared::with_activity(controller_core::activity::ActivityMonitor::disable);
    }

    fn deep_sleep_info(&self) -> DeepSleepInfo {
        shared::with_activity(|monitor| monitor.info(FirmwareInstant::now())).unwrap_or(
            DeepSleepInfo {
                enabled: false,
                idle_ms: 0,
            },
        )
    }
}

#[allow(clippy::cast_possible_truncation)]
fn uptime_seconds() -> u32 {
    let seconds = embassy_time::Instant::now().as_secs();
    if seconds > u64::from(u32::MAX) {
        u32::MAX
    } else {
        seconds as u32
    }
}

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART2>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = RADIO_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = unsafe {
        BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            &mut UART_TX_BUFFER,
            &mut UART_RX_BUFFER,
            UartIrqs,
            config,
        )
        .expect("failed to initialize radio UART")
    };
    let (mut uart_tx, mut uart_rx) = uart.split();

    let mut engine = CommandEngine::new(RadioPower, RadioHid, RadioSystem);
    let mut line: Vec<u8, MAX_LINE_LEN> = Vec::new();
    let mut overflowed = false;
    let mut ingress = [0u8; 64];

    loop {
        let count = match uart_rx.read(&mut ingress).await {
            Ok(count) => count,
            Err(_) => {
                defmt::warn!("radio: UART read error");
                Timer::after_millis(5).await;
                continue;
            }
        };

        for &byte in &ingress[..count] {
            if byte == b'\n' || byte == b'\r' {
                if overflowed {
                    overflowed = false;
                    line.clear();
                    defmt::warn!("radio: dropping overlong line");
                    let _ = shared::STATUS_EVENTS
                        .try_send(StatusEvent::transient(DeviceStatus::CommandError));
                    write_reply(&mut uart_tx, SYNTAX_REPLY.as_bytes()).await;
                    continue;
                }
                if line.is_empty() {
                    continue;
                }

                shared::note_activity(FirmwareInstant::now());
                let dispatch = engine.handle_bytes(&line);
                line.clear();
                if let Some(dispatch) = dispatch {
                    finish_dispatch(&mut uart_tx, dispatch).await;
                }
            } else if !overflowed && line.push(byte).is_err() {
                overflowed = true;
            }
        }
    }
}

async fn finish_dispatch<W: Write>(uart_tx: &mut W, dispatch: Dispatch) {
    if let Some(event) = dispatch.status {
        let _ = shared::STATUS_EVENTS.try_send(event);
    }

    write_reply(uart_tx, dispatch.reply.as_bytes()).await;

    if dispatch.action == Some(EngineAction::Restart) {
        defmt::info!("radio: restart requested over the link");
        Timer::after_millis(1_000).await;
        hw::sleep::restart();
    }
}

/// Writes one reply as MTU-bounded chunks with pacing, then a terminator.
async fn write_reply<W: Write>(uart_tx: &mut W, reply: &[u8]) {
    for (index, chunk) in Chunks::new(reply, LINK_MTU).enumerate() {
        if index > 0 {
            let millis = u64::try_from(INTER_CHUNK_PACING.as_millis()).unwrap_or(10);
            Timer::after_millis(millis).await;
        }
        if write_all(uart_tx, chunk).await.is_err() {
            defmt::warn!("radio: UART write error");
            return;
        }
    }
    let _ = write_all(uart_tx, b"\n").await;
}

async fn write_all<W: Write>(uart_tx: &mut W, mut data: &[u8]) -> Result<(), W::Error> {
    while !data.is_empty() {
        let written = uart_tx.write(data).await?;
        data = &data[written..];
    }
    uart_tx.flush().await
}
