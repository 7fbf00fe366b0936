//! Wired link task: USB device plumbing plus input report serialization.
//!
//! Vendor feature reports never pass through here; the control-transfer
//! request handler in `usbdev` serves them synchronously from the staged
//! response slot. This task drains the injection queue and turns events
//! into interrupt IN reports, applying the press/release delays.

use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_time::Timer;
use embassy_usb::class::hid::HidWriter;
use static_cell::StaticCell;

use crate::hid::{
    self, GamepadReport, HidEvent, KeyboardReport, MouseReport, consumer_report,
};
use crate::hw::FirmwareInstant;
use crate::shared;
use crate::usbdev::{self, INPUT_REPORT_LEN, UsbDeviceStrings};

/// Hold time between press and release for one-shot injections.
const PRESS_DELAY_MS: u64 = 50;

/// Hold time for the consumer power key.
const POWER_KEY_DELAY_MS: u64 = 200;

/// Inter-character delay while typing text.
const TYPE_DELAY_MS: u64 = 5;

static USB_STORAGE: StaticCell<usbdev::UsbDeviceStorage> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(usbdev::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let mut composite = usbdev::DeckUsb::new(driver, storage, UsbDeviceStrings::default());
    let input = composite
        .take_input()
        .expect("input HID interface unavailable");
    let mut device = composite.device;

    join(device.run(), run_input(input)).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_input<D>(mut writer: HidWriter<'static, D, INPUT_REPORT_LEN>) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let mut gamepad = GamepadReport::default();
    let mut mouse_buttons = 0u8;

    loop {
        let event = shared::HID_EVENTS.receive().await;
        shared::note_activity(FirmwareInstant::now());

        match event {
            HidEvent::KeyPress(key) => {
                if let Some((usage, shift)) = hid::ascii_to_usage(key) {
                    send(&mut writer, &KeyboardReport::pressed(usage, shift).encode()).await;
                    Timer::after_millis(PRESS_DELAY_MS).await;
                    send(&mut writer, &KeyboardReport::default().encode()).await;
                } else {
                    defmt::warn!("hid: unmapped key code {}", key);
                }
            }
            HidEvent::KeyHold(key) => {
                if let Some((usage, shift)) = hid::ascii_to_usage(key) {
                    send(&mut writer, &KeyboardReport::pressed(usage, shift).encode()).await;
                }
            }
            HidEvent::KeyRelease(_) => {
                send(&mut writer, &KeyboardReport::default().encode()).await;
            }
            HidEvent::Type(text) => {
                for byte in text.as_bytes() {
                    let Some((usage, shift)) = hid::ascii_to_usage(*byte) else {
                        continue;
                    };
                    send(&mut writer, &KeyboardReport::pressed(usage, shift).encode()).await;
                    Timer::after_millis(TYPE_DELAY_MS).await;
                    send(&mut writer, &KeyboardReport::default().encode()).await;
                    Timer::after_millis(TYPE_DELAY_MS).await;
                }
            }
            HidEvent::MouseMove(dx, dy) => {
                let report = MouseReport {
                    buttons: mouse_buttons,
                    dx: hid::clamp_axis(dx),
                    dy: hid::clamp_axis(dy),
                    ..MouseReport::default()
                };
                send(&mut writer, &report.encode()).await;
            }
            HidEvent::MousePress(buttons) => {
                let report = MouseReport {
                    buttons: mouse_buttons | buttons,
                    ..MouseReport::default()
                };
                send(&mut writer, &report.encode()).await;
                Timer::after_millis(PRESS_DELAY_MS).await;
                let report = MouseReport {
                    buttons: mouse_buttons,
                    ..MouseReport::default()
                };
                send(&mut writer, &report.encode()).await;
            }
            HidEvent::MouseHold(buttons) => {
                mouse_buttons |= buttons;
                let report = MouseReport {
                    buttons: mouse_buttons,
                    ..MouseReport::default()
                };
                send(&mut writer, &report.encode()).await;
            }
            HidEvent::MouseRelease(buttons) => {
                mouse_buttons &= !buttons;
                let report = MouseReport {
                    buttons: mouse_buttons,
                    ..MouseReport::default()
                };
                send(&mut writer, &report.encode()).await;
            }
            HidEvent::MouseScroll(dx, dy) => {
                let report = MouseReport {
                    buttons: mouse_buttons,
                    wheel: hid::clamp_axis(dy),
                    pan: hid::clamp_axis(dx),
                    ..MouseReport::default()
                };
                send(&mut writer, &report.encode()).await;
            }
            HidEvent::GamepadPress(button) => {
                gamepad.set_button(button, true);
                send(&mut writer, &gamepad.encode()).await;
                Timer::after_millis(PRESS_DELAY_MS).await;
                gamepad.set_button(button, false);
                send(&mut writer, &gamepad.encode()).await;
            }
            HidEvent::GamepadHold(button) => {
                gamepad.set_button(button, true);
                send(&mut writer, &gamepad.encode()).await;
            }
            HidEvent::GamepadRelease(button) => {
                gamepad.set_button(button, false);
                send(&mut writer, &gamepad.encode()).await;
            }
            HidEvent::GamepadLeftAxis(x, y) => {
                gamepad.left_x = hid::clamp_axis(x);
                gamepad.left_y = hid::clamp_axis(y);
                send(&mut writer, &gamepad.encode()).await;
            }
            HidEvent::GamepadRightAxis(x, y) => {
                gamepad.right_x = hid::clamp_axis(x);
                gamepad.right_y = hid::clamp_axis(y);
                send(&mut writer, &gamepad.encode()).await;
            }
            HidEvent::SystemPower => {
                send(&mut writer, &consumer_report(true)).await;
                Timer::after_millis(POWER_KEY_DELAY_MS).await;
                send(&mut writer, &consumer_report(false)).await;
            }
        }
    }
}

async fn send<D>(writer: &mut HidWriter<'static, D, INPUT_REPORT_LEN>, report: &[u8])
where
    D: embassy_usb::driver::Driver<'static>,
{
    if writer.write(report).await.is_err() {
        defmt::warn!("hid: input report write failed");
    }
}
