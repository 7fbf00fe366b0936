//! SBC power rail driver and host-link view for the sequencer.

use controller_core::sequencer::{HostLink, PowerRail};
use embassy_stm32::gpio::Output;

use crate::hid::HidEvent;
use crate::shared;

/// Push-pull MOSFET driver on the SBC rail.
pub struct RailDriver {
    pin: Output<'static>,
}

impl RailDriver {
    /// Wraps the configured rail output (low at boot).
    #[must_use]
    pub const fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

impl PowerRail for RailDriver {
    fn set_energized(&mut self, on: bool) {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }

    fn is_energized(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Host-link view backed by the USB configured flag; the graceful shutdown
/// request rides the HID consumer power key.
#[derive(Default)]
pub struct UsbHostLink;

impl HostLink for UsbHostLink {
    fn is_attached(&self) -> bool {
        shared::usb_configured()
    }

    fn request_shutdown(&mut self) -> bool {
        shared::HID_EVENTS.try_send(HidEvent::SystemPower).is_ok()
    }
}
