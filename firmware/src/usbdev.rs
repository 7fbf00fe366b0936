//! USB composite device scaffolding for the wired link.
//!
//! Two HID interfaces ride one device: the input interface (keyboard,
//! mouse, gamepad, consumer power key) and the vendor interface whose
//! 32-byte feature reports carry the binary protocol. A device-state
//! handler mirrors the host's configuration state into [`crate::shared`],
//! which is what the power sequencer reads as its acknowledgement signal.

#![allow(dead_code)]

/// Largest input report (keyboard: ID + modifiers + reserved + 6 keys).
pub const INPUT_REPORT_LEN: usize = 9;

/// Vendor feature report including its report-ID byte.
pub const VENDOR_REPORT_LEN: usize = controller_core::vendor::FRAME_LEN + 1;

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: Option<&'static str>,
}

impl Default for UsbDeviceStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Deck Labs",
            product: "Deck SBC Controller",
            serial_number: Some("DK001"),
        }
    }
}

#[cfg(target_os = "none")]
pub use target::*;

#[cfg(target_os = "none")]
mod target {
    use super::{INPUT_REPORT_LEN, UsbDeviceStrings, VENDOR_REPORT_LEN};
    use crate::shared;
    use controller_core::vendor::{FRAME_LEN, REPORT_ID};
    use embassy_usb::class::hid::{self, HidWriter, ReportId, RequestHandler, State};
    use embassy_usb::control::OutResponse;

    const CONTROL_BUFFER_LEN: usize = 64;
    const CONFIG_DESCRIPTOR_LEN: usize = 256;
    const BOS_DESCRIPTOR_LEN: usize = 256;
    const MSOS_DESCRIPTOR_LEN: usize = 256;

    pub const MAX_PACKET_SIZE: u16 = 64;

    /// Serves vendor feature reports from the staged-response slot.
    pub struct VendorReportHandler;

    impl RequestHandler for VendorReportHandler {
        fn get_report(&mut self, id: ReportId, buf: &mut [u8]) -> Option<usize> {
            if id != ReportId::Feature(REPORT_ID) || buf.len() < FRAME_LEN {
                return None;
            }
            let frame = shared::vendor_fetch();
            buf[..FRAME_LEN].copy_from_slice(&frame);
            Some(FRAME_LEN)
        }

        fn set_report(&mut self, id: ReportId, data: &[u8]) -> OutResponse {
            if id != ReportId::Feature(REPORT_ID) {
                return OutResponse::Rejected;
            }

            shared::note_activity(crate::hw::FirmwareInstant::now());
            let uptime = uptime_seconds();
            match shared::vendor_handle(data, uptime) {
                // Invalid frames are accepted at the transport level but
                // stage no response; the protocol stays silent for them.
                Ok(()) | Err(_) => OutResponse::Accepted,
            }
        }

        fn set_idle_ms(&mut self, _id: Option<ReportId>, _duration_ms: u32) {}

        fn get_idle_ms(&mut self, _id: Option<ReportId>) -> Option<u32> {
            None
        }
    }

    /// Mirrors device state changes into the shared flags.
    pub struct DeviceStateHandler;

    impl embassy_usb::Handler for DeviceStateHandler {
        fn reset(&mut self) {
            shared::set_usb_configured(false);
        }

        fn configured(&mut self, configured: bool) {
            shared::set_usb_configured(configured);
        }

        fn suspended(&mut self, suspended: bool) {
            // Suspend keeps the device enumerated; only resume refreshes
            // the flag so a suspended host still counts as attached.
            if !suspended {
                shared::set_usb_configured(true);
            }
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

    /// Backing storage for the USB builder, classes, and handlers.
    pub struct UsbDeviceStorage {
        control_buf: [u8; CONTROL_BUFFER_LEN],
        config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
        bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
        msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
        input_state: State<'static>,
        vendor_state: State<'static>,
        vendor_handler: VendorReportHandler,
        device_handler: DeviceStateHandler,
    }

    impl UsbDeviceStorage {
        /// Creates a fresh storage bundle.
        #[must_use]
        pub fn new() -> Self {
            Self {
                control_buf: [0; CONTROL_BUFFER_LEN],
                config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
                bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
                msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
                input_state: State::new(),
                vendor_state: State::new(),
                vendor_handler: VendorReportHandler,
                device_handler: DeviceStateHandler,
            }
        }
    }

    /// The composite device plus the input report writer.
    pub struct DeckUsb<D>
    where
        D: embassy_usb::driver::Driver<'static>,
    {
        pub device: embassy_usb::UsbDevice<'static, D>,
        input: Option<HidWriter<'static, D, INPUT_REPORT_LEN>>,
    }

    impl<D> DeckUsb<D>
    where
        D: embassy_usb::driver::Driver<'static>,
    {
        /// Builds the composite device over the given driver.
        pub fn new(
            driver: D,
            storage: &'static mut UsbDeviceStorage,
            strings: UsbDeviceStrings,
        ) -> Self {
            let mut config = embassy_usb::Config::new(0x1209, 0x4B44);
            config.manufacturer = Some(strings.manufacturer);
            config.product = Some(strings.product);
            config.serial_number = strings.serial_number;
            config.max_packet_size_0 = MAX_PACKET_SIZE as u8;
            config.max_power = 100;
            config.supports_remote_wakeup = true;

            let mut builder = embassy_usb::Builder::new(
                driver,
                config,
                &mut storage.config_descriptor,
                &mut storage.bos_descriptor,
                &mut storage.msos_descriptor,
                &mut storage.control_buf,
            );

            builder.handler(&mut storage.device_handler);

            let input_config = hid::Config {
                report_descriptor: crate::hid::INPUT_REPORT_DESCRIPTOR,
                request_handler: None,
                poll_ms: 10,
                max_packet_size: MAX_PACKET_SIZE,
            };
            let input = HidWriter::new(&mut builder, &mut storage.input_state, input_config);

            let vendor_config = hid::Config {
                report_descriptor: crate::hid::VENDOR_REPORT_DESCRIPTOR,
                request_handler: Some(&mut storage.vendor_handler),
                poll_ms: 10,
                max_packet_size: MAX_PACKET_SIZE,
            };
            let _vendor: HidWriter<'static, D, VENDOR_REPORT_LEN> =
                HidWriter::new(&mut builder, &mut storage.vendor_state, vendor_config);

            let device = builder.build();

            Self {
                device,
                input: Some(input),
            }
        }

        /// Takes ownership of the input report writer.
        pub fn take_input(&mut self) -> Option<HidWriter<'static, D, INPUT_REPORT_LEN>> {
            self.input.take()
        }
    }
}

/// Host-side stub so `cargo test` builds without the Embassy USB stack.
#[cfg(not(target_os = "none"))]
pub struct UsbDeviceStorage;

#[cfg(not(target_os = "none"))]
impl UsbDeviceStorage {
    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Host-side stub representing the composite device.
#[cfg(not(target_os = "none"))]
pub struct DeckUsb<D> {
    pub device: (),
    _marker: core::marker::PhantomData<D>,
}

#[cfg(not(target_os = "none"))]
impl<D> DeckUsb<D> {
    pub fn new(_: D, _: &'static mut UsbDeviceStorage, _: UsbDeviceStrings) -> Self {
        Self {
            device: (),
            _marker: core::marker::PhantomData,
        }
    }

    pub fn take_input(&mut self) -> Option<()> {
        None
    }
}
