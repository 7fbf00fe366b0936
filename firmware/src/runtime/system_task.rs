//! Button handling, status aggregation, and the sleep watchdog.

use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Ticker, Timer};

use controller_core::activity::{Blockers, SleepVerdict};
use controller_core::status::{ConnectionSnapshot, StatusTracker};

use crate::hw::button::{ButtonTracker, PressKind};
use crate::hw::{self, FirmwareInstant};
use crate::shared::{self, PowerCommand};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Watchdog evaluations run once per second, every tenth tick.
const WATCHDOG_DIVIDER: u32 = 10;

#[embassy_executor::task]
pub async fn run(
    mut button: ExtiInput<'static>,
    mut charger_detect: ExtiInput<'static>,
    radio_state: Input<'static>,
) -> ! {
    let mut ticker = Ticker::every(TICK_INTERVAL);
    let mut tracker = ButtonTracker::new();
    let mut status: StatusTracker<FirmwareInstant> = StatusTracker::new();
    let mut ticks = 0u32;

    loop {
        let now = FirmwareInstant::now();

        // Button is active low.
        if let Some(kind) = tracker.update(button.is_low(), now.as_millis()) {
            shared::note_activity(now);
            let command = match kind {
                PressKind::Toggle => {
                    if shared::sequencer_state().is_powered() {
                        defmt::info!("button: short press, SBC off");
                        PowerCommand::Off
                    } else {
                        defmt::info!("button: short press, SBC on");
                        PowerCommand::On
                    }
                }
                PressKind::ForceOff => {
                    defmt::info!("button: long press, hard off");
                    PowerCommand::ForceOff
                }
            };
            let _ = shared::POWER_COMMANDS.try_send(command);
        }

        shared::set_radio_connected(radio_state.is_high());

        let snapshot = shared::read_snapshot();
        while let Ok(event) = shared::STATUS_EVENTS.try_receive() {
            status.apply(event, now);
        }
        status.observe(
            ConnectionSnapshot {
                radio_connected: shared::radio_connected(),
                hid_connected: shared::usb_configured(),
                charging: snapshot.charger.connected,
                low_power: snapshot.power_saving,
            },
            now,
        );
        shared::publish_status(status.current(now));

        ticks += 1;
        if ticks >= WATCHDOG_DIVIDER {
            ticks = 0;

            let blockers = Blockers {
                sbc_powered: shared::sequencer_state().is_powered(),
                session_active: shared::radio_connected() || shared::usb_configured(),
                charger_connected: snapshot.charger.connected,
            };
            let verdict = shared::with_activity(|monitor| monitor.evaluate(blockers, now));
            if verdict == Some(SleepVerdict::SleepRequested)
                && shared::with_activity(controller_core::activity::ActivityMonitor::take_sleep_request)
                    .unwrap_or(false)
            {
                defmt::info!("sleep: idle watchdog expired");
                // Give the transports a moment to flush queued replies
                // before the links go quiet.
                Timer::after_millis(100).await;
                hw::sleep::suspend(&mut button, &mut charger_detect).await;
            }
        }

        ticker.next().await;
    }
}
