//! Telemetry sampling and power sequencing task.
//!
//! One loop owns both: samples publish on a slow cadence while the
//! sequencer polls faster so handshake acknowledgements are seen promptly.
//! The handshake itself never blocks the loop; it is a state machine
//! advanced once per tick with a cooperative delay in between.

use embassy_time::{Duration, Ticker};

use controller_core::power::PowerSampler;
use controller_core::sequencer::{PowerSequencer, SequenceOutcome};
use controller_core::status::{DeviceStatus, StatusEvent};

use crate::hw::FirmwareInstant;
use crate::hw::ina3221::Ina3221;
use crate::hw::rail::{RailDriver, UsbHostLink};
use crate::shared::{self, PowerCommand};

const SEQUENCER_POLL_INTERVAL: Duration = Duration::from_millis(250);
const SAMPLE_INTERVAL: Duration = Duration::from_millis(1_500);

type Sequencer = PowerSequencer<RailDriver, UsbHostLink, FirmwareInstant>;

#[embassy_executor::task]
pub async fn run(mut sampler: PowerSampler<Ina3221>, mut sequencer: Sequencer) -> ! {
    let mut ticker = Ticker::every(SEQUENCER_POLL_INTERVAL);
    let mut last_sample: Option<embassy_time::Instant> = None;

    loop {
        let now = FirmwareInstant::now();

        let due = last_sample
            .is_none_or(|previous| embassy_time::Instant::now() - previous >= SAMPLE_INTERVAL);
        if due {
            let snapshot = sampler.sample(now.as_millis());
            shared::publish_snapshot(snapshot);
            last_sample = Some(embassy_time::Instant::now());
        }

        let snapshot = shared::read_snapshot();

        while let Ok(command) = shared::POWER_COMMANDS.try_receive() {
            match command {
                PowerCommand::On => {
                    match sequencer.request_on(snapshot.battery.percentage, now) {
                        Ok(()) => defmt::info!("power: SBC rail up, waiting for host"),
                        Err(_) => defmt::warn!("power: power-on denied at admission"),
                    }
                }
                PowerCommand::Off => match sequencer.request_off(now) {
                    controller_core::sequencer::OffRequest::Started => {
                        defmt::info!("power: graceful shutdown requested");
                    }
                    controller_core::sequencer::OffRequest::AlreadyOff => {
                        defmt::info!("power: SBC already off");
                    }
                    controller_core::sequencer::OffRequest::Busy => {
                        defmt::warn!("power: off request ignored mid-transition");
                    }
                },
                PowerCommand::ForceOff => {
                    defmt::warn!("power: forcing SBC rail off");
                    sequencer.force_off();
                    let _ = shared::STATUS_EVENTS
                        .try_send(StatusEvent::transient(DeviceStatus::PowerOff));
                }
            }
        }

        if let Some(outcome) = sequencer.poll(now) {
            let event = match outcome {
                SequenceOutcome::PoweredOn => {
                    defmt::info!("power: host acknowledged power-on");
                    StatusEvent::transient(DeviceStatus::PowerOn)
                }
                SequenceOutcome::PowerOnTimedOut => {
                    defmt::warn!("power: host never enumerated, rail reversed");
                    StatusEvent::transient(DeviceStatus::PowerOff)
                }
                SequenceOutcome::PoweredOff { host_acked } => {
                    if host_acked {
                        defmt::info!("power: host released the link, rail down");
                    } else {
                        defmt::warn!("power: shutdown handshake timed out, rail forced down");
                    }
                    StatusEvent::transient(DeviceStatus::PowerOff)
                }
            };
            let _ = shared::STATUS_EVENTS.try_send(event);
        }

        // Telemetry veto: an empty pack must not keep the rail up, and a
        // rail left high outside a transition gets pulled back in line.
        let allowed = sequencer.state().is_powered() && snapshot.battery.percentage > 0.0;
        if sequencer.reconcile(allowed) {
            defmt::warn!("power: rail state disagreed with telemetry, forced off");
            let _ = shared::STATUS_EVENTS.try_send(StatusEvent::transient(DeviceStatus::PowerOff));
        }

        shared::set_sequencer_state(sequencer.state());
        ticker.next().await;
    }
}
