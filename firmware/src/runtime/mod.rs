use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::time::Hertz;

use controller_core::power::sampler::DeviceCheck;
use controller_core::power::{BatteryGauge, LIPO, PowerSampler};
use controller_core::sequencer::PowerSequencer;

use crate::hw;
use crate::hw::ina3221::Ina3221;
use crate::hw::rail::{RailDriver, UsbHostLink};
use crate::shared;

mod power_task;
mod radio_task;
mod system_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

fn spawn_failure(task: &str) -> ! {
    defmt::error!("boot: failed to spawn {} task, restarting", task);
    hw::sleep::restart()
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA3,
        PA4,
        PA8,
        PA11,
        PA12,
        PB6,
        PB7,
        I2C1,
        USART2,
        USB,
        EXTI0,
        EXTI1,
        ..
    } = hal::init(config);

    shared::activity_init(hw::FirmwareInstant::now());

    let i2c = I2c::new_blocking(I2C1, PB6, PB7, Hertz(100_000), hal::i2c::Config::default());
    let mut sampler = PowerSampler::new(Ina3221::new(i2c), BatteryGauge::new(&LIPO));
    match sampler.verify_device() {
        Ok(DeviceCheck::Verified) => defmt::info!("power: sense device verified"),
        Ok(DeviceCheck::Mismatch(id)) => {
            defmt::warn!("power: unexpected sense device id {=u16:#x}", id);
        }
        Err(_) => {
            // No monitor on the bus means no admission checks and no
            // telemetry; that is not a state worth limping through.
            defmt::error!("power: sense device absent, restarting");
            hw::sleep::restart();
        }
    }

    let rail = RailDriver::new(Output::new(PA4, Level::Low, Speed::Low));
    let sequencer = PowerSequencer::new(rail, UsbHostLink);

    let button = ExtiInput::new(PA0, EXTI0, Pull::Up);
    let charger_detect = ExtiInput::new(PA1, EXTI1, Pull::Up);
    let radio_state = Input::new(PA8, Pull::Down);

    // Waking with the button held boots straight into a power-on request.
    if button.is_low() {
        defmt::info!("boot: power button held, requesting SBC power-on");
        let _ = shared::POWER_COMMANDS.try_send(shared::PowerCommand::On);
    }

    if spawner.spawn(power_task::run(sampler, sequencer)).is_err() {
        spawn_failure("power");
    }
    if spawner.spawn(usb_task::run(USB, PA12, PA11)).is_err() {
        spawn_failure("usb");
    }
    if spawner.spawn(radio_task::run(USART2, PA2, PA3)).is_err() {
        spawn_failure("radio");
    }
    if spawner
        .spawn(system_task::run(button, charger_detect, radio_state))
        .is_err()
    {
        spawn_failure("system");
    }

    defmt::info!("boot: all tasks running");
    core::future::pending::<()>().await;
}
