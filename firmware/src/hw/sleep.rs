//! Deep-sleep entry and the fatal-restart escape hatch.
//!
//! Suspension is irreversible until wake: exactly the power button and the
//! charger detect line stay armed as wake sources, everything else is
//! silent, and wake is handled as a fresh boot rather than a resume. A
//! partial suspend configuration could wake unpredictably or never, so any
//! failure on the way down restarts the controller instead.

use embassy_futures::select::select;
use embassy_stm32::exti::ExtiInput;

/// Restarts the whole controller.
pub fn restart() -> ! {
    cortex_m::peripheral::SCB::sys_reset()
}

/// Commits to deep sleep with the two wake lines armed. Never returns: a
/// wake edge restarts the controller.
pub async fn suspend(button: &mut ExtiInput<'static>, charger_detect: &mut ExtiInput<'static>) -> ! {
    defmt::info!("sleep: entering deep sleep");

    // The executor idles in WFI; with SLEEPDEEP set the next idle drops the
    // core into its deep-sleep state until one of the armed lines fires.
    // All peripherals this task owns are quiesced by construction here.
    let mut peripherals = unsafe { cortex_m::Peripherals::steal() };
    peripherals.SCB.set_sleepdeep();

    select(
        button.wait_for_falling_edge(),
        charger_detect.wait_for_falling_edge(),
    )
    .await;

    // Wake is a cold boot, never a resume into stale task state.
    defmt::info!("sleep: wake edge, restarting");
    restart()
}
