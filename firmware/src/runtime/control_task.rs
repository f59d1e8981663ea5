use embassy_time::{Duration, Instant, Timer};

use crank_core::time::Millis;

use super::{CrankController, Mailbox};
use crate::hw::CrankButton;
use crate::telemetry::TelemetryDrain;

/// Pause between iterations; the debounce scheduler absorbs any jitter.
const LOOP_IDLE: Duration = Duration::from_millis(1);

#[embassy_executor::task]
pub async fn run(
    mut controller: CrankController,
    button: CrankButton<'static>,
    remote: &'static Mailbox,
) -> ! {
    let mut drain = TelemetryDrain::new();

    controller.initialize(now());
    drain.drain(controller.telemetry());

    loop {
        let report = controller.tick(now(), button.is_active(), remote);
        if !report.is_quiet() {
            drain.drain(controller.telemetry());
        }

        Timer::after(LOOP_IDLE).await;
    }
}

/// Millisecond clock folded into the 32-bit wrapping domain of the core.
fn now() -> Millis {
    #[allow(clippy::cast_possible_truncation)]
    let raw = Instant::now().as_millis() as u32;
    Millis::from_raw(raw)
}
