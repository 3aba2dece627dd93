use controller_core::PowerController;

use crate::hw::{EspClock, EspPower, EspTransport, EspWifiLink, RtcCursor, TriggerPin};
use crate::telemetry::FirmwareTelemetry;

pub type BenchController =
    PowerController<'static, RtcCursor, EspClock, TriggerPin, EspWifiLink, EspTransport, EspPower>;

#[embassy_executor::task]
pub async fn run(controller: BenchController, mut telemetry: FirmwareTelemetry) -> ! {
    controller.run(&mut telemetry).await
}
