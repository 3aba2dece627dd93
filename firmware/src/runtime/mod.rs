use controller_core::{Board, PowerController, sequence::ALL_STATES};
use defmt::Debug2Format;
use embassy_executor::Spawner;
use embassy_net::StackResources;
use esp_backtrace as _;
use esp_hal::{
    clock::CpuClock,
    gpio::{Level, Output, OutputConfig},
    rng::Rng,
    rtc_cntl::{Rtc, reset_reason, wakeup_cause},
    system::Cpu,
    timer::timg::TimerGroup,
};
use esp_println as _;
use static_cell::StaticCell;

use crate::hw::{
    self, EspClock, EspPower, EspTransport, EspWifiLink, RtcCell, SOCKET_BUFFER, TriggerPin,
};
use crate::settings::BuildOverrides;
use crate::telemetry::FirmwareTelemetry;

mod bench_task;
mod net_task;

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<2>> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; SOCKET_BUFFER]> = StaticCell::new();
static TX_BUFFER: StaticCell<[u8; SOCKET_BUFFER]> = StaticCell::new();

#[esp_rtos::main]
pub async fn main(spawner: Spawner) -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let reset = reset_reason(Cpu::ProCpu);
    defmt::info!(
        "reset reason {}, wakeup cause {}",
        Debug2Format(&reset),
        Debug2Format(&wakeup_cause())
    );

    let config = BuildOverrides::from_build_env()
        .resolve()
        .expect("invalid BENCH_* build settings");
    defmt::info!(
        "download peer {}, upload peer {}, restart policy {}, trigger GPIO21",
        defmt::Display2Format(&config.download_peer),
        defmt::Display2Format(&config.upload_peer),
        defmt::Display2Format(&config.restart_policy)
    );
    for state in ALL_STATES {
        defmt::debug!("{} -> {}", state.tag(), state.phase_label());
    }

    let cursor = hw::boot_cursor(RtcCell::claim().expect("cursor claimed twice"), reset);
    let trigger = TriggerPin::new(Output::new(
        peripherals.GPIO21,
        Level::Low,
        OutputConfig::default(),
    ));

    let radio = RADIO.init(esp_radio::init().expect("radio init"));
    let (wifi, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, esp_radio::wifi::Config::default())
            .expect("wifi init");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    let transport = EspTransport::new(
        stack,
        RX_BUFFER.init([0; SOCKET_BUFFER]),
        TX_BUFFER.init([0; SOCKET_BUFFER]),
    );
    let board = Board::new(
        EspClock,
        trigger,
        EspWifiLink::new(wifi, stack),
        transport,
        EspPower::new(Rtc::new(peripherals.LPWR)),
    );
    let controller = PowerController::new(config, cursor, board);

    spawner
        .spawn(net_task::run(runner))
        .expect("failed to spawn network task");
    spawner
        .spawn(bench_task::run(controller, FirmwareTelemetry::new()))
        .expect("failed to spawn benchmark task");

    loop {
        core::future::pending::<()>().await;
    }
}
