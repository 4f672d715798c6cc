// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::convert::Infallible;

use embassy_executor::Spawner;
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::Pin;
use esp_hal::timer::timg::TimerGroup;
#[allow(unused_imports)]
use log::{debug, error, info, warn};
use static_cell::StaticCell;

use relay::{Event, RelayConfig, RelayStats};
use wifi_serial_relay::errors::{Error, Result};
use wifi_serial_relay::espressif::{
    net::{accept_requests, if_up},
    serial::uart_up,
};
use wifi_serial_relay::lifecycle;

esp_bootloader_esp_idf::esp_app_desc!();

static CONFIG: StaticCell<RelayConfig> = StaticCell::new();
static STATS: RelayStats = RelayStats::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();

    match run(spawner).await {
        Ok(never) => match never {},
        Err(e) => panic!("relay failed to start: {e}"),
    }
}

async fn run(spawner: Spawner) -> Result<Infallible> {
    cfg_if::cfg_if!(
        if #[cfg(feature = "esp32s2")] {
            esp_alloc::heap_allocator!(size: 64 * 1024);
        } else {
            esp_alloc::heap_allocator!(size: 72 * 1024);
        }
    );

    // System init
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));
    let timg0 = TimerGroup::new(peripherals.TIMG0);

    cfg_if::cfg_if! {
        if #[cfg(any(feature = "esp32", feature = "esp32s2", feature = "esp32s3"))] {
            esp_rtos::start(timg0.timer0);
        } else {
            use esp_hal::interrupt::software::SoftwareInterruptControl;
            let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
            esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);
        }
    }

    lifecycle::advance(Event::Boot);

    let config = RelayConfig::new().map_err(|source| Error::Config { source })?;
    let config = &*CONFIG.init(config);
    info!(
        "Relaying TCP port {} to UART1 at {} baud, network `{}`",
        config.port, config.baud_rate, config.wifi_ssid
    );

    // Serial2's default TX pin on the ESP32; other chips use a free pin
    // that is not a strapping or USB pin.
    cfg_if::cfg_if!(
        if #[cfg(feature = "esp32c2")] {
            let tx_pin = peripherals.GPIO10.degrade();
        } else if #[cfg(feature = "esp32c3")] {
            let tx_pin = peripherals.GPIO21.degrade();
        } else if #[cfg(feature = "esp32c6")] {
            let tx_pin = peripherals.GPIO11.degrade();
        } else {
            let tx_pin = peripherals.GPIO17.degrade();
        }
    );
    let mut serial = uart_up(peripherals.UART1, tx_pin, config)?;

    // Bring up the network interface, blocks until joined and addressed.
    let stack = if_up(spawner, peripherals.WIFI, config).await?;

    accept_requests(stack, &mut serial, config, &STATS).await
}
