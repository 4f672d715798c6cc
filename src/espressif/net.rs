// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

use alloc::string::String;

use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpListenEndpoint, Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;

use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::wifi::{
    AuthMethod, ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState,
};

#[allow(unused_imports)]
use log::{debug, error, info, warn};

use relay::fmt::Mac;
use relay::settings::{RELAY_CHUNK, SOCKET_BUF_SZ};
use relay::{Event, RelayConfig, RelayStats, State, pump, retry};

use crate::errors::{Error, Result};
use crate::lifecycle;

// When you are okay with using a nightly compiler it's better to use https://docs.rs/static_cell/2.1.0/static_cell/macro.make_static.html
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

/// Joins the configured network as a station and waits for a DHCP lease.
///
/// Only returns once the interface has an IPv4 address. Joining is retried
/// forever in the background `wifi_up` task, which also rejoins whenever
/// the access point drops us.
pub async fn if_up(
    spawner: Spawner,
    wifi: WIFI<'static>,
    config: &'static RelayConfig,
) -> Result<Stack<'static>> {
    let radio = esp_radio::init().map_err(|kind| Error::Radio { kind })?;
    let radio = &*mk_static!(esp_radio::Controller<'static>, radio);
    let (controller, interfaces) =
        esp_radio::wifi::new(radio, wifi, Default::default()).map_err(|kind| Error::Wifi { kind })?;

    let sta = interfaces.sta;
    let mac = sta.mac_address();

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, runner) = embassy_net::new(
        sta,
        embassy_net::Config::dhcpv4(Default::default()),
        mk_static!(StackResources<3>, StackResources::<3>::new()),
        seed,
    );

    if spawner.spawn(wifi_up(controller, config)).is_err() {
        error!("could not spawn wifi_up task");
    }
    if spawner.spawn(net_up(runner)).is_err() {
        error!("could not spawn net_up task");
    }

    info!("Waiting for a DHCP lease on `{}`...", config.wifi_ssid);
    stack.wait_config_up().await;

    info!("Connected to the WiFi network");
    if let Some(v4) = stack.config_v4() {
        info!("IP address: {}", v4.address.address());
    }
    info!("MAC Address: {}", Mac(&mac));

    Ok(stack)
}

/// Serves one client at a time on `config.port`, relaying its bytes to `serial`.
///
/// A second client is not accepted until the current one has gone away.
pub async fn accept_requests<W: Write>(
    stack: Stack<'static>,
    serial: &mut W,
    config: &RelayConfig,
    stats: &RelayStats,
) -> ! {
    let rx_buffer = mk_static!([u8; SOCKET_BUF_SZ], [0; SOCKET_BUF_SZ]);
    let tx_buffer = mk_static!([u8; SOCKET_BUF_SZ], [0; SOCKET_BUF_SZ]);
    let mut relay_buf = [0u8; RELAY_CHUNK];

    loop {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);

        if let State::Joining { attempt } = lifecycle::advance(Event::ListenReady) {
            debug!("listening while WiFi rejoins, attempt {attempt}");
        }
        info!("Waiting for client on port {}...", config.port);

        if let Err(e) = socket
            .accept(IpListenEndpoint {
                addr: None,
                port: config.port,
            })
            .await
        {
            warn!("accept error: {:?}", e);
            continue;
        }

        lifecycle::advance(Event::Accepted);
        info!("Client connected from {:?}", socket.remote_endpoint());

        match pump(&mut socket, serial, &mut relay_buf, stats).await {
            Ok(end) => debug!("session finished: {end:?}"),
            Err(e) => warn!("session aborted: {e}"),
        }

        socket.close();
        let _ = socket.flush().await;
        socket.abort();
        lifecycle::advance(Event::Closed);

        let s = stats.snapshot();
        info!(
            "Client disconnected ({} sessions, {} bytes relayed, {} serial errors)",
            s.sessions, s.bytes_out, s.serial_errors
        );
    }
}

#[embassy_executor::task]
async fn wifi_up(mut controller: WifiController<'static>, config: &'static RelayConfig) {
    info!("Device capabilities: {:?}", controller.capabilities());

    let client_config = match config.wifi_pw {
        Some(ref pw) => ClientConfig::default()
            .with_ssid(String::from(config.wifi_ssid.as_str()))
            .with_password(String::from(pw.as_str())),
        None => ClientConfig::default()
            .with_ssid(String::from(config.wifi_ssid.as_str()))
            .with_auth_method(AuthMethod::None),
    };
    let pause = Duration::from_millis(config.join_retry.delay_ms);

    loop {
        if esp_radio::wifi::sta_state() == WifiStaState::Connected {
            // wait until we're no longer connected
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("WiFi link lost, rejoining");
            lifecycle::advance(Event::LinkLost);
            Timer::after(pause).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            if let Err(e) = controller.set_config(&ModeConfig::Client(client_config.clone())) {
                error!("WiFi config rejected: {e:?}");
                Timer::after(pause).await;
                continue;
            }
            info!("Starting wifi");
            if let Err(e) = controller.start_async().await {
                error!("WiFi start failed: {e:?}");
                Timer::after(pause).await;
                continue;
            }
            info!("Wifi started!");
        }

        lifecycle::rejoining();
        let joined = retry(
            &config.join_retry,
            async || {
                info!("Connecting to WiFi..");
                let res = controller.connect_async().await;
                if res.is_err() {
                    lifecycle::advance(Event::JoinFailed);
                }
                res
            },
            async |ms| Timer::after_millis(ms).await,
        )
        .await;

        match joined {
            Ok((_, attempts)) => {
                info!("Joined `{}` after {attempts} attempt(s)", config.wifi_ssid);
                lifecycle::advance(Event::Joined);
            }
            Err(e) => {
                error!("{e}");
                Timer::after(pause).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn net_up(mut runner: Runner<'static, WifiDevice<'static>>) {
    info!("Bringing up network stack...");
    runner.run().await
}
