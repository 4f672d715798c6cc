// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

use snafu::Snafu;

/// Failures that stop the relay from coming up at all.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("bad build time configuration: {source}"))]
    Config { source: relay::ConfigError },
    #[snafu(display("radio init failed: {kind:?}"))]
    Radio { kind: esp_radio::InitializationError },
    #[snafu(display("WiFi setup failed: {kind:?}"))]
    Wifi { kind: esp_radio::wifi::WifiError },
    #[snafu(display("UART setup failed: {kind:?}"))]
    Uart { kind: esp_hal::uart::ConfigError },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
