// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

use heapless::String;
use snafu::{Snafu, ensure};

use crate::retry::RetryPolicy;
use crate::settings::{DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_SSID, JOIN_RETRY_MS, MAX_BAUD_RATE};

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[snafu(display("WiFi SSID must not be empty"))]
    EmptySsid,
    #[snafu(display("WiFi SSID is {len} bytes, at most 32 allowed"))]
    SsidTooLong { len: usize },
    #[snafu(display("WPA2 passphrase is {len} bytes, expected 8 to 63"))]
    PassphraseLength { len: usize },
    #[snafu(display("{field} is not a decimal number"))]
    NotANumber { field: &'static str },
    #[snafu(display("TCP port 0 can not be listened on"))]
    ZeroPort,
    #[snafu(display("baud rate {baud} outside 1..=5000000"))]
    BaudRate { baud: u32 },
}

pub type Result<T, E = ConfigError> = core::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// WiFi SSID
    pub wifi_ssid: String<32>,
    /// WPA2 passphrase. None is Open network.
    pub wifi_pw: Option<String<63>>,
    /// TCP port the relay listens on
    pub port: u16,
    pub baud_rate: u32,
    pub join_retry: RetryPolicy,
}

impl RelayConfig {
    /// Builds the config baked in at compile time.
    ///
    /// `WIFI_SSID`, `WIFI_PW`, `RELAY_PORT` and `RELAY_BAUD` are read from the
    /// build environment, anything unset falls back to [`crate::settings`].
    pub fn new() -> Result<Self> {
        Self::from_values(
            option_env!("WIFI_SSID").unwrap_or(DEFAULT_SSID),
            option_env!("WIFI_PW"),
            option_env!("RELAY_PORT"),
            option_env!("RELAY_BAUD"),
        )
    }

    pub fn from_values(
        ssid: &str,
        pw: Option<&str>,
        port: Option<&str>,
        baud: Option<&str>,
    ) -> Result<Self> {
        ensure!(!ssid.is_empty(), EmptySsidSnafu);
        let wifi_ssid =
            String::try_from(ssid).map_err(|_| ConfigError::SsidTooLong { len: ssid.len() })?;

        // An empty WIFI_PW is treated as unset
        let wifi_pw = match pw.filter(|p| !p.is_empty()) {
            Some(p) => {
                ensure!((8..=63).contains(&p.len()), PassphraseLengthSnafu { len: p.len() });
                let pw = String::try_from(p)
                    .map_err(|_| ConfigError::PassphraseLength { len: p.len() })?;
                Some(pw)
            }
            None => None,
        };

        let port = match port {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::NotANumber { field: "RELAY_PORT" })?,
            None => DEFAULT_PORT,
        };

        let baud_rate = match baud {
            Some(b) => b
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::NotANumber { field: "RELAY_BAUD" })?,
            None => DEFAULT_BAUD_RATE,
        };

        let config = RelayConfig {
            wifi_ssid,
            wifi_pw,
            port,
            baud_rate,
            join_retry: RetryPolicy::forever(JOIN_RETRY_MS),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.wifi_ssid.is_empty(), EmptySsidSnafu);
        if let Some(ref pw) = self.wifi_pw {
            ensure!(pw.len() >= 8, PassphraseLengthSnafu { len: pw.len() });
        }
        ensure!(self.port != 0, ZeroPortSnafu);
        ensure!(
            (1..=MAX_BAUD_RATE).contains(&self.baud_rate),
            BaudRateSnafu {
                baud: self.baud_rate
            }
        );
        Ok(())
    }

    /// True when the network needs no passphrase.
    pub fn is_open_network(&self) -> bool {
        self.wifi_pw.is_none()
    }
}
