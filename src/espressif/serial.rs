// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

use esp_hal::Async;
use esp_hal::gpio::AnyPin;
use esp_hal::peripherals::UART1;
use esp_hal::uart::{Config, UartTx};
#[allow(unused_imports)]
use log::{debug, error, info, warn};

use relay::RelayConfig;

use crate::errors::{Error, Result};

/// Brings up the relay's serial line, transmit only.
///
/// UART1 is used as it is typically not wired to the dev board's TTL2USB IC
/// nor the builtin JTAG, which keeps the debug console free for logging.
pub fn uart_up(
    uart1: UART1<'static>,
    tx_pin: AnyPin<'static>,
    config: &RelayConfig,
) -> Result<UartTx<'static, Async>> {
    let uart_config = Config::default().with_baudrate(config.baud_rate);

    let tx = UartTx::new(uart1, uart_config)
        .map_err(|kind| Error::Uart { kind })?
        .with_tx(tx_pin)
        .into_async();

    info!("Relay UART up at {} baud, 8N1", config.baud_rate);
    Ok(tx)
}
