// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

// Static settings

// Network settings
pub const DEFAULT_SSID: &str = "robotat";
pub const DEFAULT_PORT: u16 = 9090;
/// Delay between WiFi join attempts.
pub const JOIN_RETRY_MS: u64 = 1000;

// UART settings
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const MAX_BAUD_RATE: u32 = 5_000_000;

/// Bytes moved from the socket to the UART per read.
pub const RELAY_CHUNK: usize = 64;
/// TCP socket buffer sizes.
pub const SOCKET_BUF_SZ: usize = 1536;
