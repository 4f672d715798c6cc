#![cfg_attr(not(test), no_std)]
// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Target independent pieces of the WiFi to serial relay.
//!
//! Everything here builds for both the device and the host, so the relay
//! behaviour can be unit tested without hardware. The ESP32 glue lives in the
//! top level crate.

pub mod command;
pub mod config;
pub mod fmt;
pub mod pump;
pub mod retry;
pub mod settings;
pub mod state;

pub use config::{ConfigError, RelayConfig};
pub use pump::{RelayError, RelayStats, SessionEnd, StatsSnapshot, pump};
pub use retry::{RetryError, RetryPolicy, retry};
pub use state::{Event, State};
