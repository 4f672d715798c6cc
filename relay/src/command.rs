// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wheel velocity frames understood by the robot on the far side of the relay.
//!
//! The relay itself never looks at these bytes. They are produced on the host
//! and pass through the TCP socket and UART untouched, so the robot sees
//! exactly what the host encoded here.
//!
//! A frame is a CBOR array of two single precision floats, left then right
//! wheel speed in rpm:
//!
//! ```text
//! 0x82 | 0xFA <left f32 BE> | 0xFA <right f32 BE>
//! ```

use core::net::Ipv4Addr;

use snafu::{Snafu, ensure};

pub use crate::settings::DEFAULT_PORT;

pub const MAX_RPM: f32 = 400.0;
pub const MIN_RPM: f32 = -400.0;
pub const FRAME_LEN: usize = 11;
/// Highest agent id on the lab network.
pub const MAX_AGENT_ID: u8 = 19;

const CBOR_ARRAY_2: u8 = 0x82;
const CBOR_FLOAT32: u8 = 0xfa;

#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[snafu(display("invalid agent id {id}, allowed ids are 0 to 19"))]
    AgentId { id: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    pub left_rpm: f32,
    pub right_rpm: f32,
}

/// Which wheels had to be clamped into range.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Saturation {
    pub left: bool,
    pub right: bool,
}

impl Saturation {
    pub fn any(&self) -> bool {
        self.left || self.right
    }
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand::new(0.0, 0.0);

    pub const fn new(left_rpm: f32, right_rpm: f32) -> Self {
        Self { left_rpm, right_rpm }
    }

    /// Builds a command with both wheels clamped to [`MIN_RPM`]..=[`MAX_RPM`].
    pub fn saturated(left_rpm: f32, right_rpm: f32) -> (Self, Saturation) {
        let (left_rpm, left) = clamp_rpm(left_rpm);
        let (right_rpm, right) = clamp_rpm(right_rpm);
        (Self { left_rpm, right_rpm }, Saturation { left, right })
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = CBOR_ARRAY_2;
        frame[1] = CBOR_FLOAT32;
        frame[2..6].copy_from_slice(&self.left_rpm.to_be_bytes());
        frame[6] = CBOR_FLOAT32;
        frame[7..11].copy_from_slice(&self.right_rpm.to_be_bytes());
        frame
    }
}

fn clamp_rpm(rpm: f32) -> (f32, bool) {
    if rpm > MAX_RPM {
        (MAX_RPM, true)
    } else if rpm < MIN_RPM {
        (MIN_RPM, true)
    } else {
        (rpm, false)
    }
}

/// Address of a robot on the lab network: agent `n` lives at `192.168.50.(100 + n)`.
pub fn agent_address(id: u8) -> Result<Ipv4Addr, CommandError> {
    ensure!(id <= MAX_AGENT_ID, AgentIdSnafu { id });
    Ok(Ipv4Addr::new(192, 168, 50, 100 + id))
}
