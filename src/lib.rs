#![no_std]
#![forbid(unsafe_code)]
// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

extern crate alloc;

pub mod errors;
pub mod espressif;
pub mod lifecycle;
