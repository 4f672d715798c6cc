// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process wide relay state, shared by the WiFi task and the accept loop.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[allow(unused_imports)]
use log::{debug, error, info, warn};
use relay::{Event, State};

static STATE: Mutex<CriticalSectionRawMutex, Cell<State>> =
    Mutex::new(Cell::new(State::PowerOn));

/// Feeds `event` into the state machine and returns the resulting state.
///
/// Rejected events are logged and leave the state as it was.
pub fn advance(event: Event) -> State {
    STATE.lock(|s| {
        let from = s.get();
        match from.next(event) {
            Ok(to) => {
                if to != from {
                    info!("{from:?} -> {to:?}");
                }
                s.set(to);
                to
            }
            Err(e) => {
                warn!("{e}");
                from
            }
        }
    })
}

/// Called before every join attempt, so a link that dropped unnoticed is
/// still recorded as lost.
pub fn rejoining() -> State {
    let current = STATE.lock(|s| s.get());
    match current.before_join() {
        Some(event) => {
            warn!("WiFi link down without a disconnect event");
            advance(event)
        }
        None => current,
    }
}
