// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

// Lifecycle of the relay, from power on to serving one client at a time.
//
// Only "big" transitions are tracked, never per-byte activity. An unexpected
// (state, event) pair is reported back instead of being silently absorbed.

use snafu::Snafu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    PowerOn,
    Joining { attempt: u32 },
    Online,
    Listening,
    ClientConnected,
    ClientDisconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Boot,
    JoinFailed,
    Joined,
    LinkLost,
    ListenReady,
    Accepted,
    Closed,
}

#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[snafu(display("no transition from {from:?} on {event:?}"))]
pub struct InvalidTransition {
    pub from: State,
    pub event: Event,
}

impl State {
    pub fn next(self, event: Event) -> Result<State, InvalidTransition> {
        Ok(match (self, event) {
            (State::PowerOn, Event::Boot) => State::Joining { attempt: 1 },
            (State::Joining { attempt }, Event::JoinFailed) => State::Joining {
                attempt: attempt.saturating_add(1),
            },
            (State::Joining { .. }, Event::Joined) => State::Online,
            (State::Online, Event::ListenReady) => State::Listening,
            (State::Listening, Event::ListenReady) => State::Listening,
            (State::Listening, Event::Accepted) => State::ClientConnected,
            // The listener outlives a rejoin, so a client may show up straight away
            (State::Online, Event::Accepted) => State::ClientConnected,
            (State::ClientConnected, Event::Closed) => State::ClientDisconnected,
            (State::ClientDisconnected, Event::ListenReady) => State::Listening,
            // Losing the link drops whatever we were doing and rejoins
            (
                State::Online
                | State::Listening
                | State::ClientConnected
                | State::ClientDisconnected,
                Event::LinkLost,
            ) => State::Joining { attempt: 1 },
            // Socket activity while the link is down or just back does not move the link state
            (s @ (State::Joining { .. } | State::Online), Event::Closed | Event::ListenReady) => s,
            (from, event) => return Err(InvalidTransition { from, event }),
        })
    }

    /// Event to feed before a fresh join attempt.
    ///
    /// A link that went down without a `StaDisconnected` being observed still
    /// has to pass through `LinkLost`, otherwise `Joined` would be rejected.
    pub fn before_join(&self) -> Option<Event> {
        match self {
            State::PowerOn | State::Joining { .. } => None,
            _ => Some(Event::LinkLost),
        }
    }

    /// Whether a client is currently being served.
    pub fn is_serving(&self) -> bool {
        matches!(self, State::ClientConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(events: &[Event]) -> Result<State, InvalidTransition> {
        events.iter().try_fold(State::PowerOn, |s, e| s.next(*e))
    }

    #[test]
    fn boot_to_serving_two_clients_in_turn() {
        let s = drive(&[
            Event::Boot,
            Event::JoinFailed,
            Event::JoinFailed,
            Event::Joined,
            Event::ListenReady,
            Event::Accepted,
        ])
        .unwrap();
        assert!(s.is_serving());

        let s = s.next(Event::Closed).unwrap();
        assert_eq!(s, State::ClientDisconnected);
        let s = s.next(Event::ListenReady).unwrap().next(Event::Accepted).unwrap();
        assert!(s.is_serving());
    }

    #[test]
    fn join_attempts_are_counted() {
        let s = drive(&[Event::Boot, Event::JoinFailed, Event::JoinFailed]).unwrap();
        assert_eq!(s, State::Joining { attempt: 3 });
    }

    #[test]
    fn second_client_can_not_be_accepted_while_serving() {
        let s = drive(&[Event::Boot, Event::Joined, Event::ListenReady, Event::Accepted]).unwrap();
        assert_eq!(
            s.next(Event::Accepted),
            Err(InvalidTransition {
                from: State::ClientConnected,
                event: Event::Accepted
            })
        );
    }

    #[test]
    fn link_loss_goes_back_to_joining() {
        let s = drive(&[Event::Boot, Event::Joined, Event::ListenReady, Event::Accepted]).unwrap();
        assert_eq!(s.next(Event::LinkLost), Ok(State::Joining { attempt: 1 }));
    }

    #[test]
    fn session_torn_down_by_link_loss_keeps_joining_state() {
        let s = drive(&[
            Event::Boot,
            Event::Joined,
            Event::ListenReady,
            Event::Accepted,
            Event::LinkLost,
            Event::JoinFailed,
            Event::Closed,
            Event::ListenReady,
        ])
        .unwrap();
        assert_eq!(s, State::Joining { attempt: 2 });

        let s = s.next(Event::Joined).unwrap();
        assert_eq!(s, State::Online);
        assert_eq!(s.next(Event::Accepted), Ok(State::ClientConnected));
    }

    #[test]
    fn rejoin_without_observed_disconnect_passes_through_link_lost() {
        let s = drive(&[Event::Boot, Event::Joined, Event::ListenReady]).unwrap();
        let ev = s.before_join().unwrap();
        assert_eq!(ev, Event::LinkLost);

        let s = s.next(ev).unwrap();
        assert_eq!(s.before_join(), None);
        assert_eq!(s.next(Event::Joined), Ok(State::Online));
    }

    #[test]
    fn first_join_needs_no_extra_event() {
        let s = drive(&[Event::Boot, Event::JoinFailed]).unwrap();
        assert_eq!(s.before_join(), None);
        assert!(State::Online.next(Event::Joined).is_err());
    }

    #[test]
    fn nothing_happens_before_boot() {
        assert!(State::PowerOn.next(Event::Accepted).is_err());
        assert!(State::PowerOn.next(Event::Joined).is_err());
    }
}
