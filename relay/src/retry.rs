// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

use core::fmt::Debug;

#[allow(unused_imports)]
use log::{debug, error, info, warn};
use snafu::Snafu;

use crate::settings::JOIN_RETRY_MS;

/// Fixed delay retry schedule. `max_attempts: None` never gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay_ms: u64,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const fn forever(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            max_attempts: None,
        }
    }

    pub const fn bounded(delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            delay_ms,
            max_attempts: Some(max_attempts),
        }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(JOIN_RETRY_MS)
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum RetryError<E: Debug> {
    #[snafu(display("gave up after {attempts} attempts, last error: {last:?}"))]
    Exhausted { attempts: u32, last: E },
}

/// Runs `attempt` until it succeeds, sleeping `policy.delay_ms` through
/// `pause` after every failure.
///
/// Returns the value together with the number of attempts it took.
pub async fn retry<T, E, A, P>(
    policy: &RetryPolicy,
    mut attempt: A,
    mut pause: P,
) -> Result<(T, u32), RetryError<E>>
where
    E: Debug,
    A: AsyncFnMut() -> Result<T, E>,
    P: AsyncFnMut(u64),
{
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        match attempt().await {
            Ok(v) => {
                debug!("succeeded after {attempts} attempt(s)");
                return Ok((v, attempts));
            }
            Err(e) if policy.exhausted(attempts) => {
                error!("attempt {attempts} failed, giving up: {e:?}");
                return ExhaustedSnafu { attempts, last: e }.fail();
            }
            Err(e) => {
                info!("attempt {attempts} failed ({e:?}), retrying in {} ms", policy.delay_ms);
                pause(policy.delay_ms).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use std::vec::Vec;

    #[test]
    fn unbounded_policy_keeps_trying_with_fixed_delay() {
        let mut tries = 0u32;
        let mut pauses = Vec::new();

        let res = block_on(retry(
            &RetryPolicy::forever(1000),
            async || {
                tries += 1;
                if tries < 25 { Err("no AP") } else { Ok("joined") }
            },
            async |ms| pauses.push(ms),
        ));

        assert_eq!(res, Ok(("joined", 25)));
        assert_eq!(pauses.len(), 24);
        assert!(pauses.iter().all(|&ms| ms == 1000));
    }

    #[test]
    fn first_try_success_never_pauses() {
        let mut pauses = 0;
        let res = block_on(retry(
            &RetryPolicy::default(),
            async || Ok::<_, ()>(7u8),
            async |_| pauses += 1,
        ));
        assert_eq!(res, Ok((7, 1)));
        assert_eq!(pauses, 0);
    }

    #[test]
    fn bounded_policy_reports_last_error() {
        let mut tries = 0u32;
        let mut pauses = 0;

        let res: Result<((), u32), _> = block_on(retry(
            &RetryPolicy::bounded(10, 3),
            async || {
                tries += 1;
                Err(tries)
            },
            async |_| pauses += 1,
        ));

        assert_eq!(
            res,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: 3
            })
        );
        // no pause after the final failure
        assert_eq!(pauses, 2);
    }

    #[test]
    fn default_policy_matches_join_settings() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_ms, JOIN_RETRY_MS);
        assert_eq!(p.max_attempts, None);
    }
}
