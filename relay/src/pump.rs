// SPDX-FileCopyrightText: 2025 Roman Valls, 2025
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! One way byte relay from a connected TCP client to the serial line.

use embedded_io_async::{Error as _, ErrorKind, Read, Write};
#[allow(unused_imports)]
use log::{debug, error, info, warn};
use portable_atomic::{AtomicUsize, Ordering};
use snafu::Snafu;

#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    #[snafu(display("relay buffer must not be empty"))]
    EmptyBuffer,
    #[snafu(display("client socket error: {kind:?}"))]
    Network { kind: ErrorKind },
}

/// How a relay session finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side of the connection.
    ClientClosed,
}

/// Counters shared between the relay loop and whoever reports on it.
pub struct RelayStats {
    sessions: AtomicUsize,
    bytes_in: AtomicUsize,
    bytes_out: AtomicUsize,
    serial_errors: AtomicUsize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sessions: usize,
    pub bytes_in: usize,
    pub bytes_out: usize,
    pub serial_errors: usize,
}

impl RelayStats {
    pub const fn new() -> Self {
        Self {
            sessions: AtomicUsize::new(0),
            bytes_in: AtomicUsize::new(0),
            bytes_out: AtomicUsize::new(0),
            serial_errors: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions: self.sessions.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            serial_errors: self.serial_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicUsize, n: usize) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
            Some(c.saturating_add(n))
        });
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards everything read from `client` to `serial` until the client goes away.
///
/// Each chunk is written out completely before the next read, so bytes
/// reach the serial line in the order they arrived. A failed serial write
/// drops whatever is left of that chunk and the session carries on; only
/// socket errors end the session early.
pub async fn pump<R, W>(
    client: &mut R,
    serial: &mut W,
    buf: &mut [u8],
    stats: &RelayStats,
) -> Result<SessionEnd, RelayError>
where
    R: Read,
    W: Write,
{
    if buf.is_empty() {
        return EmptyBufferSnafu.fail();
    }
    RelayStats::bump(&stats.sessions, 1);

    loop {
        let n = match client.read(buf).await {
            Ok(0) => {
                debug!("client sent EOF");
                return Ok(SessionEnd::ClientClosed);
            }
            Ok(n) => n,
            Err(e) => {
                let kind = e.kind();
                warn!("client read error: {kind:?}");
                return NetworkSnafu { kind }.fail();
            }
        };
        RelayStats::bump(&stats.bytes_in, n);

        forward(serial, &buf[..n], stats).await;
    }
}

/// Writes one chunk to the serial line, counting what actually went out.
///
/// On error the unwritten tail of the chunk is dropped.
async fn forward<W: Write>(serial: &mut W, chunk: &[u8], stats: &RelayStats) {
    let mut rest = chunk;
    while !rest.is_empty() {
        let kind = match serial.write(rest).await {
            Ok(0) => ErrorKind::WriteZero,
            Ok(w) => {
                RelayStats::bump(&stats.bytes_out, w);
                rest = &rest[w..];
                continue;
            }
            Err(e) => e.kind(),
        };
        warn!(
            "serial write failed, dropping {} of {} bytes: {kind:?}",
            rest.len(),
            chunk.len()
        );
        RelayStats::bump(&stats.serial_errors, 1);
        return;
    }
}
