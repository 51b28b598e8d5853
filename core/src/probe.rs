//! Liveness probe.
//!
//! A socket that reports readable while holding zero bytes has been closed by
//! the peer. Only call this on a connection nobody is currently reading from.

use crate::connection::{Connection, State};
use std::{io, time::Duration};

/// Default wait for the readability check.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(10);

pub async fn is_disconnected(connection: &Connection, wait: Duration) -> bool {
    if connection.state() == State::Faulted {
        return true;
    }

    match tokio::time::timeout(wait, connection.stream().readable()).await {
        // Nothing happened on the socket: idle, but open.
        Err(_) => false,
        Ok(Err(err)) => {
            tracing::debug!(peer = %connection.peer(), "readiness check failed: {}", err);
            true
        }
        Ok(Ok(())) => match connection.peek() {
            Ok(0) => true,
            Ok(_) => false,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => false,
            Err(err) => {
                tracing::debug!(peer = %connection.peer(), "peek failed: {}", err);
                true
            }
        },
    }
}
