use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Trailing window a device must have reported inside to count as connected.
pub const CONNECTION_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Connection verdict for one device, computed against a fixed `now`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connection: bool,
    pub ts: i64,
}

pub fn connection_status(last_connection_ms: i64, now_ms: i64) -> ConnectionStatus {
    ConnectionStatus {
        connection: within_connection_window(last_connection_ms, now_ms),
        ts: last_connection_ms,
    }
}

/// Membership in `[now - 24h, now]`; future timestamps are out of window.
pub fn within_connection_window(last_connection_ms: i64, now_ms: i64) -> bool {
    let window_start = now_ms - CONNECTION_WINDOW_MS;
    window_start <= last_connection_ms && last_connection_ms <= now_ms
}

/// Epoch milliseconds of an RFC 3339 timestamp, `None` when unparseable.
pub fn epoch_ms_from_rfc3339(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.timestamp_millis())
}
