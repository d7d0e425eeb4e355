//! Retry count carried in message headers.
//!
//! The count lives under [`RETRY_HEADER`] as decimal ASCII. Reading is
//! fail-open: a missing or unreadable value counts as 0, which gives a
//! corrupted message the full retry budget again.

use tracing::debug;

use crate::broker::message::Headers;

pub const RETRY_HEADER: &str = "x-retry-count";

/// Retry count stored in `headers`, or 0 if absent or malformed.
pub fn decode(headers: &Headers) -> u32 {
    let Some(raw) = headers.last(RETRY_HEADER) else {
        return 0;
    };

    match std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
    {
        Some(count) => count,
        None => {
            debug!(
                value = %String::from_utf8_lossy(raw),
                "malformed {RETRY_HEADER} header, treating as 0"
            );
            0
        }
    }
}

/// Copy of `headers` whose retry count is `count`.
///
/// Existing retry entries are dropped and a single new one is appended;
/// every other header keeps its position.
pub fn encode(headers: &Headers, count: u32) -> Headers {
    headers
        .without(RETRY_HEADER)
        .with(RETRY_HEADER, count.to_string().into_bytes())
}
