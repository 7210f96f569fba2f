//! Expiration defaults.

use std::time::Duration;

/// TTL applied when a caller asks for zero. Entries never live forever.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Remaining lifetime at or below which a read renews an entry.
pub const RENEW_THRESHOLD: Duration = Duration::from_secs(60);

/// Replaces a zero TTL with [`DEFAULT_TTL`].
#[must_use]
pub fn effective_ttl(ttl: Duration) -> Duration {
    if ttl.is_zero() { DEFAULT_TTL } else { ttl }
}
