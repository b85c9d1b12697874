//! Exponential backoff shared by the fetcher retry loop and the
//! supervisor's resubscribe path.

use std::time::Duration;

/// Ceiling for any single backoff delay.
pub const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Delay before retry attempt `attempt` (0-based): `base · 2^attempt`,
/// capped at [`BACKOFF_CAP`].
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(BACKOFF_CAP, |d| d.min(BACKOFF_CAP))
}
