//! Time related utils.

use chrono::Utc;

/// DateTime is the alias for `chrono::DateTime<Utc>`.
pub type DateTime = chrono::DateTime<Utc>;

/// Create datetime of now.
pub fn now() -> DateTime {
    Utc::now()
}

/// Seconds since the Unix epoch, as used by `oauth_timestamp`.
pub fn unix_timestamp(time: DateTime) -> i64 {
    time.timestamp()
}
