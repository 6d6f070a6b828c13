//! `google.protobuf.Timestamp` and `Duration` as `chrono` values
//!
//! Generated accessors read the `(seconds, nanos)` pair of the prost message
//! and expose `DateTime<Utc>` or `TimeDelta`. Values outside chrono's range
//! saturate to its bounds.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::trace;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Instant for a `Timestamp`; `nanos` outside `0..1e9` carries into seconds
pub fn timestamp_from_parts(seconds: i64, nanos: i32) -> DateTime<Utc> {
    let nanos = i64::from(nanos);
    let carried = seconds.checked_add(nanos.div_euclid(NANOS_PER_SECOND));
    let subsec = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
    match carried.and_then(|s| DateTime::<Utc>::from_timestamp(s, subsec)) {
        Some(instant) => instant,
        None => {
            trace!(seconds, nanos, "Timestamp outside chrono range; saturating");
            if seconds < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            }
        }
    }
}

/// `(seconds, nanos)` of an instant; a leap second folds into the last
/// nanosecond of its second
pub fn timestamp_parts(instant: &DateTime<Utc>) -> (i64, i32) {
    let nanos = instant.timestamp_subsec_nanos().min(999_999_999);
    (instant.timestamp(), nanos as i32)
}

/// Span for a `Duration`
pub fn duration_from_parts(seconds: i64, nanos: i32) -> TimeDelta {
    let saturated = || {
        trace!(seconds, nanos, "Duration outside chrono range; saturating");
        if seconds < 0 || (seconds == 0 && nanos < 0) {
            TimeDelta::min_value()
        } else {
            TimeDelta::max_value()
        }
    };
    TimeDelta::try_seconds(seconds)
        .and_then(|whole| whole.checked_add(&TimeDelta::nanoseconds(i64::from(nanos))))
        .unwrap_or_else(saturated)
}

/// `(seconds, nanos)` of a span, both carrying the span's sign
pub fn duration_parts(span: &TimeDelta) -> (i64, i32) {
    (span.num_seconds(), span.subsec_nanos())
}
