/// Current UTC wall time without offset, matching the `timestamp` columns.
///
/// Truncated to whole microseconds so a value read back from Postgres
/// compares equal to the one that was written.
pub fn now_utc() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    let now = time::PrimitiveDateTime::new(now.date(), now.time());
    now.replace_microsecond(now.microsecond()).unwrap_or(now)
}

/// Unix seconds for a UTC `PrimitiveDateTime`.
pub fn unix_seconds(at: time::PrimitiveDateTime) -> i64 {
    at.assume_utc().unix_timestamp()
}
