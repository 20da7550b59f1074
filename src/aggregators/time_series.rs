/**
 * Mechanic:
 * - every observation belongs to exactly one fixed width bucket, keyed by the
 *   bucket's aligned start (floor(ts / size) * size)
 * - a trailing window is the contiguous run of buckets from align(now - window)
 *   up to and including align(now), so the window edge is bucket aligned and
 *   may reach up to one bucket further back than `now - window`
 */

/// Aligned start of the bucket containing `timestamp`.
///
/// Floors towards negative infinity so pre-epoch timestamps still satisfy
/// `align(t) <= t`. Saturates at `i64::MIN` when the floored multiple is not
/// representable. Callers guarantee `bucket_size > 0` (see `AggregatorsConfig::validate`).
pub fn align(timestamp: i64, bucket_size: i64) -> i64 {
    timestamp
        .checked_sub(timestamp.rem_euclid(bucket_size))
        .unwrap_or(i64::MIN)
}

/// First and last bucket start covering the trailing window ending at `now`.
pub fn window_bounds(now: i64, window: i64, bucket_size: i64) -> (i64, i64) {
    (
        align(now.saturating_sub(window), bucket_size),
        align(now, bucket_size),
    )
}

/// Ordered bucket starts from `align(now - window)` to `align(now)` inclusive.
pub fn range(now: i64, window: i64, bucket_size: i64) -> Vec<i64> {
    let (from, to) = window_bounds(now, window, bucket_size);
    (from..=to).step_by(bucket_size as usize).collect()
}

/// Last second still inside the bucket starting at `bucket_start`.
pub fn bucket_end(bucket_start: i64, bucket_size: i64) -> i64 {
    bucket_start.saturating_add(bucket_size - 1)
}
