//! Log-scale repartition of words by count.
//!
//! After REDUCE the master knows every worker's `(min, max)` count. It turns the
//! global range into `n - 1` boundaries so that bucket `b` receives the words
//! with `thresholds[b - 1] < count <= thresholds[b]`.

/// Steepness exponent. Large values pack most boundaries near `min`, so the
/// last bucket takes the bulk of the count range.
pub const STEEPNESS: f64 = 10.0;

/// Computes `num_workers - 1` non-decreasing thresholds.
///
/// `threshold_i = round(exp(ln(min) + (i / n)^STEEPNESS * (ln(max) - ln(min))))`
/// for `i = 1..n`, with both bounds clamped to at least 1.
pub fn compute_thresholds(global_min: u64, global_max: u64, num_workers: usize) -> Vec<u64> {
    if num_workers <= 1 {
        return Vec::new();
    }

    let min_log = (global_min.max(1) as f64).ln();
    let max_log = (global_max.max(1) as f64).ln().max(min_log);

    (1..num_workers)
        .map(|i| {
            let ratio = (i as f64 / num_workers as f64).powf(STEEPNESS);
            let log_threshold = min_log + ratio * (max_log - min_log);
            log_threshold.exp().round() as u64
        })
        .collect()
}

/// Bucket for a word seen `count` times.
///
/// Walks the thresholds while `count > threshold`, so a count equal to a
/// boundary stays in the lower bucket. Always in `0..=thresholds.len()`.
pub fn bucket_for(count: u64, thresholds: &[u64]) -> usize {
    thresholds
        .iter()
        .take_while(|&&threshold| count > threshold)
        .count()
}

/// Min and max over `counts`; `(0, 0)` when empty.
pub fn min_max<I>(counts: I) -> (u64, u64)
where
    I: IntoIterator<Item = u64>,
{
    counts
        .into_iter()
        .fold(None, |acc: Option<(u64, u64)>, count| match acc {
            Some((min, max)) => Some((min.min(count), max.max(count))),
            None => Some((count, count)),
        })
        .unwrap_or((0, 0))
}
