/// Nearest-rank percentile over durations sorted ascending.
///
/// Uses `index = ceil(p / 100 * n) - 1`, clamped to the slice. Returns `None`
/// for an empty slice. Both backends hand their rows to this function so that
/// results do not depend on the database's own percentile support.
pub fn nearest_rank(sorted: &[u64], percentile: f64) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let p = percentile.clamp(0.0, 100.0);
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(n - 1);
    Some(sorted[index])
}
