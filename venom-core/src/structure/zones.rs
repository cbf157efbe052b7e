//! Liquidity zones: prior local extremes price tends to revisit.

/// Local extrema by fixed-width centred comparison.
///
/// Index `i` is a swing high if `highs[i]` is strictly greater than every
/// other high within `half_width` bars on both sides, and a swing low if
/// `lows[i]` is strictly less than every other low in that neighbourhood.
/// Points without a full neighbourhood on both sides are never zones.
/// The result is sorted ascending with exact duplicates removed.
pub fn liquidity_zones(highs: &[f64], lows: &[f64], half_width: usize) -> Vec<f64> {
    let n = highs.len().min(lows.len());
    let mut zones = Vec::new();
    if half_width == 0 || n < 2 * half_width + 1 {
        return zones;
    }

    for i in half_width..n - half_width {
        let neighbours = (i - half_width..=i + half_width).filter(|&j| j != i);

        if neighbours.clone().all(|j| highs[i] > highs[j]) {
            zones.push(highs[i]);
        }
        if neighbours.clone().all(|j| lows[i] < lows[j]) {
            zones.push(lows[i]);
        }
    }

    zones.sort_by(|a, b| a.total_cmp(b));
    zones.dedup();
    zones
}
