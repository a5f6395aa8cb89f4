//! Pooled-statistic math.
//!
//! Reduces a per-frame score sequence to its "low" aggregates. The mean,
//! min, max, and harmonic mean come straight from the analysis report; the
//! lows are recomputed here because libvmaf does not emit them.

/// Mean of the worst 1% of scores (at least one frame).
pub fn one_percent_low(scores: &[f64]) -> f64 {
    low_mean(scores, 100)
}

/// Mean of the worst 0.1% of scores (at least one frame).
pub fn point_one_percent_low(scores: &[f64]) -> f64 {
    low_mean(scores, 1000)
}

/// Mean of the lowest `max(1, n/divisor)` scores.
fn low_mean(scores: &[f64], divisor: usize) -> f64 {
    assert!(!scores.is_empty(), "cannot pool an empty score sequence");

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let count = (sorted.len() / divisor).max(1);
    sorted[..count].iter().sum::<f64>() / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequence_uses_single_worst_frame() {
        // Fewer than 100 scores: the 1% low collapses to the minimum.
        let scores = vec![90.0, 85.0, 95.0, 99.0];
        assert_eq!(one_percent_low(&scores), 85.0);
        assert_eq!(point_one_percent_low(&scores), 85.0);
    }

    #[test]
    fn one_percent_low_averages_the_worst_bucket() {
        // 200 scores: the 1% low averages the two worst.
        let mut scores: Vec<f64> = (0..198).map(|_| 90.0).collect();
        scores.push(10.0);
        scores.push(20.0);
        assert_eq!(one_percent_low(&scores), 15.0);
        // 0.1% still rounds up to a single frame.
        assert_eq!(point_one_percent_low(&scores), 10.0);
    }

    #[test]
    fn lows_are_ordered_between_min_and_mean() {
        let scores: Vec<f64> = (0..1000).map(|i| 50.0 + (i as f64) / 20.0).collect();
        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;

        let one = one_percent_low(&scores);
        let point_one = point_one_percent_low(&scores);

        assert!(min <= point_one);
        assert!(point_one <= one);
        assert!(one <= mean);
    }

    #[test]
    #[should_panic(expected = "empty score sequence")]
    fn empty_sequence_panics() {
        one_percent_low(&[]);
    }
}
