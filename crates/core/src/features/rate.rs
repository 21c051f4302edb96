/// Counts energy onsets: strict local maxima of the RMS envelope that exceed
/// `threshold_ratio * mean(rms)`.
pub fn count_onsets(rms: &[f32], threshold_ratio: f32) -> usize {
    if rms.len() < 3 {
        return 0;
    }
    let mean = rms.iter().map(|&x| f64::from(x)).sum::<f64>() / rms.len() as f64;
    let threshold = (mean * f64::from(threshold_ratio)) as f32;
    rms.windows(3)
        .filter(|w| w[1] > w[0] && w[1] > w[2] && w[1] > threshold)
        .count()
}

/// Onsets per second of utterance; `0.0` for non-positive durations.
pub fn speaking_rate(rms: &[f32], duration_secs: f32, threshold_ratio: f32) -> f32 {
    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return 0.0;
    }
    count_onsets(rms, threshold_ratio) as f32 / duration_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_peaks_above_threshold() {
        let env = [0.1, 0.5, 0.1, 0.6, 0.2, 0.7, 0.1];
        assert_eq!(count_onsets(&env, 0.5), 3);
    }

    #[test]
    fn small_ripples_below_threshold_are_ignored() {
        // mean = 0.3, threshold 0.15: the bump at 0.06 does not count
        let env = [0.01, 0.06, 0.02, 0.9, 0.01, 0.8, 0.3];
        assert_eq!(count_onsets(&env, 0.5), 2);
    }

    #[test]
    fn plateaus_and_edges_are_not_onsets() {
        assert_eq!(count_onsets(&[0.5, 0.5, 0.5, 0.5], 0.5), 0);
        assert_eq!(count_onsets(&[0.9, 0.1, 0.2], 0.5), 0);
        assert_eq!(count_onsets(&[0.1, 0.9], 0.5), 0);
    }

    #[test]
    fn rate_divides_by_duration() {
        let env = [0.1, 0.5, 0.1, 0.6, 0.2, 0.7, 0.1];
        assert!((speaking_rate(&env, 2.0, 0.5) - 1.5).abs() < 1e-6);
        assert_eq!(speaking_rate(&env, 0.0, 0.5), 0.0);
        assert_eq!(speaking_rate(&env, -1.0, 0.5), 0.0);
    }
}
