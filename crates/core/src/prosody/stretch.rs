use std::f32::consts::PI;

const WINDOW_LEN: usize = 512;
const SYNTHESIS_HOP: usize = WINDOW_LEN / 2;

/// Plain overlap-add time-scale modification: changes duration to `target_len` samples
/// while keeping the local waveform (and so the pitch) of each window.
pub(crate) fn stretch_to_len(input: &[f32], target_len: usize) -> Vec<f32> {
    if target_len == 0 {
        return Vec::new();
    }
    if input.is_empty() {
        return vec![0.0; target_len];
    }
    if input.len() == target_len {
        return input.to_vec();
    }

    let window = hann(WINDOW_LEN);
    let analysis_hop = SYNTHESIS_HOP as f64 * input.len() as f64 / target_len as f64;

    let mut out = vec![0.0f32; target_len];
    let mut norm = vec![0.0f32; target_len];
    let mut k = 0usize;
    loop {
        let out_pos = k * SYNTHESIS_HOP;
        if out_pos >= target_len {
            break;
        }
        let in_pos = (k as f64 * analysis_hop).round() as usize;
        for (j, &w) in window.iter().enumerate() {
            let o = out_pos + j;
            if o >= target_len {
                break;
            }
            let x = input.get(in_pos + j).copied().unwrap_or(0.0);
            out[o] += x * w;
            norm[o] += w;
        }
        k += 1;
    }

    for (y, &n) in out.iter_mut().zip(&norm) {
        if n > 1e-3 {
            *y /= n;
        }
    }
    out
}

/// Periodic Hann window, which sums to a constant at 50% overlap.
fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_requested_length() {
        let input: Vec<f32> = (0..3_000).map(|i| (i as f32 * 0.05).sin()).collect();
        assert_eq!(stretch_to_len(&input, 6_000).len(), 6_000);
        assert_eq!(stretch_to_len(&input, 1_234).len(), 1_234);
        assert!(stretch_to_len(&input, 0).is_empty());
        assert_eq!(stretch_to_len(&[], 10), vec![0.0; 10]);
    }

    #[test]
    fn same_length_is_a_copy() {
        let input = vec![0.25, -0.5, 0.75];
        assert_eq!(stretch_to_len(&input, 3), input);
    }

    #[test]
    fn constant_signal_keeps_its_level() {
        let input = vec![0.4f32; 4_000];
        let out = stretch_to_len(&input, 8_000);
        // first window ramps in from zero weight
        for &y in &out[SYNTHESIS_HOP..7_000] {
            assert!((y - 0.4).abs() < 1e-3, "sample {y}");
        }
    }

    #[test]
    fn stretching_keeps_period() {
        // 40-sample period (400 Hz at 16 kHz)
        let input: Vec<f32> = (0..8_000)
            .map(|i| (2.0 * PI * i as f32 / 40.0).sin())
            .collect();
        let out = stretch_to_len(&input, 16_000);
        let crossings = out[1_000..15_000]
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        assert!((crossings as i64 - 14_000 / 40).abs() <= 20, "crossings {crossings}");
    }
}
