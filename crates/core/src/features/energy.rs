/// Root-mean-square energy of a frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    (sum_sq / frame.len() as f64).sqrt() as f32
}

/// Zero-crossing rate in `[0, 1]`: `mean(|sign(x[t]) - sign(x[t-1])|) / 2` over `t = 1..len`.
///
/// Exact zeros have sign 0, so a touch of the axis counts as half a crossing.
pub fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let total: f64 = frame
        .windows(2)
        .map(|w| f64::from((sign(w[1]) - sign(w[0])).abs()))
        .sum();
    (total / (frame.len() - 1) as f64 / 2.0) as f32
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
