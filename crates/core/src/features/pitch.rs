use serde::{Deserialize, Serialize};

/// Frames whose centered standard deviation falls below this are treated as silent.
const MIN_FRAME_STD: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental frequency in Hz, `0.0` when unvoiced.
    pub f0_hz: f32,
    pub voiced: bool,
    /// Normalized autocorrelation `R[peak] / R[0]` at the chosen lag.
    pub strength: f32,
}

impl PitchEstimate {
    pub const UNVOICED: Self = Self {
        f0_hz: 0.0,
        voiced: false,
        strength: 0.0,
    };
}

/// Autocorrelation F0 estimator.
///
/// The lag search covers `ceil(sr / f_max) ..= floor(sr / f_min)`; a frame is voiced when the
/// normalized peak exceeds the voicing threshold.
#[derive(Clone, Debug)]
pub struct PitchTracker {
    sample_rate: u32,
    min_lag: usize,
    max_lag: usize,
    voicing_threshold: f32,
}

impl PitchTracker {
    pub fn new(sample_rate: u32, f_min_hz: f32, f_max_hz: f32, voicing_threshold: f32) -> Self {
        let sr = f64::from(sample_rate);
        let min_lag = (sr / f64::from(f_max_hz)).ceil().max(1.0) as usize;
        let max_lag = (sr / f64::from(f_min_hz)).floor().max(0.0) as usize;
        Self {
            sample_rate,
            min_lag,
            max_lag,
            voicing_threshold,
        }
    }

    pub fn lag_range(&self) -> (usize, usize) {
        (self.min_lag, self.max_lag)
    }

    pub fn estimate(&self, frame: &[f32]) -> PitchEstimate {
        let n = frame.len();
        if n < 2 {
            return PitchEstimate::UNVOICED;
        }

        let mean = frame.iter().map(|&x| f64::from(x)).sum::<f64>() / n as f64;
        let centered: Vec<f64> = frame.iter().map(|&x| f64::from(x) - mean).collect();

        let r0: f64 = centered.iter().map(|x| x * x).sum();
        if (r0 / n as f64).sqrt() < MIN_FRAME_STD {
            return PitchEstimate::UNVOICED;
        }

        let max_lag = self.max_lag.min(n - 1);
        if max_lag < self.min_lag {
            return PitchEstimate::UNVOICED;
        }

        let mut best_lag = self.min_lag;
        let mut best_r = f64::NEG_INFINITY;
        for lag in self.min_lag..=max_lag {
            let r: f64 = centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum();
            // strict comparison keeps the first maximum
            if r > best_r {
                best_r = r;
                best_lag = lag;
            }
        }

        let strength = (best_r / r0) as f32;
        if strength > self.voicing_threshold {
            PitchEstimate {
                f0_hz: self.sample_rate as f32 / best_lag as f32,
                voiced: true,
                strength,
            }
        } else {
            PitchEstimate {
                strength,
                ..PitchEstimate::UNVOICED
            }
        }
    }
}
