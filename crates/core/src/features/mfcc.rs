use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use super::MFCC_COEFFS;

/// Mel-frequency cepstral coefficient extractor for fixed-size frames.
///
/// Pipeline per frame: Hann window, power spectrum, triangular mel filterbank, natural log
/// (floored), cosine transform keeping the first [`MFCC_COEFFS`] coefficients. The FFT plan,
/// window, filterbank and cosine table are built once; `extract` only allocates its scratch
/// spectrum, so one extractor can be shared across threads.
pub struct MfccExtractor {
    n_fft: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    filter_bank: Vec<Vec<f32>>, // [mel_band][fft_bin]
    dct: Vec<Vec<f32>>,         // [coefficient][mel_band]
    log_floor: f32,
}

impl MfccExtractor {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, log_floor: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        Self {
            n_fft,
            fft,
            window: hann_window(n_fft),
            filter_bank: mel_filter_bank(n_mels, n_fft, sample_rate),
            dct: cosine_table(MFCC_COEFFS, n_mels),
            log_floor,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Frames shorter than `n_fft` are zero-padded, longer ones truncated.
    pub fn extract(&self, frame: &[f32]) -> [f32; MFCC_COEFFS] {
        let mut buf: Vec<Complex32> = (0..self.n_fft)
            .map(|i| {
                let x = frame.get(i).copied().unwrap_or(0.0);
                Complex32::new(x * self.window[i], 0.0)
            })
            .collect();
        self.fft.process(&mut buf);

        let power: Vec<f32> = buf[..self.n_fft / 2 + 1]
            .iter()
            .map(|c| c.norm_sqr())
            .collect();

        let log_mel: Vec<f32> = self
            .filter_bank
            .iter()
            .map(|filt| {
                let e: f32 = filt.iter().zip(&power).map(|(w, p)| w * p).sum();
                e.max(self.log_floor).ln()
            })
            .collect();

        let mut out = [0.0f32; MFCC_COEFFS];
        for (coeff, row) in out.iter_mut().zip(&self.dct) {
            *coeff = row.iter().zip(&log_mel).map(|(c, m)| c * m).sum();
        }
        out
    }
}

impl std::fmt::Debug for MfccExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfccExtractor")
            .field("n_fft", &self.n_fft)
            .field("n_mels", &self.filter_bank.len())
            .field("log_floor", &self.log_floor)
            .finish()
    }
}

pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Symmetric Hann window (`0.5 - 0.5 cos(2πn / (N-1))`).
fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()) as f32)
        .collect()
}

/// Triangular filters evenly spaced on the mel scale from 0 Hz to Nyquist, returned as
/// `n_mels` rows over the `n_fft / 2 + 1` power-spectrum bins.
pub(crate) fn mel_filter_bank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let sr = f64::from(sample_rate);
    let mel_max = hz_to_mel(sr / 2.0);

    let edges: Vec<usize> = (0..n_mels + 2)
        .map(|i| {
            let mel = mel_max * i as f64 / (n_mels + 1) as f64;
            let bin = ((n_fft + 1) as f64 * mel_to_hz(mel) / sr).floor();
            (bin.max(0.0) as usize).min(n_bins - 1)
        })
        .collect();

    let mut bank = vec![vec![0.0f32; n_bins]; n_mels];
    for (m, filt) in bank.iter_mut().enumerate() {
        let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
        if center > lo {
            for (k, w) in filt.iter_mut().enumerate().take(center).skip(lo) {
                *w = (k - lo) as f32 / (center - lo) as f32;
            }
        }
        if hi > center {
            for (k, w) in filt.iter_mut().enumerate().take(hi).skip(center) {
                *w = (hi - k) as f32 / (hi - center) as f32;
            }
        }
    }
    bank
}

/// `table[n][k] = cos(π n (k + 0.5) / n_mels)`.
fn cosine_table(n_coeffs: usize, n_mels: usize) -> Vec<Vec<f32>> {
    (0..n_coeffs)
        .map(|n| {
            (0..n_mels)
                .map(|k| (PI * n as f64 * (k as f64 + 0.5) / n_mels as f64).cos() as f32)
                .collect()
        })
        .collect()
}
