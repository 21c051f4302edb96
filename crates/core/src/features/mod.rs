mod energy;
mod frames;
mod mfcc;
mod pitch;
mod rate;

use crate::config::AnalysisConfig;
use serde::{Deserialize, Serialize};

pub use energy::{rms, zero_crossing_rate};
pub use frames::{frame_count, Frames};
pub use mfcc::{hz_to_mel, mel_to_hz, MfccExtractor};
pub use pitch::{PitchEstimate, PitchTracker};
pub use rate::{count_onsets, speaking_rate};

/// Number of cepstral coefficients carried per frame and in the utterance summary.
pub const MFCC_COEFFS: usize = 13;

const LOG_TARGET: &str = "features";

/// Per-frame measurements, produced once and discarded after aggregation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrameFeatures {
    pub f0_hz: f32,
    pub voiced: bool,
    pub rms: f32,
    pub zcr: f32,
    /// `None` when cepstral extraction is disabled.
    pub mfcc: Option<[f32; MFCC_COEFFS]>,
}

/// Utterance-level summary consumed by the audio rule classifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AggregatedFeatures {
    pub f0_mean: f32,
    pub f0_std: f32,
    /// `false` when the pitch fallback replaced the measured statistics.
    pub f0_reliable: bool,
    pub voiced_ratio: f32,
    pub rms_mean: f32,
    pub rms_std: f32,
    pub zcr_mean: f32,
    /// Descriptive only; no classification rule reads these.
    pub mfcc_mean: [f32; MFCC_COEFFS],
    pub speaking_rate: f32,
    pub frame_count: usize,
    pub duration_secs: f32,
}

/// Turns a 16 kHz mono buffer into [`AggregatedFeatures`].
///
/// Holds only immutable, precomputed state (pitch lag range, FFT plan, filterbank), so a
/// single extractor serves concurrent callers.
#[derive(Debug)]
pub struct FeatureExtractor {
    config: AnalysisConfig,
    pitch: PitchTracker,
    mfcc: Option<MfccExtractor>,
}

impl FeatureExtractor {
    pub fn new(config: &AnalysisConfig) -> Self {
        let pitch = PitchTracker::new(
            config.sample_rate,
            config.f0_min_hz,
            config.f0_max_hz,
            config.voicing_threshold,
        );
        let mfcc = config.compute_mfcc.then(|| {
            MfccExtractor::new(
                config.sample_rate,
                config.frame_len,
                config.n_mels,
                config.log_floor,
            )
        });
        Self {
            config: config.clone(),
            pitch,
            mfcc,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn frame_features(&self, samples: &[f32]) -> Vec<FrameFeatures> {
        Frames::new(samples, self.config.frame_len, self.config.hop_len)
            .map(|frame| {
                let pitch = self.pitch.estimate(frame);
                FrameFeatures {
                    f0_hz: pitch.f0_hz,
                    voiced: pitch.voiced,
                    rms: rms(frame),
                    zcr: zero_crossing_rate(frame),
                    mfcc: self.mfcc.as_ref().map(|m| m.extract(frame)),
                }
            })
            .collect()
    }

    /// Reduces per-frame features; `sample_count` sets the utterance duration for the
    /// speaking rate.
    pub fn aggregate(&self, frames: &[FrameFeatures], sample_count: usize) -> AggregatedFeatures {
        let duration_secs = if self.config.sample_rate == 0 {
            0.0
        } else {
            sample_count as f32 / self.config.sample_rate as f32
        };

        let voiced: Vec<f32> = frames.iter().filter(|f| f.voiced).map(|f| f.f0_hz).collect();
        let (mut f0_mean, mut f0_std) = mean_std(&voiced);
        let f0_reliable = f0_mean > self.config.f0_reliable_min_hz;
        if !f0_reliable {
            tracing::debug!(
                target: LOG_TARGET,
                voiced_frames = voiced.len(),
                frames = frames.len(),
                "pitch unreliable, substituting fallback statistics"
            );
            f0_mean = self.config.f0_fallback_mean_hz;
            f0_std = self.config.f0_fallback_std_hz;
        }

        let rms_series: Vec<f32> = frames.iter().map(|f| f.rms).collect();
        let (rms_mean, rms_std) = mean_std(&rms_series);
        let zcr_series: Vec<f32> = frames.iter().map(|f| f.zcr).collect();
        let (zcr_mean, _) = mean_std(&zcr_series);

        let mut mfcc_mean = [0.0f32; MFCC_COEFFS];
        let mfcc_rows: Vec<&[f32; MFCC_COEFFS]> =
            frames.iter().filter_map(|f| f.mfcc.as_ref()).collect();
        if !mfcc_rows.is_empty() {
            for (i, slot) in mfcc_mean.iter_mut().enumerate() {
                let sum: f64 = mfcc_rows.iter().map(|row| f64::from(row[i])).sum();
                *slot = (sum / mfcc_rows.len() as f64) as f32;
            }
        }

        let voiced_ratio = if frames.is_empty() {
            0.0
        } else {
            voiced.len() as f32 / frames.len() as f32
        };

        AggregatedFeatures {
            f0_mean,
            f0_std,
            f0_reliable,
            voiced_ratio,
            rms_mean,
            rms_std,
            zcr_mean,
            mfcc_mean,
            speaking_rate: speaking_rate(
                &rms_series,
                duration_secs,
                self.config.onset_threshold_ratio,
            ),
            frame_count: frames.len(),
            duration_secs,
        }
    }

    pub fn extract(&self, samples: &[f32]) -> AggregatedFeatures {
        let frames = self.frame_features(samples);
        self.aggregate(&frames, samples.len())
    }
}

/// Arithmetic mean and population standard deviation; `(0, 0)` for an empty series.
fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean as f32, var.sqrt() as f32)
}
