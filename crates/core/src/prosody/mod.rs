mod stretch;

use crate::config::ConfigError;
use crate::emotion::EmotionLabel;
use crate::resample::{
    rational_approximation, resample_to_len, ResampleError, RATIONAL_DENOMINATOR,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LOG_TARGET: &str = "prosody";

/// Stages whose factor is this close to neutral are skipped.
pub const RATE_SKIP_TOLERANCE: f32 = 0.02;
pub const PITCH_SKIP_SEMITONES: f32 = 0.1;
pub const ENERGY_SKIP_TOLERANCE: f32 = 0.01;

/// Full-intensity prosody for one label.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProsodyTarget {
    pub rate: f32,
    pub pitch_semitones: f32,
    pub energy: f32,
}

impl ProsodyTarget {
    pub const fn new(rate: f32, pitch_semitones: f32, energy: f32) -> Self {
        Self {
            rate,
            pitch_semitones,
            energy,
        }
    }

    fn is_valid(&self) -> bool {
        self.rate.is_finite()
            && self.pitch_semitones.is_finite()
            && self.energy.is_finite()
            && self.rate > 0.0
            && self.energy > 0.0
    }
}

/// Built-in label to prosody mapping.
pub const fn base_target(label: EmotionLabel) -> ProsodyTarget {
    match label {
        EmotionLabel::Neutral => ProsodyTarget::new(1.00, 0.0, 1.00),
        EmotionLabel::Happy => ProsodyTarget::new(1.10, 2.0, 1.20),
        EmotionLabel::Sad => ProsodyTarget::new(0.85, -3.0, 0.80),
        EmotionLabel::Angry => ProsodyTarget::new(1.15, 1.0, 1.40),
        EmotionLabel::Excited => ProsodyTarget::new(1.20, 4.0, 1.30),
        EmotionLabel::Calm => ProsodyTarget::new(0.90, -1.0, 0.90),
    }
}

/// Configurable label to prosody table; every label must be present.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ProsodyTable(BTreeMap<EmotionLabel, ProsodyTarget>);

impl Default for ProsodyTable {
    fn default() -> Self {
        Self(
            EmotionLabel::ALL
                .into_iter()
                .map(|label| (label, base_target(label)))
                .collect(),
        )
    }
}

impl ProsodyTable {
    pub fn target(&self, label: EmotionLabel) -> ProsodyTarget {
        self.0.get(&label).copied().unwrap_or_else(|| base_target(label))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for label in EmotionLabel::ALL {
            match self.0.get(&label) {
                None => return Err(ConfigError::MissingProsodyEntry(label)),
                Some(target) if !target.is_valid() => {
                    return Err(ConfigError::InvalidProsodyEntry(label))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Scales the label's target toward neutral by `intensity`.
    pub fn plan(&self, label: EmotionLabel, intensity: f32) -> ProsodyPlan {
        ProsodyPlan::scaled(self.target(label), intensity)
    }
}

/// Concrete transform parameters for one utterance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProsodyPlan {
    pub rate_factor: f32,
    pub pitch_shift_semitones: f32,
    pub energy_factor: f32,
}

impl ProsodyPlan {
    pub const IDENTITY: ProsodyPlan = ProsodyPlan {
        rate_factor: 1.0,
        pitch_shift_semitones: 0.0,
        energy_factor: 1.0,
    };

    fn scaled(target: ProsodyTarget, intensity: f32) -> Self {
        // NaN and infinities carry no usable intensity
        let i = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0) + 0.0
        } else {
            0.0
        };
        Self {
            rate_factor: 1.0 + (target.rate - 1.0) * i,
            pitch_shift_semitones: target.pitch_semitones * i + 0.0,
            energy_factor: 1.0 + (target.energy - 1.0) * i,
        }
    }

    pub fn pitch_ratio(&self) -> f32 {
        2f32.powf(self.pitch_shift_semitones / 12.0)
    }

    pub fn changes_rate(&self) -> bool {
        (self.rate_factor - 1.0).abs() > RATE_SKIP_TOLERANCE
    }

    pub fn changes_pitch(&self) -> bool {
        self.pitch_shift_semitones.abs() > PITCH_SKIP_SEMITONES
    }

    pub fn changes_energy(&self) -> bool {
        (self.energy_factor - 1.0).abs() > ENERGY_SKIP_TOLERANCE
    }

    /// True when every stage would be skipped.
    pub fn is_identity(&self) -> bool {
        !self.changes_rate() && !self.changes_pitch() && !self.changes_energy()
    }

    pub fn validate(&self) -> Result<(), ProsodyError> {
        let finite = self.rate_factor.is_finite()
            && self.pitch_shift_semitones.is_finite()
            && self.energy_factor.is_finite();
        if !finite || self.rate_factor <= 0.0 || self.energy_factor < 0.0 {
            return Err(ProsodyError::InvalidPlan(*self));
        }
        Ok(())
    }
}

impl Default for ProsodyPlan {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProsodyError {
    #[error("invalid prosody plan: {0:?}")]
    InvalidPlan(ProsodyPlan),
    #[error(transparent)]
    Resample(#[from] ResampleError),
}

/// Plan from the built-in table.
pub fn plan_prosody(label: EmotionLabel, intensity: f32) -> ProsodyPlan {
    ProsodyPlan::scaled(base_target(label), intensity)
}

/// Applies rate, then pitch, then energy to a copy of `buffer`.
pub fn apply_prosody(buffer: &[f32], plan: &ProsodyPlan) -> Result<Vec<f32>, ProsodyError> {
    plan.validate()?;
    let mut audio = buffer.to_vec();

    if plan.changes_rate() {
        let (n, d) = rational_approximation(f64::from(plan.rate_factor), RATIONAL_DENOMINATOR);
        let target_len = ceil_div(audio.len(), d, n);
        audio = resample_to_len(&audio, f64::from(d) / f64::from(n), target_len)?;
        tracing::debug!(
            target: LOG_TARGET,
            rate = plan.rate_factor,
            ratio = %format!("{n}/{d}"),
            len = audio.len(),
            "rate applied"
        );
    }

    if plan.changes_pitch() {
        let (n, d) = rational_approximation(f64::from(plan.pitch_ratio()), RATIONAL_DENOMINATOR);
        let original_len = audio.len();
        let shifted = resample_to_len(
            &audio,
            f64::from(d) / f64::from(n),
            ceil_div(original_len, d, n),
        )?;
        audio = stretch::stretch_to_len(&shifted, original_len);
        tracing::debug!(
            target: LOG_TARGET,
            semitones = plan.pitch_shift_semitones,
            ratio = %format!("{n}/{d}"),
            "pitch applied"
        );
    }

    if plan.changes_energy() {
        let gain = plan.energy_factor;
        for x in audio.iter_mut() {
            *x = (*x * gain).clamp(-1.0, 1.0);
        }
        tracing::debug!(target: LOG_TARGET, energy = gain, "energy applied");
    }

    Ok(audio)
}

/// `ceil(len * num / den)` without overflow on realistic lengths.
fn ceil_div(len: usize, num: u32, den: u32) -> usize {
    let num = num as u64;
    let den = den.max(1) as u64;
    ((len as u64 * num).div_ceil(den)) as usize
}
