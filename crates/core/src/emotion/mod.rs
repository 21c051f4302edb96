mod analyzer;
mod fusion;
mod lexicon;
mod rules;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use analyzer::{BranchResults, EmotionAnalysis, EmotionAnalyzer, EmotionService};
pub use fusion::fuse;
pub use lexicon::{Lexicon, TextLexiconClassifier};
pub use rules::{AudioRuleClassifier, AudioVerdict, Rule, RuleThresholds, RULES};

/// Baseline score given to `neutral` before any rule or keyword contributes.
pub const NEUTRAL_PRIOR: f32 = 0.10;

/// Totals below this are treated as an all-zero accumulator.
const DEGENERATE_TOTAL: f64 = 1e-9;

/// Closed set of emotion classes. Declaration order is the canonical order used for
/// tie-breaking and serialization.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Neutral,
    Happy,
    Sad,
    Angry,
    Excited,
    Calm,
}

impl EmotionLabel {
    pub const COUNT: usize = 6;

    pub const ALL: [EmotionLabel; Self::COUNT] = [
        EmotionLabel::Neutral,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Excited,
        EmotionLabel::Calm,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Excited => "excited",
            EmotionLabel::Calm => "calm",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = EmotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        EmotionLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| EmotionError::UnknownLabel(s.to_owned()))
    }
}

/// One non-negative score per [`EmotionLabel`], indexed in canonical order.
///
/// Serialized as a `label -> probability` map.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(into = "BTreeMap<EmotionLabel, f32>", from = "BTreeMap<EmotionLabel, f32>")]
pub struct ProbabilityVector([f32; EmotionLabel::COUNT]);

impl ProbabilityVector {
    pub const fn zeros() -> Self {
        Self([0.0; EmotionLabel::COUNT])
    }

    pub fn uniform() -> Self {
        Self([1.0 / EmotionLabel::COUNT as f32; EmotionLabel::COUNT])
    }

    /// Accumulator with only the neutral baseline set.
    pub fn with_neutral_prior(prior: f32) -> Self {
        let mut v = Self::zeros();
        v.set(EmotionLabel::Neutral, prior);
        v
    }

    pub fn from_scores(scores: [f32; EmotionLabel::COUNT]) -> Self {
        Self(scores)
    }

    pub fn get(&self, label: EmotionLabel) -> f32 {
        self.0[label.index()]
    }

    pub fn set(&mut self, label: EmotionLabel, value: f32) {
        self.0[label.index()] = value;
    }

    pub fn add(&mut self, label: EmotionLabel, delta: f32) {
        self.0[label.index()] += delta;
    }

    pub fn as_array(&self) -> &[f32; EmotionLabel::COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f32)> + '_ {
        EmotionLabel::ALL.into_iter().zip(self.0.iter().copied())
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().map(|&v| f64::from(v)).sum::<f64>() as f32
    }

    /// L1-normalized copy; an all-zero (or negative-total) vector becomes uniform.
    pub fn normalized(&self) -> Self {
        let total: f64 = self.0.iter().map(|&v| f64::from(v.max(0.0))).sum();
        if !(total > DEGENERATE_TOTAL) || !total.is_finite() {
            return Self::uniform();
        }
        let mut out = [0.0f32; EmotionLabel::COUNT];
        for (dst, &v) in out.iter_mut().zip(&self.0) {
            *dst = (f64::from(v.max(0.0)) / total) as f32;
        }
        Self(out)
    }

    /// Highest-scoring label; exact ties go to the earliest label in canonical order.
    pub fn argmax(&self) -> (EmotionLabel, f32) {
        let mut best = EmotionLabel::Neutral;
        let mut best_value = self.get(best);
        for (label, value) in self.iter().skip(1) {
            if value > best_value {
                best = label;
                best_value = value;
            }
        }
        (best, best_value)
    }
}

impl From<ProbabilityVector> for BTreeMap<EmotionLabel, f32> {
    fn from(v: ProbabilityVector) -> Self {
        v.iter().collect()
    }
}

impl From<BTreeMap<EmotionLabel, f32>> for ProbabilityVector {
    fn from(map: BTreeMap<EmotionLabel, f32>) -> Self {
        let mut v = Self::zeros();
        for (label, value) in map {
            v.set(label, value);
        }
        v
    }
}

/// Label, intensity and distribution exchanged between branches, fusion and callers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub label: EmotionLabel,
    /// Probability of `label`, in `[0, 1]`.
    pub intensity: f32,
    pub probabilities: ProbabilityVector,
}

impl ClassificationResult {
    /// Normalizes `scores` and picks the winning label.
    pub fn from_scores(scores: ProbabilityVector) -> Self {
        let probabilities = scores.normalized();
        let (label, intensity) = probabilities.argmax();
        Self {
            label,
            intensity,
            probabilities,
        }
    }

    /// Result used when an input carries no information at all.
    pub fn uninformative() -> Self {
        let probabilities = ProbabilityVector::uniform();
        Self {
            label: EmotionLabel::Neutral,
            intensity: probabilities.get(EmotionLabel::Neutral),
            probabilities,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EmotionError {
    #[error("unknown emotion label: {0:?}")]
    UnknownLabel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_and_display() {
        for label in EmotionLabel::ALL {
            assert_eq!(label.to_string().parse::<EmotionLabel>().unwrap(), label);
        }
        assert_eq!(" Happy ".parse::<EmotionLabel>().unwrap(), EmotionLabel::Happy);
        assert!(matches!(
            "bored".parse::<EmotionLabel>(),
            Err(EmotionError::UnknownLabel(_))
        ));
    }

    #[test]
    fn canonical_order_matches_index() {
        for (i, label) in EmotionLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
        }
    }

    #[test]
    fn normalization_sums_to_one() {
        let v = ProbabilityVector::from_scores([0.1, 0.45, 0.0, 0.5, 0.1, 0.35]).normalized();
        assert!((v.sum() - 1.0).abs() < 1e-6);
        assert!(v.iter().all(|(_, p)| p >= 0.0));
    }

    #[test]
    fn all_zero_normalizes_to_uniform() {
        let v = ProbabilityVector::zeros().normalized();
        assert_eq!(v, ProbabilityVector::uniform());
        assert_eq!(v.argmax().0, EmotionLabel::Neutral);
    }

    #[test]
    fn exact_tie_resolves_to_canonical_order() {
        let mut v = ProbabilityVector::zeros();
        v.set(EmotionLabel::Calm, 0.4);
        v.set(EmotionLabel::Sad, 0.4);
        v.set(EmotionLabel::Happy, 0.2);
        assert_eq!(v.argmax(), (EmotionLabel::Sad, 0.4));

        let mut v = ProbabilityVector::zeros();
        v.set(EmotionLabel::Excited, 0.5);
        v.set(EmotionLabel::Neutral, 0.5);
        assert_eq!(v.argmax().0, EmotionLabel::Neutral);

        let result = ClassificationResult::from_scores(v);
        assert_eq!(result.label, EmotionLabel::Neutral);
        assert_eq!(result.intensity, 0.5);
    }

    #[test]
    fn serializes_as_label_map() {
        let result = ClassificationResult::from_scores(ProbabilityVector::with_neutral_prior(0.1));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["label"], "neutral");
        assert_eq!(json["probabilities"]["neutral"], 1.0);
        assert_eq!(json["probabilities"]["calm"], 0.0);

        let back: ClassificationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
