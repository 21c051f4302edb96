use super::{ClassificationResult, EmotionLabel, ProbabilityVector, NEUTRAL_PRIOR};
use crate::config::ConfigError;
use crate::features::AggregatedFeatures;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "emotion::rules";

/// Decision thresholds of the audio rules. Rule effects are fixed; only the cut-offs move.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleThresholds {
    pub excited_f0_min: f32,
    pub excited_rms_min: f32,
    pub excited_rate_min: f32,

    pub happy_f0_min: f32,
    pub happy_rms_min: f32,

    pub angry_rms_min: f32,
    pub angry_zcr_min: f32,
    pub angry_f0_std_min: f32,

    pub sad_f0_max: f32,
    pub sad_rms_max: f32,
    pub sad_rate_max: f32,

    pub calm_rms_max: f32,
    pub calm_f0_std_max: f32,
    pub calm_rate_min: f32,
    pub calm_rate_max: f32,

    pub quiet_rms_max: f32,

    pub fast_rate_min: f32,
    pub fast_rms_min: f32,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            excited_f0_min: 185.0,
            excited_rms_min: 0.06,
            excited_rate_min: 3.5,
            happy_f0_min: 155.0,
            happy_rms_min: 0.04,
            angry_rms_min: 0.07,
            angry_zcr_min: 0.12,
            angry_f0_std_min: 35.0,
            sad_f0_max: 140.0,
            sad_rms_max: 0.05,
            sad_rate_max: 3.0,
            calm_rms_max: 0.06,
            calm_f0_std_max: 28.0,
            calm_rate_min: 2.0,
            calm_rate_max: 4.5,
            quiet_rms_max: 0.03,
            fast_rate_min: 4.5,
            fast_rms_min: 0.05,
        }
    }
}

impl RuleThresholds {
    fn named(&self) -> [(&'static str, f32); 18] {
        [
            ("excited_f0_min", self.excited_f0_min),
            ("excited_rms_min", self.excited_rms_min),
            ("excited_rate_min", self.excited_rate_min),
            ("happy_f0_min", self.happy_f0_min),
            ("happy_rms_min", self.happy_rms_min),
            ("angry_rms_min", self.angry_rms_min),
            ("angry_zcr_min", self.angry_zcr_min),
            ("angry_f0_std_min", self.angry_f0_std_min),
            ("sad_f0_max", self.sad_f0_max),
            ("sad_rms_max", self.sad_rms_max),
            ("sad_rate_max", self.sad_rate_max),
            ("calm_rms_max", self.calm_rms_max),
            ("calm_f0_std_max", self.calm_f0_std_max),
            ("calm_rate_min", self.calm_rate_min),
            ("calm_rate_max", self.calm_rate_max),
            ("quiet_rms_max", self.quiet_rms_max),
            ("fast_rate_min", self.fast_rate_min),
            ("fast_rms_min", self.fast_rms_min),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.named().into_iter().find(|(_, v)| !v.is_finite()) {
            Some((name, _)) => Err(ConfigError::InvalidThreshold(name)),
            None => Ok(()),
        }
    }
}

/// One entry of the audio rule table.
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub predicate: fn(&AggregatedFeatures, &RuleThresholds) -> bool,
    pub effects: &'static [(EmotionLabel, f32)],
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("effects", &self.effects)
            .finish()
    }
}

fn excited_burst(f: &AggregatedFeatures, t: &RuleThresholds) -> bool {
    f.f0_mean > t.excited_f0_min
        && f.rms_mean > t.excited_rms_min
        && f.speaking_rate > t.excited_rate_min
}

fn bright_voice(f: &AggregatedFeatures, t: &RuleThresholds) -> bool {
    !excited_burst(f, t) && f.f0_mean > t.happy_f0_min && f.rms_mean > t.happy_rms_min
}

fn harsh_loud(f: &AggregatedFeatures, t: &RuleThresholds) -> bool {
    f.rms_mean > t.angry_rms_min && (f.zcr_mean > t.angry_zcr_min || f.f0_std > t.angry_f0_std_min)
}

fn low_slow_quiet(f: &AggregatedFeatures, t: &RuleThresholds) -> bool {
    f.f0_mean < t.sad_f0_max && f.rms_mean < t.sad_rms_max && f.speaking_rate < t.sad_rate_max
}

fn steady_moderate(f: &AggregatedFeatures, t: &RuleThresholds) -> bool {
    f.rms_mean < t.calm_rms_max
        && f.f0_std < t.calm_f0_std_max
        && f.speaking_rate > t.calm_rate_min
        && f.speaking_rate < t.calm_rate_max
}

fn very_quiet(f: &AggregatedFeatures, t: &RuleThresholds) -> bool {
    f.rms_mean < t.quiet_rms_max
}

fn fast_energetic(f: &AggregatedFeatures, t: &RuleThresholds) -> bool {
    f.speaking_rate > t.fast_rate_min && f.rms_mean > t.fast_rms_min
}

/// Evaluated in order; every rule whose predicate holds adds its effects.
pub static RULES: [Rule; 7] = [
    Rule {
        id: "R1",
        predicate: excited_burst,
        effects: &[(EmotionLabel::Excited, 0.55), (EmotionLabel::Happy, 0.20)],
    },
    Rule {
        id: "R2",
        predicate: bright_voice,
        effects: &[(EmotionLabel::Happy, 0.45), (EmotionLabel::Excited, 0.10)],
    },
    Rule {
        id: "R3",
        predicate: harsh_loud,
        effects: &[(EmotionLabel::Angry, 0.50)],
    },
    Rule {
        id: "R4",
        predicate: low_slow_quiet,
        effects: &[(EmotionLabel::Sad, 0.45)],
    },
    Rule {
        id: "R5",
        predicate: steady_moderate,
        effects: &[(EmotionLabel::Calm, 0.35)],
    },
    Rule {
        id: "R6",
        predicate: very_quiet,
        effects: &[(EmotionLabel::Calm, 0.25)],
    },
    Rule {
        id: "R7",
        predicate: fast_energetic,
        effects: &[(EmotionLabel::Excited, 0.20), (EmotionLabel::Happy, 0.10)],
    },
];

/// Outcome of the audio branch together with the rules that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioVerdict {
    pub result: ClassificationResult,
    pub fired_rules: Vec<&'static str>,
}

/// Maps aggregated prosodic features onto a [`ClassificationResult`].
#[derive(Clone, Debug)]
pub struct AudioRuleClassifier {
    thresholds: RuleThresholds,
    silence_rms_floor: f32,
}

impl AudioRuleClassifier {
    pub fn new(thresholds: RuleThresholds, silence_rms_floor: f32) -> Self {
        Self {
            thresholds,
            silence_rms_floor,
        }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    pub fn is_silent(&self, features: &AggregatedFeatures) -> bool {
        features.rms_mean <= self.silence_rms_floor
    }

    pub fn fired_rules(&self, features: &AggregatedFeatures) -> Vec<&'static str> {
        RULES
            .iter()
            .filter(|rule| (rule.predicate)(features, &self.thresholds))
            .map(|rule| rule.id)
            .collect()
    }

    /// Unnormalized accumulator: the neutral prior plus the effects of every fired rule.
    pub fn scores(&self, features: &AggregatedFeatures) -> ProbabilityVector {
        let mut acc = ProbabilityVector::with_neutral_prior(NEUTRAL_PRIOR);
        for rule in RULES.iter().filter(|r| (r.predicate)(features, &self.thresholds)) {
            for &(label, weight) in rule.effects {
                acc.add(label, weight);
            }
        }
        acc
    }

    pub fn evaluate(&self, features: &AggregatedFeatures) -> AudioVerdict {
        if self.is_silent(features) {
            tracing::debug!(
                target: LOG_TARGET,
                rms_mean = features.rms_mean,
                floor = self.silence_rms_floor,
                "silent input, audio branch returns uniform distribution"
            );
            return AudioVerdict {
                result: ClassificationResult::uninformative(),
                fired_rules: Vec::new(),
            };
        }
        let fired_rules = self.fired_rules(features);
        let result = ClassificationResult::from_scores(self.scores(features));
        tracing::trace!(
            target: LOG_TARGET,
            fired = ?fired_rules,
            label = %result.label,
            intensity = result.intensity,
            "audio rules evaluated"
        );
        AudioVerdict {
            result,
            fired_rules,
        }
    }

    pub fn classify(&self, features: &AggregatedFeatures) -> ClassificationResult {
        self.evaluate(features).result
    }
}
