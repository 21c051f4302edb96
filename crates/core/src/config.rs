use crate::emotion::{EmotionLabel, Lexicon, RuleThresholds};
use crate::prosody::ProsodyTable;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ANALYSIS_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_LEN: usize = 2048;
pub const DEFAULT_HOP_LEN: usize = 512;
pub const DEFAULT_AUDIO_WEIGHT: f32 = 0.6;
pub const DEFAULT_TEXT_WEIGHT: f32 = 0.4;
pub const ENV_AUDIO_WEIGHT: &str = "EMOTION_AUDIO_WEIGHT";
pub const ENV_TEXT_WEIGHT: &str = "EMOTION_TEXT_WEIGHT";
pub const ENV_CONFIG_PATH: &str = "EMOTION_CONFIG";

const WEIGHT_SUM_TOLERANCE: f32 = 1e-6;

/// Signal-analysis parameters shared by every feature extractor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sample_rate: u32,
    pub frame_len: usize,
    pub hop_len: usize,
    pub f0_min_hz: f32,
    pub f0_max_hz: f32,
    pub voicing_threshold: f32,
    /// Mean F0 at or below this is considered "no usable pitch".
    pub f0_reliable_min_hz: f32,
    pub f0_fallback_mean_hz: f32,
    pub f0_fallback_std_hz: f32,
    pub n_mels: usize,
    pub log_floor: f32,
    pub compute_mfcc: bool,
    pub onset_threshold_ratio: f32,
    /// Utterances whose mean RMS is at or below this carry no usable signal.
    pub silence_rms_floor: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
            frame_len: DEFAULT_FRAME_LEN,
            hop_len: DEFAULT_HOP_LEN,
            f0_min_hz: 65.0,
            f0_max_hz: 2093.0,
            voicing_threshold: 0.25,
            f0_reliable_min_hz: 50.0,
            f0_fallback_mean_hz: 150.0,
            f0_fallback_std_hz: 25.0,
            n_mels: 40,
            log_floor: 1e-10,
            compute_mfcc: true,
            onset_threshold_ratio: 0.5,
            silence_rms_floor: 1e-4,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidAnalysis("sample_rate must be > 0"));
        }
        if self.frame_len < 2 || self.hop_len == 0 {
            return Err(ConfigError::InvalidAnalysis(
                "frame_len must be >= 2 and hop_len > 0",
            ));
        }
        if !(self.f0_min_hz > 0.0 && self.f0_min_hz < self.f0_max_hz) {
            return Err(ConfigError::InvalidAnalysis(
                "f0 range must satisfy 0 < f0_min_hz < f0_max_hz",
            ));
        }
        let longest_lag = (self.sample_rate as f32 / self.f0_min_hz).floor() as usize;
        if longest_lag >= self.frame_len {
            return Err(ConfigError::InvalidAnalysis(
                "frame_len must exceed the longest pitch lag (sample_rate / f0_min_hz)",
            ));
        }
        if self.compute_mfcc && self.n_mels == 0 {
            return Err(ConfigError::InvalidAnalysis("n_mels must be > 0"));
        }
        if !(self.log_floor > 0.0) {
            return Err(ConfigError::InvalidAnalysis("log_floor must be > 0"));
        }
        Ok(())
    }
}

/// Weights of the audio and text branches in fusion; each in `[0, 1]`, summing to 1.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionWeights {
    pub audio: f32,
    pub text: f32,
}

impl FusionWeights {
    pub fn new(audio: f32, text: f32) -> Result<Self, ConfigError> {
        let w = Self { audio, text };
        w.validate()?;
        Ok(w)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |w: f32| w.is_finite() && (0.0..=1.0).contains(&w);
        if !in_range(self.audio) || !in_range(self.text) {
            return Err(ConfigError::WeightOutOfRange {
                audio: self.audio,
                text: self.text,
            });
        }
        if (self.audio + self.text - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightsDoNotSumToOne {
                audio: self.audio,
                text: self.text,
            });
        }
        Ok(())
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            audio: DEFAULT_AUDIO_WEIGHT,
            text: DEFAULT_TEXT_WEIGHT,
        }
    }
}

/// Everything the classifier and prosody planner read; loaded once, never mutated.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmotionConfig {
    pub analysis: AnalysisConfig,
    pub rules: RuleThresholds,
    pub lexicon: Lexicon,
    pub fusion: FusionWeights,
    pub prosody: ProsodyTable,
}

impl EmotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        self.rules.validate()?;
        self.lexicon.validate()?;
        self.fusion.validate()?;
        self.prosody.validate()?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("fusion weights must each be within [0, 1], got audio={audio} text={text}")]
    WeightOutOfRange { audio: f32, text: f32 },
    #[error("fusion weights must sum to 1.0, got audio={audio} text={text}")]
    WeightsDoNotSumToOne { audio: f32, text: f32 },
    #[error("lexicon has no keywords")]
    EmptyLexicon,
    #[error("lexicon entry for {0} contains an empty keyword")]
    EmptyKeyword(EmotionLabel),
    #[error("prosody table has no entry for {0}")]
    MissingProsodyEntry(EmotionLabel),
    #[error("prosody entry for {0} must be finite with positive rate and energy")]
    InvalidProsodyEntry(EmotionLabel),
    #[error("rule threshold {0} must be finite")]
    InvalidThreshold(&'static str),
    #[error("invalid analysis parameters: {0}")]
    InvalidAnalysis(&'static str),
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: String, value: String },
    #[error("failed to read config {path}: {details}")]
    Io { path: String, details: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_f32(
    cli_value: Option<f32>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<f32>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(v)),
        None => match env.var(env_key) {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidNumber {
                    key: env_key.to_owned(),
                    value: raw,
                }),
            None => Ok(None),
        },
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

/// Resolves fusion weights from CLI values and the environment on top of `base`.
///
/// When only one weight is given the other becomes its complement.
pub fn resolve_fusion_weights(
    cli_audio: Option<f32>,
    cli_text: Option<f32>,
    env: &impl Env,
    base: FusionWeights,
) -> Result<FusionWeights, ConfigError> {
    let audio = resolve_f32(cli_audio, ENV_AUDIO_WEIGHT, env)?;
    let text = resolve_f32(cli_text, ENV_TEXT_WEIGHT, env)?;
    match (audio, text) {
        (Some(a), Some(t)) => FusionWeights::new(a, t),
        (Some(a), None) => FusionWeights::new(a, 1.0 - a),
        (None, Some(t)) => FusionWeights::new(1.0 - t, t),
        (None, None) => {
            base.validate()?;
            Ok(base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EmotionConfig::default().validate().expect("defaults are valid");
        assert_eq!(FusionWeights::default(), FusionWeights::new(0.6, 0.4).unwrap());
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert!(matches!(
            FusionWeights::new(0.7, 0.4),
            Err(ConfigError::WeightsDoNotSumToOne { .. })
        ));
        assert!(matches!(
            FusionWeights::new(1.2, -0.2),
            Err(ConfigError::WeightOutOfRange { .. })
        ));
        assert!(matches!(
            FusionWeights::new(f32::NAN, 0.4),
            Err(ConfigError::WeightOutOfRange { .. })
        ));
        assert!(FusionWeights::new(1.0, 0.0).is_ok());
    }

    #[test]
    fn cli_weight_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_AUDIO_WEIGHT, "0.9");
        let w = resolve_fusion_weights(Some(0.5), None, &env, FusionWeights::default())
            .expect("valid");
        assert_eq!(w.audio, 0.5);
        assert_eq!(w.text, 0.5);
    }

    #[test]
    fn env_weight_used_when_cli_missing_and_complemented() {
        let env = MapEnv::default().with_var(ENV_TEXT_WEIGHT, "0.25");
        let w = resolve_fusion_weights(None, None, &env, FusionWeights::default())
            .expect("valid");
        assert_eq!(w.text, 0.25);
        assert_eq!(w.audio, 0.75);
    }

    #[test]
    fn base_weights_used_when_nothing_overrides() {
        let env = MapEnv::default();
        let w = resolve_fusion_weights(None, None, &env, FusionWeights::default())
            .expect("valid");
        assert_eq!(w, FusionWeights::default());
    }

    #[test]
    fn unparsable_env_weight_is_rejected() {
        let env = MapEnv::default().with_var(ENV_AUDIO_WEIGHT, "loud");
        let err = resolve_fusion_weights(None, None, &env, FusionWeights::default())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                key: ENV_AUDIO_WEIGHT.to_owned(),
                value: "loud".to_owned()
            }
        );
    }

    #[test]
    fn conflicting_weights_fail_fast() {
        let env = MapEnv::default()
            .with_var(ENV_AUDIO_WEIGHT, "0.6")
            .with_var(ENV_TEXT_WEIGHT, "0.6");
        assert!(resolve_fusion_weights(None, None, &env, FusionWeights::default()).is_err());
    }

    #[test]
    fn config_path_cli_takes_precedence() {
        let env = MapEnv::default().with_var(ENV_CONFIG_PATH, "/etc/env.json");
        assert_eq!(
            resolve_optional_string(Some("cli.json".to_owned()), ENV_CONFIG_PATH, &env),
            Some("cli.json".to_owned())
        );
        assert_eq!(
            resolve_optional_string(None, ENV_CONFIG_PATH, &env),
            Some("/etc/env.json".to_owned())
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = EmotionConfig::from_json_str(r#"{ "fusion": { "audio": 0.8, "text": 0.2 } }"#)
            .expect("valid config");
        assert_eq!(cfg.fusion.audio, 0.8);
        assert_eq!(cfg.analysis, AnalysisConfig::default());
        assert_eq!(cfg.rules, RuleThresholds::default());
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        assert!(matches!(
            EmotionConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EmotionConfig::from_json_str(r#"{ "fusion": { "audio": 0.9, "text": 0.9 } }"#),
            Err(ConfigError::WeightsDoNotSumToOne { .. })
        ));
        assert!(matches!(
            EmotionConfig::from_json_str(r#"{ "analysis": { "hop_len": 0 } }"#),
            Err(ConfigError::InvalidAnalysis(_))
        ));
    }

    #[test]
    fn missing_config_file_reports_path() {
        let err = EmotionConfig::load(Path::new("/nonexistent/emotion.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/emotion.json"));
    }
}
