use super::fusion::fuse;
use super::lexicon::TextLexiconClassifier;
use super::rules::{AudioRuleClassifier, AudioVerdict};
use super::{ClassificationResult, EmotionError};
use crate::config::{ConfigError, EmotionConfig, FusionWeights};
use crate::features::{AggregatedFeatures, FeatureExtractor};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Instant;

const LOG_TARGET: &str = "emotion::analyzer";

pub trait EmotionAnalyzer: Send + Sync {
    fn analyze_utterance(
        &self,
        audio: Vec<f32>,
        text: Option<String>,
    ) -> BoxFuture<'_, Result<EmotionAnalysis, EmotionError>>;
}

/// Per-branch results before fusion. `text` is absent when no usable text was supplied.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BranchResults {
    pub audio: ClassificationResult,
    pub text: Option<ClassificationResult>,
}

/// Full report for one utterance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionAnalysis {
    #[serde(flatten)]
    pub result: ClassificationResult,
    pub features: AggregatedFeatures,
    pub branches: BranchResults,
    pub fired_rules: Vec<String>,
    /// Wall-clock time spent in analysis; informational only.
    pub latency_ms: f64,
}

/// Audio + text emotion classifier with late fusion.
///
/// Immutable after construction; share it behind an `Arc` to serve concurrent callers.
#[derive(Debug)]
pub struct EmotionService {
    extractor: FeatureExtractor,
    audio: AudioRuleClassifier,
    text: TextLexiconClassifier,
    weights: FusionWeights,
}

impl EmotionService {
    pub fn new(config: &EmotionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            extractor: FeatureExtractor::new(&config.analysis),
            audio: AudioRuleClassifier::new(
                config.rules.clone(),
                config.analysis.silence_rms_floor,
            ),
            text: TextLexiconClassifier::new(&config.lexicon),
            weights: config.fusion,
        })
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    pub fn extract_features(&self, audio: &[f32]) -> AggregatedFeatures {
        self.extractor.extract(&sanitize(audio))
    }

    pub fn classify_audio(&self, audio: &[f32]) -> ClassificationResult {
        self.audio.classify(&self.extract_features(audio))
    }

    pub fn classify_text(&self, text: &str) -> Option<ClassificationResult> {
        self.text.classify(text)
    }

    /// Fused label and intensity for one utterance.
    pub fn classify(&self, audio: &[f32], text: Option<&str>) -> ClassificationResult {
        self.analyze(audio, text).result
    }

    pub fn analyze(&self, audio: &[f32], text: Option<&str>) -> EmotionAnalysis {
        let started = Instant::now();

        let features = self.extract_features(audio);
        let AudioVerdict {
            result: audio_result,
            fired_rules,
        } = self.audio.evaluate(&features);
        let text_result = text.and_then(|t| self.text.classify(t));
        let result = fuse(&audio_result, text_result.as_ref(), self.weights);

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            target: LOG_TARGET,
            label = %result.label,
            intensity = result.intensity,
            audio_label = %audio_result.label,
            text_label = text_result.as_ref().map(|r| r.label.as_str()),
            fired = ?fired_rules,
            latency_ms,
            "utterance classified"
        );

        EmotionAnalysis {
            result,
            features,
            branches: BranchResults {
                audio: audio_result,
                text: text_result,
            },
            fired_rules: fired_rules.into_iter().map(str::to_owned).collect(),
            latency_ms,
        }
    }
}

impl EmotionAnalyzer for EmotionService {
    fn analyze_utterance(
        &self,
        audio: Vec<f32>,
        text: Option<String>,
    ) -> BoxFuture<'_, Result<EmotionAnalysis, EmotionError>> {
        async move { Ok(self.analyze(&audio, text.as_deref())) }.boxed()
    }
}

/// Replaces NaN and infinite samples with silence.
fn sanitize(audio: &[f32]) -> Cow<'_, [f32]> {
    let bad = audio.iter().filter(|x| !x.is_finite()).count();
    if bad == 0 {
        return Cow::Borrowed(audio);
    }
    tracing::warn!(
        target: LOG_TARGET,
        non_finite = bad,
        total = audio.len(),
        "replacing non-finite samples with 0"
    );
    Cow::Owned(
        audio
            .iter()
            .map(|&x| if x.is_finite() { x } else { 0.0 })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_borrows_clean_input() {
        let clean = [0.1, -0.2, 0.0];
        assert!(matches!(sanitize(&clean), Cow::Borrowed(_)));

        let dirty = [0.1, f32::NAN, f32::INFINITY, -0.3];
        assert_eq!(sanitize(&dirty).as_ref(), &[0.1, 0.0, 0.0, -0.3]);
    }

    #[test]
    fn construction_rejects_invalid_config() {
        let mut cfg = EmotionConfig::default();
        cfg.fusion = FusionWeights {
            audio: 0.9,
            text: 0.5,
        };
        assert!(matches!(
            EmotionService::new(&cfg),
            Err(ConfigError::WeightsDoNotSumToOne { .. })
        ));
    }
}
