use super::{ClassificationResult, EmotionLabel, ProbabilityVector, NEUTRAL_PRIOR};
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keyword lists per label. Matching is case-insensitive substring search, so Korean
/// entries are stems that also cover inflected forms.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Lexicon(BTreeMap<EmotionLabel, Vec<String>>);

const DEFAULT_KEYWORDS: [(EmotionLabel, &[&str]); 5] = [
    (
        EmotionLabel::Happy,
        &[
            "기뻐", "기쁘", "좋아", "행복", "감사", "웃", "즐거", "신나", "사랑", "happy", "joy",
            "great", "wonderful", "love", "glad", "cheerful",
        ],
    ),
    (
        EmotionLabel::Sad,
        &[
            "슬프", "우울", "힘들", "외로", "눈물", "그리워", "괴로", "아프", "sad", "cry",
            "miss", "lonely", "depressed", "sorrow", "grief",
        ],
    ),
    (
        EmotionLabel::Angry,
        &[
            "화나", "짜증", "열받", "싫어", "분노", "억울", "황당", "angry", "hate", "mad",
            "furious", "frustrated", "annoyed", "upset",
        ],
    ),
    (
        EmotionLabel::Excited,
        &[
            "흥분", "설레", "두근", "기대", "와우", "대박", "놀라", "excited", "wow", "amazing",
            "awesome", "thrilled", "incredible",
        ],
    ),
    (
        EmotionLabel::Calm,
        &[
            "평온", "차분", "괜찮", "안정", "편안", "조용", "calm", "peace", "relax", "okay",
            "fine", "quiet", "serene",
        ],
    ),
];

impl Default for Lexicon {
    fn default() -> Self {
        Self(
            DEFAULT_KEYWORDS
                .iter()
                .map(|(label, words)| (*label, words.iter().map(|w| (*w).to_owned()).collect()))
                .collect(),
        )
    }
}

impl Lexicon {
    pub fn new(entries: BTreeMap<EmotionLabel, Vec<String>>) -> Result<Self, ConfigError> {
        let lexicon = Self(entries);
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn keywords(&self, label: EmotionLabel) -> &[String] {
        self.0.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn keyword_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyword_count() == 0 {
            return Err(ConfigError::EmptyLexicon);
        }
        for (label, words) in &self.0 {
            if words.iter().any(|w| w.trim().is_empty()) {
                return Err(ConfigError::EmptyKeyword(*label));
            }
        }
        Ok(())
    }
}

/// Scores free text by counting lexicon hits per label.
#[derive(Clone, Debug)]
pub struct TextLexiconClassifier {
    // (label, lowercased keyword)
    keywords: Vec<(EmotionLabel, String)>,
}

impl TextLexiconClassifier {
    pub fn new(lexicon: &Lexicon) -> Self {
        let keywords = lexicon
            .0
            .iter()
            .flat_map(|(label, words)| words.iter().map(move |w| (*label, w.to_lowercase())))
            .collect();
        Self { keywords }
    }

    /// Neutral prior plus one point per non-overlapping keyword occurrence.
    pub fn scores(&self, text: &str) -> ProbabilityVector {
        let lowered = text.to_lowercase();
        let mut acc = ProbabilityVector::with_neutral_prior(NEUTRAL_PRIOR);
        for (label, keyword) in &self.keywords {
            let hits = lowered.matches(keyword.as_str()).count();
            if hits > 0 {
                acc.add(*label, hits as f32);
            }
        }
        acc
    }

    /// `None` when there is no text to score (absent, empty or whitespace only).
    pub fn classify(&self, text: &str) -> Option<ClassificationResult> {
        if text.trim().is_empty() {
            return None;
        }
        Some(ClassificationResult::from_scores(self.scores(text)))
    }
}
