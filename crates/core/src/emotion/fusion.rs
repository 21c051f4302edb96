use super::{ClassificationResult, EmotionLabel, ProbabilityVector};
use crate::config::FusionWeights;

/// Weighted late fusion of the audio and text branches.
///
/// Without a text result the audio result is returned unchanged.
pub fn fuse(
    audio: &ClassificationResult,
    text: Option<&ClassificationResult>,
    weights: FusionWeights,
) -> ClassificationResult {
    let Some(text) = text else {
        return audio.clone();
    };
    let mut fused = ProbabilityVector::zeros();
    for label in EmotionLabel::ALL {
        fused.set(
            label,
            weights.audio * audio.probabilities.get(label)
                + weights.text * text.probabilities.get(label),
        );
    }
    ClassificationResult::from_scores(fused)
}
