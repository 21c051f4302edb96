mod prosody;
mod tone;

use crate::decode::DecodeError;
use crate::emotion::EmotionLabel;
use crate::prosody::ProsodyError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use prosody::ProsodyTtsClient;
pub use tone::ToneTtsClient;

/// Emotion the synthesized speech should carry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionCue {
    pub label: EmotionLabel,
    pub intensity: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TtsRequest {
    pub text: String,
    pub emotion: Option<EmotionCue>,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emotion: None,
        }
    }

    pub fn with_emotion(mut self, label: EmotionLabel, intensity: f32) -> Self {
        self.emotion = Some(EmotionCue { label, intensity });
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TtsAudio {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub pcm_i16: Vec<i16>,
}

impl TtsAudio {
    pub fn duration(&self) -> std::time::Duration {
        let frames = self.pcm_i16.len() / usize::from(self.channels.max(1));
        crate::decode::duration_from_samples(self.sample_rate_hz, frames)
    }

    pub fn to_wav(&self) -> Result<Vec<u8>, TtsError> {
        let mono = crate::decode::downmix_to_mono(
            &crate::decode::i16_to_f32_pcm(&self.pcm_i16),
            usize::from(self.channels.max(1)),
        );
        Ok(crate::decode::encode_wav_i16(&mono, self.sample_rate_hz)?)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("nothing to synthesize: text is empty")]
    EmptyText,

    #[error("prosody transform failed: {0}")]
    Prosody(#[from] ProsodyError),

    #[error("audio encoding failed: {0}")]
    Encode(#[from] DecodeError),
}

pub trait TtsClient: Send + Sync {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>>;
}
