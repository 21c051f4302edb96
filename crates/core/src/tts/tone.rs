use crate::config::ANALYSIS_SAMPLE_RATE;
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::f32::consts::PI;

const MS_PER_CHAR: usize = 80;
const MIN_DURATION_MS: usize = 500;
const SYLLABLES_PER_SEC: f32 = 4.0;

/// Deterministic stand-in voice: a hummed tone whose length follows the text and whose
/// amplitude pulses like syllables. Useful for exercising the prosody path offline.
#[derive(Clone, Debug)]
pub struct ToneTtsClient {
    sample_rate_hz: u32,
    base_freq_hz: f32,
    amplitude: f32,
}

impl ToneTtsClient {
    pub fn new() -> Self {
        Self {
            sample_rate_hz: ANALYSIS_SAMPLE_RATE,
            base_freq_hz: 180.0,
            amplitude: 0.4,
        }
    }

    pub fn with_voice(mut self, base_freq_hz: f32, amplitude: f32) -> Self {
        self.base_freq_hz = base_freq_hz;
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn render(&self, text: &str) -> Vec<i16> {
        let duration_ms = (text.chars().count() * MS_PER_CHAR).max(MIN_DURATION_MS);
        let sr = self.sample_rate_hz as f32;
        let samples = duration_ms * self.sample_rate_hz as usize / 1000;
        (0..samples)
            .map(|i| {
                let t = i as f32 / sr;
                let envelope = 0.5 - 0.5 * (2.0 * PI * SYLLABLES_PER_SEC * t).cos();
                let x = self.amplitude * envelope * (2.0 * PI * self.base_freq_hz * t).sin();
                (x * f32::from(i16::MAX)) as i16
            })
            .collect()
    }
}

impl Default for ToneTtsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsClient for ToneTtsClient {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            if request.text.trim().is_empty() {
                return Err(TtsError::EmptyText);
            }
            Ok(TtsAudio {
                sample_rate_hz: self.sample_rate_hz,
                channels: 1,
                pcm_i16: self.render(&request.text),
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn duration_follows_text_length() {
        let client = ToneTtsClient::new();
        let short = block_on(client.synthesize(TtsRequest::new("hi"))).unwrap();
        assert_eq!(short.pcm_i16.len(), 8_000);
        assert_eq!(short.duration().as_millis(), 500);

        let long = block_on(client.synthesize(TtsRequest::new("a".repeat(20)))).unwrap();
        assert_eq!(long.pcm_i16.len(), 20 * 80 * 16);
    }

    #[test]
    fn output_is_deterministic_and_bounded() {
        let client = ToneTtsClient::new().with_voice(220.0, 0.5);
        let a = block_on(client.synthesize(TtsRequest::new("안녕하세요"))).unwrap();
        let b = block_on(client.synthesize(TtsRequest::new("안녕하세요"))).unwrap();
        assert_eq!(a, b);
        let peak = a.pcm_i16.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak <= (0.5 * f32::from(i16::MAX)) as u16 + 1);
        assert!(peak > 10_000);
    }

    #[test]
    fn empty_text_is_rejected() {
        let client = ToneTtsClient::new();
        assert!(matches!(
            block_on(client.synthesize(TtsRequest::new("   "))),
            Err(TtsError::EmptyText)
        ));
    }
}
