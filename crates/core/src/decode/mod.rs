use crate::resample::{resample_rate, ResampleError};
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

const LOG_TARGET: &str = "decode";

/// Peak level used by [`normalize_peak`] callers that have no preference.
pub const DEFAULT_PEAK: f32 = 0.95;
/// Streaming chunk duration.
pub const DEFAULT_CHUNK_MS: u32 = 250;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("unsupported or unrecognized audio container: {0}")]
    UnsupportedFormat(String),

    #[error("no decodable audio track found")]
    NoAudioTrack,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("wav encoding failed: {0}")]
    Wav(String),

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Mono samples at their native rate.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source before downmixing.
    pub source_channels: usize,
}

impl DecodedAudio {
    pub fn duration(&self) -> Duration {
        duration_from_samples(self.sample_rate, self.samples.len())
    }
}

/// Decodes any container/codec symphonia recognizes and downmixes to mono.
pub fn decode_bytes(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };
        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buf.samples());
    }

    if skipped_packets > 0 {
        tracing::warn!(target: LOG_TARGET, skipped_packets, "skipped undecodable packets");
    }
    if sample_rate == 0 {
        return Err(DecodeError::Codec("stream reports no sample rate".to_owned()));
    }

    let samples = downmix_to_mono(&interleaved, channels.max(1));
    tracing::debug!(
        target: LOG_TARGET,
        sample_rate,
        channels,
        samples = samples.len(),
        "decoded audio"
    );
    Ok(DecodedAudio {
        samples,
        sample_rate,
        source_channels: channels.max(1),
    })
}

/// Decodes encoded audio to mono `f32` at `target_sr`.
pub fn load_audio_bytes(bytes: Vec<u8>, target_sr: u32) -> Result<Vec<f32>> {
    let decoded = decode_bytes(bytes)?;
    if decoded.sample_rate == target_sr {
        return Ok(decoded.samples);
    }
    tracing::debug!(
        target: LOG_TARGET,
        from = decoded.sample_rate,
        to = target_sr,
        duration_ms = decoded.duration().as_millis() as u64,
        "resampling decoded audio"
    );
    Ok(resample_rate(&decoded.samples, decoded.sample_rate, target_sr)?)
}

/// Averages interleaved frames into one channel; a trailing partial frame is dropped.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Encodes mono samples as 16-bit PCM WAV bytes.
pub fn encode_wav_i16(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| DecodeError::Wav(e.to_string()))?;
        for s in f32_to_i16_pcm(samples) {
            writer
                .write_sample(s)
                .map_err(|e| DecodeError::Wav(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| DecodeError::Wav(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

pub fn i16_to_f32_pcm(samples: &[i16]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let scale = 1.0f32 / 32768.0f32;
    samples.iter().map(|&s| f32::from(s) * scale).collect()
}

/// Clamps to `[-1, 1]` and scales to the `i16` range; non-finite samples become 0.
pub fn f32_to_i16_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            if s.is_finite() {
                (s.clamp(-1.0, 1.0) * 32767.0).round() as i16
            } else {
                0
            }
        })
        .collect()
}

/// Scales so the absolute peak equals `target_peak`; near-silent input is returned as is.
pub fn normalize_peak(samples: &[f32], target_peak: f32) -> Vec<f32> {
    let peak = samples
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0f32, |m, s| m.max(s.abs()));
    if peak <= 1e-6 {
        return samples.to_vec();
    }
    let gain = target_peak / peak;
    samples.iter().map(|&s| s * gain).collect()
}

/// Fixed-duration chunks for streaming; the last chunk may be shorter.
pub fn chunk_samples(
    samples: &[f32],
    sample_rate: u32,
    chunk_ms: u32,
) -> std::slice::Chunks<'_, f32> {
    let len = (u64::from(sample_rate) * u64::from(chunk_ms) / 1000).max(1) as usize;
    samples.chunks(len)
}

pub fn duration_from_samples(sample_rate_hz: u32, samples: usize) -> Duration {
    if sample_rate_hz == 0 {
        return Duration::from_secs(0);
    }
    let micros = (u128::from(samples as u64) * 1_000_000u128) / u128::from(sample_rate_hz);
    Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn i16_to_f32_basic() {
        let v = i16_to_f32_pcm(&[-32768, -1, 0, 1, 32767]);
        assert!((v[0] + 1.0).abs() < 1e-6);
        assert!((v[2] - 0.0).abs() < 1e-6);
        assert!(v[4] <= 1.0);
        assert!(v[4] > 0.9999);
    }

    #[test]
    fn f32_to_i16_clamps_and_zeroes_non_finite() {
        assert_eq!(
            f32_to_i16_pcm(&[0.0, 1.0, -1.0, 2.0, -3.0, f32::NAN, 0.5]),
            vec![0, 32767, -32767, 32767, -32767, 0, 16384]
        );
    }

    #[test]
    fn duration_from_samples_mono_16k() {
        assert_eq!(duration_from_samples(16_000, 16_000).as_secs(), 1);
        assert_eq!(duration_from_samples(16_000, 4_000), Duration::from_millis(250));
        assert_eq!(duration_from_samples(0, 4_000), Duration::ZERO);
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        // left = 0.5, right = -0.25 (as i16)
        let frames: Vec<i16> = (0..800).flat_map(|_| [16384i16, -8192]).collect();
        let decoded = decode_bytes(wav_bytes(&frames, 16_000, 2)).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.source_channels, 2);
        assert_eq!(decoded.samples.len(), 800);
        assert!(decoded.samples.iter().all(|s| (s - 0.125).abs() < 1e-3));
        assert_eq!(decoded.duration(), Duration::from_millis(50));
    }

    #[test]
    fn load_resamples_to_target_rate() {
        let tone: Vec<i16> = (0..8_000)
            .map(|i| ((2.0 * PI * 220.0 * i as f32 / 8_000.0).sin() * 10_000.0) as i16)
            .collect();
        let samples = load_audio_bytes(wav_bytes(&tone, 8_000, 1), 16_000).unwrap();
        assert_eq!(samples.len(), 16_000);
    }

    #[test]
    fn wav_encoding_decodes_back() {
        let input: Vec<f32> = (0..1_600)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 16_000.0).sin())
            .collect();
        let bytes = encode_wav_i16(&input, 16_000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        let back = load_audio_bytes(bytes, 16_000).unwrap();
        assert_eq!(back.len(), input.len());
        for (a, b) in input.iter().zip(&back) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            decode_bytes(b"definitely not audio".to_vec()),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix_to_mono(&[1.0, 0.0, 0.5, 0.5, 0.9], 2), vec![0.5, 0.5]);
        assert_eq!(downmix_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn normalize_peak_scales_to_target() {
        let out = normalize_peak(&[0.1, -0.5, 0.25], DEFAULT_PEAK);
        assert!((out[1] + 0.95).abs() < 1e-6);
        assert!((out[0] - 0.19).abs() < 1e-6);
        assert_eq!(normalize_peak(&[0.0, 1e-8], DEFAULT_PEAK), vec![0.0, 1e-8]);
    }

    #[test]
    fn chunks_have_fixed_duration() {
        let samples = vec![0.0f32; 10_000];
        let chunks: Vec<&[f32]> = chunk_samples(&samples, 16_000, DEFAULT_CHUNK_MS).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4_000);
        assert_eq!(chunks[2].len(), 2_000);
    }
}
