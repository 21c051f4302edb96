#![deny(warnings)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use emotion_prosody_core::config::{
    resolve_fusion_weights, resolve_optional_string, EmotionConfig, Env, StdEnv,
    ANALYSIS_SAMPLE_RATE, ENV_CONFIG_PATH,
};
use emotion_prosody_core::decode::{
    chunk_samples, encode_wav_i16, load_audio_bytes, normalize_peak, DEFAULT_CHUNK_MS, DEFAULT_PEAK,
};
use emotion_prosody_core::emotion::{EmotionAnalysis, EmotionLabel, EmotionService};
use emotion_prosody_core::prosody::apply_prosody;
use emotion_prosody_core::tts::{ProsodyTtsClient, ToneTtsClient, TtsClient, TtsRequest};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emotion-prosody")]
#[command(about = "Speech emotion classification and emotion-driven prosody transforms")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file (falls back to $EMOTION_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    audio_weight: Option<f32>,

    #[arg(long, global = true)]
    text_weight: Option<f32>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an utterance and print the full report as JSON
    Analyze {
        #[arg(long)]
        input: PathBuf,

        /// Transcript of the utterance
        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        pretty: bool,

        /// Emit one report per fixed-duration chunk, one JSON object per line
        #[arg(long, conflicts_with_all = ["text", "pretty"])]
        stream: bool,

        #[arg(
            long,
            default_value_t = DEFAULT_CHUNK_MS,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        chunk_ms: u32,
    },

    /// Print the prosody plan for a label and intensity
    Plan {
        #[arg(long)]
        label: EmotionLabel,

        #[arg(long)]
        intensity: f32,
    },

    /// Apply emotional prosody to a recording; without --label the recording's own
    /// classified emotion is used
    Transform {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[arg(long)]
        label: Option<EmotionLabel>,

        #[arg(long)]
        intensity: Option<f32>,

        #[arg(long)]
        text: Option<String>,

        /// Scale the result to a 0.95 peak before writing
        #[arg(long)]
        normalize: bool,
    },

    /// Render text with the placeholder tone voice, colored by an emotion
    Speak {
        #[arg(long)]
        text: String,

        #[arg(long)]
        label: EmotionLabel,

        #[arg(long, default_value_t = 1.0)]
        intensity: f32,

        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(&args, &env)?;

    tracing::info!(
        audio_weight = cfg.fusion.audio,
        text_weight = cfg.fusion.text,
        mfcc = cfg.analysis.compute_mfcc,
        "config loaded"
    );

    run(args.command, cfg).await
}

async fn run(command: Command, cfg: EmotionConfig) -> anyhow::Result<()> {
    match command {
        Command::Analyze {
            input,
            text,
            pretty,
            stream,
            chunk_ms,
        } => {
            let service = EmotionService::new(&cfg)?;
            let audio = read_audio(&input).await?;
            if stream {
                for analysis in analyze_chunks(&service, &audio, chunk_ms) {
                    println!("{}", serde_json::to_string(&analysis)?);
                }
                return Ok(());
            }
            let analysis = service.analyze(&audio, text.as_deref());
            tracing::info!(
                label = %analysis.result.label,
                intensity = analysis.result.intensity,
                latency_ms = analysis.latency_ms,
                "analysis complete"
            );
            let json = if pretty {
                serde_json::to_string_pretty(&analysis)?
            } else {
                serde_json::to_string(&analysis)?
            };
            println!("{json}");
        }

        Command::Plan { label, intensity } => {
            let plan = cfg.prosody.plan(label, intensity);
            println!("{}", serde_json::to_string(&plan)?);
        }

        Command::Transform {
            input,
            output,
            label,
            intensity,
            text,
            normalize,
        } => {
            let audio = read_audio(&input).await?;
            let (label, intensity) = match (label, intensity) {
                (Some(label), Some(intensity)) => (label, intensity),
                (Some(label), None) => (label, 1.0),
                (None, explicit) => {
                    let service = EmotionService::new(&cfg)?;
                    let result = service.classify(&audio, text.as_deref());
                    tracing::info!(
                        label = %result.label,
                        intensity = result.intensity,
                        "using classified emotion"
                    );
                    (result.label, explicit.unwrap_or(result.intensity))
                }
            };
            let plan = cfg.prosody.plan(label, intensity);
            let mut shaped = apply_prosody(&audio, &plan)
                .with_context(|| format!("failed to apply prosody for {label}"))?;
            if normalize {
                shaped = normalize_peak(&shaped, DEFAULT_PEAK);
            }
            write_wav(&output, &shaped, ANALYSIS_SAMPLE_RATE).await?;
            tracing::info!(
                label = %label,
                rate = plan.rate_factor,
                pitch = plan.pitch_shift_semitones,
                energy = plan.energy_factor,
                samples_in = audio.len(),
                samples_out = shaped.len(),
                output = %output.display(),
                "transform written"
            );
        }

        Command::Speak {
            text,
            label,
            intensity,
            output,
        } => {
            let tts = ProsodyTtsClient::with_table(ToneTtsClient::new(), cfg.prosody.clone());
            let audio = tts
                .synthesize(TtsRequest::new(text).with_emotion(label, intensity))
                .await
                .context("synthesis failed")?;
            let wav = audio.to_wav()?;
            tokio::fs::write(&output, wav)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!(
                label = %label,
                duration_ms = audio.duration().as_millis() as u64,
                output = %output.display(),
                "speech written"
            );
        }
    }
    Ok(())
}

/// Audio-only reports over consecutive chunks; the last chunk may be short.
fn analyze_chunks(service: &EmotionService, audio: &[f32], chunk_ms: u32) -> Vec<EmotionAnalysis> {
    chunk_samples(audio, ANALYSIS_SAMPLE_RATE, chunk_ms)
        .map(|chunk| service.analyze(chunk, None))
        .collect()
}

async fn read_audio(path: &Path) -> anyhow::Result<Vec<f32>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    load_audio_bytes(bytes, ANALYSIS_SAMPLE_RATE)
        .with_context(|| format!("failed to decode {}", path.display()))
}

async fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let wav = encode_wav_i16(samples, sample_rate)?;
    tokio::fs::write(path, wav)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: &Args, env: &impl Env) -> anyhow::Result<EmotionConfig> {
    let mut cfg = match resolve_optional_string(args.config.clone(), ENV_CONFIG_PATH, env) {
        Some(path) => EmotionConfig::load(Path::new(&path))?,
        None => EmotionConfig::default(),
    };
    cfg.fusion = resolve_fusion_weights(args.audio_weight, args.text_weight, env, cfg.fusion)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emotion_prosody_core::config::{MapEnv, ENV_TEXT_WEIGHT};

    #[test]
    fn parses_subcommands_with_global_flags() {
        let args = Args::try_parse_from([
            "emotion-prosody",
            "plan",
            "--label",
            "sad",
            "--intensity",
            "0.5",
            "--audio-weight",
            "0.7",
        ])
        .unwrap();
        assert_eq!(args.audio_weight, Some(0.7));
        assert!(matches!(
            args.command,
            Command::Plan {
                label: EmotionLabel::Sad,
                ..
            }
        ));
    }

    #[test]
    fn unknown_label_is_a_usage_error() {
        assert!(Args::try_parse_from([
            "emotion-prosody",
            "plan",
            "--label",
            "bored",
            "--intensity",
            "1"
        ])
        .is_err());
    }

    #[test]
    fn cli_weight_overrides_env_and_complements() {
        let args = Args::try_parse_from([
            "emotion-prosody",
            "--text-weight",
            "0.25",
            "plan",
            "--label",
            "calm",
            "--intensity",
            "1",
        ])
        .unwrap();
        let env = MapEnv::default().with_var(ENV_TEXT_WEIGHT, "0.9");
        let cfg = build_config(&args, &env).unwrap();
        assert_eq!(cfg.fusion.text, 0.25);
        assert_eq!(cfg.fusion.audio, 0.75);
    }

    #[test]
    fn stream_defaults_to_quarter_second_chunks() {
        let args =
            Args::try_parse_from(["emotion-prosody", "analyze", "--input", "a.wav", "--stream"])
                .unwrap();
        assert!(matches!(
            args.command,
            Command::Analyze {
                stream: true,
                chunk_ms: 250,
                ..
            }
        ));
        assert!(Args::try_parse_from([
            "emotion-prosody",
            "analyze",
            "--input",
            "a.wav",
            "--stream",
            "--text",
            "hi"
        ])
        .is_err());
        assert!(Args::try_parse_from([
            "emotion-prosody",
            "analyze",
            "--input",
            "a.wav",
            "--chunk-ms",
            "0"
        ])
        .is_err());
    }

    #[test]
    fn chunked_analysis_covers_the_recording() {
        let service = EmotionService::new(&EmotionConfig::default()).unwrap();
        // 1.1 s: four full 250 ms chunks plus a 100 ms tail shorter than one frame
        let audio = vec![0.0f32; 17_600];
        let reports = analyze_chunks(&service, &audio, DEFAULT_CHUNK_MS);
        assert_eq!(reports.len(), 5);
        for report in &reports {
            assert_eq!(report.result.label, EmotionLabel::Neutral);
            assert!(report.branches.text.is_none());
        }
    }

    #[test]
    fn transform_accepts_normalize_without_label() {
        let args = Args::try_parse_from([
            "emotion-prosody",
            "transform",
            "--input",
            "in.wav",
            "--output",
            "out.wav",
            "--normalize",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::Transform {
                label: None,
                normalize: true,
                ..
            }
        ));
    }

    #[test]
    fn missing_config_file_fails_fast() {
        let args = Args::try_parse_from([
            "emotion-prosody",
            "plan",
            "--label",
            "calm",
            "--intensity",
            "1",
        ])
        .unwrap();
        let env = MapEnv::default().with_var(ENV_CONFIG_PATH, "/nonexistent/emotion.json");
        assert!(build_config(&args, &env).is_err());
    }
}
