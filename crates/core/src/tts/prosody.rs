use crate::decode::{downmix_to_mono, f32_to_i16_pcm, i16_to_f32_pcm};
use crate::prosody::{apply_prosody, ProsodyTable};
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use futures::future::BoxFuture;
use futures::FutureExt;

const LOG_TARGET: &str = "tts::prosody";

/// Synthesizes through `C`, then colors the result with the prosody plan of the request's
/// emotion cue. Requests without a cue pass through untouched.
#[derive(Clone, Debug)]
pub struct ProsodyTtsClient<C>
where
    C: TtsClient,
{
    inner: C,
    table: ProsodyTable,
}

impl<C> ProsodyTtsClient<C>
where
    C: TtsClient,
{
    pub fn new(inner: C) -> Self {
        Self::with_table(inner, ProsodyTable::default())
    }

    pub fn with_table(inner: C, table: ProsodyTable) -> Self {
        Self { inner, table }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C> TtsClient for ProsodyTtsClient<C>
where
    C: TtsClient,
{
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            let cue = request.emotion;
            let audio = self.inner.synthesize(request).await?;
            let Some(cue) = cue else {
                return Ok(audio);
            };

            let plan = self.table.plan(cue.label, cue.intensity);
            if plan.is_identity() {
                return Ok(audio);
            }

            let mono = downmix_to_mono(
                &i16_to_f32_pcm(&audio.pcm_i16),
                usize::from(audio.channels.max(1)),
            );
            let shaped = apply_prosody(&mono, &plan)?;
            tracing::debug!(
                target: LOG_TARGET,
                label = %cue.label,
                intensity = cue.intensity,
                rate = plan.rate_factor,
                pitch = plan.pitch_shift_semitones,
                energy = plan.energy_factor,
                samples_in = mono.len(),
                samples_out = shaped.len(),
                "applied emotional prosody"
            );

            Ok(TtsAudio {
                sample_rate_hz: audio.sample_rate_hz,
                channels: 1,
                pcm_i16: f32_to_i16_pcm(&shaped),
            })
        }
        .boxed()
    }
}
