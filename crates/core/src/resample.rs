use rubato::{FastFixedIn, PolynomialDegree, Resampler};

const CHUNK_SIZE: usize = 1024;

/// Denominator used when approximating a scale factor as a rational `n / d`.
pub const RATIONAL_DENOMINATOR: u32 = 200;

#[derive(thiserror::Error, Debug)]
pub enum ResampleError {
    #[error("resample ratio must be finite and positive, got {0}")]
    InvalidRatio(f64),
    #[error("resampler init failed: {0}")]
    Init(String),
    #[error("resampling failed: {0}")]
    Process(String),
}

/// Approximates `factor` as `n / denominator`, reduced to lowest terms. `n` is at least 1.
pub fn rational_approximation(factor: f64, denominator: u32) -> (u32, u32) {
    let denominator = denominator.max(1);
    let scaled = (factor * f64::from(denominator)).round();
    let n = if scaled.is_finite() && scaled >= 1.0 {
        scaled.min(f64::from(u32::MAX)) as u32
    } else {
        1
    };
    let g = gcd(n, denominator);
    (n / g, denominator / g)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Resamples a mono buffer by `ratio` (output rate / input rate) and trims or zero-pads the
/// result to exactly `target_len` samples.
pub fn resample_to_len(
    input: &[f32],
    ratio: f64,
    target_len: usize,
) -> Result<Vec<f32>, ResampleError> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(ResampleError::InvalidRatio(ratio));
    }
    if input.is_empty() || target_len == 0 {
        return Ok(vec![0.0; target_len]);
    }

    let mut resampler =
        FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, CHUNK_SIZE, 1)
            .map_err(|e| ResampleError::Init(e.to_string()))?;
    let delay = resampler.output_delay();

    let mut output = Vec::with_capacity(target_len + delay + CHUNK_SIZE);
    let mut chunk = vec![0.0f32; CHUNK_SIZE];
    let mut pos = 0;
    // keep feeding (zero-padded) chunks until the delayed tail is flushed
    while output.len() < target_len + delay {
        chunk.fill(0.0);
        if pos < input.len() {
            let end = (pos + CHUNK_SIZE).min(input.len());
            chunk[..end - pos].copy_from_slice(&input[pos..end]);
        }
        pos += CHUNK_SIZE;

        let resampled = resampler
            .process(&[chunk.as_slice()], None)
            .map_err(|e| ResampleError::Process(e.to_string()))?;
        match resampled.into_iter().next() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(&channel),
            _ => return Err(ResampleError::Process("resampler produced no output".into())),
        }
    }

    output.drain(..delay.min(output.len()));
    output.resize(target_len, 0.0);
    Ok(output)
}

/// Sample-rate conversion; returns the input unchanged when the rates already match.
pub fn resample_rate(
    input: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, ResampleError> {
    if source_rate == target_rate {
        return Ok(input.to_vec());
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(ResampleError::InvalidRatio(0.0));
    }
    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let target_len = (input.len() as f64 * ratio).round() as usize;
    resample_to_len(input, ratio, target_len)
}
