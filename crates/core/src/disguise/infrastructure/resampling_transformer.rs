use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;
use thiserror::Error;

use crate::disguise::domain::voice_transformer::VoiceTransformer;
use crate::profiles::factor_sampler::DisguiseFactors;
use crate::shared::chunk::AudioChunk;

/// Errors produced by the resampling transform.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("scaling factor must be a positive finite number, got {0}")]
    InvalidFactor(f32),
}

/// Two-stage Fourier resampler that shifts pitch and formants together.
///
/// Stage one resamples the chunk to `round(len / pitch)` samples, stage two
/// resamples that result by the formant factor, and a raised-cosine taper
/// sized to the final length suppresses frame-boundary clicks. Played back
/// at the original rate the output's frequencies scale by `pitch * formant`
/// while its duration scales by the reciprocal, so factor products away
/// from 1.0 trade stream time against frequency; the playback sink's
/// backpressure absorbs the difference.
pub struct ResamplingTransformer;

impl ResamplingTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResamplingTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceTransformer for ResamplingTransformer {
    fn transform(
        &self,
        chunk: &AudioChunk,
        factors: DisguiseFactors,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        for factor in [factors.pitch, factors.formant] {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(ResampleError::InvalidFactor(factor).into());
            }
        }
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        let samples: Vec<f64> = chunk.samples().iter().map(|&s| s as f64).collect();
        let mut planner = FftPlanner::<f64>::new();

        let pitched = fourier_resample(
            &samples,
            scaled_len(samples.len(), factors.pitch),
            &mut planner,
        );
        let shaped = fourier_resample(
            &pitched,
            scaled_len(pitched.len(), factors.formant),
            &mut planner,
        );

        Ok(apply_taper(&shaped))
    }
}

/// Target length for resampling `len` samples by `factor`.
fn scaled_len(len: usize, factor: f32) -> usize {
    (len as f64 / factor as f64).round() as usize
}

/// Fourier-domain resampling.
///
/// The spectrum is truncated or zero-padded to the target length with
/// Hermitian symmetry preserved, so surviving frequencies keep their
/// amplitude while the waveform stretches or compresses in time. When the
/// retained band has even width its edge bin is folded (downsampling) or
/// split (upsampling) to keep the output real-valued.
fn fourier_resample(input: &[f64], new_len: usize, planner: &mut FftPlanner<f64>) -> Vec<f64> {
    let old_len = input.len();
    if old_len == 0 || new_len == 0 {
        return Vec::new();
    }
    if new_len == old_len {
        return input.to_vec();
    }

    let mut spectrum: Vec<Complex<f64>> = input.iter().map(|&s| Complex::new(s, 0.0)).collect();
    planner.plan_fft_forward(old_len).process(&mut spectrum);

    let keep = old_len.min(new_len);
    let nyq = keep / 2 + 1;
    let mut resized = vec![Complex::new(0.0, 0.0); new_len];
    resized[..nyq].copy_from_slice(&spectrum[..nyq]);
    for k in 1..=(keep - nyq) {
        resized[new_len - k] = spectrum[old_len - k];
    }
    if keep % 2 == 0 {
        let edge = keep / 2;
        if new_len < old_len {
            resized[edge] += spectrum[old_len - edge];
        } else {
            resized[edge] *= 0.5;
            resized[new_len - edge] = resized[edge];
        }
    }

    planner.plan_fft_inverse(new_len).process(&mut resized);
    let scale = 1.0 / old_len as f64;
    resized.iter().map(|value| value.re * scale).collect()
}

/// Multiplies by a symmetric raised-cosine window, zero at both ends.
fn apply_taper(samples: &[f64]) -> Vec<f32> {
    let len = samples.len();
    if len < 2 {
        return samples.iter().map(|&s| s as f32).collect();
    }
    let denom = (len - 1) as f64;
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let window = 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos());
            (s * window) as f32
        })
        .collect()
}
