use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::disguise::domain::noise_suppressor::NoiseSuppressor;
use crate::shared::chunk::AudioChunk;

/// Fraction of the per-bin mean magnitude used as the gate threshold.
pub const DEFAULT_GATE_RATIO: f64 = 0.5;

/// Analysis frame size.
const WINDOW_SIZE: usize = 256;

/// Hop between successive analysis frames.
const HOP_SIZE: usize = 128;

/// Spectral gate that mutes bins quieter than a fraction of their own
/// chunk-wide average.
///
/// The chunk is analyzed as overlapping Hann-windowed frames. Each bin's
/// magnitudes are averaged across frames; in frames where a bin falls at or
/// below `gate_ratio` times that average it is zeroed, and the surviving
/// magnitudes are resynthesized by overlap-add. Reconstruction uses the
/// masked magnitudes only, discarding phase, which gates stationary hiss
/// well but adds a metallic edge to voiced content.
///
/// Known limitation: a chunk too short for more than one analysis frame
/// makes every bin's average equal its own magnitude, so the mask passes
/// nearly everything. A minimum-frame-count guard would be needed before
/// relying on the gate for very short chunks.
pub struct SpectralNoiseGate {
    gate_ratio: f64,
    window: Vec<f64>,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
}

impl SpectralNoiseGate {
    pub fn new(gate_ratio: f64) -> Self {
        let mut planner = FftPlanner::new();
        let window = (0..WINDOW_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / WINDOW_SIZE as f64).cos()))
            .collect();
        Self {
            gate_ratio,
            window,
            fft_forward: planner.plan_fft_forward(WINDOW_SIZE),
            fft_inverse: planner.plan_fft_inverse(WINDOW_SIZE),
        }
    }
}

impl Default for SpectralNoiseGate {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_RATIO)
    }
}

impl NoiseSuppressor for SpectralNoiseGate {
    fn suppress(&self, chunk: &AudioChunk) -> Result<AudioChunk, Box<dyn std::error::Error>> {
        let samples = chunk.samples();
        let len = samples.len();
        if len == 0 {
            return Ok(chunk.clone());
        }

        // Frames start every HOP_SIZE samples; the tail frame is zero-padded.
        let num_frames = if len > WINDOW_SIZE {
            (len - WINDOW_SIZE).div_ceil(HOP_SIZE) + 1
        } else {
            1
        };

        let mut spectra: Vec<Vec<Complex<f64>>> = Vec::with_capacity(num_frames);
        for frame in 0..num_frames {
            let start = frame * HOP_SIZE;
            let mut buffer: Vec<Complex<f64>> = (0..WINDOW_SIZE)
                .map(|i| {
                    let sample = samples.get(start + i).copied().unwrap_or(0.0) as f64;
                    Complex::new(sample * self.window[i], 0.0)
                })
                .collect();
            self.fft_forward.process(&mut buffer);
            spectra.push(buffer);
        }

        // Per-bin mean magnitude across frames sets the gate threshold.
        let mut threshold = vec![0.0f64; WINDOW_SIZE];
        for spectrum in &spectra {
            for (bin, value) in spectrum.iter().enumerate() {
                threshold[bin] += value.norm();
            }
        }
        for value in &mut threshold {
            *value = *value / num_frames as f64 * self.gate_ratio;
        }

        // Binary mask, then magnitude-only resynthesis by overlap-add.
        let mut output = vec![0.0f64; len];
        let mut window_sum = vec![0.0f64; len];
        let norm = 1.0 / WINDOW_SIZE as f64;
        for (frame, spectrum) in spectra.iter().enumerate() {
            let start = frame * HOP_SIZE;
            let mut buffer: Vec<Complex<f64>> = spectrum
                .iter()
                .zip(threshold.iter())
                .map(|(value, &gate)| {
                    let magnitude = value.norm();
                    if magnitude > gate {
                        Complex::new(magnitude, 0.0)
                    } else {
                        Complex::new(0.0, 0.0)
                    }
                })
                .collect();
            self.fft_inverse.process(&mut buffer);
            for i in 0..WINDOW_SIZE {
                if start + i < len {
                    output[start + i] += buffer[i].re * norm * self.window[i];
                    window_sum[start + i] += self.window[i] * self.window[i];
                }
            }
        }

        // Window-sum normalization; starved edges are muted instead of
        // amplified.
        let max_window_sum = window_sum.iter().cloned().fold(0.0f64, f64::max);
        let window_floor = max_window_sum * 0.1;
        let cleaned: Vec<f32> = output
            .iter()
            .zip(window_sum.iter())
            .map(|(&value, &ws)| {
                if ws >= window_floor && window_floor > 0.0 {
                    (value / ws) as f32
                } else {
                    0.0
                }
            })
            .collect();

        Ok(AudioChunk::new(cleaned, chunk.sample_rate()))
    }
}
