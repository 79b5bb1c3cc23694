/// A block of mono audio samples moving through the streaming loop.
///
/// Captured chunks always hold exactly the configured chunk size; the
/// disguise stages may produce sequences of any length, so downstream code
/// asks the chunk for its own length instead of assuming one.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0);
        Self {
            samples,
            sample_rate,
        }
    }

    /// An all-zero chunk of the given length.
    pub fn silent(frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frames], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration when played at the chunk's own sample rate.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
