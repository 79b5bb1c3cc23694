use rand::Rng;

use crate::profiles::profile_catalog::VoiceProfile;

/// One concrete pair of scaling factors drawn for a single chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisguiseFactors {
    pub pitch: f32,
    pub formant: f32,
}

impl DisguiseFactors {
    pub fn new(pitch: f32, formant: f32) -> Self {
        Self { pitch, formant }
    }

    /// Combined frequency scaling applied by the two resampling stages.
    pub fn product(&self) -> f32 {
        self.pitch * self.formant
    }
}

/// Draws per-chunk disguise factors from a profile's ranges.
pub trait FactorSampler: Send {
    fn sample(&self, profile: &VoiceProfile) -> DisguiseFactors;
}

/// Samples each factor independently and uniformly from its inclusive range.
///
/// A fresh pair is drawn for every chunk, which gives the disguised voice
/// its characteristic wobble. Uses the calling thread's RNG.
pub struct UniformFactorSampler;

impl FactorSampler for UniformFactorSampler {
    fn sample(&self, profile: &VoiceProfile) -> DisguiseFactors {
        let mut rng = rand::thread_rng();
        let pitch_range = profile.pitch_range();
        let formant_range = profile.formant_range();
        DisguiseFactors {
            pitch: rng.gen_range(pitch_range.min()..=pitch_range.max()),
            formant: rng.gen_range(formant_range.min()..=formant_range.max()),
        }
    }
}
