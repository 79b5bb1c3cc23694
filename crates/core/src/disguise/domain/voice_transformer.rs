use crate::profiles::factor_sampler::DisguiseFactors;
use crate::shared::chunk::AudioChunk;

/// Applies a per-chunk voice disguise.
///
/// Implementations may return more or fewer samples than they were given;
/// callers must not assume the output matches the capture chunk size.
pub trait VoiceTransformer: Send {
    fn transform(
        &self,
        chunk: &AudioChunk,
        factors: DisguiseFactors,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
