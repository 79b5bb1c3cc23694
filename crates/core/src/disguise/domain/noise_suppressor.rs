use crate::shared::chunk::AudioChunk;

/// Removes steady background noise from a chunk ahead of the voice
/// transform.
///
/// Suppression is same-length: the returned chunk holds exactly as many
/// samples as the input.
pub trait NoiseSuppressor: Send {
    fn suppress(&self, chunk: &AudioChunk) -> Result<AudioChunk, Box<dyn std::error::Error>>;
}
