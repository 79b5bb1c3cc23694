use crate::shared::chunk::AudioChunk;

/// Pulls fixed-size chunks from a capture device.
///
/// Implementations hide device buffer granularity; `read_chunk` always
/// returns exactly one chunk's worth of samples. Its blocking is what paces
/// the streaming loop in real time.
pub trait CaptureSource: Send {
    /// Blocks until a full chunk has been captured.
    fn read_chunk(&mut self) -> Result<AudioChunk, Box<dyn std::error::Error>>;

    /// Releases the capture device.
    fn close(&mut self);
}
