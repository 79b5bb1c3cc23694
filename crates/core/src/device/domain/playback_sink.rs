/// Pushes transformed samples to a playback device.
///
/// Writes may be any length, since the disguise stages change chunk length.
/// Once the sink's buffer is full, `write` blocks until the device drains
/// it; that blocking is the streaming loop's only backpressure.
pub trait PlaybackSink: Send {
    fn write(&mut self, samples: &[f32]) -> Result<(), Box<dyn std::error::Error>>;

    /// Releases the playback device.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
