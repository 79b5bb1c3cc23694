/// Capture and playback sample rate (Hz).
pub const SAMPLE_RATE: u32 = 44_100;

/// Frames per capture chunk (~23 ms at 44.1 kHz).
pub const CHUNK_FRAMES: usize = 1024;

/// Live streams are mono end to end.
pub const CHANNELS: u16 = 1;
