//! Core library for live voice disguise: chunked microphone capture,
//! optional spectral noise gating, randomized pitch/formant resampling,
//! and paced playback. Domain traits keep the streaming engine free of
//! device and DSP specifics; infrastructure modules provide the cpal and
//! rustfft implementations.

pub mod device;
pub mod disguise;
pub mod pipeline;
pub mod profiles;
pub mod shared;
