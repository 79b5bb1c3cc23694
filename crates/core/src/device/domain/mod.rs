pub mod capture_source;
pub mod playback_sink;
