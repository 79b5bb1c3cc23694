pub mod cpal_capture;
pub mod cpal_playback;
