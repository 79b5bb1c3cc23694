pub mod noise_suppressor;
pub mod voice_transformer;
