pub mod resampling_transformer;
pub mod spectral_noise_gate;
