pub mod factor_sampler;
pub mod profile_catalog;
pub mod voice_preset;
