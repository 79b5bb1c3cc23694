pub mod chunk;
pub mod constants;
