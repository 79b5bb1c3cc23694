pub mod selection_channel;
pub mod streaming_engine;
