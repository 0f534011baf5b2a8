mod client;

pub use gemini_live_types as types;
pub use client::{connect, connect_with_config, Client, Config, ConfigBuilder, ServerRx, Stats};
