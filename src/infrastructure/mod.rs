// Infrastructure layer - Configuration and platform adapters
pub mod config;
pub mod status_codec;
