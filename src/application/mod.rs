// Application layer - Use cases and ports
pub mod download_platform;
pub mod download_supervisor;
pub mod live_relay;
pub mod stall_detector;
pub mod track_service;
pub mod track_store;
