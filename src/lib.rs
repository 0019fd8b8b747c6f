//! Offline map region downloads and a live GPS track relay.
//!
//! The [`application::download_supervisor`] drives offline tile downloads on
//! the device side; the track store, relay and [`presentation`] layer make up
//! the companion server that pushes live tracks to browsers.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
