//! Nightcore core - backend logic for the nightcore pipeline
//!
//! Turns one source track into speed/reverb variants, renders each with the
//! cover art into a video, and publishes the videos in release order. The
//! stages coordinate only through file names in the working directory.

pub mod browser;
pub mod config;
pub mod encode;
pub mod generator;
pub mod logging;
pub mod models;
pub mod muxer;
pub mod orchestrator;
pub mod publisher;
pub mod upload;
pub mod workdir;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
