//! The Conductor: rebuilds symlink-forest view trees (by artist, year,
//! genre, soundtrack) from audio-tag metadata, publishing atomically via
//! hot-swap (§4.3).

pub mod build;
pub mod sanitize;
pub mod tags;

pub use build::{run, BuildReport, ConductorError};
