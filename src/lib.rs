//! Transcript Harvester - batch transcript acquisition for lists of YouTube videos
//!
//! Each reference in a list is resolved through an ordered chain of caption tiers
//! (manual English, generated English, translated, any original language) and,
//! when configured, a local speech-to-text fallback. Finished work is detected from
//! the output artifacts themselves, so repeated runs only touch what is missing.

pub mod audio;
pub mod captions;
pub mod cli;
pub mod config;
pub mod input;
pub mod output;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use input::VideoReference;
pub use output::{BatchReport, FailureReason, FailureRecord};
pub use transcribe::{AcquisitionEngine, Batch, Outcome, Tier, TranscriptResult};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the harvester
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing external dependency: {0}")]
    MissingDependency(String),

    #[error("Audio fallback requested but this build has no speech-to-text backend (rebuild with `--features whisper`)")]
    AudioUnsupported,
}
