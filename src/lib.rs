//! clipjoin - convert a folder of videos to audio and join the clips
//!
//! Every video in a folder is handed to `ffmpeg` for audio extraction, the
//! resulting clips are joined into one MP3 and the start offset of each clip is
//! written into the combined file as an ID3 comment.

pub mod cli;
pub mod combine;
pub mod config;
pub mod output;
pub mod transcoder;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use combine::{CombinePipeline, CombineRequest, CombineSummary};
pub use combine::markers::{Marker, MarkerTimeline};
pub use config::Config;
pub use transcoder::{FfmpegTranscoder, Transcoder};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to clipjoin
#[derive(thiserror::Error, Debug)]
pub enum ClipJoinError {
    #[error("The input folder '{0}' does not exist.")]
    InputFolderMissing(String),

    #[error("No video files with extensions {extensions:?} found in {folder}")]
    NoVideos { folder: String, extensions: Vec<String> },

    #[error("{program} failed on '{file}': {stderr}")]
    Transcoder {
        program: String,
        file: String,
        stderr: String,
    },

    #[error("Invalid combine settings: {0}")]
    InvalidRequest(String),

    #[error("Clip {clip} {reason}")]
    ClipConflict { clip: String, reason: String },

    #[error("Could not read duration of '{file}': {reason}")]
    InvalidProbe { file: String, reason: String },

    #[error("Failed to update ID3 tag of '{file}': {reason}")]
    Tag { file: String, reason: String },
}
