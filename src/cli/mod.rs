use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clipjoin",
    about = "clipjoin - Convert a folder of videos to audio and join them into one marked MP3",
    version,
    long_about = "Extracts the audio track of every video in a folder with ffmpeg, joins the clips in folder order into a single MP3 and embeds the start time of each clip as an ID3 comment. Run without a subcommand to be prompted for the input and output folders."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert the videos in a folder and join them into one audio file
    Combine {
        /// Folder containing the video files (prompted for if omitted)
        #[arg(short, long, value_name = "DIR")]
        input: Option<PathBuf>,

        /// Folder to save the audio files to (prompted for if omitted)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Video file extension to pick up, repeatable (default from config: mp4)
        #[arg(short, long = "extension", value_name = "EXT")]
        extension: Vec<String>,

        /// File name of the combined audio inside the output folder
        #[arg(long, value_name = "NAME")]
        output_name: Option<String>,

        /// Process files sorted by name instead of directory-listing order
        #[arg(long)]
        sort: bool,

        /// Keep (true) or delete (false) the per-clip MP3 files after joining
        #[arg(long, value_name = "BOOL")]
        keep_clips: Option<bool>,

        /// Format of the marker summary printed at the end
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also write the marker summary to this file
        #[arg(long, value_name = "FILE")]
        markers_file: Option<PathBuf>,
    },

    /// Show the markers embedded in a combined audio file
    Markers {
        /// Combined MP3 file to inspect
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write the default configuration file or show the current one
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that ffmpeg and ffprobe can be found
    Check,
}

impl Commands {
    /// The command run when none is given: a fully interactive combine
    pub fn interactive() -> Self {
        Commands::Combine {
            input: None,
            output: None,
            extension: Vec::new(),
            output_name: None,
            sort: false,
            keep_clips: None,
            format: OutputFormat::Text,
            markers_file: None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text, one marker per line
    Text,
    /// JSON array of markers
    Json,
    /// CSV with a header row
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
