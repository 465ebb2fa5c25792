use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use crate::Result;

/// Trait for the external tool that does the actual media work
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Extract the audio track of `video` into an MP3 inside `output_dir`
    async fn extract_audio(&self, video: &Path, output_dir: &Path) -> Result<PathBuf>;

    /// Measure the playing time of an audio file
    async fn probe_duration(&self, audio: &Path) -> Result<Duration>;

    /// Join `clips` in order into a single audio file at `dest`
    async fn concat(&self, clips: &[PathBuf], dest: &Path) -> Result<()>;

    /// Get the name of this transcoder
    fn name(&self) -> &'static str;
}

/// Path of the MP3 produced for `video`: same stem, `.mp3` extension, in `output_dir`
pub fn clip_path_for(video: &Path, output_dir: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "clip".into());

    let mut name = stem;
    name.push(".mp3");
    output_dir.join(name)
}
