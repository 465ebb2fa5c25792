use super::{clip_path_for, Transcoder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::config::ToolsConfig;
use crate::ClipJoinError;

/// Transcoder backed by the `ffmpeg` and `ffprobe` binaries
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    audio_quality: u8,
}

impl FfmpegTranscoder {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
            audio_quality: tools.audio_quality,
        }
    }

    /// Run `program` to completion, turning spawn failures and non-zero exits into errors
    async fn run(&self, program: &Path, args: Vec<OsString>, file: &Path) -> Result<Output> {
        tracing::debug!(
            "Running {} {}",
            program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let failure = |stderr: String| ClipJoinError::Transcoder {
            program: program.display().to_string(),
            file: file.display().to_string(),
            stderr,
        };

        let output = Command::new(program)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| failure(format!("could not start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match last_lines(&stderr, 5) {
                s if s.is_empty() => format!("exited with {}", output.status),
                s => s,
            };
            return Err(failure(detail).into());
        }

        Ok(output)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(&self, video: &Path, output_dir: &Path) -> Result<PathBuf> {
        let target = clip_path_for(video, output_dir);
        tracing::debug!("Extracting audio {} -> {}", video.display(), target.display());

        let args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-y".into(), // Overwrite output file
            "-i".into(),
            video.into(),
            "-q:a".into(),
            self.audio_quality.to_string().into(),
            "-map".into(),
            "a".into(), // Audio streams only
            target.as_os_str().into(),
        ];
        self.run(&self.ffmpeg, args, video).await?;

        Ok(target)
    }

    async fn probe_duration(&self, audio: &Path) -> Result<Duration> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "quiet".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            audio.into(),
        ];
        let output = self.run(&self.ffprobe, args, audio).await?;

        parse_probe_duration(&output.stdout).map_err(|reason| {
            ClipJoinError::InvalidProbe {
                file: audio.display().to_string(),
                reason,
            }
            .into()
        })
    }

    async fn concat(&self, clips: &[PathBuf], dest: &Path) -> Result<()> {
        let work_dir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let list_file = work_dir.path().join("clips.txt");

        let absolute: Vec<PathBuf> = clips
            .iter()
            .map(|clip| clip.canonicalize().unwrap_or_else(|_| clip.clone()))
            .collect();
        fs_err::write(&list_file, concat_list(&absolute))
            .with_context(|| format!("Error while writing to {}", list_file.display()))?;

        tracing::debug!("Joining {} clips into {}", clips.len(), dest.display());

        let args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list_file.as_os_str().into(),
            "-map".into(),
            "a".into(),
            "-q:a".into(),
            self.audio_quality.to_string().into(),
            dest.as_os_str().into(),
        ];
        self.run(&self.ffmpeg, args, dest).await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Build an ffmpeg concat-demuxer list
fn concat_list(clips: &[PathBuf]) -> String {
    let mut list = String::new();
    for clip in clips {
        list.push_str("file '");
        list.push_str(&clip.to_string_lossy().replace('\'', "'\\''"));
        list.push_str("'\n");
    }
    list
}

/// Read `format.duration` out of `ffprobe -print_format json -show_format` output
fn parse_probe_duration(stdout: &[u8]) -> std::result::Result<Duration, String> {
    let info: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let seconds = info["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| "no duration reported".to_string())?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("unusable duration {}", seconds));
    }

    Duration::try_from_secs_f64(seconds).map_err(|e| format!("unusable duration {}: {}", seconds, e))
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
