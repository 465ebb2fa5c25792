use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::transcoder::{clip_path_for, Transcoder};
use crate::ClipJoinError;

pub mod markers;

use markers::{Marker, MarkerTimeline};

/// Everything a combine run needs, after CLI and config are merged
#[derive(Debug, Clone)]
pub struct CombineRequest {
    /// Folder holding the videos
    pub input_dir: PathBuf,

    /// Folder receiving the clips and the combined file
    pub output_dir: PathBuf,

    /// Extensions (without dot) of the videos to pick up
    pub extensions: Vec<String>,

    /// File name of the combined audio
    pub output_name: String,

    pub sort_by_name: bool,

    pub keep_clips: bool,

    /// Hide the progress bar
    pub quiet: bool,
}

impl CombineRequest {
    /// Reject settings that would make ffmpeg write somewhere it must not
    pub fn validate(&self) -> Result<()> {
        check_extensions(&self.extensions)
            .and_then(|_| check_output_name(&self.output_name))
            .map_err(|reason| ClipJoinError::InvalidRequest(reason).into())
    }
}

/// At least one non-blank extension
pub fn check_extensions(extensions: &[String]) -> std::result::Result<(), String> {
    if extensions
        .iter()
        .all(|ext| ext.trim().trim_start_matches('.').is_empty())
    {
        return Err("at least one video extension must be given".to_string());
    }
    Ok(())
}

/// A plain file name that stays inside the output folder
pub fn check_output_name(name: &str) -> std::result::Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(format!("output name must be a plain file name, got '{}'", name));
    }
    Ok(())
}

/// Outcome of a combine run
#[derive(Debug, Clone, Serialize)]
pub struct CombineSummary {
    /// Path of the combined audio file
    pub output_path: PathBuf,

    /// One marker per clip, in playing order
    pub markers: Vec<Marker>,

    /// Per-clip MP3 files still on disk
    pub clip_paths: Vec<PathBuf>,

    /// Sum of the clip lengths in milliseconds
    pub total_ms: u64,

    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Sequential convert-join-tag pipeline
pub struct CombinePipeline<T: Transcoder> {
    transcoder: T,
}

impl<T: Transcoder> CombinePipeline<T> {
    pub fn new(transcoder: T) -> Self {
        Self { transcoder }
    }

    /// Convert every video, join the clips and embed the markers.
    ///
    /// Stops at the first failing file; nothing is retried.
    pub async fn run(&self, request: &CombineRequest) -> Result<CombineSummary> {
        request.validate()?;
        prepare_folders(&request.input_dir, &request.output_dir)?;

        let videos = discover_videos(
            &request.input_dir,
            &request.extensions,
            request.sort_by_name,
        )?;
        tracing::info!(
            "Found {} video files in {} (transcoder: {})",
            videos.len(),
            request.input_dir.display(),
            self.transcoder.name()
        );

        let output_path = request.output_dir.join(&request.output_name);
        plan_clips(&videos, &request.output_dir, &output_path)?;

        let progress = if request.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(videos.len() as u64)
        };
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
        );

        let mut timeline = MarkerTimeline::new();
        let mut clips = Vec::with_capacity(videos.len());

        for video in &videos {
            let file_name = video
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress.set_message(format!("Converting {}", file_name));

            let clip = self.transcoder.extract_audio(video, &request.output_dir).await?;
            let length = self.transcoder.probe_duration(&clip).await?;
            let marker = timeline.push(&file_name, length);
            tracing::info!("{}", marker.text());

            clips.push(clip);
            progress.inc(1);
        }

        progress.set_message("Joining clips");
        self.transcoder.concat(&clips, &output_path).await?;
        progress.finish_with_message("Done");

        markers::embed(&output_path, timeline.markers())?;

        if !request.keep_clips {
            for clip in &clips {
                fs_err::remove_file(clip).context("Failed to remove intermediate clip")?;
            }
            clips.clear();
        }

        let total_ms = timeline.offset_ms();

        Ok(CombineSummary {
            output_path,
            markers: timeline.into_markers(),
            clip_paths: clips,
            total_ms,
            completed_at: chrono::Utc::now(),
        })
    }
}

/// Work out every clip path before ffmpeg runs.
///
/// Fails if two videos map to the same clip, if a clip would replace the
/// combined output, or if a clip would replace its own source video.
pub fn plan_clips(videos: &[PathBuf], output_dir: &Path, output_path: &Path) -> Result<Vec<PathBuf>> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::with_capacity(videos.len());
    let mut clips = Vec::with_capacity(videos.len());

    for video in videos {
        let clip = clip_path_for(video, output_dir);
        let conflict = |reason: String| ClipJoinError::ClipConflict {
            clip: clip.display().to_string(),
            reason,
        };

        if let Some(first) = seen.get(&clip) {
            return Err(conflict(format!(
                "would be written for both '{}' and '{}'",
                first.display(),
                video.display()
            ))
            .into());
        }
        if same_file(&clip, output_path) {
            return Err(conflict(format!(
                "for '{}' would overwrite the combined output",
                video.display()
            ))
            .into());
        }
        if same_file(&clip, video) {
            return Err(conflict(format!(
                "would overwrite its source video '{}'",
                video.display()
            ))
            .into());
        }

        seen.insert(clip.clone(), video.as_path());
        clips.push(clip);
    }

    Ok(clips)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Check the input folder and create the output folder if needed
pub fn prepare_folders(input_dir: &Path, output_dir: &Path) -> Result<()> {
    if !input_dir.is_dir() {
        return Err(ClipJoinError::InputFolderMissing(input_dir.display().to_string()).into());
    }

    if !output_dir.exists() {
        println!(
            "Output folder '{}' does not exist. Creating it...",
            output_dir.display()
        );
        fs_err::create_dir_all(output_dir)?;
    }

    Ok(())
}

/// List the videos of `folder` whose extension is in `extensions`.
///
/// Keeps directory-listing order unless `sort_by_name` is set.
pub fn discover_videos(folder: &Path, extensions: &[String], sort_by_name: bool) -> Result<Vec<PathBuf>> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    let mut videos = Vec::new();
    for entry in fs_err::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| wanted.iter().any(|w| w.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            videos.push(path);
        }
    }

    if sort_by_name {
        videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }

    if videos.is_empty() {
        return Err(ClipJoinError::NoVideos {
            folder: folder.display().to_string(),
            extensions: wanted,
        }
        .into());
    }

    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::MockTranscoder;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs_err::write(&path, vec![0u8; 16]).unwrap();
        path
    }

    fn request(input: &Path, output: &Path) -> CombineRequest {
        CombineRequest {
            input_dir: input.to_path_buf(),
            output_dir: output.to_path_buf(),
            extensions: vec!["mp4".to_string()],
            output_name: "combined_audio.mp3".to_string(),
            sort_by_name: true,
            keep_clips: true,
            quiet: true,
        }
    }

    /// Mock that writes placeholder clip files and reports a fixed length per clip
    fn working_transcoder(expected_clips: usize) -> MockTranscoder {
        let mut mock = MockTranscoder::new();
        mock.expect_name().return_const("mock");
        mock.expect_extract_audio()
            .times(expected_clips)
            .returning(|video, out| {
                let clip = clip_path_for(video, out);
                fs_err::write(&clip, vec![0u8; 16])?;
                Ok(clip)
            });
        mock.expect_probe_duration()
            .times(expected_clips)
            .returning(|clip| {
                let name = clip.file_name().unwrap().to_string_lossy().into_owned();
                Ok(match name.as_str() {
                    "a.mp3" => Duration::from_millis(2500),
                    "b.mp3" => Duration::from_millis(1250),
                    _ => Duration::from_secs(1),
                })
            });
        mock.expect_concat()
            .times(1)
            .returning(|clips, dest| {
                assert!(clips.iter().all(|c| c.exists()));
                fs_err::write(dest, vec![0u8; 64])?;
                Ok(())
            });
        mock
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.mp4");
        touch(dir.path(), "a.MP4");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "c.mov");
        fs_err::create_dir(dir.path().join("d.mp4")).unwrap();

        let found = discover_videos(dir.path(), &["mp4".to_string()], true).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MP4", "b.mp4"]);

        let found = discover_videos(dir.path(), &[".mov".to_string(), "MP4".to_string()], true).unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_discover_empty_folder_is_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.md");

        let err = discover_videos(dir.path(), &["mp4".to_string()], false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClipJoinError>(),
            Some(ClipJoinError::NoVideos { .. })
        ));
    }

    #[test]
    fn test_prepare_folders() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = prepare_folders(&missing, dir.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("The input folder '{}' does not exist.", missing.display())
        );

        let out = dir.path().join("out").join("deeper");
        prepare_folders(dir.path(), &out).unwrap();
        assert!(out.is_dir());
    }

    #[tokio::test]
    async fn test_run_tracks_offsets_and_embeds_markers() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "a.mp4");
        touch(input.path(), "b.mp4");
        touch(input.path(), "c.mp4");
        touch(input.path(), "skip.txt");

        let pipeline = CombinePipeline::new(working_transcoder(3));
        let summary = pipeline
            .run(&request(input.path(), output.path()))
            .await
            .unwrap();

        let texts: Vec<String> = summary.markers.iter().map(|m| m.comment_text()).collect();
        assert_eq!(
            texts,
            vec![
                "Marker 1: Audio from a.mp4 starts at 0.0 seconds.",
                "Marker 2: Audio from b.mp4 starts at 2.5 seconds.",
                "Marker 3: Audio from c.mp4 starts at 3.75 seconds.",
            ]
        );
        assert_eq!(summary.total_ms, 4750);
        assert_eq!(summary.clip_paths.len(), 3);
        assert_eq!(summary.output_path, output.path().join("combined_audio.mp3"));

        let embedded = markers::read_embedded(&summary.output_path).unwrap();
        assert_eq!(embedded, summary.markers);
    }

    #[tokio::test]
    async fn test_run_removes_clips_when_asked() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "a.mp4");

        let mut req = request(input.path(), output.path());
        req.keep_clips = false;

        let summary = CombinePipeline::new(working_transcoder(1))
            .run(&req)
            .await
            .unwrap();

        assert!(summary.clip_paths.is_empty());
        assert!(!output.path().join("a.mp3").exists());
        assert!(summary.output_path.exists());
    }

    #[tokio::test]
    async fn test_first_failure_aborts_run() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "a.mp4");
        touch(input.path(), "b.mp4");

        let mut mock = MockTranscoder::new();
        mock.expect_name().return_const("mock");
        mock.expect_extract_audio().times(1).returning(|video, _| {
            Err(ClipJoinError::Transcoder {
                program: "ffmpeg".to_string(),
                file: video.display().to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            }
            .into())
        });
        mock.expect_probe_duration().never();
        mock.expect_concat().never();

        let err = CombinePipeline::new(mock)
            .run(&request(input.path(), output.path()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("a.mp4"));
        assert!(!output.path().join("combined_audio.mp3").exists());
    }

    /// Mock that must not be asked to do any work
    fn idle_transcoder() -> MockTranscoder {
        let mut mock = MockTranscoder::new();
        mock.expect_name().return_const("mock");
        mock.expect_extract_audio().never();
        mock.expect_probe_duration().never();
        mock.expect_concat().never();
        mock
    }

    fn is_clip_conflict(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ClipJoinError>(),
            Some(ClipJoinError::ClipConflict { .. })
        )
    }

    #[tokio::test]
    async fn test_clip_colliding_with_output_is_rejected() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "combined_audio.mp4");
        let existing = touch(output.path(), "combined_audio.mp3");

        let err = CombinePipeline::new(idle_transcoder())
            .run(&request(input.path(), output.path()))
            .await
            .unwrap_err();

        assert!(is_clip_conflict(&err));
        assert!(err.to_string().contains("would overwrite the combined output"));
        assert_eq!(fs_err::read(&existing).unwrap(), vec![0u8; 16]);
    }

    #[tokio::test]
    async fn test_videos_sharing_a_stem_are_rejected() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "a.mp4");
        touch(input.path(), "a.mov");

        let mut req = request(input.path(), output.path());
        req.extensions = vec!["mp4".to_string(), "mov".to_string()];

        let err = CombinePipeline::new(idle_transcoder())
            .run(&req)
            .await
            .unwrap_err();

        assert!(is_clip_conflict(&err));
        assert!(err.to_string().contains("would be written for both"));
    }

    #[tokio::test]
    async fn test_clip_replacing_its_source_is_rejected() {
        let folder = tempfile::tempdir().unwrap();
        let source = touch(folder.path(), "song.mp3");

        let mut req = request(folder.path(), folder.path());
        req.extensions = vec!["mp3".to_string()];

        let err = CombinePipeline::new(idle_transcoder())
            .run(&req)
            .await
            .unwrap_err();

        assert!(is_clip_conflict(&err));
        assert!(err.to_string().contains("its source video"));
        assert!(source.exists());
    }

    #[test]
    fn test_plan_clips_maps_each_video() {
        let clips = plan_clips(
            &[PathBuf::from("/in/a.mp4"), PathBuf::from("/in/b.mov")],
            Path::new("/out"),
            Path::new("/out/combined_audio.mp3"),
        )
        .unwrap();
        assert_eq!(clips, vec![PathBuf::from("/out/a.mp3"), PathBuf::from("/out/b.mp3")]);
    }

    #[tokio::test]
    async fn test_request_with_unsafe_output_name_is_rejected() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        touch(input.path(), "a.mp4");

        for name in ["", "  ", "..", "../escape.mp3", "sub\\x.mp3"] {
            let mut req = request(input.path(), output.path());
            req.output_name = name.to_string();

            let err = CombinePipeline::new(idle_transcoder())
                .run(&req)
                .await
                .unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<ClipJoinError>(),
                    Some(ClipJoinError::InvalidRequest(_))
                ),
                "name {:?} accepted",
                name
            );
        }
    }

    #[test]
    fn test_request_needs_an_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), dir.path());
        req.extensions = vec![".".to_string(), " ".to_string()];
        assert!(req.validate().is_err());

        req.extensions = vec!["mkv".to_string()];
        assert!(req.validate().is_ok());
    }
}
