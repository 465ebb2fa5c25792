use anyhow::Result;
use id3::frame::Comment;
use id3::{ErrorKind, Tag, TagLike, Version};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ClipJoinError;

const COMMENT_LANG: &str = "eng";
const DESCRIPTION_PREFIX: &str = "Marker ";

/// Start position of one clip inside the combined audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// 1-based position of the clip
    pub index: usize,

    /// File name of the source video
    pub file_name: String,

    /// Offset of the clip from the start of the combined audio, in milliseconds
    pub start_ms: u64,
}

impl Marker {
    /// `Audio from <file> starts at <seconds> seconds.`
    pub fn text(&self) -> String {
        format!(
            "Audio from {} starts at {} seconds.",
            self.file_name,
            format_seconds(self.start_ms)
        )
    }

    /// Text stored in the ID3 comment: `Marker <index>: <text>`
    pub fn comment_text(&self) -> String {
        format!("{}{}: {}", DESCRIPTION_PREFIX, self.index, self.text())
    }

    pub fn description(&self) -> String {
        format!("{}{}", DESCRIPTION_PREFIX, self.index)
    }

    pub fn start_seconds(&self) -> String {
        format_seconds(self.start_ms)
    }

    /// Inverse of [`Marker::comment_text`]
    pub fn parse_comment(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(DESCRIPTION_PREFIX)?;
        let (index, rest) = rest.split_once(": ")?;
        let index = index.parse::<usize>().ok()?;

        let rest = rest.strip_prefix("Audio from ")?;
        let rest = rest.strip_suffix(" seconds.")?;
        let (file_name, seconds) = rest.rsplit_once(" starts at ")?;

        Some(Self {
            index,
            file_name: file_name.to_string(),
            start_ms: parse_seconds(seconds)?,
        })
    }
}

/// Running offset over the clips appended so far
#[derive(Debug, Default, Clone)]
pub struct MarkerTimeline {
    markers: Vec<Marker>,
    offset_ms: u64,
}

impl MarkerTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a marker at the current offset, then advance past the clip
    pub fn push(&mut self, file_name: &str, clip_len: Duration) -> &Marker {
        let index = self.markers.len() + 1;
        self.markers.push(Marker {
            index,
            file_name: file_name.to_string(),
            start_ms: self.offset_ms,
        });
        self.offset_ms += duration_to_ms(clip_len);

        &self.markers[index - 1]
    }

    /// Total length covered so far
    pub fn offset_ms(&self) -> u64 {
        self.offset_ms
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn into_markers(self) -> Vec<Marker> {
        self.markers
    }
}

/// Whole milliseconds, rounded to nearest
pub fn duration_to_ms(duration: Duration) -> u64 {
    ((duration.as_nanos() + 500_000) / 1_000_000) as u64
}

/// Seconds in shortest decimal form with at least one fractional digit
pub fn format_seconds(ms: u64) -> String {
    let whole = ms / 1000;
    let frac = ms % 1000;

    if frac == 0 {
        format!("{}.0", whole)
    } else {
        let digits = format!("{:03}", frac);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

fn parse_seconds(text: &str) -> Option<u64> {
    let (whole, frac) = text.split_once('.').unwrap_or((text, "0"));
    let whole = whole.parse::<u64>().ok()?;

    if frac.is_empty() || frac.len() > 3 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let frac = format!("{:0<3}", frac).parse::<u64>().ok()?;

    Some(whole * 1000 + frac)
}

/// Write one COMM frame per marker into the ID3v2 tag of `path`
pub fn embed(path: &Path, markers: &[Marker]) -> Result<()> {
    let tag_error = |reason: String| ClipJoinError::Tag {
        file: path.display().to_string(),
        reason,
    };

    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Tag::new(),
        Err(e) => return Err(tag_error(e.to_string()).into()),
    };

    // Drop markers left over from an earlier run
    let stale: Vec<String> = tag
        .comments()
        .filter(|c| is_marker_description(&c.description))
        .map(|c| c.description.clone())
        .collect();
    for description in &stale {
        tag.remove_comment(Some(description.as_str()), None);
    }

    for marker in markers {
        tag.add_frame(Comment {
            lang: COMMENT_LANG.to_string(),
            description: marker.description(),
            text: marker.comment_text(),
        });
    }

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| tag_error(e.to_string()))?;

    tracing::debug!("Embedded {} markers into {}", markers.len(), path.display());
    Ok(())
}

/// Read back the markers written by [`embed`], ordered by index
pub fn read_embedded(path: &Path) -> Result<Vec<Marker>> {
    let tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => return Ok(Vec::new()),
        Err(e) => {
            return Err(ClipJoinError::Tag {
                file: path.display().to_string(),
                reason: e.to_string(),
            }
            .into())
        }
    };

    let mut markers: Vec<Marker> = tag
        .comments()
        .filter(|c| is_marker_description(&c.description))
        .filter_map(|c| Marker::parse_comment(&c.text))
        .collect();
    markers.sort_by_key(|m| m.index);

    Ok(markers)
}

fn is_marker_description(description: &str) -> bool {
    description
        .strip_prefix(DESCRIPTION_PREFIX)
        .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
