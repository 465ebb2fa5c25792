use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::combine::markers::Marker;
use crate::combine::CombineSummary;
use crate::utils::format_duration;

#[derive(Serialize)]
struct MarkerRow<'a> {
    index: usize,
    file_name: &'a str,
    start_ms: u64,
    start_seconds: String,
    comment: String,
}

impl<'a> From<&'a Marker> for MarkerRow<'a> {
    fn from(marker: &'a Marker) -> Self {
        Self {
            index: marker.index,
            file_name: &marker.file_name,
            start_ms: marker.start_ms,
            start_seconds: marker.start_seconds(),
            comment: marker.comment_text(),
        }
    }
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    output_path: &'a Path,
    total_ms: u64,
    completed_at: String,
    clip_paths: &'a [PathBuf],
    markers: Vec<MarkerRow<'a>>,
}

/// Render the outcome of a combine run.
///
/// JSON carries the whole summary; text adds the run details around the marker
/// listing; CSV is the marker table alone.
pub fn render_summary(summary: &CombineSummary, format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Json => {
            let report = SummaryReport {
                output_path: &summary.output_path,
                total_ms: summary.total_ms,
                completed_at: summary.completed_at.to_rfc3339(),
                clip_paths: &summary.clip_paths,
                markers: summary.markers.iter().map(MarkerRow::from).collect(),
            };
            serde_json::to_string_pretty(&report)?
        }
        OutputFormat::Text => {
            let mut text = format!(
                "Combined audio saved to {}\nMarkers embedded in the audio metadata.\nTotal length: {}\nCompleted at: {}\n",
                summary.output_path.display(),
                format_duration(summary.total_ms as f64 / 1000.0),
                summary.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            );
            if !summary.clip_paths.is_empty() {
                text.push_str("Clips kept:\n");
                for clip in &summary.clip_paths {
                    text.push_str(&format!("  {}\n", clip.display()));
                }
            }
            text.push_str(&format_as_text(&summary.markers));
            text
        }
        OutputFormat::Csv => format_as_csv(&summary.markers),
    };
    Ok(content)
}

/// Print the outcome of a combine run
pub fn print_summary(summary: &CombineSummary, format: &OutputFormat) -> Result<()> {
    println!("{}", render_summary(summary, format)?);
    Ok(())
}

/// Render markers in the requested format
pub fn render_markers(markers: &[Marker], format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => format_as_text(markers),
        OutputFormat::Json => format_as_json(markers)?,
        OutputFormat::Csv => format_as_csv(markers),
    };
    Ok(content)
}

/// Save rendered markers to file
pub async fn save_markers(markers: &[Marker], path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render_markers(markers, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print rendered markers to the console
pub fn print_markers(markers: &[Marker], format: &OutputFormat) -> Result<()> {
    println!("{}", render_markers(markers, format)?);
    Ok(())
}

fn format_as_text(markers: &[Marker]) -> String {
    markers
        .iter()
        .map(|m| m.comment_text())
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_as_json(markers: &[Marker]) -> Result<String> {
    let rows: Vec<MarkerRow> = markers.iter().map(MarkerRow::from).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

fn format_as_csv(markers: &[Marker]) -> String {
    let mut csv = String::from("index,file_name,start_seconds\n");
    for marker in markers {
        csv.push_str(&format!(
            "{},{},{}\n",
            marker.index,
            csv_field(&marker.file_name),
            marker.start_seconds()
        ));
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
