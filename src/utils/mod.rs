use anyhow::{Context, Result};
use console::Term;
use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;

/// Ask a question on the terminal and read a non-empty path back
pub fn prompt_path(question: &str) -> Result<PathBuf> {
    let term = Term::stdout();
    term.write_str(question)
        .context("Failed to write prompt")?;

    let answer = term.read_line().context("Failed to read answer")?;
    parse_answer(&answer)
}

fn parse_answer(answer: &str) -> Result<PathBuf> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        anyhow::bail!("No path entered");
    }
    Ok(PathBuf::from(trimmed))
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Check if the configured external tools can be started
pub async fn check_dependencies(tools: &ToolsConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&tools.ffmpeg).await {
        missing.push(format!(
            "{} - required for audio extraction and joining",
            tools.ffmpeg.display()
        ));
    }

    if !check_command_available(&tools.ffprobe).await {
        missing.push(format!(
            "{} - required for measuring clip durations",
            tools.ffprobe.display()
        ));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &Path) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
