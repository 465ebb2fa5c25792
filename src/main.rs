use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipjoin::cli::{Cli, Commands, OutputFormat};
use clipjoin::combine::markers;
use clipjoin::config::Config;
use clipjoin::{output, utils, CombinePipeline, CombineRequest, FfmpegTranscoder};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "clipjoin=debug" } else { "clipjoin=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command.unwrap_or_else(Commands::interactive) {
        Commands::Combine {
            input,
            output,
            extension,
            output_name,
            sort,
            keep_clips,
            format,
            markers_file,
        } => {
            let input_dir = match input {
                Some(path) => path,
                None => utils::prompt_path("Enter the path to the folder containing video files: ")?,
            };
            let output_dir = match output {
                Some(path) => path,
                None => utils::prompt_path("Enter the path to the folder to save the audio files: ")?,
            };

            // Check for required external dependencies (non-fatal)
            let missing_deps = utils::check_dependencies(&config.tools).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
            }

            let request = CombineRequest {
                input_dir,
                output_dir,
                extensions: if extension.is_empty() {
                    config.combine.extensions.clone()
                } else {
                    extension
                },
                output_name: output_name.unwrap_or_else(|| config.combine.output_name.clone()),
                sort_by_name: sort || config.combine.sort_by_name,
                keep_clips: keep_clips.unwrap_or(config.combine.keep_clips),
                quiet: cli.quiet,
            };

            let pipeline = CombinePipeline::new(FfmpegTranscoder::new(&config.tools));

            tracing::info!("Starting combine for folder: {}", request.input_dir.display());
            let summary = pipeline.run(&request).await?;

            if format != OutputFormat::Text {
                eprintln!("Combined audio saved to {}", summary.output_path.display());
                eprintln!("Markers embedded in the audio metadata.");
            }
            output::print_summary(&summary, &format)?;

            if let Some(path) = markers_file {
                output::save_markers(&summary.markers, &path, &format).await?;
                println!("Markers saved to: {}", path.display());
            }
        }
        Commands::Markers { file, format } => {
            if !file.is_file() {
                anyhow::bail!("File does not exist: {}", file.display());
            }

            let found = markers::read_embedded(&file)?;
            if found.is_empty() {
                println!("No markers found in {}", file.display());
            } else {
                output::print_markers(&found, &format)?;
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = config.save().await?;
                println!("Configuration written to: {}", path.display());
            }
        }
        Commands::Check => {
            let missing = utils::check_dependencies(&config.tools).await;
            if missing.is_empty() {
                println!("ffmpeg and ffprobe are available.");
            } else {
                for dep in &missing {
                    println!("Missing: {}", dep);
                }
                anyhow::bail!("{} required tool(s) not found", missing.len());
            }
        }
    }

    Ok(())
}
