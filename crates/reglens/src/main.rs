use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reglens_core::model::{truncate_chars, ErrorReport, ErrorType};
use reglens_core::{run_analysis, OllamaClient, PipelineConfig};

/// Analyze regulatory changes between two document versions.
#[derive(Debug, Parser)]
#[command(name = "reglens", version)]
struct Args {
    /// Path to the old regulation text file.
    #[arg(long, short = 'o')]
    old: PathBuf,

    /// Path to the new regulation text file.
    #[arg(long, short = 'n')]
    new: PathBuf,

    /// Output file path (default: outputs/analysis_<timestamp>.json).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Model identifier to use (default from REGLENS_MODEL or config).
    #[arg(long, short = 'm')]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = PipelineConfig::from_env();
    let model = args.model.unwrap_or_else(|| config.default_model.clone());

    // Input problems surface before any network activity.
    let (old_text, new_text) = match read_inputs(&args.old, &args.new, &config) {
        Ok(texts) => texts,
        Err(e) => {
            let report = ErrorReport::new(ErrorType::InputError, e.to_string());
            println!("{}", serde_json::to_string_pretty(&report)?);
            std::process::exit(1);
        }
    };

    info!(
        model,
        old_chars = old_text.chars().count(),
        new_chars = new_text.chars().count(),
        "starting analysis"
    );

    let client = OllamaClient::new(&config)
        .map_err(|e| anyhow::anyhow!("failed to build generation client: {e}"))?;
    let outcome = run_analysis(&client, &config, &old_text, &new_text, &model).await;

    let json = serde_json::to_string_pretty(&outcome)?;
    let saved = save_output(&json, args.output.as_deref())?;
    info!(path = %saved.display(), "result saved");

    println!("{json}");

    if outcome.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

/// Read and validate both input files, truncating oversized ones.
fn read_inputs(
    old: &Path,
    new: &Path,
    config: &PipelineConfig,
) -> anyhow::Result<(String, String)> {
    Ok((
        read_input_file(old, config.max_input_chars)?,
        read_input_file(new, config.max_input_chars)?,
    ))
}

/// Read one input file. Missing, non-file, or empty paths are errors;
/// oversized content is truncated with a marker, never rejected.
fn read_input_file(path: &Path, max_chars: usize) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("input file not found: {}", path.display());
    }
    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if content.trim().is_empty() {
        anyhow::bail!("input file is empty: {}", path.display());
    }

    let total = content.chars().count();
    if total > max_chars {
        warn!(
            path = %path.display(),
            original_chars = total,
            max_chars,
            "input truncated"
        );
        let mut truncated = truncate_chars(&content, max_chars);
        truncated.push_str("\n[...truncated...]");
        return Ok(truncated);
    }

    Ok(content)
}

/// Write the result JSON to `output`, or to a timestamped file under
/// `outputs/` when no path was given. Returns the path written.
fn save_output(json: &str, output: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let dir = Path::new("outputs");
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("analysis_{timestamp}.json"))
        }
    };

    std::fs::write(&path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
