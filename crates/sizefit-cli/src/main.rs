use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sizefit_core::{
    CompressionEngine, CompressionMode, CompressionRequest, EngineConfig, OutputFormat,
};

#[derive(Debug, Parser)]
#[command(name = "sizefit")]
#[command(version)]
#[command(about = "Compress an image to a target byte size")]
#[command(long_about = None)]
struct Cli {
    /// Input image (JPEG or PNG)
    input: PathBuf,

    /// Output file; defaults to `<input stem>.sizefit.<ext>` next to the input
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Target output size in bytes (overrides config file)
    #[arg(short, long, value_name = "BYTES")]
    target: Option<u64>,

    /// Targeting mode: exact or balanced
    #[arg(short, long, default_value = "balanced")]
    mode: CompressionMode,

    /// Output format: jpeg or avif. Inferred from --output when omitted
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Configuration file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Explicit `--format`, else the output extension, else JPEG.
    fn output_format(&self) -> OutputFormat {
        self.format
            .or_else(|| {
                self.output
                    .as_deref()
                    .and_then(Path::extension)
                    .and_then(|ext| ext.to_str())
                    .and_then(|ext| ext.parse().ok())
            })
            .unwrap_or_default()
    }

    fn output_path(&self, format: OutputFormat) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let stem = self
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        self.input
            .with_file_name(format!("{stem}.sizefit.{}", format.extension()))
    }

    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(target) = self.target {
            config.target.target_bytes = target;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("sizefit={0},sizefit_core={0}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.engine_config()?;
    let format = cli.output_format();
    let output = cli.output_path(format);

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("reading {}", cli.input.display()))?;
    info!(
        input = %cli.input.display(),
        size = bytes.len(),
        target = config.target.target_bytes,
        "compressing"
    );

    let engine = CompressionEngine::new(config)?;
    let result = engine
        .compress(CompressionRequest::new(bytes, format, cli.mode))
        .await
        .with_context(|| format!("compressing {}", cli.input.display()))?;

    tokio::fs::write(&output, &result.buffer)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(output = %output.display(), size = result.byte_size, "written");

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
