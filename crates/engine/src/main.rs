//! filedrop command-line driver.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use filedrop_core::config::AppConfig;
use filedrop_core::locator::extension_of;
use filedrop_engine::{Download, Engine, EngineError, UploadReceipt};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// filedrop - content-addressed file drop storage
#[derive(Parser, Debug)]
#[command(name = "filedrop")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "FILEDROP_CONFIG",
        default_value = "config/filedrop.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and print its short-code locator ("-" reads stdin)
    Upload {
        file: PathBuf,
        /// Origin identifier used for rate limiting
        #[arg(long, default_value = "local")]
        origin: String,
    },
    /// Upload a file under a bucket and alias
    UploadBucket {
        file: PathBuf,
        bucket: String,
        alias: String,
        #[arg(long, default_value = "local")]
        origin: String,
    },
    /// Download by short-code locator
    Download {
        locator: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download by bucket and alias
    DownloadBucket {
        bucket: String,
        alias: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one eviction sweep and print its report
    Sweep,
    /// Print Prometheus metrics in text format.
    ///
    /// Counters are per process and nothing is persisted, so this only shows
    /// what engine startup recorded. Useful for checking metric names.
    Metrics,
}

impl Command {
    /// Upload and download requests; these end with an eviction sweep.
    fn is_request(&self) -> bool {
        !matches!(self, Self::Sweep | Self::Metrics)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args.config)?;
    let engine = Engine::from_config(config)
        .await
        .context("failed to initialize engine")?;
    engine
        .health_check()
        .await
        .context("storage health check failed")?;

    let is_request = args.command.is_request();
    let outcome = run(&engine, args.command).await;

    // Every request cycle ends with a sweep, whatever its outcome
    if is_request {
        let report = engine.run_eviction_sweep().await;
        if report.errors > 0 || report.removal_failures > 0 {
            tracing::warn!(
                errors = report.errors,
                removal_failures = report.removal_failures,
                "Eviction sweep completed with failures"
            );
        }
    }

    outcome
}

async fn run(engine: &Engine, command: Command) -> Result<()> {
    match command {
        Command::Upload { file, origin } => {
            let extension = file.to_str().and_then(extension_of);
            let reader = open_input(&file).await?;
            let result = engine.upload(reader, &origin, extension.as_deref()).await;
            print_upload(result)
        }
        Command::UploadBucket {
            file,
            bucket,
            alias,
            origin,
        } => {
            let reader = open_input(&file).await?;
            let result = engine.upload_to_bucket(reader, &origin, &bucket, &alias).await;
            print_upload(result)
        }
        Command::Download { locator, output } => {
            let download = engine
                .download(&locator)
                .await
                .with_context(|| format!("failed to download {locator}"))?;
            write_output(download, output.as_deref()).await
        }
        Command::DownloadBucket {
            bucket,
            alias,
            output,
        } => {
            let download = engine
                .download_from_bucket(&bucket, &alias)
                .await
                .with_context(|| format!("failed to download {bucket}/{alias}"))?;
            write_output(download, output.as_deref()).await
        }
        Command::Sweep => {
            let report = engine.run_eviction_sweep().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Metrics => {
            print!("{}", filedrop_engine::metrics::gather_text());
            Ok(())
        }
    }
}

fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}, using defaults", path);
    }

    figment
        .merge(Env::prefixed("FILEDROP_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

fn print_upload(result: Result<UploadReceipt, EngineError>) -> Result<()> {
    match result {
        Ok(receipt) => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(())
        }
        Err(EngineError::DuplicateContent { locator }) => {
            tracing::info!(locator = %locator, "Content already exists");
            println!("{}", serde_json::json!({ "locator": locator, "existing": true }));
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context("upload rejected")),
    }
}

async fn write_output(download: Download, output: Option<&Path>) -> Result<()> {
    tracing::info!(
        id = download.record.id,
        size = download.bytes.len(),
        content_type = download.content_type,
        "Downloaded object"
    );
    match output {
        Some(path) => tokio::fs::write(path, &download.bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&download.bytes).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
