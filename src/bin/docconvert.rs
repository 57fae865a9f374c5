//! HTTP server binary for docconvert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and serves the conversion API.

use anyhow::{Context, Result};
use clap::Parser;
use docconvert::server::{start_server, AppState};
use docconvert::{ConversionBackend, ServiceConfig};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port with soffice from PATH
  docconvert

  # Custom storage directories and a longer engine timeout
  docconvert --upload-dir /srv/uploads --converted-dir /srv/converted --timeout 300

  # Run two engine processes at once, each with its own profile directory
  docconvert --engine-concurrency 2 --engine-arg=-env:UserInstallation=file:///tmp/lo-profile

  # No office suite installed: text-only conversion
  docconvert --backend native-text-extraction

API:
  POST /convert           multipart: file, fromFormat, toFormat
  GET  /download/{file}   fetch a converted document
  GET  /health            liveness probe
"#;

#[derive(Parser, Debug)]
#[command(
    name = "docconvert",
    version,
    about = "HTTP service converting documents between PDF and DOCX",
    long_about = "Accepts document uploads over HTTP, converts them between PDF and DOCX with a \
headless office suite (soffice) and serves the results for download.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "DOCCONVERT_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Staging directory for uploaded files.
    #[arg(long, env = "DOCCONVERT_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory holding converted files served by /download.
    #[arg(long, env = "DOCCONVERT_CONVERTED_DIR", default_value = "converted")]
    converted_dir: PathBuf,

    /// Conversion engine executable.
    #[arg(long, env = "DOCCONVERT_ENGINE", default_value = "soffice")]
    engine: PathBuf,

    /// Extra argument passed to the engine before the conversion flags (repeatable).
    #[arg(long = "engine-arg", env = "DOCCONVERT_ENGINE_ARGS", value_delimiter = ',',
          allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Seconds a single engine run may take before it is killed.
    #[arg(long, env = "DOCCONVERT_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Engine processes allowed to run at the same time.
    #[arg(long, env = "DOCCONVERT_ENGINE_CONCURRENCY", default_value_t = 1)]
    engine_concurrency: usize,

    /// Conversion backend.
    #[arg(long, env = "DOCCONVERT_BACKEND", value_enum, default_value = "external-engine")]
    backend: BackendArg,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "DOCCONVERT_MAX_UPLOAD_MB", default_value_t = 25)]
    max_upload_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCCONVERT_VERBOSE")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, env = "DOCCONVERT_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum BackendArg {
    ExternalEngine,
    NativeTextExtraction,
}

impl From<BackendArg> for ConversionBackend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::ExternalEngine => ConversionBackend::ExternalEngine,
            BackendArg::NativeTextExtraction => ConversionBackend::NativeTextExtraction,
        }
    }
}

impl Cli {
    fn service_config(&self) -> Result<ServiceConfig> {
        let max_upload_bytes = self
            .max_upload_mb
            .checked_mul(1024 * 1024)
            .context("--max-upload-mb is too large")?;

        ServiceConfig::builder()
            .upload_dir(&self.upload_dir)
            .converted_dir(&self.converted_dir)
            .engine_binary(&self.engine)
            .engine_args(self.engine_args.iter().cloned())
            .engine_timeout_secs(self.timeout)
            .engine_concurrency(self.engine_concurrency)
            .backend(self.backend.clone().into())
            .max_upload_bytes(max_upload_bytes)
            .build()
            .context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.service_config()?;
    tracing::info!(
        "Engine {:?} (timeout {}s, concurrency {}), backend {:?}",
        config.engine_binary,
        config.engine_timeout_secs,
        config.engine_concurrency,
        config.backend
    );
    tracing::info!(
        "Uploads in {}, results in {}",
        config.upload_dir.display(),
        config.converted_dir.display()
    );

    start_server(&cli.bind, AppState::new(config))
        .await
        .with_context(|| format!("Server on {} failed", cli.bind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_valid_config() {
        let cli = Cli::parse_from(["docconvert"]);
        let config = cli.service_config().unwrap();
        assert_eq!(config.engine_binary, PathBuf::from("soffice"));
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(cli.bind, "0.0.0.0:8080");
    }

    #[test]
    fn engine_args_repeat() {
        let cli = Cli::parse_from([
            "docconvert",
            "--engine-arg=--norestore",
            "--engine-arg",
            "-env:UserInstallation=file:///tmp/p",
            "--backend",
            "native-text-extraction",
        ]);
        assert_eq!(
            cli.engine_args,
            vec!["--norestore", "-env:UserInstallation=file:///tmp/p"]
        );
        let config = cli.service_config().unwrap();
        assert_eq!(config.backend, ConversionBackend::NativeTextExtraction);
    }

    #[test]
    fn same_directories_rejected() {
        let cli = Cli::parse_from(["docconvert", "--upload-dir", "x", "--converted-dir", "x"]);
        assert!(cli.service_config().is_err());
    }
}
