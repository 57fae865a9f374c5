//! # docconvert
//!
//! Convert documents between PDF and DOCX behind a small HTTP API.
//!
//! The heavy lifting is delegated to a headless office suite (`soffice`)
//! run as a subprocess. This crate owns everything around it: validating
//! uploads, staging them on disk, building the engine command line,
//! bounding each run with a timeout, finding the file the engine wrote
//! (its output naming is not under our control) and moving it into a
//! result store served for download.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate  non-empty, known extension matching fromFormat, known pair
//!  ├─ 2. Stage     write {uuid}.{ext} into the upload directory
//!  ├─ 3. Plan      pick a strategy (1 or 2 engine steps, or native)
//!  ├─ 4. Engine    soffice --headless --convert-to … (timeout, permit)
//!  ├─ 5. Locate    find the engine's output, move it to {uuid}.{ext}
//!  └─ 6. Cleanup   staged input removed on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docconvert::{ConversionService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ConversionService::new(ServiceConfig::default());
//!     let bytes = std::fs::read("report.pdf")?;
//!     let url = service
//!         .convert_upload(bytes, Some("report.pdf".into()), "pdf", "docx")
//!         .await?;
//!     println!("{url}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | HTTP API and the `docconvert` binary (axum + clap + anyhow + tracing-subscriber) |
//!
//! Disable `server` when embedding only the conversion service:
//! ```toml
//! docconvert = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionBackend, ServiceConfig, ServiceConfigBuilder};
pub use convert::ConversionService;
pub use error::{DocConvertError, ErrorKind};
pub use format::{ConversionRequest, DocumentFormat};
pub use output::ConversionResult;
pub use pipeline::plan::ConversionStrategy;
pub use store::FileStore;
