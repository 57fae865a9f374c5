//! Configuration for the conversion service.
//!
//! Every knob lives in [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`]. Constructors take the struct explicitly; nothing
//! in the library reads the environment. The `docconvert` binary is the only
//! place where flags and `DOCCONVERT_*` variables are mapped onto it.

use crate::error::DocConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which implementation performs the format transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionBackend {
    /// Shell out to the headless office suite (default).
    #[default]
    ExternalEngine,
    /// Extract text in-process and rebuild the target document from it.
    /// Layout, images and styling are lost; no external binary is needed.
    NativeTextExtraction,
}

/// Configuration for a [`crate::ConversionService`].
///
/// # Example
/// ```rust
/// use docconvert::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .upload_dir("/var/lib/docconvert/uploads")
///     .converted_dir("/var/lib/docconvert/converted")
///     .engine_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Staging directory for uploaded inputs. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory converted files are served from. Default: `converted`.
    pub converted_dir: PathBuf,

    /// Engine executable, resolved through `PATH` when relative. Default: `soffice`.
    pub engine_binary: PathBuf,

    /// Extra arguments placed before the conversion flags on every engine run,
    /// e.g. `-env:UserInstallation=file:///tmp/lo-profile`. Default: none.
    pub engine_args: Vec<String>,

    /// Wall-clock limit for one engine run, in seconds. Default: 120.
    ///
    /// A run that exceeds it is killed and the request fails with
    /// [`DocConvertError::Timeout`].
    pub engine_timeout_secs: u64,

    /// Maximum number of engine processes running at once. Default: 1.
    ///
    /// A headless office suite holds a lock on its user profile; two
    /// instances sharing a profile fail with "profile locked" or silently
    /// produce nothing. Raise this only when `engine_args` gives each
    /// process its own profile.
    pub engine_concurrency: usize,

    /// Conversion implementation. Default: [`ConversionBackend::ExternalEngine`].
    pub backend: ConversionBackend,

    /// Largest accepted upload in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            converted_dir: PathBuf::from("converted"),
            engine_binary: PathBuf::from("soffice"),
            engine_args: Vec::new(),
            engine_timeout_secs: 120,
            engine_concurrency: 1,
            backend: ConversionBackend::default(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn converted_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.converted_dir = dir.into();
        self
    }

    pub fn engine_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.config.engine_binary = binary.into();
        self
    }

    pub fn engine_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.engine_args.push(arg.into());
        self
    }

    pub fn engine_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn engine_concurrency(mut self, n: usize) -> Self {
        self.config.engine_concurrency = n.max(1);
        self
    }

    pub fn backend(mut self, backend: ConversionBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, DocConvertError> {
        let c = &self.config;
        if c.engine_timeout_secs == 0 {
            return Err(DocConvertError::InvalidConfig(
                "engine timeout must be at least 1 second".into(),
            ));
        }
        if c.engine_concurrency == 0 {
            return Err(DocConvertError::InvalidConfig(
                "engine concurrency must be ≥ 1".into(),
            ));
        }
        if c.engine_binary.as_os_str().is_empty() {
            return Err(DocConvertError::InvalidConfig(
                "engine binary must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(DocConvertError::InvalidConfig(
                "max upload size must be greater than zero".into(),
            ));
        }
        if c.upload_dir == c.converted_dir {
            return Err(DocConvertError::InvalidConfig(format!(
                "upload and converted directories must differ (both are {:?})",
                c.upload_dir
            )));
        }
        Ok(self.config)
    }
}
