//! Error types for the docconvert library.
//!
//! A single enum, [`DocConvertError`], covers every failure. Each variant
//! belongs to one of three [`ErrorKind`]s, which is what callers (and the HTTP
//! layer) branch on:
//!
//! * **Validation**: the request itself is malformed or unsupported. Nothing
//!   was written to disk; retrying the same request will fail the same way.
//! * **Conversion**: the external engine (or the native backend) failed.
//!   Carries diagnostics such as the captured engine output, which are meant
//!   for logs and never for clients. See [`DocConvertError::public_message`].
//! * **Storage**: the local filesystem refused a read, write or rename.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`DocConvertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conversion,
    Storage,
}

/// All errors returned by the docconvert library.
#[derive(Debug, Error)]
pub enum DocConvertError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The uploaded file had no bytes.
    #[error("File must not be empty")]
    EmptyFile,

    /// A required multipart field was absent or blank.
    #[error("{field} must not be empty")]
    MissingField { field: &'static str },

    /// The original filename carries no extension to stage the input under.
    #[error("Uploaded file must have an extension")]
    MissingExtension,

    /// Source format or input extension outside the supported set.
    #[error("Unsupported input file type: {value}")]
    UnsupportedInputType { value: String },

    /// Target format outside the supported set.
    #[error("Unsupported output file type: {value}")]
    UnsupportedOutputType { value: String },

    /// The file extension disagrees with the declared source format.
    #[error("File extension '{extension}' does not match fromFormat '{declared}'")]
    ExtensionMismatch { extension: String, declared: String },

    /// Both formats are supported, but no strategy converts between them.
    #[error("Unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    /// A store name contained separators, traversal or other forbidden characters.
    #[error("Invalid file name '{name}'")]
    InvalidFileName { name: String },

    /// The multipart body could not be read.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { detail: String },

    /// The request body exceeded the configured upload limit.
    #[error("File exceeds the maximum upload size of {limit} bytes")]
    UploadTooLarge { limit: usize },

    /// A download was requested for a result that does not exist.
    #[error("File not found")]
    ResultNotFound { name: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The engine binary could not be started at all.
    #[error("Failed to launch conversion engine '{binary}': {source}")]
    EngineUnavailable {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but exited unsuccessfully.
    #[error("Conversion engine exited with {}\nOutput:\n{output}", exit_code_label(.code))]
    EngineFailed { code: Option<i32>, output: String },

    /// The engine reported success but no candidate output file exists.
    #[error("Converted file not found: {expected}\nEngine output:\n{output}")]
    OutputNotFound { expected: PathBuf, output: String },

    /// The located output could not be moved to its final location.
    #[error("Failed to move converted file '{from}' to '{to}': {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine did not exit within the configured timeout and was killed.
    #[error("Conversion engine timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The in-process text-extraction backend could not read or write a document.
    #[error("Native conversion failed: {detail}")]
    NativeConversionFailed { detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Filesystem failure on a store path.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl DocConvertError {
    /// Shorthand for a [`DocConvertError::Storage`] error.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        use DocConvertError::*;
        match self {
            EmptyFile
            | MissingField { .. }
            | MissingExtension
            | UnsupportedInputType { .. }
            | UnsupportedOutputType { .. }
            | ExtensionMismatch { .. }
            | UnsupportedConversion { .. }
            | InvalidFileName { .. }
            | MalformedUpload { .. }
            | UploadTooLarge { .. }
            | ResultNotFound { .. } => ErrorKind::Validation,
            Storage { .. } => ErrorKind::Storage,
            EngineUnavailable { .. }
            | EngineFailed { .. }
            | OutputNotFound { .. }
            | MoveFailed { .. }
            | Timeout { .. }
            | NativeConversionFailed { .. }
            | InvalidConfig(_)
            | Internal(_) => ErrorKind::Conversion,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Message that is safe to hand to an untrusted client.
    ///
    /// Validation messages are returned verbatim. Conversion and storage
    /// failures are reduced to a short reason without paths or engine
    /// output.
    pub fn public_message(&self) -> String {
        use DocConvertError::*;
        let reason = match self {
            e if e.is_validation() => return e.to_string(),
            EngineUnavailable { .. } => "conversion engine is unavailable",
            EngineFailed { .. } => "conversion engine reported an error",
            OutputNotFound { .. } => "output not found",
            MoveFailed { .. } => "could not store converted file",
            Timeout { .. } => "timeout",
            NativeConversionFailed { .. } => "document could not be read",
            Storage { .. } => "storage error",
            _ => "internal error",
        };
        format!("Conversion failed: {reason}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_match_api_contract() {
        assert_eq!(DocConvertError::EmptyFile.to_string(), "File must not be empty");
        assert_eq!(
            DocConvertError::MissingField { field: "fromFormat" }.to_string(),
            "fromFormat must not be empty"
        );
        let e = DocConvertError::UnsupportedOutputType {
            value: "xlsx".into(),
        };
        assert_eq!(e.to_string(), "Unsupported output file type: xlsx");
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn engine_failure_display_carries_output() {
        let e = DocConvertError::EngineFailed {
            code: Some(77),
            output: "source file could not be loaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit code 77"), "got: {msg}");
        assert!(msg.contains("could not be loaded"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::Conversion);
    }

    #[test]
    fn signal_exit_display() {
        let e = DocConvertError::EngineFailed {
            code: None,
            output: String::new(),
        };
        assert!(e.to_string().contains("terminated by signal"));
    }

    #[test]
    fn public_message_hides_diagnostics() {
        let e = DocConvertError::EngineFailed {
            code: Some(1),
            output: "/srv/uploads/secret-path.docx: I/O error".into(),
        };
        let msg = e.public_message();
        assert!(msg.starts_with("Conversion failed"));
        assert!(!msg.contains("secret-path"), "got: {msg}");

        let e = DocConvertError::Timeout { secs: 30 };
        assert_eq!(e.public_message(), "Conversion failed: timeout");
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn storage_kind() {
        let e = DocConvertError::storage(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(e.kind(), ErrorKind::Storage);
        assert_eq!(e.public_message(), "Conversion failed: storage error");
    }
}
