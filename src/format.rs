//! Document formats and conversion requests.

use crate::error::DocConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A document format the service can read or produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Every supported format.
    pub const ALL: [DocumentFormat; 2] = [DocumentFormat::Pdf, DocumentFormat::Docx];

    /// Canonical lowercase file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }

    /// Parse a format name or extension, ignoring ASCII case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocumentFormat {
    type Err = DocConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DocConvertError::UnsupportedInputType {
            value: s.trim().to_string(),
        })
    }
}

/// Extension of `filename`: the text after the last `.` of its final path
/// component. `None` when there is no dot or nothing follows it.
pub fn file_extension(filename: &str) -> Option<&str> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (_, ext) = base.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// One upload to convert.
#[derive(Clone)]
pub struct ConversionRequest {
    pub source: DocumentFormat,
    pub target: DocumentFormat,
    pub content: Vec<u8>,
    pub original_filename: Option<String>,
}

impl ConversionRequest {
    pub fn new(
        content: Vec<u8>,
        original_filename: Option<String>,
        source: DocumentFormat,
        target: DocumentFormat,
    ) -> Self {
        Self {
            source,
            target,
            content,
            original_filename,
        }
    }

    /// Build a request from raw form values, rejecting unknown format names.
    ///
    /// The error names the offending value, e.g.
    /// `Unsupported output file type: xlsx`.
    pub fn from_form(
        content: Vec<u8>,
        original_filename: Option<String>,
        from: &str,
        to: &str,
    ) -> Result<Self, DocConvertError> {
        let source = DocumentFormat::parse(from).ok_or_else(|| {
            DocConvertError::UnsupportedInputType {
                value: from.trim().to_lowercase(),
            }
        })?;
        let target = DocumentFormat::parse(to).ok_or_else(|| {
            DocConvertError::UnsupportedOutputType {
                value: to.trim().to_lowercase(),
            }
        })?;
        Ok(Self::new(content, original_filename, source, target))
    }
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .field("original_filename", &self.original_filename)
            .finish()
    }
}
