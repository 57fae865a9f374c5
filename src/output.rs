//! Output types returned by a successful conversion.

use crate::error::DocConvertError;
use crate::format::DocumentFormat;
use crate::store::FileStore;
use serde::Serialize;
use std::path::PathBuf;

/// Route prefix under which converted files are served.
pub const DOWNLOAD_PREFIX: &str = "/download";

/// A converted file in the result store and its download reference.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// UUID v4 naming this conversion's artifacts.
    pub identifier: String,
    pub format: DocumentFormat,
    /// `{identifier}.{ext}`
    pub file_name: String,
    /// Location in the result store.
    #[serde(skip)]
    pub path: PathBuf,
    /// `/download/{identifier}.{ext}`
    pub download_url: String,
}

impl ConversionResult {
    /// Derive the result name, path and URL from the identifier and format.
    pub fn new(
        identifier: &str,
        format: DocumentFormat,
        store: &FileStore,
    ) -> Result<Self, DocConvertError> {
        let file_name = format!("{identifier}.{}", format.extension());
        let path = store.resolve(&file_name)?;
        Ok(Self {
            identifier: identifier.to_string(),
            format,
            download_url: download_url(&file_name),
            file_name,
            path,
        })
    }
}

/// Download reference for a result file name.
pub fn download_url(file_name: &str) -> String {
    format!("{DOWNLOAD_PREFIX}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_is_derived_from_identifier() {
        let store = FileStore::new("converted");
        let id = "3f2b8c1e-7d4a-4e9b-8a61-0c5d2e7f9b13";
        let r = ConversionResult::new(id, DocumentFormat::Docx, &store).unwrap();
        assert_eq!(r.file_name, format!("{id}.docx"));
        assert_eq!(r.download_url, format!("/download/{id}.docx"));
        assert_eq!(r.path, PathBuf::from("converted").join(format!("{id}.docx")));
    }

    #[test]
    fn hostile_identifier_rejected() {
        let store = FileStore::new("converted");
        assert!(ConversionResult::new("../../etc/passwd", DocumentFormat::Pdf, &store).is_err());
    }
}
