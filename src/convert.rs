//! The conversion orchestrator.
//!
//! [`ConversionService::convert`] is the one entry point. It validates the
//! request without touching the disk, stages the upload, runs the selected
//! strategy into the result store and always removes the staged input, on
//! success, on error and (through the guard's `Drop`) when the future is
//! cancelled mid-flight.

use crate::config::ServiceConfig;
use crate::error::DocConvertError;
use crate::format::{file_extension, ConversionRequest, DocumentFormat};
use crate::output::ConversionResult;
use crate::pipeline::engine::EngineInvoker;
use crate::pipeline::native;
use crate::pipeline::plan::ConversionStrategy;
use crate::store::FileStore;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Orchestrates staging, conversion and cleanup.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
#[derive(Debug, Clone)]
pub struct ConversionService {
    config: ServiceConfig,
    staging: FileStore,
    results: FileStore,
    engine: EngineInvoker,
}

impl ConversionService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            staging: FileStore::new(&config.upload_dir),
            results: FileStore::new(&config.converted_dir),
            engine: EngineInvoker::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Store holding transient uploads.
    pub fn staging(&self) -> &FileStore {
        &self.staging
    }

    /// Store holding converted files served for download.
    pub fn results(&self) -> &FileStore {
        &self.results
    }

    /// Convert raw form values in one call.
    ///
    /// Returns the download reference, e.g. `/download/{uuid}.docx`.
    pub async fn convert_upload(
        &self,
        content: Vec<u8>,
        original_filename: Option<String>,
        from: &str,
        to: &str,
    ) -> Result<String, DocConvertError> {
        // Empty content and a missing extension are reported ahead of the
        // form values.
        upload_extension(&content, original_filename.as_deref())?;
        let request = ConversionRequest::from_form(content, original_filename, from, to)?;
        Ok(self.convert(&request).await?.download_url)
    }

    /// Convert one upload.
    ///
    /// # Errors
    /// * Validation errors (empty file, missing or unsupported extension,
    ///   extension not matching `request.source`, no strategy for the pair)
    ///   are returned before anything is written.
    /// * Conversion and storage errors are returned after the staged input
    ///   has been removed. No result file is left behind for them.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, DocConvertError> {
        let (input_ext, strategy) = self.validate(request)?;

        let identifier = Uuid::new_v4().to_string();
        let start = Instant::now();
        info!(
            "Conversion {}: {} → {} via {} ({} bytes)",
            identifier,
            request.source,
            request.target,
            strategy.name(),
            request.content.len()
        );

        let staged = self
            .staging
            .stage(&request.content, &format!("{identifier}.{input_ext}"))
            .await?;
        let result = ConversionResult::new(&identifier, request.target, &self.results)?;

        let outcome = self
            .run_strategy(strategy, staged.path(), request, &result.path)
            .await;
        staged.remove().await;

        match outcome {
            Ok(()) => {
                info!(
                    "Conversion {} complete in {}ms → {}",
                    identifier,
                    start.elapsed().as_millis(),
                    result.download_url
                );
                Ok(result)
            }
            Err(e) => {
                error!("Conversion {} failed: {}", identifier, e);
                // A failed conversion references no result.
                if let Err(cleanup) = self.results.delete(&result.path).await {
                    warn!("Failed to remove partial result {}: {}", result.file_name, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Checks that need no I/O. Returns the staging extension and strategy.
    fn validate(
        &self,
        request: &ConversionRequest,
    ) -> Result<(&'static str, ConversionStrategy), DocConvertError> {
        let extension =
            upload_extension(&request.content, request.original_filename.as_deref())?;
        let input_format = DocumentFormat::parse(extension).ok_or_else(|| {
            DocConvertError::UnsupportedInputType {
                value: extension.to_lowercase(),
            }
        })?;
        if input_format != request.source {
            return Err(DocConvertError::ExtensionMismatch {
                extension: extension.to_lowercase(),
                declared: request.source.to_string(),
            });
        }

        let strategy =
            ConversionStrategy::select(request.source, request.target, self.config.backend)
                .ok_or_else(|| DocConvertError::UnsupportedConversion {
                    from: request.source.to_string(),
                    to: request.target.to_string(),
                })?;

        Ok((input_format.extension(), strategy))
    }

    async fn run_strategy(
        &self,
        strategy: ConversionStrategy,
        input: &Path,
        request: &ConversionRequest,
        output: &Path,
    ) -> Result<(), DocConvertError> {
        match strategy {
            ConversionStrategy::NativeTextExtraction => {
                self.results.ensure_root().await?;
                native::convert(input, request.source, request.target, output).await
            }
            ConversionStrategy::ExternalEngine(_)
            | ConversionStrategy::TwoStepExternalEngine { .. } => {
                self.engine
                    .convert(input, &strategy.engine_steps(), output)
                    .await
            }
        }
    }
}

/// First two checks on any upload: it has bytes, and its name has an extension.
fn upload_extension<'a>(
    content: &[u8],
    original_filename: Option<&'a str>,
) -> Result<&'a str, DocConvertError> {
    if content.is_empty() {
        return Err(DocConvertError::EmptyFile);
    }
    original_filename
        .and_then(file_extension)
        .ok_or(DocConvertError::MissingExtension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionBackend;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ConversionService {
        let config = ServiceConfig::builder()
            .upload_dir(dir.path().join("uploads"))
            .converted_dir(dir.path().join("converted"))
            .engine_binary("/definitely/not/installed/soffice")
            .build()
            .unwrap();
        ConversionService::new(config)
    }

    fn request(name: Option<&str>, from: DocumentFormat, to: DocumentFormat) -> ConversionRequest {
        ConversionRequest::new(b"%PDF-1.4 stub".to_vec(), name.map(String::from), from, to)
    }

    #[tokio::test]
    async fn validation_happens_before_any_io() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        use DocumentFormat::*;

        let cases = [
            (request(Some("a.pdf"), Pdf, Pdf), "Unsupported conversion from pdf to pdf"),
            (request(Some("a.docx"), Docx, Docx), "Unsupported conversion"),
            (request(Some("noext"), Pdf, Docx), "must have an extension"),
            (request(None, Pdf, Docx), "must have an extension"),
            (request(Some("notes.txt"), Pdf, Docx), "Unsupported input file type: txt"),
            (request(Some("memo.docx"), Pdf, Docx), "does not match fromFormat"),
        ];
        for (req, expected) in cases {
            let err = svc.convert(&req).await.unwrap_err();
            assert!(err.is_validation(), "{req:?} gave {err:?}");
            assert!(err.to_string().contains(expected), "{req:?} gave {err}");
        }

        let empty = ConversionRequest::new(Vec::new(), Some("a.pdf".into()), Pdf, Docx);
        assert!(matches!(
            svc.convert(&empty).await.unwrap_err(),
            DocConvertError::EmptyFile
        ));

        let form_cases = [
            (b"x".to_vec(), Some("report"), "pdf", "xlsx", "Uploaded file must have an extension"),
            (b"x".to_vec(), None, "txt", "docx", "Uploaded file must have an extension"),
            (Vec::new(), Some("report.pdf"), "txt", "xlsx", "File must not be empty"),
        ];
        for (content, name, from, to, expected) in form_cases {
            let err = svc
                .convert_upload(content, name.map(String::from), from, to)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), expected, "{name:?} {from}→{to}");
        }

        assert!(!dir.path().join("uploads").exists(), "nothing may be staged");
        assert!(!dir.path().join("converted").exists());
    }

    #[tokio::test]
    async fn form_values_are_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let err = svc
            .convert_upload(b"x".to_vec(), Some("data.PDF".into()), "PDF", "xlsx")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported output file type: xlsx");
    }

    #[tokio::test]
    async fn missing_engine_still_cleans_up() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let err = svc
            .convert(&request(Some("memo.docx"), DocumentFormat::Docx, DocumentFormat::Pdf))
            .await
            .unwrap_err();
        assert!(
            matches!(err, DocConvertError::EngineUnavailable { .. }),
            "got: {err:?}"
        );
        let leftovers = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(leftovers, 0);
        let results = std::fs::read_dir(dir.path().join("converted")).unwrap().count();
        assert_eq!(results, 0, "scratch directory must be gone too");
    }

    #[tokio::test]
    async fn native_backend_converts_without_engine() {
        let dir = TempDir::new().unwrap();
        let config = ServiceConfig::builder()
            .upload_dir(dir.path().join("uploads"))
            .converted_dir(dir.path().join("converted"))
            .backend(ConversionBackend::NativeTextExtraction)
            .build()
            .unwrap();
        let svc = ConversionService::new(config);

        let docx = native::build_docx("Memo\nPlease review.").unwrap();
        let req = ConversionRequest::new(
            docx,
            Some("memo.docx".into()),
            DocumentFormat::Docx,
            DocumentFormat::Pdf,
        );
        let result = svc.convert(&req).await.unwrap();

        assert!(result.download_url.starts_with("/download/"));
        assert!(result.download_url.ends_with(".pdf"));
        let bytes = std::fs::read(&result.path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(
            std::fs::read_dir(dir.path().join("uploads")).unwrap().count(),
            0
        );
    }
}
