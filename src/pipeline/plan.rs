//! Strategy selection: which conversion path serves a `(source, target)` pair.
//!
//! The engine paths are a small static table of ordered [`EngineStep`]s, so
//! adding a pair means adding a row rather than another branch.
//!
//! | Pair      | Engine plan                                   |
//! |-----------|-----------------------------------------------|
//! | PDF→DOCX  | PDF →(writer_pdf_import) ODT → DOCX (two-step) |
//! | DOCX→PDF  | DOCX → PDF (single step)                       |
//!
//! PDF→DOCX goes through ODT because converting straight to DOCX from the
//! PDF importer loses most paragraph formatting.

use super::engine::EngineStep;
use crate::config::ConversionBackend;
use crate::format::DocumentFormat;

/// Open a PDF as a Writer document and save it as ODT.
pub const PDF_TO_ODT: EngineStep = EngineStep {
    convert_to: "odt",
    extension: "odt",
    alternates: &[],
    infilter: Some("writer_pdf_import"),
};

/// Save a Writer document as DOCX. Some builds fall back to `.doc`.
pub const TO_DOCX: EngineStep = EngineStep {
    convert_to: "docx:MS Word 2007 XML",
    extension: "docx",
    alternates: &["doc"],
    infilter: None,
};

/// Export a Writer document as PDF.
pub const TO_PDF: EngineStep = EngineStep {
    convert_to: "pdf:writer_pdf_Export",
    extension: "pdf",
    alternates: &[],
    infilter: None,
};

const ENGINE_PLANS: &[(DocumentFormat, DocumentFormat, &[EngineStep])] = &[
    (DocumentFormat::Pdf, DocumentFormat::Docx, &[PDF_TO_ODT, TO_DOCX]),
    (DocumentFormat::Docx, DocumentFormat::Pdf, &[TO_PDF]),
];

/// How one conversion is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStrategy {
    /// In-process text extraction (see [`super::native`]).
    NativeTextExtraction,
    /// One engine run.
    ExternalEngine(EngineStep),
    /// Two engine runs through an intermediate format.
    TwoStepExternalEngine { first: EngineStep, second: EngineStep },
}

impl ConversionStrategy {
    /// Pick the strategy for a pair, or `None` if the pair is not convertible.
    pub fn select(
        source: DocumentFormat,
        target: DocumentFormat,
        backend: ConversionBackend,
    ) -> Option<Self> {
        if source == target {
            return None;
        }
        match backend {
            ConversionBackend::NativeTextExtraction => Some(Self::NativeTextExtraction),
            ConversionBackend::ExternalEngine => {
                let (_, _, steps) = ENGINE_PLANS
                    .iter()
                    .find(|(s, t, _)| *s == source && *t == target)?;
                match steps {
                    [only] => Some(Self::ExternalEngine(*only)),
                    [first, second] => Some(Self::TwoStepExternalEngine {
                        first: *first,
                        second: *second,
                    }),
                    _ => None,
                }
            }
        }
    }

    /// Engine steps in execution order; empty for the native path.
    pub fn engine_steps(&self) -> Vec<EngineStep> {
        match self {
            Self::NativeTextExtraction => Vec::new(),
            Self::ExternalEngine(step) => vec![*step],
            Self::TwoStepExternalEngine { first, second } => vec![*first, *second],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NativeTextExtraction => "native-text-extraction",
            Self::ExternalEngine(_) => "external-engine",
            Self::TwoStepExternalEngine { .. } => "two-step-external-engine",
        }
    }
}
