//! In-process text extraction backend.
//!
//! No external binary: the text of the source document is pulled out and a
//! plain target document is rebuilt from it. Layout, images and styling are
//! dropped, so this is a fallback for hosts without an office suite, not a
//! replacement for the engine.
//!
//! * PDF → DOCX: lopdf text extraction per page, one paragraph per line,
//!   packed into a minimal WordprocessingML zip.
//! * DOCX → PDF: `word/document.xml` read with quick-xml, laid out as
//!   Helvetica 11pt on US Letter pages.
//!
//! Both directions are CPU-bound and run under `spawn_blocking`.

use crate::error::DocConvertError;
use crate::format::DocumentFormat;
use lopdf::{dictionary, Document, Object, Stream};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const LINES_PER_PAGE: usize = 50;
const MAX_LINE_CHARS: usize = 95;

/// Convert `input` (in `source` format) to `target`, writing `output` atomically.
pub async fn convert(
    input: &Path,
    source: DocumentFormat,
    target: DocumentFormat,
    output: &Path,
) -> Result<(), DocConvertError> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || convert_blocking(&input, source, target, &output))
        .await
        .map_err(|e| DocConvertError::Internal(format!("Native conversion task panicked: {}", e)))?
}

fn convert_blocking(
    input: &Path,
    source: DocumentFormat,
    target: DocumentFormat,
    output: &Path,
) -> Result<(), DocConvertError> {
    let bytes = std::fs::read(input).map_err(|e| DocConvertError::storage(input, e))?;

    let converted = match (source, target) {
        (DocumentFormat::Pdf, DocumentFormat::Docx) => build_docx(&pdf_text(&bytes)?)?,
        (DocumentFormat::Docx, DocumentFormat::Pdf) => build_pdf(&docx_text(&bytes)?)?,
        (from, to) => {
            return Err(DocConvertError::UnsupportedConversion {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    };

    // Atomic write: temp file next to the target, then rename.
    let tmp_path = tmp_path_for(output);
    if let Err(e) = std::fs::write(&tmp_path, &converted) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(DocConvertError::storage(&tmp_path, e));
    }
    if let Err(e) = std::fs::rename(&tmp_path, output) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(DocConvertError::MoveFailed {
            from: tmp_path,
            to: output.to_path_buf(),
            source: e,
        });
    }
    debug!(
        "Native {}→{} wrote {} bytes to {}",
        source,
        target,
        converted.len(),
        output.display()
    );
    Ok(())
}

fn tmp_path_for(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_owned();
    name.push(".tmp");
    output.with_file_name(name)
}

// ── PDF → text ───────────────────────────────────────────────────────────

/// Extract the text of every page, pages separated by a newline.
pub fn pdf_text(bytes: &[u8]) -> Result<String, DocConvertError> {
    let doc = Document::load_mem(bytes).map_err(|e| DocConvertError::NativeConversionFailed {
        detail: format!("not a readable PDF: {e}"),
    })?;

    let mut text = String::new();
    for page_num in doc.get_pages().keys() {
        if let Ok(page_text) = doc.extract_text(&[*page_num]) {
            text.push_str(page_text.trim_end());
            text.push('\n');
        }
    }
    Ok(text)
}

// ── text → DOCX ──────────────────────────────────────────────────────────

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Build a minimal DOCX package with one paragraph per line of `text`.
pub fn build_docx(text: &str) -> Result<Vec<u8>, DocConvertError> {
    let mut body = String::new();
    for line in text.lines() {
        let clean: String = line.chars().filter(|c| is_xml_char(*c)).collect();
        if clean.trim().is_empty() {
            body.push_str("<w:p/>");
        } else {
            body.push_str("<w:p><w:r><w:t xml:space=\"preserve\">");
            body.push_str(&quick_xml::escape::escape(clean.as_str()));
            body.push_str("</w:t></w:r></w:p>");
        }
    }
    let document_xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
<w:body>{body}<w:sectPr/></w:body></w:document>"
    );

    let zip_err = |e: zip::result::ZipError| DocConvertError::NativeConversionFailed {
        detail: format!("failed to write DOCX: {e}"),
    };
    let io_err = |e: std::io::Error| DocConvertError::NativeConversionFailed {
        detail: format!("failed to write DOCX: {e}"),
    };

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", RELS_XML),
        ("word/document.xml", document_xml.as_str()),
    ] {
        zip.start_file(name, options).map_err(zip_err)?;
        zip.write_all(content.as_bytes()).map_err(io_err)?;
    }
    let cursor = zip.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

// ── DOCX → text ──────────────────────────────────────────────────────────

/// Extract paragraph text from a DOCX package, one line per paragraph.
pub fn docx_text(bytes: &[u8]) -> Result<String, DocConvertError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        DocConvertError::NativeConversionFailed {
            detail: format!("not a readable DOCX: {e}"),
        }
    })?;
    let mut entry = archive.by_name("word/document.xml").map_err(|e| {
        DocConvertError::NativeConversionFailed {
            detail: format!("DOCX has no word/document.xml: {e}"),
        }
    })?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| DocConvertError::NativeConversionFailed {
            detail: format!("failed to read word/document.xml: {e}"),
        })?;
    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<String, DocConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"p" => text.push('\n'),
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                text.push_str(&e.decode().map_err(xml_error)?);
            }
            // `&amp;`, `&#38;` and friends arrive as their own events.
            Ok(Event::GeneralRef(r)) if in_text => {
                if let Some(c) = r.resolve_char_ref().map_err(xml_error)? {
                    text.push(c);
                } else {
                    let name = r.decode().map_err(xml_error)?;
                    match resolve_predefined_entity(&name) {
                        Some(value) => text.push_str(value),
                        None => {
                            return Err(DocConvertError::NativeConversionFailed {
                                detail: format!("unknown entity &{name};"),
                            })
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(text)
}

fn xml_error(e: impl std::fmt::Display) -> DocConvertError {
    DocConvertError::NativeConversionFailed {
        detail: format!("XML parsing error: {e}"),
    }
}

// ── text → PDF ───────────────────────────────────────────────────────────

/// Lay `text` out as Helvetica on US Letter pages. Always at least one page.
pub fn build_pdf(text: &str) -> Result<Vec<u8>, DocConvertError> {
    let lines: Vec<String> = text.lines().flat_map(wrap_line).collect();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut page_ids = Vec::new();
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    for chunk in chunks {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            page_content(chunk).into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DocConvertError::NativeConversionFailed {
            detail: format!("failed to write PDF: {e}"),
        })?;
    Ok(buffer)
}

fn wrap_line(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= MAX_LINE_CHARS {
        return vec![line.to_string()];
    }
    chars
        .chunks(MAX_LINE_CHARS)
        .map(|c| c.iter().collect())
        .collect()
}

fn page_content(lines: &[String]) -> String {
    let mut content = String::from("BT\n/F1 11 Tf\n50 742 Td\n14 TL\n");
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }
    content.push_str("ET\n");
    content
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            '\t' => "    ".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn docx_round_trip_preserves_paragraphs() {
        let docx = build_docx("Quarterly report\n\nRevenue <up> & costs down").unwrap();
        let text = docx_text(&docx).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Quarterly report");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Revenue <up> & costs down", "got: {text:?}");
    }

    #[test]
    fn entity_references_are_resolved() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>A &amp; B &lt;C&gt; &quot;d&quot; &#233;&#x263A;</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(parse_document_xml(xml).unwrap(), "A & B <C> \"d\" \u{e9}\u{263a}\n");
    }

    #[test]
    fn failed_write_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.docx");
        std::fs::write(&input, build_docx("Memo body").unwrap()).unwrap();
        // A directory squatting on the temp name makes the write fail.
        let output = dir.path().join("out.pdf");
        std::fs::create_dir(dir.path().join("out.pdf.tmp")).unwrap();

        let err = convert_blocking(&input, DocumentFormat::Docx, DocumentFormat::Pdf, &output)
            .unwrap_err();
        assert!(matches!(err, DocConvertError::Storage { .. }), "got {err:?}");
        assert!(!output.exists());
    }

    #[test]
    fn docx_package_layout() {
        let docx = build_docx("hello").unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
        for name in ["[Content_Types].xml", "_rels/.rels", "word/document.xml"] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn parse_handles_tabs_and_breaks() {
        let xml = r#"<w:document xmlns:w="urn:w"><w:body>
            <w:p><w:r><w:t>Name</w:t><w:tab/><w:t>Value</w:t></w:r></w:p>
            <w:p><w:r><w:t>one</w:t><w:br/><w:t>two</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = parse_document_xml(xml).unwrap();
        assert!(text.contains("Name\tValue"), "got: {text:?}");
        assert!(text.contains("one\ntwo"), "got: {text:?}");
    }

    #[test]
    fn pdf_has_one_page_per_fifty_lines() {
        let text: String = (0..120).map(|i| format!("line {i}\n")).collect();
        let pdf = build_pdf(&text).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 3);

        let empty = Document::load_mem(&build_pdf("").unwrap()).unwrap();
        assert_eq!(empty.get_pages().len(), 1);
    }

    #[test]
    fn pdf_text_reads_generated_pdf() {
        let pdf = build_pdf("Hello native\nSecond line").unwrap();
        let text = pdf_text(&pdf).unwrap();
        assert!(text.contains("Hello native"), "got: {text:?}");
    }

    #[test]
    fn garbage_input_is_conversion_error() {
        let err = pdf_text(b"not a pdf").unwrap_err();
        assert!(matches!(err, DocConvertError::NativeConversionFailed { .. }));
        let err = docx_text(b"PK\x03\x04 truncated").unwrap_err();
        assert!(matches!(err, DocConvertError::NativeConversionFailed { .. }));
    }

    #[tokio::test]
    async fn convert_writes_target_atomically() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.docx");
        std::fs::write(&input, build_docx("Memo body").unwrap()).unwrap();
        let output = dir.path().join("out.pdf");

        convert(&input, DocumentFormat::Docx, DocumentFormat::Pdf, &output)
            .await
            .unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(!dir.path().join("out.pdf.tmp").exists());
        assert!(input.exists(), "input must be left alone");
    }

    #[test]
    fn long_lines_wrap() {
        let long = "x".repeat(MAX_LINE_CHARS * 2 + 5);
        assert_eq!(wrap_line(&long).len(), 3);
        assert_eq!(wrap_line("short"), vec!["short".to_string()]);
    }
}
