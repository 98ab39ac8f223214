//! Best-effort text extraction from uploaded documents.
//!
//! Dispatch is on the lowercase filename extension: `.pdf` via `pdf-extract`,
//! `.docx` by walking `word/document.xml` text runs, `.txt` as UTF-8.
//! The upload contract is "bytes + filename in, plain text out, empty string
//! when nothing can be extracted": unsupported formats and extraction
//! failures both yield `""` with a stderr warning, and the pipeline simply
//! skips the file. Image formats are accepted by the upload surface for
//! blueprint analysis but carry no extractable text here (OCR is an external
//! concern this build does not bundle).

use std::io::Read;

use thiserror::Error;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Internal extraction failure; callers of [`extract_text`] never see it.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Extract plain text from an uploaded file, best-effort.
///
/// Never fails: anything that cannot be extracted comes back as an empty
/// string, and the caller decides whether to skip the file.
pub fn extract_text(bytes: &[u8], name: &str) -> String {
    match try_extract(bytes, name) {
        Ok(text) => text,
        Err(ExtractError::UnsupportedExtension(_)) => String::new(),
        Err(e) => {
            eprintln!("Warning: extraction failed for {}: {}", name, e);
            String::new()
        }
    }
}

/// Whether the filename looks like a blueprint image the analysis route
/// accepts.
pub fn is_supported_image(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

fn try_extract(bytes: &[u8], name: &str) -> Result<String, ExtractError> {
    let lower = name.to_lowercase();
    if lower.ends_with(".pdf") {
        extract_pdf(bytes)
    } else if lower.ends_with(".docx") {
        extract_docx(bytes)
    } else if lower.ends_with(".txt") {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    } else {
        Err(ExtractError::UnsupportedExtension(
            extension_of(&lower).to_string(),
        ))
    }
}

fn extension_of(lower_name: &str) -> &str {
    lower_name.rsplit('.').next().unwrap_or("")
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Pull the text runs (`w:t` elements) out of `word/document.xml`.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| ExtractError::Docx(e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(ExtractError::Docx(
                    "word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(ExtractError::Docx("word/document.xml not found".to_string()));
    }

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_passes_through() {
        assert_eq!(extract_text(b"slab notes", "notes.TXT"), "slab notes");
    }

    #[test]
    fn unsupported_extension_yields_empty() {
        assert_eq!(extract_text(b"binary", "photo.heic"), "");
        assert_eq!(extract_text(b"binary", "no_extension"), "");
    }

    #[test]
    fn invalid_pdf_yields_empty() {
        assert_eq!(extract_text(b"not a pdf", "broken.pdf"), "");
    }

    #[test]
    fn invalid_docx_yields_empty() {
        assert_eq!(extract_text(b"not a zip", "broken.docx"), "");
    }

    #[test]
    fn image_names_are_recognized() {
        assert!(is_supported_image("plan.PNG"));
        assert!(is_supported_image("plan.jpeg"));
        assert!(!is_supported_image("plan.webp"));
        assert!(!is_supported_image("plan.pdf"));
    }

    #[test]
    fn docx_without_document_xml_yields_empty() {
        use std::io::Write;
        let mut bytes = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut bytes));
            writer
                .start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<x/>").unwrap();
            writer.finish().unwrap();
        }
        assert_eq!(extract_text(&bytes, "empty.docx"), "");
    }
}
