// src/extraction/pdf_text.rs

use std::fs;
use std::path::Path;

use lopdf::{Dictionary, Document};
use tracing::{info, warn};

use crate::error::{PipelineError, require_file};

/// Result of attempting to read text out of a trade document.
#[derive(Debug)]
pub enum PdfContent {
    Text(String),
    /// Image-only pages; there is nothing to send without OCR.
    ScannedImage,
    Error(String),
}

/// Below this many non-whitespace characters a PDF counts as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Share of image-only pages at which the whole document counts as scanned.
const SCANNED_PAGE_RATIO: f64 = 0.8;

/// Classify raw PDF bytes and extract their text when there is any.
pub fn classify(pdf_bytes: &[u8]) -> PdfContent {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return PdfContent::Error(format!("Failed to parse PDF: {e}")),
    };

    if looks_scanned(&doc) {
        return PdfContent::ScannedImage;
    }

    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "Extracted text too short, treating as scanned");
                PdfContent::ScannedImage
            } else {
                PdfContent::Text(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed");
            PdfContent::ScannedImage
        }
    }
}

/// Read a PDF from disk and return its text, failing for scanned or broken files.
pub fn read_text(label: &'static str, path: &Path) -> Result<String, PipelineError> {
    require_file(label, path)?;
    let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;

    let span = tracing::info_span!("pdf", file = %path.display());
    let _guard = span.enter();

    match classify(&bytes) {
        PdfContent::Text(text) => {
            info!(chars = text.len(), "Text extracted");
            Ok(text)
        }
        PdfContent::ScannedImage => Err(PipelineError::Extraction(format!(
            "{label} {} is scanned or image-only; no text to extract",
            path.display()
        ))),
        PdfContent::Error(e) => Err(PipelineError::Extraction(format!(
            "{label} {}: {e}",
            path.display()
        ))),
    }
}

/// A page with image XObjects but no fonts is almost certainly a scan.
fn looks_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let image_only = pages
        .values()
        .filter_map(|id| doc.get_object(*id).ok())
        .filter_map(|obj| obj.as_dict().ok())
        .filter(|page| {
            !has_resource(doc, page, b"Font") && has_resource(doc, page, b"XObject")
        })
        .count();

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        total_pages = pages.len(),
        image_only,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );
    ratio >= SCANNED_PAGE_RATIO
}

fn has_resource(doc: &Document, page: &Dictionary, key: &[u8]) -> bool {
    page.get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(key).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}
