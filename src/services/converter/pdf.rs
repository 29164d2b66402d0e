use super::{Block, ConvertedDocument, ConverterError};
use lopdf::Document;
use std::path::Path;

/// Extract page text with lopdf. Blank-line separated runs become paragraphs.
pub(super) fn convert_pdf(path: &Path) -> Result<ConvertedDocument, ConverterError> {
    let doc = Document::load(path).map_err(|e| {
        let msg = e.to_string();
        if msg.to_lowercase().contains("password") || msg.to_lowercase().contains("encrypt") {
            ConverterError::Malformed(format!("document is encrypted: {}", msg))
        } else {
            ConverterError::Malformed(format!("failed to load PDF: {}", msg))
        }
    })?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ConverterError::Malformed("document has no pages".to_string()));
    }

    let mut result = ConvertedDocument::new("pdf");
    let mut extracted_pages = 0;
    let mut last_error = None;

    for page_number in pages.keys() {
        let text = match doc.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping PDF page {}: {}", page_number, e);
                last_error = Some(e.to_string());
                continue;
            }
        };

        if extracted_pages > 0 {
            result.push(Block::PageBreak);
        }
        extracted_pages += 1;

        for paragraph in split_paragraphs(&text) {
            result.push(Block::Paragraph(paragraph));
        }
    }

    if extracted_pages == 0 {
        return Err(ConverterError::Malformed(format!(
            "text extraction failed on every page: {}",
            last_error.unwrap_or_default()
        )));
    }

    Ok(result)
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}
