use super::{ConvertedDocument, ConverterError, DocumentConverter, office, pdf};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read from the head of the file for magic-number detection
const SNIFF_LEN: usize = 8 * 1024;

/// Formats the in-process engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Markdown,
    PlainText,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Markdown => "md",
            DocumentFormat::PlainText => "txt",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "txt" | "text" => Some(DocumentFormat::PlainText),
            _ => None,
        }
    }
}

/// Detect the document format from magic bytes, falling back to the extension.
///
/// Zip containers are ambiguous on their own, so `infer`'s OOXML detection is
/// trusted first and the extension decides otherwise.
pub fn detect_format(path: &Path, header: &[u8]) -> Result<DocumentFormat, ConverterError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let mime_type = infer::get(header).map(|k| k.mime_type());
    match mime_type {
        Some("application/pdf") => return Ok(DocumentFormat::Pdf),
        Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document") => {
            return Ok(DocumentFormat::Docx);
        }
        Some("application/vnd.openxmlformats-officedocument.presentationml.presentation") => {
            return Ok(DocumentFormat::Pptx);
        }
        _ => {}
    }

    if let Some(format) = extension.as_deref().and_then(DocumentFormat::from_extension) {
        return Ok(format);
    }

    // Extension-less uploads that look like text are treated as plain text
    if extension.is_none() && mime_type.is_none() && looks_like_text(header) {
        return Ok(DocumentFormat::PlainText);
    }

    Err(ConverterError::Unsupported(
        mime_type
            .map(str::to_string)
            .or(extension)
            .unwrap_or_else(|| "unknown".to_string()),
    ))
}

fn looks_like_text(header: &[u8]) -> bool {
    if header.is_empty() || header.contains(&0) {
        return false;
    }
    match std::str::from_utf8(header) {
        Ok(_) => true,
        // A multi-byte character may be cut at the sniff boundary
        Err(e) => e.error_len().is_none() && e.valid_up_to() > 0,
    }
}

/// In-process engine for PDF, DOCX, PPTX, Markdown and plain text
#[derive(Debug)]
pub struct NativeConverter {
    max_extracted_size: u64,
}

impl NativeConverter {
    /// `max_extracted_size` bounds the bytes decompressed from one package
    pub fn new(max_extracted_size: u64) -> Self {
        Self { max_extracted_size }
    }
}

#[async_trait::async_trait]
impl DocumentConverter for NativeConverter {
    fn name(&self) -> &str {
        "native"
    }

    fn convert(&self, path: &Path) -> Result<ConvertedDocument, ConverterError> {
        let mut header = Vec::with_capacity(SNIFF_LEN);
        File::open(path)?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut header)?;

        let format = detect_format(path, &header)?;
        tracing::debug!("Detected {} for {}", format.as_str(), path.display());

        let document = match format {
            DocumentFormat::Pdf => pdf::convert_pdf(path)?,
            DocumentFormat::Docx => office::convert_docx(path, self.max_extracted_size)?,
            DocumentFormat::Pptx => office::convert_pptx(path, self.max_extracted_size)?,
            DocumentFormat::Markdown | DocumentFormat::PlainText => {
                let bytes = std::fs::read(path)?;
                let text = String::from_utf8(bytes).map_err(|_| {
                    ConverterError::Malformed("text is not valid UTF-8".to_string())
                })?;
                ConvertedDocument::from_markdown(format.as_str(), text)
            }
        };

        if document.is_empty() {
            return Err(ConverterError::Malformed("no extractable text".to_string()));
        }
        Ok(document)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
