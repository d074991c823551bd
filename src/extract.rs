//! Text extraction seam between raw uploads and the indexing pipeline.

/// Errors from text extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
}

/// Turns uploaded bytes into plain text, keyed by MIME type.
///
/// Implementations must be cheap to share; the ingestor holds one behind an
/// `Arc` and calls it once per upload.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractError>;
}

/// Built-in extractor covering `text/plain` natively and `application/pdf`
/// via `pdf-extract`. Word formats pass upload validation but need an
/// external `TextExtractor` implementation.
#[derive(Debug, Default, Clone)]
pub struct BuiltinExtractor;

impl TextExtractor for BuiltinExtractor {
    fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractError> {
        match mime_type {
            "text/plain" => Ok(String::from_utf8_lossy(bytes).into_owned()),
            "application/pdf" => pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| ExtractError::Extraction(format!("PDF parse error: {}", e))),
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        let text = BuiltinExtractor
            .extract("Hello world".as_bytes(), "text/plain")
            .unwrap();
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_rejected() {
        let text = BuiltinExtractor
            .extract(&[b'h', b'i', 0xFF], "text/plain")
            .unwrap();
        assert!(text.starts_with("hi"));
    }

    #[test]
    fn test_word_formats_need_an_external_extractor() {
        let err = BuiltinExtractor
            .extract(b"PK\x03\x04", "application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_unknown_mime_is_rejected() {
        let err = BuiltinExtractor
            .extract(b"GIF89a", "image/gif")
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }
}
