//! PDF text extraction for uploaded documents.
//!
//! Extraction runs on the blocking pool; a malformed file that makes the parser panic surfaces as
//! an [`ExtractError`] instead of taking the worker down.

use thiserror::Error;

/// Content type accepted by the upload endpoint.
pub const MIME_PDF: &str = "application/pdf";

/// Errors raised while turning an upload into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The upload is not a PDF.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
    /// The PDF could not be parsed.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Check that an upload declares a PDF content type.
///
/// Parameters such as `; charset=binary` are ignored.
pub fn ensure_pdf(content_type: Option<&str>) -> Result<(), ExtractError> {
    let essence = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase());
    match essence.as_deref() {
        Some(MIME_PDF) => Ok(()),
        Some(other) => Err(ExtractError::UnsupportedContentType(other.to_string())),
        None => Err(ExtractError::UnsupportedContentType(
            "missing content type".to_string(),
        )),
    }
}

/// Extract the text layer of a PDF.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, ExtractError> {
    let size = bytes.len();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|error| ExtractError::Pdf(format!("extraction task aborted: {error}")))?
        .map_err(|error| ExtractError::Pdf(error.to_string()))?;
    tracing::debug!(bytes = size, chars = text.chars().count(), "Extracted PDF text");
    Ok(text)
}
