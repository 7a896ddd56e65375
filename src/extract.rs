//! Turning uploaded files into plain text.
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Raw uploaded file.
#[derive(Debug, Clone)]
pub struct Blob {
    pub name: String,
    pub bytes: Bytes,
}

impl Blob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    fn is_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF") || self.name.to_ascii_lowercase().ends_with(".pdf")
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{name}: could not parse PDF: {reason}")]
    Pdf { name: String, reason: String },
    #[error("{name}: not a PDF or UTF-8 text file")]
    Unsupported { name: String },
}

/// Yields the text of each page of a blob, in order.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract_pages(&self, blob: &Blob) -> Result<Vec<String>, ExtractionError>;
}

/// Pages joined with newlines, surrounding whitespace trimmed.
pub async fn extract_text(
    extractor: &dyn ContentExtractor,
    blob: &Blob,
) -> Result<String, ExtractionError> {
    let pages = extractor.extract_pages(blob).await?;
    debug!(name = %blob.name, pages = pages.len(), "extracted pages");
    Ok(pages.join("\n").trim().to_string())
}

/// PDFs via `pdf-extract`, anything else as UTF-8 text (one page).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

#[async_trait]
impl ContentExtractor for DefaultExtractor {
    async fn extract_pages(&self, blob: &Blob) -> Result<Vec<String>, ExtractionError> {
        if blob.is_pdf() {
            let bytes = blob.bytes.clone();
            // pdf-extract is CPU bound and may panic on malformed input.
            let res = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
            })
            .await;
            return match res {
                Ok(Ok(pages)) => Ok(pages),
                Ok(Err(err)) => Err(ExtractionError::Pdf {
                    name: blob.name.clone(),
                    reason: err.to_string(),
                }),
                Err(join) => Err(ExtractionError::Pdf {
                    name: blob.name.clone(),
                    reason: join.to_string(),
                }),
            };
        }
        match std::str::from_utf8(&blob.bytes) {
            Ok(text) => Ok(vec![text.to_string()]),
            Err(_) => Err(ExtractionError::Unsupported {
                name: blob.name.clone(),
            }),
        }
    }
}
