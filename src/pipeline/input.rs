//! Input resolution: turn a user-supplied path, URL or byte buffer into a
//! [`Document`].
//!
//! The whole PDF is held in memory for the duration of one run; pdfium
//! loads it straight from the byte slice, so no temporary copy of the PDF
//! is written to disk. The `%PDF` magic bytes are checked up front so
//! callers get a meaningful error rather than a pdfium failure.

use crate::error::TableOcrError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const PDF_MAGIC: &[u8] = b"%PDF";

/// An uploaded PDF: opaque bytes plus a label for messages.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone)]
pub struct Document {
    source: String,
    bytes: Arc<[u8]>,
}

impl Document {
    /// Wrap bytes after checking the PDF magic.
    pub fn from_bytes(source: impl Into<String>, bytes: Vec<u8>) -> Result<Self, TableOcrError> {
        let source = source.into();
        if !bytes.starts_with(PDF_MAGIC) {
            let magic = bytes.iter().take(PDF_MAGIC.len()).copied().collect();
            return Err(TableOcrError::NotAPdf {
                source_name: source,
                magic,
            });
        }
        Ok(Self {
            source,
            bytes: bytes.into(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("source", &self.source)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory [`Document`].
///
/// URLs are downloaded with the given timeout; anything else is read as a
/// local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, TableOcrError> {
    if input.trim().is_empty() {
        return Err(TableOcrError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Document, TableOcrError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TableOcrError::PermissionDenied { path });
        }
        Err(_) => return Err(TableOcrError::FileNotFound { path }),
    };

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(path.display().to_string(), bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, TableOcrError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TableOcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            TableOcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            TableOcrError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(TableOcrError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| TableOcrError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Document::from_bytes(url, bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = Document::from_bytes("notes.txt", b"hello".to_vec()).unwrap_err();
        match err {
            TableOcrError::NotAPdf { source_name, magic } => {
                assert_eq!(source_name, "notes.txt");
                assert_eq!(magic, b"hell".to_vec());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn accepts_pdf_magic() {
        let doc = Document::from_bytes("mem", b"%PDF-1.7\n".to_vec()).unwrap();
        assert_eq!(doc.source(), "mem");
        assert_eq!(doc.len(), 9);
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, TableOcrError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, TableOcrError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.4 fake").unwrap();
        let doc = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.bytes(), b"%PDF-1.4 fake");
    }
}
