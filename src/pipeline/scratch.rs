//! Scoped scratch storage for page images.
//!
//! The OCR client reads each page from a uniquely named PNG on disk. The
//! file lives exactly as long as the [`MaterializedImage`] handle: dropping
//! the handle deletes it, whichever way the extraction call ended.

use crate::error::PageError;
use crate::pipeline::encode::{encode_png, PNG_MIME};
use crate::pipeline::render::Page;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// A page image persisted for the duration of one extraction call.
#[derive(Debug)]
pub struct MaterializedImage {
    page_num: usize,
    path: TempPath,
    mime_type: &'static str,
}

impl MaterializedImage {
    /// Take ownership of an existing temporary file.
    pub fn new(page_num: usize, path: TempPath, mime_type: &'static str) -> Self {
        Self {
            page_num,
            path,
            mime_type,
        }
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Read the encoded image back from disk.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

impl Drop for MaterializedImage {
    fn drop(&mut self) {
        debug!(
            "Releasing scratch image for page {}: {}",
            self.page_num,
            self.path.display()
        );
    }
}

/// Produces the on-disk form of a page for the OCR client.
pub trait ScratchStore: Send + Sync {
    fn materialize(&self, page: &Page) -> Result<MaterializedImage, PageError>;
}

/// Writes page PNGs as named temporary files.
#[derive(Debug, Clone, Default)]
pub struct TempFileStore {
    dir: Option<PathBuf>,
}

impl TempFileStore {
    /// Store in the OS temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store in `dir` instead of the OS temp directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl ScratchStore for TempFileStore {
    fn materialize(&self, page: &Page) -> Result<MaterializedImage, PageError> {
        let scratch_err = |detail: String| PageError::ScratchFailed {
            page: page.number,
            detail,
        };

        let png = encode_png(&page.image).map_err(|e| scratch_err(e.to_string()))?;

        let prefix = format!("page-{:04}-", page.number);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".png");
        let mut file = match self.dir {
            Some(ref dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| scratch_err(e.to_string()))?;

        file.write_all(&png)
            .and_then(|_| file.flush())
            .map_err(|e| scratch_err(e.to_string()))?;

        let path = file.into_temp_path();
        debug!(
            "Materialized page {} → {} ({} bytes)",
            page.number,
            path.display(),
            png.len()
        );
        Ok(MaterializedImage::new(page.number, path, PNG_MIME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn page(number: usize) -> Page {
        Page {
            number,
            image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]))),
        }
    }

    #[tokio::test]
    async fn file_exists_until_handle_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::in_dir(dir.path());

        let image = store.materialize(&page(7)).unwrap();
        let path = image.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(image.page_num(), 7);
        assert_eq!(image.mime_type(), "image/png");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("page-0007-") && name.ends_with(".png"), "{name}");

        let bytes = image.read().await.unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        drop(image);
        assert!(!path.exists());
    }

    #[test]
    fn names_are_unique_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::in_dir(dir.path());
        let a = store.materialize(&page(1)).unwrap();
        let b = store.materialize(&page(1)).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn missing_directory_is_a_page_error() {
        let store = TempFileStore::in_dir("/definitely/not/a/dir");
        let err = store.materialize(&page(3)).unwrap_err();
        assert!(matches!(err, PageError::ScratchFailed { page: 3, .. }));
    }
}
