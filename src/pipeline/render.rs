//! PDF rasterisation: turn a [`Document`] into ordered page images.
//!
//! The [`PageRasterizer`] trait is the seam the pipeline depends on;
//! [`PdfiumRasterizer`] is the production implementation. pdfium is a
//! synchronous C++ library with thread-local state, so all of its work runs
//! inside `tokio::task::spawn_blocking`.

use crate::config::{ExtractionConfig, PageSelection};
use crate::error::TableOcrError;
use crate::pipeline::input::Document;
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info};

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-indexed page number in the source document.
    pub number: usize,
    pub image: DynamicImage,
}

/// Pages produced from a document, plus the document's page count.
#[derive(Debug, Clone)]
pub struct RasterizedDocument {
    pub total_pages: usize,
    pub pages: Vec<Page>,
}

/// Converts a PDF into page images.
pub trait PageRasterizer: Send + Sync {
    /// Render the pages picked by `selection`, in document order.
    ///
    /// Any failure is fatal to the whole run.
    fn rasterize(
        &self,
        document: &Document,
        selection: &PageSelection,
    ) -> impl Future<Output = Result<RasterizedDocument, TableOcrError>> + Send;
}

/// Descriptive metadata of a PDF, read without rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// pdfium-backed rasterizer.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    password: Option<String>,
    lib_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u32, max_pixels: u32) -> Self {
        Self {
            dpi,
            max_pixels,
            password: None,
            lib_path: None,
        }
    }

    /// Rasterizer configured from the run configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            lib_path: config.pdfium_lib_path.clone(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.lib_path = Some(path.into());
        self
    }

    /// Read document metadata without rendering pages.
    pub async fn metadata(&self, document: &Document) -> Result<DocumentMetadata, TableOcrError> {
        let this = self.clone();
        let doc = document.clone();
        tokio::task::spawn_blocking(move || this.metadata_blocking(&doc))
            .await
            .map_err(|e| TableOcrError::Internal(format!("Metadata task panicked: {}", e)))?
    }

    fn bind(&self) -> Result<Pdfium, TableOcrError> {
        let bindings = match self.lib_path {
            Some(ref path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| TableOcrError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    fn rasterize_blocking(
        &self,
        document: &Document,
        selection: &PageSelection,
    ) -> Result<RasterizedDocument, TableOcrError> {
        let pdfium = self.bind()?;
        let pdf = self.load(&pdfium, document)?;

        let pages = pdf.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let indices = selection.to_indices(total_pages);
        if indices.is_empty() {
            return Err(TableOcrError::NoPagesSelected { total: total_pages });
        }

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut rendered = Vec::with_capacity(indices.len());
        for idx in indices {
            let page = pages
                .get(idx as u16)
                .map_err(|e| TableOcrError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                TableOcrError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            rendered.push(Page {
                number: idx + 1,
                image,
            });
        }

        Ok(RasterizedDocument {
            total_pages,
            pages: rendered,
        })
    }

    fn load<'a>(
        &self,
        pdfium: &'a Pdfium,
        document: &'a Document,
    ) -> Result<PdfDocument<'a>, TableOcrError> {
        let password = self.password.as_deref();
        pdfium
            .load_pdf_from_byte_slice(document.bytes(), password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                let source_name = document.source().to_string();
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        TableOcrError::WrongPassword { source_name }
                    } else {
                        TableOcrError::PasswordRequired { source_name }
                    }
                } else {
                    TableOcrError::CorruptPdf {
                        source_name,
                        detail: err_str,
                    }
                }
            })
    }

    fn metadata_blocking(&self, document: &Document) -> Result<DocumentMetadata, TableOcrError> {
        let pdfium = self.bind()?;
        let pdf = self.load(&pdfium, document)?;
        let metadata = pdf.metadata();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        Ok(DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            page_count: pdf.pages().len() as usize,
            pdf_version: format!("{:?}", pdf.version()),
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        document: &Document,
        selection: &PageSelection,
    ) -> Result<RasterizedDocument, TableOcrError> {
        let this = self.clone();
        let doc = document.clone();
        let selection = selection.clone();

        tokio::task::spawn_blocking(move || this.rasterize_blocking(&doc, &selection))
            .await
            .map_err(|e| TableOcrError::Internal(format!("Render task panicked: {}", e)))?
    }
}
