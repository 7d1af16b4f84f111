//! Pipeline stages for PDF table extraction.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the rasterizer, scratch store and OCR client can be swapped through
//! their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ process ─┬─▶ scratch (temp PNG per page)
//! (URL/path/bytes) (pdfium)     └─▶ retry   (OCR call, rate-limit retry)
//! ```
//!
//! 1. [`input`]  : load the user-supplied path, URL or bytes into memory
//! 2. [`render`] : rasterise selected pages; runs in `spawn_blocking` because
//!    pdfium is synchronous
//! 3. [`process`]: walk pages in order and turn each into a [`crate::output::PageResult`]
//! 4. [`scratch`]: persist a page PNG for exactly one extraction call
//! 5. [`retry`]  : bounded fixed-delay retry on rate-limited calls
//! 6. [`encode`] : PNG encoding and data-URI previews

pub mod encode;
pub mod input;
pub mod process;
pub mod render;
pub mod retry;
pub mod scratch;
