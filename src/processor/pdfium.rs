//! [`DocumentProcessor`] backed by pdfium (via `pdfium-render`) and `image`.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library doing CPU-bound work behind a synchronous API.
//! Every operation therefore runs inside `tokio::task::spawn_blocking` so a
//! large merge never stalls the Tokio workers that are routing other
//! senders' messages.
//!
//! ## Binding
//!
//! Each operation binds pdfium afresh: to `library_path` when configured,
//! otherwise to the system library. A missing library surfaces as
//! [`ProcessError::PdfiumBindingFailed`] for that one request instead of
//! preventing the bot from starting.

use super::{check_pdf_magic, DocumentProcessor};
use crate::error::ProcessError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Production document processor.
#[derive(Debug, Clone, Default)]
pub struct PdfiumProcessor {
    library_path: Option<PathBuf>,
}

impl PdfiumProcessor {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    pub fn library_path(&self) -> Option<&PathBuf> {
        self.library_path.as_ref()
    }

    /// Run `work` against a freshly bound pdfium on the blocking pool.
    async fn run<T, F>(&self, work: F) -> Result<T, ProcessError>
    where
        T: Send + 'static,
        F: FnOnce(&Pdfium) -> Result<T, ProcessError> + Send + 'static,
    {
        let library_path = self.library_path.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = bind(library_path.as_ref())?;
            work(&pdfium)
        })
        .await
        .map_err(|e| ProcessError::Internal(format!("pdfium task panicked: {e}")))?
    }
}

fn bind(library_path: Option<&PathBuf>) -> Result<Pdfium, ProcessError> {
    let bindings = match library_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ProcessError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn render_err(stage: &'static str) -> impl FnOnce(PdfiumError) -> ProcessError {
    move |e| ProcessError::Render {
        stage,
        detail: format!("{e:?}"),
    }
}

fn load<'a>(pdfium: &'a Pdfium, bytes: &'a [u8]) -> Result<PdfDocument<'a>, ProcessError> {
    check_pdf_magic(bytes)?;
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ProcessError::InvalidPdf {
            detail: format!("{e:?}"),
        })
}

/// Decode image bytes, naming the declared media type on failure.
fn decode_image(bytes: &[u8], mime_type: &str) -> Result<DynamicImage, ProcessError> {
    if bytes.is_empty() {
        return Err(ProcessError::EmptyInput);
    }
    image::load_from_memory(bytes).map_err(|e| ProcessError::InvalidImage {
        mime_type: mime_type.to_string(),
        detail: e.to_string(),
    })
}

fn image_to_pdf_blocking(pdfium: &Pdfium, image: &DynamicImage) -> Result<Vec<u8>, ProcessError> {
    // One point per pixel: the page is exactly the image's size.
    let width = PdfPoints::new(image.width() as f32);
    let height = PdfPoints::new(image.height() as f32);
    let origin = PdfPoints::new(0.0);

    let mut document = pdfium.create_new_pdf().map_err(render_err("create"))?;
    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(width, height))
            .map_err(render_err("add page"))?;
        page.objects_mut()
            .create_image_object(origin, origin, image, Some(width), Some(height))
            .map_err(render_err("place image"))?;
    }
    document.save_to_bytes().map_err(render_err("save"))
}

fn merge_blocking(pdfium: &Pdfium, documents: &[Vec<u8>]) -> Result<Vec<u8>, ProcessError> {
    let mut merged = pdfium.create_new_pdf().map_err(render_err("create"))?;
    for (i, bytes) in documents.iter().enumerate() {
        let source = load(pdfium, bytes)?;
        debug!(input = i + 1, pages = source.pages().len(), "appending document");
        merged
            .pages_mut()
            .append(&source)
            .map_err(render_err("append pages"))?;
    }
    merged.save_to_bytes().map_err(render_err("save"))
}

fn compress_blocking(pdfium: &Pdfium, bytes: &[u8]) -> Result<Vec<u8>, ProcessError> {
    let document = load(pdfium, bytes)?;
    document.save_to_bytes().map_err(render_err("save"))
}

#[async_trait]
impl DocumentProcessor for PdfiumProcessor {
    async fn image_to_document(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<Vec<u8>, ProcessError> {
        let image = decode_image(bytes, mime_type)?;
        info!(
            mime_type,
            width = image.width(),
            height = image.height(),
            "converting image to PDF"
        );
        self.run(move |pdfium| image_to_pdf_blocking(pdfium, &image))
            .await
    }

    async fn merge_documents(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>, ProcessError> {
        if documents.len() < 2 {
            return Err(ProcessError::NotEnoughDocuments {
                got: documents.len(),
            });
        }
        for doc in documents {
            check_pdf_magic(doc)?;
        }
        info!(count = documents.len(), "merging PDFs");
        let documents = documents.to_vec();
        self.run(move |pdfium| merge_blocking(pdfium, &documents))
            .await
    }

    async fn compress_document(&self, bytes: &[u8]) -> Result<Vec<u8>, ProcessError> {
        check_pdf_magic(bytes)?;
        info!(size = bytes.len(), "compressing PDF");
        let bytes = bytes.to_vec();
        self.run(move |pdfium| compress_blocking(pdfium, &bytes))
            .await
    }
}
